//! HTTP server implementation using axum.

use std::net::SocketAddr;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use txops_core::{BucketKey, UserId};
use txops_telemetry::gather_text;

use crate::config::QueryConfig;
use crate::error::QueryError;
use crate::facade::QueryFacade;

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let status = match self {
            QueryError::NotFound(_) => StatusCode::NOT_FOUND,
            QueryError::InvalidWindow(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    facade: QueryFacade,
    config: QueryConfig,
}

impl AppState {
    pub fn new(facade: QueryFacade, config: QueryConfig) -> Self {
        Self { facade, config }
    }

    fn window(&self, params: &WindowParams) -> Duration {
        Duration::minutes(
            params
                .window_minutes
                .unwrap_or(self.config.default_window_minutes),
        )
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct WindowParams {
    pub window_minutes: Option<i64>,
    pub limit: Option<usize>,
}

/// Create the axum router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/metrics/realtime", get(get_realtime))
        .route("/api/users/{id}", get(get_user))
        .route("/api/assets/top", get(get_top_assets))
        .route("/api/buckets/{date}/{hour}", get(get_bucket))
        .route("/api/peak", get(get_peak))
        .route("/metrics", get(get_prometheus))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn get_realtime(
    State(state): State<AppState>,
    Query(params): Query<WindowParams>,
) -> Result<Response, QueryError> {
    let metrics = state.facade.realtime_metrics(state.window(&params))?;
    Ok(Json(metrics).into_response())
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Response, QueryError> {
    let summary = state.facade.user_summary(UserId::new(id))?;
    Ok(Json(summary).into_response())
}

async fn get_top_assets(
    State(state): State<AppState>,
    Query(params): Query<WindowParams>,
) -> Result<Response, QueryError> {
    let limit = params.limit.unwrap_or(state.config.top_assets_limit);
    let ranking = state.facade.top_assets(state.window(&params), limit)?;
    Ok(Json(ranking).into_response())
}

async fn get_bucket(
    State(state): State<AppState>,
    Path((date, hour)): Path<(NaiveDate, u8)>,
) -> Result<Response, QueryError> {
    let key = BucketKey::new(date, hour)
        .ok_or_else(|| QueryError::NotFound(format!("hour {hour} of {date}")))?;
    let report = state.facade.bucket_report(key)?;
    Ok(Json(report).into_response())
}

async fn get_peak(
    State(state): State<AppState>,
    Query(params): Query<WindowParams>,
) -> Result<Response, QueryError> {
    let comparison = state.facade.peak_comparison(state.window(&params))?;
    Ok(Json(comparison).into_response())
}

async fn get_prometheus() -> Response {
    match gather_text() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Run the query HTTP server.
pub async fn run_server(
    facade: QueryFacade,
    config: QueryConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let port = config.port;
    let app = create_router(AppState::new(facade, config));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(port, "Starting query server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
