//! Read-only query layer for txops.
//!
//! [`QueryFacade`] answers window and entity queries from the aggregators'
//! published snapshots:
//!
//! - realtime metrics over a window (merged counts, rates, percentiles)
//! - per-user summaries
//! - top assets by successful volume
//! - single bucket reports with their classification
//! - peak versus off-peak comparison
//!
//! The same operations are served as JSON by an axum router:
//!
//! ```text
//! GET /api/metrics/realtime?window_minutes=60
//! GET /api/users/{id}
//! GET /api/assets/top?window_minutes=60&limit=10
//! GET /api/buckets/{date}/{hour}
//! GET /api/peak?window_minutes=1440
//! GET /metrics                      (Prometheus text format)
//! ```

mod config;
mod error;
mod facade;
mod server;
mod types;

pub use config::QueryConfig;
pub use error::{QueryError, QueryResult};
pub use facade::QueryFacade;
pub use server::{create_router, run_server, AppState};
pub use types::{
    AssetRanking, BucketReport, ManualReviewSplit, PaymentMethodReport, RealtimeMetrics,
    UserSummary,
};
