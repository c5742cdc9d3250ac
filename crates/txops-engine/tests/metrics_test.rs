//! Metric accounting through the full pipeline.
//!
//! Lives in its own test binary so no other test moves the process-wide
//! counters while these run.

mod integration;
use integration::common::fixtures::{at, completed, memory_config, purchase};

use rust_decimal_macros::dec;

use txops_core::{BucketKey, Classification};
use txops_engine::Application;
use txops_telemetry::metrics::BUCKET_CLASSIFIED_TOTAL;

fn classified_total() -> f64 {
    Classification::ALL
        .iter()
        .map(|label| BUCKET_CLASSIFIED_TOTAL.with_label_values(&[label.as_str()]).get())
        .sum()
}

#[tokio::test]
async fn test_each_bucket_update_is_classified_once() {
    let app = Application::start(memory_config(1, 16)).await.unwrap();
    let before = classified_total();

    app.submit_transaction_event(completed(purchase(1, 1, dec!(100)), at(10, 0, 30)))
        .unwrap();
    app.submit_transaction_event(completed(purchase(2, 2, dec!(100)), at(10, 0, 45)))
        .unwrap();
    app.flush().await.unwrap();
    assert_eq!(classified_total() - before, 2.0);

    // The report reuses the label cached on the published snapshot.
    app.query()
        .bucket_report(BucketKey::from_timestamp(at(10, 0, 0)))
        .unwrap();
    assert_eq!(classified_total() - before, 2.0);

    app.shutdown().await.unwrap();
}
