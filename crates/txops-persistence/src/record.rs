//! Log line format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use txops_core::TransactionStatusChanged;

/// One line of the fact log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// When the record was handed to the writer; selects the daily file.
    pub logged_at: DateTime<Utc>,
    pub fact: TransactionStatusChanged,
}

impl LogRecord {
    pub fn new(fact: TransactionStatusChanged) -> Self {
        Self {
            logged_at: Utc::now(),
            fact,
        }
    }

    /// `YYYY-MM-DD` of the file this record belongs to.
    pub fn file_date(&self) -> String {
        self.logged_at.format("%Y-%m-%d").to_string()
    }
}

#[cfg(test)]
pub(crate) fn sample_fact(id: u64) -> TransactionStatusChanged {
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use txops_core::{OperationType, TransactionEvent, TransactionId, TransactionStatus, UserId};

    let event = TransactionEvent::new(
        TransactionId::new(id),
        UserId::new(id % 3),
        OperationType::Purchase,
        "BTC",
        Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap(),
    )
    .with_amounts(dec!(0.01), dec!(60000), dec!(3))
    .with_status(
        TransactionStatus::Successful,
        Some(Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 47).unwrap()),
    );
    TransactionStatusChanged::from_event(&event, Some(TransactionStatus::Pending), Some(47))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_record_line_format() {
        let mut record = LogRecord::new(sample_fact(1));
        record.logged_at = Utc.with_ymd_and_hms(2024, 7, 2, 0, 0, 1).unwrap();
        assert_eq!(record.file_date(), "2024-07-02");

        let line = serde_json::to_string(&record).unwrap();
        assert!(!line.contains('\n'));
        let parsed: LogRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, record);
    }
}
