//! Transaction state machine.
//!
//! `pending -> processing -> {successful, failed, cancelled}`. Records are
//! stored in a `DashMap`; each `apply` holds the entry for its id for the
//! whole check-and-update, so concurrent events for one transaction are
//! linearized while different transactions proceed in parallel.

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info};

use txops_core::{
    CoreError, TransactionEvent, TransactionId, TransactionStatus, TransactionStatusChanged,
};

use crate::error::{TransitionError, TransitionResult};
use crate::record::{processing_time, TransactionRecord};

/// Failure reason attached to transactions failed by the timeout sweep.
pub const TIMEOUT_FAILURE_REASON: &str = "timeout";

/// Outcome of applying one event.
#[derive(Debug, Clone)]
pub struct Transition {
    /// Record after the event was applied.
    pub record: TransactionRecord,
    /// `None` when the event was an idempotent re-delivery.
    pub fact: Option<TransactionStatusChanged>,
}

/// Owns every known [`TransactionRecord`].
#[derive(Debug, Default)]
pub struct TransactionStateMachine {
    records: DashMap<TransactionId, TransactionRecord>,
}

impl TransactionStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `event` and apply it.
    ///
    /// The first event for an id creates the record in whatever status it
    /// carries. Afterwards status may only move forward; re-delivery of the
    /// current non-terminal status is a no-op, anything out of a terminal
    /// status is rejected. Nothing is mutated on error.
    pub fn apply(&self, event: &TransactionEvent) -> TransitionResult<Transition> {
        event.validate()?;

        if event.status.is_terminal() && event.completed_at.is_none() {
            return Err(TransitionError::MissingCompletion {
                id: event.id,
                status: event.status,
            });
        }

        match self.records.entry(event.id) {
            Entry::Vacant(slot) => {
                let processing_time_seconds = terminal_processing_time(event);
                let fact = TransactionStatusChanged::from_event(event, None, processing_time_seconds);
                let record = TransactionRecord::new(event.clone(), processing_time_seconds);
                slot.insert(record.clone());

                debug!(id = %event.id, status = %event.status, "Transaction created");
                Ok(Transition {
                    record,
                    fact: Some(fact),
                })
            }
            Entry::Occupied(mut slot) => {
                let current = slot.get();
                let from = current.status();
                let to = event.status;

                if current.user_id() != event.user_id {
                    return Err(TransitionError::UserMismatch {
                        id: event.id,
                        expected: current.user_id(),
                        actual: event.user_id,
                    });
                }
                if from.is_terminal() || to.rank() < from.rank() {
                    return Err(TransitionError::InvalidTransition {
                        id: event.id,
                        from,
                        to,
                    });
                }
                if from == to {
                    return Ok(Transition {
                        record: current.clone(),
                        fact: None,
                    });
                }

                let merged = current.merge(event);
                if let Some(completed_at) = merged.completed_at {
                    if completed_at < merged.started_at {
                        return Err(CoreError::TimestampOrderViolation {
                            id: merged.id,
                            started_at: merged.started_at,
                            completed_at,
                        }
                        .into());
                    }
                }

                let processing_time_seconds = terminal_processing_time(&merged);
                let fact =
                    TransactionStatusChanged::from_event(&merged, Some(from), processing_time_seconds);
                let record = TransactionRecord::new(merged, processing_time_seconds);
                *slot.get_mut() = record.clone();

                debug!(id = %event.id, %from, %to, "Transaction transitioned");
                Ok(Transition {
                    record,
                    fact: Some(fact),
                })
            }
        }
    }

    pub fn get(&self, id: TransactionId) -> Option<TransactionRecord> {
        self.records.get(&id).map(|r| r.clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of transactions not yet terminal.
    pub fn open_count(&self) -> usize {
        self.records.iter().filter(|r| !r.is_terminal()).count()
    }

    /// Build synthetic `failed` events for open transactions started more
    /// than `timeout` before `now`.
    ///
    /// Nothing is mutated here: the events go back through the normal
    /// ingest path so they are logged and aggregated like any other event.
    pub fn sweep_timeouts(&self, now: DateTime<Utc>, timeout: Duration) -> Vec<TransactionEvent> {
        let cutoff = now - timeout;
        let expired: Vec<TransactionEvent> = self
            .records
            .iter()
            .filter(|r| !r.is_terminal() && r.started_at() < cutoff)
            .map(|r| {
                let mut event = r.event.clone();
                event.status = TransactionStatus::Failed;
                event.completed_at = Some(now);
                event.failure_reason = Some(TIMEOUT_FAILURE_REASON.to_string());
                event
            })
            .collect();

        if !expired.is_empty() {
            info!(
                count = expired.len(),
                timeout_secs = timeout.num_seconds(),
                "Timed-out transactions swept"
            );
        }
        expired
    }

    /// Rebuild a record from a logged fact.
    ///
    /// Facts that do not move the record forward are ignored, so replaying a
    /// log twice (or out of order within one transaction) is harmless.
    /// Returns whether the record changed.
    pub fn restore(&self, fact: &TransactionStatusChanged) -> bool {
        let record = TransactionRecord::new(fact.to_event(), fact.processing_time_seconds);
        match self.records.entry(fact.transaction_id) {
            Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
            Entry::Occupied(mut slot) => {
                let current = slot.get().status();
                if current.is_terminal() || fact.status.rank() <= current.rank() {
                    return false;
                }
                *slot.get_mut() = record;
                true
            }
        }
    }

    /// Drop terminal records last updated before `before`. Returns the
    /// number removed.
    pub fn prune_terminal(&self, before: DateTime<Utc>) -> usize {
        let len = self.records.len();
        self.records
            .retain(|_, r| !(r.is_terminal() && r.updated_at < before));
        len.saturating_sub(self.records.len())
    }
}

fn terminal_processing_time(event: &TransactionEvent) -> Option<i64> {
    if !event.status.is_terminal() {
        return None;
    }
    event
        .completed_at
        .map(|completed_at| processing_time(event.started_at, completed_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use txops_core::{OperationType, UserId};

    fn t(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, h, m, s).unwrap()
    }

    fn pending(id: u64) -> TransactionEvent {
        TransactionEvent::new(
            TransactionId::new(id),
            UserId::new(1),
            OperationType::Purchase,
            "BTC",
            t(10, 0, 0),
        )
        .with_amounts(dec!(0.01), dec!(60000), dec!(3))
    }

    #[test]
    fn test_full_lifecycle_computes_processing_time() {
        let sm = TransactionStateMachine::new();

        let created = sm.apply(&pending(1)).unwrap();
        assert_eq!(created.fact.as_ref().unwrap().previous, None);
        assert_eq!(created.record.processing_time_seconds, None);

        let processing = pending(1).with_status(TransactionStatus::Processing, None);
        let tr = sm.apply(&processing).unwrap();
        assert_eq!(tr.record.processing_time_seconds, None);

        let done = pending(1).with_status(TransactionStatus::Successful, Some(t(10, 0, 47)));
        let tr = sm.apply(&done).unwrap();
        let fact = tr.fact.unwrap();
        assert_eq!(fact.previous, Some(TransactionStatus::Processing));
        assert_eq!(fact.processing_time_seconds, Some(47));
        assert!(fact.is_first_success());
        assert_eq!(sm.get(TransactionId::new(1)).unwrap().processing_time_seconds, Some(47));
    }

    #[test]
    fn test_terminal_is_final() {
        let sm = TransactionStateMachine::new();
        let done = pending(2).with_status(TransactionStatus::Successful, Some(t(10, 1, 0)));
        sm.apply(&done).unwrap();

        let err = sm.apply(&done).unwrap_err();
        assert!(err.is_duplicate());

        let failed = pending(2).with_status(TransactionStatus::Failed, Some(t(10, 2, 0)));
        let err = sm.apply(&failed).unwrap_err();
        assert!(matches!(err, TransitionError::InvalidTransition { .. }));
        assert!(!err.is_duplicate());

        let record = sm.get(TransactionId::new(2)).unwrap();
        assert_eq!(record.status(), TransactionStatus::Successful);
        assert_eq!(record.processing_time_seconds, Some(60));
    }

    #[test]
    fn test_backward_transition_rejected() {
        let sm = TransactionStateMachine::new();
        sm.apply(&pending(3).with_status(TransactionStatus::Processing, None))
            .unwrap();
        let err = sm.apply(&pending(3)).unwrap_err();
        assert!(matches!(
            err,
            TransitionError::InvalidTransition {
                from: TransactionStatus::Processing,
                to: TransactionStatus::Pending,
                ..
            }
        ));
    }

    #[test]
    fn test_same_non_terminal_status_is_noop() {
        let sm = TransactionStateMachine::new();
        sm.apply(&pending(4)).unwrap();
        let tr = sm.apply(&pending(4)).unwrap();
        assert!(tr.fact.is_none());
    }

    #[test]
    fn test_terminal_without_completion_rejected() {
        let sm = TransactionStateMachine::new();
        let event = pending(5).with_status(TransactionStatus::Failed, None);
        assert!(matches!(
            sm.apply(&event),
            Err(TransitionError::MissingCompletion { .. })
        ));
        assert!(sm.is_empty());
    }

    #[test]
    fn test_completion_before_start_rejected_without_mutation() {
        let sm = TransactionStateMachine::new();
        sm.apply(&pending(6)).unwrap();

        let mut bad = pending(6).with_status(TransactionStatus::Successful, Some(t(9, 59, 0)));
        assert!(matches!(
            sm.apply(&bad),
            Err(TransitionError::Validation(CoreError::TimestampOrderViolation { .. }))
        ));

        // An earlier start on the event does not move the recorded start.
        bad.started_at = t(9, 0, 0);
        assert!(matches!(
            sm.apply(&bad),
            Err(TransitionError::Validation(CoreError::TimestampOrderViolation { .. }))
        ));
        assert_eq!(
            sm.get(TransactionId::new(6)).unwrap().status(),
            TransactionStatus::Pending
        );
    }

    #[test]
    fn test_user_mismatch_rejected() {
        let sm = TransactionStateMachine::new();
        sm.apply(&pending(7)).unwrap();
        let mut other = pending(7).with_status(TransactionStatus::Processing, None);
        other.user_id = UserId::new(99);
        assert!(matches!(
            sm.apply(&other),
            Err(TransitionError::UserMismatch { .. })
        ));
    }

    #[test]
    fn test_attributes_carried_forward() {
        let sm = TransactionStateMachine::new();
        sm.apply(&pending(8).with_fraud_score(82.0).with_manual_review(true))
            .unwrap();
        let done = pending(8).with_status(TransactionStatus::Successful, Some(t(10, 0, 5)));
        let fact = sm.apply(&done).unwrap().fact.unwrap();
        assert_eq!(fact.fraud_score, Some(82.0));
        assert!(fact.manual_review);
    }

    #[test]
    fn test_sweep_timeouts() {
        let sm = TransactionStateMachine::new();
        sm.apply(&pending(10)).unwrap();
        let mut fresh = pending(11);
        fresh.started_at = t(10, 4, 0);
        sm.apply(&fresh).unwrap();
        sm.apply(&pending(12).with_status(TransactionStatus::Successful, Some(t(10, 0, 3))))
            .unwrap();

        let expired = sm.sweep_timeouts(t(10, 5, 1), Duration::seconds(300));
        assert_eq!(expired.len(), 1);
        let event = &expired[0];
        assert_eq!(event.id, TransactionId::new(10));
        assert_eq!(event.status, TransactionStatus::Failed);
        assert_eq!(event.failure_reason.as_deref(), Some(TIMEOUT_FAILURE_REASON));

        // Sweep does not mutate; applying the event does.
        assert_eq!(sm.open_count(), 2);
        let fact = sm.apply(event).unwrap().fact.unwrap();
        assert_eq!(fact.processing_time_seconds, Some(301));
        assert_eq!(sm.open_count(), 1);
    }

    #[test]
    fn test_restore_moves_forward_only() {
        let source = TransactionStateMachine::new();
        let f1 = source.apply(&pending(20)).unwrap().fact.unwrap();
        let f2 = source
            .apply(&pending(20).with_status(TransactionStatus::Successful, Some(t(10, 0, 9))))
            .unwrap()
            .fact
            .unwrap();

        let sm = TransactionStateMachine::new();
        assert!(sm.restore(&f1));
        assert!(sm.restore(&f2));
        assert!(!sm.restore(&f1));
        assert!(!sm.restore(&f2));

        let record = sm.get(TransactionId::new(20)).unwrap();
        assert_eq!(record.status(), TransactionStatus::Successful);
        assert_eq!(record.processing_time_seconds, Some(9));
    }

    #[test]
    fn test_prune_terminal() {
        let sm = TransactionStateMachine::new();
        sm.apply(&pending(30)).unwrap();
        sm.apply(&pending(31).with_status(TransactionStatus::Cancelled, Some(t(10, 0, 1))))
            .unwrap();
        let removed = sm.prune_terminal(Utc::now() + Duration::seconds(1));
        assert_eq!(removed, 1);
        assert_eq!(sm.len(), 1);
    }
}
