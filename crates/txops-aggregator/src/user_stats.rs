//! Per-user lifetime statistics.
//!
//! Updated exactly once per transaction id, on its transition into
//! `successful`.

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use txops_core::{TransactionId, UserId};

use crate::error::{AggregationError, AggregationResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserStats {
    pub user_id: UserId,
    pub total_transactions: u64,
    pub total_volume_usd: Decimal,
    pub last_transaction_at: Option<DateTime<Utc>>,
}

impl UserStats {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            total_transactions: 0,
            total_volume_usd: Decimal::ZERO,
            last_transaction_at: None,
        }
    }

    /// Mean successful ticket size.
    pub fn average_ticket_usd(&self) -> Option<Decimal> {
        (self.total_transactions > 0)
            .then(|| self.total_volume_usd / Decimal::from(self.total_transactions))
    }
}

struct UserEntry {
    stats: UserStats,
    seen: HashSet<TransactionId>,
}

struct UserSlot {
    writer: Mutex<UserEntry>,
    snapshot: ArcSwap<UserStats>,
}

/// Owns every user's [`UserStats`].
#[derive(Default)]
pub struct UserStatsAggregator {
    users: DashMap<UserId, Arc<UserSlot>>,
}

impl UserStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a successful transaction for `user_id`.
    ///
    /// Returns `Ok(false)` when `transaction_id` was already counted. The
    /// per-user lock makes the check and the update one atomic step.
    pub fn apply_success(
        &self,
        transaction_id: TransactionId,
        user_id: UserId,
        amount_usd: Decimal,
        completed_at: DateTime<Utc>,
    ) -> AggregationResult<bool> {
        if amount_usd.is_sign_negative() && !amount_usd.is_zero() {
            return Err(AggregationError::NegativeAmount {
                user_id,
                transaction_id,
                amount: amount_usd.to_string(),
            });
        }

        let slot = Arc::clone(
            self.users
                .entry(user_id)
                .or_insert_with(|| {
                    Arc::new(UserSlot {
                        writer: Mutex::new(UserEntry {
                            stats: UserStats::new(user_id),
                            seen: HashSet::new(),
                        }),
                        snapshot: ArcSwap::from_pointee(UserStats::new(user_id)),
                    })
                })
                .value(),
        );

        let mut entry = slot.writer.lock();
        if !entry.seen.insert(transaction_id) {
            debug!(id = %transaction_id, user = %user_id, "Duplicate success ignored");
            return Ok(false);
        }

        let stats = &mut entry.stats;
        stats.total_transactions += 1;
        stats.total_volume_usd += amount_usd;
        stats.last_transaction_at = Some(
            stats
                .last_transaction_at
                .map_or(completed_at, |last| last.max(completed_at)),
        );
        slot.snapshot.store(Arc::new(stats.clone()));
        Ok(true)
    }

    pub fn get(&self, user_id: UserId) -> Option<Arc<UserStats>> {
        self.users
            .get(&user_id)
            .map(|slot| slot.snapshot.load_full())
            .filter(|stats| stats.total_transactions > 0)
    }

    /// Number of users with at least one successful transaction.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;
    use std::thread;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn test_apply_success_accumulates() {
        let agg = UserStatsAggregator::new();
        let user = UserId::new(1);
        assert!(agg
            .apply_success(TransactionId::new(1), user, dec!(100), at(47))
            .unwrap());
        assert!(agg
            .apply_success(TransactionId::new(2), user, dec!(50), at(10))
            .unwrap());

        let stats = agg.get(user).unwrap();
        assert_eq!(stats.total_transactions, 2);
        assert_eq!(stats.total_volume_usd, dec!(150));
        // Out-of-order completion does not move last_transaction_at back.
        assert_eq!(stats.last_transaction_at, Some(at(47)));
        assert_eq!(stats.average_ticket_usd(), Some(dec!(75)));
    }

    #[test]
    fn test_duplicate_success_not_double_counted() {
        let agg = UserStatsAggregator::new();
        let user = UserId::new(2);
        let id = TransactionId::new(9);
        assert!(agg.apply_success(id, user, dec!(10), at(1)).unwrap());
        assert!(!agg.apply_success(id, user, dec!(10), at(2)).unwrap());

        let stats = agg.get(user).unwrap();
        assert_eq!(stats.total_transactions, 1);
        assert_eq!(stats.total_volume_usd, dec!(10));
        assert_eq!(stats.last_transaction_at, Some(at(1)));
    }

    #[test]
    fn test_negative_amount_rejected() {
        let agg = UserStatsAggregator::new();
        let err = agg
            .apply_success(TransactionId::new(1), UserId::new(3), dec!(-1), at(0))
            .unwrap_err();
        assert!(matches!(err, AggregationError::NegativeAmount { .. }));
        assert!(agg.get(UserId::new(3)).is_none());
    }

    #[test]
    fn test_unknown_user() {
        let agg = UserStatsAggregator::new();
        assert!(agg.get(UserId::new(404)).is_none());
    }

    #[test]
    fn test_concurrent_completions_for_one_user() {
        let agg = Arc::new(UserStatsAggregator::new());
        let user = UserId::new(7);

        let handles: Vec<_> = (0..8u64)
            .map(|t| {
                let agg = Arc::clone(&agg);
                thread::spawn(move || {
                    for i in 0..250u64 {
                        // Every id is submitted by two threads.
                        let id = TransactionId::new((t / 2) * 1_000 + i);
                        agg.apply_success(id, user, dec!(2), at(i as i64)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = agg.get(user).unwrap();
        assert_eq!(stats.total_transactions, 1_000);
        assert_eq!(stats.total_volume_usd, dec!(2000));
        assert_eq!(stats.last_transaction_at, Some(at(249)));
    }
}
