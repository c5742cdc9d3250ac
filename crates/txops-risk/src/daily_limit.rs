//! Per-(user, day) spend tracking against the tier daily limit.

use chrono::NaiveDate;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::Serialize;

use txops_core::{UserId, VerificationTier};

/// A user's spend crossed the tier limit for `day`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyLimitBreach {
    pub user_id: UserId,
    pub day: NaiveDate,
    pub tier: VerificationTier,
    pub spent_usd: Decimal,
    pub limit_usd: Decimal,
}

/// Successful spend per user and UTC day.
#[derive(Debug, Default)]
pub struct DailyLimitTracker {
    spent: DashMap<(UserId, NaiveDate), Decimal>,
}

impl DailyLimitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount_usd` to the user's spend for `day`.
    ///
    /// Returns a breach only on the call that first takes the total above
    /// `limit_usd`; later spend on the same day stays silent.
    pub fn record(
        &self,
        user_id: UserId,
        day: NaiveDate,
        tier: VerificationTier,
        amount_usd: Decimal,
        limit_usd: Decimal,
    ) -> Option<DailyLimitBreach> {
        let mut entry = self.spent.entry((user_id, day)).or_insert(Decimal::ZERO);
        let before = *entry;
        let after = before + amount_usd;
        *entry = after;
        drop(entry);

        (before <= limit_usd && after > limit_usd).then_some(DailyLimitBreach {
            user_id,
            day,
            tier,
            spent_usd: after,
            limit_usd,
        })
    }

    pub fn spent(&self, user_id: UserId, day: NaiveDate) -> Decimal {
        self.spent
            .get(&(user_id, day))
            .map(|v| *v)
            .unwrap_or(Decimal::ZERO)
    }

    /// Drop every day strictly before `before`.
    pub fn prune(&self, before: NaiveDate) -> usize {
        let len = self.spent.len();
        self.spent.retain(|(_, day), _| *day >= before);
        len.saturating_sub(self.spent.len())
    }

    pub fn len(&self) -> usize {
        self.spent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spent.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
    }

    #[test]
    fn test_breach_reported_once() {
        let tracker = DailyLimitTracker::new();
        let user = UserId::new(1);
        let tier = VerificationTier::Basic;

        assert!(tracker.record(user, day(1), tier, dec!(600), dec!(1000)).is_none());
        // Exactly at the limit is allowed.
        assert!(tracker.record(user, day(1), tier, dec!(400), dec!(1000)).is_none());

        let breach = tracker
            .record(user, day(1), tier, dec!(0.01), dec!(1000))
            .unwrap();
        assert_eq!(breach.spent_usd, dec!(1000.01));
        assert_eq!(breach.limit_usd, dec!(1000));

        assert!(tracker.record(user, day(1), tier, dec!(500), dec!(1000)).is_none());
        assert_eq!(tracker.spent(user, day(1)), dec!(1500.01));
    }

    #[test]
    fn test_days_and_users_are_independent() {
        let tracker = DailyLimitTracker::new();
        let tier = VerificationTier::Basic;
        assert!(tracker
            .record(UserId::new(1), day(1), tier, dec!(900), dec!(1000))
            .is_none());
        assert!(tracker
            .record(UserId::new(1), day(2), tier, dec!(900), dec!(1000))
            .is_none());
        assert!(tracker
            .record(UserId::new(2), day(1), tier, dec!(900), dec!(1000))
            .is_none());
        assert_eq!(tracker.len(), 3);
    }

    #[test]
    fn test_prune() {
        let tracker = DailyLimitTracker::new();
        let tier = VerificationTier::Full;
        tracker.record(UserId::new(1), day(1), tier, dec!(1), dec!(50000));
        tracker.record(UserId::new(1), day(2), tier, dec!(1), dec!(50000));
        tracker.record(UserId::new(1), day(3), tier, dec!(1), dec!(50000));

        assert_eq!(tracker.prune(day(3)), 2);
        assert_eq!(tracker.spent(UserId::new(1), day(1)), Decimal::ZERO);
        assert_eq!(tracker.spent(UserId::new(1), day(3)), dec!(1));
    }
}
