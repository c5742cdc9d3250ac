//! Fraud score validation, local scoring and the flag policy.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use txops_core::{TransactionEvent, TransactionId, TransactionStatusChanged};

use crate::error::{RiskError, RiskResult};

/// Amount above which the local model adds a surcharge.
const LARGE_AMOUNT_USD: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

/// Score at 100% of the daily limit.
const LIMIT_RATIO_WEIGHT: f64 = 75.0;

const LARGE_AMOUNT_SURCHARGE: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    /// Score came with the event.
    Supplied,
    /// Score computed by [`local_score`].
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FraudAssessment {
    pub transaction_id: TransactionId,
    pub score: f64,
    pub source: ScoreSource,
    pub flagged: bool,
    /// The verdict came from an explicit override, not the threshold.
    pub overridden: bool,
}

/// Reject scores outside `[0, 100]` (and NaN).
pub fn validate_score(id: TransactionId, score: f64) -> RiskResult<f64> {
    if (0.0..=100.0).contains(&score) {
        Ok(score)
    } else {
        Err(RiskError::InvalidScoreRange { id, score })
    }
}

/// Ingest-time check of an upstream score, before anything is mutated.
pub fn validate_event_score(event: &TransactionEvent) -> RiskResult<()> {
    match event.fraud_score {
        Some(score) => validate_score(event.id, score).map(|_| ()),
        None => Ok(()),
    }
}

/// Local score: the amount's share of the tier daily limit scaled so the
/// full limit scores 75, plus 15 for amounts above 10,000 USD. Capped at 100.
pub fn local_score(amount_usd: Decimal, daily_limit: Decimal) -> f64 {
    if amount_usd <= Decimal::ZERO {
        return 0.0;
    }
    let ratio = if daily_limit > Decimal::ZERO {
        (amount_usd / daily_limit).to_f64().unwrap_or(f64::MAX)
    } else {
        f64::MAX
    };

    let mut score = (ratio * LIMIT_RATIO_WEIGHT).min(100.0);
    if amount_usd > LARGE_AMOUNT_USD {
        score += LARGE_AMOUNT_SURCHARGE;
    }
    score.clamp(0.0, 100.0)
}

/// Score and flag one fact.
///
/// `flagged = score >= threshold` unless the fact carries an explicit
/// override, which wins either way.
pub fn assess(
    fact: &TransactionStatusChanged,
    threshold: f64,
    daily_limit: Decimal,
) -> RiskResult<FraudAssessment> {
    let (score, source) = match fact.fraud_score {
        Some(score) => (validate_score(fact.transaction_id, score)?, ScoreSource::Supplied),
        None => (local_score(fact.amount_usd, daily_limit), ScoreSource::Local),
    };

    let (flagged, overridden) = match fact.fraud_override {
        Some(flagged) => (flagged, true),
        None => (score >= threshold, false),
    };

    Ok(FraudAssessment {
        transaction_id: fact.transaction_id,
        score,
        source,
        flagged,
        overridden,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use txops_core::{OperationType, TransactionEvent, UserId};

    fn fact(score: Option<f64>, amount: Decimal) -> TransactionStatusChanged {
        let mut event = TransactionEvent::new(
            TransactionId::new(1),
            UserId::new(1),
            OperationType::Purchase,
            "BTC",
            Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap(),
        )
        .with_amounts(dec!(1), amount, dec!(0));
        event.fraud_score = score;
        TransactionStatusChanged::from_event(&event, None, None)
    }

    #[test]
    fn test_threshold_policy() {
        let flagged = assess(&fact(Some(80.0), dec!(10)), 75.0, dec!(1000)).unwrap();
        assert!(flagged.flagged);
        assert_eq!(flagged.source, ScoreSource::Supplied);

        let clean = assess(&fact(Some(74.0), dec!(10)), 75.0, dec!(1000)).unwrap();
        assert!(!clean.flagged);

        // Boundary is inclusive.
        let boundary = assess(&fact(Some(75.0), dec!(10)), 75.0, dec!(1000)).unwrap();
        assert!(boundary.flagged);
    }

    #[test]
    fn test_out_of_range_score() {
        let err = assess(&fact(Some(150.0), dec!(10)), 75.0, dec!(1000)).unwrap_err();
        assert_eq!(
            err,
            RiskError::InvalidScoreRange {
                id: TransactionId::new(1),
                score: 150.0
            }
        );
        assert!(validate_score(TransactionId::new(1), -0.5).is_err());
        assert!(validate_score(TransactionId::new(1), f64::NAN).is_err());
        assert_eq!(validate_score(TransactionId::new(1), 100.0), Ok(100.0));
    }

    #[test]
    fn test_validate_event_score() {
        let event = TransactionEvent::new(
            TransactionId::new(2),
            UserId::new(1),
            OperationType::Sell,
            "ETH",
            Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap(),
        );
        assert!(validate_event_score(&event).is_ok());
        assert!(validate_event_score(&event.clone().with_fraud_score(42.0)).is_ok());
        assert!(validate_event_score(&event.with_fraud_score(100.5)).is_err());
    }

    #[test]
    fn test_override_wins() {
        let mut f = fact(Some(99.0), dec!(10));
        f.fraud_override = Some(false);
        let assessment = assess(&f, 75.0, dec!(1000)).unwrap();
        assert!(!assessment.flagged);
        assert!(assessment.overridden);

        let mut f = fact(Some(1.0), dec!(10));
        f.fraud_override = Some(true);
        assert!(assess(&f, 75.0, dec!(1000)).unwrap().flagged);
    }

    #[test]
    fn test_local_score() {
        assert_eq!(local_score(dec!(500), dec!(1000)), 37.5);
        assert_eq!(local_score(dec!(1000), dec!(1000)), 75.0);
        assert_eq!(local_score(dec!(5000), dec!(1000)), 100.0);
        // 12k against a 50k limit: 18 + 15
        assert_eq!(local_score(dec!(12000), dec!(50000)), 33.0);
        assert_eq!(local_score(dec!(0), dec!(1000)), 0.0);
    }

    #[test]
    fn test_local_score_used_when_absent() {
        let assessment = assess(&fact(None, dec!(1000)), 75.0, dec!(1000)).unwrap();
        assert_eq!(assessment.source, ScoreSource::Local);
        assert_eq!(assessment.score, 75.0);
        assert!(assessment.flagged);
    }
}
