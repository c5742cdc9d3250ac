//! Fee check against the configured commission rates.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use txops_core::{OperationType, TransactionId, TransactionStatusChanged};
use txops_registry::ConfigSnapshot;

/// Allowed absolute difference between the charged and expected fee (one cent).
pub const FEE_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeeMismatch {
    pub transaction_id: TransactionId,
    pub operation: OperationType,
    pub rate: Decimal,
    pub expected_usd: Decimal,
    pub charged_usd: Decimal,
}

/// Compare the charged fee with `amount * commission_rate(operation)`,
/// rounded half-up to cents.
pub fn check_fee(fact: &TransactionStatusChanged, snapshot: &ConfigSnapshot) -> Option<FeeMismatch> {
    let rate = snapshot.commission_rate(fact.operation);
    let expected = (fact.amount_usd * rate)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    ((expected - fact.fee_usd).abs() > FEE_TOLERANCE).then(|| FeeMismatch {
        transaction_id: fact.transaction_id,
        operation: fact.operation,
        rate,
        expected_usd: expected,
        charged_usd: fact.fee_usd,
    })
}
