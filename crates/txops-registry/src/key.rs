//! Recognized threshold keys, their defaults and accepted ranges.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use txops_core::{OperationType, VerificationTier};

/// A recognized threshold key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigKey {
    TransactionTimeoutSeconds,
    FraudThreshold,
    CommissionRateBuy,
    CommissionRateSell,
    DailyLimitBasic,
    DailyLimitIntermediate,
    DailyLimitFull,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 7] = [
        Self::TransactionTimeoutSeconds,
        Self::FraudThreshold,
        Self::CommissionRateBuy,
        Self::CommissionRateSell,
        Self::DailyLimitBasic,
        Self::DailyLimitIntermediate,
        Self::DailyLimitFull,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TransactionTimeoutSeconds => "transaction_timeout_seconds",
            Self::FraudThreshold => "fraud_threshold",
            Self::CommissionRateBuy => "commission_rate_buy",
            Self::CommissionRateSell => "commission_rate_sell",
            Self::DailyLimitBasic => "daily_limit_basic",
            Self::DailyLimitIntermediate => "daily_limit_intermediate",
            Self::DailyLimitFull => "daily_limit_full",
        }
    }

    /// Built-in value, used when no threshold file is configured.
    pub fn default_value(&self) -> Decimal {
        match self {
            Self::TransactionTimeoutSeconds => Decimal::from(300),
            Self::FraudThreshold => Decimal::from(75),
            // 0.5%
            Self::CommissionRateBuy | Self::CommissionRateSell => Decimal::new(5, 3),
            Self::DailyLimitBasic => Decimal::from(1_000),
            Self::DailyLimitIntermediate => Decimal::from(5_000),
            Self::DailyLimitFull => Decimal::from(50_000),
        }
    }

    /// Inclusive accepted range.
    pub fn range(&self) -> (Decimal, Decimal) {
        match self {
            Self::TransactionTimeoutSeconds => (Decimal::ONE, Decimal::from(86_400)),
            Self::FraudThreshold => (Decimal::ZERO, Decimal::ONE_HUNDRED),
            Self::CommissionRateBuy | Self::CommissionRateSell => (Decimal::ZERO, Decimal::ONE),
            Self::DailyLimitBasic | Self::DailyLimitIntermediate | Self::DailyLimitFull => {
                (Decimal::ONE, Decimal::from(1_000_000_000))
            }
        }
    }

    /// Commission key charged on the given operation.
    ///
    /// Sells use the sell rate; every other operation is charged like a buy.
    pub fn commission_for(operation: OperationType) -> Self {
        match operation {
            OperationType::Sell => Self::CommissionRateSell,
            _ => Self::CommissionRateBuy,
        }
    }

    pub fn daily_limit_for(tier: VerificationTier) -> Self {
        match tier {
            VerificationTier::Basic => Self::DailyLimitBasic,
            VerificationTier::Intermediate => Self::DailyLimitIntermediate,
            VerificationTier::Full => Self::DailyLimitFull,
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or(())
    }
}
