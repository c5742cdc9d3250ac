//! Identifiers and enumerations shared across the engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Transaction identifier assigned by the upstream processing system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(u64);

impl TransactionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx#{}", self.0)
    }
}

/// User identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(u64);

impl UserId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user#{}", self.0)
    }
}

/// Asset symbol (e.g. "BTC", "USDT").
///
/// Symbols are normalized to upper case so "btc" and "BTC" aggregate together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Asset(String);

impl Asset {
    pub fn new(symbol: impl AsRef<str>) -> Self {
        Self(symbol.as_ref().trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Asset {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for Asset {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<Asset> for String {
    fn from(asset: Asset) -> Self {
        asset.0
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of operation a transaction performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Purchase,
    Sell,
    Swap,
    Transfer,
    Withdrawal,
}

impl OperationType {
    pub const ALL: [OperationType; 5] = [
        Self::Purchase,
        Self::Sell,
        Self::Swap,
        Self::Transfer,
        Self::Withdrawal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Sell => "sell",
            Self::Swap => "swap",
            Self::Transfer => "transfer",
            Self::Withdrawal => "withdrawal",
        }
    }

    /// Dense index for fixed-size per-operation counters.
    pub fn index(&self) -> usize {
        match self {
            Self::Purchase => 0,
            Self::Sell => 1,
            Self::Swap => 2,
            Self::Transfer => 3,
            Self::Withdrawal => 4,
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "purchase" | "buy" => Ok(Self::Purchase),
            "sell" => Ok(Self::Sell),
            "swap" => Ok(Self::Swap),
            "transfer" => Ok(Self::Transfer),
            "withdrawal" => Ok(Self::Withdrawal),
            other => Err(CoreError::UnknownVariant {
                kind: "operation type",
                value: other.to_string(),
            }),
        }
    }
}

/// Lifecycle status of a transaction.
///
/// `Pending -> Processing -> {Successful, Failed, Cancelled}`; the last three
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Processing,
    Successful,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Successful | Self::Failed | Self::Cancelled)
    }

    /// Position in the lifecycle; transitions must move strictly forward.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Processing => 1,
            Self::Successful | Self::Failed | Self::Cancelled => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Successful => "successful",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment method used to fund the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    BankTransfer,
    Card,
    CryptoWallet,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BankTransfer => "bank_transfer",
            Self::Card => "card",
            Self::CryptoWallet => "crypto_wallet",
        }
    }
}

/// KYC verification tier; selects the user's daily limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationTier {
    #[default]
    Basic,
    Intermediate,
    Full,
}

impl VerificationTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Intermediate => "intermediate",
            Self::Full => "full",
        }
    }
}

impl fmt::Display for VerificationTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operational state of an hour bucket relative to its baseline.
///
/// Variants are listed in classification priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Bottleneck,
    Slow,
    HighErrorRate,
    Normal,
}

impl Classification {
    pub const ALL: [Classification; 4] = [
        Self::Bottleneck,
        Self::Slow,
        Self::HighErrorRate,
        Self::Normal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bottleneck => "bottleneck",
            Self::Slow => "slow",
            Self::HighErrorRate => "high_error_rate",
            Self::Normal => "normal",
        }
    }

    #[must_use]
    pub fn is_anomalous(&self) -> bool {
        !matches!(self, Self::Normal)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
