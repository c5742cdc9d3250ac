//! Threshold registry for txops.
//!
//! Holds the process-wide tunables (transaction timeout, fraud threshold,
//! commission rates, per-tier daily limits) as an immutable, versioned
//! [`ConfigSnapshot`]. The [`ConfigRegistry`] swaps snapshots atomically on
//! reload so readers always see one consistent version.

pub mod error;
pub mod key;
pub mod registry;
pub mod snapshot;

pub use error::{ConfigError, RegistryResult};
pub use key::ConfigKey;
pub use registry::ConfigRegistry;
pub use snapshot::ConfigSnapshot;
