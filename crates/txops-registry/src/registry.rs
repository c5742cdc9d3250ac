//! Hot-reloadable registry of threshold snapshots.

use arc_swap::ArcSwap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{ConfigError, RegistryResult};
use crate::snapshot::ConfigSnapshot;

/// Process-wide owner of the current [`ConfigSnapshot`].
///
/// Readers call [`snapshot`](Self::snapshot) and keep the returned `Arc` for
/// the duration of one unit of work; a concurrent reload never changes a
/// snapshot already handed out.
pub struct ConfigRegistry {
    source: Option<PathBuf>,
    current: ArcSwap<ConfigSnapshot>,
}

impl ConfigRegistry {
    /// Load from a threshold file. Any error is fatal.
    pub fn load(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let path = path.as_ref().to_path_buf();
        let snapshot = read_snapshot(&path, 1)?;
        info!(
            path = %path.display(),
            version = snapshot.version,
            "Threshold registry loaded"
        );
        Ok(Self {
            source: Some(path),
            current: ArcSwap::from_pointee(snapshot),
        })
    }

    /// Registry without a backing file; reload keeps the current snapshot.
    pub fn from_snapshot(snapshot: ConfigSnapshot) -> Self {
        Self {
            source: None,
            current: ArcSwap::from_pointee(snapshot),
        }
    }

    pub fn with_defaults() -> Self {
        Self::from_snapshot(ConfigSnapshot::defaults(1))
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
        self.current.load_full()
    }

    pub fn version(&self) -> u64 {
        self.current.load().version
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Replace the current snapshot; the version is bumped past the current one.
    ///
    /// The bump and the store are one compare-and-swap, so concurrent swaps
    /// publish distinct versions.
    pub fn swap(&self, snapshot: ConfigSnapshot) -> Arc<ConfigSnapshot> {
        let mut installed = None;
        self.current.rcu(|current| {
            let mut next = snapshot.clone();
            next.version = current.version + 1;
            let next = Arc::new(next);
            installed = Some(Arc::clone(&next));
            next
        });
        installed.unwrap_or_else(|| self.snapshot())
    }

    /// Re-read the source file and install it.
    ///
    /// On error the current snapshot stays installed and the error is returned.
    pub fn try_reload(&self) -> RegistryResult<Arc<ConfigSnapshot>> {
        let Some(path) = &self.source else {
            return Ok(self.snapshot());
        };

        let current = self.snapshot();
        let candidate = read_snapshot(path, current.version)?;
        if candidate.values() == current.values() {
            return Ok(current);
        }

        let installed = self.swap(candidate);
        info!(version = installed.version, "Threshold registry reloaded");
        Ok(installed)
    }

    /// Reload, falling back to the last-known-good snapshot on error.
    pub fn reload(&self) -> Arc<ConfigSnapshot> {
        match self.try_reload() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let current = self.snapshot();
                warn!(
                    error = %e,
                    version = current.version,
                    "Threshold reload failed, keeping last-known-good snapshot"
                );
                current
            }
        }
    }
}

fn read_snapshot(path: &Path, version: u64) -> RegistryResult<ConfigSnapshot> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ConfigSnapshot::from_toml_str(&content, version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::ConfigKey;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn thresholds(fraud_threshold: Decimal) -> String {
        let mut snapshot = ConfigSnapshot::defaults(0);
        snapshot.set(ConfigKey::FraudThreshold, fraud_threshold).unwrap();
        snapshot.to_toml_string()
    }

    #[test]
    fn test_load_fatal_on_bad_file() {
        let file = write_file(&thresholds(dec!(75)).replace("\"75\"", "101"));
        assert!(matches!(
            ConfigRegistry::load(file.path()),
            Err(ConfigError::OutOfRange { .. })
        ));
        assert!(matches!(
            ConfigRegistry::load("/nonexistent/thresholds.toml"),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_load_fatal_on_missing_keys() {
        let file = write_file("fraud_threshold = 75");
        assert!(matches!(
            ConfigRegistry::load(file.path()),
            Err(ConfigError::Missing { .. })
        ));
        let empty = write_file("");
        assert!(matches!(
            ConfigRegistry::load(empty.path()),
            Err(ConfigError::Missing { .. })
        ));
    }

    #[test]
    fn test_reload_picks_up_changes() {
        let file = write_file(&thresholds(dec!(75)));
        let registry = ConfigRegistry::load(file.path()).unwrap();
        assert_eq!(registry.version(), 1);

        std::fs::write(file.path(), thresholds(dec!(60))).unwrap();
        let snapshot = registry.reload();
        assert_eq!(snapshot.version, 2);
        assert_eq!(snapshot.get(ConfigKey::FraudThreshold), dec!(60));
    }

    #[test]
    fn test_reload_unchanged_keeps_version() {
        let file = write_file(&thresholds(dec!(75)));
        let registry = ConfigRegistry::load(file.path()).unwrap();
        assert_eq!(registry.reload().version, 1);
    }

    #[test]
    fn test_reload_falls_back_to_last_known_good() {
        let file = write_file(&thresholds(dec!(70)));
        let registry = ConfigRegistry::load(file.path()).unwrap();
        let before = registry.snapshot();

        std::fs::write(file.path(), "fraud_threshold = \"lots\"").unwrap();
        assert!(registry.try_reload().is_err());
        let after = registry.reload();
        assert_eq!(after.version, before.version);
        assert_eq!(after.get(ConfigKey::FraudThreshold), dec!(70));
    }

    #[test]
    fn test_reload_of_truncated_file_keeps_tuned_values() {
        let file = write_file(&thresholds(dec!(60)));
        let registry = ConfigRegistry::load(file.path()).unwrap();

        std::fs::write(file.path(), "fraud_threshold = 60\n").unwrap();
        assert!(matches!(
            registry.try_reload(),
            Err(ConfigError::Missing { .. })
        ));
        let after = registry.reload();
        assert_eq!(after.version, 1);
        assert_eq!(after.get(ConfigKey::FraudThreshold), dec!(60));
    }

    #[test]
    fn test_held_snapshot_unaffected_by_swap() {
        let registry = ConfigRegistry::with_defaults();
        let held = registry.snapshot();

        let mut next = ConfigSnapshot::defaults(0);
        next.set(ConfigKey::FraudThreshold, dec!(50)).unwrap();
        let installed = registry.swap(next);

        assert_eq!(installed.version, 2);
        assert_eq!(held.fraud_threshold(), 75.0);
        assert_eq!(registry.snapshot().fraud_threshold(), 50.0);
    }

    #[test]
    fn test_concurrent_swaps_publish_distinct_versions() {
        let registry = Arc::new(ConfigRegistry::with_defaults());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    (0..50)
                        .map(|_| registry.swap(ConfigSnapshot::defaults(0)).version)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut versions: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        versions.sort_unstable();
        versions.dedup();
        assert_eq!(versions.len(), 400);
        assert_eq!(registry.version(), 401);
    }
}
