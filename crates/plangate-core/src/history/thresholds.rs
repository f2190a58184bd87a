//! Per-model threshold profiles.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::store::{Commit, JsonDocument};
use crate::error::Result;
use crate::gating::types::{ModelThresholds, ThresholdValues};

/// Default threshold file name inside the data directory.
pub const THRESHOLDS_FILE: &str = "model-specs.json";

/// Key of the fallback profile.
pub const DEFAULT_PROFILE: &str = "default";

/// Built-in fallback profile.
pub const DEFAULT_THRESHOLDS: ThresholdValues = ThresholdValues { warn_threshold: 50.0, split_threshold: 70.0 };

/// Maps model id to its thresholds. Always contains [`DEFAULT_PROFILE`].
pub type ThresholdDocument = BTreeMap<String, ThresholdValues>;

/// Profiles written when the threshold document does not exist yet.
pub fn builtin_profiles() -> ThresholdDocument {
    let mut profiles = ThresholdDocument::new();
    profiles.insert(DEFAULT_PROFILE.to_string(), DEFAULT_THRESHOLDS);
    profiles.insert(
        "claude-haiku-4-5-20251001".to_string(),
        ThresholdValues { warn_threshold: 40.0, split_threshold: 60.0 },
    );
    profiles.insert(
        "claude-sonnet-4-5-20250929".to_string(),
        ThresholdValues { warn_threshold: 50.0, split_threshold: 70.0 },
    );
    profiles.insert("claude-opus-4-6".to_string(), ThresholdValues { warn_threshold: 60.0, split_threshold: 80.0 });
    profiles
}

/// Reads and updates the threshold document.
pub struct ThresholdStore {
    document: JsonDocument<ThresholdDocument>,
}

impl ThresholdStore {
    /// Creates a store backed by the document at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { document: JsonDocument::new(path) }
    }

    /// Path of the threshold document.
    pub fn path(&self) -> &Path {
        self.document.path()
    }

    /// Writes `profiles` if no document exists yet. Returns true if written.
    ///
    /// The existence check and the write happen under the document lock, so a
    /// concurrent [`set`](Self::set) is never overwritten by a late seed.
    pub fn seed(&self, profiles: &ThresholdDocument) -> Result<bool> {
        let mut seeded = profiles.clone();
        seeded.entry(DEFAULT_PROFILE.to_string()).or_insert(DEFAULT_THRESHOLDS);
        for (model_id, values) in &seeded {
            ModelThresholds::from_values(model_id.clone(), *values).validate()?;
        }
        let count = seeded.len();
        let written = self.document.create_if_absent(|| seeded)?;
        if written {
            info!(path = %self.path().display(), profiles = count, "Seeded threshold profiles");
        }
        Ok(written)
    }

    /// All stored profiles, with the built-in default filled in if absent.
    pub fn all(&self) -> Result<ThresholdDocument> {
        let mut profiles = self.document.read()?;
        profiles.entry(DEFAULT_PROFILE.to_string()).or_insert(DEFAULT_THRESHOLDS);
        Ok(profiles)
    }

    /// Thresholds for `model_id`, falling back to the default profile.
    ///
    /// The returned profile keeps the requested id even when the default
    /// values were used.
    pub fn get(&self, model_id: &str) -> Result<ModelThresholds> {
        let profiles = self.all()?;
        let values = match profiles.get(model_id) {
            Some(values) => *values,
            None => {
                debug!(model_id, "No threshold profile for model, using default");
                profiles.get(DEFAULT_PROFILE).copied().unwrap_or(DEFAULT_THRESHOLDS)
            }
        };
        Ok(ModelThresholds::from_values(model_id, values))
    }

    /// Returns true if `model_id` has its own profile.
    pub fn contains(&self, model_id: &str) -> Result<bool> {
        Ok(self.document.read()?.contains_key(model_id))
    }

    /// The profile stored under `model_id` itself, without default fallback.
    pub fn stored(&self, model_id: &str) -> Result<Option<ThresholdValues>> {
        Ok(self.document.read()?.get(model_id).copied())
    }

    /// Puts back a profile captured with [`stored`](Self::stored): the old
    /// values, or no entry at all when there were none.
    pub(crate) fn restore(&self, model_id: &str, previous: Option<ThresholdValues>) -> Result<()> {
        self.document.mutate(|profiles| {
            match previous {
                Some(values) => profiles.insert(model_id.to_string(), values),
                None => profiles.remove(model_id),
            };
            Ok(((), Commit::Write))
        })?;
        info!(model_id, restored = ?previous, "Restored thresholds");
        Ok(())
    }

    /// Validates and stores a profile.
    pub fn set(&self, thresholds: &ModelThresholds) -> Result<()> {
        thresholds.validate()?;
        self.document.mutate(|profiles| {
            profiles.entry(DEFAULT_PROFILE.to_string()).or_insert(DEFAULT_THRESHOLDS);
            profiles.insert(thresholds.model_id.clone(), thresholds.values());
            Ok(((), Commit::Write))
        })?;
        info!(
            model_id = %thresholds.model_id,
            warn_threshold = thresholds.warn_threshold,
            split_threshold = thresholds.split_threshold,
            "Stored thresholds"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GateError;
    use tempfile::TempDir;

    fn store() -> (TempDir, ThresholdStore) {
        let dir = TempDir::new().unwrap();
        let store = ThresholdStore::new(dir.path().join(THRESHOLDS_FILE));
        (dir, store)
    }

    #[test]
    fn test_missing_document_uses_builtin_default() {
        let (_dir, store) = store();
        let thresholds = store.get("some-model").unwrap();
        assert_eq!(thresholds.model_id, "some-model");
        assert_eq!(thresholds.values(), DEFAULT_THRESHOLDS);
    }

    #[test]
    fn test_seed_once() {
        let (_dir, store) = store();
        assert!(store.seed(&builtin_profiles()).unwrap());
        assert!(!store.seed(&ThresholdDocument::new()).unwrap());

        let haiku = store.get("claude-haiku-4-5-20251001").unwrap();
        assert_eq!(haiku.warn_threshold, 40.0);
        assert_eq!(haiku.split_threshold, 60.0);
    }

    #[test]
    fn test_seed_rejects_invalid_profiles() {
        let (_dir, store) = store();
        let mut profiles = ThresholdDocument::new();
        profiles.insert("bad".to_string(), ThresholdValues { warn_threshold: 80.0, split_threshold: 60.0 });
        assert!(matches!(store.seed(&profiles), Err(GateError::InvalidThresholds { .. })));
    }

    #[test]
    fn test_unknown_model_uses_stored_default() {
        let (_dir, store) = store();
        store.set(&ModelThresholds::new(DEFAULT_PROFILE, 45.0, 65.0)).unwrap();
        let thresholds = store.get("unknown").unwrap();
        assert_eq!(thresholds.warn_threshold, 45.0);
        assert!(!store.contains("unknown").unwrap());
    }

    #[test]
    fn test_set_keeps_default_key() {
        let (_dir, store) = store();
        store.set(&ModelThresholds::new("m", 35.0, 55.0)).unwrap();

        let raw: ThresholdDocument =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert!(raw.contains_key(DEFAULT_PROFILE));
        assert_eq!(raw["m"].warn_threshold, 35.0);
    }

    #[test]
    fn test_set_rejects_sub_floor_values() {
        let (_dir, store) = store();
        assert!(store.set(&ModelThresholds::new("m", 25.0, 55.0)).is_err());
        assert!(store.set(&ModelThresholds::new("m", 35.0, 45.0)).is_err());
        assert!(!store.contains("m").unwrap());
    }

    #[test]
    fn test_document_uses_snake_case_keys() {
        let (_dir, store) = store();
        store.set(&ModelThresholds::new("m", 35.0, 55.0)).unwrap();
        let content = std::fs::read_to_string(store.path()).unwrap();
        assert!(content.contains("\"warn_threshold\""));
        assert!(content.contains("\"split_threshold\""));
    }

    #[test]
    fn test_restore_puts_back_previous_state() {
        let (_dir, store) = store();
        store.set(&ModelThresholds::new("m", 45.0, 65.0)).unwrap();
        store.set(&ModelThresholds::new("m", 40.0, 60.0)).unwrap();
        store.restore("m", Some(ThresholdValues { warn_threshold: 45.0, split_threshold: 65.0 })).unwrap();
        assert_eq!(store.get("m").unwrap().warn_threshold, 45.0);

        store.set(&ModelThresholds::new("fresh", 45.0, 65.0)).unwrap();
        store.restore("fresh", None).unwrap();
        assert_eq!(store.stored("fresh").unwrap(), None);
        assert!(store.stored(DEFAULT_PROFILE).unwrap().is_some());
    }

    #[test]
    fn test_racing_seed_never_drops_stored_profile() {
        for _ in 0..50 {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join(THRESHOLDS_FILE);

            let seeder = {
                let path = path.clone();
                std::thread::spawn(move || {
                    let store = ThresholdStore::new(path);
                    for _ in 0..5 {
                        store.seed(&builtin_profiles()).unwrap();
                    }
                })
            };
            let store = ThresholdStore::new(&path);
            store.seed(&builtin_profiles()).unwrap();
            store.set(&ModelThresholds::new("m", 35.0, 55.0)).unwrap();
            seeder.join().unwrap();

            let stored = store.stored("m").unwrap();
            assert_eq!(stored, Some(ThresholdValues { warn_threshold: 35.0, split_threshold: 55.0 }));
        }
    }
}
