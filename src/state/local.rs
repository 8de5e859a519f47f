//! Local file-based blueprint repository.
//!
//! Every blueprint is stored as one JSON document in the state directory. The
//! resource version of a blueprint is the SHA-256 of its stored document.

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domain::{BlueprintSpec, ResourceVersion};
use crate::error::{BlueprintError, Result, StateError};

use super::store::BlueprintRepository;
use super::types::{BlueprintRecord, RecordedEvent, FORMAT_VERSION};
use super::version::version_of;

/// Default state directory name.
pub const STATE_DIR: &str = ".blueprint";

/// Extension of blueprint documents.
const RECORD_EXTENSION: &str = "json";

/// Local file-based blueprint repository.
#[derive(Debug)]
pub struct LocalBlueprintRepository {
    /// Directory holding one document per blueprint.
    base_dir: PathBuf,
    /// Serializes read-compare-write cycles.
    write_lock: Mutex<()>,
}

impl LocalBlueprintRepository {
    /// Creates a repository in `.blueprint` below the current directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory cannot be determined.
    pub fn new() -> Result<Self> {
        let base_dir = std::env::current_dir()
            .map_err(|e| BlueprintError::internal(format!("Cannot determine current directory: {e}")))?
            .join(STATE_DIR);

        Ok(Self::with_base_dir(base_dir))
    }

    /// Creates a repository with a custom state directory.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the state directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn record_path(&self, id: &str) -> Result<PathBuf> {
        validate_id(id)?;
        Ok(self.base_dir.join(format!("{id}.{RECORD_EXTENSION}")))
    }

    /// Ensures the state directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if !self.base_dir.exists() {
            debug!("Creating state directory: {}", self.base_dir.display());
            fs::create_dir_all(&self.base_dir).await.map_err(|e| {
                StateError::backend(format!("Failed to create state directory: {e}"))
            })?;
        }
        Ok(())
    }

    /// Reads a stored record together with its resource version.
    async fn read_record(&self, id: &str) -> Result<(BlueprintRecord, ResourceVersion)> {
        let path = self.record_path(id)?;
        if !path.exists() {
            return Err(StateError::NotFound { id: id.to_string() }.into());
        }

        let content = fs::read(&path).await.map_err(|e| StateError::Corrupted {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;

        let record: BlueprintRecord =
            serde_json::from_slice(&content).map_err(|e| StateError::Corrupted {
                message: format!("Failed to parse {}: {e}", path.display()),
            })?;

        if record.format_version != FORMAT_VERSION {
            return Err(StateError::VersionMismatch {
                expected: FORMAT_VERSION.to_string(),
                found: record.format_version,
            }
            .into());
        }

        Ok((record, version_of(&content)))
    }

    /// Writes a record atomically and returns its new resource version.
    async fn write_record(&self, record: &BlueprintRecord) -> Result<ResourceVersion> {
        self.ensure_dir().await?;
        let path = self.record_path(&record.id)?;

        let content = serde_json::to_vec_pretty(record)
            .map_err(|e| StateError::serialization(format!("Failed to serialize blueprint: {e}")))?;

        let temp_path = path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            StateError::backend(format!("Failed to create temp file: {e}"))
        })?;
        file.write_all(&content)
            .await
            .map_err(|e| StateError::backend(format!("Failed to write blueprint: {e}")))?;
        file.sync_all()
            .await
            .map_err(|e| StateError::backend(format!("Failed to sync blueprint: {e}")))?;

        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| StateError::backend(format!("Failed to rename blueprint file: {e}")))?;

        Ok(version_of(&content))
    }
}

#[async_trait]
impl BlueprintRepository for LocalBlueprintRepository {
    async fn get(&self, id: &str) -> Result<BlueprintSpec> {
        let (record, version) = self.read_record(id).await?;
        debug!(blueprint = %id, version = %version.as_str(), "loaded blueprint");

        let mut spec = record.to_spec();
        spec.set_resource_version(version);
        Ok(spec)
    }

    async fn create(&self, spec: &mut BlueprintSpec) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        if self.record_path(&spec.id)?.exists() {
            return Err(StateError::AlreadyExists { id: spec.id.clone() }.into());
        }

        let mut record = BlueprintRecord::from_spec(spec);
        record.append_events(spec.events(), Utc::now());
        let version = self.write_record(&record).await?;

        info!(blueprint = %spec.id, "created blueprint");
        spec.set_resource_version(version);
        spec.drain_events();
        Ok(())
    }

    async fn update(&self, spec: &mut BlueprintSpec) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let expected = spec.resource_version()?.clone();
        let (stored, found) = self.read_record(&spec.id).await?;
        if found != expected {
            return Err(StateError::Conflict {
                id: spec.id.clone(),
                expected: expected.as_str().to_string(),
                found: found.as_str().to_string(),
            }
            .into());
        }

        let mut record = BlueprintRecord::from_spec(spec);
        record.events = stored.events;
        record.append_events(spec.events(), Utc::now());
        let version = self.write_record(&record).await?;

        let published = spec.drain_events();
        debug!(
            blueprint = %spec.id,
            events = published.len(),
            "updated blueprint status"
        );
        spec.set_resource_version(version);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&self.base_dir)
            .await
            .map_err(|e| StateError::backend(format!("Failed to read state directory: {e}")))?;

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StateError::backend(format!("Failed to read state directory: {e}")))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }

        ids.sort();
        Ok(ids)
    }

    async fn recorded_events(&self, id: &str) -> Result<Vec<RecordedEvent>> {
        let (record, _) = self.read_record(id).await?;
        Ok(record.events)
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}

/// Rejects identifiers that cannot be used as file names.
fn validate_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(BlueprintError::invalid_blueprint(format!(
            "'{id}' is not a valid blueprint id. Use letters, digits, '-', '_' and '.'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BlueprintConfig, BlueprintEvent, ConditionStatus, ConditionType};
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn create_test_repository() -> (LocalBlueprintRepository, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let repository = LocalBlueprintRepository::with_base_dir(temp_dir.path().join("state"));
        (repository, temp_dir)
    }

    async fn create_blueprint(repository: &LocalBlueprintRepository, id: &str) -> BlueprintSpec {
        let mut spec = BlueprintSpec::new(id, BlueprintConfig::default());
        repository.create(&mut spec).await.expect("Failed to create blueprint");
        spec
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (repository, _temp) = create_test_repository();
        let created = create_blueprint(&repository, "blueprint-1").await;

        let loaded = repository.get("blueprint-1").await.expect("Failed to load");

        assert_eq!(loaded.id, "blueprint-1");
        assert!(loaded.is_persisted());
        assert_eq!(
            loaded.resource_version().ok(),
            created.resource_version().ok()
        );
    }

    #[tokio::test]
    async fn test_get_missing_is_permanent_not_found() {
        let (repository, _temp) = create_test_repository();

        let err = repository.get("missing").await.expect_err("should not exist");

        assert_eq!(err.kind(), ErrorKind::NotFound { retryable: false });
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let (repository, _temp) = create_test_repository();
        create_blueprint(&repository, "blueprint-1").await;

        let mut again = BlueprintSpec::new("blueprint-1", BlueprintConfig::default());
        let err = repository.create(&mut again).await.expect_err("should exist");

        assert!(matches!(err, BlueprintError::State(StateError::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn test_update_publishes_and_drains_events() {
        let (repository, _temp) = create_test_repository();
        create_blueprint(&repository, "blueprint-1").await;
        let mut spec = repository.get("blueprint-1").await.expect("Failed to load");

        assert!(spec.complete());
        repository.update(&mut spec).await.expect("Failed to update");

        assert!(spec.events().is_empty());
        let events = repository
            .recorded_events("blueprint-1")
            .await
            .expect("Failed to read events");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "BlueprintApplied");

        let reloaded = repository.get("blueprint-1").await.expect("Failed to load");
        assert!(reloaded.conditions.is_true(ConditionType::Completed));
    }

    #[tokio::test]
    async fn test_stale_update_conflicts_and_keeps_events() {
        let (repository, _temp) = create_test_repository();
        create_blueprint(&repository, "blueprint-1").await;
        let mut first = repository.get("blueprint-1").await.expect("Failed to load");
        let mut second = repository.get("blueprint-1").await.expect("Failed to load");

        first.start_apply_config();
        repository.update(&mut first).await.expect("Failed to update");

        second.complete();
        let err = repository.update(&mut second).await.expect_err("should conflict");

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(second.events(), &[BlueprintEvent::Completed]);
        let stored = repository.get("blueprint-1").await.expect("Failed to load");
        assert_eq!(
            stored
                .conditions
                .get(ConditionType::ConfigApplied)
                .map(|c| c.status),
            Some(ConditionStatus::False)
        );
        assert!(!stored.conditions.is_true(ConditionType::Completed));
    }

    #[tokio::test]
    async fn test_update_without_resource_version_is_internal() {
        let (repository, _temp) = create_test_repository();
        let mut spec = BlueprintSpec::new("blueprint-1", BlueprintConfig::default());

        let err = repository.update(&mut spec).await.expect_err("no version");

        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[tokio::test]
    async fn test_list_returns_sorted_ids() {
        let (repository, _temp) = create_test_repository();
        assert!(repository.list().await.expect("list failed").is_empty());

        create_blueprint(&repository, "zeta").await;
        create_blueprint(&repository, "alpha").await;

        assert_eq!(
            repository.list().await.expect("list failed"),
            vec![String::from("alpha"), String::from("zeta")]
        );
    }

    #[tokio::test]
    async fn test_invalid_id_is_rejected() {
        let (repository, _temp) = create_test_repository();

        let err = repository.get("../escape").await.expect_err("invalid id");

        assert_eq!(err.kind(), ErrorKind::InvalidBlueprint);
    }
}
