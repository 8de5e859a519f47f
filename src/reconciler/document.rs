//! Blueprint documents read by the command line tools.
//!
//! A document bundles a blueprint identifier, its policy flags and a
//! precomputed state diff:
//!
//! ```yaml
//! id: blueprint-1
//! config:
//!   allowDoguNamespaceSwitch: false
//! stateDiff:
//!   doguDiffs:
//!     - name: official/cas
//!       neededActions: [install]
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::domain::{BlueprintConfig, BlueprintSpec, StateDiff};
use crate::error::{BlueprintError, ErrorKind, Result};
use crate::state::BlueprintRepository;

/// A blueprint together with its precomputed state diff.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BlueprintDocument {
    /// Blueprint identifier.
    pub id: String,
    /// Policy flags.
    #[serde(default)]
    pub config: BlueprintConfig,
    /// State diff to evaluate.
    #[serde(default)]
    pub state_diff: StateDiff,
}

impl BlueprintDocument {
    /// Reads a document from a YAML or JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid document.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|e| {
            BlueprintError::invalid_blueprint(format!("{}: {e}", path.display()))
        })
    }

    /// Parses a document from YAML (JSON is accepted as well).
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not a valid document.
    pub fn parse(content: &str) -> Result<Self> {
        let document: Self = serde_yaml::from_str(content)
            .map_err(|e| BlueprintError::invalid_blueprint(format!("cannot parse document: {e}")))?;

        if document.id.trim().is_empty() {
            return Err(BlueprintError::invalid_blueprint("document has an empty id"));
        }

        debug!(blueprint = %document.id, "parsed blueprint document");
        Ok(document)
    }

    /// Creates a fresh aggregate for this document.
    #[must_use]
    pub fn to_spec(&self) -> BlueprintSpec {
        BlueprintSpec::new(self.id.clone(), self.config.clone())
    }

    /// Stores the blueprint unless the repository already holds it.
    ///
    /// An existing blueprint keeps its conditions and events; only its config
    /// is replaced when it differs from the document.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be read or written.
    pub async fn import(&self, repository: &dyn BlueprintRepository) -> Result<BlueprintSpec> {
        match repository.get(&self.id).await {
            Ok(mut spec) => {
                if spec.config != self.config {
                    spec.config = self.config.clone();
                    repository.update(&mut spec).await?;
                    info!(blueprint = %self.id, "updated stored blueprint config");
                }
                Ok(spec)
            }
            Err(err) if matches!(err.kind(), ErrorKind::NotFound { .. }) => {
                let mut spec = self.to_spec();
                repository.create(&mut spec).await?;
                info!(blueprint = %self.id, "imported blueprint");
                Ok(spec)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Action, ConfigAction};
    use crate::state::LocalBlueprintRepository;
    use tempfile::TempDir;

    #[test]
    fn test_parse_document() {
        let yaml = r"
id: blueprint-1
config:
  allowDoguNamespaceSwitch: true
stateDiff:
  doguDiffs:
    - name: official/cas
      actual: { installed: false }
      expected: { installed: true, version: 7.0.5 }
      neededActions: [install]
  configDiffs:
    - name: global/fqdn
      expected: { value: ces.local }
      neededActions: [set]
";
        let document = BlueprintDocument::parse(yaml).expect("document should parse");

        assert_eq!(document.id, "blueprint-1");
        assert!(document.config.allow_dogu_namespace_switch);
        assert_eq!(document.state_diff.dogu_diffs[0].needed_actions, vec![Action::Install]);
        assert_eq!(document.state_diff.config_diffs[0].needed_actions, vec![ConfigAction::Set]);
        assert!(document.state_diff.component_diffs.is_empty());
    }

    #[test]
    fn test_document_with_config_diffs_survives_yaml() {
        let yaml = r"
id: blueprint-1
stateDiff:
  componentDiffs:
    - name: k8s/k8s-dogu-operator
      neededActions: [upgrade, upgrade]
  configDiffs:
    - name: global/fqdn
      actual: { value: old.local }
      expected: { value: ces.local }
      neededActions: [set]
    - name: global/admin_group
      neededActions: [remove]
";
        let document = BlueprintDocument::parse(yaml).expect("document should parse");
        assert_eq!(document.state_diff.component_diffs[0].needed_actions, vec![Action::Upgrade]);
        assert_eq!(document.state_diff.config_diffs[1].needed_actions, vec![ConfigAction::Remove]);

        let written = serde_yaml::to_string(&document).expect("document should serialize");
        let reread = BlueprintDocument::parse(&written).expect("written document should parse");

        assert_eq!(reread, document);
    }

    #[test]
    fn test_empty_id_is_invalid() {
        let err = BlueprintDocument::parse("id: ''").expect_err("should fail");
        assert!(err.to_string().contains("empty id"));
    }

    #[test]
    fn test_unknown_action_is_invalid() {
        let yaml = r"
id: blueprint-1
stateDiff:
  doguDiffs:
    - name: official/cas
      neededActions: [explode]
";
        assert!(BlueprintDocument::parse(yaml).is_err());
    }

    #[tokio::test]
    async fn test_import_creates_then_keeps_existing() {
        let temp = TempDir::new().expect("temp dir");
        let repository = LocalBlueprintRepository::with_base_dir(temp.path());
        let mut document = BlueprintDocument::parse("id: blueprint-1").expect("document");

        let created = document.import(&repository).await.expect("import");
        assert!(created.is_persisted());

        let mut stored = repository.get("blueprint-1").await.expect("stored");
        stored.evaluate_state_diff(crate::domain::ApplyAxis::Dogus, None);
        repository.update(&mut stored).await.expect("update");

        document.config.dry_run = true;
        let imported = document.import(&repository).await.expect("re-import");

        assert!(imported.config.dry_run);
        assert_eq!(imported.conditions.len(), 1);
        assert!(repository.get("blueprint-1").await.expect("stored").config.dry_run);
    }
}
