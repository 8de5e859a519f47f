//! State diff model consumed by the lifecycle engine.
//!
//! The diff itself is computed by an external collaborator; the engine only
//! looks at the actions each entry says are needed. An entry without needed
//! actions is converged.

use serde::{Deserialize, Deserializer, Serialize};

/// Action needed to bring a dogu or component to its expected state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    /// Install a missing dogu or component.
    Install,
    /// Remove an installed dogu or component.
    Uninstall,
    /// Move to a newer version.
    Upgrade,
    /// Move to an older version.
    Downgrade,
    /// Move a dogu to another namespace.
    SwitchDoguNamespace,
    /// Move a component to another namespace.
    SwitchComponentNamespace,
    /// Change the deploy config of a component.
    UpdateComponentDeployConfig,
    /// Change the minimum volume size of a dogu.
    UpdateDoguVolumeSize,
    /// Change the reverse proxy body size of a dogu.
    UpdateDoguProxyBodySize,
    /// Change the additional mounts of a dogu.
    UpdateDoguAdditionalMounts,
}

/// Action needed to bring a config entry to its expected value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigAction {
    /// Write the expected value.
    Set,
    /// Delete the entry.
    Remove,
}

/// Observed or expected state of a dogu.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DoguSnapshot {
    /// Namespace the dogu lives in.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Installed or requested version.
    #[serde(default)]
    pub version: Option<String>,
    /// Whether the dogu is (or should be) installed.
    #[serde(default)]
    pub installed: bool,
}

/// Observed or expected state of a component.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSnapshot {
    /// Namespace the component is deployed from.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Installed or requested version.
    #[serde(default)]
    pub version: Option<String>,
    /// Whether the component is (or should be) installed.
    #[serde(default)]
    pub installed: bool,
}

/// Observed or expected value of a config entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigSnapshot {
    /// The value, `None` if the entry is absent.
    #[serde(default)]
    pub value: Option<String>,
}

/// Difference between actual and expected state of one named resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(
    rename_all = "camelCase",
    bound(deserialize = "S: Deserialize<'de> + Default, A: Deserialize<'de> + PartialEq")
)]
pub struct DiffEntry<S, A> {
    /// Name of the dogu, component or config key.
    pub name: String,
    /// Observed state.
    #[serde(default)]
    pub actual: S,
    /// Desired state.
    #[serde(default)]
    pub expected: S,
    /// Actions needed to converge, in execution order and without duplicates.
    #[serde(default, deserialize_with = "deserialize_unique")]
    pub needed_actions: Vec<A>,
}

/// Diff of a single dogu.
pub type DoguDiff = DiffEntry<DoguSnapshot, Action>;

/// Diff of a single component.
pub type ComponentDiff = DiffEntry<ComponentSnapshot, Action>;

/// Diff of a single config entry.
pub type ConfigDiff = DiffEntry<ConfigSnapshot, ConfigAction>;

/// Complete state diff of a blueprint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StateDiff {
    /// Dogu diffs.
    #[serde(default)]
    pub dogu_diffs: Vec<DoguDiff>,
    /// Component diffs.
    #[serde(default)]
    pub component_diffs: Vec<ComponentDiff>,
    /// Config diffs.
    #[serde(default)]
    pub config_diffs: Vec<ConfigDiff>,
}

impl<S, A: PartialEq + Copy> DiffEntry<S, A> {
    /// Creates a diff entry, dropping repeated actions but keeping their order.
    #[must_use]
    pub fn new(name: impl Into<String>, actual: S, expected: S, actions: &[A]) -> Self {
        Self {
            name: name.into(),
            actual,
            expected,
            needed_actions: unique(actions.iter().copied()),
        }
    }

    /// Returns true if this entry still needs actions.
    #[must_use]
    pub const fn has_changes(&self) -> bool {
        !self.needed_actions.is_empty()
    }
}

/// Collects actions, dropping repeats but keeping the first occurrence.
fn unique<A: PartialEq>(actions: impl IntoIterator<Item = A>) -> Vec<A> {
    let mut kept: Vec<A> = Vec::new();
    for action in actions {
        if !kept.contains(&action) {
            kept.push(action);
        }
    }
    kept
}

fn deserialize_unique<'de, D, A>(deserializer: D) -> std::result::Result<Vec<A>, D::Error>
where
    D: Deserializer<'de>,
    A: Deserialize<'de> + PartialEq,
{
    Vec::<A>::deserialize(deserializer).map(unique)
}

/// Returns true if any entry of the collection needs actions.
#[must_use]
pub fn has_changes<S, A: PartialEq + Copy>(entries: &[DiffEntry<S, A>]) -> bool {
    entries.iter().any(DiffEntry::has_changes)
}

/// Counts needed actions per action across a collection, in first-seen order.
#[must_use]
pub fn count_actions<S, A: PartialEq + Copy>(entries: &[DiffEntry<S, A>]) -> Vec<(A, usize)> {
    let mut counts: Vec<(A, usize)> = Vec::new();
    for action in entries.iter().flat_map(|e| e.needed_actions.iter()) {
        if let Some(entry) = counts.iter_mut().find(|(a, _)| a == action) {
            entry.1 += 1;
        } else {
            counts.push((*action, 1));
        }
    }
    counts
}

impl StateDiff {
    /// Returns true if dogus need changes.
    #[must_use]
    pub fn dogus_have_changes(&self) -> bool {
        has_changes(&self.dogu_diffs)
    }

    /// Returns true if components need changes.
    #[must_use]
    pub fn components_have_changes(&self) -> bool {
        has_changes(&self.component_diffs)
    }

    /// Returns true if config entries need changes.
    #[must_use]
    pub fn config_has_changes(&self) -> bool {
        has_changes(&self.config_diffs)
    }

    /// Returns true if anything needs changes.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.dogus_have_changes() || self.components_have_changes() || self.config_has_changes()
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Install => "install",
            Self::Uninstall => "uninstall",
            Self::Upgrade => "upgrade",
            Self::Downgrade => "downgrade",
            Self::SwitchDoguNamespace => "switch-dogu-namespace",
            Self::SwitchComponentNamespace => "switch-component-namespace",
            Self::UpdateComponentDeployConfig => "update-component-deploy-config",
            Self::UpdateDoguVolumeSize => "update-dogu-volume-size",
            Self::UpdateDoguProxyBodySize => "update-dogu-proxy-body-size",
            Self::UpdateDoguAdditionalMounts => "update-dogu-additional-mounts",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for ConfigAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Set => "set",
            Self::Remove => "remove",
        };
        write!(f, "{s}")
    }
}
