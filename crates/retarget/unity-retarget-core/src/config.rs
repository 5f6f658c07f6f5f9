//! Import options for `build_action`.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::path_hash::{path_hash, PathHash};
use crate::special::SpecialChannelConfig;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingMode {
    /// Trust a caller-supplied `hash -> path` table.
    Explicit,
    /// Rebuild the hash index from the skeleton's current hierarchy.
    #[default]
    Inferred,
}

/// Explicit `path hash -> full path` table (e.g. from a source avatar).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PathTable {
    pub paths: HashMap<PathHash, String>,
}

impl PathTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table whose keys are the CRC-32 of each path.
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let paths = paths
            .into_iter()
            .map(|p| {
                let p = p.into();
                (path_hash(&p), p)
            })
            .collect();
        Self { paths }
    }

    pub fn insert(&mut self, hash: PathHash, path: impl Into<String>) {
        self.paths.insert(hash, path.into());
    }

    pub fn get(&self, hash: PathHash) -> Option<&str> {
        self.paths.get(&hash).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Configuration for one clip import.
/// Keep this minimal; runtime-only hooks live in `ImportHooks`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    pub binding_mode: BindingMode,
    /// Required when `binding_mode` is `Explicit`.
    pub explicit_table: Option<PathTable>,
    /// Restricts inferred traversal to the subtree below this joint.
    pub root_joint_name: Option<String>,
    /// Frames per second; defaults to the target action's rate, then the clip's.
    pub sample_rate_override: Option<f32>,
    /// Debug aid: degrade every Bezier segment to linear.
    pub always_linear: bool,
    /// Existing action to append into.
    #[serde(skip)]
    pub append_to_action: Option<Action>,
    pub special: SpecialChannelConfig,
    /// Name of a newly created action; defaults to the clip name.
    pub action_name: Option<String>,
}

impl ImportOptions {
    pub fn explicit(table: PathTable) -> Self {
        Self {
            binding_mode: BindingMode::Explicit,
            explicit_table: Some(table),
            ..Default::default()
        }
    }

    pub fn with_root_joint(mut self, name: impl Into<String>) -> Self {
        self.root_joint_name = Some(name.into());
        self
    }

    pub fn with_special(mut self, special: SpecialChannelConfig) -> Self {
        self.special = special;
        self
    }

    pub fn appending_to(mut self, action: Action) -> Self {
        self.append_to_action = Some(action);
        self
    }
}
