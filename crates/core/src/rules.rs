use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::error::CoreError;
use crate::ids::SeriesKey;

/// Weapon series that may not share a party.
///
/// Each group is a set of series keys; two weapons conflict when one group
/// contains both of their series. A group of one is an exclusive series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRules {
    pub exclusion_groups: Vec<BTreeSet<SeriesKey>>,
}

impl Default for ConflictRules {
    fn default() -> Self {
        let groups: &[&[&str]] = &[
            &["opus", "draconic"],
            &["ultima"],
            &["astral"],
            &["superlative"],
            &["class-champion"],
            &["draconic-providence"],
        ];
        Self {
            exclusion_groups: groups
                .iter()
                .map(|group| group.iter().map(|s| SeriesKey::from(*s)).collect())
                .collect(),
        }
    }
}

impl ConflictRules {
    pub fn none() -> Self {
        Self { exclusion_groups: Vec::new() }
    }

    pub fn from_json_str(json: &str) -> Result<Self, CoreError> {
        let rules: Self = serde_json::from_str(json)
            .map_err(|e| CoreError::InvalidConfig(e.to_string()))?;
        rules.validate()?;
        Ok(rules)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| CoreError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    fn validate(&self) -> Result<(), CoreError> {
        if let Some(index) = self.exclusion_groups.iter().position(|g| g.is_empty()) {
            return Err(CoreError::InvalidConfig(format!("exclusion group {index} is empty")));
        }
        Ok(())
    }

    pub fn is_exclusive(&self, series: &SeriesKey) -> bool {
        self.exclusion_groups.iter().any(|g| g.contains(series))
    }

    /// Whether weapons of series `a` and `b` may not both be equipped.
    pub fn excludes(&self, a: &SeriesKey, b: &SeriesKey) -> bool {
        self.exclusion_groups
            .iter()
            .any(|g| g.contains(a) && g.contains(b))
    }
}
