use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::bottlemanager::BottleManager;
use crate::error::ConvergeError;

/// An isolated Wine prefix managed by converge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bottle {
    name: String,
    path: PathBuf,
}

impl std::str::FromStr for Bottle {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        for bottle in BottleManager::default().bottles().map_err(|e| anyhow!(e))? {
            if bottle.name() == s {
                return Ok(bottle);
            }
        }

        Err(anyhow!("bottle not found"))
    }
}

impl Bottle {
    pub(crate) fn new(name: String, path: PathBuf) -> Bottle {
        Bottle { name, path }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The Windows filesystem root of the prefix. Wine creates it on the
    /// bottle's first use.
    #[must_use]
    pub fn drive_c(&self) -> PathBuf {
        self.path.join("drive_c")
    }

    #[must_use]
    pub fn environment_path(&self) -> PathBuf {
        self.path.join("environment.toml")
    }

    /// Reads the bottle's persisted environment overrides. A missing or
    /// unreadable file is an empty environment.
    #[must_use]
    pub fn environment(&self) -> Environment {
        let Ok(string) = fs::read_to_string(self.environment_path()) else {
            return Environment::default();
        };

        toml::from_str(&string).unwrap_or_default()
    }

    /// Merges the given overrides into the stored environment, new values
    /// winning, and rewrites the file.
    pub fn set_environment(&self, overrides: Environment) -> Result<(), ConvergeError> {
        let mut environment = self.environment();
        environment.merge(overrides);

        let string = match toml::to_string(&environment) {
            Ok(s) => s,
            Err(e) => return Err(ConvergeError::Other(e.to_string())),
        };

        fs::write(self.environment_path(), string).map_err(ConvergeError::from)
    }

    pub fn set_environment_variable(&self, key: &str, value: &str) -> Result<(), ConvergeError> {
        let mut overrides = Environment::default();
        overrides.insert(key, value);
        self.set_environment(overrides)
    }

    #[must_use]
    pub fn environment_variable(&self, key: &str) -> Option<String> {
        self.environment().get(key).map(str::to_owned)
    }
}

/// Environment variables applied to every Wine process started in a bottle,
/// persisted as a TOML table next to the prefix.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Environment(HashMap<String, String>);

impl Environment {
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn merge(&mut self, other: Environment) {
        self.0.extend(other.0);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scratch_bottle() -> (TempDir, Bottle) {
        let dir = tempfile::tempdir().unwrap();
        let bottle = Bottle::new("Test".to_owned(), dir.path().join("Test"));
        fs::create_dir_all(bottle.path()).unwrap();
        (dir, bottle)
    }

    #[test]
    fn environment_defaults_to_empty() {
        let (_dir, bottle) = scratch_bottle();
        assert!(bottle.environment().is_empty());
        assert_eq!(bottle.environment_variable("WINEESYNC"), None);
    }

    #[test]
    fn environment_variables_round_trip() {
        let (_dir, bottle) = scratch_bottle();
        bottle.set_environment_variable("WINEESYNC", "1").unwrap();
        bottle.set_environment_variable("MTL_HUD_ENABLED", "0").unwrap();

        assert_eq!(bottle.environment_variable("WINEESYNC").as_deref(), Some("1"));
        assert_eq!(
            bottle.environment_variable("MTL_HUD_ENABLED").as_deref(),
            Some("0")
        );
    }

    #[test]
    fn merge_prefers_new_values() {
        let (_dir, bottle) = scratch_bottle();
        bottle.set_environment_variable("WINEESYNC", "0").unwrap();
        bottle.set_environment_variable("WINEESYNC", "1").unwrap();
        assert_eq!(bottle.environment_variable("WINEESYNC").as_deref(), Some("1"));
    }

    #[test]
    fn garbage_environment_file_reads_as_empty() {
        let (_dir, bottle) = scratch_bottle();
        fs::write(bottle.environment_path(), "not { valid toml").unwrap();
        assert!(bottle.environment().is_empty());
    }
}
