use std::fs;
use std::path::PathBuf;

use log::{info, warn};

use crate::bottle::Bottle;
use crate::config;
use crate::error::ConvergeError;
use crate::wine::WineRunner;

/// The collection of bottles under a bottles directory.
///
/// There is no process-wide instance; the composition root constructs one
/// over `config::bottles_dir()` and tests construct theirs over scratch
/// directories.
pub struct BottleManager {
    bottles_dir: PathBuf,
}

impl Default for BottleManager {
    fn default() -> Self {
        BottleManager::new(config::bottles_dir().to_owned())
    }
}

impl BottleManager {
    #[must_use]
    pub fn new(bottles_dir: PathBuf) -> BottleManager {
        BottleManager { bottles_dir }
    }

    /// All bottles, sorted by name. A missing bottles directory holds none.
    pub fn bottles(&self) -> Result<Vec<Bottle>, ConvergeError> {
        if !self.bottles_dir.exists() {
            return Ok(Vec::new());
        }

        let mut bottles = fs::read_dir(&self.bottles_dir)?
            .filter_map(|e| Some(e.ok()?.path()))
            .filter(|p| p.is_dir())
            .filter_map(|p| {
                let name = p.file_name()?.to_str()?.to_owned();
                if name.starts_with('.') {
                    return None;
                }
                Some(Bottle::new(name, p))
            })
            .collect::<Vec<_>>();

        bottles.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(bottles)
    }

    pub fn bottle(&self, name: &str) -> Result<Bottle, ConvergeError> {
        self.bottles()?
            .into_iter()
            .find(|b| b.name() == name)
            .ok_or_else(|| ConvergeError::BottleNotFound(name.to_owned()))
    }

    /// Creates a new bottle with the given name and an empty environment
    /// file. Wine fills the prefix in on first use.
    pub fn create(&self, name: &str) -> Result<Bottle, ConvergeError> {
        let path = self.bottles_dir.join(name);
        if path.exists() {
            return Err(ConvergeError::BottleAlreadyExists(name.to_owned()));
        }

        fs::create_dir_all(&path)?;
        let bottle = Bottle::new(name.to_owned(), path);
        fs::write(bottle.environment_path(), "")?;

        info!("created bottle \"{}\"", bottle.name());
        Ok(bottle)
    }

    /// Deletes the bottle and its files. The prefix is asked to shut down
    /// first; a failure there only warns, the files go away regardless.
    pub fn delete(&self, runner: &WineRunner, bottle: Bottle) -> Result<(), ConvergeError> {
        if let Err(e) = runner.run(["wineboot", "--shutdown"], Some(&bottle)) {
            warn!("could not shut down prefix for \"{}\": {e}", bottle.name());
        }

        fs::remove_dir_all(bottle.path())?;
        info!("deleted bottle \"{}\"", bottle.name());
        Ok(())
    }
}
