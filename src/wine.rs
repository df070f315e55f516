use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use log::{debug, info, warn};

use crate::bottle::Bottle;
use crate::error::ConvergeError;

/// Invokes the managed Wine binary against a bottle.
pub struct WineRunner {
    wine_binary: PathBuf,
}

/// A running Wine process.
///
/// The caller owns the child's lifetime: `wait` blocks until it exits, `kill`
/// ends it, and dropping the handle leaves it running.
pub struct WineProcess {
    child: Child,
}

impl WineProcess {
    #[must_use]
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    pub fn wait(mut self) -> Result<(), ConvergeError> {
        let status = self.child.wait().map_err(|_| ConvergeError::ChildFailed)?;
        if status.success() {
            Ok(())
        } else {
            Err(ConvergeError::ChildFailed)
        }
    }

    pub fn kill(mut self) -> Result<(), ConvergeError> {
        self.child.kill()?;
        let _ = self.child.wait();
        Ok(())
    }
}

impl WineRunner {
    #[must_use]
    pub fn new(wine_binary: PathBuf) -> WineRunner {
        WineRunner { wine_binary }
    }

    /// The environment a Wine process is started with: the inherited process
    /// environment, `PATH` pointed at the managed toolchain, `WINEPREFIX`
    /// pointed at the bottle, and finally the bottle's own overrides.
    fn environment(&self, bottle: Option<&Bottle>) -> HashMap<String, String> {
        let mut env = HashMap::new();

        if let Some(bin_dir) = self.wine_binary.parent() {
            env.insert("PATH".to_owned(), bin_dir.to_string_lossy().into_owned());
        }

        if let Some(bottle) = bottle {
            env.insert(
                "WINEPREFIX".to_owned(),
                bottle.path().to_string_lossy().into_owned(),
            );

            for (key, value) in bottle.environment().iter() {
                env.insert(key.to_owned(), value.to_owned());
            }
        }

        env
    }

    fn command<I, S>(&self, args: I, bottle: Option<&Bottle>) -> Result<Command, ConvergeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        if !self.wine_binary.exists() {
            return Err(ConvergeError::WineNotInstalled);
        }

        let mut command = Command::new(&self.wine_binary);
        command.args(args);
        command.envs(self.environment(bottle));
        Ok(command)
    }

    /// Starts wine with inherited stdio and hands the child back to the
    /// caller, who may wait on it, kill it, or let it run.
    pub fn spawn<I, S>(&self, args: I, bottle: Option<&Bottle>) -> Result<WineProcess, ConvergeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = self.command(args, bottle)?;
        debug!("spawning {command:?}");

        let child = command
            .spawn()
            .map_err(|_| ConvergeError::FailedToSpawnChild)?;
        info!("started wine process {}", child.id());
        Ok(WineProcess { child })
    }

    /// Runs wine to completion and returns its captured stdout. Stderr is
    /// logged. A non-zero exit is an error.
    pub fn run<I, S>(&self, args: I, bottle: Option<&Bottle>) -> Result<String, ConvergeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = self.command(args, bottle)?;
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());
        debug!("running {command:?}");

        let child = command
            .spawn()
            .map_err(|_| ConvergeError::FailedToSpawnChild)?;
        let output = child
            .wait_with_output()
            .map_err(|_| ConvergeError::ChildFailed)?;

        for line in String::from_utf8_lossy(&output.stderr).lines() {
            warn!("wine: {line}");
        }

        if !output.status.success() {
            return Err(ConvergeError::ChildFailed);
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn environment_points_wine_at_the_bottle() {
        let dir = tempfile::tempdir().unwrap();
        let bottle = Bottle::new("Test".to_owned(), dir.path().join("Test"));
        fs::create_dir_all(bottle.path()).unwrap();
        bottle.set_environment_variable("WINEESYNC", "1").unwrap();

        let runner = WineRunner::new(PathBuf::from("/opt/wine/bin/wine64"));
        let env = runner.environment(Some(&bottle));

        assert_eq!(env.get("PATH").map(String::as_str), Some("/opt/wine/bin"));
        assert_eq!(
            env.get("WINEPREFIX").map(String::as_str),
            bottle.path().to_str()
        );
        assert_eq!(env.get("WINEESYNC").map(String::as_str), Some("1"));
    }

    #[test]
    fn environment_without_a_bottle_sets_no_prefix() {
        let runner = WineRunner::new(PathBuf::from("/opt/wine/bin/wine64"));
        let env = runner.environment(None);
        assert!(!env.contains_key("WINEPREFIX"));
    }

    #[test]
    fn bottle_overrides_win_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let bottle = Bottle::new("Test".to_owned(), dir.path().join("Test"));
        fs::create_dir_all(bottle.path()).unwrap();
        bottle
            .set_environment_variable("PATH", "/somewhere/else")
            .unwrap();

        let runner = WineRunner::new(PathBuf::from("/opt/wine/bin/wine64"));
        let env = runner.environment(Some(&bottle));
        assert_eq!(env.get("PATH").map(String::as_str), Some("/somewhere/else"));
    }

    #[test]
    fn running_without_an_installed_wine_fails() {
        let runner = WineRunner::new(PathBuf::from("/nonexistent/wine/bin/wine64"));
        assert!(matches!(
            runner.run(["wineboot"], None),
            Err(ConvergeError::WineNotInstalled)
        ));
        assert!(matches!(
            runner.spawn(["winecfg"], None),
            Err(ConvergeError::WineNotInstalled)
        ));
    }
}
