use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::bottle::Bottle;
use crate::error::ConvergeError;

pub fn verify_directory(path: &Path) -> Result<(), ConvergeError> {
    if path.exists() {
        if path.is_dir() {
            Ok(())
        } else {
            Err(ConvergeError::NotADirectory(path.to_owned()))
        }
    } else {
        fs::create_dir_all(path).map_err(ConvergeError::from)
    }
}

/// Case-insensitive extension check, `is_extension("Setup.EXE", "exe")` holds.
#[must_use]
pub fn is_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .is_some_and(|ext| unicase::eq(ext.to_string_lossy().as_ref(), extension))
}

/// Maps a `C:` drive Windows path onto the bottle's `drive_c` directory.
/// Paths on any other drive resolve to `None`.
#[must_use]
pub fn resolve_windows_path(bottle: &Bottle, path: &str) -> Option<PathBuf> {
    let rest = path
        .strip_prefix("C:\\")
        .or_else(|| path.strip_prefix("c:\\"))?;
    let relative = typed_path::WindowsPathBuf::from_str(rest)
        .ok()?
        .with_unix_encoding();
    let relative = relative.to_str()?.trim_start_matches('/').to_owned();
    Some(bottle.drive_c().join(relative))
}
