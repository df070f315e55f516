use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::Path;

use log::info;
use walkdir::WalkDir;

use crate::config;
use crate::error::ConvergeError;

const GPT_BUNDLE_NAME: &str = "Game Porting Toolkit.app";
const GPT_WINE_SUBDIR: &str = "Contents/Resources/wine";

/// Whether the managed `wine64` binary is present.
#[must_use]
pub fn wine_installed() -> bool {
    config::wine_binary().exists()
}

/// Installs the Wine toolchain shipped inside a Game Porting Toolkit app
/// bundle, replacing any previously managed copy.
pub fn install_wine(app_bundle: &Path) -> Result<(), ConvergeError> {
    if app_bundle.file_name() != Some(OsStr::new(GPT_BUNDLE_NAME)) {
        return Err(ConvergeError::Other(format!(
            "expected the \"{GPT_BUNDLE_NAME}\" bundle, got \"{}\"",
            app_bundle.display()
        )));
    }

    let source = app_bundle.join(GPT_WINE_SUBDIR);
    if !source.is_dir() {
        return Err(ConvergeError::DirectoryNotFound(source));
    }

    // data and bottles directories create themselves on first access
    let _ = config::bottles_dir();

    let destination = config::wine_dir();
    if destination.exists() {
        info!("replacing previous wine install");
        fs::remove_dir_all(&destination)?;
    }

    copy_tree(&source, &destination)?;
    info!("installed wine to {}", destination.display());
    Ok(())
}

fn copy_tree(source: &Path, destination: &Path) -> Result<(), ConvergeError> {
    fs::create_dir_all(destination)?;

    for entry in WalkDir::new(source).min_depth(1) {
        let entry = entry.map_err(io::Error::from)?;
        let from = entry.path();
        let relative_path = from
            .strip_prefix(source)
            .map_err(|e| ConvergeError::Other(e.to_string()))?;
        let to = destination.join(relative_path);

        if from.is_dir() {
            fs::create_dir(&to)?;
        } else {
            fs::copy(from, &to)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_anything_but_the_toolkit_bundle() {
        assert!(matches!(
            install_wine(Path::new("/tmp/SomeOther.app")),
            Err(ConvergeError::Other(_))
        ));
    }

    #[test]
    fn copy_tree_copies_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("wine");
        fs::create_dir_all(source.join("bin")).unwrap();
        fs::write(source.join("bin/wine64"), b"#!").unwrap();
        fs::write(source.join("version"), b"gptk").unwrap();

        let destination = dir.path().join("installed");
        copy_tree(&source, &destination).unwrap();

        assert_eq!(fs::read(destination.join("bin/wine64")).unwrap(), b"#!");
        assert_eq!(fs::read(destination.join("version")).unwrap(), b"gptk");
    }
}
