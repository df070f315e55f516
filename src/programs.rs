use std::ffi::OsString;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::bottle::Bottle;
use crate::error::ConvergeError;
use crate::util::is_extension;
use crate::wine::{WineProcess, WineRunner};

/// Executables installed under the bottle's Program Files directories,
/// sorted for stable output.
#[must_use]
pub fn installed_programs(bottle: &Bottle) -> Vec<PathBuf> {
    let search_paths = [
        bottle.drive_c().join("Program Files (x86)"),
        bottle.drive_c().join("Program Files"),
    ];

    let mut found = Vec::new();
    for dir in search_paths {
        for entry in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
            let path = entry.path();
            if path.is_file() && is_extension(path, "exe") {
                found.push(path.to_owned());
            }
        }
    }

    found.sort();
    found
}

/// Starts an executable inside the bottle, handing the process back to the
/// caller.
pub fn launch(
    runner: &WineRunner,
    bottle: &Bottle,
    executable: &Path,
    args: &[String],
) -> Result<WineProcess, ConvergeError> {
    let mut cmdline: Vec<OsString> = vec![executable.into()];
    cmdline.extend(args.iter().map(OsString::from));
    runner.spawn(cmdline, Some(bottle))
}
