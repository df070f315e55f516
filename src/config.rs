use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::util::verify_directory;

static APP_NAME: &str = "converge";

static BOTTLES_SUBDIR: &str = "Bottles";
static WINE_SUBDIR: &str = "wine";

/// Get converge's data directory
///
/// # Panics
/// Panics when `dirs::data_dir` returns `None` or the directory does not exist and cannot be created
pub fn data_dir() -> &'static Path {
    static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();
    DATA_DIR.get_or_init(|| {
        let path = dirs::data_dir().expect("could not find location for data directory");
        let dir = path.join(APP_NAME);
        verify_directory(&dir).expect("could not create data directory");
        dir
    })
}

/// Get the directory in which converge stores its bottles
///
/// # Panics
/// Panics when `data_dir` panics or the directory does not exist and cannot be created
pub fn bottles_dir() -> &'static Path {
    static BOTTLES_DIR: OnceLock<PathBuf> = OnceLock::new();
    BOTTLES_DIR.get_or_init(|| {
        let dir = data_dir().join(BOTTLES_SUBDIR);
        verify_directory(&dir).expect("could not create bottles directory");
        dir
    })
}

/// Get the directory holding the managed Wine toolchain. Not created on
/// access, `install_wine` populates it.
#[must_use]
pub fn wine_dir() -> PathBuf {
    data_dir().join(WINE_SUBDIR)
}

/// Get the path of the managed `wine64` binary.
#[must_use]
pub fn wine_binary() -> PathBuf {
    wine_dir().join("bin").join("wine64")
}
