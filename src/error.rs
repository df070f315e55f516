use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvergeError {
    #[error("bottle \"{0}\" already exists")]
    BottleAlreadyExists(String),

    #[error("bottle \"{0}\" could not be found")]
    BottleNotFound(String),

    #[error("wine is not installed")]
    WineNotInstalled,

    #[error("failed to spawn child")]
    FailedToSpawnChild,

    #[error("child failed")]
    ChildFailed,

    #[error("the path is not a directory")]
    NotADirectory(PathBuf),

    #[error("the directory \"{0:?}\" could not be found")]
    DirectoryNotFound(PathBuf),

    #[error("IO Error")]
    IOError(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}
