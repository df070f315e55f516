mod bottle;
pub use bottle::{Bottle, Environment};
mod bottlemanager;
pub use bottlemanager::BottleManager;
pub mod config;
mod error;
pub use error::ConvergeError as Error;
mod install;
pub use install::{install_wine, wine_installed};
pub mod pe;
pub mod programs;
pub mod registry;
pub mod util;
mod wine;
pub use wine::{WineProcess, WineRunner};
