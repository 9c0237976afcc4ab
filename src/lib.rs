pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::cli::LocalStorage;
pub use config::toml_config::TomlConfig;
#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use core::engine::{ReviewEngine, ReviewOptions};
pub use domain::model::{FinalDocument, ReviewType, SearchMethod, Topic};
pub use utils::error::{ReviewError, Result};
