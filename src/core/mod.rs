pub mod citations;
pub mod drafting;
pub mod engine;
pub mod keywords;
pub mod ranking;
pub mod render;
pub mod selection;

#[cfg(test)]
pub mod testing;

pub use crate::domain::ports::{ConfigProvider, LanguageModel, PaperSource, Storage};
pub use crate::utils::error::Result;
