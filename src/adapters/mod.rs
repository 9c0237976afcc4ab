// Adapters layer: concrete implementations of the domain ports for external systems.

pub mod llm;
pub mod local;
pub mod pubmed;
pub mod scholar;

pub use llm::{AnthropicClient, ModelTier, OpenAiClient};
pub use local::LocalSource;
pub use pubmed::PubMedSource;
pub use scholar::ScholarSource;
