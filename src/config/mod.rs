pub mod cli;
pub mod toml_config;

use crate::domain::model::SearchMethod;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_range, validate_secret, validate_url,
};

#[cfg(feature = "cli")]
use crate::domain::model::ReviewType;
#[cfg(feature = "cli")]
use crate::domain::ports::LlmProvider;
#[cfg(feature = "cli")]
use crate::utils::validation::Validate;
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use std::time::Duration;

pub const MIN_REFERENCES: usize = 3;
pub const MAX_REFERENCES: usize = 100;

/// Checks shared by every configuration front end.
pub fn validate_provider(config: &dyn ConfigProvider) -> Result<()> {
    validate_non_empty_string("topic", config.topic())?;
    validate_secret("api_key", config.api_key())?;
    validate_range(
        "min_references",
        config.min_references(),
        MIN_REFERENCES,
        MAX_REFERENCES,
    )?;
    validate_path("output_path", config.output_path())?;
    validate_url("pubmed_base_url", config.pubmed_base_url())?;
    validate_url("scholar_base_url", config.scholar_base_url())?;
    if let Some(base_url) = config.llm_base_url() {
        validate_url("llm_base_url", base_url)?;
    }
    if config.search_method() == SearchMethod::Local {
        validate_path("local_papers_dir", config.local_papers_dir())?;
    }
    validate_range(
        "timeout_seconds",
        config.request_timeout().as_secs(),
        1,
        3600,
    )?;
    validate_range("concurrent_requests", config.concurrent_requests(), 1, 50)?;
    Ok(())
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "lit-review")]
#[command(about = "Draft a cited literature review for a research topic")]
pub struct CliConfig {
    /// Research topic, e.g. "gut microbiome and depression"
    #[arg(long, short = 't')]
    pub topic: String,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, default_value = "")]
    pub api_key: String,

    /// openai or anthropic
    #[arg(long, default_value = "openai")]
    pub provider: LlmProvider,

    /// OpenAI-compatible or Anthropic endpoint override
    #[arg(long)]
    pub llm_base_url: Option<String>,

    /// pubmed or local
    #[arg(long, default_value = "pubmed")]
    pub search_method: SearchMethod,

    /// quick, standard or deep
    #[arg(long, default_value = "standard")]
    pub review_type: ReviewType,

    #[arg(long, default_value = "5")]
    pub min_references: usize,

    #[arg(long, default_value = "./data")]
    pub local_papers_dir: String,

    /// Also search Google Scholar (PubMed mode only)
    #[arg(long)]
    pub include_scholar: bool,

    #[arg(long, default_value = crate::adapters::pubmed::EUTILS_BASE_URL)]
    pub pubmed_base_url: String,

    #[arg(long, default_value = crate::adapters::scholar::SCHOLAR_BASE_URL)]
    pub scholar_base_url: String,

    #[arg(long, env = "NCBI_API_KEY", hide_env_values = true)]
    pub ncbi_api_key: Option<String>,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    #[arg(long, default_value = "120")]
    pub timeout_seconds: u64,

    #[arg(long, default_value = "5")]
    pub concurrent_requests: usize,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log stage timings and process resource usage")]
    pub monitor: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn api_key(&self) -> &str {
        &self.api_key
    }

    fn llm_provider(&self) -> LlmProvider {
        self.provider
    }

    fn llm_base_url(&self) -> Option<&str> {
        self.llm_base_url.as_deref()
    }

    fn search_method(&self) -> SearchMethod {
        self.search_method
    }

    fn review_type(&self) -> ReviewType {
        self.review_type
    }

    fn min_references(&self) -> usize {
        self.min_references
    }

    fn include_scholar(&self) -> bool {
        self.include_scholar
    }

    fn local_papers_dir(&self) -> &str {
        &self.local_papers_dir
    }

    fn pubmed_base_url(&self) -> &str {
        &self.pubmed_base_url
    }

    fn scholar_base_url(&self) -> &str {
        &self.scholar_base_url
    }

    fn ncbi_api_key(&self) -> Option<&str> {
        self.ncbi_api_key.as_deref()
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    fn concurrent_requests(&self) -> usize {
        self.concurrent_requests
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_provider(self)
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;
    use crate::utils::error::ReviewError;

    fn parse(args: &[&str]) -> CliConfig {
        let mut argv = vec!["lit-review", "--api-key", "sk-test"];
        argv.extend_from_slice(args);
        CliConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_are_applied() {
        let config = parse(&["--topic", "gut microbiome"]);
        assert_eq!(config.review_type, ReviewType::Standard);
        assert_eq!(config.search_method, SearchMethod::PubMed);
        assert_eq!(config.provider, LlmProvider::OpenAi);
        assert_eq!(config.min_references, 5);
        assert_eq!(config.request_timeout(), Duration::from_secs(120));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn enum_flags_are_parsed() {
        let config = parse(&[
            "--topic",
            "x",
            "--review-type",
            "deep",
            "--search-method",
            "local",
            "--provider",
            "claude",
        ]);
        assert_eq!(config.review_type, ReviewType::Deep);
        assert_eq!(config.search_method, SearchMethod::Local);
        assert_eq!(config.provider, LlmProvider::Anthropic);
    }

    #[test]
    fn invalid_review_type_is_rejected_by_parser() {
        let result = CliConfig::try_parse_from(["lit-review", "--topic", "x", "--review-type", "slow"]);
        assert!(result.is_err());
    }

    #[test]
    fn min_references_out_of_range() {
        let config = parse(&["--topic", "x", "--min-references", "2"]);
        assert!(matches!(
            config.validate(),
            Err(ReviewError::InvalidConfigValueError { field, .. }) if field == "min_references"
        ));
    }

    #[test]
    fn blank_api_key_is_missing() {
        let mut config = parse(&["--topic", "x"]);
        config.api_key = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ReviewError::MissingConfigError { field }) if field == "api_key"
        ));
    }
}
