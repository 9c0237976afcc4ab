use crate::adapters::pubmed::EUTILS_BASE_URL;
use crate::adapters::scholar::SCHOLAR_BASE_URL;
use crate::config::validate_provider;
use crate::domain::model::{ReviewType, SearchMethod};
use crate::domain::ports::{ConfigProvider, LlmProvider};
use crate::utils::error::{ReviewError, Result};
use crate::utils::validation::Validate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var regex"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub review: ReviewSection,
    pub llm: LlmSection,
    #[serde(default)]
    pub sources: SourcesSection,
    #[serde(default)]
    pub output: OutputSection,
    pub monitoring: Option<MonitoringConfig>,
    pub performance: Option<PerformanceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewSection {
    pub topic: String,
    pub review_type: Option<ReviewType>,
    pub search_method: Option<SearchMethod>,
    pub min_references: Option<usize>,
    pub include_scholar: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSection {
    pub provider: Option<LlmProvider>,
    pub api_key: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesSection {
    pub local_papers_dir: Option<String>,
    pub pubmed_base_url: Option<String>,
    pub scholar_base_url: Option<String>,
    pub ncbi_api_key: Option<String>,
    pub concurrent_requests: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSection {
    pub path: String,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            path: "./output".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub system_stats: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    pub request_timeout: Option<u64>,
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ReviewError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| ReviewError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unset variables are left as-is.
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn validate_config(&self) -> Result<()> {
        if ENV_VAR.is_match(&self.llm.api_key) {
            return Err(ReviewError::MissingConfigError {
                field: "llm.api_key".to_string(),
            });
        }
        validate_provider(self)
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn system_stats_enabled(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.system_stats)
            .unwrap_or(false)
    }
}

impl ConfigProvider for TomlConfig {
    fn topic(&self) -> &str {
        &self.review.topic
    }

    fn api_key(&self) -> &str {
        &self.llm.api_key
    }

    fn llm_provider(&self) -> LlmProvider {
        self.llm.provider.unwrap_or(LlmProvider::OpenAi)
    }

    fn llm_base_url(&self) -> Option<&str> {
        self.llm.base_url.as_deref()
    }

    fn search_method(&self) -> SearchMethod {
        self.review.search_method.unwrap_or(SearchMethod::PubMed)
    }

    fn review_type(&self) -> ReviewType {
        self.review.review_type.unwrap_or(ReviewType::Standard)
    }

    fn min_references(&self) -> usize {
        self.review.min_references.unwrap_or(5)
    }

    fn include_scholar(&self) -> bool {
        self.review.include_scholar.unwrap_or(false)
    }

    fn local_papers_dir(&self) -> &str {
        self.sources.local_papers_dir.as_deref().unwrap_or("./data")
    }

    fn pubmed_base_url(&self) -> &str {
        self.sources
            .pubmed_base_url
            .as_deref()
            .unwrap_or(EUTILS_BASE_URL)
    }

    fn scholar_base_url(&self) -> &str {
        self.sources
            .scholar_base_url
            .as_deref()
            .unwrap_or(SCHOLAR_BASE_URL)
    }

    fn ncbi_api_key(&self) -> Option<&str> {
        self.sources
            .ncbi_api_key
            .as_deref()
            .filter(|k| !ENV_VAR.is_match(k))
    }

    fn output_path(&self) -> &str {
        &self.output.path
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.performance
                .as_ref()
                .and_then(|p| p.request_timeout)
                .unwrap_or(120),
        )
    }

    fn concurrent_requests(&self) -> usize {
        self.sources.concurrent_requests.unwrap_or(5)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
