use crate::domain::model::SourceOrigin;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("Keyword extraction failed: {message}")]
    ExtractionFailure { message: String },

    #[error("{origin} source unavailable: {message}")]
    SourceUnavailable {
        origin: SourceOrigin,
        message: String,
        transient: bool,
    },

    #[error("Only {found} of {requested} requested references could be found")]
    InsufficientPapers { requested: usize, found: usize },

    #[error("Review generation failed while drafting {stage}: {message}")]
    GenerationFailure { stage: String, message: String },

    #[error("Citation marker without a bibliography target: {marker}")]
    AlignmentInconsistency { marker: String },

    #[error("LLM API error [{status}]: {message}")]
    LlmApiError { status: u16, message: String },

    #[error("Malformed local paper data in {path} (line {line}): {message}")]
    MalformedLocalData {
        path: String,
        line: usize,
        message: String,
    },

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Llm,
    Data,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ReviewError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ReviewError::ConfigError { .. }
            | ReviewError::ConfigValidationError { .. }
            | ReviewError::InvalidConfigValueError { .. }
            | ReviewError::MissingConfigError { .. } => ErrorCategory::Configuration,
            ReviewError::SourceUnavailable { .. } | ReviewError::ApiError(_) => {
                ErrorCategory::Network
            }
            ReviewError::ExtractionFailure { .. }
            | ReviewError::GenerationFailure { .. }
            | ReviewError::LlmApiError { .. } => ErrorCategory::Llm,
            ReviewError::MalformedLocalData { .. }
            | ReviewError::InsufficientPapers { .. }
            | ReviewError::SerializationError(_)
            | ReviewError::IoError(_) => ErrorCategory::Data,
            ReviewError::AlignmentInconsistency { .. } => ErrorCategory::Internal,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // Nothing to review at all.
            ReviewError::InsufficientPapers { found: 0, .. } => ErrorSeverity::Medium,
            ReviewError::InsufficientPapers { .. } | ReviewError::AlignmentInconsistency { .. } => {
                ErrorSeverity::Low
            }
            ReviewError::SourceUnavailable { .. }
            | ReviewError::ApiError(_)
            | ReviewError::LlmApiError { .. } => ErrorSeverity::Medium,
            ReviewError::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    /// Whether a single retry after a backoff is worth attempting.
    pub fn is_transient(&self) -> bool {
        match self {
            ReviewError::SourceUnavailable { transient, .. } => *transient,
            ReviewError::LlmApiError { status, .. } => *status == 429 || *status >= 500,
            ReviewError::ApiError(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e
                        .status()
                        .map(|s| s.is_server_error() || s.as_u16() == 429)
                        .unwrap_or(false)
            }
            _ => false,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check the command-line flags or configuration file and try again"
            }
            ErrorCategory::Network => {
                "Check your network connection and the search service status, then retry"
            }
            ErrorCategory::Llm => {
                "Verify the API key and model access, or retry with a different review type"
            }
            ErrorCategory::Data => {
                "Inspect the local paper store and output directory for invalid or unreadable files"
            }
            ErrorCategory::Internal => "Re-run the review; the output was corrected automatically",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ReviewError::ExtractionFailure { .. } => {
                format!("Could not derive search keywords from the topic. {}", self)
            }
            ReviewError::SourceUnavailable { origin, .. } => {
                format!("The {} paper source could not be reached. {}", origin, self)
            }
            ReviewError::GenerationFailure { stage, .. } => {
                format!("The review could not be written ({} failed). {}", stage, self)
            }
            ReviewError::MissingConfigError { field } => {
                format!("Please provide a value for '{}'", field)
            }
            _ => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReviewError>;
