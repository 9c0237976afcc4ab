//! Wires configuration to concrete adapters and the review engine.

use crate::adapters::{
    AnthropicClient, LocalSource, ModelTier, OpenAiClient, PubMedSource, ScholarSource,
};
use crate::core::engine::{ReviewEngine, ReviewOptions};
use crate::domain::model::{FinalDocument, ProgressEvent, SearchMethod, Topic};
use crate::domain::ports::{
    ConfigProvider, LanguageModel, LlmProvider, PaperSource, ProgressSink, Storage,
};
use crate::utils::error::{ErrorSeverity, ReviewError, Result};
use reqwest::Client;
use std::path::Path;

pub fn build_http_client(config: &dyn ConfigProvider) -> Result<Client> {
    let client = Client::builder()
        .timeout(config.request_timeout())
        .build()?;
    Ok(client)
}

pub fn build_language_model(config: &dyn ConfigProvider, client: Client) -> Box<dyn LanguageModel> {
    let tier = ModelTier::for_review(config.llm_provider(), config.review_type());
    tracing::info!("🤖 Using {} model {}", config.llm_provider(), tier.model);

    match config.llm_provider() {
        LlmProvider::OpenAi => {
            let mut llm = OpenAiClient::new(client, config.api_key(), tier);
            if let Some(base_url) = config.llm_base_url() {
                llm = llm.with_base_url(base_url);
            }
            Box::new(llm)
        }
        LlmProvider::Anthropic => {
            let mut llm = AnthropicClient::new(client, config.api_key(), tier);
            if let Some(base_url) = config.llm_base_url() {
                llm = llm.with_base_url(base_url);
            }
            Box::new(llm)
        }
    }
}

fn pubmed(config: &dyn ConfigProvider, client: Client) -> PubMedSource {
    PubMedSource::new(client)
        .with_base_url(config.pubmed_base_url())
        .with_api_key(config.ncbi_api_key().map(String::from))
}

pub fn build_sources(config: &dyn ConfigProvider, client: Client) -> Vec<Box<dyn PaperSource>> {
    match config.search_method() {
        SearchMethod::Local => vec![Box::new(LocalSource::new(config.local_papers_dir()))],
        SearchMethod::PubMed => {
            let mut sources: Vec<Box<dyn PaperSource>> =
                vec![Box::new(pubmed(config, client.clone()))];
            if config.include_scholar() {
                sources.push(Box::new(
                    ScholarSource::new(client.clone(), pubmed(config, client))
                        .with_base_url(config.scholar_base_url())
                        .with_concurrency(config.concurrent_requests()),
                ));
            }
            sources
        }
    }
}

pub fn build_engine<S: Storage>(config: &dyn ConfigProvider, storage: S) -> Result<ReviewEngine<S>> {
    let client = build_http_client(config)?;
    let llm = build_language_model(config, client.clone());
    let sources = build_sources(config, client);
    let options = ReviewOptions {
        review_type: config.review_type(),
        search_method: config.search_method(),
        min_references: config.min_references(),
        ..ReviewOptions::default()
    };
    Ok(ReviewEngine::new(llm, sources, storage, options))
}

/// Prints progress lines to stdout for interactive runs.
pub struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn emit(&self, event: &ProgressEvent) {
        tracing::info!("✅ {}", event);
        println!("  • {}", event);
    }
}

pub const INTERRUPTED_EXIT_CODE: i32 = 130;

pub fn exit_code(error: &ReviewError) -> i32 {
    match error.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

fn report_success(document: &FinalDocument, written: &[String], output_dir: &str) {
    tracing::info!("✅ Literature review completed successfully!");
    println!("✅ Literature review completed successfully!");
    if let Some(shortfall) = &document.shortfall {
        println!("⚠️ {}", shortfall.as_error());
    }
    println!(
        "📚 {} references, {} body sections",
        document.bibliography.len(),
        document.draft.sections.len()
    );
    for file in written {
        let path = Path::new(output_dir).join(file);
        tracing::info!("📁 Output saved to: {}", path.display());
        println!("📁 Output saved to: {}", path.display());
    }
}

fn report_failure(error: &ReviewError) -> i32 {
    tracing::error!(
        "❌ Review failed: {} (Category: {:?}, Severity: {:?})",
        error,
        error.category(),
        error.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", error.recovery_suggestion());

    eprintln!("❌ {}", error.user_friendly_message());
    eprintln!("💡 Suggestion: {}", error.recovery_suggestion());
    exit_code(error)
}

/// Runs and publishes the review, stopping cleanly on Ctrl-C.
/// Returns the process exit code.
pub async fn run_until_interrupted<S: Storage>(
    engine: &ReviewEngine<S>,
    topic: &Topic,
    output_dir: &str,
) -> i32 {
    tokio::select! {
        result = engine.run_and_publish(topic) => match result {
            Ok((document, written)) => {
                report_success(&document, &written, output_dir);
                0
            }
            Err(e) => report_failure(&e),
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("🛑 Interrupted, no review was written");
            eprintln!("🛑 Interrupted");
            INTERRUPTED_EXIT_CODE
        }
    }
}
