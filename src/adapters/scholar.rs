//! Google Scholar title scrape, with each title resolved to full metadata
//! through PubMed.

use crate::adapters::pubmed::PubMedSource;
use crate::domain::model::{PaperRecord, SearchQuery, SourceOrigin};
use crate::domain::ports::PaperSource;
use crate::utils::error::{ReviewError, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::HashSet;

pub const SCHOLAR_BASE_URL: &str = "https://scholar.google.com/scholar";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/103.0.0.0 Safari/537.36";

pub struct ScholarSource {
    client: Client,
    base_url: String,
    pages: usize,
    concurrency: usize,
    resolver: PubMedSource,
}

impl ScholarSource {
    pub fn new(client: Client, resolver: PubMedSource) -> Self {
        Self {
            client,
            base_url: SCHOLAR_BASE_URL.to_string(),
            pages: 4,
            concurrency: 5,
            resolver,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_pages(mut self, pages: usize) -> Self {
        self.pages = pages.max(1);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    async fn fetch_page(&self, term: &str, page: usize) -> Result<String> {
        let start = (page * 10).to_string();
        let response = self
            .client
            .get(&self.base_url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .query(&[
                ("q", term),
                ("hl", "en"),
                ("as_sdt", "0,29"),
                ("start", start.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ReviewError::SourceUnavailable {
                origin: SourceOrigin::Scholar,
                message: e.to_string(),
                transient: e.is_timeout() || e.is_connect(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReviewError::SourceUnavailable {
                origin: SourceOrigin::Scholar,
                message: format!("search page {} returned HTTP {}", page + 1, status),
                transient: status.is_server_error(),
            });
        }
        Ok(response.text().await?)
    }

    /// In-flight title resolutions, capped by the PubMed rate limit.
    pub fn resolution_concurrency(&self) -> usize {
        self.concurrency.min(self.resolver.rate_limit())
    }

    async fn resolve(&self, title: &str) -> Result<Option<PaperRecord>> {
        self.resolver.pause().await;
        let ids = self.resolver.esearch(title, 1).await?;
        if ids.is_empty() {
            return Ok(None);
        }
        self.resolver.pause().await;
        let mut papers = self.resolver.efetch(&ids).await?;
        Ok(papers.pop().filter(|p| !p.abstract_text.trim().is_empty()))
    }
}

/// Result titles (`h3.gs_rt a`) from one Scholar results page.
pub fn extract_titles(html: &str) -> Result<Vec<String>> {
    let selector = Selector::parse("h3.gs_rt a").map_err(|e| ReviewError::ConfigError {
        message: format!("invalid Scholar selector: {}", e),
    })?;
    let document = Html::parse_document(html);
    Ok(document
        .select(&selector)
        .map(|link| {
            link.text()
                .collect::<Vec<_>>()
                .join(" ")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|t| !t.is_empty())
        .collect())
}

#[async_trait]
impl PaperSource for ScholarSource {
    async fn search(&self, query: &SearchQuery, max_results: usize) -> Result<Vec<PaperRecord>> {
        let mut titles: Vec<String> = Vec::new();
        for page in 0..self.pages {
            let html = self.fetch_page(query.topic.as_str(), page).await?;
            let page_titles = extract_titles(&html)?;
            if page_titles.is_empty() {
                break;
            }
            for title in page_titles {
                if !titles.contains(&title) {
                    titles.push(title);
                }
            }
        }
        titles.truncate(max_results);
        tracing::info!("🎓 Scholar: resolving {} titles through PubMed", titles.len());

        let resolved: Vec<Result<Option<PaperRecord>>> = stream::iter(titles.clone())
            .map(|title| async move { self.resolve(&title).await })
            .buffered(self.resolution_concurrency())
            .collect()
            .await;

        let mut seen_abstracts = HashSet::new();
        let mut papers = Vec::new();
        for (title, result) in titles.iter().zip(resolved) {
            match result {
                Ok(Some(mut paper)) => {
                    if seen_abstracts.insert(paper.abstract_text.trim().to_string()) {
                        paper.origin = SourceOrigin::Scholar;
                        papers.push(paper);
                    }
                }
                Ok(None) => tracing::debug!("🎓 No PubMed match with abstract for '{}'", title),
                Err(e) => tracing::warn!("🎓 Could not resolve '{}': {}", title, e),
            }
        }
        Ok(papers)
    }

    fn origin(&self) -> SourceOrigin {
        SourceOrigin::Scholar
    }

    fn required(&self) -> bool {
        false
    }
}
