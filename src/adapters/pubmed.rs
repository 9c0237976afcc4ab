//! PubMed E-utilities client.
//!
//! `esearch` (JSON) resolves query terms to PMIDs, `efetch` (XML) returns
//! article metadata in batches.

use crate::domain::model::{PaperRecord, SearchQuery, SourceOrigin};
use crate::domain::ports::PaperSource;
use crate::utils::error::{ReviewError, Result};
use crate::utils::retry::{retry_once, DEFAULT_BACKOFF};
use async_trait::async_trait;
use chrono::NaiveDate;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::Client;
use std::collections::HashSet;
use std::time::Duration;

pub const EUTILS_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
const EFETCH_BATCH: usize = 100;

pub struct PubMedSource {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    request_delay: Duration,
    backoff: Duration,
}

impl PubMedSource {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: EUTILS_BASE_URL.to_string(),
            api_key: None,
            request_delay: Duration::from_millis(350),
            backoff: DEFAULT_BACKOFF,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    /// Pause between consecutive E-utilities requests.
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    fn unavailable(message: String, transient: bool) -> ReviewError {
        ReviewError::SourceUnavailable {
            origin: SourceOrigin::PubMed,
            message,
            transient,
        }
    }

    fn map_request_error(e: reqwest::Error) -> ReviewError {
        let transient = e.is_timeout()
            || e.is_connect()
            || e.status().map(|s| s.is_server_error()).unwrap_or(false);
        Self::unavailable(e.to_string(), transient)
    }

    async fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<reqwest::Response> {
        let mut params = params.to_vec();
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }

        let response = self
            .client
            .get(format!("{}/{}", self.base_url, endpoint))
            .query(&params)
            .send()
            .await
            .map_err(Self::map_request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::unavailable(
                format!("{} returned HTTP {}", endpoint, status),
                status.is_server_error() || status.as_u16() == 429,
            ));
        }
        Ok(response)
    }

    async fn esearch_once(&self, term: &str, max: usize) -> Result<Vec<String>> {
        let params = [
            ("db", "pubmed".to_string()),
            ("retmode", "json".to_string()),
            ("sort", "relevance".to_string()),
            ("retmax", max.to_string()),
            ("term", term.to_string()),
        ];
        let json: serde_json::Value = self
            .get("esearch.fcgi", &params)
            .await?
            .json()
            .await
            .map_err(Self::map_request_error)?;

        let ids = json["esearchresult"]["idlist"]
            .as_array()
            .map(|ids| {
                ids.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();
        Ok(ids)
    }

    /// PMIDs for `term`, most relevant first.
    pub async fn esearch(&self, term: &str, max: usize) -> Result<Vec<String>> {
        let ids = retry_once("PubMed esearch", self.backoff, || self.esearch_once(term, max)).await?;
        tracing::debug!("🔎 PubMed esearch '{}' returned {} PMIDs", term, ids.len());
        Ok(ids)
    }

    async fn efetch_once(&self, pmids: &[String]) -> Result<String> {
        let params = [
            ("db", "pubmed".to_string()),
            ("retmode", "xml".to_string()),
            ("rettype", "abstract".to_string()),
            ("id", pmids.join(",")),
        ];
        self.get("efetch.fcgi", &params)
            .await?
            .text()
            .await
            .map_err(Self::map_request_error)
    }

    /// Article metadata for the given PMIDs, fetched in batches.
    pub async fn efetch(&self, pmids: &[String]) -> Result<Vec<PaperRecord>> {
        let mut papers = Vec::with_capacity(pmids.len());
        for (i, batch) in pmids.chunks(EFETCH_BATCH).enumerate() {
            if i > 0 {
                self.pause().await;
            }
            let xml = retry_once("PubMed efetch", self.backoff, || self.efetch_once(batch)).await?;
            papers.extend(parse_pubmed_xml(&xml)?);
        }
        Ok(papers)
    }

    /// Requests per second NCBI accepts: 10 with an API key, 3 without.
    pub fn rate_limit(&self) -> usize {
        if self.api_key.is_some() {
            10
        } else {
            3
        }
    }

    pub(crate) async fn pause(&self) {
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }
    }

    fn query_terms(query: &SearchQuery) -> Vec<(String, usize)> {
        let mut terms = vec![(query.topic.as_str().to_string(), query.topic_results)];
        if query.phrases.is_empty() {
            let joined = query
                .keywords
                .iter()
                .take(3)
                .cloned()
                .collect::<Vec<_>>()
                .join(" ");
            terms.push((joined, query.results_per_phrase));
        } else {
            terms.extend(
                query
                    .phrases
                    .iter()
                    .map(|p| (p.clone(), query.results_per_phrase)),
            );
        }

        let mut seen = HashSet::new();
        terms.retain(|(t, _)| !t.trim().is_empty() && seen.insert(t.to_lowercase()));
        terms
    }
}

#[async_trait]
impl PaperSource for PubMedSource {
    async fn search(&self, query: &SearchQuery, max_results: usize) -> Result<Vec<PaperRecord>> {
        let mut seen = HashSet::new();
        let mut pmids = Vec::new();

        for (i, (term, retmax)) in Self::query_terms(query).iter().enumerate() {
            if pmids.len() >= max_results {
                break;
            }
            if i > 0 {
                self.pause().await;
            }
            for id in self.esearch(term, *retmax).await? {
                if pmids.len() < max_results && seen.insert(id.clone()) {
                    pmids.push(id);
                }
            }
        }

        tracing::info!("📚 PubMed: fetching {} articles", pmids.len());
        if pmids.is_empty() {
            return Ok(Vec::new());
        }
        self.pause().await;
        self.efetch(&pmids).await
    }

    fn origin(&self) -> SourceOrigin {
        SourceOrigin::PubMed
    }
}

#[derive(Default)]
struct ArticleBuilder {
    pmid: Option<String>,
    title: String,
    abstract_parts: Vec<String>,
    authors: Vec<String>,
    journal: Option<String>,
    doi: Option<String>,
    year: Option<i32>,
    month: Option<u32>,
    day: Option<u32>,
}

impl ArticleBuilder {
    fn build(self) -> PaperRecord {
        let published = self.year.and_then(|y| {
            NaiveDate::from_ymd_opt(y, self.month.unwrap_or(1), self.day.unwrap_or(1))
                .or_else(|| NaiveDate::from_ymd_opt(y, 1, 1))
        });
        let mut paper = PaperRecord::new(collapse_whitespace(&self.title), SourceOrigin::PubMed);
        paper.authors = self.authors;
        paper.published = published;
        paper.abstract_text = collapse_whitespace(&self.abstract_parts.join(" "));
        paper.journal = self.journal;
        paper.doi = self.doi;
        if let Some(pmid) = &self.pmid {
            paper.url = Some(format!("https://pubmed.ncbi.nlm.nih.gov/{}/", pmid));
        }
        paper.pubmed_id = self.pmid;
        paper
    }
}

#[derive(Default)]
struct AuthorBuilder {
    last_name: String,
    fore_name: String,
    initials: String,
    collective: String,
}

impl AuthorBuilder {
    fn display(&self) -> Option<String> {
        if !self.collective.is_empty() {
            return Some(self.collective.clone());
        }
        if self.last_name.is_empty() {
            return None;
        }
        if !self.initials.is_empty() {
            Some(format!("{}. {}", self.initials, self.last_name))
        } else if !self.fore_name.is_empty() {
            Some(format!("{} {}", self.fore_name, self.last_name))
        } else {
            Some(self.last_name.clone())
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn append_text(target: &mut String, text: &str) {
    if !target.is_empty() {
        target.push(' ');
    }
    target.push_str(text);
}

fn month_number(raw: &str) -> Option<u32> {
    if let Ok(n) = raw.parse::<u32>() {
        return (1..=12).contains(&n).then_some(n);
    }
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let prefix = raw.get(..3)?.to_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == prefix)
        .map(|i| i as u32 + 1)
}

fn leading_year(raw: &str) -> Option<i32> {
    raw.split(|c: char| !c.is_ascii_digit())
        .find(|part| part.len() == 4)
        .and_then(|part| part.parse().ok())
}

fn id_type(e: &BytesStart) -> Option<String> {
    e.try_get_attribute("IdType")
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok().map(|v| v.to_string()))
}

/// Parses an efetch `PubmedArticleSet` document. Articles without a title are skipped.
pub fn parse_pubmed_xml(xml: &str) -> Result<Vec<PaperRecord>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut papers = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut article: Option<ArticleBuilder> = None;
    let mut author: Option<AuthorBuilder> = None;
    let mut article_id_type: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match name.as_str() {
                    "PubmedArticle" => article = Some(ArticleBuilder::default()),
                    "Author" => author = Some(AuthorBuilder::default()),
                    "ArticleId" => article_id_type = id_type(&e),
                    _ => {}
                }
                stack.push(name);
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                match name.as_ref() {
                    b"Author" => {
                        if let (Some(a), Some(builder)) = (article.as_mut(), author.take()) {
                            if let Some(display) = builder.display() {
                                a.authors.push(display);
                            }
                        }
                    }
                    b"PubmedArticle" => {
                        if let Some(builder) = article.take() {
                            if builder.title.trim().is_empty() {
                                tracing::warn!("Skipping PubMed article with empty title");
                            } else {
                                papers.push(builder.build());
                            }
                        }
                    }
                    b"ArticleId" => article_id_type = None,
                    _ => {}
                }
                stack.pop();
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| ReviewError::SourceUnavailable {
                        origin: SourceOrigin::PubMed,
                        message: format!("invalid efetch XML: {}", err),
                        transient: false,
                    })?
                    .to_string();
                let Some(a) = article.as_mut() else {
                    continue;
                };
                handle_text(a, author.as_mut(), article_id_type.as_deref(), &stack, &text);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ReviewError::SourceUnavailable {
                    origin: SourceOrigin::PubMed,
                    message: format!("invalid efetch XML at {}: {}", reader.buffer_position(), e),
                    transient: false,
                });
            }
            _ => {}
        }
    }

    Ok(papers)
}

fn handle_text(
    a: &mut ArticleBuilder,
    author: Option<&mut AuthorBuilder>,
    article_id_type: Option<&str>,
    stack: &[String],
    text: &str,
) {
    let inside = |name: &str| stack.iter().any(|s| s == name);
    let current = stack.last().map(String::as_str).unwrap_or_default();
    let parent = stack
        .len()
        .checked_sub(2)
        .and_then(|i| stack.get(i))
        .map(String::as_str)
        .unwrap_or_default();

    if inside("CommentsCorrectionsList") || inside("ReferenceList") {
        return;
    }

    if inside("ArticleTitle") {
        append_text(&mut a.title, text);
    } else if inside("AbstractText") {
        a.abstract_parts.push(text.to_string());
    } else if let Some(author) = author {
        match current {
            "LastName" => author.last_name = text.to_string(),
            "ForeName" => author.fore_name = text.to_string(),
            "Initials" => author.initials = text.to_string(),
            "CollectiveName" => append_text(&mut author.collective, text),
            _ => {}
        }
    } else if current == "PMID" && parent == "MedlineCitation" && a.pmid.is_none() {
        a.pmid = Some(text.to_string());
    } else if current == "Title" && parent == "Journal" {
        a.journal = Some(text.to_string());
    } else if current == "ArticleId" && article_id_type == Some("doi") && a.doi.is_none() {
        a.doi = Some(text.to_string());
    } else if inside("PubDate") {
        match current {
            "Year" if a.year.is_none() => a.year = text.parse().ok(),
            "Month" if a.month.is_none() => a.month = month_number(text),
            "Day" if a.day.is_none() => a.day = text.parse().ok(),
            "MedlineDate" if a.year.is_none() => a.year = leading_year(text),
            _ => {}
        }
    }
}
