use crate::utils::error::{ReviewError, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Free-text research topic. Trimmed and guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic(String);

impl Topic {
    pub fn new(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ReviewError::MissingConfigError {
                field: "topic".to_string(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-cased topic words of three or more characters, stop words excluded.
    pub fn significant_words(&self) -> Vec<String> {
        self.0
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() >= 3)
            .map(|w| w.to_lowercase())
            .filter(|w| !STOP_WORDS.contains(&w.as_str()))
            .collect()
    }
}

const STOP_WORDS: &[&str] = &[
    "and", "are", "among", "between", "but", "for", "from", "how", "into", "its", "not", "the",
    "their", "this", "under", "via", "what", "with", "within", "without",
];

/// True when a word of `text` starts with `word` (case-insensitive), so
/// `microbiome` matches `microbiomes` but `and` does not match `understanding`.
pub fn contains_word(text: &str, word: &str) -> bool {
    let word = word.to_lowercase();
    text.split(|c: char| !c.is_alphanumeric())
        .any(|token| token.to_lowercase().starts_with(&word))
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered, non-empty keywords derived from a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordSet(Vec<String>);

impl KeywordSet {
    /// Builds a set from raw keywords, dropping blanks and case-insensitive duplicates.
    pub fn new<I, S>(keywords: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = std::collections::HashSet::new();
        let cleaned: Vec<String> = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .filter(|k| seen.insert(k.to_lowercase()))
            .collect();

        if cleaned.is_empty() {
            None
        } else {
            Some(Self(cleaned))
        }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Keeps the first `len` keywords; never drops below one.
    pub fn truncate(&mut self, len: usize) {
        self.0.truncate(len.max(1));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceOrigin {
    PubMed,
    Local,
    Scholar,
}

impl fmt::Display for SourceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceOrigin::PubMed => "PubMed",
            SourceOrigin::Local => "local",
            SourceOrigin::Scholar => "Scholar",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    pub title: String,
    pub authors: Vec<String>,
    pub published: Option<NaiveDate>,
    pub abstract_text: String,
    pub journal: Option<String>,
    pub url: Option<String>,
    pub doi: Option<String>,
    pub pubmed_id: Option<String>,
    pub origin: SourceOrigin,
}

impl PaperRecord {
    pub fn new(title: impl Into<String>, origin: SourceOrigin) -> Self {
        Self {
            title: title.into(),
            authors: Vec::new(),
            published: None,
            abstract_text: String::new(),
            journal: None,
            url: None,
            doi: None,
            pubmed_id: None,
            origin,
        }
    }

    pub fn year(&self) -> Option<i32> {
        self.published.map(|d| d.year())
    }

    /// Best link for the paper: DOI, then PubMed, then the source URL.
    pub fn link(&self) -> Option<String> {
        if let Some(doi) = self.doi.as_deref().filter(|d| !d.is_empty()) {
            return Some(format!("https://doi.org/{}", doi));
        }
        if let Some(pmid) = self.pubmed_id.as_deref().filter(|p| !p.is_empty()) {
            return Some(format!("https://pubmed.ncbi.nlm.nih.gov/{}/", pmid));
        }
        self.url.clone().filter(|u| !u.is_empty())
    }

    pub fn first_author(&self) -> Option<&str> {
        self.authors.first().map(String::as_str)
    }

    pub fn authors_display(&self) -> String {
        if self.authors.is_empty() {
            "Unknown authors".to_string()
        } else {
            self.authors.join(", ")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPaper {
    pub paper: PaperRecord,
    pub score: f64,
}

/// Papers ordered by non-increasing relevance score.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RankedPaperList(Vec<RankedPaper>);

impl RankedPaperList {
    /// Sorts by score descending, then newer publication first, then title.
    pub fn from_unsorted(mut papers: Vec<RankedPaper>) -> Self {
        papers.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.paper.published.cmp(&a.paper.published))
                .then_with(|| a.paper.title.cmp(&b.paper.title))
        });
        Self(papers)
    }

    pub fn papers(&self) -> &[RankedPaper] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<RankedPaper> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_sorted(&self) -> bool {
        self.0.windows(2).all(|w| w[0].score >= w[1].score)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedPapers {
    pub papers: Vec<RankedPaper>,
    pub requested: usize,
    pub shortfall: Option<Shortfall>,
}

/// Fewer papers were available than the configured minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortfall {
    pub requested: usize,
    pub found: usize,
}

impl Shortfall {
    pub fn as_error(&self) -> ReviewError {
        ReviewError::InsufficientPapers {
            requested: self.requested,
            found: self.found,
        }
    }
}

impl SelectedPapers {
    pub fn len(&self) -> usize {
        self.papers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.papers.is_empty()
    }

    /// Provisional marker for the paper at `position` (0-based).
    pub fn marker(position: usize) -> String {
        format!("[P{}]", position + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewType {
    Quick,
    Standard,
    Deep,
}

impl ReviewType {
    /// Number of body sections drafted for this tier.
    pub fn body_sections(&self) -> usize {
        match self {
            ReviewType::Quick => 2,
            ReviewType::Standard => 3,
            ReviewType::Deep => 4,
        }
    }
}

impl FromStr for ReviewType {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "quick" => Ok(ReviewType::Quick),
            "standard" => Ok(ReviewType::Standard),
            "deep" => Ok(ReviewType::Deep),
            other => Err(ReviewError::InvalidConfigValueError {
                field: "review_type".to_string(),
                value: other.to_string(),
                reason: "expected one of: quick, standard, deep".to_string(),
            }),
        }
    }
}

impl fmt::Display for ReviewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReviewType::Quick => "quick",
            ReviewType::Standard => "standard",
            ReviewType::Deep => "deep",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    PubMed,
    Local,
}

impl FromStr for SearchMethod {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pubmed" => Ok(SearchMethod::PubMed),
            "local" => Ok(SearchMethod::Local),
            other => Err(ReviewError::InvalidConfigValueError {
                field: "search_method".to_string(),
                value: other.to_string(),
                reason: "expected one of: pubmed, local".to_string(),
            }),
        }
    }
}

impl fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMethod::PubMed => f.write_str("pubmed"),
            SearchMethod::Local => f.write_str("local"),
        }
    }
}

/// Inputs shared by every paper source for one run.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub topic: Topic,
    pub keywords: KeywordSet,
    pub phrases: Vec<String>,
    pub results_per_phrase: usize,
    pub topic_results: usize,
}

impl SearchQuery {
    pub fn new(topic: Topic, keywords: KeywordSet) -> Self {
        Self {
            topic,
            keywords,
            phrases: Vec::new(),
            results_per_phrase: 10,
            topic_results: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftSection {
    pub heading: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewDraft {
    pub introduction: String,
    pub sections: Vec<DraftSection>,
    pub conclusion: String,
}

impl ReviewDraft {
    /// All narrative text in reading order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.introduction.as_str())
            .chain(self.sections.iter().map(|s| s.body.as_str()))
            .chain(std::iter::once(self.conclusion.as_str()))
    }
}

/// Citation index to paper, indices contiguous from 1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bibliography {
    entries: BTreeMap<usize, PaperRecord>,
}

impl Bibliography {
    pub fn push(&mut self, paper: PaperRecord) -> usize {
        let index = self.entries.len() + 1;
        self.entries.insert(index, paper);
        index
    }

    pub fn get(&self, index: usize) -> Option<&PaperRecord> {
        self.entries.get(&index)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.entries.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &PaperRecord)> {
        self.entries.iter().map(|(i, p)| (*i, p))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentReport {
    pub dangling_markers: Vec<String>,
    pub uncited_papers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalDocument {
    pub topic: Topic,
    pub keywords: KeywordSet,
    pub review_type: ReviewType,
    pub draft: ReviewDraft,
    pub bibliography: Bibliography,
    pub shortfall: Option<Shortfall>,
    pub alignment: AlignmentReport,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    KeywordsExtracted { keywords: Vec<String> },
    PapersFound { origin: SourceOrigin, count: usize },
    PapersRanked { count: usize },
    PapersSelected { selected: usize, requested: usize },
    SectionDrafted { heading: String },
    DraftGenerated { sections: usize },
    CitationsAligned { entries: usize },
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::KeywordsExtracted { keywords } => {
                write!(f, "Keywords extracted: {}", keywords.join(", "))
            }
            ProgressEvent::PapersFound { origin, count } => {
                write!(f, "{} papers found via {}", count, origin)
            }
            ProgressEvent::PapersRanked { count } => write!(f, "{} unique papers ranked", count),
            ProgressEvent::PapersSelected {
                selected,
                requested,
            } => write!(f, "{} papers selected (minimum {})", selected, requested),
            ProgressEvent::SectionDrafted { heading } => write!(f, "Drafted: {}", heading),
            ProgressEvent::DraftGenerated { sections } => {
                write!(f, "Draft generated with {} body sections", sections)
            }
            ProgressEvent::CitationsAligned { entries } => {
                write!(f, "Citations aligned: {} references", entries)
            }
        }
    }
}
