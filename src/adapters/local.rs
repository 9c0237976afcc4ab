//! Pre-downloaded paper store: JSON-lines files under a directory tree,
//! one paper object per line.

use crate::domain::model::{PaperRecord, SearchQuery, SourceOrigin};
use crate::domain::ports::PaperSource;
use crate::utils::error::{ReviewError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const DEFAULT_LOCAL_LIMIT: usize = 160;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AuthorField {
    Joined(String),
    List(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct LocalPaper {
    title: Option<String>,
    #[serde(default, rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    authors: Option<AuthorField>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    doi: Option<String>,
    #[serde(default)]
    journal: Option<String>,
}

pub struct LocalSource {
    root: PathBuf,
}

impl LocalSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn paper_files(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(ReviewError::ConfigError {
                message: format!(
                    "local paper directory '{}' does not exist",
                    self.root.display()
                ),
            });
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| ReviewError::IoError(e.into()))?;
            let path = entry.path();
            if entry.file_type().is_file()
                && path.extension().and_then(|e| e.to_str()) == Some("jsonl")
            {
                files.push(path.to_path_buf());
            }
        }
        Ok(files)
    }
}

#[async_trait]
impl PaperSource for LocalSource {
    async fn search(&self, query: &SearchQuery, max_results: usize) -> Result<Vec<PaperRecord>> {
        let keywords: Vec<String> = query.keywords.iter().map(|k| k.to_lowercase()).collect();
        let mut papers = Vec::new();

        for path in self.paper_files()? {
            if papers.len() >= max_results {
                break;
            }
            let content = tokio::fs::read_to_string(&path).await?;
            for paper in parse_jsonl(&path, &content)? {
                if papers.len() >= max_results {
                    break;
                }
                if matches_any(&paper, &keywords) {
                    papers.push(paper);
                }
            }
        }

        tracing::info!(
            "📂 Local store: {} matching papers under {}",
            papers.len(),
            self.root.display()
        );
        Ok(papers)
    }

    fn origin(&self) -> SourceOrigin {
        SourceOrigin::Local
    }
}

fn matches_any(paper: &PaperRecord, keywords: &[String]) -> bool {
    let title = paper.title.to_lowercase();
    let abstract_text = paper.abstract_text.to_lowercase();
    keywords
        .iter()
        .any(|k| title.contains(k.as_str()) || abstract_text.contains(k.as_str()))
}

/// Accepts `YYYY`, `YYYY-MM` and `YYYY-MM-DD`.
pub fn parse_loose_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    let mut parts = raw.split(['-', '/']);
    let year: i32 = parts.next()?.trim().get(..4)?.parse().ok()?;
    let month: u32 = parts
        .next()
        .and_then(|m| m.trim().parse().ok())
        .unwrap_or(1);
    NaiveDate::from_ymd_opt(year, month, 1).or_else(|| NaiveDate::from_ymd_opt(year, 1, 1))
}

fn parse_jsonl(path: &Path, content: &str) -> Result<Vec<PaperRecord>> {
    let malformed = |line: usize, message: String| ReviewError::MalformedLocalData {
        path: path.display().to_string(),
        line,
        message,
    };

    let mut papers = Vec::new();
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let raw: LocalPaper =
            serde_json::from_str(line).map_err(|e| malformed(index + 1, e.to_string()))?;
        let title = raw
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| malformed(index + 1, "missing title".to_string()))?;

        let mut paper = PaperRecord::new(title, SourceOrigin::Local);
        paper.abstract_text = raw.abstract_text.unwrap_or_default();
        paper.published = raw.date.as_deref().and_then(parse_loose_date);
        paper.authors = match raw.authors {
            Some(AuthorField::List(list)) => list,
            Some(AuthorField::Joined(joined)) => joined
                .split([',', ';'])
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
            None => Vec::new(),
        };
        paper.url = raw.url.filter(|u| !u.is_empty());
        paper.doi = raw.doi.filter(|d| !d.is_empty());
        paper.journal = raw.journal.filter(|j| !j.is_empty());
        papers.push(paper);
    }
    Ok(papers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{KeywordSet, Topic};
    use std::fs;
    use tempfile::TempDir;

    fn query(keywords: &[&str]) -> SearchQuery {
        SearchQuery::new(
            Topic::new("gut microbiome and depression").unwrap(),
            KeywordSet::new(keywords.iter().copied()).unwrap(),
        )
    }

    fn write_store(dir: &Path) {
        fs::create_dir_all(dir.join("pubmed")).unwrap();
        fs::create_dir_all(dir.join("arxiv")).unwrap();
        fs::write(
            dir.join("pubmed/gut_microbiome.jsonl"),
            concat!(
                r#"{"title": "Gut microbiome and depression", "abstract": "A cohort study.", "date": "2020-05-01", "authors": "A. Smith, B. Jones", "doi": "10.1/a"}"#,
                "\n\n",
                r#"{"title": "Cardiac outcomes", "abstract": "Unrelated.", "date": "2018", "authors": ["C. Lee"]}"#,
                "\n"
            ),
        )
        .unwrap();
        fs::write(
            dir.join("arxiv/depression.jsonl"),
            r#"{"title": "Deep learning for mood", "abstract": "We model DEPRESSION severity.", "date": "2023-02", "authors": ["D. Kim"], "url": "https://arxiv.org/abs/1"}"#,
        )
        .unwrap();
        fs::write(dir.join("notes.txt"), "not a paper file").unwrap();
    }

    #[tokio::test]
    async fn filters_by_keyword_in_title_or_abstract() {
        let dir = TempDir::new().unwrap();
        write_store(dir.path());
        let source = LocalSource::new(dir.path());

        let papers = source
            .search(&query(&["microbiome", "depression"]), 10)
            .await
            .unwrap();

        let titles: Vec<_> = papers.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Deep learning for mood", "Gut microbiome and depression"]
        );
        assert_eq!(papers[1].authors, vec!["A. Smith", "B. Jones"]);
        assert_eq!(papers[1].year(), Some(2020));
        assert_eq!(papers[0].year(), Some(2023));
        assert!(papers.iter().all(|p| p.origin == SourceOrigin::Local));
    }

    #[tokio::test]
    async fn respects_max_results() {
        let dir = TempDir::new().unwrap();
        write_store(dir.path());
        let source = LocalSource::new(dir.path());

        let papers = source.search(&query(&["depression"]), 1).await.unwrap();
        assert_eq!(papers.len(), 1);
    }

    #[tokio::test]
    async fn malformed_line_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bad.jsonl"), "{\"title\": \"ok\"}\n{not json\n").unwrap();
        let source = LocalSource::new(dir.path());

        let err = source.search(&query(&["ok"]), 10).await.unwrap_err();
        match err {
            ReviewError::MalformedLocalData { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_directory_is_a_config_error() {
        let source = LocalSource::new("/definitely/not/here");
        let err = source.search(&query(&["x"]), 10).await.unwrap_err();
        assert!(matches!(err, ReviewError::ConfigError { .. }));
    }

    #[test]
    fn loose_dates() {
        assert_eq!(parse_loose_date("2019"), NaiveDate::from_ymd_opt(2019, 1, 1));
        assert_eq!(parse_loose_date("2019-07"), NaiveDate::from_ymd_opt(2019, 7, 1));
        assert_eq!(parse_loose_date("2019-07-15"), NaiveDate::from_ymd_opt(2019, 7, 15));
        assert_eq!(parse_loose_date("n.d."), None);
    }
}
