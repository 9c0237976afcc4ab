//! Cross-source deduplication and relevance scoring.
//!
//! ```text
//! keyword_match = Σ_k (1.0 if k in title, 0.5 if only in abstract) / |K|
//! topic_cover   = share of significant topic words found in title or abstract
//! recency       = 1 / (1 + max(0, reference_year - year) / 5), 0 when undated
//! score         = 0.6 * keyword_match + 0.25 * topic_cover + 0.15 * recency
//! ```

use crate::domain::model::{
    contains_word, KeywordSet, PaperRecord, RankedPaper, RankedPaperList, Topic,
};
use chrono::Datelike;
use std::collections::HashMap;

const KEYWORD_WEIGHT: f64 = 0.6;
const TOPIC_WEIGHT: f64 = 0.25;
const RECENCY_WEIGHT: f64 = 0.15;
const RECENCY_HALF_LIFE_YEARS: f64 = 5.0;

/// Lower-cases and keeps alphanumeric words separated by single spaces.
pub fn normalize(text: &str) -> String {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `J`, `JA` or `J.A.`: up to three capitals, dots allowed.
fn is_initials(token: &str) -> bool {
    let letters: Vec<char> = token.chars().filter(|c| *c != '.').collect();
    !letters.is_empty() && letters.len() <= 3 && letters.iter().all(|c| c.is_uppercase())
}

/// Last word of the surname in author strings such as `"J. Smith"`,
/// `"Smith J"`, `"Smith, John"` or `"van der Berg JA"`.
fn surname(author: &str) -> String {
    let name = match author.split_once(',') {
        Some((last, _)) => last,
        None => {
            let words: Vec<&str> = author.split_whitespace().collect();
            match words.as_slice() {
                [] => "",
                [.., last, initials] if is_initials(initials) && !is_initials(last) => last,
                [.., last] => last,
            }
        }
    };
    normalize(name)
        .rsplit(' ')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Deduplication key: normalized title plus first author surname.
pub fn dedup_key(paper: &PaperRecord) -> String {
    format!(
        "{}|{}",
        normalize(&paper.title),
        paper.first_author().map(surname).unwrap_or_default()
    )
}

fn merge_into(kept: &mut PaperRecord, other: PaperRecord) {
    if other.abstract_text.len() > kept.abstract_text.len() {
        let mut richer = other;
        std::mem::swap(kept, &mut richer);
        fill_missing(kept, richer);
    } else {
        fill_missing(kept, other);
    }
}

fn fill_missing(kept: &mut PaperRecord, other: PaperRecord) {
    if kept.doi.is_none() {
        kept.doi = other.doi;
    }
    if kept.pubmed_id.is_none() {
        kept.pubmed_id = other.pubmed_id;
    }
    if kept.url.is_none() {
        kept.url = other.url;
    }
    if kept.journal.is_none() {
        kept.journal = other.journal;
    }
    if kept.published.is_none() {
        kept.published = other.published;
    }
    if kept.authors.is_empty() {
        kept.authors = other.authors;
    }
}

/// Merges papers from all sources, keeping first-seen order of unique keys.
pub fn deduplicate(batches: Vec<Vec<PaperRecord>>) -> Vec<PaperRecord> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<PaperRecord> = Vec::new();

    for paper in batches.into_iter().flatten() {
        if normalize(&paper.title).is_empty() {
            continue;
        }
        let key = dedup_key(&paper);
        match positions.get(&key) {
            Some(&i) => merge_into(&mut unique[i], paper),
            None => {
                positions.insert(key, unique.len());
                unique.push(paper);
            }
        }
    }
    unique
}

pub struct Ranker {
    reference_year: i32,
}

impl Ranker {
    pub fn new(reference_year: i32) -> Self {
        Self { reference_year }
    }

    pub fn score(&self, paper: &PaperRecord, topic: &Topic, keywords: &KeywordSet) -> f64 {
        let title = paper.title.to_lowercase();
        let abstract_text = paper.abstract_text.to_lowercase();

        let keyword_match = keywords
            .iter()
            .map(|k| {
                let k = k.to_lowercase();
                if title.contains(&k) {
                    1.0
                } else if abstract_text.contains(&k) {
                    0.5
                } else {
                    0.0
                }
            })
            .sum::<f64>()
            / keywords.len().max(1) as f64;

        let topic_words = topic.significant_words();
        let topic_cover = if topic_words.is_empty() {
            0.0
        } else {
            topic_words
                .iter()
                .filter(|w| {
                    contains_word(&paper.title, w) || contains_word(&paper.abstract_text, w)
                })
                .count() as f64
                / topic_words.len() as f64
        };

        let recency = paper
            .year()
            .map(|year| {
                let age = (self.reference_year - year).max(0) as f64;
                1.0 / (1.0 + age / RECENCY_HALF_LIFE_YEARS)
            })
            .unwrap_or(0.0);

        KEYWORD_WEIGHT * keyword_match + TOPIC_WEIGHT * topic_cover + RECENCY_WEIGHT * recency
    }

    /// Deduplicates every source batch and returns papers by descending score.
    pub fn rank(
        &self,
        batches: Vec<Vec<PaperRecord>>,
        topic: &Topic,
        keywords: &KeywordSet,
    ) -> RankedPaperList {
        let scored = deduplicate(batches)
            .into_iter()
            .map(|paper| RankedPaper {
                score: self.score(&paper, topic, keywords),
                paper,
            })
            .collect();
        RankedPaperList::from_unsorted(scored)
    }
}

impl Default for Ranker {
    fn default() -> Self {
        Self::new(chrono::Utc::now().year())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::SourceOrigin;
    use chrono::NaiveDate;

    fn paper(title: &str, author: &str, year: i32, abstract_text: &str) -> PaperRecord {
        let mut p = PaperRecord::new(title, SourceOrigin::Local);
        p.authors = vec![author.to_string()];
        p.published = NaiveDate::from_ymd_opt(year, 1, 1);
        p.abstract_text = abstract_text.to_string();
        p
    }

    fn topic() -> Topic {
        Topic::new("gut microbiome and depression").unwrap()
    }

    fn keywords() -> KeywordSet {
        KeywordSet::new(["gut microbiome", "depression", "probiotics"]).unwrap()
    }

    #[test]
    fn normalize_collapses_punctuation_and_case() {
        assert_eq!(normalize("  The Gut–Brain Axis: A Review. "), "the gut brain axis a review");
    }

    #[test]
    fn surname_handles_common_author_styles() {
        assert_eq!(surname("J. Smith"), "smith");
        assert_eq!(surname("Smith J"), "smith");
        assert_eq!(surname("Smith, John"), "smith");
        assert_eq!(surname("John Smith"), "smith");
        assert_eq!(surname("J. van der Berg"), "berg");
        assert_eq!(surname("van der Berg J"), "berg");
        assert_eq!(surname("van der Berg, Jan"), "berg");
        assert_eq!(surname("de la Cruz M.A."), "cruz");
        assert_eq!(surname("M. Valles-Colomer"), "colomer");
        assert_eq!(surname("Valles-Colomer M"), "colomer");
    }

    #[test]
    fn multi_word_surnames_dedupe_across_sources() {
        let mut pubmed = paper("Same title", "J. van der Berg", 2021, "from PubMed");
        pubmed.origin = SourceOrigin::PubMed;
        let local = paper("Same title", "van der Berg J", 2021, "");

        assert_eq!(deduplicate(vec![vec![pubmed], vec![local]]).len(), 1);
    }

    #[test]
    fn merging_the_same_paper_twice_yields_one_record() {
        let a = paper("Gut microbiome and depression", "J. Smith", 2020, "short");
        let mut b = paper("GUT MICROBIOME AND DEPRESSION.", "Smith J", 2020, "a much longer abstract");
        b.doi = Some("10.1/x".to_string());

        let list = Ranker::new(2024).rank(vec![vec![a.clone()], vec![b, a]], &topic(), &keywords());
        assert_eq!(list.len(), 1);
        let kept = &list.papers()[0].paper;
        assert_eq!(kept.abstract_text, "a much longer abstract");
        assert_eq!(kept.doi.as_deref(), Some("10.1/x"));
    }

    #[test]
    fn different_first_authors_are_distinct() {
        let a = paper("Probiotics review", "A. Smith", 2020, "");
        let b = paper("Probiotics review", "B. Jones", 2020, "");
        assert_eq!(deduplicate(vec![vec![a, b]]).len(), 2);
    }

    #[test]
    fn ranked_scores_are_non_increasing() {
        let batch = vec![
            paper("Unrelated cardiology trial", "A. A", 1990, "Heart."),
            paper("Gut microbiome and depression", "B. B", 2023, "Probiotics help."),
            paper("Depression outcomes", "C. C", 2010, "No microbes."),
            paper("Probiotics in gut microbiome", "D. D", 2015, "Depression scores fell."),
            paper("Undated gut note", "E. E", 2000, ""),
        ];
        let list = Ranker::new(2024).rank(vec![batch], &topic(), &keywords());
        assert!(list.is_sorted());
        assert_eq!(list.papers()[0].paper.title, "Gut microbiome and depression");
        assert_eq!(
            list.papers().last().map(|p| p.paper.title.as_str()),
            Some("Unrelated cardiology trial")
        );
    }

    #[test]
    fn recency_breaks_equal_relevance() {
        let ranker = Ranker::new(2024);
        let new = ranker.score(&paper("Depression", "A", 2023, ""), &topic(), &keywords());
        let old = ranker.score(&paper("Depression", "A", 1995, ""), &topic(), &keywords());
        assert!(new > old);
    }

    #[test]
    fn future_dates_do_not_exceed_full_recency() {
        let ranker = Ranker::new(2020);
        let s = ranker.score(&paper("x", "A", 2030, ""), &topic(), &keywords());
        assert!((s - RECENCY_WEIGHT).abs() < 1e-9);
    }
}
