use crate::domain::model::{KeywordSet, Topic};
use crate::domain::ports::{CompletionRequest, LanguageModel};
use crate::utils::error::{ReviewError, Result};
use regex::Regex;
use std::sync::LazyLock;

static LIST_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:\d+\s*[.):]|[-*•])\s*").expect("valid list prefix regex"));

/// Number of search phrases and results per phrase for a reference target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchPlan {
    pub phrases: usize,
    pub results_per_phrase: usize,
    pub topic_results: usize,
}

impl SearchPlan {
    pub fn for_min_references(min_references: usize) -> Self {
        let (phrases, results_per_phrase) = match min_references {
            96.. => (42, 20),
            80..=95 => (38, 18),
            60..=79 => (35, 16),
            50..=59 => (32, 14),
            40..=49 => (24, 12),
            30..=39 => (18, 10),
            20..=29 => (16, 10),
            _ => (2, 10),
        };
        Self {
            phrases,
            results_per_phrase,
            topic_results: 20,
        }
    }
}

/// Splits a line-oriented model reply into clean entries: numbering,
/// bullets and surrounding quotes are removed.
pub fn parse_lines(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(|line| {
            LIST_PREFIX
                .replace(line, "")
                .trim()
                .trim_matches(|c| c == '"' || c == '\'' || c == '`')
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

pub struct KeywordExtractor {
    max_keywords: usize,
}

impl KeywordExtractor {
    pub fn new(max_keywords: usize) -> Self {
        Self {
            max_keywords: max_keywords.max(1),
        }
    }

    fn prompt(&self, topic: &Topic) -> String {
        format!(
            "Given this research topic, identify the {n} most important keywords or phrases that best \
describe the core topic and methodology. The first keyword should be the primary topic. \
Order them from most important to least important. Keywords/phrases should be 1 or 2 words only. \
Return exactly {n} keywords, one per line, with no numbering or commentary.\n\n\
Research topic: {topic}",
            n = self.max_keywords,
            topic = topic
        )
    }

    pub async fn extract(&self, llm: &dyn LanguageModel, topic: &Topic) -> Result<KeywordSet> {
        let reply = llm
            .complete(CompletionRequest::new(self.prompt(topic)).with_max_tokens(100))
            .await
            .map_err(|e| ReviewError::ExtractionFailure {
                message: e.to_string(),
            })?;

        let mut keywords =
            KeywordSet::new(parse_lines(&reply)).ok_or_else(|| ReviewError::ExtractionFailure {
                message: format!("no keywords could be parsed from reply: {:?}", reply),
            })?;
        keywords.truncate(self.max_keywords);
        tracing::info!("🔑 Keywords: {}", keywords.as_slice().join(", "));
        Ok(keywords)
    }
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Generates alternative search phrases for live literature search.
pub struct PhraseGenerator;

impl PhraseGenerator {
    fn prompt(topic: &Topic, count: usize) -> String {
        format!(
            "Given this research topic, generate {count} alternative search phrases that would help find \
relevant papers. The phrases should be similar in meaning but use different terminology or focus on \
different aspects. Each phrase should be 3-6 words long. Try to include commonly used phrases within \
the field that are relevant to the topic, while still using common enough keywords to get results \
from a literature search. Return exactly {count} phrases, one per line.\n\n\
Research topic: {topic}"
        )
    }

    /// Phrases for the topic; failures degrade to an empty list.
    pub async fn generate(&self, llm: &dyn LanguageModel, topic: &Topic, count: usize) -> Vec<String> {
        if count == 0 {
            return Vec::new();
        }
        match llm.complete(CompletionRequest::new(Self::prompt(topic, count))).await {
            Ok(reply) => {
                let mut phrases = parse_lines(&reply);
                phrases.truncate(count);
                tracing::debug!("🔁 Generated {} search phrases", phrases.len());
                phrases
            }
            Err(e) => {
                tracing::warn!(
                    "⚠️ Search phrase generation failed ({}); searching with topic and keywords only",
                    e
                );
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::ScriptedModel;

    #[test]
    fn parse_lines_strips_numbering_and_bullets() {
        let reply = "1. Gut microbiome\n2) \"depression\"\n\n- probiotics\n* mood disorders\n5-HT receptors\n";
        assert_eq!(
            parse_lines(reply),
            vec![
                "Gut microbiome",
                "depression",
                "probiotics",
                "mood disorders",
                "5-HT receptors"
            ]
        );
    }

    #[test]
    fn search_plan_table() {
        assert_eq!(SearchPlan::for_min_references(3).phrases, 2);
        assert_eq!(SearchPlan::for_min_references(20).phrases, 16);
        assert_eq!(SearchPlan::for_min_references(45).results_per_phrase, 12);
        assert_eq!(SearchPlan::for_min_references(100).phrases, 42);
        assert_eq!(SearchPlan::for_min_references(96).results_per_phrase, 20);
    }

    #[tokio::test]
    async fn extracts_non_empty_keywords() {
        let model = ScriptedModel::new().reply(
            "most important keywords",
            "Gut microbiome\nDepression\nGut microbiome\nProbiotics\nInflammation\nBrain axis\nDiet",
        );
        let topic = Topic::new("gut microbiome and depression").unwrap();

        let keywords = KeywordExtractor::default().extract(&model, &topic).await.unwrap();
        assert_eq!(
            keywords.as_slice(),
            &["Gut microbiome", "Depression", "Probiotics", "Inflammation", "Brain axis"]
        );
    }

    #[tokio::test]
    async fn blank_reply_is_extraction_failure() {
        let model = ScriptedModel::new().reply("most important keywords", "\n  \n");
        let topic = Topic::new("anything").unwrap();

        let err = KeywordExtractor::default().extract(&model, &topic).await.unwrap_err();
        assert!(matches!(err, ReviewError::ExtractionFailure { .. }));
    }

    #[tokio::test]
    async fn llm_error_is_extraction_failure() {
        let model = ScriptedModel::new();
        let topic = Topic::new("anything").unwrap();

        let err = KeywordExtractor::default().extract(&model, &topic).await.unwrap_err();
        assert!(matches!(err, ReviewError::ExtractionFailure { .. }));
    }

    #[tokio::test]
    async fn phrase_failure_degrades_to_empty() {
        let model = ScriptedModel::new();
        let topic = Topic::new("anything").unwrap();
        assert!(PhraseGenerator.generate(&model, &topic, 2).await.is_empty());
    }

    #[tokio::test]
    async fn phrases_are_truncated_to_count() {
        let model = ScriptedModel::new().reply(
            "alternative search phrases",
            "gut brain axis depression\nmicrobiota mood disorders\nprobiotic antidepressant effects",
        );
        let topic = Topic::new("gut microbiome and depression").unwrap();
        let phrases = PhraseGenerator.generate(&model, &topic, 2).await;
        assert_eq!(
            phrases,
            vec!["gut brain axis depression", "microbiota mood disorders"]
        );
    }
}
