use crate::domain::model::{
    contains_word, RankedPaper, RankedPaperList, SelectedPapers, Shortfall, Topic,
};
use crate::domain::ports::{CompletionRequest, LanguageModel};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static RANK_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\[?(\d+)\]?\s*:\s*(\d+)").expect("valid rank line regex"));

const ABSTRACT_EXCERPT_CHARS: usize = 400;

/// Parses `row_index:assigned_value` lines. Rows outside `0..rows`, values
/// outside `1..=max_value` and repeated rows are ignored. Result is ordered
/// by assigned value, then row.
pub fn parse_rankings(reply: &str, rows: usize, max_value: usize) -> Vec<usize> {
    let mut seen = HashSet::new();
    let mut ranked: Vec<(usize, usize)> = reply
        .lines()
        .filter_map(|line| {
            let caps = RANK_LINE.captures(line)?;
            let row = caps[1].parse::<usize>().ok()?;
            let value = caps[2].parse::<usize>().ok()?;
            (row < rows && (1..=max_value).contains(&value)).then_some((row, value))
        })
        .filter(|(row, _)| seen.insert(*row))
        .collect();
    ranked.sort_by_key(|&(row, value)| (value, row));
    ranked.into_iter().map(|(row, _)| row).collect()
}

/// True when every significant topic word starts a word of the title, or
/// every one starts a word of the abstract.
pub fn is_exact_match(paper: &RankedPaper, topic_words: &[String]) -> bool {
    if topic_words.is_empty() {
        return false;
    }
    let paper = &paper.paper;
    topic_words.iter().all(|w| contains_word(&paper.title, w))
        || topic_words.iter().all(|w| contains_word(&paper.abstract_text, w))
}

pub struct PaperSelector {
    min_references: usize,
    headroom: usize,
}

impl PaperSelector {
    pub fn new(min_references: usize) -> Self {
        Self {
            min_references: min_references.max(1),
            headroom: 20,
        }
    }

    pub fn with_headroom(mut self, headroom: usize) -> Self {
        self.headroom = headroom;
        self
    }

    pub fn target(&self) -> usize {
        self.min_references + self.headroom
    }

    fn prompt(topic: &Topic, candidates: &[RankedPaper], slots: usize) -> String {
        let rows = candidates
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let excerpt: String = p.paper.abstract_text.chars().take(ABSTRACT_EXCERPT_CHARS).collect();
                format!("{}: {} | {}", i, p.paper.title, excerpt)
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You are selecting papers for a literature review on the topic: {topic}\n\n\
Below is a table of candidate papers, one per row, formatted as `row_index: title | abstract`.\n\
Choose at most {slots} papers that are most relevant to the topic. For every row return one line \
formatted exactly as row_index:assigned_value where assigned_value is 0 to exclude the paper, or \
1 to {slots} to rank it (1 = most important). Return only these lines.\n\n{rows}"
        )
    }

    /// Chooses the papers the review will cite. Never fails: a failed
    /// ranking call falls back to rank order.
    pub async fn select(
        &self,
        llm: &dyn LanguageModel,
        topic: &Topic,
        ranked: RankedPaperList,
    ) -> SelectedPapers {
        let requested = self.min_references;
        let available = ranked.len();

        if available <= requested {
            let shortfall = (available < requested).then_some(Shortfall {
                requested,
                found: available,
            });
            if let Some(s) = &shortfall {
                tracing::warn!("⚠️ {}", s.as_error());
            }
            return SelectedPapers {
                papers: ranked.into_vec(),
                requested,
                shortfall,
            };
        }

        let target = self.target();
        let topic_words = topic.significant_words();
        let (mut selected, others): (Vec<RankedPaper>, Vec<RankedPaper>) = ranked
            .into_vec()
            .into_iter()
            .partition(|p| is_exact_match(p, &topic_words));
        selected.truncate(target);
        tracing::info!("🎯 {} exact topic matches", selected.len());

        let slots = target - selected.len();
        let mut taken = vec![false; others.len()];
        if slots > 0 && !others.is_empty() {
            let request = CompletionRequest::new(Self::prompt(topic, &others, slots));
            match llm.complete(request).await {
                Ok(reply) => {
                    for row in parse_rankings(&reply, others.len(), slots).into_iter().take(slots) {
                        taken[row] = true;
                        selected.push(others[row].clone());
                    }
                    tracing::debug!("🧮 Model ranking chose {} papers", selected.len());
                }
                Err(e) => {
                    tracing::warn!("⚠️ Paper ranking call failed ({}); selecting by score", e);
                }
            }
        }

        for (row, paper) in others.into_iter().enumerate() {
            if selected.len() >= requested {
                break;
            }
            if !taken[row] {
                selected.push(paper);
            }
        }
        selected.truncate(target);

        SelectedPapers {
            papers: selected,
            requested,
            shortfall: None,
        }
    }
}
