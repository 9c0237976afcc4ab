//! Chunked review generation: introduction, body sections, conclusion.
//!
//! Papers are shown to the model with provisional markers (`[P1]`, `[P2]`,
//! ...) which are replaced with final citation numbers during alignment.

use crate::domain::model::{
    DraftSection, ProgressEvent, RankedPaper, ReviewDraft, ReviewType, SelectedPapers, Topic,
};
use crate::domain::ports::{CompletionRequest, LanguageModel, ProgressSink};
use crate::utils::error::{ReviewError, Result};

const ABSTRACT_CHARS: usize = 1500;

/// Splits `len` items into `groups` contiguous ranges whose sizes differ by
/// at most one. Earlier ranges take the remainder.
pub fn partition(len: usize, groups: usize) -> Vec<std::ops::Range<usize>> {
    if len == 0 || groups == 0 {
        return Vec::new();
    }
    let groups = groups.min(len);
    let base = len / groups;
    let extra = len % groups;
    let mut start = 0;
    (0..groups)
        .map(|g| {
            let size = base + usize::from(g < extra);
            let range = start..start + size;
            start += size;
            range
        })
        .collect()
}

/// Separates a leading `## Heading` line from the section body.
pub fn split_heading(reply: &str, fallback: &str) -> (String, String) {
    let trimmed = reply.trim_start();
    if let Some(rest) = trimmed.strip_prefix('#') {
        let (line, body) = rest.split_once('\n').unwrap_or((rest, ""));
        let heading = line.trim_start_matches('#').trim();
        if !heading.is_empty() {
            return (heading.to_string(), body.trim().to_string());
        }
    }
    (fallback.to_string(), reply.trim().to_string())
}

fn describe(position: usize, paper: &RankedPaper) -> String {
    let p = &paper.paper;
    let abstract_text: String = if p.abstract_text.trim().is_empty() {
        "No abstract available".to_string()
    } else {
        p.abstract_text.chars().take(ABSTRACT_CHARS).collect()
    };
    format!(
        "{} {} ({}). {}.\nAbstract: {}",
        SelectedPapers::marker(position),
        p.title,
        p.year().map(|y| y.to_string()).unwrap_or_else(|| "n.d.".to_string()),
        p.authors_display(),
        abstract_text
    )
}

pub struct LiteratureReviewer {
    review_type: ReviewType,
}

impl LiteratureReviewer {
    pub fn new(review_type: ReviewType) -> Self {
        Self { review_type }
    }

    fn citation_rules() -> &'static str {
        "Cite papers only with their markers exactly as given, for example [P1] or [P2, P5]. \
Do not invent markers, do not add a reference list and do not use author-year citations."
    }

    fn paper_list(papers: &SelectedPapers, range: std::ops::Range<usize>) -> String {
        papers.papers[range.clone()]
            .iter()
            .zip(range)
            .map(|(paper, position)| describe(position, paper))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn introduction_prompt(topic: &Topic, papers: &SelectedPapers) -> String {
        format!(
            "Write the Introduction of an academic literature review on: {topic}\n\n\
Introduce the topic, explain why it matters and outline the themes covered by the papers below. \
Write 2-4 paragraphs of plain prose without a heading. {rules}\n\nPapers:\n{list}",
            rules = Self::citation_rules(),
            list = Self::paper_list(papers, 0..papers.len())
        )
    }

    fn section_prompt(
        topic: &Topic,
        papers: &SelectedPapers,
        range: std::ops::Range<usize>,
        number: usize,
        total: usize,
    ) -> String {
        format!(
            "Write the body section {number} of {total} of an academic literature review on: {topic}\n\n\
Synthesize the findings of the papers below: compare methods and results, note agreements and \
contradictions. Start your reply with a single line `## <section heading>` followed by the \
section text. Every paper below should be cited at least once. {rules}\n\nPapers:\n{list}",
            rules = Self::citation_rules(),
            list = Self::paper_list(papers, range)
        )
    }

    fn conclusion_prompt(topic: &Topic, sections: &[DraftSection]) -> String {
        let headings = sections
            .iter()
            .map(|s| format!("- {}", s.heading))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Write the Conclusion of an academic literature review on: {topic}\n\n\
The review covered these sections:\n{headings}\n\n\
Summarize the main findings, identify gaps in the literature and suggest directions for future \
research in 1-3 paragraphs of plain prose without a heading. {rules}",
            rules = Self::citation_rules()
        )
    }

    async fn call(&self, llm: &dyn LanguageModel, stage: &str, prompt: String) -> Result<String> {
        llm.complete(CompletionRequest::new(prompt))
            .await
            .map_err(|e| ReviewError::GenerationFailure {
                stage: stage.to_string(),
                message: e.to_string(),
            })
    }

    /// Drafts the whole review. Any failed call aborts the draft.
    pub async fn draft(
        &self,
        llm: &dyn LanguageModel,
        topic: &Topic,
        papers: &SelectedPapers,
        progress: &dyn ProgressSink,
    ) -> Result<ReviewDraft> {
        tracing::info!(
            "✍️ Drafting {} review with {} ({} papers)",
            self.review_type,
            llm.model_id(),
            papers.len()
        );

        let introduction = self
            .call(llm, "introduction", Self::introduction_prompt(topic, papers))
            .await?;
        progress.emit(&ProgressEvent::SectionDrafted {
            heading: "Introduction".to_string(),
        });

        let ranges = partition(papers.len(), self.review_type.body_sections());
        let total = ranges.len();
        let mut sections = Vec::with_capacity(total);
        for (i, range) in ranges.into_iter().enumerate() {
            let number = i + 1;
            let stage = format!("section {}", number);
            let reply = self
                .call(
                    llm,
                    &stage,
                    Self::section_prompt(topic, papers, range, number, total),
                )
                .await?;
            let (heading, body) = split_heading(&reply, &format!("Section {}", number));
            progress.emit(&ProgressEvent::SectionDrafted {
                heading: heading.clone(),
            });
            sections.push(DraftSection { heading, body });
        }

        let conclusion = self
            .call(llm, "conclusion", Self::conclusion_prompt(topic, &sections))
            .await?;
        progress.emit(&ProgressEvent::SectionDrafted {
            heading: "Conclusion".to_string(),
        });

        Ok(ReviewDraft {
            introduction,
            sections,
            conclusion,
        })
    }
}
