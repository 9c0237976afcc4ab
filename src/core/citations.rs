//! Replaces provisional `[P<k>]` markers with numbered citations and builds
//! the bibliography in order of first citation.

use crate::domain::model::{
    AlignmentReport, Bibliography, DraftSection, ReviewDraft, SelectedPapers,
};
use crate::utils::error::ReviewError;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

// `P3`, `P2-P4`, `P5–P6` or `P7-9`.
const MARKER_ITEM: &str = r"P\d+(?:\s*[-\x{2013}\x{2014}]\s*P?\d+)?";

const NUMERIC_ITEMS: &str = r"\d+(?:\s*[-\x{2013}]\s*\d+)?(?:\s*,\s*\d+(?:\s*[-\x{2013}]\s*\d+)?)*";

static MARKER_GROUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"([ \t]*)\[\s*({item}(?:\s*[,;]\s*{item})*)\s*\]",
        item = MARKER_ITEM
    ))
    .expect("valid marker regex")
});

static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"P(\d+)(?:\s*[-\x{2013}\x{2014}]\s*P?(\d+))?").expect("valid marker regex")
});

static PROVISIONAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\s*P\d+").expect("valid marker regex"));

static NUMERIC_GROUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\[({})\]", NUMERIC_ITEMS)).expect("valid citation regex")
});

/// A numeric group with the blanks before it, for removal.
static STRAY_NUMERIC_GROUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"[ \t]*\[{}\]", NUMERIC_ITEMS)).expect("valid citation regex")
});

#[derive(Debug, Clone)]
pub struct AlignedReview {
    pub draft: ReviewDraft,
    pub bibliography: Bibliography,
    pub report: AlignmentReport,
}

/// Formats ascending unique indices, compressing runs of three or more:
/// `[1, 2, 3, 5]` becomes `[1-3, 5]`.
pub fn format_group(indices: &[usize]) -> String {
    let mut parts = Vec::new();
    let mut i = 0;
    while i < indices.len() {
        let mut j = i;
        while j + 1 < indices.len() && indices[j + 1] == indices[j] + 1 {
            j += 1;
        }
        if j - i >= 2 {
            parts.push(format!("{}-{}", indices[i], indices[j]));
        } else {
            parts.extend(indices[i..=j].iter().map(|n| n.to_string()));
        }
        i = j + 1;
    }
    format!("[{}]", parts.join(", "))
}

/// Every citation index in `text`, ranges expanded, in reading order.
pub fn extract_citation_indices(text: &str) -> Vec<usize> {
    let mut indices = Vec::new();
    for group in NUMERIC_GROUP.captures_iter(text) {
        for part in group[1].split(',') {
            match part.split_once(['-', '\u{2013}']) {
                Some((start, end)) => {
                    if let (Ok(start), Ok(end)) =
                        (start.trim().parse::<usize>(), end.trim().parse::<usize>())
                    {
                        indices.extend(start..=end);
                    }
                }
                None => {
                    if let Ok(n) = part.trim().parse::<usize>() {
                        indices.push(n);
                    }
                }
            }
        }
    }
    indices
}

/// True when provisional markers are still present.
pub fn has_provisional_markers(text: &str) -> bool {
    PROVISIONAL.is_match(text)
}

struct Aligner<'a> {
    papers: &'a SelectedPapers,
    assigned: HashMap<usize, usize>,
    bibliography: Bibliography,
    report: AlignmentReport,
}

impl<'a> Aligner<'a> {
    fn align(&mut self, text: &str) -> String {
        let text = self.strip_numeric_groups(text);
        self.rewrite(&text)
    }

    /// Numeric citations in a draft were written by the model, not by
    /// alignment, so none of them refer to a bibliography entry.
    fn strip_numeric_groups(&mut self, text: &str) -> String {
        STRAY_NUMERIC_GROUP
            .replace_all(text, |caps: &Captures| {
                self.dangling(caps[0].trim().to_string());
                String::new()
            })
            .into_owned()
    }

    fn rewrite(&mut self, text: &str) -> String {
        MARKER_GROUP
            .replace_all(text, |caps: &Captures| {
                let mut indices = Vec::new();
                for item in MARKER.captures_iter(&caps[2]) {
                    let Ok(first) = item[1].parse::<usize>() else {
                        continue;
                    };
                    let last = item
                        .get(2)
                        .and_then(|m| m.as_str().parse::<usize>().ok())
                        .unwrap_or(first);
                    indices.extend(self.indices_for(first.min(last), first.max(last)));
                }
                indices.sort_unstable();
                indices.dedup();
                if indices.is_empty() {
                    String::new()
                } else {
                    format!("{}{}", &caps[1], format_group(&indices))
                }
            })
            .into_owned()
    }

    /// Bibliography indices for markers `first..=last`. The part of the
    /// range past the selected papers is recorded as one dangling marker.
    fn indices_for(&mut self, first: usize, last: usize) -> Vec<usize> {
        let known = self.papers.len();
        if first == 0 {
            self.dangling("[P0]".to_string());
        }
        let valid_end = last.min(known);
        let indices = (first.max(1)..=valid_end).map(|k| self.index_for(k)).collect();

        let bad_start = first.max(1).max(known + 1);
        if last >= bad_start {
            let marker = if bad_start == last {
                format!("[P{}]", last)
            } else {
                format!("[P{}-P{}]", bad_start, last)
            };
            self.dangling(marker);
        }
        indices
    }

    /// Bibliography index for provisional marker `k` (`1..=papers`),
    /// assigning the next free index on first use.
    fn index_for(&mut self, k: usize) -> usize {
        if let Some(&index) = self.assigned.get(&k) {
            return index;
        }
        let index = self.bibliography.push(self.papers.papers[k - 1].paper.clone());
        self.assigned.insert(k, index);
        index
    }

    fn dangling(&mut self, marker: String) {
        tracing::warn!("⚠️ {}; removed", ReviewError::AlignmentInconsistency {
            marker: marker.clone()
        });
        self.report.dangling_markers.push(marker);
    }
}

/// Aligns the draft's markers with a bibliography of the cited papers.
/// Never fails: dangling markers are dropped and reported.
pub fn align_citations(draft: ReviewDraft, papers: &SelectedPapers) -> AlignedReview {
    let mut aligner = Aligner {
        papers,
        assigned: HashMap::new(),
        bibliography: Bibliography::default(),
        report: AlignmentReport::default(),
    };

    let introduction = aligner.align(&draft.introduction);
    let sections = draft
        .sections
        .iter()
        .map(|s| DraftSection {
            heading: s.heading.clone(),
            body: aligner.align(&s.body),
        })
        .collect();
    let conclusion = aligner.align(&draft.conclusion);

    aligner.report.uncited_papers = papers.len() - aligner.bibliography.len();
    if aligner.report.uncited_papers > 0 {
        tracing::info!(
            "📚 {} selected papers were not cited and are left out of the references",
            aligner.report.uncited_papers
        );
    }

    AlignedReview {
        draft: ReviewDraft {
            introduction,
            sections,
            conclusion,
        },
        bibliography: aligner.bibliography,
        report: aligner.report,
    }
}
