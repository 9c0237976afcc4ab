use crate::domain::model::{FinalDocument, PaperRecord};
use crate::domain::ports::Storage;
use crate::utils::error::Result;
use std::fmt::Write as _;

pub const MARKDOWN_FILE: &str = "literature_review.md";
pub const JSON_FILE: &str = "literature_review.json";

const KEY_POINTS_CHARS: usize = 200;

/// First two sentences of an abstract, at most 200 characters.
pub fn key_points(abstract_text: &str) -> String {
    let text = abstract_text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return "No abstract available".to_string();
    }

    let mut end = text.len();
    let mut sentences = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '?' | '!') && chars.peek().map_or(true, |(_, n)| *n == ' ') {
            sentences += 1;
            if sentences == 2 {
                end = i + c.len_utf8();
                break;
            }
        }
    }
    let summary = &text[..end];

    if summary.chars().count() > KEY_POINTS_CHARS {
        let cut: String = summary.chars().take(KEY_POINTS_CHARS - 3).collect();
        format!("{}...", cut.trim_end())
    } else {
        summary.to_string()
    }
}

fn year_label(paper: &PaperRecord) -> String {
    paper
        .year()
        .map(|y| y.to_string())
        .unwrap_or_else(|| "n.d.".to_string())
}

/// `Authors. (Year). Title. Journal. Available at: <link>`
pub fn reference_line(index: usize, paper: &PaperRecord) -> String {
    let mut line = format!(
        "[{}] {}. ({}). {}.",
        index,
        paper.authors_display().trim_end_matches('.'),
        year_label(paper),
        paper.title.trim().trim_end_matches('.')
    );
    if let Some(journal) = paper.journal.as_deref().filter(|j| !j.trim().is_empty()) {
        let _ = write!(line, " {}.", journal.trim().trim_end_matches('.'));
    }
    if let Some(link) = paper.link() {
        let _ = write!(line, " Available at: {}", link);
    }
    line
}

fn warnings(doc: &FinalDocument) -> Vec<String> {
    let mut notes = Vec::new();
    if let Some(shortfall) = &doc.shortfall {
        notes.push(format!(
            "Only {} of the {} requested references could be found.",
            shortfall.found, shortfall.requested
        ));
    }
    if !doc.alignment.dangling_markers.is_empty() {
        notes.push(format!(
            "{} citation(s) without a matching paper were removed from the text.",
            doc.alignment.dangling_markers.len()
        ));
    }
    notes
}

pub fn render_markdown(doc: &FinalDocument) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Literature Review: {}\n", doc.topic);

    let notes = warnings(doc);
    if !notes.is_empty() {
        for note in &notes {
            let _ = writeln!(out, "> **Note:** {}", note);
        }
        out.push('\n');
    }

    let _ = writeln!(
        out,
        "*Review type: {} · Keywords: {}*\n",
        doc.review_type,
        doc.keywords.as_slice().join(", ")
    );

    let _ = writeln!(out, "## Introduction\n\n{}\n", doc.draft.introduction.trim());
    for section in &doc.draft.sections {
        let _ = writeln!(out, "## {}\n\n{}\n", section.heading, section.body.trim());
    }
    let _ = writeln!(out, "## Conclusion\n\n{}\n", doc.draft.conclusion.trim());

    out.push_str("## References\n\n");
    for (index, paper) in doc.bibliography.iter() {
        let _ = writeln!(out, "{}\n", reference_line(index, paper));
    }

    if !doc.bibliography.is_empty() {
        out.push_str("## Reference Details\n\n");
        for (index, paper) in doc.bibliography.iter() {
            let _ = writeln!(out, "<details>\n<summary>[{}] {}</summary>\n", index, paper.title);
            let _ = writeln!(out, "- **Authors:** {}", paper.authors_display());
            let _ = writeln!(out, "- **Year:** {}", year_label(paper));
            if let Some(link) = paper.link() {
                let _ = writeln!(out, "- **Link:** [{}]({})", link, link);
            }
            let _ = writeln!(out, "- **Key points:** {}", key_points(&paper.abstract_text));
            out.push_str("\n</details>\n\n");
        }
    }

    out
}

/// Writes the Markdown review and its JSON form; returns the written paths.
pub async fn publish<S: Storage>(storage: &S, doc: &FinalDocument) -> Result<Vec<String>> {
    let markdown = render_markdown(doc);
    storage.write_file(MARKDOWN_FILE, markdown.as_bytes()).await?;

    let json = serde_json::to_vec_pretty(doc)?;
    storage.write_file(JSON_FILE, &json).await?;

    tracing::info!("📁 Review written: {}, {}", MARKDOWN_FILE, JSON_FILE);
    Ok(vec![MARKDOWN_FILE.to_string(), JSON_FILE.to_string()])
}
