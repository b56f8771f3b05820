//! Markdown rendering of answers, lab reports and the category table.

use std::fmt::Write as _;

use crate::catalog::IndexCatalog;
use crate::category::KeywordTable;
use crate::lab::ScoreReport;
use crate::service::Answer;

pub const NO_RELATED_INFORMATION: &str = "⚠️ No related information was found in the documents.";

#[must_use]
pub fn render_answer(answer: &Answer) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "### Search results: {}\n", answer.category);

    if answer.hits.is_empty() {
        let _ = writeln!(out, "{NO_RELATED_INFORMATION}");
    }
    for (i, hit) in answer.hits.iter().enumerate() {
        let _ = writeln!(out, "**{}.** `{}`\n\n{}\n", i + 1, hit.source, hit.content.trim());
    }

    if let Some(text) = &answer.generated {
        let _ = writeln!(out, "\n### Answer\n\n{}", text.trim());
    }
    out
}

#[must_use]
pub fn render_report(report: &ScoreReport) -> String {
    let severity = report.severity();
    let mut out = String::from("### Lab analysis\n\n");
    let _ = writeln!(out, "Score: **{}**\n", report.total);
    let _ = writeln!(out, "{severity}: {}\n", severity.summary());

    if let Some(advisory) = report.advisory {
        let _ = writeln!(out, "> {advisory}");
    }
    for finding in &report.findings {
        let _ = writeln!(out, "- {} (+{})", finding.message, finding.weight);
    }
    out
}

/// One line per routable category: slug, collection and triggers.
#[must_use]
pub fn render_categories(table: &KeywordTable, catalog: &IndexCatalog) -> String {
    let mut out = String::from("| Category | Slug | Collection | Triggers |\n|---|---|---|---|\n");
    for (category, triggers) in table.entries() {
        let _ = writeln!(
            out,
            "| {category} | {} | {} | {} |",
            category.slug().unwrap_or("-"),
            catalog.collection(*category).as_deref().unwrap_or("-"),
            triggers.join(", ")
        );
    }
    out
}
