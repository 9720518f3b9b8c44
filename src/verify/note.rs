//! Markdown research note rendering

use crate::verify::{Claim, FinancialsSummary, ResearchDraft, VerificationReport};
use serde_json::Value;
use std::fmt::Write;

/// Periods shown in the snapshot table
const SNAPSHOT_PERIODS: usize = 4;

const UNCITED: &str = "[Uncited]";

/// Render the draft as a markdown note
///
/// Uncited claims are marked inline; a failed report appends a disclaimer
/// listing the issues rather than withholding the note.
pub fn render_note(draft: &ResearchDraft, report: &VerificationReport) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "# Equity Research Note: {}\n", draft.ticker);

    md.push_str("## 1. Business & Fundamentals\n\n");
    if let Some(fundamentals) = &draft.fundamentals {
        if let Some(summary) = &fundamentals.financials_summary {
            render_snapshot(&mut md, summary);
        }
        render_claims(&mut md, "Key Growth Drivers", &fundamentals.drivers);
        render_claims(&mut md, "Key Risks", &fundamentals.risks);
        render_claims(&mut md, "Related Evidence", &fundamentals.related_evidence);
    } else {
        md.push_str("_No fundamentals section._\n\n");
    }

    md.push_str("## 2. Valuation Analysis\n\n");
    if let Some(valuation) = &draft.valuation {
        if let Some(inputs) = &valuation.inputs {
            let _ = writeln!(md, "- **Last Close**: {}", number(inputs.last_close));
            let _ = writeln!(
                md,
                "- **EPS Proxy (Annualized)**: {}",
                number(inputs.eps_ttm_proxy)
            );
            if !inputs.sql_evidence_ids.is_empty() {
                let _ = writeln!(
                    md,
                    "\n*Source: Internal DB (IDs: {})*",
                    inputs.sql_evidence_ids.join(", ")
                );
            }
        }

        if let Some(range) = valuation.valuation_range.as_ref().filter(|r| r.base.is_some()) {
            md.push_str("\n**Implied Valuation Range**:\n");
            let _ = writeln!(md, "- Low: {}", number(range.low));
            let _ = writeln!(md, "- Base: {}", number(range.base));
            let _ = writeln!(md, "- High: {}", number(range.high));
        }

        if !valuation.assumptions.is_empty() {
            md.push_str("\n**Key Assumptions**:\n");
            for claim in &valuation.assumptions {
                let name = claim.label.as_deref().unwrap_or("Assumption");
                let value = claim
                    .value
                    .as_ref()
                    .map(cell)
                    .unwrap_or_else(|| claim.text.clone());
                let _ = writeln!(md, "- {}: {}{}", name, value, citation(claim));
            }
        }
    } else {
        md.push_str("_No valuation section._\n");
    }

    if !report.passed {
        md.push_str("\n---\n**Verification Warning**: some claims are not backed by evidence.\n");
        for issue in &report.issues {
            let _ = writeln!(md, "- {}", issue);
        }
    }

    md
}

fn render_snapshot(md: &mut String, summary: &FinancialsSummary) {
    let periods: Vec<&String> = summary.periods.iter().take(SNAPSHOT_PERIODS).collect();
    if periods.is_empty() {
        return;
    }

    // Line items in first-seen order across the shown periods
    let mut items: Vec<&String> = Vec::new();
    for period in &periods {
        if let Some(values) = summary.panel.get(*period) {
            for item in values.keys() {
                if !items.contains(&item) {
                    items.push(item);
                }
            }
        }
    }

    md.push_str("### Financial Snapshot (Quarterly)\n");
    let header: Vec<&str> = periods.iter().map(|p| p.as_str()).collect();
    let _ = writeln!(md, "| Line Item | {} |", header.join(" | "));
    let _ = writeln!(md, "|---| {} |", vec!["---"; periods.len()].join(" | "));

    for item in items {
        let row: Vec<String> = periods
            .iter()
            .map(|p| {
                summary
                    .panel
                    .get(*p)
                    .and_then(|values| values.get(item))
                    .map(cell)
                    .unwrap_or_else(|| "-".to_string())
            })
            .collect();
        let _ = writeln!(md, "| {} | {} |", item, row.join(" | "));
    }

    if !summary.sql_evidence_ids.is_empty() {
        let _ = writeln!(
            md,
            "\n*Source: Internal DB (IDs: {})*",
            summary.sql_evidence_ids.join(", ")
        );
    }
    md.push('\n');
}

fn render_claims(md: &mut String, title: &str, claims: &[Claim]) {
    if claims.is_empty() {
        return;
    }
    let _ = writeln!(md, "### {}", title);
    for claim in claims {
        let _ = writeln!(md, "- {}{}", claim.text.trim(), citation(claim));
    }
    md.push('\n');
}

fn citation(claim: &Claim) -> String {
    if claim.is_cited() {
        let ids: Vec<&str> = claim.references().map(String::as_str).collect();
        format!(" [Ids: {}]", ids.join(", "))
    } else {
        format!(" {}", UNCITED)
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn number(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
