//! Renders a [`Review`] into the markdown body posted back to the forge
//! as a pull-request review comment.
//!
//! Output is capped at [`MAX_RENDERED_BYTES`]; a review whose rendering
//! would exceed the cap is truncated at a UTF-8 character boundary and
//! closed with a `[Output truncated]` marker, so a pathologically large
//! LLM response can never blow past the forge's own comment-size limit.

use reviewer_types::{FindingType, Priority, Review, RiskEstimate, TicketCompliance};

/// The forge's practical single-comment size limit; rendering never
/// exceeds this many bytes.
pub const MAX_RENDERED_BYTES: usize = 65_000;

const TRUNCATION_MARKER: &str = "\n\n_[Output truncated]_\n";

/// Render `review` into a complete markdown document, truncating if
/// necessary to stay within [`MAX_RENDERED_BYTES`].
pub fn render(review: &Review) -> String {
    let mut out = String::new();

    out.push_str(&format!("## {} Code Review\n\n", risk_glyph(review.overall_risk)));
    out.push_str(&review.summary);
    out.push_str("\n\n");

    if !review.findings.is_empty() {
        out.push_str("### Top Findings\n\n");
        for priority in [Priority::CRITICAL, Priority::WARNING, Priority::INFO] {
            let in_priority: Vec<_> = review.findings.iter().filter(|f| f.priority == priority).collect();
            if in_priority.is_empty() {
                continue;
            }
            out.push_str(&format!("**{}**\n\n", priority_heading(priority)));
            for finding in in_priority {
                out.push_str(&format!(
                    "- `{}` [{}] {}\n  - {}\n",
                    finding.location(),
                    finding_type_label(finding.finding_type),
                    finding.message,
                    finding.evidence,
                ));
                if let Some(patch) = &finding.suggested_patch {
                    out.push_str("  - suggested patch:\n    ```diff\n");
                    for line in patch.lines() {
                        out.push_str("    ");
                        out.push_str(line);
                        out.push('\n');
                    }
                    out.push_str("    ```\n");
                }
            }
            out.push('\n');
        }
    }

    if !review.suggested_tests.is_empty() {
        out.push_str("### Suggested Tests\n\n");
        for test in &review.suggested_tests {
            out.push_str(&format!("- {test}\n"));
        }
        out.push('\n');
    }

    if !review.risk_hotspots.is_empty() {
        out.push_str("### Risk Hotspots\n\n");
        for hotspot in &review.risk_hotspots {
            out.push_str(&format!("- {hotspot}\n"));
        }
        out.push('\n');
    }

    if !review.files_reviewed.is_empty() || !review.files_skipped.is_empty() {
        out.push_str("### Files\n\n");
        if !review.files_reviewed.is_empty() {
            out.push_str(&format!("Reviewed: {}\n\n", review.files_reviewed.join(", ")));
        }
        if !review.files_skipped.is_empty() {
            out.push_str(&format!("Skipped: {}\n\n", review.files_skipped.join(", ")));
        }
    }

    if let Some(note) = &review.truncation_note {
        out.push_str("### Truncation Note\n\n");
        out.push_str(note);
        out.push_str("\n\n");
    }

    if let Some(not_reviewed) = &review.not_reviewed {
        out.push_str("### What Was Not Reviewed\n\n");
        out.push_str(not_reviewed);
        out.push_str("\n\n");
    }

    if let Some(compliance) = &review.ticket_compliance {
        if !compliance.is_empty() {
            out.push_str("### Ticket Compliance\n\n");
            for ticket in compliance {
                render_ticket_compliance(&mut out, ticket);
            }
        }
    }

    truncate_to_budget(out)
}

fn render_ticket_compliance(out: &mut String, ticket: &TicketCompliance) {
    out.push_str(&format!("**{}** — {}\n\n", ticket.ticket_key, ticket.ticket_summary));
    if !ticket.fully_compliant.is_empty() {
        out.push_str("- Fully compliant:\n");
        for item in &ticket.fully_compliant {
            out.push_str(&format!("  - {item}\n"));
        }
    }
    if !ticket.not_compliant.is_empty() {
        out.push_str("- Not compliant:\n");
        for item in &ticket.not_compliant {
            out.push_str(&format!("  - {item}\n"));
        }
    }
    if !ticket.needs_human_verification.is_empty() {
        out.push_str("- Needs human verification:\n");
        for item in &ticket.needs_human_verification {
            out.push_str(&format!("  - {item}\n"));
        }
    }
    out.push('\n');
}

fn risk_glyph(risk: RiskEstimate) -> &'static str {
    match risk {
        RiskEstimate::Low => "🟢",
        RiskEstimate::Medium => "🟡",
        RiskEstimate::High => "🔴",
    }
}

fn priority_heading(priority: Priority) -> &'static str {
    match priority {
        Priority::CRITICAL => "Critical",
        Priority::WARNING => "Warning",
        _ => "Info",
    }
}

fn finding_type_label(kind: FindingType) -> &'static str {
    match kind {
        FindingType::Bug => "bug",
        FindingType::Security => "security",
        FindingType::Performance => "performance",
        FindingType::Style => "style",
        FindingType::Tests => "tests",
        FindingType::Docs => "docs",
    }
}

/// Truncate `rendered` to fit within [`MAX_RENDERED_BYTES`] including the
/// truncation marker, cutting at the nearest preceding UTF-8 character
/// boundary rather than splitting a multi-byte codepoint.
fn truncate_to_budget(rendered: String) -> String {
    if rendered.len() <= MAX_RENDERED_BYTES {
        return rendered;
    }
    let budget = MAX_RENDERED_BYTES - TRUNCATION_MARKER.len();
    let mut cut = budget.min(rendered.len());
    while cut > 0 && !rendered.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut truncated = rendered[..cut].to_string();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}
