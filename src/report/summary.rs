//! Human-readable summaries of a single report.
//!
//! Renders the pass/fail/error/skip counts of a report plus the names of
//! failing and erroring cases, in the Slack-flavored markdown the team
//! posts to its CI channel.

use super::document::{Counters, ReportDocument};

/// Renders a Slack-markdown summary of the report.
///
/// Counts come from the first `testsuite` node found at any depth
/// (missing counters read as 0). A case counts as failed when its
/// `failure` child carries text; as errored when its `error` child carries
/// text, falling back to `system-out` text when the error detail is empty.
pub fn render(doc: &ReportDocument) -> String {
    let counters = doc
        .root
        .descendants_named("testsuite")
        .first()
        .map(|suite| Counters::from_attrs(suite))
        .unwrap_or_default();

    let mut failures = Vec::new();
    let mut errors = Vec::new();

    for case in doc.root.descendants_named("testcase") {
        let name = case.attr("name").unwrap_or("Unknown Test");

        let failed = case
            .find("failure")
            .and_then(|f| f.text.as_deref())
            .is_some_and(|t| !t.trim().is_empty());
        if failed {
            failures.push(format!("• `{name}`"));
        }

        let error_text = case
            .find("error")
            .and_then(|e| e.text.as_deref())
            .filter(|t| !t.trim().is_empty())
            .or_else(|| {
                case.child_text("system-out")
                    .filter(|t| !t.trim().is_empty())
            });
        if error_text.is_some() {
            errors.push(format!("• `{name}`"));
        }
    }

    let mut summary = format!(
        "*Test Summary*\n:white_check_mark: Passed: {} :x: Failed: {} :warning: Errors: {} :fast_forward: Skipped: {} :scroll: Total: {}\n",
        counters.passed(),
        counters.failures,
        counters.errors,
        counters.skipped,
        counters.tests,
    );

    if !failures.is_empty() {
        summary.push_str("\n:x: *Test Failures:*\n");
        summary.push_str(&failures.join("\n"));
        summary.push('\n');
    }

    if !errors.is_empty() {
        summary.push_str("\n:warning: *Test Errors:*\n");
        summary.push_str(&errors.join("\n"));
        summary.push('\n');
    }

    summary.trim().to_string()
}
