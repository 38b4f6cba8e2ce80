//! Canonicalizes multi-suite reports into the single-suite shape the
//! Test Outcome Database accepts.
//!
//! Reports arriving from CI shards often carry several `<testsuite>` blocks
//! under one `<testsuites>` root. The database only understands one suite
//! per document, so the normalizer rebuilds the tree: one root carrying the
//! original aggregate counters, one suite carrying the original root's
//! attributes, and every test case re-parented under that suite. Provenance
//! fields riding on the old root are carried over, defaulting to empty text
//! when absent.
//!
//! A document that already has at most one suite is returned unchanged.

use super::document::{Counters, Element, ReportDocument};
use super::provenance::PROVENANCE_FIELDS;

/// Returns `true` if the document already has at most one suite node and
/// needs no rewriting.
pub fn is_canonical(doc: &ReportDocument) -> bool {
    doc.root.children_named("testsuite").count() <= 1
}

/// Rewrites a multi-suite report into the canonical single-suite shape.
///
/// Idempotent: a canonical document passes through untouched, so callers
/// may apply this unconditionally.
pub fn normalize(doc: ReportDocument) -> ReportDocument {
    if is_canonical(&doc) {
        return doc;
    }

    let old_root = doc.root;

    let mut new_root = Element::new("testsuites");
    Counters::from_attrs(&old_root).apply_to(&mut new_root);

    let mut suite = Element::new("testsuite");
    suite.attributes = old_root.attributes.clone();
    for case in old_root.descendants_named("testcase") {
        suite.children.push(case.clone());
    }
    new_root.children.push(suite);

    for field in PROVENANCE_FIELDS {
        let mut carried = Element::new(field);
        carried.text = Some(
            old_root
                .child_text(field)
                .unwrap_or_default()
                .to_string(),
        );
        new_root.children.push(carried);
    }

    ReportDocument { root: new_root }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTI_SUITE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuites tests="3" failures="1" errors="0" skipped="1" name="nightly">
  <testsuite name="unit" tests="2" failures="1">
    <testcase name="test_a"/>
    <testcase name="test_b">
      <failure message="boom">trace line 1</failure>
    </testcase>
  </testsuite>
  <testsuite name="smoke" tests="1" skipped="1">
    <testcase name="test_c">
      <system-out>log output</system-out>
    </testcase>
  </testsuite>
  <branch_name>main</branch_name>
  <gha_run_id>123</gha_run_id>
</testsuites>"#;

    #[test]
    fn test_canonical_document_is_untouched() {
        let doc = ReportDocument::from_str(
            r#"<testsuites tests="1"><testsuite tests="1"><testcase name="t"/></testsuite></testsuites>"#,
        )
        .unwrap();
        let before = doc.clone();
        assert!(is_canonical(&doc));
        assert_eq!(normalize(doc), before);
    }

    #[test]
    fn test_multi_suite_collapses_to_one() {
        let doc = ReportDocument::from_str(MULTI_SUITE).unwrap();
        assert!(!is_canonical(&doc));

        let normalized = normalize(doc);
        assert!(is_canonical(&normalized));
        assert_eq!(normalized.root.children_named("testsuite").count(), 1);
    }

    #[test]
    fn test_root_counters_preserved() {
        let normalized = normalize(ReportDocument::from_str(MULTI_SUITE).unwrap());
        let counters = Counters::from_attrs(&normalized.root);
        assert_eq!(
            counters,
            Counters {
                tests: 3,
                failures: 1,
                errors: 0,
                skipped: 1
            }
        );
    }

    #[test]
    fn test_suite_carries_old_root_attributes() {
        let normalized = normalize(ReportDocument::from_str(MULTI_SUITE).unwrap());
        let suite = normalized.root.find("testsuite").unwrap();
        assert_eq!(suite.attr("name"), Some("nightly"));
        assert_eq!(suite.attr("tests"), Some("3"));
    }

    #[test]
    fn test_testcases_reparented_with_children() {
        let normalized = normalize(ReportDocument::from_str(MULTI_SUITE).unwrap());
        let suite = normalized.root.find("testsuite").unwrap();
        let cases: Vec<_> = suite.children_named("testcase").collect();
        assert_eq!(cases.len(), 3);

        let failing = cases.iter().find(|c| c.attr("name") == Some("test_b")).unwrap();
        let failure = failing.find("failure").unwrap();
        assert_eq!(failure.attr("message"), Some("boom"));
        assert_eq!(failure.text.as_deref(), Some("trace line 1"));

        let logged = cases.iter().find(|c| c.attr("name") == Some("test_c")).unwrap();
        assert_eq!(logged.child_text("system-out"), Some("log output"));
    }

    #[test]
    fn test_provenance_copied_with_empty_defaults() {
        let normalized = normalize(ReportDocument::from_str(MULTI_SUITE).unwrap());
        assert_eq!(normalized.root.child_text("branch_name"), Some("main"));
        assert_eq!(normalized.root.child_text("gha_run_id"), Some("123"));
        // Absent in the input: carried over as empty text.
        let run_number = normalized.root.find("gha_run_number").unwrap();
        assert_eq!(run_number.text.as_deref().unwrap_or(""), "");
        let release = normalized.root.find("release_tag").unwrap();
        assert_eq!(release.text.as_deref().unwrap_or(""), "");
    }
}
