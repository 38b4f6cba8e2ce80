//! Merges a batch of shard reports into one document.
//!
//! CI jobs that shard a run produce one XML file per shard, all in a single
//! directory. The merger sums the four aggregate counters across shards and
//! concatenates the test cases under a single suite, cleaning each test
//! name for presentation and keeping only the `message` attribute of
//! failure and error children. Input files are never mutated; the result
//! is written to a new timestamp-named file.
//!
//! This is deliberately a different transformation from the normalizer:
//! the normalizer reshapes one document in place and preserves test-case
//! detail, while the merger combines many documents and keeps only what the
//! dashboard shows. The two are kept as separate operations.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::warn;

use super::document::{Counters, Element, ReportDocument, ReportResult};

/// Host-runner prefix that leaks into test names on some shards.
const HOST_PREFIX: &str = "[testhost] testhost: ";

/// Result of merging a directory of shard reports.
#[derive(Debug)]
pub struct MergedReport {
    /// The merged single-suite document.
    pub document: ReportDocument,

    /// Field-wise sums of the input counters.
    pub totals: Counters,

    /// Number of input files that contributed to the merge.
    pub files_merged: usize,
}

/// Cleans a shard-produced test name for presentation.
///
/// Strips the host prefix, truncates at the first `=`, trims surrounding
/// whitespace, then removes every occurrence of the word `that`.
pub fn clean_test_name(raw: &str) -> String {
    let stripped = raw.replace(HOST_PREFIX, "");
    match stripped.find('=') {
        Some(index) => stripped[..index].trim().replace("that", ""),
        None => stripped.trim().to_string(),
    }
}

/// Merges every `.xml` file in `input_dir` into one single-suite document.
///
/// Files are visited in sorted file-name order. Each file contributes the
/// counters read from its single `testsuite` node (missing counters read
/// as 0) and its test cases; a file with no test cases still contributes
/// its counters. A file without a `testsuite` node is skipped with a
/// warning.
///
/// # Errors
///
/// Fails if the directory cannot be read or any input file is not
/// well-formed XML.
pub fn merge_directory(input_dir: &Path, suite_name: &str) -> ReportResult<MergedReport> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(input_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "xml"))
        .collect();
    paths.sort();

    let mut totals = Counters::default();
    let mut suite = Element::new("testsuite");
    let mut files_merged = 0;

    for path in &paths {
        let doc = ReportDocument::parse(path)?;
        let Some(shard_suite) = doc.root.find("testsuite") else {
            warn!("{} has no testsuite node, skipping", path.display());
            continue;
        };

        totals += Counters::from_attrs(shard_suite);
        files_merged += 1;

        for case in shard_suite.children_named("testcase") {
            suite.children.push(merged_case(case));
        }
    }

    totals.apply_to(&mut suite);
    suite.set_attr("name", suite_name);

    let mut root = Element::new("testsuites");
    root.children.push(suite);

    Ok(MergedReport {
        document: ReportDocument { root },
        totals,
        files_merged,
    })
}

/// Rebuilds a test case for the merged document: cleaned name only, and a
/// failure or error child reduced to its `message` attribute.
fn merged_case(case: &Element) -> Element {
    let mut merged = Element::new("testcase");
    merged.set_attr("name", clean_test_name(case.attr("name").unwrap_or_default()));

    for detail in ["failure", "error"] {
        if let Some(child) = case.find(detail) {
            let mut kept = Element::new(detail);
            kept.set_attr("message", child.attr("message").unwrap_or_default());
            merged.children.push(kept);
            break;
        }
    }

    merged
}

/// File name for a merged report produced at the given time.
pub fn merged_file_name(label: &str, at: DateTime<Local>) -> String {
    format!("{}_{}_merged.xml", at.format("%Y%m%d%H%M"), label)
}

/// Writes the merged document to a new timestamp-named file in
/// `output_dir` and returns the path.
pub fn write_merged(
    report: &MergedReport,
    output_dir: &Path,
    label: &str,
) -> ReportResult<PathBuf> {
    let path = output_dir.join(merged_file_name(label, Local::now()));
    report.document.write_to(&path)?;
    Ok(path)
}
