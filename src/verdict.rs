//! Verdict and metadata extraction from a normalized report.
//!
//! Once a document is canonical, the publisher needs five values: a
//! pass/fail verdict, the software name and its semantic version, a CI tag
//! string, and the branch name. All of them tolerate absent fields.

use crate::release::ReleaseLookup;
use crate::report::ReportDocument;

/// Placeholder branch name when the report carries none.
const BRANCH_PLACEHOLDER: &str = "N/A";

/// Software name reported when no filename keyword matches.
pub const UNKNOWN_SOFTWARE: &str = "unknown software type";

/// Filename keyword to software name, matched in order; first match wins.
pub const SOFTWARE_NAMES: [(&str, &str); 8] = [
    ("cli", "linode-cli"),
    ("sdk", "linode_api4"),
    ("linodego", "linodego"),
    ("terraform", "linode-terraform"),
    ("packer", "packer"),
    ("ansible", "ansible_linode"),
    ("py_metadata", "py-metadata"),
    ("go_metadata", "go-metadata"),
];

/// Everything the publisher needs to know about one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// True iff the report recorded zero failures.
    pub pass: bool,

    /// Semantic version of the software under test.
    pub release_version: String,

    /// Software name resolved from the file name.
    pub software_name: String,

    /// CI tag string, empty when run id or run number is missing.
    pub tag: String,

    /// Branch the run came from, `"N/A"` when absent.
    pub branch_name: String,
}

/// Derives the verdict and metadata for a normalized document.
///
/// The release lookup is only consulted when the document itself carries no
/// non-empty `release_tag`; a lookup miss yields an empty version rather
/// than an error.
pub async fn extract<R: ReleaseLookup + ?Sized>(
    doc: &ReportDocument,
    file_name: &str,
    releases: &R,
) -> Verdict {
    let release_version = match doc.root.child_text("release_tag").filter(|t| !t.is_empty()) {
        Some(tag) => tag.to_string(),
        None => releases.latest_version(file_name).await.unwrap_or_default(),
    };

    Verdict {
        pass: failures(doc) == 0,
        release_version,
        software_name: software_name(file_name).to_string(),
        tag: build_tag(doc),
        branch_name: doc
            .root
            .child_text("branch_name")
            .unwrap_or(BRANCH_PLACEHOLDER)
            .to_string(),
    }
}

/// Failure count: root-level `failures` field first, then the suite's
/// `failures` attribute, then 0.
fn failures(doc: &ReportDocument) -> u64 {
    doc.root
        .child_text("failures")
        .filter(|t| !t.trim().is_empty())
        .or_else(|| {
            doc.root
                .find("testsuite")
                .and_then(|suite| suite.attr("failures"))
        })
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(0)
}

/// Resolves the software name from the report file name, in table order.
pub fn software_name(file_name: &str) -> &'static str {
    SOFTWARE_NAMES
        .iter()
        .find(|(keyword, _)| file_name.contains(keyword))
        .map(|(_, name)| *name)
        .unwrap_or(UNKNOWN_SOFTWARE)
}

/// CI tag: `"GHA ID: <run_id> Run ID: <run_number>"` when both fields carry
/// text, empty otherwise.
fn build_tag(doc: &ReportDocument) -> String {
    let run_id = doc.root.child_text("gha_run_id").unwrap_or_default();
    let run_number = doc.root.child_text("gha_run_number").unwrap_or_default();

    if run_id.is_empty() || run_number.is_empty() {
        String::new()
    } else {
        format!("GHA ID: {run_id} Run ID: {run_number}")
    }
}
