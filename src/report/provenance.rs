//! CI provenance fields attached to report roots.
//!
//! Workflows stamp four elements onto a report before it reaches object
//! storage: the branch that produced it, the GitHub Actions run id and run
//! number, and the release tag of the software under test. Each field is
//! optional everywhere downstream; an absent field reads as empty text.

use super::document::{Element, ReportDocument};

/// The provenance fields carried as sibling elements of the root, in the
/// order they are written.
pub const PROVENANCE_FIELDS: [&str; 4] =
    ["branch_name", "gha_run_id", "gha_run_number", "release_tag"];

/// Provenance metadata for one CI run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provenance {
    pub branch_name: String,
    pub gha_run_id: String,
    pub gha_run_number: String,
    pub release_tag: String,
}

impl Provenance {
    /// Reads the provenance fields from a document root, substituting empty
    /// strings for absent fields.
    pub fn read(doc: &ReportDocument) -> Self {
        let field = |name: &str| doc.root.child_text(name).unwrap_or_default().to_string();
        Self {
            branch_name: field("branch_name"),
            gha_run_id: field("gha_run_id"),
            gha_run_number: field("gha_run_number"),
            release_tag: field("release_tag"),
        }
    }

    /// Appends the provenance fields to the document root as child elements.
    pub fn stamp(&self, doc: &mut ReportDocument) {
        let values = [
            &self.branch_name,
            &self.gha_run_id,
            &self.gha_run_number,
            &self.release_tag,
        ];
        for (name, value) in PROVENANCE_FIELDS.iter().zip(values) {
            let mut element = Element::new(*name);
            element.text = Some(value.clone());
            doc.root.children.push(element);
        }
    }
}
