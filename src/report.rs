//! Report documents and the transformations applied to them.
//!
//! This module holds the in-memory document model plus the two distinct
//! reshaping operations the pipeline relies on: normalization of one
//! multi-suite document and merging of many shard documents. They encode
//! different rules (counter source, name cleanup, detail retention) and are
//! intentionally not unified.

pub mod document;
pub mod merge;
pub mod normalize;
pub mod provenance;
pub mod summary;

pub use document::{Counters, Element, ReportDocument, ReportError, ReportResult};
pub use merge::{MergedReport, clean_test_name, merge_directory, write_merged};
pub use normalize::{is_canonical, normalize};
pub use provenance::{PROVENANCE_FIELDS, Provenance};
