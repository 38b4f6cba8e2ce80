//! Object-storage access for report files.
//!
//! The pipeline needs exactly three operations against object storage:
//! list the bucket contents, download one object, remove one object. They
//! are expressed as a narrow trait so the orchestrator can be tested with
//! an in-memory store; the production implementation shells out to the
//! `linode-cli` binary and inspects only stdout text and exit codes.

pub mod linode;

use std::path::Path;

use async_trait::async_trait;

pub use linode::LinodeCliStore;

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from the object-storage collaborator.
///
/// Every variant is an `ExternalCallFailure` in pipeline terms: logged,
/// the affected file marked failed, and the batch continues.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The storage command could not be started at all.
    #[error("failed to launch {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    /// The storage command ran and exited non-zero.
    #[error("{command} exited with code {code}: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    /// The storage command exceeded the fixed timeout.
    #[error("{command} timed out after {timeout_secs}s")]
    Timeout { command: String, timeout_secs: u64 },
}

/// The three storage operations the pipeline depends on.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Lists every object path visible in the cluster, one
    /// `cluster/bucket/...` path per entry.
    async fn list(&self) -> StoreResult<Vec<String>>;

    /// Downloads the named object from the bucket to `destination`.
    async fn download(&self, name: &str, destination: &Path) -> StoreResult<()>;

    /// Removes the named object from the bucket.
    async fn remove(&self, name: &str) -> StoreResult<()>;
}
