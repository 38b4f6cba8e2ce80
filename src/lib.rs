//! uplink: CI test-report aggregation and publication.
//!
//! This crate collects JUnit-style XML reports produced by CI shards,
//! normalizes them into the single-suite document the Test Outcome
//! Database accepts, derives a pass/fail verdict plus provenance metadata,
//! and publishes the result over HTTP. Successfully published reports are
//! removed from intermediate object storage; anything that fails stays put
//! and is retried by the next batch run.
//!
//! # Architecture
//!
//! The main components are:
//!
//! - **Report**: document model, normalizer, shard merger, summaries
//! - **Verdict**: pass/fail and metadata extraction
//! - **Publish**: envelope construction and HTTP submission
//! - **Pipeline**: the per-file list/download/normalize/publish/delete loop
//! - **Storage / Release / Secrets**: narrow traits over the external
//!   collaborators, with subprocess- and HTTP-backed implementations
//!
//! # Example
//!
//! ```no_run
//! use uplink::config::Settings;
//! use uplink::pipeline::Pipeline;
//! use uplink::publish::HttpTod;
//! use uplink::release::GithubReleases;
//! use uplink::storage::LinodeCliStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::from_env()?;
//!     let store = LinodeCliStore::new(&settings.cluster, &settings.bucket)
//!         .with_env(settings.credentials.clone());
//!     let sink = HttpTod::new(&settings.url, std::time::Duration::from_secs(10))?;
//!     let releases = GithubReleases::new()?;
//!
//!     let outcome = Pipeline::new(settings, store, sink, releases).run().await?;
//!     println!("published {} report(s)", outcome.published());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod logging;
pub mod pipeline;
pub mod publish;
pub mod release;
pub mod report;
pub mod secrets;
pub mod storage;
pub mod verdict;

// Re-export commonly used types
pub use config::Settings;
pub use pipeline::{BatchOutcome, FileOutcome, Pipeline};
pub use publish::{HttpTod, SubmitStatus, TodSink, TodSubmission};
pub use report::{ReportDocument, normalize};
pub use storage::{LinodeCliStore, ObjectStore};
pub use verdict::Verdict;
