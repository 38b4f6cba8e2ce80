//! Batch orchestration: list, download, normalize, publish, delete.
//!
//! Each candidate file moves through a fixed sequence of states:
//!
//! ```text
//! LISTED ──► DOWNLOADED ──► NORMALIZED ──► PUBLISHED ──► DELETED
//!    │            │              │              │
//!    └────────────┴──────┬───────┴──────────────┘
//!                        ▼
//!                  FAILED(stage)
//! ```
//!
//! Failures are isolated per file: a download error, malformed document, or
//! rejected submission marks that file failed and the loop moves on. A file
//! is deleted from object storage only after the database confirmed the
//! submission with HTTP 201; a failed delete is logged but the file still
//! counts as published. Everything that is not deleted is retried naturally
//! on the next batch run.
//!
//! Files are processed strictly one at a time. The per-file step sequence
//! has no cross-file dependency, so this could be parallelized later, but a
//! low-frequency CI job gains more from debuggable, attributable logs than
//! from throughput.

use std::path::Path;

use tracing::{error, info};

use crate::config::Settings;
use crate::publish::{SubmitStatus, TodSink, TodSubmission, encode_report};
use crate::release::ReleaseLookup;
use crate::report::{ReportDocument, normalize};
use crate::storage::ObjectStore;
use crate::verdict;

/// Extension that marks an object as a candidate report.
const REPORT_EXTENSION: &str = ".xml";

/// Pipeline stage a file failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Download,
    Normalize,
    Publish,
    Delete,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Download => "download",
            Stage::Normalize => "normalize",
            Stage::Publish => "publish",
            Stage::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Terminal state of one candidate file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// The database accepted the submission. `deleted` is false when the
    /// cleanup delete failed afterwards; the publication still stands.
    Published { deleted: bool },

    /// Processing stopped at `stage`; the object remains in storage for a
    /// future run (except failed deletes, reported as `Published`).
    Failed { stage: Stage, reason: String },
}

/// Result of one batch run.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Per-file outcomes in processing order.
    pub files: Vec<(String, FileOutcome)>,
}

impl BatchOutcome {
    /// Number of files the database accepted.
    pub fn published(&self) -> usize {
        self.files
            .iter()
            .filter(|(_, o)| matches!(o, FileOutcome::Published { .. }))
            .count()
    }

    /// Number of files that failed at some stage.
    pub fn failed(&self) -> usize {
        self.files.len() - self.published()
    }

    /// True when every candidate was published.
    pub fn success(&self) -> bool {
        self.failed() == 0
    }
}

/// Selects candidate object names from a raw storage listing.
///
/// A line qualifies when it mentions the bucket and ends in the report
/// extension; the candidate name is the last path segment.
pub fn select_candidates(lines: &[String], bucket: &str) -> Vec<String> {
    lines
        .iter()
        .filter(|line| line.contains(bucket) && line.ends_with(REPORT_EXTENSION))
        .filter_map(|line| line.rsplit('/').next())
        .map(str::to_string)
        .collect()
}

/// Drives every candidate file through the full state machine.
pub struct Pipeline<S, T, R> {
    settings: Settings,
    store: S,
    sink: T,
    releases: R,
}

impl<S, T, R> Pipeline<S, T, R>
where
    S: ObjectStore,
    T: TodSink,
    R: ReleaseLookup,
{
    /// Creates a pipeline over the given collaborators.
    pub fn new(settings: Settings, store: S, sink: T, releases: R) -> Self {
        Self {
            settings,
            store,
            sink,
            releases,
        }
    }

    /// Runs one batch: lists the bucket and processes each candidate in
    /// listing order. Individual failures never abort the batch.
    ///
    /// # Errors
    ///
    /// Only the initial listing and report-directory creation can fail the
    /// whole batch; there is nothing to process without them.
    pub async fn run(&self) -> anyhow::Result<BatchOutcome> {
        let listing = self.store.list().await?;
        let candidates = select_candidates(&listing, &self.settings.bucket);

        info!(
            "found {} candidate report(s) in bucket {}",
            candidates.len(),
            self.settings.bucket
        );

        std::fs::create_dir_all(&self.settings.report_dir)?;

        let mut outcome = BatchOutcome::default();
        for name in candidates {
            let file_outcome = self.process_file(&name).await;
            match &file_outcome {
                FileOutcome::Published { deleted: true } => {
                    info!("{name}: published and removed from object storage");
                }
                FileOutcome::Published { deleted: false } => {
                    info!("{name}: published, cleanup delete failed");
                }
                FileOutcome::Failed { stage, reason } => {
                    error!("{name}: failed at {stage}: {reason}");
                }
            }
            outcome.files.push((name, file_outcome));
        }

        Ok(outcome)
    }

    async fn process_file(&self, name: &str) -> FileOutcome {
        let destination = self.settings.report_dir.join(name);

        if let Err(e) = self.store.download(name, &destination).await {
            return FileOutcome::Failed {
                stage: Stage::Download,
                reason: e.to_string(),
            };
        }

        let (document, xml) = match self.canonical_document(&destination) {
            Ok(result) => result,
            Err(e) => {
                return FileOutcome::Failed {
                    stage: Stage::Normalize,
                    reason: e.to_string(),
                };
            }
        };

        let verdict = verdict::extract(&document, name, &self.releases).await;
        let submission =
            TodSubmission::new(self.settings.team_name.clone(), &verdict, encode_report(&xml));

        match self.sink.submit(&submission).await {
            SubmitStatus::Accepted => {
                info!("{name}: uploaded to TOD");
                match self.store.remove(name).await {
                    Ok(()) => FileOutcome::Published { deleted: true },
                    Err(e) => {
                        error!("{name}: deleting from object storage failed: {e}");
                        FileOutcome::Published { deleted: false }
                    }
                }
            }
            SubmitStatus::Rejected(status) => FileOutcome::Failed {
                stage: Stage::Publish,
                reason: format!("POST request failed with status code {status}"),
            },
            SubmitStatus::Unreachable(reason) => FileOutcome::Failed {
                stage: Stage::Publish,
                reason,
            },
        }
    }

    /// Parses the downloaded file, normalizes it when it carries more than
    /// one suite, and writes the canonical form back over the download.
    fn canonical_document(&self, path: &Path) -> anyhow::Result<(ReportDocument, String)> {
        let document = normalize(ReportDocument::parse(path)?);
        let xml = document.to_xml_string()?;
        std::fs::write(path, &xml)?;
        Ok((document, xml))
    }
}

/// Prints an end-of-batch summary to the console.
pub fn print_summary(outcome: &BatchOutcome) {
    println!();
    println!("Batch Results:");
    println!("  Candidates: {}", outcome.files.len());
    println!("  Published:  {}", console::style(outcome.published()).green());
    println!("  Failed:     {}", console::style(outcome.failed()).red());

    if outcome.files.is_empty() {
        println!();
        println!("{}", console::style("Nothing to publish.").dim());
    } else if outcome.success() {
        println!();
        println!("{}", console::style("All reports published.").green().bold());
    } else {
        println!();
        println!(
            "{}",
            console::style("Some reports failed; they remain in object storage for the next run.")
                .red()
                .bold()
        );
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::storage::{StoreError, StoreResult};

    const CANONICAL_PASSING: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuites tests="1" failures="0" errors="0" skipped="0">
  <testsuite name="run" tests="1" failures="0">
    <testcase name="test_ok"/>
  </testsuite>
  <branch_name>main</branch_name>
  <release_tag>1.0.0</release_tag>
</testsuites>"#;

    struct FakeStore {
        cluster: String,
        bucket: String,
        objects: Mutex<HashMap<String, String>>,
        fail_downloads: HashSet<String>,
        fail_removes: bool,
    }

    impl FakeStore {
        fn new(names: &[&str]) -> Self {
            Self {
                cluster: "test-cluster".into(),
                bucket: "test-bucket".into(),
                objects: Mutex::new(
                    names
                        .iter()
                        .map(|n| (n.to_string(), CANONICAL_PASSING.to_string()))
                        .collect(),
                ),
                fail_downloads: HashSet::new(),
                fail_removes: false,
            }
        }

        fn remaining(&self) -> Vec<String> {
            let mut names: Vec<String> =
                self.objects.lock().unwrap().keys().cloned().collect();
            names.sort();
            names
        }

        fn command_failed(what: &str) -> StoreError {
            StoreError::CommandFailed {
                command: what.to_string(),
                code: 1,
                stderr: String::new(),
            }
        }
    }

    #[async_trait]
    impl ObjectStore for FakeStore {
        async fn list(&self) -> StoreResult<Vec<String>> {
            let mut lines: Vec<String> = self
                .objects
                .lock()
                .unwrap()
                .keys()
                .map(|name| format!("{}/{}/{}", self.cluster, self.bucket, name))
                .collect();
            lines.sort();
            Ok(lines)
        }

        async fn download(&self, name: &str, destination: &Path) -> StoreResult<()> {
            if self.fail_downloads.contains(name) {
                return Err(Self::command_failed("obj get"));
            }
            let contents = self
                .objects
                .lock()
                .unwrap()
                .get(name)
                .cloned()
                .ok_or_else(|| Self::command_failed("obj get"))?;
            std::fs::write(destination, contents).unwrap();
            Ok(())
        }

        async fn remove(&self, name: &str) -> StoreResult<()> {
            if self.fail_removes {
                return Err(Self::command_failed("obj rm"));
            }
            self.objects.lock().unwrap().remove(name);
            Ok(())
        }
    }

    struct FakeSink {
        status: SubmitStatus,
        received: Mutex<Vec<TodSubmission>>,
    }

    impl FakeSink {
        fn accepting() -> Self {
            Self::with_status(SubmitStatus::Accepted)
        }

        fn with_status(status: SubmitStatus) -> Self {
            Self {
                status,
                received: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TodSink for FakeSink {
        async fn submit(&self, submission: &TodSubmission) -> SubmitStatus {
            self.received.lock().unwrap().push(submission.clone());
            self.status.clone()
        }
    }

    struct NoReleases;

    #[async_trait]
    impl ReleaseLookup for NoReleases {
        async fn latest_version(&self, _file_name: &str) -> Option<String> {
            None
        }
    }

    fn settings(report_dir: PathBuf) -> Settings {
        Settings {
            cluster: "test-cluster".into(),
            bucket: "test-bucket".into(),
            url: "https://tod.example.com/api".into(),
            team_name: "dx".into(),
            report_dir,
            credentials: Vec::new(),
        }
    }

    fn outcome_for<'a>(outcome: &'a BatchOutcome, name: &str) -> &'a FileOutcome {
        &outcome
            .files
            .iter()
            .find(|(n, _)| n == name)
            .unwrap_or_else(|| panic!("no outcome for {name}"))
            .1
    }

    #[test]
    fn test_select_candidates_filters_bucket_and_extension() {
        let lines = vec![
            "cluster/test-bucket/a_cli.xml".to_string(),
            "cluster/other-bucket/b_cli.xml".to_string(),
            "cluster/test-bucket/notes.txt".to_string(),
            "cluster/test-bucket/nested/c_sdk.xml".to_string(),
        ];
        assert_eq!(
            select_candidates(&lines, "test-bucket"),
            ["a_cli.xml", "c_sdk.xml"]
        );
    }

    #[tokio::test]
    async fn test_happy_path_publishes_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FakeStore::new(&["run_cli.xml"]);
        let sink = FakeSink::accepting();
        let pipeline = Pipeline::new(settings(dir.path().into()), store, sink, NoReleases);

        let outcome = pipeline.run().await.unwrap();
        assert_eq!(
            outcome_for(&outcome, "run_cli.xml"),
            &FileOutcome::Published { deleted: true }
        );
        assert!(pipeline.store.remaining().is_empty());

        let received = pipeline.sink.received.lock().unwrap();
        let submission = &received[0];
        assert_eq!(submission.team, "dx");
        assert_eq!(submission.software_name, "linode-cli");
        assert_eq!(submission.semantic_version, "1.0.0");
        assert_eq!(submission.branch_name, "main");
        assert!(submission.pass);
        assert_eq!(submission.xunit_results.len(), 1);
    }

    #[tokio::test]
    async fn test_one_download_failure_does_not_abort_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FakeStore::new(&["a_cli.xml", "b_cli.xml", "c_cli.xml"]);
        store.fail_downloads.insert("b_cli.xml".to_string());
        let sink = FakeSink::accepting();
        let pipeline = Pipeline::new(settings(dir.path().into()), store, sink, NoReleases);

        let outcome = pipeline.run().await.unwrap();
        assert_eq!(outcome.published(), 2);
        assert_eq!(outcome.failed(), 1);

        assert_eq!(
            outcome_for(&outcome, "a_cli.xml"),
            &FileOutcome::Published { deleted: true }
        );
        assert_eq!(
            outcome_for(&outcome, "c_cli.xml"),
            &FileOutcome::Published { deleted: true }
        );
        assert!(matches!(
            outcome_for(&outcome, "b_cli.xml"),
            FileOutcome::Failed {
                stage: Stage::Download,
                ..
            }
        ));

        // The failed file stays in storage for the next run.
        assert_eq!(pipeline.store.remaining(), ["b_cli.xml"]);
    }

    #[tokio::test]
    async fn test_rejected_publish_leaves_object_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let store = FakeStore::new(&["run_cli.xml"]);
        let sink = FakeSink::with_status(SubmitStatus::Rejected(500));
        let pipeline = Pipeline::new(settings(dir.path().into()), store, sink, NoReleases);

        let outcome = pipeline.run().await.unwrap();
        match outcome_for(&outcome, "run_cli.xml") {
            FileOutcome::Failed {
                stage: Stage::Publish,
                reason,
            } => assert!(reason.contains("500")),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(pipeline.store.remaining(), ["run_cli.xml"]);

        // A re-run retries the same file.
        let retried = pipeline.run().await.unwrap();
        assert_eq!(retried.files.len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_database_is_publish_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = FakeStore::new(&["run_cli.xml"]);
        let sink = FakeSink::with_status(SubmitStatus::Unreachable("connection refused".into()));
        let pipeline = Pipeline::new(settings(dir.path().into()), store, sink, NoReleases);

        let outcome = pipeline.run().await.unwrap();
        assert!(matches!(
            outcome_for(&outcome, "run_cli.xml"),
            FileOutcome::Failed {
                stage: Stage::Publish,
                ..
            }
        ));
        assert_eq!(pipeline.store.remaining(), ["run_cli.xml"]);
    }

    #[tokio::test]
    async fn test_failed_delete_still_counts_as_published() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FakeStore::new(&["run_cli.xml"]);
        store.fail_removes = true;
        let sink = FakeSink::accepting();
        let pipeline = Pipeline::new(settings(dir.path().into()), store, sink, NoReleases);

        let outcome = pipeline.run().await.unwrap();
        assert_eq!(
            outcome_for(&outcome, "run_cli.xml"),
            &FileOutcome::Published { deleted: false }
        );
        assert!(outcome.success());
    }

    #[tokio::test]
    async fn test_malformed_download_fails_normalize_stage() {
        let dir = tempfile::tempdir().unwrap();
        let store = FakeStore::new(&["bad_cli.xml"]);
        store
            .objects
            .lock()
            .unwrap()
            .insert("bad_cli.xml".into(), "<testsuites><oops".into());
        let sink = FakeSink::accepting();
        let pipeline = Pipeline::new(settings(dir.path().into()), store, sink, NoReleases);

        let outcome = pipeline.run().await.unwrap();
        assert!(matches!(
            outcome_for(&outcome, "bad_cli.xml"),
            FileOutcome::Failed {
                stage: Stage::Normalize,
                ..
            }
        ));
        // Nothing was submitted for the malformed file.
        assert!(pipeline.sink.received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_multi_suite_document_is_normalized_before_publish() {
        let dir = tempfile::tempdir().unwrap();
        let store = FakeStore::new(&["multi_cli.xml"]);
        store.objects.lock().unwrap().insert(
            "multi_cli.xml".into(),
            r#"<testsuites tests="2" failures="1" errors="0" skipped="0">
                 <testsuite tests="1" failures="1"><testcase name="a"/></testsuite>
                 <testsuite tests="1"><testcase name="b"/></testsuite>
                 <release_tag>2.0.0</release_tag>
               </testsuites>"#
                .into(),
        );
        let sink = FakeSink::accepting();
        let pipeline = Pipeline::new(settings(dir.path().into()), store, sink, NoReleases);

        pipeline.run().await.unwrap();

        let received = pipeline.sink.received.lock().unwrap();
        assert!(!received[0].pass);

        // The canonical form was written back over the download.
        let rewritten =
            ReportDocument::parse(&dir.path().join("multi_cli.xml")).unwrap();
        assert_eq!(rewritten.root.children_named("testsuite").count(), 1);
    }
}
