//! Publication to the Test Outcome Database.
//!
//! A normalized report is base64-encoded, wrapped in the JSON envelope the
//! database accepts, and POSTed to the configured endpoint. The database
//! signals acceptance only with HTTP 201; everything else is a rejection.
//! Network-level failures are reported as unreachable and never retried
//! here: a failed file stays in object storage and is retried on the next
//! batch run.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::verdict::Verdict;

/// Base64-encodes the UTF-8 serialization of a report.
pub fn encode_report(xml: &str) -> String {
    BASE64.encode(xml.as_bytes())
}

/// The JSON envelope the Test Outcome Database accepts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TodSubmission {
    pub team: String,
    pub software_name: String,
    pub semantic_version: String,
    pub build_name: String,
    pub pass: bool,
    pub xunit_results: Vec<String>,
    pub tag: String,
    pub branch_name: String,
}

impl TodSubmission {
    /// Builds a submission from a verdict and the encoded report.
    ///
    /// The build name mirrors the software name.
    pub fn new(team: impl Into<String>, verdict: &Verdict, encoded_report: String) -> Self {
        Self {
            team: team.into(),
            software_name: verdict.software_name.clone(),
            semantic_version: verdict.release_version.clone(),
            build_name: verdict.software_name.clone(),
            pass: verdict.pass,
            xunit_results: vec![encoded_report],
            tag: verdict.tag.clone(),
            branch_name: verdict.branch_name.clone(),
        }
    }
}

/// Outcome of one submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitStatus {
    /// The database stored the report (HTTP 201).
    Accepted,

    /// The database answered with any status other than 201.
    Rejected(u16),

    /// The request never produced a response (timeout, DNS, connection).
    Unreachable(String),
}

/// Destination for report submissions.
///
/// The HTTP implementation talks to the real database; pipeline tests
/// substitute an in-memory sink.
#[async_trait]
pub trait TodSink: Send + Sync {
    /// Submits one envelope, returning the outcome. Never panics on
    /// network failure.
    async fn submit(&self, submission: &TodSubmission) -> SubmitStatus;
}

/// HTTP client for the Test Outcome Database endpoint.
pub struct HttpTod {
    client: reqwest::Client,
    url: String,
}

impl HttpTod {
    /// Creates a client for the given endpoint with a fixed request
    /// timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl TodSink for HttpTod {
    async fn submit(&self, submission: &TodSubmission) -> SubmitStatus {
        // .json() sets Content-Type: application/json.
        match self.client.post(&self.url).json(submission).send().await {
            Ok(response) if response.status() == StatusCode::CREATED => SubmitStatus::Accepted,
            Ok(response) => SubmitStatus::Rejected(response.status().as_u16()),
            Err(e) => {
                warn!("POST to {} produced no response: {}", self.url, e);
                SubmitStatus::Unreachable(e.to_string())
            }
        }
    }
}
