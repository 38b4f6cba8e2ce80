//! Object storage backed by the `linode-cli` binary.
//!
//! Each operation is one subprocess invocation. Credentials are passed
//! through the child environment rather than the parent process
//! environment, so nothing here mutates global state. Only stdout text and
//! the exit code are interpreted; stderr is carried into error values for
//! logging.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{ObjectStore, StoreError, StoreResult};

/// Default timeout for one CLI invocation.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// Object store that shells out to `linode-cli obj`.
pub struct LinodeCliStore {
    cli_path: PathBuf,
    cluster: String,
    bucket: String,
    env: Vec<(String, String)>,
    timeout: Duration,
}

impl LinodeCliStore {
    /// Creates a store for the given cluster and bucket, invoking
    /// `linode-cli` from `PATH`.
    pub fn new(cluster: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            cli_path: PathBuf::from("linode-cli"),
            cluster: cluster.into(),
            bucket: bucket.into(),
            env: Vec::new(),
            timeout: COMMAND_TIMEOUT,
        }
    }

    /// Overrides the CLI binary location.
    pub fn with_cli_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cli_path = path.into();
        self
    }

    /// Environment variables (token and object-storage keys) passed to
    /// every CLI invocation.
    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    /// Arguments for listing every object in the cluster.
    pub fn list_args(&self) -> Vec<String> {
        vec![
            "obj".into(),
            "la".into(),
            "--cluster".into(),
            self.cluster.clone(),
        ]
    }

    /// Arguments for downloading one object to `destination`.
    pub fn download_args(&self, name: &str, destination: &Path) -> Vec<String> {
        vec![
            "obj".into(),
            "get".into(),
            "--cluster".into(),
            self.cluster.clone(),
            self.bucket.clone(),
            name.into(),
            destination.to_string_lossy().into_owned(),
        ]
    }

    /// Arguments for removing one object.
    pub fn remove_args(&self, name: &str) -> Vec<String> {
        vec![
            "obj".into(),
            "rm".into(),
            "--cluster".into(),
            self.cluster.clone(),
            self.bucket.clone(),
            name.into(),
        ]
    }

    /// Probes for the CLI binary; a missing installation is only a
    /// warning here, the actual operations will fail with full context.
    pub async fn ensure_installed(&self) {
        let probe = tokio::process::Command::new(&self.cli_path)
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        match probe {
            Ok(output) if output.status.success() => {}
            _ => warn!(
                "linode-cli is not installed or not runnable at {}",
                self.cli_path.display()
            ),
        }
    }

    async fn run(&self, args: Vec<String>) -> StoreResult<std::process::Output> {
        let command_line = format!("{} {}", self.cli_path.display(), args.join(" "));
        debug!("running {}", command_line);

        let mut command = tokio::process::Command::new(&self.cli_path);
        command.args(&args);
        for (key, value) in &self.env {
            command.env(key, value);
        }
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| StoreError::Timeout {
                command: command_line.clone(),
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(|e| StoreError::Spawn {
                command: command_line.clone(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(StoreError::CommandFailed {
                command: command_line,
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(output)
    }
}

#[async_trait]
impl ObjectStore for LinodeCliStore {
    async fn list(&self) -> StoreResult<Vec<String>> {
        let output = self.run(self.list_args()).await?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_string)
            .collect())
    }

    async fn download(&self, name: &str, destination: &Path) -> StoreResult<()> {
        self.run(self.download_args(name, destination)).await?;
        Ok(())
    }

    async fn remove(&self, name: &str) -> StoreResult<()> {
        self.run(self.remove_args(name)).await?;
        Ok(())
    }
}
