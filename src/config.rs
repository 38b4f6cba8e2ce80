//! Runtime settings resolved from the process environment.
//!
//! The pipeline is configured entirely through environment variables, with
//! an optional secrets-store bootstrap for the credential values. Reads go
//! through an injectable lookup so tests never touch the real environment.
//!
//! Required: `CLUSTER`, `BUCKET`, `URL`, `LINODE_CLI_TOKEN`,
//! `LINODE_CLI_OBJ_ACCESS_KEY`, `LINODE_CLI_OBJ_SECRET_KEY`.
//! Optional: `TEAM_NAME` (defaults to `default_team_name`).

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::info;

use crate::secrets::SecretStore;

/// Every variable that must be set after credential bootstrap.
pub const REQUIRED_VARS: [&str; 6] = [
    "LINODE_CLI_TOKEN",
    "LINODE_CLI_OBJ_ACCESS_KEY",
    "LINODE_CLI_OBJ_SECRET_KEY",
    "CLUSTER",
    "BUCKET",
    "URL",
];

/// The credential subset a secrets store may supply.
pub const CREDENTIAL_VARS: [&str; 3] = [
    "LINODE_CLI_TOKEN",
    "LINODE_CLI_OBJ_ACCESS_KEY",
    "LINODE_CLI_OBJ_SECRET_KEY",
];

/// Team name used when `TEAM_NAME` is unset.
const DEFAULT_TEAM_NAME: &str = "default_team_name";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// One or more required environment variables are absent.
    #[error("the following environment variables are not set: {}", .0.join(", "))]
    MissingVars(Vec<String>),
}

/// Resolved pipeline settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Object-storage cluster identifier.
    pub cluster: String,

    /// Bucket holding the report files.
    pub bucket: String,

    /// Test Outcome Database endpoint.
    pub url: String,

    /// Team name reported in every submission.
    pub team_name: String,

    /// Local directory downloads land in.
    pub report_dir: PathBuf,

    /// Credential variables forwarded to storage CLI invocations.
    pub credentials: Vec<(String, String)>,
}

impl Settings {
    /// Resolves settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves settings through an arbitrary lookup function.
    ///
    /// A variable that is present but empty counts as missing. Missing
    /// variables are reported together, in [`REQUIRED_VARS`] order.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut values = HashMap::new();
        let mut missing = Vec::new();

        for var in REQUIRED_VARS {
            match lookup(var).filter(|v| !v.is_empty()) {
                Some(value) => {
                    values.insert(var, value);
                }
                None => missing.push(var.to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(ConfigError::MissingVars(missing));
        }

        let credentials = CREDENTIAL_VARS
            .iter()
            .copied()
            .map(|var| (var.to_string(), values[var].clone()))
            .collect();

        Ok(Self {
            cluster: values.remove("CLUSTER").unwrap(),
            bucket: values.remove("BUCKET").unwrap(),
            url: values.remove("URL").unwrap(),
            team_name: lookup("TEAM_NAME")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_TEAM_NAME.to_string()),
            report_dir: PathBuf::from("reports"),
            credentials,
        })
    }
}

/// Fills in the credential variables from a secrets store when the token
/// is not already present in `env`.
///
/// The store is consulted once for the whole credential set; values already
/// present in `env` are never overwritten.
pub async fn bootstrap_credentials(
    env: &mut HashMap<String, String>,
    store: &dyn SecretStore,
    secret_path: &str,
) -> anyhow::Result<()> {
    if env
        .get("LINODE_CLI_TOKEN")
        .is_some_and(|token| !token.is_empty())
    {
        return Ok(());
    }

    info!("fetching credentials from the secrets store");
    let secrets = store.read(secret_path).await?;

    for var in CREDENTIAL_VARS {
        if let Some(value) = secrets.get(var)
            && !env.contains_key(var)
        {
            env.insert(var.to_string(), value.clone());
        }
    }

    Ok(())
}

/// Snapshot of the variables [`Settings`] cares about, for feeding
/// [`bootstrap_credentials`] and [`Settings::from_lookup`].
pub fn environment_snapshot() -> HashMap<String, String> {
    REQUIRED_VARS
        .iter()
        .chain(std::iter::once(&"TEAM_NAME"))
        .filter_map(|var| std::env::var(var).ok().map(|value| (var.to_string(), value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn complete_env() -> HashMap<String, String> {
        [
            ("LINODE_CLI_TOKEN", "token"),
            ("LINODE_CLI_OBJ_ACCESS_KEY", "access"),
            ("LINODE_CLI_OBJ_SECRET_KEY", "secret"),
            ("CLUSTER", "us-east-1"),
            ("BUCKET", "reports"),
            ("URL", "https://tod.example.com/api"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_settings_from_complete_environment() {
        let env = complete_env();
        let settings = Settings::from_lookup(|key| env.get(key).cloned()).unwrap();

        assert_eq!(settings.cluster, "us-east-1");
        assert_eq!(settings.bucket, "reports");
        assert_eq!(settings.url, "https://tod.example.com/api");
        assert_eq!(settings.team_name, "default_team_name");
        assert_eq!(settings.credentials.len(), 3);
    }

    #[test]
    fn test_team_name_override() {
        let mut env = complete_env();
        env.insert("TEAM_NAME".into(), "dx".into());
        let settings = Settings::from_lookup(|key| env.get(key).cloned()).unwrap();
        assert_eq!(settings.team_name, "dx");
    }

    #[test]
    fn test_missing_vars_listed_in_order() {
        let mut env = complete_env();
        env.remove("CLUSTER");
        env.remove("URL");
        env.insert("BUCKET".into(), String::new()); // empty counts as missing

        let err = Settings::from_lookup(|key| env.get(key).cloned()).unwrap_err();
        let ConfigError::MissingVars(missing) = err;
        assert_eq!(missing, ["CLUSTER", "BUCKET", "URL"]);
    }

    struct CannedSecrets;

    #[async_trait]
    impl SecretStore for CannedSecrets {
        async fn read(&self, _path: &str) -> anyhow::Result<HashMap<String, String>> {
            Ok(CREDENTIAL_VARS
                .iter()
                .map(|var| (var.to_string(), format!("vault-{var}")))
                .collect())
        }
    }

    struct ExplodingSecrets;

    #[async_trait]
    impl SecretStore for ExplodingSecrets {
        async fn read(&self, _path: &str) -> anyhow::Result<HashMap<String, String>> {
            anyhow::bail!("vault is down")
        }
    }

    #[tokio::test]
    async fn test_bootstrap_fills_missing_credentials() {
        let mut env = HashMap::new();
        bootstrap_credentials(&mut env, &CannedSecrets, "dx")
            .await
            .unwrap();

        assert_eq!(
            env.get("LINODE_CLI_TOKEN").map(String::as_str),
            Some("vault-LINODE_CLI_TOKEN")
        );
        assert_eq!(env.len(), 3);
    }

    #[tokio::test]
    async fn test_bootstrap_skipped_when_token_present() {
        let mut env = HashMap::from([("LINODE_CLI_TOKEN".to_string(), "existing".to_string())]);
        // ExplodingSecrets would fail if consulted.
        bootstrap_credentials(&mut env, &ExplodingSecrets, "dx")
            .await
            .unwrap();
        assert_eq!(env.get("LINODE_CLI_TOKEN").map(String::as_str), Some("existing"));
    }
}
