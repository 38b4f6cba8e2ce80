//! Secret retrieval for credential bootstrap.
//!
//! When the object-storage credentials are not already in the environment,
//! they are read once from a Vault KV store before configuration is
//! validated. The trait keeps configuration tests free of any real Vault.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

/// Default Vault address when `VAULT_ADDR` is unset.
const DEFAULT_VAULT_ADDR: &str = "http://127.0.0.1:8200";

/// Timeout for a secret read.
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Key-value secret reads by path.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Reads the secret map stored at `path`.
    async fn read(&self, path: &str) -> anyhow::Result<HashMap<String, String>>;
}

/// Vault KV v2 client.
pub struct VaultKv {
    client: reqwest::Client,
    addr: String,
    token: String,
}

impl VaultKv {
    /// Builds a client from `VAULT_ADDR` and `VAULT_TOKEN`. Returns `None`
    /// when no token is configured, in which case credential bootstrap is
    /// skipped entirely.
    pub fn from_env() -> anyhow::Result<Option<Self>> {
        let Ok(token) = std::env::var("VAULT_TOKEN") else {
            return Ok(None);
        };

        let addr =
            std::env::var("VAULT_ADDR").unwrap_or_else(|_| DEFAULT_VAULT_ADDR.to_string());
        let client = reqwest::Client::builder().timeout(READ_TIMEOUT).build()?;

        Ok(Some(Self {
            client,
            addr: addr.trim_end_matches('/').to_string(),
            token,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct KvResponse {
    data: KvData,
}

#[derive(Debug, Deserialize)]
struct KvData {
    data: HashMap<String, String>,
}

#[async_trait]
impl SecretStore for VaultKv {
    async fn read(&self, path: &str) -> anyhow::Result<HashMap<String, String>> {
        let url = format!("{}/v1/secret/data/{}", self.addr, path);

        let response = self
            .client
            .get(&url)
            .header("X-Vault-Token", &self.token)
            .send()
            .await?
            .error_for_status()?;

        let body: KvResponse = response.json().await?;
        Ok(body.data.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kv_response_unwraps_nested_data() {
        let body: KvResponse = serde_json::from_str(
            r#"{"data": {"data": {"LINODE_CLI_TOKEN": "abc123"}}}"#,
        )
        .unwrap();
        assert_eq!(
            body.data.data.get("LINODE_CLI_TOKEN").map(String::as_str),
            Some("abc123")
        );
    }
}
