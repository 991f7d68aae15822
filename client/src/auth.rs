//! Relay discovery helpers.

use anyhow::{anyhow, Context, Result};

use crate::config::Config;

/// Fetch the relay's configured GitHub OAuth client id from `/_config`.
pub async fn fetch_github_client_id(config: &Config) -> Result<String> {
    let body: serde_json::Value = reqwest::get(format!("{}/_config", config.server_url()))
        .await
        .context("failed to reach relay")?
        .error_for_status()?
        .json()
        .await?;

    body.get("github_client_id")
        .and_then(|value| value.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("relay config is missing github_client_id"))
}
