use anyhow::Context;
use serde_json::Value;

use crate::cli::{utils, OutputFormat};
use crate::config::config;

pub async fn handle(url: Option<String>, output_format: OutputFormat) -> anyhow::Result<()> {
    let base = url.unwrap_or_else(|| config().server.public_url.clone());
    let endpoint = format!("{}/health", base.trim_end_matches('/'));

    let response = reqwest::get(&endpoint)
        .await
        .with_context(|| format!("requesting {}", endpoint))?;
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);

    if !status.is_success() {
        utils::output_error(&output_format, &format!("{} returned {}", endpoint, status), Some("UNHEALTHY"))?;
        anyhow::bail!("server unhealthy");
    }

    utils::output_success(&output_format, &format!("{} is healthy", base), Some(body))
}
