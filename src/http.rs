//! Single-shot JSON requests to hosted providers.
//!
//! Nothing here retries: a network error or a non-2xx status is returned to
//! the caller as-is, with the response body attached for diagnosis.

use anyhow::{bail, Context, Result};
use std::time::Duration;

pub(crate) fn client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

/// Send a prepared request and decode the JSON body of a 2xx response.
pub(crate) async fn send_json(
    request: reqwest::RequestBuilder,
    label: &str,
) -> Result<serde_json::Value> {
    let response = request
        .send()
        .await
        .with_context(|| format!("{} request failed", label))?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("{} API error {}: {}", label, status, body_text);
    }

    response
        .json()
        .await
        .with_context(|| format!("{} returned invalid JSON", label))
}
