use anyhow::Context;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanLogEntry {
    pub item: String,
    pub category: String,
    pub condition: String,
    pub user_type: String,
}

async fn post(client: &reqwest::Client, url: &str, entry: &ScanLogEntry) -> anyhow::Result<()> {
    client
        .post(url)
        .json(entry)
        .send()
        .await
        .context("scan log request failed")?
        .error_for_status()
        .context("scan log rejected entry")?;
    Ok(())
}

/// Post the entry in the background. Nobody waits on it and failures are
/// only logged.
pub fn spawn(client: reqwest::Client, url: Option<String>, entry: ScanLogEntry) {
    let Some(url) = url else {
        tracing::debug!("SCAN_LOG_URL not set, skipping scan log");
        return;
    };

    tokio::spawn(async move {
        if let Err(error) = post(&client, &url, &entry).await {
            tracing::warn!(error = %format!("{error:#}"), "scan log failed");
        }
    });
}
