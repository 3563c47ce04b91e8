use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 12;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 6;
const USER_AGENT: &str = concat!("solana-version-notifier/", env!("CARGO_PKG_VERSION"));

static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
        .build()
        .expect("failed to build HTTP client")
});

pub async fn fetch_json(url: &str, bearer: Option<&str>) -> Result<Value> {
    let mut request = HTTP_CLIENT.get(url);
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }
    let body = send_checked(request, "GET", url).await?;
    serde_json::from_str(&body).with_context(|| format!("invalid JSON response: {url}"))
}

pub async fn post_json(url: &str, payload: &Value) -> Result<()> {
    send_checked(HTTP_CLIENT.post(url).json(payload), "POST", url).await?;
    Ok(())
}

async fn send_checked(request: RequestBuilder, method: &str, url: &str) -> Result<String> {
    let response = request
        .send()
        .await
        .with_context(|| format!("failed {method} request: {url}"))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .with_context(|| format!("failed reading response body: {url}"))?;
    if !status.is_success() {
        return Err(anyhow!("{method} {url} returned {status}: {}", preview(&body)));
    }
    Ok(body)
}

fn preview(body: &str) -> String {
    body.chars().take(180).collect()
}
