use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::alert::engine::AlertEvent;
use crate::config::Config;
use crate::sources::http::post_json;

#[async_trait]
pub trait AlertSink: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, event: &AlertEvent) -> Result<()>;
}

pub struct StdoutSink;

#[async_trait]
impl AlertSink for StdoutSink {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn send(&self, event: &AlertEvent) -> Result<()> {
        println!(
            "[{}] [{:?}] {}",
            event.created_at.format("%Y-%m-%d %H:%M:%S"),
            event.kind,
            event.title
        );
        Ok(())
    }
}

/// Posts to a Slack incoming webhook, or a Discord webhook when the URL
/// points at Discord.
pub struct WebhookSink {
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    fn is_discord(&self) -> bool {
        self.url.contains("discord.com/api/webhooks")
            || self.url.contains("discordapp.com/api/webhooks")
    }

    pub fn payload(&self, event: &AlertEvent) -> Value {
        if self.is_discord() {
            json!({ "content": event.title })
        } else {
            event.slack_payload()
        }
    }
}

#[async_trait]
impl AlertSink for WebhookSink {
    fn name(&self) -> &str {
        if self.is_discord() {
            "discord"
        } else {
            "slack"
        }
    }

    async fn send(&self, event: &AlertEvent) -> Result<()> {
        post_json(&self.url, &self.payload(event)).await
    }
}

pub fn sinks_from_config(config: &Config) -> Vec<Box<dyn AlertSink>> {
    let mut sinks: Vec<Box<dyn AlertSink>> = Vec::new();
    if config.alerts.enable_stdout {
        sinks.push(Box::new(StdoutSink));
    }
    let webhook = config.alerts.slack_webhook.trim();
    if !webhook.is_empty() {
        sinks.push(Box::new(WebhookSink::new(webhook)));
    }
    sinks
}
