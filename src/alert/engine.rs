use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::alert::rules::AlertEventKind;
use crate::config::{Config, ProgramAddress};
use crate::state::{RecordKey, StoredRecord};

const GITHUB_WEB: &str = "https://github.com";
const EXPLORER: &str = "https://explorer.solana.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    pub kind: AlertEventKind,
    pub key: RecordKey,
    /// Plain-text summary; used as the notification fallback text.
    pub title: String,
    /// Slack mrkdwn body with links.
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl AlertEvent {
    pub fn slack_payload(&self) -> Value {
        json!({
            "text": self.title,
            "blocks": [
                {
                    "type": "section",
                    "text": { "type": "mrkdwn", "text": self.body }
                }
            ]
        })
    }
}

/// Lookup tables needed to turn stored records into linked messages.
#[derive(Debug, Clone, Default)]
pub struct AlertContext {
    pub repos: BTreeMap<String, String>,
    pub programs: BTreeMap<String, ProgramAddress>,
}

impl AlertContext {
    pub fn from_config(config: &Config) -> Self {
        Self {
            repos: config.github.repos.clone(),
            programs: config.programs.clone(),
        }
    }
}

pub fn build_alert(record: &StoredRecord, ctx: &AlertContext) -> AlertEvent {
    let kind = AlertEventKind::for_record(record.kind());
    let (title, body) = match record {
        StoredRecord::SolanaCluster(r) => {
            let text = format!(
                "New Solana version {} is available on {} cluster!",
                r.version, r.cluster
            );
            (text.clone(), text)
        }
        StoredRecord::GithubVersion(r) => {
            let title = format!("New {} version {} was tagged in GitHub!", r.name, r.version);
            let body = match ctx.repos.get(&r.name) {
                Some(repo) => format!(
                    "New <{GITHUB_WEB}/{repo}|{name}> was <{GITHUB_WEB}/{repo}/tree/{version}|tagged> in GitHub!",
                    name = r.name,
                    version = r.version
                ),
                None => title.clone(),
            };
            (title, body)
        }
        StoredRecord::Program(r) => {
            let title = format!(
                "New {} version {} was deployed in {}!",
                r.name, r.last_slot, r.cluster
            );
            let address = ctx
                .programs
                .get(&r.name)
                .and_then(|address| address.for_cluster(&r.cluster));
            let body = match address {
                Some(address) => format!(
                    "New <{EXPLORER}/address/{address}?cluster={cluster}|{name}> version was deployed in <{EXPLORER}/?cluster={cluster}|{cluster}> on {slot} slot!",
                    cluster = r.cluster,
                    name = r.name,
                    slot = r.last_slot
                ),
                None => title.clone(),
            };
            (title, body)
        }
    };
    AlertEvent {
        kind,
        key: record.key(),
        title,
        body,
        created_at: Utc::now(),
    }
}
