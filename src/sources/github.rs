use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::sources::http::fetch_json;
use crate::sources::TagSource;

const GITHUB_API: &str = "https://api.github.com";
const MAX_PER_PAGE: usize = 100;

pub struct GithubTags {
    api_base: String,
    token: Option<String>,
}

impl GithubTags {
    pub fn new(token: Option<&str>) -> Self {
        Self {
            api_base: GITHUB_API.to_string(),
            token: token.map(str::to_string),
        }
    }

    pub fn tags_url(&self, repo: &str, limit: usize) -> String {
        let per_page = limit.clamp(1, MAX_PER_PAGE);
        format!(
            "{}/repos/{}/tags?per_page={per_page}",
            self.api_base.trim_end_matches('/'),
            repo.trim_matches('/')
        )
    }
}

#[async_trait]
impl TagSource for GithubTags {
    async fn recent_tags(&self, repo: &str, limit: usize) -> Result<Vec<String>> {
        let url = self.tags_url(repo, limit);
        let payload = fetch_json(&url, self.token.as_deref()).await?;
        parse_tag_names(&payload, limit)
    }
}

pub fn parse_tag_names(payload: &Value, limit: usize) -> Result<Vec<String>> {
    let entries = payload
        .as_array()
        .ok_or_else(|| anyhow!("expected a JSON array of tags"))?;
    Ok(entries
        .iter()
        .filter_map(|entry| entry.get("name").and_then(Value::as_str))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .take(limit)
        .map(str::to_string)
        .collect())
}
