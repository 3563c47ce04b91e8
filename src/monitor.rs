//! Polling and notification cycle: upstream sources feed observations into
//! the store, then pending records are dispatched to the alert sinks.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, info, warn};

use crate::alert::{dispatch_pending, AlertContext, AlertEventKind, AlertSink, DispatchSummary};
use crate::config::{AlertRulesConfig, Config, ProgramAddress};
use crate::sources::github::GithubTags;
use crate::sources::solana::{tally_versions, SolanaRpc};
use crate::sources::{ClusterRpc, TagSource};
use crate::state::{NotificationStore, Observation, RecordKind};

pub struct ClusterTarget {
    pub name: String,
    pub rpc: Arc<dyn ClusterRpc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PollSummary {
    pub observed: usize,
    pub new: usize,
    /// Upstream failures that were skipped; store failures abort instead.
    pub failures: Vec<String>,
}

impl PollSummary {
    fn merge(&mut self, other: PollSummary) {
        self.observed += other.observed;
        self.new += other.new;
        self.failures.extend(other.failures);
    }
}

pub struct Monitor {
    store: Arc<NotificationStore>,
    clusters: Vec<ClusterTarget>,
    tags: Arc<dyn TagSource>,
    programs: BTreeMap<String, ProgramAddress>,
    repos: BTreeMap<String, String>,
    tags_limit: usize,
    alert_ctx: AlertContext,
    rules: AlertRulesConfig,
}

impl Monitor {
    pub fn from_config(config: &Config, store: Arc<NotificationStore>) -> Self {
        let clusters = config
            .solana
            .clusters
            .iter()
            .map(|(name, url)| ClusterTarget {
                name: name.clone(),
                rpc: Arc::new(SolanaRpc::new(name.clone(), url.clone())) as Arc<dyn ClusterRpc>,
            })
            .collect();
        let tags = Arc::new(GithubTags::new(config.github_token()));
        Self::with_sources(config, store, clusters, tags)
    }

    pub fn with_sources(
        config: &Config,
        store: Arc<NotificationStore>,
        clusters: Vec<ClusterTarget>,
        tags: Arc<dyn TagSource>,
    ) -> Self {
        Self {
            store,
            clusters,
            tags,
            programs: config.programs.clone(),
            repos: config.github.repos.clone(),
            tags_limit: config.github.tags_limit,
            alert_ctx: AlertContext::from_config(config),
            rules: config.alerts.rules.clone(),
        }
    }

    pub fn store(&self) -> &NotificationStore {
        &self.store
    }

    /// Full cycle: poll every requested kind, then notify each of them.
    pub async fn check(
        &self,
        kinds: &[RecordKind],
        sinks: &[Box<dyn AlertSink>],
    ) -> Result<(PollSummary, DispatchSummary)> {
        let polled = self.poll(kinds).await?;
        let dispatched = self.notify(kinds, sinks).await?;
        Ok((polled, dispatched))
    }

    pub async fn poll(&self, kinds: &[RecordKind]) -> Result<PollSummary> {
        let mut summary = PollSummary::default();
        for kind in kinds {
            let part = match kind {
                RecordKind::SolanaCluster => self.poll_cluster_versions().await?,
                RecordKind::Program => self.poll_program_slots().await?,
                RecordKind::GithubVersion => self.poll_github_tags().await?,
            };
            summary.merge(part);
        }
        Ok(summary)
    }

    pub async fn notify(
        &self,
        kinds: &[RecordKind],
        sinks: &[Box<dyn AlertSink>],
    ) -> Result<DispatchSummary> {
        let mut total = DispatchSummary::default();
        for kind in kinds {
            if !AlertEventKind::for_record(*kind).enabled(&self.rules) {
                debug!("{kind} alerts disabled by rules");
                continue;
            }
            let part = dispatch_pending(&self.store, *kind, &self.alert_ctx, sinks).await?;
            total.sent += part.sent;
            total.failed += part.failed;
        }
        Ok(total)
    }

    pub async fn poll_cluster_versions(&self) -> Result<PollSummary> {
        let mut summary = PollSummary::default();
        for cluster in &self.clusters {
            let versions = match cluster.rpc.node_versions().await {
                Ok(versions) => versions,
                Err(err) => {
                    warn!("skipping cluster {}: {err:#}", cluster.name);
                    summary.failures.push(format!("{}: {err:#}", cluster.name));
                    continue;
                }
            };
            let tally = tally_versions(versions);
            for (version, nodes) in tally {
                debug!("{}: {nodes} node(s) on {version}", cluster.name);
                let observation = Observation::SolanaCluster {
                    version,
                    cluster: cluster.name.clone(),
                };
                self.record(&observation, &mut summary)?;
            }
        }
        Ok(summary)
    }

    pub async fn poll_program_slots(&self) -> Result<PollSummary> {
        let mut summary = PollSummary::default();
        for cluster in &self.clusters {
            for (name, address) in &self.programs {
                let Some(raw) = address.for_cluster(&cluster.name) else {
                    debug!("no address for {name} on {}", cluster.name);
                    continue;
                };
                let pubkey = match Pubkey::from_str(raw) {
                    Ok(pubkey) => pubkey,
                    Err(err) => {
                        warn!("invalid address {raw} for {name}: {err}");
                        summary.failures.push(format!("{name}: invalid address {raw}"));
                        continue;
                    }
                };
                match cluster.rpc.program_deploy_slot(&pubkey).await {
                    Ok(Some(slot)) => {
                        let observation = Observation::ProgramSlot {
                            name: name.clone(),
                            cluster: cluster.name.clone(),
                            slot,
                        };
                        self.record(&observation, &mut summary)?;
                    }
                    Ok(None) => {
                        warn!("can't find program data account for {name} on {}", cluster.name);
                    }
                    Err(err) => {
                        warn!("skipping {name} on {}: {err:#}", cluster.name);
                        summary
                            .failures
                            .push(format!("{name}@{}: {err:#}", cluster.name));
                    }
                }
            }
        }
        Ok(summary)
    }

    pub async fn poll_github_tags(&self) -> Result<PollSummary> {
        let mut summary = PollSummary::default();
        for (name, repo) in &self.repos {
            let tags = match self.tags.recent_tags(repo, self.tags_limit).await {
                Ok(tags) => tags,
                Err(err) => {
                    warn!("skipping {repo}: {err:#}");
                    summary.failures.push(format!("{repo}: {err:#}"));
                    continue;
                }
            };
            for version in tags {
                let observation = Observation::GithubVersion {
                    name: name.clone(),
                    version,
                };
                self.record(&observation, &mut summary)?;
            }
        }
        Ok(summary)
    }

    fn record(&self, observation: &Observation, summary: &mut PollSummary) -> Result<()> {
        let is_new = self
            .store
            .record_observation(observation)
            .with_context(|| format!("failed recording {}", observation.key()))?;
        summary.observed += 1;
        if is_new {
            summary.new += 1;
            info!("new {}", observation.key());
        }
        Ok(())
    }
}
