pub mod github;
pub mod http;
pub mod solana;

use anyhow::Result;
use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;

/// Read access to one Solana cluster.
#[async_trait]
pub trait ClusterRpc: Send + Sync {
    /// Software version reported by every gossip node; `None` when a node
    /// does not report one.
    async fn node_versions(&self) -> Result<Vec<Option<String>>>;

    /// Slot of the last deploy of an upgradeable program, or `None` when the
    /// account has no ProgramData account behind it.
    async fn program_deploy_slot(&self, program: &Pubkey) -> Result<Option<u64>>;
}

#[async_trait]
pub trait TagSource: Send + Sync {
    /// Most recent tag names of `repo` (`owner/name`), newest first.
    async fn recent_tags(&self, repo: &str, limit: usize) -> Result<Vec<String>>;
}
