pub mod error;
pub mod migrations;
pub mod store;

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use error::StoreError;
pub use store::{NotificationStore, PendingIter, StoreOptions};

/// One of the three independently tracked observation streams.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    SolanaCluster,
    GithubVersion,
    Program,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [
        RecordKind::SolanaCluster,
        RecordKind::GithubVersion,
        RecordKind::Program,
    ];

    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::SolanaCluster => "solana",
            Self::GithubVersion => "github",
            Self::Program => "program",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            Self::SolanaCluster => "solana_clusters",
            Self::GithubVersion => "github_versions",
            Self::Program => "programs",
        }
    }
}

impl Display for RecordKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_slug())
    }
}

#[derive(Debug, Error)]
#[error("unknown record kind: {0}")]
pub struct RecordKindParseError(pub String);

impl FromStr for RecordKind {
    type Err = RecordKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "solana" | "cluster" | "solana_cluster" | "solana_clusters" => Ok(Self::SolanaCluster),
            "github" | "github_version" | "github_versions" | "tag" => Ok(Self::GithubVersion),
            "program" | "programs" => Ok(Self::Program),
            _ => Err(RecordKindParseError(s.to_string())),
        }
    }
}

/// Natural composite key of a stored record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordKey {
    SolanaCluster { version: String, cluster: String },
    GithubVersion { name: String, version: String },
    Program { name: String, cluster: String },
}

impl RecordKey {
    pub fn solana_cluster(version: impl Into<String>, cluster: impl Into<String>) -> Self {
        Self::SolanaCluster {
            version: version.into(),
            cluster: cluster.into(),
        }
    }

    pub fn github_version(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self::GithubVersion {
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn program(name: impl Into<String>, cluster: impl Into<String>) -> Self {
        Self::Program {
            name: name.into(),
            cluster: cluster.into(),
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Self::SolanaCluster { .. } => RecordKind::SolanaCluster,
            Self::GithubVersion { .. } => RecordKind::GithubVersion,
            Self::Program { .. } => RecordKind::Program,
        }
    }
}

impl Display for RecordKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SolanaCluster { version, cluster } => write!(f, "solana {version} on {cluster}"),
            Self::GithubVersion { name, version } => write!(f, "github {name} {version}"),
            Self::Program { name, cluster } => write!(f, "program {name} on {cluster}"),
        }
    }
}

/// A single sighting reported by an upstream poller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Observation {
    SolanaCluster {
        version: String,
        cluster: String,
    },
    GithubVersion {
        name: String,
        version: String,
    },
    ProgramSlot {
        name: String,
        cluster: String,
        slot: u64,
    },
}

impl Observation {
    pub fn key(&self) -> RecordKey {
        match self {
            Self::SolanaCluster { version, cluster } => {
                RecordKey::solana_cluster(version.clone(), cluster.clone())
            }
            Self::GithubVersion { name, version } => {
                RecordKey::github_version(name.clone(), version.clone())
            }
            Self::ProgramSlot { name, cluster, .. } => {
                RecordKey::program(name.clone(), cluster.clone())
            }
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Self::SolanaCluster { .. } => RecordKind::SolanaCluster,
            Self::GithubVersion { .. } => RecordKind::GithubVersion,
            Self::ProgramSlot { .. } => RecordKind::Program,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterVersionRecord {
    pub version: String,
    pub cluster: String,
    pub notified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GithubVersionRecord {
    pub name: String,
    pub version: String,
    pub notified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgramSlotRecord {
    pub name: String,
    pub cluster: String,
    pub last_slot: u64,
    pub notified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoredRecord {
    SolanaCluster(ClusterVersionRecord),
    GithubVersion(GithubVersionRecord),
    Program(ProgramSlotRecord),
}

impl StoredRecord {
    pub fn key(&self) -> RecordKey {
        match self {
            Self::SolanaCluster(r) => RecordKey::solana_cluster(r.version.clone(), r.cluster.clone()),
            Self::GithubVersion(r) => RecordKey::github_version(r.name.clone(), r.version.clone()),
            Self::Program(r) => RecordKey::program(r.name.clone(), r.cluster.clone()),
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Self::SolanaCluster(_) => RecordKind::SolanaCluster,
            Self::GithubVersion(_) => RecordKind::GithubVersion,
            Self::Program(_) => RecordKind::Program,
        }
    }

    pub fn notified(&self) -> bool {
        match self {
            Self::SolanaCluster(r) => r.notified,
            Self::GithubVersion(r) => r.notified,
            Self::Program(r) => r.notified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Observation, RecordKey, RecordKind};

    #[test]
    fn parses_kind_aliases() {
        assert_eq!("solana".parse::<RecordKind>().unwrap(), RecordKind::SolanaCluster);
        assert_eq!("GitHub".parse::<RecordKind>().unwrap(), RecordKind::GithubVersion);
        assert_eq!("programs".parse::<RecordKind>().unwrap(), RecordKind::Program);
        assert!("slack".parse::<RecordKind>().is_err());
    }

    #[test]
    fn observation_key_drops_slot() {
        let obs = Observation::ProgramSlot {
            name: "metaplex".to_string(),
            cluster: "devnet".to_string(),
            slot: 42,
        };
        assert_eq!(obs.key(), RecordKey::program("metaplex", "devnet"));
        assert_eq!(obs.kind(), RecordKind::Program);
        assert_eq!(obs.key().kind(), RecordKind::Program);
    }
}
