use serde::{Deserialize, Serialize};

use crate::config::AlertRulesConfig;
use crate::state::RecordKind;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertEventKind {
    ClusterVersion,
    GithubTag,
    ProgramDeploy,
}

impl AlertEventKind {
    pub fn for_record(kind: RecordKind) -> Self {
        match kind {
            RecordKind::SolanaCluster => Self::ClusterVersion,
            RecordKind::GithubVersion => Self::GithubTag,
            RecordKind::Program => Self::ProgramDeploy,
        }
    }

    pub fn enabled(&self, rules: &AlertRulesConfig) -> bool {
        match self {
            Self::ClusterVersion => rules.cluster_version,
            Self::GithubTag => rules.github_tag,
            Self::ProgramDeploy => rules.program_deploy,
        }
    }
}
