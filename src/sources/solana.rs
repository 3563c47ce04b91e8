use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::account::Account;
// Deprecated in solana-sdk 2.x in favor of solana-loader-v3-interface.
#[allow(deprecated)]
use solana_sdk::bpf_loader_upgradeable::UpgradeableLoaderState;
use solana_sdk::pubkey::Pubkey;

use crate::sources::ClusterRpc;

const RPC_TIMEOUT_SECS: u64 = 30;

pub struct SolanaRpc {
    cluster: String,
    client: RpcClient,
}

impl SolanaRpc {
    pub fn new(cluster: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            client: RpcClient::new_with_timeout(url.into(), Duration::from_secs(RPC_TIMEOUT_SECS)),
        }
    }
}

#[async_trait]
impl ClusterRpc for SolanaRpc {
    async fn node_versions(&self) -> Result<Vec<Option<String>>> {
        let nodes = self
            .client
            .get_cluster_nodes()
            .await
            .with_context(|| format!("getClusterNodes failed on {}", self.cluster))?;
        Ok(nodes.into_iter().map(|node| node.version).collect())
    }

    async fn program_deploy_slot(&self, program: &Pubkey) -> Result<Option<u64>> {
        let account = self
            .client
            .get_account(program)
            .await
            .with_context(|| format!("failed fetching program {program} on {}", self.cluster))?;
        let Some(programdata_address) = programdata_address(&account) else {
            return Ok(None);
        };
        let programdata = self
            .client
            .get_account(&programdata_address)
            .await
            .with_context(|| {
                format!(
                    "failed fetching program data {programdata_address} on {}",
                    self.cluster
                )
            })?;
        deploy_slot(&programdata)
    }
}

/// ProgramData address an upgradeable program account points at.
#[allow(deprecated)]
pub fn programdata_address(program: &Account) -> Option<Pubkey> {
    match program.deserialize_data::<UpgradeableLoaderState>() {
        Ok(UpgradeableLoaderState::Program {
            programdata_address,
        }) => Some(programdata_address),
        _ => None,
    }
}

#[allow(deprecated)]
pub fn deploy_slot(programdata: &Account) -> Result<Option<u64>> {
    match programdata.deserialize_data::<UpgradeableLoaderState>() {
        Ok(UpgradeableLoaderState::ProgramData { slot, .. }) => Ok(Some(slot)),
        Ok(_) => Ok(None),
        Err(err) => Err(anyhow!("undecodable program data account: {err}")),
    }
}

/// Counts gossip nodes per reported version, skipping nodes without one.
pub fn tally_versions<I>(versions: I) -> BTreeMap<String, usize>
where
    I: IntoIterator<Item = Option<String>>,
{
    let mut tally = BTreeMap::new();
    for version in versions.into_iter().flatten() {
        *tally.entry(version).or_insert(0) += 1;
    }
    tally
}

#[cfg(test)]
#[allow(deprecated)]
mod tests {
    use solana_sdk::account::Account;
    use solana_sdk::bpf_loader_upgradeable::{self, UpgradeableLoaderState};
    use solana_sdk::pubkey::Pubkey;

    use super::{deploy_slot, programdata_address, tally_versions};

    fn loader_account(state: &UpgradeableLoaderState, trailing: usize) -> Account {
        let mut account = Account::new_data(1, state, &bpf_loader_upgradeable::id())
            .expect("serializable loader state");
        account.data.extend(std::iter::repeat(0u8).take(trailing));
        account
    }

    #[test]
    fn tallies_versions_and_skips_missing() {
        let tally = tally_versions(vec![
            Some("1.18.1".to_string()),
            None,
            Some("1.18.1".to_string()),
            Some("1.17.9".to_string()),
        ]);
        assert_eq!(tally.len(), 2);
        assert_eq!(tally["1.18.1"], 2);
        assert_eq!(tally["1.17.9"], 1);
    }

    #[test]
    fn follows_program_to_programdata_slot() {
        let programdata = Pubkey::new_unique();
        let program = loader_account(
            &UpgradeableLoaderState::Program {
                programdata_address: programdata,
            },
            0,
        );
        assert_eq!(programdata_address(&program), Some(programdata));

        let data = loader_account(
            &UpgradeableLoaderState::ProgramData {
                slot: 245_112_003,
                upgrade_authority_address: Some(Pubkey::new_unique()),
            },
            64,
        );
        assert_eq!(deploy_slot(&data).unwrap(), Some(245_112_003));
    }

    #[test]
    fn non_upgradeable_accounts_have_no_slot() {
        let buffer = loader_account(
            &UpgradeableLoaderState::Buffer {
                authority_address: None,
            },
            0,
        );
        assert_eq!(programdata_address(&buffer), None);
        assert_eq!(deploy_slot(&buffer).unwrap(), None);
    }
}
