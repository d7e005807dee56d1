//! Talking to running nodes and relayers.
//!
//! Everything the suite asks of a live chain goes through [`ChainClient`]:
//! node status, governance transactions, IBC transfers, pool creation, and the
//! relayer's channel setup. [`DockerChainClient`] drives the node and relayer
//! binaries inside their containers.

pub mod docker;

use {
    crate::{chain::Coin, error::Result, runtime::ContainerHandle},
    async_trait::async_trait,
    serde::Deserialize,
    serde_json::Value,
};

pub use docker::DockerChainClient;

/// What a node reports about its sync state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeStatus {
    pub latest_height: u64,
    pub catching_up: bool,
}

impl NodeStatus {
    /// Caught up and past the first few blocks.
    pub fn is_healthy(&self, min_height: u64) -> bool {
        !self.catching_up && self.latest_height >= min_height
    }
}

/// A software upgrade proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeProposal {
    /// Proposal id assigned by the chain. The first proposal on a fresh chain is 1.
    pub id: u64,
    pub name: String,
    pub height: u64,
    pub deposit: Coin,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn status(&self, node: &ContainerHandle) -> Result<NodeStatus>;

    async fn current_height(&self, node: &ContainerHandle) -> Result<u64> {
        Ok(self.status(node).await?.latest_height)
    }

    /// Fetches and decodes a JSON document over HTTP.
    async fn query_json(&self, url: &str) -> Result<Value>;

    async fn submit_upgrade_proposal(
        &self,
        chain_id: &str,
        node: &ContainerHandle,
        proposal: &UpgradeProposal,
    ) -> Result<()>;

    async fn deposit_proposal(
        &self,
        chain_id: &str,
        node: &ContainerHandle,
        proposal: &UpgradeProposal,
    ) -> Result<()>;

    async fn vote_proposal(
        &self,
        chain_id: &str,
        node: &ContainerHandle,
        proposal_id: u64,
    ) -> Result<()>;

    /// Creates client, connection and a `transfer` channel between two chains.
    async fn create_channel(
        &self,
        relayer: &ContainerHandle,
        chain_a: &str,
        chain_b: &str,
    ) -> Result<()>;

    async fn send_ibc_transfer(
        &self,
        src_chain_id: &str,
        node: &ContainerHandle,
        recipient: &str,
        amount: &Coin,
    ) -> Result<()>;

    /// Creates a liquidity pool from a file in the node's working directory.
    async fn create_pool(&self, chain_id: &str, node: &ContainerHandle, pool_file: &str)
        -> Result<()>;
}

// ── Relayer state ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RelayerState {
    status: String,
    result: RelayerStateResult,
}

#[derive(Deserialize)]
struct RelayerStateResult {
    chains: Vec<Value>,
}

/// Whether a relayer `/state` document shows both chains loaded. Anything
/// that does not parse is "not ready".
pub fn relayer_ready(state: &Value) -> bool {
    RelayerState::deserialize(state)
        .map(|state| state.status == "success" && state.result.chains.len() == 2)
        .unwrap_or(false)
}
