//! Cross-chain traffic issued around the upgrade.

use {
    crate::{
        chain::{native_token, stake_token, Coin},
        context::SuiteContext,
        error::{E2eError, Result},
    },
    log::info,
};

/// Which side of the upgrade traffic is issued on. Each side creates pools
/// from its own pool files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficRound {
    PreUpgrade,
    PostUpgrade,
}

impl TrafficRound {
    /// Pool files for chain A and chain B, relative to the scripts directory.
    pub fn pool_files(&self) -> [&'static str; 2] {
        match self {
            Self::PreUpgrade => ["pool1A.json", "pool1B.json"],
            Self::PostUpgrade => ["pool2A.json", "pool2B.json"],
        }
    }
}

/// Transfers `amount` from the first validator of `src` to the first
/// validator of `dst`.
pub async fn transfer(ctx: &SuiteContext, src: &str, dst: &str, amount: &Coin) -> Result<()> {
    let recipient = ctx.chain(dst)?.validator(0)?.public_address.clone();
    let sender = ctx.registry().get(src, 0)?;
    ctx.client()
        .send_ibc_transfer(src, sender, &recipient, amount)
        .await
}

/// Runs one round of traffic: native and stake transfers both ways, then a
/// pool on each chain.
pub async fn run_traffic(ctx: &SuiteContext, round: TrafficRound) -> Result<()> {
    let [chain_a, chain_b] = match ctx.chains() {
        [a, b] => [a.id().to_string(), b.id().to_string()],
        chains => {
            return Err(E2eError::Invariant(format!(
                "cross-chain traffic needs exactly 2 chains, have {}",
                chains.len()
            )))
        }
    };
    info!("issuing {:?} traffic between {} and {}", round, chain_a, chain_b);

    for token in [native_token(), stake_token()] {
        transfer(ctx, &chain_a, &chain_b, &token).await?;
        transfer(ctx, &chain_b, &chain_a, &token).await?;
    }

    let client = ctx.client();
    for (chain_id, pool_file) in [&chain_a, &chain_b].into_iter().zip(round.pool_files()) {
        let node = ctx.registry().get(chain_id, 0)?;
        client.create_pool(chain_id, node, pool_file).await?;
    }
    Ok(())
}
