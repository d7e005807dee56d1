//! Chain initialization through a one-shot init container.
//!
//! The init container writes genesis, node configs and keys for every
//! validator into a scratch data directory, then serializes a
//! [`ChainMetadata`] summary to `{data-dir}/{chain-id}-encode`. The file shows
//! up some time after the container starts and may be read half-written, so
//! it is polled until it parses.

use {
    crate::{
        chain::{init_config_json, ChainMetadata, ChainSpec, ValidatorConfig, VotingPeriod},
        context::SuiteContext,
        error::{E2eError, Result},
        poll::poll_until,
        runtime::ContainerSpec,
    },
    log::info,
    std::{
        fs,
        future::ready,
        path::{Path, PathBuf},
    },
};

/// Prefix of every chain data directory.
pub const CHAIN_DATA_DIR_PREFIX: &str = "ledger-e2e-testnet-";

/// Location of the metadata file the init container writes.
pub fn metadata_path(data_dir: &Path, chain_id: &str) -> PathBuf {
    data_dir.join(format!("{chain_id}-encode"))
}

fn read_metadata(path: &Path) -> Result<ChainMetadata> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Init container arguments.
pub fn init_args(
    data_dir: &Path,
    chain_id: &str,
    configs: &[ValidatorConfig],
    voting_period: VotingPeriod,
) -> Result<Vec<String>> {
    Ok(vec![
        format!("--data-dir={}", data_dir.display()),
        format!("--chain-id={chain_id}"),
        format!("--config={}", init_config_json(configs)?),
        format!("--voting-period={}", voting_period.as_cli_arg()),
    ])
}

/// Initializes `chain_id` with one validator per config and adds the result
/// to the suite.
///
/// The init container is purged as soon as the metadata is read. If reading
/// never succeeds the container stays tracked and is released by teardown.
pub async fn configure_chain(
    ctx: &mut SuiteContext,
    chain_id: &str,
    configs: &[ValidatorConfig],
) -> Result<()> {
    let voting_period = VotingPeriod::for_validators(configs.len());
    info!(
        "configuring chain {} with {} validators, voting period {}",
        chain_id,
        configs.len(),
        voting_period
    );

    let data_dir = ctx.scratch_dir(CHAIN_DATA_DIR_PREFIX)?;
    let data_dir_str = data_dir.display().to_string();
    let spec = ContainerSpec::new(
        chain_id,
        ctx.config().images.init.clone(),
        ctx.network()?.id.clone(),
    )
    .user("root:root")
    .mount(&data_dir_str, &data_dir_str)
    .cmd(init_args(&data_dir, chain_id, configs, voting_period)?);

    let handle = ctx.runtime().run(&spec).await?;
    info!("started init container {} for {}", handle.name, chain_id);
    ctx.track_one_shot(handle);

    let path = metadata_path(&data_dir, chain_id);
    let policy = ctx.config().init_poll;
    let metadata = poll_until(
        &format!("chain metadata at {}", path.display()),
        &policy,
        || ready(read_metadata(&path)),
        |metadata: ChainMetadata| {
            if metadata.chain_meta.id != chain_id {
                return Err(E2eError::Invariant(format!(
                    "metadata at {} describes chain {}, expected {}",
                    path.display(),
                    metadata.chain_meta.id,
                    chain_id
                )));
            }
            Ok(Some(metadata))
        },
    )
    .await?;

    ctx.release_one_shot(chain_id).await?;

    let chain = ChainSpec::from_metadata(metadata, configs, voting_period)?;
    info!(
        "chain {} initialized in {}",
        chain.id(),
        chain.data_dir().display()
    );
    ctx.add_chain(chain)
}
