//! Relayer bootstrap: one relayer container per chain pair.
//!
//! The relayer image runs `hermes_bootstrap.sh` from a scratch directory. The
//! script writes the relayer config from the `CHAIN_*_E2E_*` variables,
//! imports both validator keys and starts the relayer with its REST endpoint
//! on [`RELAYER_REST_PORT`]. Once `/state` lists both chains, a `transfer`
//! channel is opened between them.

use {
    crate::{
        chain::ChainSpec,
        client::relayer_ready,
        config::{ImageRef, BOOTSTRAP_SCRIPT, RELAYER_REST_PORT},
        context::SuiteContext,
        error::{E2eError, Result},
        poll::poll_until,
        runtime::ContainerSpec,
    },
    log::info,
    std::{fs, path::Path},
    tokio::time::sleep,
};

/// Prefix of every relayer scratch directory.
pub const RELAYER_DIR_PREFIX: &str = "ledger-e2e-testnet-hermes-";

/// Mount point of the relayer scratch directory.
pub const RELAYER_HOME: &str = "/root/hermes";

/// Name of the relayer container joining two chains.
pub fn relayer_name(chain_a: &str, chain_b: &str) -> String {
    format!("{chain_a}-{chain_b}-relayer")
}

/// Every unordered chain pair `(i, j)` with `i < j`, in order.
pub fn chain_pairs(chain_count: usize) -> Vec<(usize, usize)> {
    (0..chain_count)
        .flat_map(|i| (i.saturating_add(1)..chain_count).map(move |j| (i, j)))
        .collect()
}

/// Container spec of the relayer between `chain_a` and `chain_b`.
pub fn relayer_container_spec(
    chain_a: &ChainSpec,
    chain_b: &ChainSpec,
    image: &ImageRef,
    network_id: &str,
    relayer_dir: &Path,
    host_port: u16,
) -> Result<ContainerSpec> {
    let val_a = chain_a.validator(0)?;
    let val_b = chain_b.validator(0)?;
    let script = format!("{RELAYER_HOME}/{BOOTSTRAP_SCRIPT}");
    let bootstrap = format!("chmod +x {script} && {script}");
    Ok(ContainerSpec::new(
        relayer_name(chain_a.id(), chain_b.id()),
        image.clone(),
        network_id,
    )
    .user("root:root")
    .mount(format!("{}/", relayer_dir.display()), RELAYER_HOME)
    .publish(RELAYER_REST_PORT, host_port)
    .env("CHAIN_A_E2E_CHAIN_ID", chain_a.id())
    .env("CHAIN_B_E2E_CHAIN_ID", chain_b.id())
    .env("CHAIN_A_E2E_VAL_MNEMONIC", &val_a.mnemonic)
    .env("CHAIN_B_E2E_VAL_MNEMONIC", &val_b.mnemonic)
    .env("CHAIN_A_E2E_VAL_HOST", &val_a.name)
    .env("CHAIN_B_E2E_VAL_HOST", &val_b.name)
    .entrypoint(["sh", "-c", bootstrap.as_str()]))
}

/// Starts and connects one relayer per chain pair.
pub async fn run_relayers(ctx: &mut SuiteContext) -> Result<()> {
    for (pair_index, (i, j)) in chain_pairs(ctx.chains().len()).into_iter().enumerate() {
        run_relayer(ctx, pair_index, i, j).await?;
    }
    Ok(())
}

async fn run_relayer(ctx: &mut SuiteContext, pair_index: usize, i: usize, j: usize) -> Result<()> {
    let host_port = u16::try_from(pair_index)
        .ok()
        .and_then(|offset| RELAYER_REST_PORT.checked_add(offset))
        .ok_or_else(|| E2eError::Invariant(format!("no relayer port for pair {pair_index}")))?;

    let scratch = ctx.scratch_dir(RELAYER_DIR_PREFIX)?;
    let relayer_dir = scratch.join("hermes");
    fs::create_dir_all(&relayer_dir)?;
    // Presence is checked by `SuiteConfig::validate`.
    fs::copy(
        ctx.config().scripts_dir.join(BOOTSTRAP_SCRIPT),
        relayer_dir.join(BOOTSTRAP_SCRIPT),
    )?;

    let (chain_a, chain_b) = match (ctx.chains().get(i), ctx.chains().get(j)) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(E2eError::Invariant(format!(
                "relayer pair ({i}, {j}) out of range"
            )))
        }
    };
    let (chain_a_id, chain_b_id) = (chain_a.id().to_string(), chain_b.id().to_string());
    let spec = relayer_container_spec(
        chain_a,
        chain_b,
        &ctx.config().images.relayer,
        &ctx.network()?.id,
        &relayer_dir,
        host_port,
    )?;

    let relayer = ctx.runtime().run(&spec).await?;
    info!(
        "relayer {} started for {} <-> {}, REST on host port {}",
        relayer.name, chain_a_id, chain_b_id, host_port
    );
    ctx.add_relayer(relayer.clone());

    let client = ctx.client();
    let url = format!("http://localhost:{host_port}/state");
    poll_until(
        &format!("relayer {} to load both chains", relayer.name),
        &ctx.config().relayer_poll,
        || client.query_json(&url),
        |state| Ok(relayer_ready(&state).then_some(())),
    )
    .await?;
    info!("relayer {} is ready", relayer.name);

    let settle = ctx.config().relayer_settle;
    if !settle.is_zero() {
        info!("letting relayer settle for {}", humantime::format_duration(settle));
        sleep(settle).await;
    }

    client
        .create_channel(&relayer, &chain_a_id, &chain_b_id)
        .await?;
    info!("{} and {} connected", chain_a_id, chain_b_id);
    Ok(())
}
