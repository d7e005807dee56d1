//! Validator container lifecycle.

use {
    crate::{
        chain::ValidatorSpec,
        client::ChainClient,
        config::{ImageRef, CHAIN_PORT_OFFSET_STEP, MIN_HEALTHY_HEIGHT, VALIDATOR_HOST_PORTS},
        context::SuiteContext,
        error::{E2eError, Result},
        poll::{poll_until, PollPolicy},
        runtime::{ContainerHandle, ContainerSpec},
    },
    log::info,
};

/// Node home inside validator containers.
pub const NODE_HOME: &str = "/ledger/.ledgerd";

/// Working directory inside validator containers; holds the scripts dir.
pub const NODE_WORKDIR: &str = "/ledger";

/// Host port offset of the chain at `position` in the suite.
pub fn chain_port_offset(position: usize) -> Result<u16> {
    u16::try_from(position)
        .ok()
        .and_then(|p| p.checked_mul(CHAIN_PORT_OFFSET_STEP))
        .ok_or_else(|| E2eError::Invariant(format!("no host port offset for chain {position}")))
}

/// Container spec of one validator. Only validator 0 publishes host ports.
pub fn validator_container_spec(
    validator: &ValidatorSpec,
    image: &ImageRef,
    network_id: &str,
    scripts_dir: &str,
    port_offset: u16,
) -> ContainerSpec {
    let config_dir = format!("{}/", validator.config_dir.display());
    let mut spec = ContainerSpec::new(&validator.name, image.clone(), network_id)
        .mount(config_dir, NODE_HOME)
        .mount(scripts_dir, NODE_WORKDIR)
        .cmd(["start"]);
    if validator.index == 0 {
        for port in VALIDATOR_HOST_PORTS {
            spec = spec.publish(port, port.saturating_add(port_offset));
        }
    }
    spec
}

/// Polls a node until it is caught up and past [`MIN_HEALTHY_HEIGHT`].
pub async fn wait_healthy(
    client: &dyn ChainClient,
    node: &ContainerHandle,
    policy: &PollPolicy,
) -> Result<u64> {
    poll_until(
        &format!("{} to become healthy", node.name),
        policy,
        move || client.status(node),
        |status| {
            Ok(status
                .is_healthy(MIN_HEALTHY_HEIGHT)
                .then_some(status.latest_height))
        },
    )
    .await
}

async fn launch(
    ctx: &mut SuiteContext,
    chain_id: &str,
    index: usize,
    image: &ImageRef,
    as_root: bool,
) -> Result<ContainerHandle> {
    let position = ctx
        .chains()
        .iter()
        .position(|chain| chain.id() == chain_id)
        .ok_or_else(|| E2eError::UnknownChain(chain_id.to_string()))?;
    let mut spec = validator_container_spec(
        ctx.chain(chain_id)?.validator(index)?,
        image,
        &ctx.network()?.id,
        &ctx.config().scripts_dir.display().to_string(),
        chain_port_offset(position)?,
    );
    if as_root {
        spec = spec.user("root:root");
    }
    let handle = ctx.runtime().run(&spec).await?;
    info!(
        "validator {} of {} running as {} ({})",
        index,
        chain_id,
        handle.name,
        image.reference()
    );
    ctx.registry_mut().insert(chain_id, index, handle.clone())?;
    Ok(handle)
}

/// Starts every auto-start validator of a chain in index order, then waits
/// for each of them to become healthy.
pub async fn run_validators(ctx: &mut SuiteContext, chain_id: &str) -> Result<()> {
    let indexes: Vec<usize> = ctx
        .chain(chain_id)?
        .auto_started()
        .map(|validator| validator.index)
        .collect();
    let image = ctx.config().images.node.clone();

    let mut started = Vec::with_capacity(indexes.len());
    for index in indexes {
        started.push(launch(ctx, chain_id, index, &image, false).await?);
    }

    let client = ctx.client();
    let policy = ctx.config().node_poll;
    for handle in &started {
        let height = wait_healthy(client.as_ref(), handle, &policy).await?;
        info!("{} is healthy at height {}", handle.name, height);
    }
    info!(
        "chain {} running {} of {} validators",
        chain_id,
        ctx.registry().live_count(chain_id)?,
        ctx.registry().slot_count(chain_id)?
    );
    Ok(())
}

/// Starts a validator that was left stopped and waits for it to be healthy.
pub async fn start_validator(ctx: &mut SuiteContext, chain_id: &str, index: usize) -> Result<()> {
    let image = ctx.config().images.node.clone();
    let handle = launch(ctx, chain_id, index, &image, false).await?;
    let client = ctx.client();
    let height = wait_healthy(client.as_ref(), &handle, &ctx.config().node_poll).await?;
    info!("{} is healthy at height {}", handle.name, height);
    Ok(())
}

/// Relaunches a validator from `image` with its original name and mounts,
/// running as root so the new binary can take over the existing data dir.
/// The validator's registry slot must already be empty.
pub async fn relaunch_validator(
    ctx: &mut SuiteContext,
    chain_id: &str,
    index: usize,
    image: &ImageRef,
) -> Result<ContainerHandle> {
    launch(ctx, chain_id, index, image, true).await
}
