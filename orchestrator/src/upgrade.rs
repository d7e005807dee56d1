//! Governance-driven binary upgrade.
//!
//! Every chain goes through the same protocol, one phase at a time across all
//! chains:
//!
//! 1. schedule an upgrade height and pass a software-upgrade proposal
//!    (submit, deposit, every live validator votes yes);
//! 2. wait until every live validator of every chain sits at that height for
//!    [`HALT_CONFIRMATIONS`] consecutive reads;
//! 3. force-remove every validator container and relaunch it from the
//!    upgraded image with the same name and mounts;
//! 4. wait until every relaunched validator produces blocks past the halt.
//!
//! A validator reporting a height above the scheduled one before the swap
//! means the chain ignored the proposal; that aborts the upgrade at once.

use {
    crate::{
        chain::{proposal_deposit, upgrade_height},
        client::{ChainClient, UpgradeProposal},
        config::HALT_CONFIRMATIONS,
        context::SuiteContext,
        error::{E2eError, Result},
        poll::{poll_until, PollPolicy},
        runtime::ContainerHandle,
        validator::relaunch_validator,
    },
    log::{debug, info},
    std::collections::BTreeMap,
};

/// The first proposal on a fresh chain.
pub const UPGRADE_PROPOSAL_ID: u64 = 1;

/// Progress of one chain through the upgrade. Stages only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UpgradeStage {
    Configured,
    ProposalSubmitted,
    Deposited,
    Voted,
    AwaitingHalt,
    Halted,
    ContainersSwapped,
    AwaitingResume,
    Resumed,
}

// ── Halt detection ──────────────────────────────────────────────────────────

/// Outcome of feeding one height reading to a [`HaltDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltObservation {
    /// Still below the halt height.
    Below,
    /// At the halt height, with this many consecutive confirmations so far.
    AtTarget(u32),
    /// Confirmed halted.
    Halted,
}

/// Counts consecutive readings at the halt height for one validator.
#[derive(Debug, Clone)]
pub struct HaltDetector {
    chain_id: String,
    container: String,
    target: u64,
    required: u32,
    consecutive: u32,
}

impl HaltDetector {
    pub fn new(chain_id: impl Into<String>, container: impl Into<String>, target: u64) -> Self {
        Self {
            chain_id: chain_id.into(),
            container: container.into(),
            target,
            required: HALT_CONFIRMATIONS,
            consecutive: 0,
        }
    }

    /// Feeds one successful reading. A lower height resets the count; a
    /// higher one is an overshoot and fails.
    pub fn observe(&mut self, height: u64) -> Result<HaltObservation> {
        if height > self.target {
            return Err(E2eError::HaltOvershoot {
                chain_id: self.chain_id.clone(),
                container: self.container.clone(),
                observed: height,
                expected: self.target,
            });
        }
        if height < self.target {
            self.consecutive = 0;
            return Ok(HaltObservation::Below);
        }
        self.consecutive = self.consecutive.saturating_add(1);
        if self.consecutive >= self.required {
            Ok(HaltObservation::Halted)
        } else {
            Ok(HaltObservation::AtTarget(self.consecutive))
        }
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}

/// Polls one validator until it is confirmed halted at `target`.
pub async fn wait_for_halt(
    client: &dyn ChainClient,
    chain_id: &str,
    node: &ContainerHandle,
    target: u64,
    policy: &PollPolicy,
) -> Result<()> {
    let mut detector = HaltDetector::new(chain_id, &node.name, target);
    poll_until(
        &format!("{} to halt at height {}", node.name, target),
        policy,
        move || client.current_height(node),
        |height| match detector.observe(height)? {
            HaltObservation::Halted => Ok(Some(())),
            HaltObservation::AtTarget(count) => {
                debug!("{} at halt height {} ({} reads)", node.name, target, count);
                Ok(None)
            }
            HaltObservation::Below => Ok(None),
        },
    )
    .await
}

/// Polls one validator until its height is strictly above `target`.
pub async fn wait_for_resume(
    client: &dyn ChainClient,
    node: &ContainerHandle,
    target: u64,
    policy: &PollPolicy,
) -> Result<u64> {
    poll_until(
        &format!("{} to produce blocks past {}", node.name, target),
        policy,
        move || client.current_height(node),
        |height| Ok((height > target).then_some(height)),
    )
    .await
}

// ── Coordinator ─────────────────────────────────────────────────────────────

/// Drives every configured chain through the upgrade and tracks each chain's
/// [`UpgradeStage`].
#[derive(Debug)]
pub struct UpgradeCoordinator {
    stages: BTreeMap<String, UpgradeStage>,
}

impl UpgradeCoordinator {
    pub fn new<I, S>(chain_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stages: chain_ids
                .into_iter()
                .map(|id| (id.into(), UpgradeStage::Configured))
                .collect(),
        }
    }

    pub fn stage(&self, chain_id: &str) -> Result<UpgradeStage> {
        self.stages
            .get(chain_id)
            .copied()
            .ok_or_else(|| E2eError::UnknownChain(chain_id.to_string()))
    }

    /// Moves a chain to `next`, which must lie strictly ahead of its current stage.
    pub fn advance(&mut self, chain_id: &str, next: UpgradeStage) -> Result<()> {
        let stage = self
            .stages
            .get_mut(chain_id)
            .ok_or_else(|| E2eError::UnknownChain(chain_id.to_string()))?;
        if next <= *stage {
            return Err(E2eError::Invariant(format!(
                "upgrade of {chain_id} cannot move from {stage:?} to {next:?}"
            )));
        }
        debug!("upgrade of {}: {:?} -> {:?}", chain_id, stage, next);
        *stage = next;
        Ok(())
    }

    /// Runs the whole upgrade on every chain of the suite.
    pub async fn run(&mut self, ctx: &mut SuiteContext) -> Result<()> {
        let chain_ids = ctx.chain_ids();
        for chain_id in &chain_ids {
            self.pass_proposal(ctx, chain_id).await?;
        }
        for chain_id in &chain_ids {
            self.await_halt(ctx, chain_id).await?;
        }
        self.swap_containers(ctx, &chain_ids).await?;
        for chain_id in &chain_ids {
            self.await_resume(ctx, chain_id).await?;
        }
        info!("upgrade {} completed on {}", ctx.config().upgrade_name, chain_ids.join(", "));
        Ok(())
    }

    /// Schedules the upgrade height and walks the proposal through governance.
    pub async fn pass_proposal(&mut self, ctx: &mut SuiteContext, chain_id: &str) -> Result<()> {
        let client = ctx.client();
        let (_, first) = ctx
            .registry()
            .live(chain_id)?
            .first()
            .copied()
            .ok_or_else(|| E2eError::MissingContainer {
                chain_id: chain_id.to_string(),
                index: 0,
            })?;
        let proposer = first.clone();

        let current = client.current_height(&proposer).await?;
        let voting_period = ctx.chain(chain_id)?.voting_period();
        let height = upgrade_height(current, voting_period);
        ctx.chain_mut(chain_id)?.set_proposal_height(height)?;
        info!(
            "scheduling upgrade of {} at height {} (current {}, voting period {})",
            chain_id, height, current, voting_period
        );

        let proposal = UpgradeProposal {
            id: UPGRADE_PROPOSAL_ID,
            name: ctx.config().upgrade_name.clone(),
            height,
            deposit: proposal_deposit(),
        };
        client
            .submit_upgrade_proposal(chain_id, &proposer, &proposal)
            .await?;
        self.advance(chain_id, UpgradeStage::ProposalSubmitted)?;

        client
            .deposit_proposal(chain_id, &proposer, &proposal)
            .await?;
        self.advance(chain_id, UpgradeStage::Deposited)?;

        for (_, voter) in ctx.registry().live(chain_id)? {
            client.vote_proposal(chain_id, voter, proposal.id).await?;
        }
        self.advance(chain_id, UpgradeStage::Voted)
    }

    fn target(ctx: &SuiteContext, chain_id: &str) -> Result<u64> {
        ctx.chain(chain_id)?.proposal_height().ok_or_else(|| {
            E2eError::Invariant(format!("no upgrade height scheduled for {chain_id}"))
        })
    }

    /// Waits until every live validator of the chain is halted.
    pub async fn await_halt(&mut self, ctx: &SuiteContext, chain_id: &str) -> Result<()> {
        let target = Self::target(ctx, chain_id)?;
        self.advance(chain_id, UpgradeStage::AwaitingHalt)?;
        let client = ctx.client();
        for (_, node) in ctx.registry().live(chain_id)? {
            wait_for_halt(client.as_ref(), chain_id, node, target, &ctx.config().node_poll)
                .await?;
            info!("{} halted at height {}", node.name, target);
        }
        self.advance(chain_id, UpgradeStage::Halted)
    }

    /// Replaces every live validator of every chain with a container running
    /// the upgraded image. All chains must be halted first.
    pub async fn swap_containers(
        &mut self,
        ctx: &mut SuiteContext,
        chain_ids: &[String],
    ) -> Result<()> {
        for chain_id in chain_ids {
            let stage = self.stage(chain_id)?;
            if stage != UpgradeStage::Halted {
                return Err(E2eError::Invariant(format!(
                    "cannot swap containers of {chain_id} in stage {stage:?}"
                )));
            }
        }

        let mut swapped: Vec<(String, usize)> = Vec::new();
        for chain_id in chain_ids {
            let live: Vec<(usize, ContainerHandle)> = ctx
                .registry()
                .live(chain_id)?
                .into_iter()
                .map(|(index, handle)| (index, handle.clone()))
                .collect();
            for (index, handle) in live {
                ctx.runtime().remove(&handle, true).await?;
                ctx.registry_mut().take(chain_id, index)?;
                info!("removed {} for the upgrade", handle.name);
                swapped.push((chain_id.clone(), index));
            }
        }

        let image = ctx.config().images.upgraded_node.clone();
        for (chain_id, index) in &swapped {
            relaunch_validator(ctx, chain_id, *index, &image).await?;
        }
        for chain_id in chain_ids {
            self.advance(chain_id, UpgradeStage::ContainersSwapped)?;
        }
        Ok(())
    }

    /// Waits until every relaunched validator of the chain is past the halt height.
    pub async fn await_resume(&mut self, ctx: &SuiteContext, chain_id: &str) -> Result<()> {
        let target = Self::target(ctx, chain_id)?;
        self.advance(chain_id, UpgradeStage::AwaitingResume)?;
        let client = ctx.client();
        for (_, node) in ctx.registry().live(chain_id)? {
            let height =
                wait_for_resume(client.as_ref(), node, target, &ctx.config().node_poll).await?;
            info!("{} resumed at height {}", node.name, height);
        }
        self.advance(chain_id, UpgradeStage::Resumed)
    }
}
