//! Suite composition and the top-level run.
//!
//! A run is a fixed sequence of [`Phase`]s derived from the configuration:
//! the base setup (network, chains, validators), extended by the relayer when
//! IBC runs, and by cross-chain traffic around the governance upgrade when the
//! upgrade runs. Teardown follows every run,
//! successful or not, unless cleanup is skipped.

use {
    crate::{
        chain::{default_chain_a_validators, default_chain_b_validators, ValidatorConfig},
        client::ChainClient,
        config::{SuiteConfig, CHAIN_A_ID, CHAIN_B_ID},
        context::{SuiteContext, TeardownReport},
        driver::{run_traffic, TrafficRound},
        error::Result,
        initializer::configure_chain,
        relayer::run_relayers,
        runtime::ContainerRuntime,
        upgrade::UpgradeCoordinator,
        validator::run_validators,
    },
    log::{error, info, warn},
    std::{fmt, sync::Arc, time::Instant},
};

/// One step of a suite run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    CreateNetwork,
    ConfigureChains,
    StartValidators,
    StartRelayers,
    PreUpgradeTraffic,
    Upgrade,
    PostUpgradeTraffic,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CreateNetwork => "create network",
            Self::ConfigureChains => "configure chains",
            Self::StartValidators => "start validators",
            Self::StartRelayers => "start relayers",
            Self::PreUpgradeTraffic => "pre-upgrade traffic",
            Self::Upgrade => "upgrade",
            Self::PostUpgradeTraffic => "post-upgrade traffic",
        };
        f.write_str(name)
    }
}

/// Ordered phases of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupPlan {
    phases: Vec<Phase>,
}

impl SetupPlan {
    pub fn base() -> Self {
        Self {
            phases: vec![
                Phase::CreateNetwork,
                Phase::ConfigureChains,
                Phase::StartValidators,
            ],
        }
    }

    pub fn with_ibc(mut self) -> Self {
        self.phases.push(Phase::StartRelayers);
        self
    }

    /// Traffic is only issued on both sides of an upgrade.
    pub fn with_upgrade(mut self) -> Self {
        self.phases.extend([
            Phase::PreUpgradeTraffic,
            Phase::Upgrade,
            Phase::PostUpgradeTraffic,
        ]);
        self
    }

    /// The plan the switches ask for. An upgrade always implies IBC; invalid
    /// combinations are rejected by [`SuiteConfig::validate`] first.
    pub fn for_config(config: &SuiteConfig) -> Self {
        let mut plan = Self::base();
        if config.run_ibc() {
            plan = plan.with_ibc();
            if config.run_upgrade() {
                plan = plan.with_upgrade();
            }
        }
        plan
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }
}

/// Chains the suite configures: chain A always, chain B when IBC runs.
pub fn default_chain_layouts(config: &SuiteConfig) -> Vec<(String, Vec<ValidatorConfig>)> {
    let mut layouts = vec![(CHAIN_A_ID.to_string(), default_chain_a_validators())];
    if config.run_ibc() {
        layouts.push((CHAIN_B_ID.to_string(), default_chain_b_validators()));
    }
    layouts
}

/// Name of the suite network: the chain ids joined, then `-testnet`.
pub fn network_name<S: AsRef<str>>(chain_ids: &[S]) -> String {
    let mut name: Vec<&str> = chain_ids.iter().map(AsRef::as_ref).collect();
    name.push("testnet");
    name.join("-")
}

pub struct Suite {
    ctx: SuiteContext,
    layouts: Vec<(String, Vec<ValidatorConfig>)>,
}

impl Suite {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        client: Arc<dyn ChainClient>,
        config: SuiteConfig,
    ) -> Self {
        let layouts = default_chain_layouts(&config);
        Self {
            ctx: SuiteContext::new(runtime, client, config),
            layouts,
        }
    }

    /// Replaces the default chain layouts.
    pub fn with_chains(mut self, layouts: Vec<(String, Vec<ValidatorConfig>)>) -> Self {
        self.layouts = layouts;
        self
    }

    pub fn context(&self) -> &SuiteContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut SuiteContext {
        &mut self.ctx
    }

    pub fn plan(&self) -> SetupPlan {
        SetupPlan::for_config(self.ctx.config())
    }

    /// Validates the configuration, then runs every planned phase. Stops at
    /// the first failure without tearing anything down.
    pub async fn setup(&mut self) -> Result<()> {
        self.ctx.config().validate()?;
        for phase in self.plan().phases() {
            let start = Instant::now();
            info!("── {} ──", phase);
            self.run_phase(*phase).await.inspect_err(|e| {
                error!("phase {} failed: {}", phase, e);
            })?;
            info!("{} done in {:?}", phase, start.elapsed());
        }
        Ok(())
    }

    async fn run_phase(&mut self, phase: Phase) -> Result<()> {
        let ctx = &mut self.ctx;
        match phase {
            Phase::CreateNetwork => {
                let chain_ids: Vec<&str> =
                    self.layouts.iter().map(|(id, _)| id.as_str()).collect();
                ctx.create_network(&network_name(chain_ids.as_slice())).await?;
            }
            Phase::ConfigureChains => {
                for (chain_id, configs) in &self.layouts {
                    configure_chain(ctx, chain_id, configs).await?;
                }
            }
            Phase::StartValidators => {
                for chain_id in ctx.chain_ids() {
                    run_validators(ctx, &chain_id).await?;
                }
            }
            Phase::StartRelayers => run_relayers(ctx).await?,
            Phase::PreUpgradeTraffic => run_traffic(ctx, TrafficRound::PreUpgrade).await?,
            Phase::Upgrade => {
                let mut coordinator = UpgradeCoordinator::new(ctx.chain_ids());
                coordinator.run(ctx).await?;
            }
            Phase::PostUpgradeTraffic => run_traffic(ctx, TrafficRound::PostUpgrade).await?,
        }
        Ok(())
    }

    /// Releases every resource the run created.
    pub async fn teardown(&mut self) -> TeardownReport {
        let report = self.ctx.teardown().await;
        if !report.is_clean() {
            warn!("teardown left {} resources behind", report.failures.len());
        }
        report
    }

    /// Sets up, then tears down regardless of the outcome.
    pub async fn run(&mut self) -> Result<()> {
        let result = self.setup().await;
        self.teardown().await;
        result
    }
}
