//! Suite configuration: environment switches, images, and timing constants.

use {
    crate::{
        error::{E2eError, Result},
        poll::PollPolicy,
    },
    std::{
        env,
        path::{Path, PathBuf},
        time::Duration,
    },
};

// ── Environment switches ────────────────────────────────────────────────────

/// Skip the governance upgrade phase.
pub const SKIP_UPGRADE_ENV: &str = "LEDGER_E2E_SKIP_UPGRADE";

/// Skip the second chain and the relayer. Requires the upgrade to be skipped too.
pub const SKIP_IBC_ENV: &str = "LEDGER_E2E_SKIP_IBC";

/// Leave containers, network and scratch directories in place after the run.
pub const SKIP_CLEANUP_ENV: &str = "LEDGER_E2E_SKIP_CLEANUP";

/// Directory mounted into validators; holds the relayer bootstrap script and pool files.
pub const SCRIPTS_DIR_ENV: &str = "LEDGER_E2E_SCRIPTS_DIR";

/// Delay between relayer readiness and channel creation, e.g. `10s`.
pub const RELAYER_SETTLE_ENV: &str = "LEDGER_E2E_RELAYER_SETTLE";

/// Name of the software upgrade proposed through governance.
pub const UPGRADE_NAME_ENV: &str = "LEDGER_E2E_UPGRADE_NAME";

// ── Chains ──────────────────────────────────────────────────────────────────

/// Chain id of the first chain.
pub const CHAIN_A_ID: &str = "ledger-test-a";

/// Chain id of the second chain, only configured when IBC runs.
pub const CHAIN_B_ID: &str = "ledger-test-b";

// ── Governance timing (in blocks) ───────────────────────────────────────────

/// Estimated blocks needed to submit a proposal.
pub const PROPOSAL_SUBMIT_BLOCKS: f64 = 10.0;

/// Estimated blocks needed to deposit on a proposal.
pub const PROPOSAL_DEPOSIT_BLOCKS: f64 = 10.0;

/// Blocks needed for a single validator to vote.
pub const PROPOSAL_VOTE_BLOCKS: f64 = 1.2;

/// Safety margin added to every governance estimate.
pub const PROPOSAL_BUFFER_BLOCKS: f64 = 5.0;

/// Consecutive reads at the upgrade height required to call a validator halted.
pub const HALT_CONFIRMATIONS: u32 = 3;

/// A node is only considered live once it produced at least this many blocks.
pub const MIN_HEALTHY_HEIGHT: u64 = 3;

// ── Polling bounds ──────────────────────────────────────────────────────────

/// Attempts to read the init container's metadata file.
pub const INIT_METADATA_ATTEMPTS: u32 = 60;

/// Spacing between metadata read attempts.
pub const INIT_METADATA_INTERVAL: Duration = Duration::from_secs(1);

/// Deadline for node health, halt and resume polls.
pub const NODE_POLL_TIMEOUT: Duration = Duration::from_secs(300);

/// Interval for node health, halt and resume polls.
pub const NODE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default settle delay before channel creation.
pub const DEFAULT_RELAYER_SETTLE: Duration = Duration::from_secs(10);

// ── Ports ───────────────────────────────────────────────────────────────────

/// Ports of the first validator published on the host: API, pprof/metrics
/// (6060-6065), gRPC, P2P and consensus RPC.
pub const VALIDATOR_HOST_PORTS: [u16; 10] =
    [1317, 6060, 6061, 6062, 6063, 6064, 6065, 9090, 26656, 26657];

/// Host port shift applied per chain so two chains never collide.
pub const CHAIN_PORT_OFFSET_STEP: u16 = 10;

/// Relayer REST port inside the relayer container.
pub const RELAYER_REST_PORT: u16 = 3031;

// ── Scripts ─────────────────────────────────────────────────────────────────

/// Default scripts directory, relative to the working directory.
pub const SCRIPTS_DIR_NAME: &str = "scripts";

/// Relayer bootstrap script inside the scripts directory.
pub const BOOTSTRAP_SCRIPT: &str = "hermes_bootstrap.sh";

// ── Images ──────────────────────────────────────────────────────────────────

/// Locally built node image used after the upgrade (and for non-upgrade runs).
pub const LOCAL_NODE_REPOSITORY: &str = "ledger-e2e";
/// Tag of the locally built node image.
pub const LOCAL_NODE_TAG: &str = "debug";

/// Locally built chain initializer image.
pub const LOCAL_INIT_REPOSITORY: &str = "ledger-e2e-init-chain";
/// Tag of the locally built chain initializer image.
pub const LOCAL_INIT_TAG: &str = "debug";

/// Previous release of the node, started before the upgrade.
pub const PREVIOUS_NODE_REPOSITORY: &str = "ledgerlabs/ledger-dev";
/// Tag of the previous node release.
pub const PREVIOUS_NODE_TAG: &str = "v1.0.0-debug";

/// Chain initializer built from the previous release.
pub const PREVIOUS_INIT_REPOSITORY: &str = "ledgerlabs/ledger-e2e-init-chain";
/// Tag of the previous chain initializer.
pub const PREVIOUS_INIT_TAG: &str = "v1.0.0";

/// Relayer image.
pub const RELAYER_REPOSITORY: &str = "informalsystems/hermes";
/// Relayer image tag.
pub const RELAYER_TAG: &str = "1.10.0";

/// Repository and tag of a container image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub repository: String,
    pub tag: String,
}

impl ImageRef {
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: tag.into(),
        }
    }

    /// `repository:tag`, the form the runtime resolves.
    pub fn reference(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}

/// Images used by each stage of the suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageConfig {
    /// Chain initializer.
    pub init: ImageRef,
    /// Node image validators start with.
    pub node: ImageRef,
    /// Node image validators are swapped to during the upgrade.
    pub upgraded_node: ImageRef,
    /// Relayer image.
    pub relayer: ImageRef,
}

impl ImageConfig {
    /// Upgrade runs start from the previous release; everything else runs
    /// the locally built images directly.
    pub fn new(is_upgrade: bool) -> Self {
        let local_node = ImageRef::new(LOCAL_NODE_REPOSITORY, LOCAL_NODE_TAG);
        let (init, node) = if is_upgrade {
            (
                ImageRef::new(PREVIOUS_INIT_REPOSITORY, PREVIOUS_INIT_TAG),
                ImageRef::new(PREVIOUS_NODE_REPOSITORY, PREVIOUS_NODE_TAG),
            )
        } else {
            (
                ImageRef::new(LOCAL_INIT_REPOSITORY, LOCAL_INIT_TAG),
                local_node.clone(),
            )
        };
        Self {
            init,
            node,
            upgraded_node: local_node,
            relayer: ImageRef::new(RELAYER_REPOSITORY, RELAYER_TAG),
        }
    }
}

/// Complete configuration of one suite run.
#[derive(Debug, Clone)]
pub struct SuiteConfig {
    pub skip_upgrade: bool,
    pub skip_ibc: bool,
    pub skip_cleanup: bool,
    /// Host directory mounted into validators and holding `hermes_bootstrap.sh`.
    pub scripts_dir: PathBuf,
    /// Name of the software upgrade plan.
    pub upgrade_name: String,
    pub images: ImageConfig,
    /// Metadata file polling.
    pub init_poll: PollPolicy,
    /// Health, halt, and resume polling.
    pub node_poll: PollPolicy,
    /// Relayer readiness polling.
    pub relayer_poll: PollPolicy,
    pub relayer_settle: Duration,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            skip_upgrade: false,
            skip_ibc: false,
            skip_cleanup: false,
            scripts_dir: env::current_dir()
                .map(|dir| dir.join(SCRIPTS_DIR_NAME))
                .unwrap_or_else(|_| PathBuf::from(SCRIPTS_DIR_NAME)),
            upgrade_name: "v2".to_string(),
            images: ImageConfig::new(true),
            init_poll: PollPolicy::attempts(INIT_METADATA_ATTEMPTS, INIT_METADATA_INTERVAL),
            node_poll: PollPolicy::timeout(NODE_POLL_TIMEOUT, NODE_POLL_INTERVAL),
            relayer_poll: PollPolicy::timeout(NODE_POLL_TIMEOUT, NODE_POLL_INTERVAL),
            relayer_settle: DEFAULT_RELAYER_SETTLE,
        }
    }
}

impl SuiteConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Unset and empty values keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let mut config = Self::default();
        if let Some(value) = read(SKIP_UPGRADE_ENV) {
            config.skip_upgrade = parse_bool(SKIP_UPGRADE_ENV, &value)?;
        }
        if let Some(value) = read(SKIP_IBC_ENV) {
            config.skip_ibc = parse_bool(SKIP_IBC_ENV, &value)?;
        }
        if let Some(value) = read(SKIP_CLEANUP_ENV) {
            config.skip_cleanup = parse_bool(SKIP_CLEANUP_ENV, &value)?;
        }
        if let Some(value) = read(SCRIPTS_DIR_ENV) {
            config.scripts_dir = absolute_path(value)?;
        }
        if let Some(value) = read(UPGRADE_NAME_ENV) {
            config.upgrade_name = value;
        }
        if let Some(value) = read(RELAYER_SETTLE_ENV) {
            config.relayer_settle = humantime::parse_duration(&value).map_err(|e| {
                E2eError::Configuration(format!("{RELAYER_SETTLE_ENV}={value:?}: {e}"))
            })?;
        }
        config.images = ImageConfig::new(!config.skip_upgrade);
        Ok(config)
    }

    /// Rejects switch combinations that cannot run. Must pass before any
    /// container or network is created.
    pub fn validate(&self) -> Result<()> {
        if self.skip_ibc && !self.skip_upgrade {
            return Err(E2eError::Configuration(format!(
                "IBC must be enabled for upgrade tests, either set {SKIP_IBC_ENV} to false or \
                 {SKIP_UPGRADE_ENV} to true"
            )));
        }
        // Docker reads a bind source without a leading `/` as a volume name.
        if !self.scripts_dir.is_absolute() {
            return Err(E2eError::Configuration(format!(
                "scripts dir {} must be an absolute path",
                self.scripts_dir.display()
            )));
        }
        if !self.scripts_dir.is_dir() {
            return Err(E2eError::Configuration(format!(
                "scripts dir {} does not exist",
                self.scripts_dir.display()
            )));
        }
        let bootstrap = self.scripts_dir.join(BOOTSTRAP_SCRIPT);
        if self.run_ibc() && !bootstrap.is_file() {
            return Err(E2eError::Configuration(format!(
                "relayer bootstrap script {} is missing",
                bootstrap.display()
            )));
        }
        Ok(())
    }

    pub fn run_ibc(&self) -> bool {
        !self.skip_ibc
    }

    pub fn run_upgrade(&self) -> bool {
        !self.skip_upgrade
    }
}

/// Resolves a relative path against the working directory.
pub fn absolute_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(env::current_dir()?.join(path))
    }
}

/// Parses a boolean switch with the spellings Go's `strconv.ParseBool` accepts.
pub fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        other => Err(E2eError::Configuration(format!(
            "{key}: {other:?} is not a boolean"
        ))),
    }
}
