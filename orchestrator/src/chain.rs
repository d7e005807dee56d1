//! Chain and validator descriptions.
//!
//! A chain is described twice: before initialization as a list of
//! [`ValidatorConfig`]s (what we ask the init container for), and afterwards
//! as a [`ChainSpec`] that merges those configs with the [`ChainMetadata`] the
//! init container wrote to disk.

use {
    crate::{
        config::{
            PROPOSAL_BUFFER_BLOCKS, PROPOSAL_DEPOSIT_BLOCKS, PROPOSAL_SUBMIT_BLOCKS,
            PROPOSAL_VOTE_BLOCKS,
        },
        error::{E2eError, Result},
    },
    serde::{Deserialize, Serialize},
    std::{fmt, path::PathBuf, time::Duration},
};

// ── Pruning ─────────────────────────────────────────────────────────────────

/// How much historical state a node keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruningStrategy {
    Default,
    Nothing,
    Custom { keep_recent: u64, interval: u64 },
    Everything,
}

impl PruningStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Nothing => "nothing",
            Self::Custom { .. } => "custom",
            Self::Everything => "everything",
        }
    }

    fn keep_recent(&self) -> u64 {
        match self {
            Self::Custom { keep_recent, .. } => *keep_recent,
            _ => 0,
        }
    }

    fn interval(&self) -> u64 {
        match self {
            Self::Custom { interval, .. } => *interval,
            _ => 0,
        }
    }
}

// ── Pre-initialization config ───────────────────────────────────────────────

/// Per-validator settings handed to the init container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorConfig {
    pub pruning: PruningStrategy,
    pub snapshot_interval: u64,
    pub snapshot_keep_recent: u32,
    /// Started together with the chain. Validators without it are only
    /// configured and can be started later on demand.
    pub auto_start: bool,
}

impl ValidatorConfig {
    pub fn new(pruning: PruningStrategy) -> Self {
        Self {
            pruning,
            snapshot_interval: 1500,
            snapshot_keep_recent: 2,
            auto_start: true,
        }
    }

    pub fn with_snapshots(mut self, interval: u64, keep_recent: u32) -> Self {
        self.snapshot_interval = interval;
        self.snapshot_keep_recent = keep_recent;
        self
    }

    pub fn deferred(mut self) -> Self {
        self.auto_start = false;
        self
    }
}

/// JSON shape the init container expects for one validator.
#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct InitValidatorConfig {
    pruning: &'static str,
    pruning_keep_recent: String,
    pruning_interval: String,
    snapshot_interval: u64,
    snapshot_keep_recent: u32,
}

impl From<&ValidatorConfig> for InitValidatorConfig {
    fn from(config: &ValidatorConfig) -> Self {
        Self {
            pruning: config.pruning.as_str(),
            pruning_keep_recent: config.pruning.keep_recent().to_string(),
            pruning_interval: config.pruning.interval().to_string(),
            snapshot_interval: config.snapshot_interval,
            snapshot_keep_recent: config.snapshot_keep_recent,
        }
    }
}

/// Serializes the `--config` argument of the init container.
pub fn init_config_json(configs: &[ValidatorConfig]) -> Result<String> {
    let wire: Vec<InitValidatorConfig> = configs.iter().map(InitValidatorConfig::from).collect();
    Ok(serde_json::to_string(&wire)?)
}

/// Chain A: one validator per pruning strategy, the last one left stopped.
pub fn default_chain_a_validators() -> Vec<ValidatorConfig> {
    vec![
        ValidatorConfig::new(PruningStrategy::Default),
        ValidatorConfig::new(PruningStrategy::Nothing),
        ValidatorConfig::new(PruningStrategy::Custom {
            keep_recent: 10_000,
            interval: 13,
        }),
        ValidatorConfig::new(PruningStrategy::Everything)
            .with_snapshots(0, 0)
            .deferred(),
    ]
}

/// Chain B: three validators, all started.
pub fn default_chain_b_validators() -> Vec<ValidatorConfig> {
    vec![
        ValidatorConfig::new(PruningStrategy::Default),
        ValidatorConfig::new(PruningStrategy::Nothing),
        ValidatorConfig::new(PruningStrategy::Custom {
            keep_recent: 10_000,
            interval: 13,
        }),
    ]
}

// ── Governance timing ───────────────────────────────────────────────────────

/// Governance voting period of a chain, in whole blocks.
///
/// Computed once from the validator count; the same value configures genesis
/// and the upgrade height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VotingPeriod {
    blocks: u64,
}

impl VotingPeriod {
    /// `deposit + validators × per-vote + buffer`, truncated to whole blocks.
    pub fn for_validators(validator_count: usize) -> Self {
        let raw = PROPOSAL_DEPOSIT_BLOCKS
            + validator_count as f64 * PROPOSAL_VOTE_BLOCKS
            + PROPOSAL_BUFFER_BLOCKS;
        Self {
            blocks: raw.trunc() as u64,
        }
    }

    pub fn blocks(&self) -> u64 {
        self.blocks
    }

    /// The period at one second per block.
    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.blocks)
    }

    /// `--voting-period` value, in the `<n>s` form the init binary parses.
    pub fn as_cli_arg(&self) -> String {
        format!("{}s", self.blocks)
    }
}

impl fmt::Display for VotingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} blocks", self.blocks)
    }
}

/// Height at which the upgrade proposal halts the chain:
/// `current + voting period + submit + buffer`.
pub fn upgrade_height(current_height: u64, voting_period: VotingPeriod) -> u64 {
    current_height
        .saturating_add(voting_period.blocks())
        .saturating_add(PROPOSAL_SUBMIT_BLOCKS as u64)
        .saturating_add(PROPOSAL_BUFFER_BLOCKS as u64)
}

// ── Chain metadata (written by the init container) ──────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainMetaInfo {
    pub data_dir: PathBuf,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorMetadata {
    pub name: String,
    pub config_dir: PathBuf,
    pub index: usize,
    pub mnemonic: String,
    pub public_address: String,
}

/// Contents of `{data-dir}/{chain-id}-encode`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainMetadata {
    pub chain_meta: ChainMetaInfo,
    pub validators: Vec<ValidatorMetadata>,
}

// ── Initialized chain ───────────────────────────────────────────────────────

/// One validator of an initialized chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorSpec {
    pub index: usize,
    /// Container name, also the validator's host name on the suite network.
    pub name: String,
    pub config_dir: PathBuf,
    pub mnemonic: String,
    pub public_address: String,
    pub pruning: PruningStrategy,
    pub snapshot_interval: u64,
    pub snapshot_keep_recent: u32,
    pub auto_start: bool,
}

/// An initialized chain.
#[derive(Debug, Clone)]
pub struct ChainSpec {
    id: String,
    data_dir: PathBuf,
    validators: Vec<ValidatorSpec>,
    voting_period: VotingPeriod,
    proposal_height: Option<u64>,
}

impl ChainSpec {
    /// Merges the requested configs with the metadata the init container
    /// produced. Both must describe the same validators, index for index.
    pub fn from_metadata(
        metadata: ChainMetadata,
        configs: &[ValidatorConfig],
        voting_period: VotingPeriod,
    ) -> Result<Self> {
        if metadata.validators.len() != configs.len() {
            return Err(E2eError::Invariant(format!(
                "chain {} initialized {} validators, {} were configured",
                metadata.chain_meta.id,
                metadata.validators.len(),
                configs.len()
            )));
        }

        let mut validators = metadata.validators;
        validators.sort_by_key(|v| v.index);
        let validators = validators
            .into_iter()
            .zip(configs)
            .enumerate()
            .map(|(position, (meta, config))| {
                if meta.index != position {
                    return Err(E2eError::Invariant(format!(
                        "chain {} metadata has validator index {} at position {}",
                        metadata.chain_meta.id, meta.index, position
                    )));
                }
                Ok(ValidatorSpec {
                    index: meta.index,
                    name: meta.name,
                    config_dir: meta.config_dir,
                    mnemonic: meta.mnemonic,
                    public_address: meta.public_address,
                    pruning: config.pruning,
                    snapshot_interval: config.snapshot_interval,
                    snapshot_keep_recent: config.snapshot_keep_recent,
                    auto_start: config.auto_start,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            id: metadata.chain_meta.id,
            data_dir: metadata.chain_meta.data_dir,
            validators,
            voting_period,
            proposal_height: None,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    pub fn validators(&self) -> &[ValidatorSpec] {
        &self.validators
    }

    pub fn validator(&self, index: usize) -> Result<&ValidatorSpec> {
        self.validators
            .get(index)
            .ok_or_else(|| E2eError::MissingContainer {
                chain_id: self.id.clone(),
                index,
            })
    }

    /// Validators started with the chain, in index order.
    pub fn auto_started(&self) -> impl Iterator<Item = &ValidatorSpec> {
        self.validators.iter().filter(|v| v.auto_start)
    }

    /// Validators left for tests to start on demand.
    pub fn deferred_count(&self) -> usize {
        self.validators.iter().filter(|v| !v.auto_start).count()
    }

    pub fn voting_period(&self) -> VotingPeriod {
        self.voting_period
    }

    pub fn proposal_height(&self) -> Option<u64> {
        self.proposal_height
    }

    /// Records the upgrade height. It can only be set once per chain.
    pub fn set_proposal_height(&mut self, height: u64) -> Result<()> {
        if let Some(existing) = self.proposal_height {
            return Err(E2eError::Invariant(format!(
                "upgrade height of {} already set to {existing}, refusing {height}",
                self.id
            )));
        }
        self.proposal_height = Some(height);
        Ok(())
    }
}

// ── Tokens ──────────────────────────────────────────────────────────────────

/// An amount of a single denomination, rendered as `<amount><denom>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coin {
    pub amount: u128,
    pub denom: String,
}

impl Coin {
    pub fn new(amount: u128, denom: impl Into<String>) -> Self {
        Self {
            amount,
            denom: denom.into(),
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Native fee token transferred across chains.
pub fn native_token() -> Coin {
    Coin::new(2_000_000, "uledger")
}

/// Staking token transferred across chains.
pub fn stake_token() -> Coin {
    Coin::new(2_000_000, "stake")
}

/// Minimum deposit that puts an upgrade proposal into voting.
pub fn proposal_deposit() -> Coin {
    Coin::new(10_000_000, "uledger")
}
