//! Per-suite mutable state and teardown.
//!
//! [`SuiteContext`] exclusively owns everything a run creates: the network,
//! the validator registry, relayer containers, one-shot init containers, and
//! scratch directories. Phases borrow it mutably; [`SuiteContext::teardown`]
//! releases whatever is still held.

use {
    crate::{
        chain::ChainSpec,
        client::ChainClient,
        config::SuiteConfig,
        error::{E2eError, Result},
        registry::ClusterRegistry,
        runtime::{ContainerHandle, ContainerRuntime, NetworkHandle},
    },
    log::{info, warn},
    std::{path::PathBuf, sync::Arc},
    tempfile::TempDir,
};

/// What teardown released and what it failed to release.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TeardownReport {
    /// Containers and networks successfully removed.
    pub purged: Vec<String>,
    /// Scratch directories removed.
    pub removed_dirs: usize,
    /// One message per resource that could not be released.
    pub failures: Vec<String>,
    /// Teardown was skipped and resources were left in place.
    pub kept: bool,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct SuiteContext {
    runtime: Arc<dyn ContainerRuntime>,
    client: Arc<dyn ChainClient>,
    config: SuiteConfig,
    network: Option<NetworkHandle>,
    chains: Vec<ChainSpec>,
    registry: ClusterRegistry,
    relayers: Vec<ContainerHandle>,
    one_shots: Vec<ContainerHandle>,
    scratch_dirs: Vec<TempDir>,
}

impl SuiteContext {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        client: Arc<dyn ChainClient>,
        config: SuiteConfig,
    ) -> Self {
        Self {
            runtime,
            client,
            config,
            network: None,
            chains: Vec::new(),
            registry: ClusterRegistry::new(),
            relayers: Vec::new(),
            one_shots: Vec::new(),
            scratch_dirs: Vec::new(),
        }
    }

    pub fn runtime(&self) -> Arc<dyn ContainerRuntime> {
        Arc::clone(&self.runtime)
    }

    pub fn client(&self) -> Arc<dyn ChainClient> {
        Arc::clone(&self.client)
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    // ── Network ─────────────────────────────────────────────────────────────

    pub async fn create_network(&mut self, name: &str) -> Result<&NetworkHandle> {
        if let Some(existing) = &self.network {
            return Err(E2eError::Invariant(format!(
                "network {} already created",
                existing.name
            )));
        }
        let network = self.runtime.create_network(name).await?;
        Ok(self.network.insert(network))
    }

    pub fn network(&self) -> Result<&NetworkHandle> {
        self.network
            .as_ref()
            .ok_or_else(|| E2eError::Invariant("suite network not created".to_string()))
    }

    // ── Chains ──────────────────────────────────────────────────────────────

    /// Adds an initialized chain and allocates its registry slots.
    pub fn add_chain(&mut self, chain: ChainSpec) -> Result<()> {
        self.registry
            .register_chain(chain.id(), chain.validators().len())?;
        self.chains.push(chain);
        Ok(())
    }

    /// Chains in configuration order.
    pub fn chains(&self) -> &[ChainSpec] {
        &self.chains
    }

    pub fn chain(&self, chain_id: &str) -> Result<&ChainSpec> {
        self.chains
            .iter()
            .find(|chain| chain.id() == chain_id)
            .ok_or_else(|| E2eError::UnknownChain(chain_id.to_string()))
    }

    pub fn chain_mut(&mut self, chain_id: &str) -> Result<&mut ChainSpec> {
        self.chains
            .iter_mut()
            .find(|chain| chain.id() == chain_id)
            .ok_or_else(|| E2eError::UnknownChain(chain_id.to_string()))
    }

    /// Chain ids in configuration order.
    pub fn chain_ids(&self) -> Vec<String> {
        self.chains.iter().map(|chain| chain.id().to_string()).collect()
    }

    pub fn registry(&self) -> &ClusterRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ClusterRegistry {
        &mut self.registry
    }

    // ── Relayers and one-shot containers ────────────────────────────────────

    pub fn add_relayer(&mut self, relayer: ContainerHandle) {
        self.relayers.push(relayer);
    }

    pub fn relayers(&self) -> &[ContainerHandle] {
        &self.relayers
    }

    /// Tracks a container expected to finish its job and be purged early.
    pub fn track_one_shot(&mut self, handle: ContainerHandle) {
        self.one_shots.push(handle);
    }

    /// Purges a tracked one-shot container now. It is untracked even if the
    /// purge fails, so teardown never releases it twice.
    pub async fn release_one_shot(&mut self, name: &str) -> Result<()> {
        let Some(position) = self.one_shots.iter().position(|h| h.name == name) else {
            return Err(E2eError::Invariant(format!(
                "no one-shot container named {name}"
            )));
        };
        let handle = self.one_shots.remove(position);
        self.runtime.purge(&handle).await
    }

    pub fn one_shot_count(&self) -> usize {
        self.one_shots.len()
    }

    // ── Scratch space ───────────────────────────────────────────────────────

    /// Creates a scratch directory owned by the suite until teardown.
    pub fn scratch_dir(&mut self, prefix: &str) -> Result<PathBuf> {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir()?;
        let path = dir.path().to_path_buf();
        self.scratch_dirs.push(dir);
        Ok(path)
    }

    // ── Teardown ────────────────────────────────────────────────────────────

    /// Releases every resource still held: relayers, validators, one-shot
    /// containers, the network, then scratch directories. Each resource is
    /// untracked before its release is attempted, so a second call is a
    /// no-op. Failures are logged and collected; teardown keeps going.
    pub async fn teardown(&mut self) -> TeardownReport {
        let mut report = TeardownReport::default();

        if self.config.skip_cleanup {
            for dir in self.scratch_dirs.drain(..) {
                let path = dir.keep();
                info!("skip cleanup: keeping {}", path.display());
            }
            info!("skip cleanup: leaving containers and network in place");
            report.kept = true;
            return report;
        }

        let containers: Vec<ContainerHandle> = self
            .relayers
            .drain(..)
            .chain(self.registry.drain())
            .chain(self.one_shots.drain(..))
            .collect();
        for handle in containers {
            match self.runtime.purge(&handle).await {
                Ok(()) => {
                    info!("purged container {}", handle.name);
                    report.purged.push(handle.name);
                }
                Err(e) => {
                    warn!("failed to purge container {}: {}", handle.name, e);
                    report.failures.push(e.to_string());
                }
            }
        }

        if let Some(network) = self.network.take() {
            match self.runtime.purge_network(&network).await {
                Ok(()) => {
                    info!("removed network {}", network.name);
                    report.purged.push(network.name);
                }
                Err(e) => {
                    warn!("failed to remove network {}: {}", network.name, e);
                    report.failures.push(e.to_string());
                }
            }
        }

        for dir in self.scratch_dirs.drain(..) {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => report.removed_dirs = report.removed_dirs.saturating_add(1),
                Err(e) => {
                    warn!("failed to remove {}: {}", path.display(), e);
                    report.failures.push(format!("remove {}: {e}", path.display()));
                }
            }
        }

        report
    }
}
