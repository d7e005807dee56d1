//! Container runtime control surface.
//!
//! The orchestrator only ever needs five operations from a runtime: create a
//! network, run a container, remove it, purge it (remove with its volumes),
//! and purge the network. [`ContainerRuntime`] is that surface; the Docker
//! implementation lives in [`docker`].

pub mod docker;

use {
    crate::{config::ImageRef, error::Result},
    async_trait::async_trait,
    std::collections::BTreeMap,
};

pub use docker::DockerRuntime;

/// A network created by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkHandle {
    pub id: String,
    pub name: String,
}

/// A running container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    pub id: String,
    /// Container name without the runtime's leading `/`.
    pub name: String,
    /// Container port → host port, as requested at launch.
    pub host_ports: BTreeMap<u16, u16>,
}

impl ContainerHandle {
    /// Host port a container port was published on.
    pub fn host_port(&self, container_port: u16) -> Option<u16> {
        self.host_ports.get(&container_port).copied()
    }
}

/// Everything needed to launch one container. Containers are never
/// restarted by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: ImageRef,
    pub network_id: String,
    pub cmd: Vec<String>,
    pub entrypoint: Option<Vec<String>>,
    pub user: Option<String>,
    /// `KEY=value` pairs.
    pub env: Vec<String>,
    /// `host_path:container_path` bind mounts.
    pub mounts: Vec<String>,
    /// Container port → host port.
    pub port_bindings: BTreeMap<u16, u16>,
}

impl ContainerSpec {
    pub fn new(name: impl Into<String>, image: ImageRef, network_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image,
            network_id: network_id.into(),
            cmd: Vec::new(),
            entrypoint: None,
            user: None,
            env: Vec::new(),
            mounts: Vec::new(),
            port_bindings: BTreeMap::new(),
        }
    }

    pub fn cmd<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cmd = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn entrypoint<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entrypoint = Some(args.into_iter().map(Into::into).collect());
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn env(mut self, key: &str, value: impl AsRef<str>) -> Self {
        self.env.push(format!("{key}={}", value.as_ref()));
        self
    }

    pub fn mount(mut self, host: impl AsRef<str>, container: impl AsRef<str>) -> Self {
        self.mounts
            .push(format!("{}:{}", host.as_ref(), container.as_ref()));
        self
    }

    pub fn publish(mut self, container_port: u16, host_port: u16) -> Self {
        self.port_bindings.insert(container_port, host_port);
        self
    }
}

/// Control interface of a container runtime.
///
/// Every call completes before returning. Failures are reported as
/// [`crate::error::E2eError::Resource`] and are never retried by callers.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Creates an isolated bridge network.
    async fn create_network(&self, name: &str) -> Result<NetworkHandle>;

    /// Creates and starts a container.
    async fn run(&self, spec: &ContainerSpec) -> Result<ContainerHandle>;

    /// Removes a container, killing it first when `force` is set.
    async fn remove(&self, handle: &ContainerHandle, force: bool) -> Result<()>;

    /// Force-removes a container together with its anonymous volumes.
    async fn purge(&self, handle: &ContainerHandle) -> Result<()>;

    /// Removes a network.
    async fn purge_network(&self, handle: &NetworkHandle) -> Result<()>;
}
