//! [`ContainerRuntime`] backed by the local Docker daemon.

use {
    super::{ContainerHandle, ContainerRuntime, ContainerSpec, NetworkHandle},
    crate::error::{E2eError, Result},
    async_trait::async_trait,
    bollard::{
        models::{
            ContainerCreateBody, HostConfig, NetworkCreateRequest, PortBinding, RestartPolicy,
            RestartPolicyNameEnum,
        },
        query_parameters::{
            CreateContainerOptionsBuilder, RemoveContainerOptionsBuilder, StartContainerOptions,
        },
        Docker,
    },
    log::{debug, info, warn},
    std::{collections::HashMap, future::Future},
};

/// Talks to the Docker Engine API over the default local socket.
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| E2eError::resource("connect to", "docker daemon", e))?;
        Ok(Self { docker })
    }

    pub fn from_client(docker: Docker) -> Self {
        Self { docker }
    }

    /// The underlying client, shared with the exec-based chain client.
    pub fn client(&self) -> &Docker {
        &self.docker
    }

    fn create_body(spec: &ContainerSpec) -> ContainerCreateBody {
        let port_bindings: HashMap<String, Option<Vec<PortBinding>>> = spec
            .port_bindings
            .iter()
            .map(|(container_port, host_port)| {
                (
                    format!("{container_port}/tcp"),
                    Some(vec![PortBinding {
                        host_ip: Some(String::new()),
                        host_port: Some(host_port.to_string()),
                    }]),
                )
            })
            .collect();
        let exposed_ports: HashMap<String, HashMap<(), ()>> = spec
            .port_bindings
            .keys()
            .map(|port| (format!("{port}/tcp"), HashMap::new()))
            .collect();

        let host_config = HostConfig {
            network_mode: Some(spec.network_id.clone()),
            binds: Some(spec.mounts.clone()),
            port_bindings: (!port_bindings.is_empty()).then_some(port_bindings),
            restart_policy: Some(RestartPolicy {
                name: Some(RestartPolicyNameEnum::NO),
                maximum_retry_count: None,
            }),
            ..HostConfig::default()
        };

        ContainerCreateBody {
            image: Some(spec.image.reference()),
            cmd: (!spec.cmd.is_empty()).then(|| spec.cmd.clone()),
            entrypoint: spec.entrypoint.clone(),
            env: Some(spec.env.clone()),
            user: spec.user.clone(),
            exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
            host_config: Some(host_config),
            ..ContainerCreateBody::default()
        }
    }
}

/// Awaits `start`. On failure awaits `discard`, then returns the start error.
async fn start_or_discard(
    name: &str,
    start: impl Future<Output = Result<()>>,
    discard: impl Future<Output = Result<()>>,
) -> Result<()> {
    let Err(start_error) = start.await else {
        return Ok(());
    };
    match discard.await {
        Ok(()) => debug!("discarded container {} after a failed start", name),
        Err(e) => warn!("container {} failed to start and could not be discarded: {}", name, e),
    }
    Err(start_error)
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn create_network(&self, name: &str) -> Result<NetworkHandle> {
        let response = self
            .docker
            .create_network(NetworkCreateRequest {
                name: name.to_string(),
                ..NetworkCreateRequest::default()
            })
            .await
            .map_err(|e| E2eError::resource("create network", name, e))?;
        if response.id.is_empty() {
            return Err(E2eError::resource(
                "create network",
                name,
                "daemon returned an empty network id",
            ));
        }
        info!("created network {} ({})", name, response.id);
        Ok(NetworkHandle {
            id: response.id,
            name: name.to_string(),
        })
    }

    async fn run(&self, spec: &ContainerSpec) -> Result<ContainerHandle> {
        let options = Some(CreateContainerOptionsBuilder::default().name(&spec.name).build());
        let id = self
            .docker
            .create_container(options, Self::create_body(spec))
            .await
            .map_err(|e| E2eError::resource("create container", &spec.name, e))?
            .id;
        let start = async {
            self.docker
                .start_container(&id, None::<StartContainerOptions>)
                .await
                .map_err(|e| E2eError::resource("start container", &spec.name, e))
        };
        let discard = async {
            self.docker
                .remove_container(
                    &id,
                    Some(
                        RemoveContainerOptionsBuilder::default()
                            .force(true)
                            .v(true)
                            .build(),
                    ),
                )
                .await
                .map_err(|e| E2eError::resource("discard container", &spec.name, e))
        };
        start_or_discard(&spec.name, start, discard).await?;
        debug!(
            "started container {} ({}) from {}",
            spec.name,
            id,
            spec.image.reference()
        );
        Ok(ContainerHandle {
            id,
            name: spec.name.clone(),
            host_ports: spec.port_bindings.clone(),
        })
    }

    async fn remove(&self, handle: &ContainerHandle, force: bool) -> Result<()> {
        self.docker
            .remove_container(
                &handle.id,
                Some(RemoveContainerOptionsBuilder::default().force(force).build()),
            )
            .await
            .map_err(|e| E2eError::resource("remove container", &handle.name, e))
    }

    async fn purge(&self, handle: &ContainerHandle) -> Result<()> {
        self.docker
            .remove_container(
                &handle.id,
                Some(
                    RemoveContainerOptionsBuilder::default()
                        .force(true)
                        .v(true)
                        .build(),
                ),
            )
            .await
            .map_err(|e| E2eError::resource("purge container", &handle.name, e))
    }

    async fn purge_network(&self, handle: &NetworkHandle) -> Result<()> {
        self.docker
            .remove_network(&handle.id)
            .await
            .map_err(|e| E2eError::resource("remove network", &handle.name, e))
    }
}
