//! [`ChainClient`] that runs the node and relayer CLIs inside their
//! containers through the Docker exec API.

use {
    super::{ChainClient, NodeStatus, UpgradeProposal},
    crate::{
        chain::Coin,
        error::{E2eError, Result},
        runtime::ContainerHandle,
    },
    async_trait::async_trait,
    bollard::{
        container::LogOutput,
        exec::{CreateExecOptions, StartExecResults},
        Docker,
    },
    futures::StreamExt,
    log::{debug, info},
    serde::Deserialize,
    serde_json::Value,
    std::time::Duration,
    tokio::time::timeout,
};

/// Node binary inside validator containers.
pub const NODE_BINARY: &str = "ledgerd";

/// Relayer binary inside relayer containers.
pub const RELAYER_BINARY: &str = "hermes";

/// Key every validator signs its transactions with.
const SIGNING_KEY: &str = "val";

/// Port on both ends of every channel the suite opens.
const TRANSFER_PORT: &str = "transfer";

/// The only channel a freshly connected chain pair has.
const TRANSFER_CHANNEL: &str = "channel-0";

/// Cap on one HTTP request to a relayer.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Cap on one command run inside a container. Channel creation is the
/// slowest of them.
pub const EXEC_TIMEOUT: Duration = Duration::from_secs(300);

struct ExecOutput {
    stdout: String,
    stderr: String,
}

#[derive(Clone)]
pub struct DockerChainClient {
    docker: Docker,
    http: reqwest::Client,
}

impl DockerChainClient {
    pub fn new(docker: Docker) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self { docker, http })
    }

    /// Runs `cmd` in `container`, failing on a non-zero exit code or once
    /// [`EXEC_TIMEOUT`] has passed.
    async fn exec(&self, container: &ContainerHandle, cmd: Vec<String>) -> Result<ExecOutput> {
        let command = cmd.join(" ");
        timeout(EXEC_TIMEOUT, self.exec_unbounded(container, cmd))
            .await
            .map_err(|_| E2eError::Exec {
                container: container.name.clone(),
                command,
                exit_code: -1,
                stderr: format!("no exit within {EXEC_TIMEOUT:?}"),
            })?
    }

    async fn exec_unbounded(
        &self,
        container: &ContainerHandle,
        cmd: Vec<String>,
    ) -> Result<ExecOutput> {
        let command = cmd.join(" ");
        debug!("exec in {}: {}", container.name, command);
        let exec_error = |e: bollard::errors::Error| E2eError::Exec {
            container: container.name.clone(),
            command: command.clone(),
            exit_code: -1,
            stderr: e.to_string(),
        };

        let exec = self
            .docker
            .create_exec(
                &container.id,
                CreateExecOptions {
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    cmd: Some(cmd.clone()),
                    ..CreateExecOptions::default()
                },
            )
            .await
            .map_err(exec_error)?;

        let mut stdout = String::new();
        let mut stderr = String::new();
        if let StartExecResults::Attached { mut output, .. } = self
            .docker
            .start_exec(&exec.id, None)
            .await
            .map_err(exec_error)?
        {
            while let Some(chunk) = output.next().await {
                match chunk.map_err(exec_error)? {
                    LogOutput::StdOut { message } => {
                        stdout.push_str(&String::from_utf8_lossy(&message))
                    }
                    LogOutput::StdErr { message } => {
                        stderr.push_str(&String::from_utf8_lossy(&message))
                    }
                    _ => {}
                }
            }
        }

        let exit_code = self
            .docker
            .inspect_exec(&exec.id)
            .await
            .map_err(exec_error)?
            .exit_code
            .unwrap_or(-1);
        if exit_code != 0 {
            return Err(E2eError::Exec {
                container: container.name.clone(),
                command,
                exit_code,
                stderr,
            });
        }
        Ok(ExecOutput { stdout, stderr })
    }

    async fn node_tx(&self, node: &ContainerHandle, chain_id: &str, args: &[&str]) -> Result<()> {
        let cmd = tx_command(chain_id, args);
        let output = self.exec(node, cmd).await?;
        debug!("{} tx output: {}", node.name, output.stdout.trim());
        Ok(())
    }
}

/// `ledgerd tx <args> --from=val --chain-id=<id> ...` with the flags every
/// suite transaction shares.
fn tx_command(chain_id: &str, args: &[&str]) -> Vec<String> {
    let mut cmd = vec![NODE_BINARY.to_string(), "tx".to_string()];
    cmd.extend(args.iter().map(|arg| arg.to_string()));
    cmd.extend([
        format!("--from={SIGNING_KEY}"),
        format!("--chain-id={chain_id}"),
        "-b=block".to_string(),
        "--yes".to_string(),
        "--keyring-backend=test".to_string(),
    ]);
    cmd
}

// ── Status parsing ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct StatusResponse {
    #[serde(rename = "SyncInfo", alias = "sync_info")]
    sync_info: SyncInfo,
}

#[derive(Deserialize)]
struct SyncInfo {
    latest_block_height: Height,
    catching_up: bool,
}

/// Heights arrive as decimal strings from most node versions and as numbers
/// from a few.
#[derive(Deserialize)]
#[serde(untagged)]
enum Height {
    Number(u64),
    Text(String),
}

impl Height {
    fn value(&self) -> Result<u64> {
        match self {
            Self::Number(height) => Ok(*height),
            Self::Text(text) => text.parse().map_err(|e| {
                E2eError::Invariant(format!("unparsable block height {text:?}: {e}"))
            }),
        }
    }
}

/// Parses `ledgerd status` output. Older nodes print it on stderr.
fn parse_status(stdout: &str, stderr: &str) -> Result<NodeStatus> {
    let raw = if stdout.trim().is_empty() { stderr } else { stdout };
    let response: StatusResponse = serde_json::from_str(raw.trim())?;
    Ok(NodeStatus {
        latest_height: response.sync_info.latest_block_height.value()?,
        catching_up: response.sync_info.catching_up,
    })
}

#[async_trait]
impl ChainClient for DockerChainClient {
    async fn status(&self, node: &ContainerHandle) -> Result<NodeStatus> {
        let output = self
            .exec(node, vec![NODE_BINARY.to_string(), "status".to_string()])
            .await?;
        parse_status(&output.stdout, &output.stderr)
    }

    async fn query_json(&self, url: &str) -> Result<Value> {
        Ok(self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    async fn submit_upgrade_proposal(
        &self,
        chain_id: &str,
        node: &ContainerHandle,
        proposal: &UpgradeProposal,
    ) -> Result<()> {
        info!(
            "submitting upgrade proposal {} ({}) on {} at height {}",
            proposal.id, proposal.name, chain_id, proposal.height
        );
        let title = format!("--title={} upgrade", proposal.name);
        let description = format!("--description={} upgrade proposal", proposal.name);
        let height = format!("--upgrade-height={}", proposal.height);
        self.node_tx(
            node,
            chain_id,
            &[
                "gov",
                "submit-proposal",
                "software-upgrade",
                &proposal.name,
                &title,
                &description,
                &height,
                "--upgrade-info=",
            ],
        )
        .await
    }

    async fn deposit_proposal(
        &self,
        chain_id: &str,
        node: &ContainerHandle,
        proposal: &UpgradeProposal,
    ) -> Result<()> {
        info!("depositing {} on proposal {} of {}", proposal.deposit, proposal.id, chain_id);
        let id = proposal.id.to_string();
        let deposit = proposal.deposit.to_string();
        self.node_tx(node, chain_id, &["gov", "deposit", &id, &deposit])
            .await
    }

    async fn vote_proposal(
        &self,
        chain_id: &str,
        node: &ContainerHandle,
        proposal_id: u64,
    ) -> Result<()> {
        info!("{} votes yes on proposal {} of {}", node.name, proposal_id, chain_id);
        let id = proposal_id.to_string();
        self.node_tx(node, chain_id, &["gov", "vote", &id, "yes"])
            .await
    }

    async fn create_channel(
        &self,
        relayer: &ContainerHandle,
        chain_a: &str,
        chain_b: &str,
    ) -> Result<()> {
        info!("creating {} channel between {} and {}", TRANSFER_PORT, chain_a, chain_b);
        let cmd = [
            RELAYER_BINARY,
            "create",
            "channel",
            "--a-chain",
            chain_a,
            "--b-chain",
            chain_b,
            "--a-port",
            TRANSFER_PORT,
            "--b-port",
            TRANSFER_PORT,
            "--new-client-connection",
            "--yes",
        ]
        .iter()
        .map(|arg| arg.to_string())
        .collect();
        let output = self.exec(relayer, cmd).await?;
        debug!("relayer output: {}", output.stdout.trim());
        Ok(())
    }

    async fn send_ibc_transfer(
        &self,
        src_chain_id: &str,
        node: &ContainerHandle,
        recipient: &str,
        amount: &Coin,
    ) -> Result<()> {
        info!("sending {} from {} to {}", amount, src_chain_id, recipient);
        let amount = amount.to_string();
        self.node_tx(
            node,
            src_chain_id,
            &[
                "ibc-transfer",
                "transfer",
                TRANSFER_PORT,
                TRANSFER_CHANNEL,
                recipient,
                &amount,
            ],
        )
        .await
    }

    async fn create_pool(
        &self,
        chain_id: &str,
        node: &ContainerHandle,
        pool_file: &str,
    ) -> Result<()> {
        info!("creating pool on {} from {}", chain_id, pool_file);
        let pool_file = format!("--pool-file=/ledger/{pool_file}");
        self.node_tx(node, chain_id, &["gamm", "create-pool", &pool_file])
            .await
    }
}
