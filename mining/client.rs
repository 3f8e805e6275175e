//! Supervisor side of the IPC link to a mining process.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use network::ipc::{call, IpcError, Request};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::MinerConfig;

/// Request/acknowledge calls a supervisor makes on one mining process.
#[async_trait]
pub trait MinerControl: Send + Sync {
    async fn new_job(&self, job: &[u8]) -> Result<(), IpcError>;
    async fn pause(&self) -> Result<(), IpcError>;
    async fn stop(&self) -> Result<(), IpcError>;
    async fn send_pass(&self, passphrase: &str) -> Result<(), IpcError>;

    /// Stop that gives up after `grace`.
    async fn shutdown(&self, grace: Duration) {
        match tokio::time::timeout(grace, self.stop()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("miner failed to stop: {}", e),
            Err(_) => warn!("miner did not acknowledge stop in time"),
        }
    }
}

struct Pipe {
    stdin: ChildStdin,
    stdout: ChildStdout,
}

/// A spawned `castnet-miner` child talking over its stdin/stdout.
pub struct ChildMiner {
    id: usize,
    pipe: Mutex<Pipe>,
    child: Mutex<Child>,
}

impl ChildMiner {
    /// Spawns `program` with piped stdin/stdout; stderr is inherited so the
    /// child's log lines reach the supervisor's terminal.
    pub fn spawn(id: usize, program: &Path, config: &MinerConfig, data_shards: u8, parity_shards: u8, log_level: &str) -> Result<Self, IpcError> {
        let mut child = Command::new(program)
            .arg("--rounds-per-algo")
            .arg(config.rounds_per_algo.to_string())
            .arg("--nonce-window")
            .arg(config.nonce_window.to_string())
            .arg("--job-timeout-secs")
            .arg(config.job_timeout_secs.to_string())
            .arg("--data-shards")
            .arg(data_shards.to_string())
            .arg("--parity-shards")
            .arg(parity_shards.to_string())
            .arg("--log-level")
            .arg(log_level)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let missing = || IpcError::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "child pipe missing"));
        let stdin = child.stdin.take().ok_or_else(missing)?;
        let stdout = child.stdout.take().ok_or_else(missing)?;
        debug!("spawned miner {} (pid {:?})", id, child.id());
        Ok(Self { id, pipe: Mutex::new(Pipe { stdin, stdout }), child: Mutex::new(child) })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    async fn request(&self, request: &Request) -> Result<(), IpcError> {
        let mut pipe = self.pipe.lock().await;
        let Pipe { stdin, stdout } = &mut *pipe;
        call(stdin, stdout, request).await
    }
}

#[async_trait]
impl MinerControl for ChildMiner {
    async fn new_job(&self, job: &[u8]) -> Result<(), IpcError> {
        self.request(&Request::NewJob(job.to_vec())).await
    }

    async fn pause(&self) -> Result<(), IpcError> {
        self.request(&Request::Pause).await
    }

    async fn stop(&self) -> Result<(), IpcError> {
        self.request(&Request::Stop).await
    }

    async fn send_pass(&self, passphrase: &str) -> Result<(), IpcError> {
        self.request(&Request::SendPass(passphrase.to_string())).await
    }

    /// Asks the child to stop and kills it if it does not acknowledge within `grace`.
    async fn shutdown(&self, grace: Duration) {
        match tokio::time::timeout(grace, self.stop()).await {
            Ok(Ok(())) => debug!("miner {} acknowledged stop", self.id),
            Ok(Err(e)) => warn!("miner {} failed to stop: {}", self.id, e),
            Err(_) => warn!("miner {} did not acknowledge stop in time", self.id),
        }
        let mut child = self.child.lock().await;
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => debug!("miner {} exited with {}", self.id, status),
            _ => {
                if let Err(e) = child.kill().await {
                    warn!("failed to kill miner {}: {}", self.id, e);
                }
            }
        }
    }
}
