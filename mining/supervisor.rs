//! Fans controller traffic out to the local mining processes.
//!
//! Only one controller is followed at a time. Its address is adopted from
//! the first Job seen while none is active and released on Pause or after
//! the staleness window passes without traffic from it.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use network::ipc::IpcError;
use network::protowire::{AdvertisedFields, JobContainer};
use network::{Connection, Inbound, Message, MessageKind};
use parking_lot::Mutex;
use tokio::time::{interval, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::MinerControl;

#[derive(Clone, Copy)]
enum Fanout<'a> {
    Job(&'a [u8]),
    Pause,
}

impl Fanout<'_> {
    fn name(&self) -> &'static str {
        match self {
            Fanout::Job(_) => "job",
            Fanout::Pause => "pause",
        }
    }
}

/// The controller this supervisor currently follows.
#[derive(Debug, Clone)]
pub struct ActiveSender {
    pub address: Option<SocketAddr>,
    pub last_seen: Instant,
}

pub struct Supervisor<M> {
    children: Vec<M>,
    /// Children that missed an acknowledgement; their pipes are out of step
    unresponsive: Vec<AtomicBool>,
    active: Mutex<ActiveSender>,
    staleness: Duration,
    ack_timeout: Duration,
}

impl<M: MinerControl> Supervisor<M> {
    pub fn new(children: Vec<M>, staleness: Duration, ack_timeout: Duration) -> Self {
        let unresponsive = children.iter().map(|_| AtomicBool::new(false)).collect();
        Self {
            children,
            unresponsive,
            active: Mutex::new(ActiveSender { address: None, last_seen: Instant::now() }),
            staleness,
            ack_timeout,
        }
    }

    pub fn children(&self) -> &[M] {
        &self.children
    }

    pub fn active_sender(&self) -> Option<SocketAddr> {
        self.active.lock().address
    }

    pub fn is_responsive(&self, child: usize) -> bool {
        self.unresponsive.get(child).is_some_and(|flag| !flag.load(Ordering::Acquire))
    }

    /// Hands the passphrase to every child.
    pub async fn start(&self, passphrase: &str) {
        for (i, child) in self.children.iter().enumerate() {
            debug!("sending pass to worker {}", i);
            if let Err(e) = self.acknowledged(i, child.send_pass(passphrase)).await {
                error!("worker {} refused the passphrase: {}", i, e);
            }
        }
    }

    /// Accepts a Job from the active controller, or from anyone while none is
    /// active. A repeat of work the active controller already sent only
    /// refreshes its liveness. Returns whether the job went to the children.
    pub async fn handle_job(&self, job: &JobContainer, repeat: bool) -> bool {
        let Some(addr) = job.sender_address() else {
            debug!("dropping job without a sender address");
            return false;
        };

        {
            let mut active = self.active.lock();
            let was_active = match active.address {
                Some(current) if current != addr => {
                    debug!("ignoring job from {} while following {}", addr, current);
                    return false;
                }
                Some(_) => true,
                None => {
                    info!("following controller {}", addr);
                    false
                }
            };
            active.address = Some(addr);
            active.last_seen = Instant::now();
            if repeat && was_active {
                return false;
            }
        }

        let acked = self.fan_out(Fanout::Job(job.as_bytes())).await;
        debug!("job at height {} delivered to {}/{} workers", job.height(), acked, self.children.len());
        true
    }

    /// Pauses every child and releases the active controller.
    pub async fn handle_pause(&self) {
        self.fan_out(Fanout::Pause).await;
        self.active.lock().address = None;
    }

    /// Drops a controller that went silent and pauses the children. Returns
    /// whether that happened.
    pub async fn watchdog_tick(&self) -> bool {
        {
            let mut active = self.active.lock();
            let Some(addr) = active.address else { return false };
            if active.last_seen.elapsed() <= self.staleness {
                return false;
            }
            info!("controller {} stopped broadcasting", addr);
            active.address = None;
        }
        self.fan_out(Fanout::Pause).await;
        true
    }

    pub async fn handle_inbound(&self, inbound: Inbound) {
        match inbound.message {
            Message::Job(job) => {
                self.handle_job(&job, inbound.repeat).await;
            }
            Message::Pause(_) if inbound.repeat => {}
            Message::Pause(_) => {
                debug!("received pause from {}", inbound.from);
                self.handle_pause().await;
            }
            Message::Solution(_) => {}
        }
    }

    /// Sequential request per child; a failing child is logged and skipped.
    async fn fan_out(&self, request: Fanout<'_>) -> usize {
        let mut acked = 0;
        for (i, child) in self.children.iter().enumerate() {
            if !self.is_responsive(i) {
                debug!("skipping unresponsive worker {}", i);
                continue;
            }
            let result = match request {
                Fanout::Job(bytes) => self.acknowledged(i, child.new_job(bytes)).await,
                Fanout::Pause => self.acknowledged(i, child.pause()).await,
            };
            match result {
                Ok(()) => acked += 1,
                Err(e) => error!("sending {} to worker {} failed: {}", request.name(), i, e),
            }
        }
        acked
    }

    /// Waits at most the ack timeout for one child. A late answer would be
    /// read as the reply to the next request, so that child is not asked again.
    async fn acknowledged(&self, child: usize, request: impl Future<Output = Result<(), IpcError>>) -> Result<(), IpcError> {
        match timeout(self.ack_timeout, request).await {
            Ok(result) => result,
            Err(_) => {
                warn!("worker {} did not answer within {:?}, no longer sending it work", child, self.ack_timeout);
                self.unresponsive[child].store(true, Ordering::Release);
                Err(IpcError::Timeout)
            }
        }
    }

    /// Listens for Jobs and Pauses and runs the watchdog until cancelled,
    /// then stops every child.
    pub async fn run(self: Arc<Self>, connection: &Connection, tick: Duration, stop_grace: Duration, cancel: CancellationToken) {
        let mut inbound = connection.listen(&[MessageKind::Job, MessageKind::Pause], cancel.child_token());
        let mut ticker = interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = inbound.recv() => match received {
                    Some(message) => self.handle_inbound(message).await,
                    None => break,
                },
                _ = ticker.tick() => {
                    self.watchdog_tick().await;
                }
            }
        }

        info!("supervisor shutting down");
        for child in &self.children {
            child.shutdown(stop_grace).await;
        }
    }
}
