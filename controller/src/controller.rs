//! Broadcasts work to the worker pool and takes solutions back.
//!
//! Each cycle the controller builds a Job from a fresh template, shards it
//! onto the multicast group and keeps resending the same shards every tick
//! until the tip moves, the mempool changes (no more than once per grace
//! period) or a solution is accepted. An accepted solution switches the
//! resent payload to Pause until the next Job is built.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use consensus_core::algorithm::name_for_version;
use consensus_core::Hash;
use network::protowire::{Advertisement, Job, PauseContainer, SolutionContainer};
use network::{Connection, DatagramSink, Inbound, Message, MessageKind, ShardCodec};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::chain::{ChainNotification, ChainState, ProcessBlockError, TemplateGenerator};
use crate::config::ControllerConfig;
use crate::errors::{ControllerError, ControllerResult};

/// What a rebroadcast tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    Regenerated,
    Resent,
    Idle,
}

struct BroadcastState {
    /// Shards resent on every tick
    last: Vec<Vec<u8>>,
    /// Tip the last Job builds on
    prev_hash: Option<Hash>,
    generated_at: Instant,
    tx_updated: Option<SystemTime>,
}

pub struct Controller<C, T, S = Connection> {
    chain: Arc<C>,
    templates: Arc<T>,
    sink: Arc<S>,
    config: ControllerConfig,
    advertisement: Advertisement,
    pause: PauseContainer,
    state: Mutex<BroadcastState>,
    regen: tokio::sync::Mutex<()>,
    active: AtomicBool,
}

impl<C, T> Controller<C, T, Connection>
where
    C: ChainState + 'static,
    T: TemplateGenerator + 'static,
{
    /// Binds the submit port and targets the multicast group.
    pub async fn bind(config: ControllerConfig, chain: Arc<C>, templates: Arc<T>) -> ControllerResult<Self> {
        config.validate()?;
        let codec = Arc::new(ShardCodec::from_config(&config.transport)?);
        let connection = Connection::bind(config.submit_addr(), vec![config.transport.multicast_addr], codec).await?;
        info!("controller receiving solutions on {}, broadcasting to {}", connection.local_addr()?, config.transport.multicast_addr);
        Self::new(config, chain, templates, Arc::new(connection))
    }

    /// Runs until `cancel` fires, then broadcasts a final Pause.
    pub async fn serve(self: Arc<Self>, notifications: broadcast::Receiver<ChainNotification>, cancel: CancellationToken) {
        let solutions = self.sink.listen(&[MessageKind::Solution], cancel.child_token());
        self.run(solutions, notifications, cancel).await;
    }
}

impl<C, T, S> Controller<C, T, S>
where
    C: ChainState + 'static,
    T: TemplateGenerator + 'static,
    S: DatagramSink + 'static,
{
    pub fn new(config: ControllerConfig, chain: Arc<C>, templates: Arc<T>, sink: Arc<S>) -> ControllerResult<Self> {
        config.validate()?;
        let advertisement = Advertisement::discover(&config.listener_ips, config.p2p_port, config.rpc_port, config.submit_port);
        let pause = PauseContainer::new(&advertisement)?;
        let pause_shards = sink.codec().create_shards(pause.as_bytes(), MessageKind::Pause.magic())?;
        Ok(Self {
            chain,
            templates,
            sink,
            config,
            advertisement,
            pause,
            state: Mutex::new(BroadcastState { last: pause_shards, prev_hash: None, generated_at: Instant::now(), tx_updated: None }),
            regen: tokio::sync::Mutex::new(()),
            active: AtomicBool::new(false),
        })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn advertisement(&self) -> &Advertisement {
        &self.advertisement
    }

    /// Shards currently resent on every tick.
    pub fn last_broadcast(&self) -> Vec<Vec<u8>> {
        self.state.lock().last.clone()
    }

    /// Sends the first Job and marks the controller active. A failed first
    /// template is logged; the tick keeps retrying it.
    pub async fn start(&self) {
        if let Err(e) = self.regenerate().await {
            error!("first job not sent: {}", e);
        }
        self.active.store(true, Ordering::Release);
    }

    /// Builds and broadcasts a Job from a fresh template. On failure the
    /// previous broadcast is left as it was.
    pub async fn send_new_block_template(&self) -> ControllerResult<()> {
        let payout = self
            .config
            .payout_addresses
            .choose(&mut rand::thread_rng())
            .ok_or_else(|| network::config::ConfigError::Invalid("no payout addresses configured".into()))?;
        let tx_updated = self.templates.last_updated();
        let template = self.templates.new_block_template(payout, self.config.template_algorithm).await?;

        let prev_hash = template.block.header.prev_block;
        let job = Job {
            advertisement: self.advertisement.clone(),
            height: template.height,
            prev_block_hash: prev_hash,
            bitses: template.bitses,
            transactions: template.block.transactions,
        };
        let container = job.to_container()?;
        let shards = self.sink.send_message(container.as_bytes(), MessageKind::Job.magic()).await?;
        info!("broadcast job for height {} on {} ({} shards)", job.height, prev_hash, shards.len());

        let mut state = self.state.lock();
        state.last = shards;
        state.prev_hash = Some(prev_hash);
        state.generated_at = Instant::now();
        state.tx_updated = Some(tx_updated);
        Ok(())
    }

    /// One regeneration at a time; callers wait their turn.
    async fn regenerate(&self) -> ControllerResult<()> {
        let _gate = self.regen.lock().await;
        self.send_new_block_template().await
    }

    pub async fn rebroadcast_tick(&self) -> TickAction {
        let best = self.chain.best_snapshot().await;
        let mempool_updated = self.templates.last_updated();
        let (tip_moved, mempool_due) = {
            let state = self.state.lock();
            let tip_moved = state.prev_hash != Some(best.hash);
            let mempool_due =
                state.tx_updated != Some(mempool_updated) && state.generated_at.elapsed() >= self.config.mempool_grace();
            (tip_moved, mempool_due)
        };

        if tip_moved || mempool_due {
            // the running regeneration already covers what this tick saw
            let Ok(_gate) = self.regen.try_lock() else {
                debug!("regeneration already running, skipping tick");
                return TickAction::Idle;
            };
            debug!("regenerating: tip moved {}, mempool changed {}", tip_moved, mempool_due);
            match self.send_new_block_template().await {
                Ok(()) => return TickAction::Regenerated,
                Err(e) => error!("regeneration failed, resending previous work: {}", e),
            }
        }

        let last = self.last_broadcast();
        if last.is_empty() {
            debug!("nothing to rebroadcast");
            return TickAction::Idle;
        }
        self.sink.send_shards(&last).await;
        TickAction::Resent
    }

    /// Regenerates on an accepted block. A notification arriving while a
    /// regeneration is running is dropped.
    pub async fn handle_notification(&self, notification: ChainNotification) {
        if !self.is_active() {
            return;
        }
        let ChainNotification::BlockAccepted(hash) = notification else { return };
        let Ok(_gate) = self.regen.try_lock() else {
            debug!("regeneration already running, dropping notification for {}", hash);
            return;
        };
        debug!("block {} accepted, sending new work", hash);
        if let Err(e) = self.send_new_block_template().await {
            error!("cannot send work after block {}: {}", hash, e);
        }
    }

    /// Checks a submitted block against the tip and hands it to the chain.
    /// Returns whether the chain kept it as an orphan. Every rejection sends
    /// fresh work.
    pub async fn handle_solution(&self, solution: &SolutionContainer) -> ControllerResult<bool> {
        let block = solution.try_block()?;
        let best = self.chain.best_snapshot().await;
        let block_prev = block.header.prev_block;
        if block_prev != best.hash {
            self.refresh_after_rejection().await;
            return Err(ControllerError::StaleSubmission { block_prev, tip: best.hash });
        }

        let height = best.height + 1;
        let header = block.header.clone();
        let hash = block.hash();
        match self.chain.process_block(block).await {
            Ok(is_orphan) => {
                match self.send_pause().await {
                    Ok(shards) => self.state.lock().last = shards,
                    Err(e) => error!("cannot send pause: {}", e),
                }
                if is_orphan {
                    warn!("block {} is an orphan", hash);
                }
                let since = match self.chain.block_time(height - 1).await {
                    Some(prev) => format!("{}s since prev", i64::from(header.timestamp) - i64::from(prev)),
                    None => "time since prev unknown".to_string(),
                };
                info!(
                    "new block height {} {} {} bits {:08x} {}",
                    height,
                    hash,
                    name_for_version(header.version),
                    header.bits,
                    since
                );
                Ok(is_orphan)
            }
            Err(e) => {
                self.refresh_after_rejection().await;
                Err(match e {
                    ProcessBlockError::RuleViolation(reason) => ControllerError::RuleViolation(reason),
                    ProcessBlockError::Internal(reason) => ControllerError::UnexpectedProcessing(reason),
                })
            }
        }
    }

    async fn refresh_after_rejection(&self) {
        if let Err(e) = self.regenerate().await {
            debug!("cannot refresh work: {}", e);
        }
    }

    async fn on_inbound(&self, inbound: Inbound) {
        let Message::Solution(solution) = inbound.message else { return };
        if inbound.repeat {
            return;
        }
        debug!("received solution from {}", inbound.from);
        match self.handle_solution(&solution).await {
            Ok(_) => {}
            Err(e @ ControllerError::StaleSubmission { .. }) => warn!("submitted block is stale: {}", e),
            Err(e @ ControllerError::RuleViolation(_)) => warn!("{}", e),
            Err(e @ ControllerError::Container(_)) => debug!("undecodable solution from {}: {}", inbound.from, e),
            Err(e) => error!("{}", e),
        }
    }

    /// Final Pause; the controller stops reacting to notifications.
    pub async fn shutdown(&self) {
        debug!("controller shutting down");
        self.active.store(false, Ordering::Release);
        if let Err(e) = self.send_pause().await {
            error!("cannot send final pause: {}", e);
        }
    }

    /// Every Pause event gets its own shard set; only rebroadcasts reuse one.
    async fn send_pause(&self) -> ControllerResult<Vec<Vec<u8>>> {
        Ok(self.sink.send_message(self.pause.as_bytes(), MessageKind::Pause.magic()).await?)
    }

    /// Ticks, solutions and notifications until `cancel` fires.
    pub async fn run(
        self: Arc<Self>,
        mut solutions: mpsc::Receiver<Inbound>,
        notifications: broadcast::Receiver<ChainNotification>,
        cancel: CancellationToken,
    ) {
        self.start().await;
        tokio::spawn(Self::follow_chain(self.clone(), notifications, cancel.clone()));

        let mut ticker = interval(self.config.rebroadcast_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.rebroadcast_tick().await;
                }
                received = solutions.recv() => match received {
                    Some(inbound) => self.on_inbound(inbound).await,
                    None => break,
                },
            }
        }

        self.shutdown().await;
        info!("controller stopped");
    }

    async fn follow_chain(self: Arc<Self>, mut notifications: broadcast::Receiver<ChainNotification>, cancel: CancellationToken) {
        loop {
            let notification = tokio::select! {
                _ = cancel.cancelled() => return,
                received = notifications.recv() => match received {
                    Ok(notification) => notification,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        debug!("missed {} chain notifications", missed);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                },
            };
            let controller = self.clone();
            tokio::spawn(async move { controller.handle_notification(notification).await });
        }
    }
}
