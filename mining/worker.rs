//! Search loop of a mining process
//!
//! The loop runs on its own thread and is driven by a single command queue.
//! Commands are taken at the top of every hash iteration, which is the only
//! preemption point.

use std::net::SocketAddr;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use consensus_core::algorithm::name_for_version;
use consensus_core::{Block, Target};
use network::protowire::Job;
use tokio::sync::mpsc::UnboundedSender;

use crate::config::MinerConfig;
use crate::counter::AlgorithmCounter;
use crate::job::MiningJob;

/// Instructions for the search thread.
#[derive(Debug)]
pub enum Command {
    NewJob(Box<Job>),
    Pause,
    Stop,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Paused,
    Running,
    Stopped,
}

/// A block that met its target, with the addresses it should be sent to.
#[derive(Clone, Debug)]
pub struct FoundBlock {
    pub block: Block,
    pub destinations: Vec<SocketAddr>,
}

/// Hash counters for the log line.
#[derive(Debug, Clone)]
pub struct WorkerStats {
    /// Hashes since the process started
    pub total_hashes: u64,
    /// Hashes since the current job arrived
    pub job_hashes: u64,
    pub job_started: Instant,
    pub blocks_found: u64,
    last_report: Instant,
}

impl Default for WorkerStats {
    fn default() -> Self {
        let now = Instant::now();
        Self { total_hashes: 0, job_hashes: 0, job_started: now, blocks_found: 0, last_report: now }
    }
}

impl WorkerStats {
    /// Hashes per second since the current job started
    pub fn job_hash_rate(&self) -> f64 {
        let secs = self.job_started.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.job_hashes as f64 / secs
        } else {
            0.0
        }
    }
}

/// The search state machine.
pub struct MinerWorker {
    commands: Receiver<Command>,
    solutions: UnboundedSender<FoundBlock>,
    config: MinerConfig,
    state: RunState,
    counter: AlgorithmCounter,
    job: Option<MiningJob>,
    target: Option<Target>,
    window_left: u32,
    stats: WorkerStats,
}

impl MinerWorker {
    pub fn new(commands: Receiver<Command>, solutions: UnboundedSender<FoundBlock>, config: MinerConfig) -> Self {
        Self {
            commands,
            solutions,
            counter: AlgorithmCounter::new(config.rounds_per_algo),
            config,
            state: RunState::Paused,
            job: None,
            target: None,
            window_left: 0,
            stats: WorkerStats::default(),
        }
    }

    /// Starts the search loop on a dedicated thread.
    pub fn spawn(config: MinerConfig, solutions: UnboundedSender<FoundBlock>) -> std::io::Result<(Sender<Command>, JoinHandle<()>)> {
        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new().name("castnet-search".into()).spawn(move || {
            MinerWorker::new(rx, solutions, config).run();
        })?;
        Ok((tx, handle))
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Runs until Stop arrives or every command sender is gone.
    pub fn run(&mut self) {
        log::info!("search loop started");
        while self.state != RunState::Stopped {
            self.step();
        }
        log::info!("search loop stopped after {} hashes", self.stats.total_hashes);
    }

    /// One iteration: take pending commands, then hash once if running.
    /// While paused this blocks until the next command.
    pub fn step(&mut self) {
        match self.state {
            RunState::Stopped => {}
            RunState::Paused => match self.commands.recv() {
                Ok(cmd) => self.apply(cmd),
                Err(_) => self.state = RunState::Stopped,
            },
            RunState::Running => match self.commands.try_recv() {
                Ok(cmd) => self.apply(cmd),
                Err(TryRecvError::Disconnected) => self.state = RunState::Stopped,
                Err(TryRecvError::Empty) => self.hash_once(),
            },
        }
    }

    pub fn apply(&mut self, cmd: Command) {
        match cmd {
            Command::NewJob(job) => self.load_job(*job),
            Command::Pause => {
                log::debug!("pausing");
                self.state = RunState::Paused;
            }
            Command::Stop => {
                log::debug!("stopping");
                self.state = RunState::Stopped;
            }
        }
    }

    fn load_job(&mut self, job: Job) {
        match MiningJob::randomized(job) {
            Ok(mining_job) => {
                log::debug!(
                    "new job at height {} over {} algorithms, extra nonce {:016x}",
                    mining_job.height,
                    mining_job.bitses.len(),
                    mining_job.extra_nonce
                );
                self.counter.set_algorithms(mining_job.algorithms());
                self.job = Some(mining_job);
                self.window_left = 0;
                self.stats.job_hashes = 0;
                self.stats.job_started = Instant::now();
                self.state = RunState::Running;
            }
            Err(e) => {
                log::error!("cannot mine job: {}", e);
                self.job = None;
                self.state = RunState::Paused;
            }
        }
    }

    fn hash_once(&mut self) {
        let job_timeout = self.config.job_timeout();
        let Some(job) = self.job.as_mut() else {
            self.state = RunState::Paused;
            return;
        };

        if self.window_left == 0 {
            if job.age() > job_timeout {
                log::warn!("job at height {} went {}s without a replacement, abandoning", job.height, job.age().as_secs());
                self.job = None;
                self.state = RunState::Paused;
                return;
            }
            self.target = self.counter.next_algorithm().and_then(|version| job.select_algorithm(version));
            self.window_left = self.config.nonce_window.max(1);
        }
        self.window_left -= 1;

        let Some(target) = self.target else {
            self.state = RunState::Paused;
            return;
        };

        let header = &job.block.header;
        let found = header.pow_hash().filter(|hash| target.is_met_by(hash));
        self.stats.total_hashes += 1;
        self.stats.job_hashes += 1;

        if let Some(hash) = found {
            self.stats.blocks_found += 1;
            log::info!(
                "found block {} with {} after {} hashes (total {})",
                hash,
                name_for_version(header.version),
                self.stats.job_hashes,
                self.stats.total_hashes
            );
            let found = FoundBlock { block: job.block.clone(), destinations: job.submit_addresses.clone() };
            if self.solutions.send(found).is_err() {
                log::error!("solution dispatcher is gone");
            }
            self.state = RunState::Paused;
            return;
        }

        job.advance_nonce();
        self.report_hash_rate();
    }

    fn report_hash_rate(&mut self) {
        if self.stats.total_hashes % 1024 != 0 || self.stats.last_report.elapsed() < self.config.hashrate_log_interval() {
            return;
        }
        self.stats.last_report = Instant::now();
        log::info!("{:.2} H/s on current job, {} hashes total", self.stats.job_hash_rate(), self.stats.total_hashes);
    }
}

/// Lets a caller wait for the search thread to finish for at most `timeout`.
pub fn join_with_timeout(handle: JoinHandle<()>, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(10));
    }
    handle.join().is_ok()
}
