use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use consensus_core::{Algorithm, Block, Hash, Header, OutPoint, Transaction, TxIn, TxOut};
use controller::{
    BestSnapshot, BlockTemplate, ChainNotification, ChainState, Controller, ControllerConfig, ControllerError, ProcessBlockError,
    TemplateError, TemplateGenerator, TickAction,
};
use network::config::TransportConfig;
use network::protowire::{JobContainer, SolutionContainer};
use network::transport::reassembler::Assembly;
use network::transport::{Reassembler, Shard};
use network::{DatagramSink, Inbound, Message, MessageKind, ShardCodec};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

const EASY_BITS: u32 = 0x207fffff;

struct MockChain {
    best: Mutex<BestSnapshot>,
    outcome: Mutex<Result<bool, ProcessBlockError>>,
    processed: Mutex<Vec<Block>>,
}

impl MockChain {
    fn new() -> Self {
        Self {
            best: Mutex::new(BestSnapshot { hash: Hash::from_bytes([1; 32]), height: 99 }),
            outcome: Mutex::new(Ok(false)),
            processed: Mutex::new(Vec::new()),
        }
    }

    fn advance_tip(&self, byte: u8) {
        let mut best = self.best.lock();
        best.hash = Hash::from_bytes([byte; 32]);
        best.height += 1;
    }

    fn tip(&self) -> Hash {
        self.best.lock().hash
    }
}

#[async_trait]
impl ChainState for MockChain {
    async fn best_snapshot(&self) -> BestSnapshot {
        *self.best.lock()
    }

    async fn process_block(&self, block: Block) -> Result<bool, ProcessBlockError> {
        self.processed.lock().push(block);
        self.outcome.lock().clone()
    }

    async fn block_time(&self, _height: i32) -> Option<u32> {
        Some(1_700_000_000)
    }
}

struct MockTemplates {
    chain: Arc<MockChain>,
    calls: Mutex<Vec<String>>,
    failing: Mutex<bool>,
    updated: Mutex<SystemTime>,
    delay: Duration,
}

impl MockTemplates {
    fn new(chain: Arc<MockChain>) -> Self {
        Self::with_delay(chain, Duration::ZERO)
    }

    fn with_delay(chain: Arc<MockChain>, delay: Duration) -> Self {
        Self {
            chain,
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(false),
            updated: Mutex::new(SystemTime::UNIX_EPOCH),
            delay,
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn touch_mempool(&self) {
        *self.updated.lock() += Duration::from_secs(1);
    }
}

#[async_trait]
impl TemplateGenerator for MockTemplates {
    async fn new_block_template(&self, payout: &str, _algorithm: Algorithm) -> Result<BlockTemplate, TemplateError> {
        self.calls.lock().push(payout.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if *self.failing.lock() {
            return Err(TemplateError("mempool unavailable".into()));
        }
        let best = self.chain.best_snapshot().await;
        let coinbase = Transaction::new(
            1,
            vec![TxIn { previous_output: OutPoint::null(), signature_script: vec![1, 100], sequence: u32::MAX }],
            vec![TxOut { value: 50, script_pubkey: payout.as_bytes().to_vec() }],
            0,
        );
        let mut block = Block::new(Header::new(2, best.hash, Hash::zeroed(), 1_700_000_060, EASY_BITS), vec![coinbase]);
        block.update_merkle_root();
        Ok(BlockTemplate { block, height: best.height + 1, bitses: [(2, EASY_BITS), (6, EASY_BITS)].into_iter().collect() })
    }

    fn last_updated(&self) -> SystemTime {
        *self.updated.lock()
    }
}

/// Keeps every shard set instead of putting it on the wire.
struct RecordingSink {
    codec: ShardCodec,
    sent: Mutex<Vec<Vec<Vec<u8>>>>,
}

impl RecordingSink {
    fn new() -> Self {
        Self { codec: ShardCodec::new("p9pass", 3, 6, 65_000).unwrap(), sent: Mutex::new(Vec::new()) }
    }

    fn sets(&self) -> Vec<Vec<Vec<u8>>> {
        self.sent.lock().clone()
    }

    fn decode(&self, set: &[Vec<u8>]) -> Message {
        let shards: Vec<Shard> = set.iter().map(|d| Shard::parse(d).unwrap()).collect();
        let kind = MessageKind::from_magic(&shards[0].magic).unwrap();
        kind.decode(self.codec.open(&shards).unwrap()).unwrap()
    }

    fn kinds(&self) -> Vec<MessageKind> {
        self.sets().iter().map(|set| self.decode(set).kind()).collect()
    }

    fn last_job(&self) -> JobContainer {
        let sets = self.sets();
        let job = sets.iter().rev().find_map(|set| match self.decode(set) {
            Message::Job(job) => Some(job),
            _ => None,
        });
        job.unwrap()
    }
}

#[async_trait]
impl DatagramSink for RecordingSink {
    async fn send_shards(&self, shards: &[Vec<u8>]) -> usize {
        self.sent.lock().push(shards.to_vec());
        shards.len()
    }

    fn codec(&self) -> &ShardCodec {
        &self.codec
    }
}

fn config() -> ControllerConfig {
    ControllerConfig {
        transport: TransportConfig { passphrase: "p9pass".into(), ..Default::default() },
        payout_addresses: vec!["payout-a".into(), "payout-b".into()],
        listener_ips: vec!["10.0.0.7".parse().unwrap()],
        ..Default::default()
    }
}

struct Harness {
    chain: Arc<MockChain>,
    templates: Arc<MockTemplates>,
    sink: Arc<RecordingSink>,
    controller: Arc<Controller<MockChain, MockTemplates, RecordingSink>>,
}

fn harness_with(templates: impl FnOnce(Arc<MockChain>) -> MockTemplates) -> Harness {
    let chain = Arc::new(MockChain::new());
    let templates = Arc::new(templates(chain.clone()));
    let sink = Arc::new(RecordingSink::new());
    let controller = Arc::new(Controller::new(config(), chain.clone(), templates.clone(), sink.clone()).unwrap());
    Harness { chain, templates, sink, controller }
}

fn harness() -> Harness {
    harness_with(MockTemplates::new)
}

fn solution_on(prev: Hash) -> SolutionContainer {
    let coinbase = Transaction::new(
        1,
        vec![TxIn { previous_output: OutPoint::null(), signature_script: vec![1, 100, 8, 1, 2, 3, 4, 5, 6, 7, 8], sequence: u32::MAX }],
        vec![TxOut { value: 50, script_pubkey: vec![0x51] }],
        0,
    );
    let mut block = Block::new(Header::new(6, prev, Hash::zeroed(), 1_700_000_090, EASY_BITS), vec![coinbase]);
    block.update_merkle_root();
    SolutionContainer::new(&block).unwrap()
}

#[tokio::test]
async fn refuses_to_start_without_payout_addresses() {
    let chain = Arc::new(MockChain::new());
    let templates = Arc::new(MockTemplates::new(chain.clone()));
    let config = ControllerConfig { payout_addresses: Vec::new(), ..config() };
    let result = Controller::new(config, chain, templates, Arc::new(RecordingSink::new()));
    assert!(matches!(result, Err(ControllerError::Config(_))));
}

#[tokio::test]
async fn first_job_is_resent_unchanged() {
    let h = harness();
    h.controller.start().await;
    assert!(h.controller.is_active());

    let job = h.sink.last_job();
    assert_eq!(job.height(), 100);
    assert_eq!(job.prev_block_hash(), h.chain.tip());
    assert_eq!(job.tx_count(), 1);
    let payout = h.templates.calls.lock()[0].clone();
    assert!(payout == "payout-a" || payout == "payout-b");

    assert_eq!(h.controller.rebroadcast_tick().await, TickAction::Resent);
    let sets = h.sink.sets();
    assert_eq!(sets.len(), 2);
    assert_eq!(sets[0], sets[1]);
}

#[tokio::test]
async fn moved_tip_regenerates_on_next_tick() {
    let h = harness();
    h.controller.start().await;
    h.chain.advance_tip(9);

    assert_eq!(h.controller.rebroadcast_tick().await, TickAction::Regenerated);
    assert_eq!(h.templates.call_count(), 2);
    let job = h.sink.last_job();
    assert_eq!(job.prev_block_hash(), Hash::from_bytes([9; 32]));
    assert_eq!(job.height(), 101);
}

#[tokio::test(start_paused = true)]
async fn mempool_change_waits_for_grace_period() {
    let h = harness();
    h.controller.start().await;
    h.templates.touch_mempool();

    tokio::time::advance(Duration::from_secs(30)).await;
    assert_eq!(h.controller.rebroadcast_tick().await, TickAction::Resent);

    tokio::time::advance(Duration::from_secs(30)).await;
    assert_eq!(h.controller.rebroadcast_tick().await, TickAction::Regenerated);

    // Unchanged mempool never regenerates, however old the job.
    tokio::time::advance(Duration::from_secs(600)).await;
    assert_eq!(h.controller.rebroadcast_tick().await, TickAction::Resent);
    assert_eq!(h.templates.call_count(), 2);
}

#[tokio::test]
async fn template_failure_keeps_last_job() {
    let h = harness();
    h.controller.start().await;
    let first = h.controller.last_broadcast();

    *h.templates.failing.lock() = true;
    let err = h.controller.send_new_block_template().await.unwrap_err();
    assert!(matches!(err, ControllerError::Template(_)));
    assert_eq!(h.controller.last_broadcast(), first);

    h.chain.advance_tip(9);
    assert_eq!(h.controller.rebroadcast_tick().await, TickAction::Resent);
    assert_eq!(h.sink.sets().last().unwrap(), &first);
}

#[tokio::test]
async fn stale_solution_never_reaches_the_chain() {
    let h = harness();
    h.controller.start().await;

    let err = h.controller.handle_solution(&solution_on(Hash::from_bytes([0xee; 32]))).await.unwrap_err();
    assert!(matches!(err, ControllerError::StaleSubmission { .. }));
    assert!(h.chain.processed.lock().is_empty());
    // fresh work went out instead
    assert_eq!(h.templates.call_count(), 2);
    assert_eq!(h.sink.kinds(), vec![MessageKind::Job, MessageKind::Job]);
}

#[tokio::test]
async fn accepted_solution_switches_rebroadcast_to_pause() {
    let h = harness();
    h.controller.start().await;

    let orphan = h.controller.handle_solution(&solution_on(h.chain.tip())).await.unwrap();
    assert!(!orphan);
    assert_eq!(h.chain.processed.lock().len(), 1);
    assert_eq!(h.sink.kinds(), vec![MessageKind::Job, MessageKind::Pause]);

    match h.sink.decode(&h.controller.last_broadcast()) {
        Message::Pause(pause) => {
            use network::protowire::AdvertisedFields;
            assert_eq!(pause.submit_port(), 11050);
            assert_eq!(pause.ips(), vec!["10.0.0.7".parse::<std::net::IpAddr>().unwrap()]);
        }
        other => panic!("unexpected {:?}", other.kind()),
    }

    assert_eq!(h.controller.rebroadcast_tick().await, TickAction::Resent);
    assert_eq!(h.sink.kinds().last(), Some(&MessageKind::Pause));
}

/// How a listener sees one broadcast: a fresh message or a resend of one it already decoded.
fn receive(reassembler: &mut Reassembler, set: &[Vec<u8>]) -> Assembly {
    let now = tokio::time::Instant::now();
    for datagram in set {
        match reassembler.insert(Shard::parse(datagram).unwrap(), now) {
            Assembly::Incomplete => continue,
            Assembly::Ready(ready) => {
                reassembler.mark_decoded(&ready, Vec::new(), now);
                return Assembly::Ready(ready);
            }
            repeated => return repeated,
        }
    }
    Assembly::Incomplete
}

#[tokio::test]
async fn every_pause_event_is_a_fresh_message() {
    let h = harness();
    h.controller.start().await;

    h.controller.handle_solution(&solution_on(h.chain.tip())).await.unwrap();
    let first_pause = h.controller.last_broadcast();
    assert_eq!(h.controller.rebroadcast_tick().await, TickAction::Resent);

    h.chain.advance_tip(9);
    assert_eq!(h.controller.rebroadcast_tick().await, TickAction::Regenerated);
    h.controller.handle_solution(&solution_on(h.chain.tip())).await.unwrap();
    let second_pause = h.controller.last_broadcast();
    h.controller.shutdown().await;
    let final_pause = h.sink.sets().last().unwrap().clone();

    let nonce = |set: &[Vec<u8>]| Shard::parse(&set[0]).unwrap().nonce;
    assert_ne!(nonce(&first_pause), nonce(&second_pause));
    assert_ne!(nonce(&second_pause), nonce(&final_pause));

    // A supervisor listening throughout acts on each Pause and ignores the resend.
    let mut reassembler = Reassembler::default();
    let sets = h.sink.sets();
    let outcomes: Vec<_> = sets
        .iter()
        .map(|set| (h.sink.decode(set).kind(), matches!(receive(&mut reassembler, set), Assembly::Repeated(_))))
        .collect();
    assert_eq!(
        outcomes,
        vec![
            (MessageKind::Job, false),
            (MessageKind::Pause, false),
            (MessageKind::Pause, true),
            (MessageKind::Job, false),
            (MessageKind::Pause, false),
            (MessageKind::Pause, false),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn tick_does_not_regenerate_behind_a_notification() {
    let h = harness_with(|chain| MockTemplates::with_delay(chain, Duration::from_millis(500)));
    h.controller.start().await;
    h.chain.advance_tip(9);

    let accepted = ChainNotification::BlockAccepted(h.chain.tip());
    let ((), action) = tokio::join!(h.controller.handle_notification(accepted), h.controller.rebroadcast_tick());
    assert_eq!(action, TickAction::Idle);
    assert_eq!(h.templates.call_count(), 2);
    assert_eq!(h.sink.kinds(), vec![MessageKind::Job, MessageKind::Job]);

    // the job the notification built is current, so the next tick only resends it
    assert_eq!(h.controller.rebroadcast_tick().await, TickAction::Resent);
    assert_eq!(h.templates.call_count(), 2);
}

#[tokio::test]
async fn rejected_solution_triggers_fresh_work() {
    let h = harness();
    h.controller.start().await;

    *h.chain.outcome.lock() = Err(ProcessBlockError::RuleViolation("bad merkle root".into()));
    let err = h.controller.handle_solution(&solution_on(h.chain.tip())).await.unwrap_err();
    assert!(matches!(err, ControllerError::RuleViolation(_)));

    *h.chain.outcome.lock() = Err(ProcessBlockError::Internal("database closed".into()));
    let err = h.controller.handle_solution(&solution_on(h.chain.tip())).await.unwrap_err();
    assert!(matches!(err, ControllerError::UnexpectedProcessing(_)));

    assert_eq!(h.chain.processed.lock().len(), 2);
    assert_eq!(h.sink.kinds(), vec![MessageKind::Job; 3]);
}

#[tokio::test(start_paused = true)]
async fn overlapping_notifications_are_coalesced() {
    let h = harness_with(|chain| MockTemplates::with_delay(chain, Duration::from_millis(500)));
    h.controller.start().await;
    assert_eq!(h.templates.call_count(), 1);

    let accepted = ChainNotification::BlockAccepted(Hash::from_bytes([3; 32]));
    tokio::join!(h.controller.handle_notification(accepted.clone()), h.controller.handle_notification(accepted.clone()));
    assert_eq!(h.templates.call_count(), 2);

    // Other events are not work triggers.
    h.controller.handle_notification(ChainNotification::BlockConnected(Hash::from_bytes([3; 32]))).await;
    assert_eq!(h.templates.call_count(), 2);
}

#[tokio::test]
async fn inactive_controller_ignores_notifications() {
    let h = harness();
    h.controller.handle_notification(ChainNotification::BlockAccepted(Hash::from_bytes([3; 32]))).await;
    assert_eq!(h.templates.call_count(), 0);

    h.controller.start().await;
    h.controller.shutdown().await;
    assert!(!h.controller.is_active());
    assert_eq!(h.sink.kinds(), vec![MessageKind::Job, MessageKind::Pause]);

    h.controller.handle_notification(ChainNotification::BlockAccepted(Hash::from_bytes([3; 32]))).await;
    assert_eq!(h.templates.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn run_loop_handles_solutions_and_pauses_on_exit() {
    let h = harness();
    let (solutions_tx, solutions_rx) = mpsc::channel(8);
    let (notify_tx, notify_rx) = broadcast::channel(8);
    let cancel = CancellationToken::new();
    let running = tokio::spawn(h.controller.clone().run(solutions_rx, notify_rx, cancel.clone()));

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(h.sink.kinds(), vec![MessageKind::Job, MessageKind::Job]);

    let inbound = Inbound {
        message: Message::Solution(solution_on(h.chain.tip())),
        from: "10.0.0.8:40000".parse().unwrap(),
        repeat: false,
    };
    solutions_tx.send(inbound).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.chain.processed.lock().len(), 1);

    h.chain.advance_tip(9);
    notify_tx.send(ChainNotification::BlockAccepted(h.chain.tip())).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.sink.last_job().prev_block_hash(), h.chain.tip());

    cancel.cancel();
    running.await.unwrap();
    assert!(!h.controller.is_active());
    assert_eq!(h.sink.kinds().last(), Some(&MessageKind::Pause));
}
