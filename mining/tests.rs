//! Cross-module tests: several search threads sharing one job, and a job
//! travelling from the wire format through a worker to a solution.

use std::time::Duration;

use consensus_core::{Hash, OutPoint, Transaction, TxIn, TxOut};
use network::protowire::{Advertisement, Job, JobContainer, SolutionContainer};
use tokio::sync::mpsc::unbounded_channel;

use crate::config::MinerConfig;
use crate::worker::{join_with_timeout, Command, MinerWorker};

const EASY_BITS: u32 = 0x1f00ffff;

fn pool_job() -> Job {
    let coinbase = Transaction::new(
        1,
        vec![TxIn { previous_output: OutPoint::null(), signature_script: vec![1, 100], sequence: u32::MAX }],
        vec![TxOut { value: 50_0000_0000, script_pubkey: vec![0x51] }],
        0,
    );
    Job {
        advertisement: Advertisement::new(vec!["127.0.0.1".parse().unwrap()], 11047, 11048, 11050),
        height: 100,
        prev_block_hash: Hash::from_bytes([0x42; 32]),
        bitses: [(2, EASY_BITS), (6, EASY_BITS)].into_iter().collect(),
        transactions: vec![coinbase],
    }
}

#[test]
fn test_two_workers_each_find_one_block() {
    let job = pool_job();
    let (sol_tx, mut sol_rx) = unbounded_channel();
    let mut workers = Vec::new();
    for _ in 0..2 {
        let (commands, handle) = MinerWorker::spawn(MinerConfig::default(), sol_tx.clone()).unwrap();
        commands.send(Command::NewJob(Box::new(job.clone()))).unwrap();
        workers.push((commands, handle));
    }
    drop(sol_tx);

    let mut found = Vec::new();
    while found.len() < 2 {
        found.push(sol_rx.blocking_recv().unwrap());
    }

    for (commands, handle) in workers {
        commands.send(Command::Stop).unwrap();
        assert!(join_with_timeout(handle, Duration::from_secs(5)));
    }
    // Every worker paused after its block and nothing else arrived.
    assert!(sol_rx.try_recv().is_err());

    for solution in &found {
        let header = &solution.block.header;
        assert_eq!(header.prev_block, Hash::from_bytes([0x42; 32]));
        assert!([2, 6].contains(&header.version));
        assert_eq!(header.bits, EASY_BITS);
        assert!(header.meets_target());
        assert_eq!(solution.destinations, vec!["127.0.0.1:11050".parse().unwrap()]);
    }
    // Independent extra nonces keep the two blocks apart.
    assert_ne!(found[0].block.hash(), found[1].block.hash());
}

#[test]
fn test_wire_job_to_solution_container() {
    let wire = pool_job().to_container().unwrap().into_bytes();
    let job = JobContainer::from_bytes(wire).unwrap().to_job().unwrap();

    let (sol_tx, mut sol_rx) = unbounded_channel();
    let (commands, handle) = MinerWorker::spawn(MinerConfig::default(), sol_tx).unwrap();
    commands.send(Command::NewJob(Box::new(job))).unwrap();
    let solution = sol_rx.blocking_recv().unwrap();
    commands.send(Command::Stop).unwrap();
    assert!(join_with_timeout(handle, Duration::from_secs(5)));

    let container = SolutionContainer::new(&solution.block).unwrap();
    let block = SolutionContainer::from_bytes(container.into_bytes()).unwrap().try_block().unwrap();
    assert_eq!(block, solution.block);
    assert_eq!(block.calc_merkle_root(), block.header.merkle_root);
}
