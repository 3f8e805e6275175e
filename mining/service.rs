//! IPC endpoint of a mining process: answers supervisor requests, feeds the
//! search thread and ships solutions back to the controller.

use std::net::SocketAddr;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use network::ipc::{read_frame, write_frame, IpcError, Request, Response};
use network::protowire::{JobContainer, SolutionContainer};
use network::{Connection, DatagramSink, MessageKind, ShardCodec, TransportConfig};
use parking_lot::RwLock;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use crate::config::MinerConfig;
use crate::errors::{MiningError, MiningResult};
use crate::worker::{join_with_timeout, Command, FoundBlock, MinerWorker};

type SharedConnection = Arc<RwLock<Option<Arc<Connection>>>>;

pub struct MinerService {
    commands: Sender<Command>,
    search: Option<JoinHandle<()>>,
    connection: SharedConnection,
    transport: TransportConfig,
}

impl MinerService {
    /// Starts the search thread and the solution dispatcher. Must be called
    /// inside a tokio runtime.
    pub fn start(config: MinerConfig, transport: TransportConfig) -> MiningResult<Self> {
        let (solution_tx, solution_rx) = unbounded_channel();
        let (commands, search) = MinerWorker::spawn(config, solution_tx)?;
        let connection: SharedConnection = Arc::new(RwLock::new(None));
        tokio::spawn(dispatch_solutions(solution_rx, connection.clone()));
        Ok(Self { commands, search: Some(search), connection, transport })
    }

    /// Handles one request. `Ok` is acknowledged, an error is refused.
    pub async fn handle(&mut self, request: Request) -> MiningResult<()> {
        match request {
            Request::SendPass(passphrase) => {
                let transport = TransportConfig { passphrase, ..self.transport.clone() };
                let codec = Arc::new(ShardCodec::from_config(&transport)?);
                let connection = Connection::bind(SocketAddr::from(([0, 0, 0, 0], 0)), Vec::new(), codec).await?;
                *self.connection.write() = Some(Arc::new(connection));
                log::debug!("passphrase received, solution transport ready");
                Ok(())
            }
            Request::NewJob(bytes) => {
                let job = JobContainer::from_bytes(bytes)?.to_job()?;
                self.send(Command::NewJob(Box::new(job)))
            }
            Request::Pause => self.send(Command::Pause),
            Request::Stop => self.send(Command::Stop),
        }
    }

    fn send(&self, command: Command) -> MiningResult<()> {
        self.commands.send(command).map_err(|_| MiningError::WorkerGone)
    }

    /// Answers framed requests until Stop or end of input.
    pub async fn serve<R, W>(mut self, reader: &mut R, writer: &mut W) -> Result<(), IpcError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        loop {
            let request: Request = match read_frame(reader).await {
                Ok(request) => request,
                Err(IpcError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    log::info!("supervisor closed the pipe");
                    let _ = self.send(Command::Stop);
                    break;
                }
                Err(e) => return Err(e),
            };
            let stop = request == Request::Stop;
            let name = request.name();
            let ack = match self.handle(request).await {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("{} failed: {}", name, e);
                    false
                }
            };
            write_frame(writer, &Response::Ack(ack)).await?;
            if stop {
                break;
            }
        }
        self.join_search();
        Ok(())
    }

    fn join_search(&mut self) {
        if let Some(handle) = self.search.take() {
            if !join_with_timeout(handle, Duration::from_secs(1)) {
                log::warn!("search thread did not stop in time");
            }
        }
    }
}

async fn dispatch_solutions(mut solutions: UnboundedReceiver<FoundBlock>, connection: SharedConnection) {
    while let Some(found) = solutions.recv().await {
        let Some(conn) = connection.read().clone() else {
            log::error!("dropping solution: {}", MiningError::NoPassphrase);
            continue;
        };
        let container = match SolutionContainer::new(&found.block) {
            Ok(container) => container,
            Err(e) => {
                log::error!("cannot encode solution: {}", e);
                continue;
            }
        };
        conn.set_destinations(found.destinations.clone());
        match conn.send_message(container.as_bytes(), MessageKind::Solution.magic()).await {
            Ok(shards) => log::info!("sent solution as {} shards to {:?}", shards.len(), found.destinations),
            Err(e) => log::error!("cannot send solution: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consensus_core::{Hash, OutPoint, Transaction, TxIn, TxOut};
    use network::ipc::call;
    use network::protowire::{Advertisement, Job};
    use network::Message;

    #[tokio::test]
    async fn test_serves_until_stop() {
        let service = MinerService::start(MinerConfig::default(), TransportConfig::default()).unwrap();
        let (client, server) = tokio::io::duplex(4096);
        let (mut server_read, mut server_write) = tokio::io::split(server);
        let served = tokio::spawn(async move { service.serve(&mut server_read, &mut server_write).await });

        let (mut read, mut write) = tokio::io::split(client);
        call(&mut write, &mut read, &Request::Pause).await.unwrap();
        // garbage job bytes are refused, not fatal
        let err = call(&mut write, &mut read, &Request::NewJob(vec![1, 2, 3])).await.unwrap_err();
        assert!(matches!(err, IpcError::NotAcknowledged("NewJob")));
        call(&mut write, &mut read, &Request::Stop).await.unwrap();

        served.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_solution_reaches_advertised_controller() {
        let codec = Arc::new(ShardCodec::new("p9pass", 3, 6, 65_000).unwrap());
        let controller = Connection::bind("127.0.0.1:0".parse().unwrap(), Vec::new(), codec).await.unwrap();
        let submit_port = controller.local_addr().unwrap().port();
        let cancel = tokio_util::sync::CancellationToken::new();
        let mut solutions = controller.listen(&[MessageKind::Solution], cancel.clone());

        let coinbase = Transaction::new(
            1,
            vec![TxIn { previous_output: OutPoint::null(), signature_script: vec![], sequence: u32::MAX }],
            vec![TxOut { value: 50, script_pubkey: vec![0x51] }],
            0,
        );
        let job = Job {
            advertisement: Advertisement::new(vec!["127.0.0.1".parse().unwrap()], 11047, 11048, submit_port),
            height: 300,
            prev_block_hash: Hash::from_bytes([4; 32]),
            bitses: [(2, 0x207fffff)].into_iter().collect(),
            transactions: vec![coinbase],
        };

        let mut service = MinerService::start(MinerConfig::default(), TransportConfig::default()).unwrap();
        service.handle(Request::SendPass("p9pass".into())).await.unwrap();
        service.handle(Request::NewJob(job.to_container().unwrap().into_bytes())).await.unwrap();

        let inbound = tokio::time::timeout(Duration::from_secs(10), solutions.recv()).await.unwrap().unwrap();
        assert!(!inbound.repeat);
        let Message::Solution(solution) = inbound.message else { panic!("expected a solution") };
        let block = solution.try_block().unwrap();
        assert_eq!(block.header.prev_block, Hash::from_bytes([4; 32]));
        assert!(block.header.meets_target());
        // push(300) leads the coinbase script
        assert_eq!(block.transactions[0].inputs[0].signature_script[..3], [2, 0x2c, 0x01]);

        // the worker paused itself after the find
        assert!(tokio::time::timeout(Duration::from_millis(500), solutions.recv()).await.is_err());

        service.handle(Request::Stop).await.unwrap();
        service.join_search();
        cancel.cancel();
    }
}
