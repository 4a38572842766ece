use std::{collections::HashMap, io, net::SocketAddr};

use futures::{SinkExt, StreamExt};
use list_core::{bifrost, Adapter, AdapterExit, AdapterIo, Client};
use shared::{domain::ConnectionId, error::WireError, wire::Message};
use thiserror::Error;
use tokio::{
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener, TcpStream,
    },
    sync::mpsc,
    task::JoinSet,
};
use tokio_util::{
    codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError},
    sync::CancellationToken,
    task::TaskTracker,
};
use tracing::{debug, error, info, warn};

pub const DEFAULT_MAX_LINE_BYTES: usize = 4096;
const SERVER_VERSION: &str = concat!("listd/", env!("CARGO_PKG_VERSION"));
const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    /// Longest inbound line accepted before the connection is dropped.
    pub max_line_bytes: usize,
    /// Buffer between each connection's socket loops and its adapter.
    pub adapter_capacity: usize,
    /// Sent to every peer in the `OHAI` greeting.
    pub server_version: String,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            adapter_capacity: 64,
            server_version: SERVER_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The controller was shut down.
    ControllerShutdown,
    /// The listener failed; the message is the accept error.
    AcceptFailed(String),
}

/// What a finished [`Server::run`] left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    pub reason: ShutdownReason,
    /// Connections still registered when shutdown began.
    pub connections_hung_up: usize,
    /// Spawned loops, the acceptor included, whose futures were still
    /// alive once shutdown finished joining.
    pub live_tasks: usize,
}

/// A bound listener waiting to serve a controller.
pub struct Server {
    listener: TcpListener,
    root: Client,
    options: ServerOptions,
}

impl Server {
    /// Binds the listener. On failure the controller behind `root` is shut
    /// down, as it would be by any other server exit.
    pub async fn bind(addr: &str, root: Client, options: ServerOptions) -> Result<Self, ServerError> {
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                info!(%addr, "listening");
                Ok(Self {
                    listener,
                    root,
                    options,
                })
            }
            Err(source) => {
                error!(%addr, error = %source, "couldn't open server");
                root.shutdown();
                Err(ServerError::Bind {
                    addr: addr.to_string(),
                    source,
                })
            }
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves connections until the controller shuts down or the listener
    /// fails, then hangs up every connection and joins every spawned loop
    /// before closing the listener.
    pub async fn run(self) -> ShutdownReport {
        let Server {
            listener,
            root,
            options,
        } = self;
        let done = CancellationToken::new();
        let tracker = TaskTracker::new();

        let (accepted_tx, accepted_rx) = mpsc::channel(1);
        let (accept_error_tx, accept_error_rx) = mpsc::channel(1);
        let acceptor = tokio::spawn(tracker.track_future(accept_connections(
            listener,
            accepted_tx,
            accept_error_tx,
            done.clone(),
        )));

        let (hangup_tx, hangup_rx) = mpsc::channel(EVENT_CAPACITY);
        let (fault_tx, fault_rx) = mpsc::channel(EVENT_CAPACITY);
        let mut control = ControlLoop {
            root,
            options,
            done,
            connections: HashMap::new(),
            tasks: JoinSet::new(),
            tracker: tracker.clone(),
            next_id: 0,
            hangup_tx,
            fault_tx,
        };
        let reason = control
            .serve(accepted_rx, accept_error_rx, hangup_rx, fault_rx)
            .await;
        let connections_hung_up = control.shut_down().await;

        match acceptor.await {
            Ok(listener) => {
                drop(listener);
                info!("closed listener");
            }
            Err(error) => error!(%error, "acceptor task failed"),
        }

        tracker.close();
        let live_tasks = tracker.len();
        if live_tasks > 0 {
            warn!(live_tasks, "loops outlived server shutdown");
        }
        info!(connections_hung_up, live_tasks, "server stopped");
        ShutdownReport {
            reason,
            connections_hung_up,
            live_tasks,
        }
    }
}

/// Binds `addr` and serves until shutdown.
pub async fn serve(
    addr: &str,
    root: Client,
    options: ServerOptions,
) -> Result<ShutdownReport, ServerError> {
    Ok(Server::bind(addr, root, options).await?.run().await)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Delivered,
    Cancelled,
    Closed,
}

/// Sends `value`, giving up if `cancel` fires first.
async fn deliver<T>(tx: &mpsc::Sender<T>, value: T, cancel: &CancellationToken) -> Delivery {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Delivery::Cancelled,
        sent = tx.send(value) => match sent {
            Ok(()) => Delivery::Delivered,
            Err(_) => Delivery::Closed,
        },
    }
}

/// Accepts until `done` fires or the listener fails, handing each stream to
/// the control loop. Returns the listener so the caller decides when it closes.
async fn accept_connections(
    listener: TcpListener,
    accepted: mpsc::Sender<(TcpStream, SocketAddr)>,
    errors: mpsc::Sender<io::Error>,
    done: CancellationToken,
) -> TcpListener {
    loop {
        let next = tokio::select! {
            biased;
            _ = done.cancelled() => break,
            next = listener.accept() => next,
        };
        match next {
            Ok((stream, peer)) => match deliver(&accepted, (stream, peer), &done).await {
                Delivery::Delivered => {}
                Delivery::Cancelled => {
                    info!(%peer, "server shutting down; dropping new connection");
                    break;
                }
                Delivery::Closed => {
                    warn!(%peer, "control loop gone; dropping new connection");
                    break;
                }
            },
            Err(error) => {
                error!(%error, "accept failed");
                if deliver(&errors, error, &done).await != Delivery::Delivered {
                    debug!("accept error not reported; server already stopping");
                }
                break;
            }
        }
    }
    debug!("acceptor stopped");
    listener
}

#[derive(Debug, Error)]
enum ConnectionError {
    #[error("read failed: {0}")]
    Read(#[source] LinesCodecError),
    #[error("write failed: {0}")]
    Write(#[source] LinesCodecError),
    #[error("malformed line: {0}")]
    Decode(#[from] WireError),
}

impl ConnectionError {
    fn from_read(error: LinesCodecError, limit: usize) -> Self {
        match error {
            LinesCodecError::MaxLineLengthExceeded => WireError::LineTooLong { limit }.into(),
            other => ConnectionError::Read(other),
        }
    }
}

#[derive(Debug)]
struct ConnectionFault {
    id: ConnectionId,
    error: ConnectionError,
}

struct Connection {
    peer: SocketAddr,
    cancel: CancellationToken,
}

/// How a connection's loops talk back to the control loop.
#[derive(Clone)]
struct Reporter {
    id: ConnectionId,
    cancel: CancellationToken,
    hangups: mpsc::Sender<ConnectionId>,
    faults: mpsc::Sender<ConnectionFault>,
}

impl Reporter {
    async fn finish(&self, task: &'static str, result: Result<(), ConnectionError>) {
        if self.cancel.is_cancelled() {
            return;
        }
        let delivery = match result {
            Ok(()) => {
                debug!(connection = %self.id, task, "loop finished; requesting hang-up");
                deliver(&self.hangups, self.id, &self.cancel).await
            }
            Err(error) => {
                debug!(connection = %self.id, task, %error, "connection error");
                let fault = ConnectionFault { id: self.id, error };
                deliver(&self.faults, fault, &self.cancel).await
            }
        };
        if delivery == Delivery::Closed {
            debug!(connection = %self.id, task, "control loop gone");
        }
    }
}

/// Sole owner of the live connection set.
struct ControlLoop {
    root: Client,
    options: ServerOptions,
    done: CancellationToken,
    connections: HashMap<ConnectionId, Connection>,
    tasks: JoinSet<()>,
    tracker: TaskTracker,
    next_id: u64,
    hangup_tx: mpsc::Sender<ConnectionId>,
    fault_tx: mpsc::Sender<ConnectionFault>,
}

impl ControlLoop {
    async fn serve(
        &mut self,
        mut accepted: mpsc::Receiver<(TcpStream, SocketAddr)>,
        mut accept_errors: mpsc::Receiver<io::Error>,
        mut hangups: mpsc::Receiver<ConnectionId>,
        mut faults: mpsc::Receiver<ConnectionFault>,
    ) -> ShutdownReason {
        let root_done = self.root.done().clone();
        let mut root_open = true;
        loop {
            tokio::select! {
                biased;
                _ = root_done.cancelled() => {
                    info!("controller shut down; stopping server");
                    return ShutdownReason::ControllerShutdown;
                }
                Some(error) = accept_errors.recv() => {
                    error!(%error, "error accepting connections");
                    return ShutdownReason::AcceptFailed(error.to_string());
                }
                Some((stream, peer)) = accepted.recv() => self.register(stream, peer).await,
                Some(id) = hangups.recv() => {
                    self.hang_up(id);
                }
                Some(fault) = faults.recv() => {
                    warn!(connection = %fault.id, error = %fault.error, "connection error");
                    self.hang_up(fault.id);
                }
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    if let Err(error) = joined {
                        warn!(%error, "connection task failed");
                    }
                }
                response = self.root.recv(), if root_open => {
                    if response.is_none() {
                        debug!("root client detached from controller");
                        root_open = false;
                    }
                }
            }
        }
    }

    async fn register(&mut self, stream: TcpStream, peer: SocketAddr) {
        let client = match self.root.copy().await {
            Ok(client) => client,
            Err(error) => {
                warn!(%peer, %error, "error registering connection; closing it");
                return;
            }
        };

        let id = ConnectionId(self.next_id);
        self.next_id += 1;
        let cancel = self.done.child_token();
        let reporter = Reporter {
            id,
            cancel: cancel.clone(),
            hangups: self.hangup_tx.clone(),
            faults: self.fault_tx.clone(),
        };

        let (adapter, AdapterIo { inbound, outbound }) =
            Adapter::new(client, self.options.adapter_capacity);
        let (read_half, write_half) = stream.into_split();
        let greeting = bifrost::greeting(&self.options.server_version);

        let tracker = &self.tracker;
        self.tasks.spawn(tracker.track_future(receive_loop(
            read_half,
            inbound,
            self.options.max_line_bytes,
            reporter.clone(),
        )));
        self.tasks.spawn(tracker.track_future(transmit_loop(
            write_half,
            outbound,
            greeting,
            reporter.clone(),
        )));
        self.tasks
            .spawn(tracker.track_future(adapter_loop(adapter, reporter)));

        self.connections.insert(id, Connection { peer, cancel });
        info!(connection = %id, %peer, "connection registered");
    }

    fn hang_up(&mut self, id: ConnectionId) -> bool {
        match self.connections.remove(&id) {
            Some(connection) => {
                info!(connection = %id, peer = %connection.peer, "hanging up");
                connection.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Hangs up every connection, stops the controller and joins every
    /// connection loop. Returns how many connections were hung up.
    async fn shut_down(mut self) -> usize {
        self.done.cancel();
        let ids: Vec<ConnectionId> = self.connections.keys().copied().collect();
        let connections_hung_up = ids.into_iter().filter(|id| self.hang_up(*id)).count();
        self.root.shutdown();

        while let Some(joined) = self.tasks.join_next().await {
            if let Err(error) = joined {
                warn!(%error, "connection task failed during shutdown");
            }
        }
        connections_hung_up
    }
}

async fn receive_loop(
    read_half: OwnedReadHalf,
    inbound: mpsc::Sender<Message>,
    max_line_bytes: usize,
    reporter: Reporter,
) {
    let mut lines = FramedRead::new(read_half, LinesCodec::new_with_max_length(max_line_bytes));
    let result = loop {
        let next = tokio::select! {
            biased;
            _ = reporter.cancel.cancelled() => return,
            next = lines.next() => next,
        };
        let line = match next {
            None => break Ok(()),
            Some(Ok(line)) => line,
            Some(Err(error)) => break Err(ConnectionError::from_read(error, max_line_bytes)),
        };
        if line.trim().is_empty() {
            continue;
        }
        let message = match Message::from_line(&line) {
            Ok(message) => message,
            Err(error) => break Err(error.into()),
        };
        match deliver(&inbound, message, &reporter.cancel).await {
            Delivery::Delivered => {}
            Delivery::Cancelled => return,
            Delivery::Closed => break Ok(()),
        }
    };
    reporter.finish("receive", result).await;
}

async fn transmit_loop(
    write_half: OwnedWriteHalf,
    mut outbound: mpsc::Receiver<Message>,
    greeting: [Message; 2],
    reporter: Reporter,
) {
    let mut sink = FramedWrite::new(write_half, LinesCodec::new());
    let mut pending = greeting.into_iter();
    let result = loop {
        let message = match pending.next() {
            Some(message) => message,
            None => tokio::select! {
                biased;
                _ = reporter.cancel.cancelled() => return,
                message = outbound.recv() => match message {
                    Some(message) => message,
                    None => break Ok(()),
                },
            },
        };
        let sent = tokio::select! {
            biased;
            _ = reporter.cancel.cancelled() => return,
            sent = sink.send(message.pack()) => sent,
        };
        if let Err(error) = sent {
            break Err(ConnectionError::Write(error));
        }
    };
    reporter.finish("transmit", result).await;
}

async fn adapter_loop(adapter: Adapter, reporter: Reporter) {
    let exit = adapter.run(reporter.cancel.clone()).await;
    if exit != AdapterExit::Cancelled {
        reporter.finish("adapter", Ok(())).await;
    }
}

#[cfg(test)]
#[path = "tests/netsrv_tests.rs"]
mod tests;
