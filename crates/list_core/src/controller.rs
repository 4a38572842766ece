use std::collections::BTreeMap;

use shared::{
    domain::ClientId,
    error::AckError,
    protocol::{Request, RequestBody, RequestOrigin, Response, ResponseBody},
};
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    oneshot,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{client::Client, list::List};

pub const DEFAULT_QUEUE_CAPACITY: usize = 64;
pub const DEFAULT_CLIENT_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Requests that may wait in the intake queue before senders block.
    pub queue_capacity: usize,
    /// Responses that may wait for each client before it counts as lagging.
    pub client_buffer: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            client_buffer: DEFAULT_CLIENT_BUFFER,
        }
    }
}

/// Everything travelling down a controller's intake queue.
#[derive(Debug)]
pub(crate) enum Envelope {
    Request(Request),
    Attach {
        reply: oneshot::Sender<Attachment>,
    },
    Detach(ClientId),
}

/// A freshly registered subscription, handed back to the copying client.
#[derive(Debug)]
pub(crate) struct Attachment {
    pub(crate) id: ClientId,
    pub(crate) reply_tx: mpsc::Sender<Response>,
    pub(crate) rx: mpsc::Receiver<Response>,
}

/// Sole owner of a [`List`].
///
/// Every mutation arrives through one queue and is applied in arrival order,
/// so each request observes the effects of all requests queued before it.
pub struct Controller {
    list: List,
    rx: mpsc::Receiver<Envelope>,
    subscribers: BTreeMap<ClientId, mpsc::Sender<Response>>,
    next_client_id: u64,
    client_buffer: usize,
    lifetime: CancellationToken,
}

impl Controller {
    /// Creates a controller around `list` along with its root client.
    pub fn new(list: List, config: ControllerConfig) -> (Self, Client) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let lifetime = CancellationToken::new();
        let mut controller = Self {
            list,
            rx,
            subscribers: BTreeMap::new(),
            next_client_id: 0,
            client_buffer: config.client_buffer.max(1),
            lifetime: lifetime.clone(),
        };
        let root = Client::from_attachment(controller.attach(), tx, &lifetime);
        (controller, root)
    }

    /// Runs until shutdown is requested or every client has gone, then
    /// returns the final list state.
    pub async fn run(mut self) -> List {
        info!(items = self.list.len(), "controller running");
        loop {
            let envelope = tokio::select! {
                biased;
                _ = self.lifetime.cancelled() => {
                    info!("controller shutdown requested");
                    break;
                }
                envelope = self.rx.recv() => match envelope {
                    Some(envelope) => envelope,
                    None => {
                        info!("all clients gone");
                        break;
                    }
                },
            };
            self.handle(envelope);
        }

        self.lifetime.cancel();
        self.rx.close();
        // Dropping the senders ends every client's response stream.
        self.subscribers.clear();
        info!("controller stopped");
        self.list
    }

    fn handle(&mut self, envelope: Envelope) {
        match envelope {
            Envelope::Request(request) => self.apply(request),
            Envelope::Attach { reply } => {
                let attachment = self.attach();
                let id = attachment.id;
                if reply.send(attachment).is_err() {
                    debug!(client = %id, "copying client went away before attach completed");
                    self.subscribers.remove(&id);
                }
            }
            Envelope::Detach(id) => {
                if self.subscribers.remove(&id).is_some() {
                    debug!(client = %id, "client detached");
                }
            }
        }
    }

    fn attach(&mut self) -> Attachment {
        let id = ClientId(self.next_client_id);
        self.next_client_id += 1;
        let (reply_tx, rx) = mpsc::channel(self.client_buffer);
        self.subscribers.insert(id, reply_tx.clone());
        debug!(client = %id, subscribers = self.subscribers.len(), "client attached");
        Attachment { id, reply_tx, rx }
    }

    fn apply(&mut self, request: Request) {
        let Request { origin, body } = request;
        let name = body.name();

        match body {
            RequestBody::Dump => {
                let snapshot = self.list.snapshot();
                reply(&origin, Response::unicast(&origin, ResponseBody::Dump(snapshot)));
            }
            RequestBody::SetSelect { index, hash } => match self.list.select(index, &hash) {
                Ok(selection) => self.broadcast(ResponseBody::Select(Some(selection))),
                Err(error) => {
                    debug!(%error, "selection rejected");
                    reply(&origin, Response::error(&origin, AckError::fail(error.to_string())));
                    return;
                }
            },
            RequestBody::Next => {
                let selection = self.list.next();
                self.broadcast(ResponseBody::Select(selection));
            }
            RequestBody::SetAutoMode { auto_mode } => {
                self.list.set_auto_mode(auto_mode);
                self.broadcast(ResponseBody::AutoMode(auto_mode));
            }
        }

        reply(&origin, Response::ok(&origin, name));
    }

    fn broadcast(&mut self, body: ResponseBody) {
        let response = Response::broadcast(body);
        let mut gone = Vec::new();
        for (id, tx) in &self.subscribers {
            match tx.try_send(response.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(client = %id, "client lagging; detaching");
                    gone.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(client = %id, "client receiver closed; detaching");
                    gone.push(*id);
                }
            }
        }
        for id in gone {
            self.subscribers.remove(&id);
        }
    }
}

fn reply(origin: &RequestOrigin, response: Response) {
    match origin.reply_tx.try_send(response) {
        Ok(()) => {}
        Err(TrySendError::Full(response)) => {
            warn!(body = ?response.body, "requester lagging; dropping unicast response");
        }
        Err(TrySendError::Closed(_)) => {
            debug!("requester gone; dropping unicast response");
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
