use shared::wire::Message;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    bifrost::{emit_response, parse_error_reply, parse_request},
    client::Client,
};

/// Why an adapter loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterExit {
    /// The owner cancelled the adapter.
    Cancelled,
    /// The client handle is done, or the controller dropped it.
    ClientDone,
    /// The connection side hung up one of its channels.
    ConnectionClosed,
}

/// Bridges decoded wire messages and a [`Client`].
///
/// Inbound messages become requests; malformed ones are answered directly and
/// never reach the controller. Responses from the client are rendered back to
/// messages on the outbound channel.
pub struct Adapter {
    client: Client,
    inbound: mpsc::Receiver<Message>,
    outbound: mpsc::Sender<Message>,
}

/// Connection-facing ends of an [`Adapter`].
#[derive(Debug)]
pub struct AdapterIo {
    /// Decoded messages from the peer go in here.
    pub inbound: mpsc::Sender<Message>,
    /// Messages for the peer come out of here.
    pub outbound: mpsc::Receiver<Message>,
}

impl Adapter {
    pub fn new(client: Client, capacity: usize) -> (Self, AdapterIo) {
        let capacity = capacity.max(1);
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
        (
            Self {
                client,
                inbound: inbound_rx,
                outbound: outbound_tx,
            },
            AdapterIo {
                inbound: inbound_tx,
                outbound: outbound_rx,
            },
        )
    }

    pub async fn run(mut self, cancel: CancellationToken) -> AdapterExit {
        let done = self.client.done().clone();
        let client_id = self.client.id();
        let exit = loop {
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(AdapterExit::Cancelled),
                _ = done.cancelled() => Err(AdapterExit::ClientDone),
                message = self.inbound.recv() => match message {
                    Some(message) => self.handle_inbound(message, &cancel).await,
                    None => Err(AdapterExit::ConnectionClosed),
                },
                response = self.client.recv() => match response {
                    Some(response) => self.forward_all(emit_response(&response), &cancel).await,
                    None => Err(AdapterExit::ClientDone),
                },
            };
            if let Err(exit) = step {
                break exit;
            }
        };
        debug!(client = %client_id, ?exit, "adapter stopped");
        exit
    }

    async fn handle_inbound(
        &mut self,
        message: Message,
        cancel: &CancellationToken,
    ) -> Result<(), AdapterExit> {
        match parse_request(&message) {
            Ok(body) => {
                let sent = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(AdapterExit::Cancelled),
                    sent = self.client.send(body, Some(message)) => sent,
                };
                if sent {
                    Ok(())
                } else {
                    Err(AdapterExit::ClientDone)
                }
            }
            Err(error) => {
                debug!(tag = %message.tag, word = %message.word, %error, "rejecting malformed request");
                let reply = parse_error_reply(&message, &error);
                self.forward_all(vec![reply], cancel).await
            }
        }
    }

    async fn forward_all(
        &mut self,
        messages: Vec<Message>,
        cancel: &CancellationToken,
    ) -> Result<(), AdapterExit> {
        for message in messages {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AdapterExit::Cancelled),
                sent = self.outbound.send(message) => {
                    sent.map_err(|_| AdapterExit::ConnectionClosed)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/adapter_tests.rs"]
mod tests;
