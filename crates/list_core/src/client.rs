use shared::{
    domain::ClientId,
    error::ControllerError,
    protocol::{Request, RequestBody, RequestOrigin, Response},
    wire::Message,
};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::controller::{Attachment, Envelope};

/// One subscriber's handle onto a controller.
///
/// Each handle receives every broadcast plus the unicast replies to its own
/// requests. Handles are cheap to [`copy`](Client::copy); every copy feeds the
/// same controller queue but owns its own response stream and done signal.
#[derive(Debug)]
pub struct Client {
    id: ClientId,
    tx: mpsc::Sender<Envelope>,
    // Weak so that the controller alone keeps the response stream open.
    reply_tx: mpsc::WeakSender<Response>,
    rx: mpsc::Receiver<Response>,
    done: CancellationToken,
    lifetime: CancellationToken,
}

impl Client {
    pub(crate) fn from_attachment(
        attachment: Attachment,
        tx: mpsc::Sender<Envelope>,
        lifetime: &CancellationToken,
    ) -> Self {
        Self {
            id: attachment.id,
            tx,
            reply_tx: attachment.reply_tx.downgrade(),
            rx: attachment.rx,
            done: lifetime.child_token(),
            lifetime: lifetime.clone(),
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Fires once, when the controller shuts down or this handle is closed.
    pub fn done(&self) -> &CancellationToken {
        &self.done
    }

    pub fn is_done(&self) -> bool {
        self.done.is_cancelled()
    }

    /// Queues a request built from `body`, stamped with this handle as its
    /// reply destination. Returns `false` if the request could not be queued.
    pub async fn send(&self, body: RequestBody, message: Option<Message>) -> bool {
        let Some(reply_tx) = self.reply_tx.upgrade() else {
            debug!(client = %self.id, "client detached; not sending");
            return false;
        };
        self.submit(Request {
            origin: RequestOrigin { message, reply_tx },
            body,
        })
        .await
    }

    /// Queues an already-built request.
    pub async fn submit(&self, request: Request) -> bool {
        tokio::select! {
            biased;
            _ = self.done.cancelled() => false,
            sent = self.tx.send(Envelope::Request(request)) => sent.is_ok(),
        }
    }

    /// Waits for the next response. Returns `None` once this handle is done
    /// or the controller has dropped it.
    pub async fn recv(&mut self) -> Option<Response> {
        tokio::select! {
            biased;
            _ = self.done.cancelled() => None,
            response = self.rx.recv() => response,
        }
    }

    /// Attaches a new, independent handle to the same controller.
    pub async fn copy(&self) -> Result<Client, ControllerError> {
        let (reply, attached) = oneshot::channel();
        tokio::select! {
            biased;
            _ = self.lifetime.cancelled() => return Err(ControllerError::ShutDown),
            sent = self.tx.send(Envelope::Attach { reply }) => {
                sent.map_err(|_| ControllerError::ShutDown)?;
            }
        }
        let attachment = tokio::select! {
            biased;
            _ = self.lifetime.cancelled() => return Err(ControllerError::ShutDown),
            attachment = attached => attachment.map_err(|_| ControllerError::ShutDown)?,
        };
        Ok(Client::from_attachment(
            attachment,
            self.tx.clone(),
            &self.lifetime,
        ))
    }

    /// Asks the controller to stop. Every handle's done signal fires.
    pub fn shutdown(&self) {
        self.lifetime.cancel();
    }

    /// A capability to stop the controller that does not subscribe to it.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            lifetime: self.lifetime.clone(),
        }
    }

    /// Detaches this handle without disturbing its siblings.
    pub fn close(self) {
        debug!(client = %self.id, "closing client");
    }
}

/// Stops a controller without holding a subscription to it.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    lifetime: CancellationToken,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.lifetime.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.lifetime.is_cancelled()
    }

    /// Resolves once the controller has been asked to stop.
    pub async fn wait(&self) {
        self.lifetime.cancelled().await;
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.done.cancel();
        if self.lifetime.is_cancelled() {
            return;
        }
        if self.tx.try_send(Envelope::Detach(self.id)).is_err() {
            debug!(client = %self.id, "could not queue detach; controller will notice the closed stream");
        }
    }
}

#[cfg(test)]
#[path = "tests/client_tests.rs"]
mod tests;
