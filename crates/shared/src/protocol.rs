//! Requests a list controller understands and the responses it emits.
//!
//! Adding a request kind means extending [`RequestBody`], teaching the
//! controller to apply it, and mapping it to and from wire messages.

use tokio::sync::mpsc;

use crate::{
    domain::{AutoMode, ItemHash, ListSnapshot, Selection},
    error::AckError,
    wire::Message,
};

/// Where a request came from.
#[derive(Debug, Clone)]
pub struct RequestOrigin {
    /// Wire message the request was parsed from, if any.
    pub message: Option<Message>,
    /// Channel for unicast responses to this request.
    pub reply_tx: mpsc::Sender<Response>,
}

#[derive(Debug, Clone)]
pub struct Request {
    pub origin: RequestOrigin,
    pub body: RequestBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// Full state dump, sent back to the requester only.
    Dump,
    /// Select the item at `index`, provided it still hashes to `hash`.
    SetSelect { index: usize, hash: ItemHash },
    /// Move the selection on.
    Next,
    SetAutoMode { auto_mode: AutoMode },
}

impl RequestBody {
    /// Short name used in acknowledgements and logs.
    pub fn name(&self) -> &'static str {
        match self {
            RequestBody::Dump => "dump",
            RequestBody::SetSelect { .. } => "sel",
            RequestBody::Next => "next",
            RequestBody::SetAutoMode { .. } => "automode",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    Ok { description: String },
    Error(AckError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    Ack(Ack),
    Dump(ListSnapshot),
    Select(Option<Selection>),
    AutoMode(AutoMode),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Whether this response went to every attached client.
    pub broadcast: bool,
    /// Wire message that prompted a unicast response.
    pub origin: Option<Message>,
    pub body: ResponseBody,
}

impl Response {
    pub fn broadcast(body: ResponseBody) -> Self {
        Self {
            broadcast: true,
            origin: None,
            body,
        }
    }

    pub fn unicast(origin: &RequestOrigin, body: ResponseBody) -> Self {
        Self {
            broadcast: false,
            origin: origin.message.clone(),
            body,
        }
    }

    pub fn ok(origin: &RequestOrigin, description: impl Into<String>) -> Self {
        Self::unicast(
            origin,
            ResponseBody::Ack(Ack::Ok {
                description: description.into(),
            }),
        )
    }

    pub fn error(origin: &RequestOrigin, error: AckError) -> Self {
        Self::unicast(origin, ResponseBody::Ack(Ack::Error(error)))
    }
}
