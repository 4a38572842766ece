//! Mapping between wire messages and controller requests/responses.

use shared::{
    domain::{AutoMode, ItemHash, ListSnapshot, Selection, UnknownAutoMode},
    error::AckError,
    protocol::{Ack, RequestBody, Response, ResponseBody},
    wire::{Message, BROADCAST_TAG},
};
use thiserror::Error;

pub const PROTOCOL_VERSION: &str = "bifrost-0.0.0";
pub const ROLE: &str = "list";

pub const RQ_DUMP: &str = "dump";
pub const RQ_SELECT: &str = "sel";
pub const RQ_NEXT: &str = "next";
pub const RQ_AUTO_MODE: &str = "automode";

pub const RS_ACK: &str = "ACK";
pub const RS_OHAI: &str = "OHAI";
pub const RS_IAMA: &str = "IAMA";
pub const RS_AUTO_MODE: &str = "AUTOMODE";
pub const RS_COUNT: &str = "COUNT";
pub const RS_ITEM: &str = "ITEM";
pub const RS_SELECT: &str = "SELECT";

const NO_INDEX: &str = "-1";
const NO_HASH: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown request word '{0}'")]
    UnknownWord(String),
    #[error("'{word}' takes {expected} argument(s), got {actual}")]
    BadArity {
        word: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("bad index '{0}'")]
    BadIndex(String),
    #[error(transparent)]
    BadAutoMode(#[from] UnknownAutoMode),
}

/// Interprets an inbound message as a request body.
pub fn parse_request(message: &Message) -> Result<RequestBody, ParseError> {
    let word = message.word.to_ascii_lowercase();
    let args = message.args.as_slice();
    match (word.as_str(), args) {
        (RQ_DUMP, []) => Ok(RequestBody::Dump),
        (RQ_SELECT, [index, hash]) => {
            let index = index
                .parse::<usize>()
                .map_err(|_| ParseError::BadIndex(index.clone()))?;
            Ok(RequestBody::SetSelect {
                index,
                hash: ItemHash::new(hash.as_str()),
            })
        }
        (RQ_NEXT, []) => Ok(RequestBody::Next),
        (RQ_AUTO_MODE, [mode]) => Ok(RequestBody::SetAutoMode {
            auto_mode: mode.parse()?,
        }),
        (RQ_DUMP, _) => Err(bad_arity(RQ_DUMP, 0, args)),
        (RQ_SELECT, _) => Err(bad_arity(RQ_SELECT, 2, args)),
        (RQ_NEXT, _) => Err(bad_arity(RQ_NEXT, 0, args)),
        (RQ_AUTO_MODE, _) => Err(bad_arity(RQ_AUTO_MODE, 1, args)),
        _ => Err(ParseError::UnknownWord(message.word.clone())),
    }
}

fn bad_arity(word: &'static str, expected: usize, args: &[String]) -> ParseError {
    ParseError::BadArity {
        word,
        expected,
        actual: args.len(),
    }
}

/// Reply sent straight back for a message that never reached the controller.
pub fn parse_error_reply(message: &Message, error: &ParseError) -> Message {
    ack(&message.tag, &Ack::Error(AckError::what(error.to_string())))
}

/// Messages announcing the server to a newly connected client.
pub fn greeting(server_version: &str) -> [Message; 2] {
    [
        Message::broadcast(RS_OHAI)
            .arg(PROTOCOL_VERSION)
            .arg(server_version),
        Message::broadcast(RS_IAMA).arg(ROLE),
    ]
}

/// Renders a response as one or more outbound messages.
pub fn emit_response(response: &Response) -> Vec<Message> {
    debug_assert!(
        response.broadcast || response.origin.is_some(),
        "unicast response has no originating message to answer"
    );
    let tag = match (&response.origin, response.broadcast) {
        (Some(origin), false) => origin.tag.as_str(),
        _ => BROADCAST_TAG,
    };

    match &response.body {
        ResponseBody::Ack(result) => vec![ack(tag, result)],
        ResponseBody::Dump(snapshot) => dump(tag, snapshot),
        ResponseBody::Select(selection) => vec![select(tag, selection.as_ref())],
        ResponseBody::AutoMode(auto_mode) => vec![auto_mode_message(tag, *auto_mode)],
    }
}

fn ack(tag: &str, result: &Ack) -> Message {
    let message = Message::new(tag, RS_ACK);
    match result {
        Ack::Ok { description } => message.arg("OK").arg(description.as_str()),
        Ack::Error(error) => message
            .arg(error.code.as_word())
            .arg(error.message.as_str()),
    }
}

fn dump(tag: &str, snapshot: &ListSnapshot) -> Vec<Message> {
    let mut messages = Vec::with_capacity(snapshot.items.len() + 3);
    messages.push(auto_mode_message(tag, snapshot.auto_mode));
    messages.push(Message::new(tag, RS_COUNT).arg(snapshot.items.len().to_string()));
    for (index, item) in snapshot.items.iter().enumerate() {
        messages.push(
            Message::new(tag, RS_ITEM)
                .arg(index.to_string())
                .arg(item.hash.as_str())
                .arg(item.payload.as_str()),
        );
    }
    messages.push(select(tag, snapshot.selection.as_ref()));
    messages
}

fn select(tag: &str, selection: Option<&Selection>) -> Message {
    let message = Message::new(tag, RS_SELECT);
    match selection {
        Some(selection) => message
            .arg(selection.index.to_string())
            .arg(selection.hash.as_str()),
        None => message.arg(NO_INDEX).arg(NO_HASH),
    }
}

fn auto_mode_message(tag: &str, auto_mode: AutoMode) -> Message {
    Message::new(tag, RS_AUTO_MODE).arg(auto_mode.as_str())
}

#[cfg(test)]
#[path = "tests/bifrost_tests.rs"]
mod tests;
