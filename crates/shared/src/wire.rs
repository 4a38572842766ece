//! Line-oriented text messages.
//!
//! A line is a run of words separated by whitespace. Single quotes take their
//! contents literally, double quotes allow backslash escapes, and outside
//! single quotes a backslash escapes the next character. The first word of a
//! message is its tag, the second its command word, and the rest arguments.

use std::fmt;

use crate::error::WireError;

/// Tag carried by messages sent to every client.
pub const BROADCAST_TAG: &str = "!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub tag: String,
    pub word: String,
    pub args: Vec<String>,
}

impl Message {
    pub fn new(tag: impl Into<String>, word: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            word: word.into(),
            args: Vec::new(),
        }
    }

    pub fn broadcast(word: impl Into<String>) -> Self {
        Self::new(BROADCAST_TAG, word)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn is_broadcast(&self) -> bool {
        self.tag == BROADCAST_TAG
    }

    /// Parses one line, without its terminator, into a message.
    pub fn from_line(line: &str) -> Result<Self, WireError> {
        let words = tokenise(line)?;
        let count = words.len();
        let mut words = words.into_iter();
        match (words.next(), words.next()) {
            (Some(tag), Some(word)) => Ok(Self {
                tag,
                word,
                args: words.collect(),
            }),
            _ => Err(WireError::TooFewWords(count)),
        }
    }

    /// Renders the message as a line, without a terminator.
    pub fn pack(&self) -> String {
        let mut line = quote(&self.tag);
        line.push(' ');
        line.push_str(&quote(&self.word));
        for arg in &self.args {
            line.push(' ');
            line.push_str(&quote(arg));
        }
        line
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pack())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    None,
    Single,
    Double,
}

/// Splits a line into words.
pub fn tokenise(line: &str) -> Result<Vec<String>, WireError> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let mut words = Vec::new();
    let mut current = String::new();
    // Distinguishes `''` (an empty word) from no word at all.
    let mut in_word = false;
    let mut quote = QuoteState::None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (QuoteState::Single, '\'') => quote = QuoteState::None,
            (QuoteState::Single, c) => current.push(c),
            (QuoteState::Double, '"') => quote = QuoteState::None,
            (_, '\\') => {
                let escaped = chars.next().ok_or(WireError::TrailingBackslash)?;
                current.push(match (quote, escaped) {
                    (QuoteState::Double, 'n') => '\n',
                    (QuoteState::Double, 'r') => '\r',
                    (_, escaped) => escaped,
                });
                in_word = true;
            }
            (QuoteState::Double, c) => current.push(c),
            (QuoteState::None, '\'') => {
                quote = QuoteState::Single;
                in_word = true;
            }
            (QuoteState::None, '"') => {
                quote = QuoteState::Double;
                in_word = true;
            }
            (QuoteState::None, c) if c.is_ascii_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (QuoteState::None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }

    match quote {
        QuoteState::Single => return Err(WireError::UnterminatedQuote('\'')),
        QuoteState::Double => return Err(WireError::UnterminatedQuote('"')),
        QuoteState::None => {}
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

fn quote(word: &str) -> String {
    let needs_quotes = word.is_empty()
        || word
            .chars()
            .any(|c| c.is_ascii_whitespace() || matches!(c, '\'' | '"' | '\\'));
    if !needs_quotes {
        return word.to_string();
    }
    // Line terminators must never reach the stream raw.
    if !word.contains(&['\'', '\n', '\r'][..]) {
        return format!("'{word}'");
    }

    let mut quoted = String::with_capacity(word.len() + 2);
    quoted.push('"');
    for c in word.chars() {
        match c {
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '"' | '\\' => {
                quoted.push('\\');
                quoted.push(c);
            }
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
#[path = "tests/wire_tests.rs"]
mod tests;
