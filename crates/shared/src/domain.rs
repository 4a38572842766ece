use std::{fmt, str::FromStr};

use serde::Deserialize;
use thiserror::Error;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(ClientId);
id_newtype!(ConnectionId);

/// How the list moves on when the current item finishes or `next` is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoMode {
    /// Stay on the current item.
    #[default]
    Off,
    /// Advance, dropping the finished item from playout.
    Drop,
    /// Advance to the following item.
    Next,
    /// Jump to a random item.
    Shuffle,
}

impl AutoMode {
    pub const ALL: [AutoMode; 4] = [
        AutoMode::Off,
        AutoMode::Drop,
        AutoMode::Next,
        AutoMode::Shuffle,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AutoMode::Off => "off",
            AutoMode::Drop => "drop",
            AutoMode::Next => "next",
            AutoMode::Shuffle => "shuffle",
        }
    }
}

impl fmt::Display for AutoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown automode '{0}'")]
pub struct UnknownAutoMode(pub String);

impl FromStr for AutoMode {
    type Err = UnknownAutoMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AutoMode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownAutoMode(s.to_string()))
    }
}

/// Opaque fingerprint of a list item, used to guard selections against
/// stale views of the list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemHash(pub String);

impl ItemHash {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub hash: ItemHash,
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub index: usize,
    pub hash: ItemHash,
}

/// Full copy of the list state at one point in the controller's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSnapshot {
    pub auto_mode: AutoMode,
    pub items: Vec<Item>,
    pub selection: Option<Selection>,
}
