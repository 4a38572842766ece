use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::Rng;
use sha2::{Digest, Sha256};
use shared::domain::{AutoMode, Item, ItemHash, ListSnapshot, Selection};
use thiserror::Error;

const HASH_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectError {
    #[error("index {index} out of bounds for list of {len} item(s)")]
    OutOfBounds { index: usize, len: usize },
    #[error("item at index {index} no longer has hash {expected}")]
    HashMismatch { index: usize, expected: ItemHash },
}

/// The list state owned by a controller.
#[derive(Debug, Clone, Default)]
pub struct List {
    items: Vec<Item>,
    selection: Option<usize>,
    auto_mode: AutoMode,
}

impl List {
    /// Creates a list with its first item, if any, selected.
    pub fn new(items: Vec<Item>, auto_mode: AutoMode) -> Self {
        let selection = (!items.is_empty()).then_some(0);
        Self {
            items,
            selection,
            auto_mode,
        }
    }

    /// Builds a list from payloads, deriving each item's hash.
    pub fn from_payloads<I, S>(payloads: I, auto_mode: AutoMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items = payloads
            .into_iter()
            .enumerate()
            .map(|(position, payload)| {
                let payload = payload.into();
                Item {
                    hash: derive_hash(position, &payload),
                    payload,
                }
            })
            .collect();
        Self::new(items, auto_mode)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn auto_mode(&self) -> AutoMode {
        self.auto_mode
    }

    pub fn set_auto_mode(&mut self, auto_mode: AutoMode) {
        self.auto_mode = auto_mode;
    }

    pub fn selection(&self) -> Option<Selection> {
        let index = self.selection?;
        self.items.get(index).map(|item| Selection {
            index,
            hash: item.hash.clone(),
        })
    }

    /// Selects `index` if the item there still hashes to `hash`.
    pub fn select(&mut self, index: usize, hash: &ItemHash) -> Result<Selection, SelectError> {
        let item = self.items.get(index).ok_or(SelectError::OutOfBounds {
            index,
            len: self.items.len(),
        })?;
        if &item.hash != hash {
            return Err(SelectError::HashMismatch {
                index,
                expected: hash.clone(),
            });
        }
        self.selection = Some(index);
        Ok(Selection {
            index,
            hash: item.hash.clone(),
        })
    }

    /// Moves the selection on according to the automode, returning the
    /// resulting selection. At the end of the list nothing changes.
    pub fn next(&mut self) -> Option<Selection> {
        let len = self.items.len();
        if len == 0 {
            return None;
        }

        let target = match (self.auto_mode, self.selection) {
            (AutoMode::Shuffle, current) => Some(shuffle_target(current, len)),
            (_, None) => Some(0),
            (_, Some(current)) if current + 1 < len => Some(current + 1),
            (_, Some(_)) => None,
        };
        if let Some(index) = target {
            self.selection = Some(index);
        }
        self.selection()
    }

    pub fn snapshot(&self) -> ListSnapshot {
        ListSnapshot {
            auto_mode: self.auto_mode,
            items: self.items.clone(),
            selection: self.selection(),
        }
    }
}

fn shuffle_target(current: Option<usize>, len: usize) -> usize {
    let mut rng = rand::thread_rng();
    match current {
        Some(current) if len > 1 => {
            // Draw from the other len - 1 slots, skipping over the current one.
            let pick = rng.gen_range(0..len - 1);
            if pick >= current {
                pick + 1
            } else {
                pick
            }
        }
        _ => rng.gen_range(0..len),
    }
}

/// Fingerprints an item by its payload and position.
pub fn derive_hash(position: usize, payload: &str) -> ItemHash {
    let mut hasher = Sha256::new();
    hasher.update(position.to_be_bytes());
    hasher.update(payload.as_bytes());
    let mut encoded = URL_SAFE_NO_PAD.encode(hasher.finalize());
    encoded.truncate(HASH_LEN);
    ItemHash(encoded)
}

#[cfg(test)]
#[path = "tests/list_tests.rs"]
mod tests;
