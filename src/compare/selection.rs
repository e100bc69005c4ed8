//! Selection set - ordered, de-duplicated device identifiers
//!
//! Also owns the durable encoding of the set: a JSON array of id strings.
//! Older records stored an array of device objects (`[{"id": "..."}]`);
//! those still decode, but are always written back as plain strings.
//!
//! Ids are opaque and kept verbatim; only the empty string is rejected.
//! Trimming user input happens at the edges with [`normalize_id`].

use serde::Deserialize;
use thiserror::Error;

/// One entry of a stored record, in either of the accepted encodings
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Id(String),
    Legacy { id: String },
}

impl StoredEntry {
    fn into_id(self) -> String {
        match self {
            StoredEntry::Id(id) | StoredEntry::Legacy { id } => id,
        }
    }
}

/// Error returned by [`SelectionSet::decode`]
#[derive(Debug, Error)]
#[error("invalid compare record: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

/// Trim user input into an id, rejecting blank input
pub fn normalize_id(input: &str) -> Option<&str> {
    let id = input.trim();
    (!id.is_empty()).then_some(id)
}

/// Link to the comparison view for `ids`
pub fn compare_href(ids: &[String]) -> String {
    format!("/compare?ids={}", ids.join(","))
}

/// Ordered set of device identifiers selected for comparison
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    ids: Vec<String>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from raw ids, dropping empty and repeated ones
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for id in ids {
            set.add(id.as_ref());
        }
        set
    }

    /// Append `id` unless already present. Returns whether the set changed.
    pub fn add(&mut self, id: &str) -> bool {
        if id.is_empty() || self.contains(id) {
            return false;
        }
        self.ids.push(id.to_string());
        true
    }

    /// Remove `id` if present. Returns whether the set changed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.ids.len();
        self.ids.retain(|existing| existing != id);
        self.ids.len() != before
    }

    /// Flip membership of `id`. Returns whether `id` is selected afterwards.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.remove(id) {
            false
        } else {
            self.add(id)
        }
    }

    /// Empty the set. Returns whether the set changed.
    pub fn clear(&mut self) -> bool {
        let changed = !self.ids.is_empty();
        self.ids.clear();
        changed
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|existing| existing == id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.ids.clone()
    }

    /// Comma-joined ids, in insertion order, for the `ids` query parameter
    pub fn serialize(&self) -> String {
        self.ids.join(",")
    }

    /// Canonical durable encoding: JSON array of id strings
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.ids)
    }

    /// Decode a durable record in the canonical or the legacy object form
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        let entries: Vec<StoredEntry> = serde_json::from_str(raw)?;
        Ok(Self::from_ids(entries.into_iter().map(StoredEntry::into_id)))
    }
}
