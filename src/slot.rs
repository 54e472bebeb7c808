//! Candidate slots, their deduplication identity, and the durable
//! seen-slot set.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A time-slot entry extracted from the rendered page.
///
/// Never mutated after creation; the store keeps a snapshot of the first
/// observation verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSlot {
    /// ISO 8601 calendar date the slot was observed for.
    pub date: String,
    /// Raw label as displayed, e.g. "18:00".
    pub text: String,
    /// Tag of the element the slot came from, or "calendar_cell" for the
    /// secondary grid scan.
    pub element_type: String,
    /// Raw class attribute of the source element. Historical records may
    /// omit it entirely.
    #[serde(default)]
    pub classes: String,
}

/// How an element reads once its class attribute has been inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Booked,
    Unknown,
}

/// Stable deduplication key: `date + "T" + text`.
///
/// Deliberately coarse: two courts rendering the identical date and label
/// collapse into one key. Also deliberately unnormalized (case and
/// whitespace significant), so a display-format change on the remote site
/// produces new keys instead of silently merging with stale data.
pub fn slot_key(slot: &CandidateSlot) -> String {
    format!("{}T{}", slot.date, slot.text)
}

/// One persisted observation. Append-only: once a key is stored it is
/// never overwritten or expired.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeenSlotRecord {
    pub slot: CandidateSlot,
    /// ISO 8601 timestamp of first observation. Kept as an opaque string
    /// so records written by earlier versions load unchanged.
    pub found_at: String,
}

/// The full persisted mapping from slot key to record.
///
/// The serialized shape is a compatibility contract with previously
/// persisted data:
/// `{"slots": {"<date>T<text>": {"slot": {...}, "found_at": "..."}}}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeenSlotSet {
    #[serde(default)]
    pub slots: HashMap<String, SeenSlotRecord>,
}

impl SeenSlotSet {
    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
