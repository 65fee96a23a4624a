//! Last-sent component bytes per owned entity.

use crate::protocol::{ComponentFrame, NetworkId, WireId};
use std::collections::HashMap;

/// Remembers what was last broadcast so unchanged components are not
/// sent again.
#[derive(Debug, Default)]
pub struct ChangeCache {
    entries: HashMap<NetworkId, HashMap<WireId, Vec<u8>>>,
}

impl ChangeCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records frames as sent without diffing.
    pub fn seed(&mut self, id: NetworkId, frames: &[ComponentFrame]) {
        let entry = self.entries.entry(id).or_default();
        for frame in frames {
            entry.insert(frame.wire_id, frame.bytes.clone());
        }
    }

    /// Keeps only the frames whose bytes differ from the last sent value
    /// and records them as sent.
    pub fn changed(&mut self, id: NetworkId, frames: Vec<ComponentFrame>) -> Vec<ComponentFrame> {
        let entry = self.entries.entry(id).or_default();
        frames
            .into_iter()
            .filter(|frame| {
                if entry.get(&frame.wire_id) == Some(&frame.bytes) {
                    return false;
                }
                entry.insert(frame.wire_id, frame.bytes.clone());
                true
            })
            .collect()
    }

    /// Forgets everything sent for an id.
    pub fn clear(&mut self, id: NetworkId) {
        self.entries.remove(&id);
    }

    /// Cached bytes for one component.
    #[must_use]
    pub fn get(&self, id: NetworkId, wire_id: WireId) -> Option<&[u8]> {
        self.entries.get(&id)?.get(&wire_id).map(Vec::as_slice)
    }

    /// Number of ids with cached state.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
