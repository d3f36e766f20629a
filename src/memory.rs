//! Bounded per-channel conversation memory.

use crate::config::MemoryConfig;
use crate::store::DocumentStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Document name under the data directory.
const DOCUMENT: &str = "memory.json";

/// One recorded utterance in a channel's memory window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryTurn {
    pub speaker: String,
    pub text: String,
}

/// Per-channel bounded log of conversation turns.
///
/// Each channel holds at most `max_turns` entries; the oldest are evicted
/// first. Every mutation is written through to disk before the call returns,
/// and the save happens under the same lock as the mutation, so concurrent
/// appends never lose updates to the shared document.
pub struct MemoryStore {
    turns: Mutex<HashMap<String, Vec<MemoryTurn>>>,
    store: DocumentStore,
    max_turns: usize,
}

impl MemoryStore {
    /// Load the memory document from disk. A missing or corrupt document
    /// starts the store empty.
    pub fn load(store: DocumentStore, config: MemoryConfig) -> Self {
        let turns: HashMap<String, Vec<MemoryTurn>> = store.load(DOCUMENT);
        let channels = turns.len();
        tracing::debug!(channels, "conversation memory loaded");
        Self {
            turns: Mutex::new(turns),
            store,
            max_turns: config.max_turns,
        }
    }

    /// Record one turn for a channel, evicting the oldest entries beyond the
    /// cap. Always succeeds; a failed persist is logged and the in-memory
    /// state stands until the next append retries the write.
    pub fn append(&self, channel_id: &str, speaker: &str, text: &str) {
        let mut turns = self.turns.lock().expect("memory lock poisoned");
        let channel = turns.entry(channel_id.to_string()).or_default();
        channel.push(MemoryTurn {
            speaker: speaker.to_string(),
            text: text.to_string(),
        });
        if channel.len() > self.max_turns {
            let excess = channel.len() - self.max_turns;
            channel.drain(..excess);
        }

        if let Err(error) = self.store.save(DOCUMENT, &*turns) {
            tracing::warn!(%error, channel_id, "failed to persist conversation memory");
        }
    }

    /// The current turn sequence for a channel, oldest first. Side-effect
    /// free; unknown channels yield an empty sequence.
    pub fn recent(&self, channel_id: &str) -> Vec<MemoryTurn> {
        self.turns
            .lock()
            .expect("memory lock poisoned")
            .get(channel_id)
            .cloned()
            .unwrap_or_default()
    }

    /// The configured per-channel cap.
    pub fn max_turns(&self) -> usize {
        self.max_turns
    }
}
