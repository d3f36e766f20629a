//! Response gate: decides whether a message deserves a reply.

use crate::config::GateConfig;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

/// Tokens that always earn a response when they appear in a message.
pub const KEYWORDS: &[&str] = &["snark", "bot", "beep boop"];

/// Per-channel throttled decision function.
///
/// The decision itself is pure over (message, recorded clock state, random
/// roll); the roll is drawn by the caller so the logic stays independently
/// testable. Only `note_response` mutates state.
pub struct ResponseGate {
    config: GateConfig,
    last_response: Mutex<HashMap<String, Instant>>,
}

impl ResponseGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            last_response: Mutex::new(HashMap::new()),
        }
    }

    /// Should the bot reply to this message? `roll` must be in `[0, 1)`.
    ///
    /// Order: never answer automated accounts; always answer keyword hits and
    /// questions; otherwise chime with fixed probability on long-enough
    /// messages outside the per-channel cooldown.
    pub fn should_respond(
        &self,
        channel_id: &str,
        text: &str,
        author_is_bot: bool,
        roll: f64,
    ) -> bool {
        if author_is_bot {
            return false;
        }

        let lowered = text.to_lowercase();
        if KEYWORDS.iter().any(|keyword| lowered.contains(keyword)) {
            return true;
        }
        if text.contains('?') {
            return true;
        }

        if text.chars().count() < self.config.min_message_len {
            return false;
        }
        let cooled_down = self
            .last_response
            .lock()
            .expect("gate lock poisoned")
            .get(channel_id)
            .is_none_or(|last| last.elapsed() >= self.config.cooldown);

        cooled_down && roll < self.config.chime_chance
    }

    /// Record that a response was just sent in this channel.
    pub fn note_response(&self, channel_id: &str) {
        self.last_response
            .lock()
            .expect("gate lock poisoned")
            .insert(channel_id.to_string(), Instant::now());
    }
}
