//! Snarkbot: a persona-driven chat participant for Discord servers.
//!
//! It lurks in channels, decides when to speak, and answers in character via
//! a generative backend, with a bounded per-channel memory window, an
//! operator-curated reference document, and a house moderation convention:
//! users who earn a flag get a nickname from the catalogue, and keep it until
//! the operator grants amnesty.

pub mod aliases;
pub mod attachments;
pub mod config;
pub mod discord;
pub mod error;
pub mod gate;
pub mod llm;
pub mod manual;
pub mod memory;
pub mod moderation;
pub mod persona;
pub mod store;

pub use error::{Error, Result};

use std::sync::Arc;

/// Speaker label for the bot's own turns in channel memory.
pub const BOT_NAME: &str = "snark";

/// Shared dependency bundle threaded through the Discord handler.
///
/// All mutable state lives in these explicitly owned stores: loaded from disk
/// once at startup, flushed on every mutation, and mutated by no one else.
#[derive(Clone)]
pub struct BotDeps {
    pub config: Arc<config::Config>,
    pub memory: Arc<memory::MemoryStore>,
    pub aliases: Arc<aliases::AliasStore>,
    pub moderation: Arc<moderation::ModerationStore>,
    pub gate: Arc<gate::ResponseGate>,
    pub manual: Arc<manual::ManualLog>,
    pub llm: Arc<llm::GenerationClient>,
    pub composer: Arc<persona::PromptComposer>,
}

impl BotDeps {
    /// Wire up every store from a loaded configuration.
    pub fn init(config: config::Config) -> Result<Self> {
        let docs = store::DocumentStore::open(&config.data_dir)?;

        let memory = Arc::new(memory::MemoryStore::load(docs.clone(), config.memory));
        let aliases = Arc::new(aliases::AliasStore::load(docs.clone()));
        let moderation = Arc::new(moderation::ModerationStore::load(docs, config.moderation));
        let gate = Arc::new(gate::ResponseGate::new(config.gate));
        let manual = Arc::new(manual::ManualLog::load(config.manual_path.clone()));
        let llm = Arc::new(llm::GenerationClient::new(&config.llm));
        let composer = Arc::new(persona::PromptComposer::new(
            memory.clone(),
            manual.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            memory,
            aliases,
            moderation,
            gate,
            manual,
            llm,
            composer,
        })
    }
}
