//! Configuration loading and validation.

use crate::error::{ConfigError, Result};
use anyhow::Context as _;
use std::path::PathBuf;
use std::time::Duration;

/// Snarkbot configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Data directory path. Persisted documents live here.
    pub data_dir: PathBuf,

    /// Discord bot token.
    pub discord_token: String,

    /// Generation backend configuration.
    pub llm: LlmConfig,

    /// Conversation memory settings.
    pub memory: MemoryConfig,

    /// Moderation trigger settings.
    pub moderation: ModerationConfig,

    /// Response gate settings.
    pub gate: GateConfig,

    /// Privileged operator user id. Callsign, amnesty, and manual-log
    /// commands are refused for everyone else. None disables them entirely.
    pub operator_id: Option<u64>,

    /// Location of the manual log (operator reference document).
    pub manual_path: PathBuf,
}

/// Generation backend configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Gemini API key.
    pub api_key: String,

    /// Model identifier, e.g. `gemini-2.0-flash`.
    pub model: String,
}

/// Conversation memory settings.
#[derive(Debug, Clone, Copy)]
pub struct MemoryConfig {
    /// Hard cap on turns retained per channel.
    pub max_turns: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { max_turns: 14 }
    }
}

/// Moderation trigger settings.
#[derive(Debug, Clone, Copy)]
pub struct ModerationConfig {
    /// Probability of flagging a qualifying message with no explicit trigger.
    pub flag_chance: f64,

    /// Minimum message length for the random trigger to apply.
    pub min_message_len: usize,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            flag_chance: 0.05,
            min_message_len: 20,
        }
    }
}

/// Response gate settings.
#[derive(Debug, Clone, Copy)]
pub struct GateConfig {
    /// Probability of chiming in on an otherwise unremarkable message.
    pub chime_chance: f64,

    /// Minimum message length for a random chime.
    pub min_message_len: usize,

    /// Minimum interval between responses in one channel.
    pub cooldown: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            chime_chance: 0.15,
            min_message_len: 20,
            cooldown: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self> {
        let data_dir = match std::env::var("SNARKBOT_DATA_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => dirs::data_dir()
                .map(|d| d.join("snarkbot"))
                .unwrap_or_else(|| PathBuf::from("./data")),
        };

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

        let discord_token =
            std::env::var("DISCORD_TOKEN").map_err(|_| ConfigError::MissingKey("DISCORD_TOKEN"))?;

        let llm = LlmConfig {
            api_key: std::env::var("GEMINI_API_KEY")
                .map_err(|_| ConfigError::MissingKey("GEMINI_API_KEY"))?,
            model: std::env::var("SNARKBOT_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".into()),
        };

        let memory = MemoryConfig {
            max_turns: env_parse("SNARKBOT_MAX_MEMORY", MemoryConfig::default().max_turns)?,
        };

        let moderation = ModerationConfig {
            flag_chance: env_parse(
                "SNARKBOT_FLAG_CHANCE",
                ModerationConfig::default().flag_chance,
            )?,
            ..ModerationConfig::default()
        };

        let gate = GateConfig {
            chime_chance: env_parse("SNARKBOT_CHIME_CHANCE", GateConfig::default().chime_chance)?,
            ..GateConfig::default()
        };

        let operator_id = match std::env::var("SNARKBOT_OPERATOR_ID") {
            Ok(raw) => Some(raw.parse().map_err(|_| ConfigError::Invalid {
                key: "SNARKBOT_OPERATOR_ID",
                value: raw,
            })?),
            Err(_) => None,
        };

        let manual_path = std::env::var("SNARKBOT_MANUAL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("manual.txt"));

        Ok(Self {
            data_dir,
            discord_token,
            llm,
            memory,
            moderation,
            gate,
            operator_id,
            manual_path,
        })
    }
}

/// Parse an env var, falling back to a default when unset.
fn env_parse<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }.into()),
        Err(_) => Ok(default),
    }
}
