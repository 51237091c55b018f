//! Runtime settings.
//!
//! Everything is sourced from environment variables with sensible local
//! defaults, then optionally overridden by command-line flags at startup.
//! The completion service variables match the Cortensor router-node
//! conventions (`CORTENSOR_BASE_URL`, `CORTENSOR_API_KEY`,
//! `CORTENSOR_USE_SSE`).

use std::path::PathBuf;
use std::sync::RwLock;

use once_cell::sync::Lazy;

use crate::logger::{self, LogTag};

pub const TWEETS_FILE: &str = "tweets.json";
pub const TOKENS_FILE: &str = "ethereum_tokens.json";
pub const OUTPUT_FILE: &str = "ai_analyzer.json";

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5010";
const DEFAULT_API_KEY: &str = "default-dev-token";

/// Process-wide settings, loaded once at startup
#[derive(Debug, Clone)]
pub struct Settings {
    /// Completion service base URL
    pub base_url: String,
    /// Bearer token, sent when non-empty
    pub api_key: String,
    /// Use SSE streaming completions instead of synchronous ones
    pub use_sse: bool,
    /// Directory holding the input/output JSON files
    pub data_dir: PathBuf,
    /// Exit after the first pipeline pass instead of watching for feed updates
    pub run_once: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: DEFAULT_API_KEY.to_string(),
            use_sse: false,
            data_dir: PathBuf::from("."),
            run_once: false,
        }
    }
}

impl Settings {
    /// Load settings from environment variables, falling back to defaults
    pub fn load() -> Self {
        Self {
            base_url: std::env::var("CORTENSOR_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            api_key: std::env::var("CORTENSOR_API_KEY")
                .unwrap_or_else(|_| DEFAULT_API_KEY.to_string()),
            use_sse: std::env::var("CORTENSOR_USE_SSE")
                .map(|v| v == "true")
                .unwrap_or(false),
            data_dir: std::env::var("TRENDHOUND_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            run_once: false,
        }
    }

    pub fn tweets_file(&self) -> PathBuf {
        self.data_dir.join(TWEETS_FILE)
    }

    pub fn tokens_file(&self) -> PathBuf {
        self.data_dir.join(TOKENS_FILE)
    }

    pub fn output_file(&self) -> PathBuf {
        self.data_dir.join(OUTPUT_FILE)
    }
}

static SETTINGS: Lazy<RwLock<Settings>> = Lazy::new(|| RwLock::new(Settings::default()));

/// Install the loaded settings as the process-wide configuration
pub fn init(settings: Settings) {
    logger::info(
        LogTag::Config,
        &format!(
            "Settings loaded: base_url={} sse={} data_dir={}",
            settings.base_url,
            settings.use_sse,
            settings.data_dir.display()
        ),
    );

    match SETTINGS.write() {
        Ok(mut guard) => *guard = settings,
        Err(poisoned) => *poisoned.into_inner() = settings,
    }
}

/// Run a closure against the current settings
pub fn with_settings<T>(f: impl FnOnce(&Settings) -> T) -> T {
    match SETTINGS.read() {
        Ok(guard) => f(&guard),
        Err(poisoned) => f(&poisoned.into_inner()),
    }
}

/// Clone the current settings
pub fn current() -> Settings {
    with_settings(|s| s.clone())
}
