//! Configuration management
//!
//! Settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "atm": { "revealDynamicPin": false, "maxPinAttempts": null, "rngSeed": null, "sessionIdleSecs": 300 },
//!   "advisor": { "baseUrl": "...", "model": "...", "ttsModel": "...", "voice": "Kore", "timeoutSecs": 30 }
//! }
//! ```
//! Unknown fields are ignored, and an unreadable file falls back to defaults.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

/// Environment variable that forces the demo PIN reveal on or off
pub const REVEAL_PIN_ENV: &str = "GRIDPIN_REVEAL_PIN";

/// Environment variable holding the advice/speech API key
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Default advice/speech API base URL
pub const DEFAULT_ADVISOR_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-05-20";
const DEFAULT_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";
const DEFAULT_VOICE: &str = "Kore";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SESSION_IDLE_SECS: u64 = 300;

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    atm: AtmSettings,
    #[serde(default)]
    advisor: AdvisorSettingsFile,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AtmSettings {
    #[serde(default)]
    reveal_dynamic_pin: bool,
    #[serde(default)]
    max_pin_attempts: Option<u32>,
    #[serde(default)]
    rng_seed: Option<u64>,
    #[serde(default)]
    session_idle_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdvisorSettingsFile {
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    tts_model: Option<String>,
    #[serde(default)]
    voice: Option<String>,
    #[serde(default)]
    timeout_secs: Option<u64>,
    #[serde(default)]
    api_key: Option<String>,
}

/// Settings for the advice and speech backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvisorSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub tts_model: String,
    pub voice: String,
    pub timeout: Duration,
}

impl Default for AdvisorSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ADVISOR_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            tts_model: DEFAULT_TTS_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// GridPin configuration (simplified view of settings)
#[derive(Debug, Clone)]
pub struct Config {
    /// Return the dynamic PIN with the login challenge (demo only)
    pub reveal_dynamic_pin: bool,
    /// End the session after this many wrong PINs; `None` never locks out
    pub max_pin_attempts: Option<u32>,
    /// Seed for grids and decoy balances; `None` seeds from entropy
    pub rng_seed: Option<u64>,
    /// Drop sessions idle for this long; `0` in the file disables expiry
    pub session_idle_timeout: Option<Duration>,
    pub advisor: AdvisorSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reveal_dynamic_pin: false,
            max_pin_attempts: None,
            rng_seed: None,
            session_idle_timeout: Some(Duration::from_secs(DEFAULT_SESSION_IDLE_SECS)),
            advisor: AdvisorSettings::default(),
        }
    }
}

fn parse_bool_env(name: &str) -> Option<bool> {
    match std::env::var(name).ok().as_deref() {
        Some("true" | "1" | "yes" | "TRUE" | "YES") => Some(true),
        Some("false" | "0" | "no" | "FALSE" | "NO") => Some(false),
        _ => None,
    }
}

impl Config {
    /// Load config from the data directory
    ///
    /// `GRIDPIN_REVEAL_PIN` overrides the reveal flag and `GEMINI_API_KEY`
    /// supplies the API key when the file does not.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let settings_path = data_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content).unwrap_or_default()
        } else {
            SettingsFile::default()
        };

        let reveal_dynamic_pin =
            parse_bool_env(REVEAL_PIN_ENV).unwrap_or(raw.atm.reveal_dynamic_pin);

        let defaults = AdvisorSettings::default();
        let advisor = AdvisorSettings {
            base_url: raw.advisor.base_url.clone().unwrap_or(defaults.base_url),
            api_key: raw
                .advisor
                .api_key
                .clone()
                .or_else(|| std::env::var(API_KEY_ENV).ok())
                .filter(|k| !k.trim().is_empty()),
            model: raw.advisor.model.clone().unwrap_or(defaults.model),
            tts_model: raw.advisor.tts_model.clone().unwrap_or(defaults.tts_model),
            voice: raw.advisor.voice.clone().unwrap_or(defaults.voice),
            timeout: raw
                .advisor
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        };

        Ok(Self {
            reveal_dynamic_pin,
            max_pin_attempts: raw.atm.max_pin_attempts.filter(|n| *n > 0),
            rng_seed: raw.atm.rng_seed,
            session_idle_timeout: match raw.atm.session_idle_secs {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => Some(Duration::from_secs(DEFAULT_SESSION_IDLE_SECS)),
            },
            advisor,
        })
    }
}
