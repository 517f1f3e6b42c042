use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub profile: ProfileSection,
    #[serde(default)]
    pub ocr: OcrSection,
    #[serde(default)]
    pub transcription: TranscriptionSection,
}

/// Who is running the CLI and which group new drafts land in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSection {
    pub user: String,
    pub group: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSection {
    /// Falls back to `MINDEE_API_KEY`.
    pub api_key: Option<String>,
    pub enqueue_url: String,
    /// Falls back to `MINDEE_RECEIPT_MODEL_ID`.
    pub receipt_model: Option<String>,
    /// Falls back to `MINDEE_MODEL_ID`.
    pub statement_model: Option<String>,
    pub poll_attempts: u32,
    pub poll_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSection {
    /// Falls back to `OPENAI_API_KEY`.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl Default for ProfileSection {
    fn default() -> Self {
        Self {
            user: "me".to_string(),
            group: "personal".to_string(),
        }
    }
}

impl Default for OcrSection {
    fn default() -> Self {
        Self {
            api_key: None,
            enqueue_url: "https://api-v2.mindee.net/v2/inferences/enqueue".to_string(),
            receipt_model: None,
            statement_model: None,
            poll_attempts: 10,
            poll_delay_ms: 1000,
        }
    }
}

impl Default for TranscriptionSection {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com".to_string(),
            model: "whisper-1".to_string(),
        }
    }
}

impl Config {
    /// Fill unset keys and model ids from the environment.
    pub fn with_env(mut self) -> Self {
        env_fallback(&mut self.ocr.api_key, "MINDEE_API_KEY");
        env_fallback(&mut self.ocr.receipt_model, "MINDEE_RECEIPT_MODEL_ID");
        env_fallback(&mut self.ocr.statement_model, "MINDEE_MODEL_ID");
        env_fallback(&mut self.transcription.api_key, "OPENAI_API_KEY");
        self
    }
}

fn env_fallback(slot: &mut Option<String>, var: &str) {
    if slot.as_deref().is_none_or(str::is_empty) {
        *slot = std::env::var(var).ok().filter(|v| !v.trim().is_empty());
    }
}

pub fn config_path(home: &Path) -> PathBuf {
    home.join("config.toml")
}

pub fn load_config(home: &Path) -> Result<Config> {
    let p = config_path(home);
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).context("parse config.toml")
}

pub fn save_config(home: &Path, cfg: &Config) -> Result<()> {
    let p = config_path(home);
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

/// Write the default config unless one exists. Returns the path and whether
/// it was written.
pub fn init_config(home: &Path) -> Result<(PathBuf, bool)> {
    let p = config_path(home);
    if p.exists() {
        return Ok((p, false));
    }
    save_config(home, &Config::default())?;
    Ok((p, true))
}
