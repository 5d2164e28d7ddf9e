//! Automation configuration.
//!
//! Everything that couples this crate to the chat site's markup or to the
//! local machine lives here, so the capture logic never hard-codes a selector.

use crate::error::{ChatError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How to locate an element on the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "query", rename_all = "lowercase")]
pub enum Selector {
    Css(String),
    XPath(String),
}

impl Selector {
    pub fn css(query: impl Into<String>) -> Self {
        Selector::Css(query.into())
    }

    pub fn xpath(query: impl Into<String>) -> Self {
        Selector::XPath(query.into())
    }

    pub fn query(&self) -> &str {
        match self {
            Selector::Css(q) | Selector::XPath(q) => q,
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::Css(q) => write!(f, "css `{}`", q),
            Selector::XPath(q) => write!(f, "xpath `{}`", q),
        }
    }
}

/// Selectors for the chat page elements the automation touches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    /// Every rendered message block, prompts and responses interleaved
    pub text_blocks: Selector,
    /// Entries of the conversation list in the sidebar
    pub conversation_entries: Selector,
    /// Title element inside one conversation entry (CSS, relative to the entry)
    pub conversation_title: String,
    pub prompt_input: Selector,
    /// Control that is only rendered while a response streams in
    pub stop_generating: Selector,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            text_blocks: Selector::css("div.text-base"),
            conversation_entries: Selector::xpath(r#"//li[contains(@class, "relative")]"#),
            conversation_title: "div.flex-1".to_string(),
            prompt_input: Selector::xpath(r#"//textarea[contains(@placeholder, "Send a message")]"#),
            stop_generating: Selector::xpath(r#"//button[contains(text(), "Stop generating")]"#),
        }
    }
}

/// Timing used by every polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    #[serde(rename = "poll_interval_ms", with = "duration_ms")]
    pub poll_interval: Duration,
    /// Gap between two reads that must agree before a response counts as final
    #[serde(rename = "stability_gap_ms", with = "duration_ms")]
    pub stability_gap: Duration,
    /// Pause between typing a prompt and submitting it
    #[serde(rename = "typing_pause_ms", with = "duration_ms")]
    pub typing_pause: Duration,
    /// Upper bound on waiting for a single response
    #[serde(rename = "deadline_ms", with = "duration_ms")]
    pub deadline: Duration,
    /// Pause after the operator says verification is not done yet
    #[serde(rename = "verification_retry_ms", with = "duration_ms")]
    pub verification_retry: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            stability_gap: Duration::from_secs(2),
            typing_pause: Duration::from_secs(1),
            deadline: Duration::from_secs(300),
            verification_retry: Duration::from_secs(5),
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Top-level configuration for a chat automation session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    pub chrome_path: String,
    pub url: String,
    /// Profile directory handed to the browser, kept between runs so logins persist
    pub user_data_dir: PathBuf,
    pub storage_dir: PathBuf,
    pub delimiter: String,
    pub selectors: Selectors,
    pub timing: PollSettings,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            chrome_path: "chromium".to_string(),
            url: "https://chat.openai.com".to_string(),
            user_data_dir: PathBuf::from("remote-profile"),
            storage_dir: PathBuf::from("conversations"),
            delimiter: "|^_^|".to_string(),
            selectors: Selectors::default(),
            timing: PollSettings::default(),
        }
    }
}

impl AutomationConfig {
    /// Load config from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| ChatError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Default config location under the user's config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("chat-webdriver").join("config.json"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.chrome_path.trim().is_empty() {
            return Err(ChatError::Config("chrome_path must not be empty".to_string()));
        }
        if self.delimiter.is_empty() {
            return Err(ChatError::Config("delimiter must not be empty".to_string()));
        }
        if self.timing.deadline.is_zero() {
            return Err(ChatError::Config("deadline_ms must be positive".to_string()));
        }
        Ok(())
    }
}
