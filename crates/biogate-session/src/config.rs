//! Session configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, SessionError};

/// Text the session shows on its own account
///
/// Help and error text come from the biometric provider; these cover the
/// prompt title and the failed-match line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMessages {
    /// Shown when the prompt opens and restored after every retry delay
    pub title: String,
    /// Shown after a biometric was read but did not match
    pub try_again: String,
}

impl Default for SessionMessages {
    fn default() -> Self {
        Self {
            title: "Touch the fingerprint sensor".to_string(),
            try_again: "Not recognized, try again".to_string(),
        }
    }
}

/// Timing and text for an authentication session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long help/retry text stays before the title is restored (ms)
    pub retry_delay_ms: u64,

    /// How long a terminal message stays before the prompt closes (ms)
    pub exit_delay_ms: u64,

    /// Vibration length on help events (ms)
    pub haptic_ms: u64,

    /// Prompt text
    pub messages: SessionMessages,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: 1000,
            exit_delay_ms: 1000,
            haptic_ms: 200,
            messages: SessionMessages::default(),
        }
    }
}

impl SessionConfig {
    /// Short delays for tests
    pub fn testing() -> Self {
        Self {
            retry_delay_ms: 50,
            exit_delay_ms: 50,
            haptic_ms: 10,
            messages: SessionMessages::default(),
        }
    }

    /// Longer display times for users who read slowly
    pub fn patient() -> Self {
        Self {
            retry_delay_ms: 2500,
            exit_delay_ms: 3000,
            haptic_ms: 300,
            messages: SessionMessages::default(),
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn exit_delay(&self) -> Duration {
        Duration::from_millis(self.exit_delay_ms)
    }

    pub fn haptic_duration(&self) -> Duration {
        Duration::from_millis(self.haptic_ms)
    }

    /// Reject configurations that would make messages invisible
    pub fn validate(&self) -> Result<()> {
        if self.retry_delay_ms == 0 {
            return Err(SessionError::Config("retry_delay_ms must be non-zero".to_string()));
        }
        if self.exit_delay_ms == 0 {
            return Err(SessionError::Config("exit_delay_ms must be non-zero".to_string()));
        }
        if self.messages.title.trim().is_empty() {
            return Err(SessionError::Config("title must not be empty".to_string()));
        }
        Ok(())
    }

    /// Load configuration from file
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
