//! Server configuration
//!
//! Defaults match the protocol constants in `shared`. The binary builds a
//! [`ServerConfig`] from its command line; tests construct one directly and
//! usually shorten the liveness timings.

use crate::error::{Result, ServerError};
use crate::words::DEFAULT_WORDS;
use serde::Deserialize;
use shared::{DEFAULT_PORT, MAX_DATAGRAM_SIZE, MAX_PLAYERS, MIN_PLAYERS};
use std::path::Path;
use std::time::Duration;

/// Longest word that still fits a `GAMESTATE|DRAWING|<word>` datagram
pub const MAX_WORD_LEN: usize = MAX_DATAGRAM_SIZE - "GAMESTATE|DRAWING|".len();

/// Timing and threshold for the heartbeat challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LivenessConfig {
    /// Delay before the first sweep
    pub first_check: Duration,
    /// Time between sweeps after the first
    pub interval: Duration,
    /// Sweeps a player may leave unanswered before being evicted
    pub max_missed_checks: u32,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            first_check: Duration::from_secs(4),
            interval: Duration::from_secs(2),
            max_missed_checks: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_players: usize,
    /// Upper bound on how long the loop waits for a datagram before it
    /// looks at the liveness flag again
    pub poll_timeout: Duration,
    pub liveness: LivenessConfig,
    pub words: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            max_players: MAX_PLAYERS,
            poll_timeout: Duration::from_millis(100),
            liveness: LivenessConfig::default(),
            words: DEFAULT_WORDS.iter().map(|w| w.to_string()).collect(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_players < MIN_PLAYERS {
            return Err(ServerError::InvalidConfig(format!(
                "max players must be at least {}",
                MIN_PLAYERS
            )));
        }
        if self.poll_timeout.is_zero() {
            return Err(ServerError::InvalidConfig(
                "poll timeout must be non-zero".to_string(),
            ));
        }
        if self.liveness.interval.is_zero() {
            return Err(ServerError::InvalidConfig(
                "liveness interval must be non-zero".to_string(),
            ));
        }
        if self.words.is_empty() {
            return Err(ServerError::EmptyWordCatalog);
        }
        if let Some(word) = self.words.iter().find(|w| w.len() > MAX_WORD_LEN) {
            return Err(ServerError::InvalidConfig(format!(
                "word {:?} is longer than {} bytes",
                word, MAX_WORD_LEN
            )));
        }
        Ok(())
    }
}

/// Word list file, e.g. `{"words": ["apple", "tree"]}`
#[derive(Debug, Deserialize)]
pub struct WordCatalog {
    pub words: Vec<String>,
}

impl WordCatalog {
    pub fn from_json(json: &str) -> Result<Self> {
        let catalog: WordCatalog = serde_json::from_str(json)?;
        let words: Vec<String> = catalog
            .words
            .into_iter()
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();

        if words.is_empty() {
            return Err(ServerError::EmptyWordCatalog);
        }

        Ok(WordCatalog { words })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.port, 50505);
        assert_eq!(config.max_players, 11);
        assert_eq!(config.poll_timeout, Duration::from_millis(100));
        assert_eq!(config.liveness.first_check, Duration::from_secs(4));
        assert_eq!(config.liveness.interval, Duration::from_secs(2));
        assert_eq!(config.liveness.max_missed_checks, 4);
        assert_eq!(config.words.len(), 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bind_addr() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 6000,
            ..ServerConfig::default()
        };
        assert_eq!(config.bind_addr(), "127.0.0.1:6000");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let too_small = ServerConfig {
            max_players: 1,
            ..ServerConfig::default()
        };
        assert!(matches!(
            too_small.validate(),
            Err(ServerError::InvalidConfig(_))
        ));

        let no_words = ServerConfig {
            words: Vec::new(),
            ..ServerConfig::default()
        };
        assert!(matches!(
            no_words.validate(),
            Err(ServerError::EmptyWordCatalog)
        ));

        let mut no_interval = ServerConfig::default();
        no_interval.liveness.interval = Duration::ZERO;
        assert!(no_interval.validate().is_err());

        let long_word = ServerConfig {
            words: vec!["a".repeat(MAX_WORD_LEN + 1)],
            ..ServerConfig::default()
        };
        assert!(matches!(
            long_word.validate(),
            Err(ServerError::InvalidConfig(_))
        ));

        let longest_word = ServerConfig {
            words: vec!["a".repeat(MAX_WORD_LEN)],
            ..ServerConfig::default()
        };
        assert!(longest_word.validate().is_ok());
    }

    #[test]
    fn test_word_catalog_from_json() {
        let catalog = WordCatalog::from_json(r#"{"words": [" boat ", "", "kite"]}"#).unwrap();
        assert_eq!(catalog.words, vec!["boat".to_string(), "kite".to_string()]);
    }

    #[test]
    fn test_word_catalog_errors() {
        assert!(matches!(
            WordCatalog::from_json(r#"{"words": []}"#),
            Err(ServerError::EmptyWordCatalog)
        ));
        assert!(matches!(
            WordCatalog::from_json("not json"),
            Err(ServerError::WordCatalog(_))
        ));
    }
}
