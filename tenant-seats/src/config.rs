//! Service configuration.
//!
//! Invitation lifetime, token size and the public URL invitations link to.
//! Configuration is loaded from environment variables with defaults suitable
//! for local development.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// Membership service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamSeatConfig {
    /// Days an invitation token stays valid.
    pub invitation_ttl_days: i64,

    /// Base URL of the web app; accept links are built on top of it.
    pub accept_url_base: String,

    /// Random bytes per invitation token.
    pub token_bytes: usize,
}

impl Default for TeamSeatConfig {
    /// Returns default configuration suitable for local development.
    fn default() -> Self {
        Self {
            invitation_ttl_days: 7,
            accept_url_base: "http://localhost:3000".to_string(),
            token_bytes: 32,
        }
    }
}

impl TeamSeatConfig {
    /// Minimum accepted token entropy in bytes.
    pub const MIN_TOKEN_BYTES: usize = 16;

    /// Longest invitation lifetime in days.
    pub const MAX_INVITATION_TTL_DAYS: i64 = 365;

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `TEAM_INVITATION_TTL_DAYS`: Invitation lifetime in days (default: 7)
    /// - `TEAM_ACCEPT_URL_BASE`: Web app base URL (default: http://localhost:3000)
    /// - `TEAM_INVITATION_TOKEN_BYTES`: Random bytes per token (default: 32)
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            invitation_ttl_days: std::env::var("TEAM_INVITATION_TTL_DAYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.invitation_ttl_days),
            accept_url_base: std::env::var("TEAM_ACCEPT_URL_BASE").unwrap_or(default.accept_url_base),
            token_bytes: std::env::var("TEAM_INVITATION_TOKEN_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.token_bytes),
        }
    }

    /// Invitation lifetime as a Duration, `None` when out of range.
    pub fn invitation_ttl(&self) -> Option<Duration> {
        Duration::try_days(self.invitation_ttl_days)
    }

    /// Expiry of an invitation issued at `now`.
    pub fn invitation_expiry(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.invitation_ttl().and_then(|ttl| now.checked_add_signed(ttl))
    }

    /// Build the accept link for a raw invitation token.
    pub fn accept_url(&self, token: &str) -> String {
        let base = self.accept_url_base.trim_end_matches('/');
        format!("{}/invitations/accept?token={}", base, token)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.invitation_ttl_days <= 0 {
            return Err(ConfigError::InvalidValue {
                key: "TEAM_INVITATION_TTL_DAYS".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.invitation_ttl_days > Self::MAX_INVITATION_TTL_DAYS {
            return Err(ConfigError::InvalidValue {
                key: "TEAM_INVITATION_TTL_DAYS".to_string(),
                message: format!("must be at most {}", Self::MAX_INVITATION_TTL_DAYS),
            });
        }
        if self.token_bytes < Self::MIN_TOKEN_BYTES {
            return Err(ConfigError::InvalidValue {
                key: "TEAM_INVITATION_TOKEN_BYTES".to_string(),
                message: format!("must be at least {}", Self::MIN_TOKEN_BYTES),
            });
        }
        let base = self.accept_url_base.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                key: "TEAM_ACCEPT_URL_BASE".to_string(),
                message: "must be an http(s) URL".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TeamSeatConfig::default();
        assert_eq!(config.invitation_ttl(), Some(Duration::days(7)));
        assert_eq!(config.token_bytes, 32);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_accept_url_trailing_slash() {
        let config = TeamSeatConfig {
            accept_url_base: "https://app.example.com/".to_string(),
            ..TeamSeatConfig::default()
        };
        assert_eq!(
            config.accept_url("abc"),
            "https://app.example.com/invitations/accept?token=abc"
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = TeamSeatConfig::default();
        config.invitation_ttl_days = 0;
        assert!(config.validate().is_err());

        let mut config = TeamSeatConfig::default();
        config.invitation_ttl_days = TeamSeatConfig::MAX_INVITATION_TTL_DAYS;
        assert!(config.validate().is_ok());
        config.invitation_ttl_days = TeamSeatConfig::MAX_INVITATION_TTL_DAYS + 1;
        assert!(config.validate().is_err());
        config.invitation_ttl_days = 10_000_000_000;
        assert!(config.validate().is_err());

        let mut config = TeamSeatConfig::default();
        config.token_bytes = 8;
        assert!(config.validate().is_err());

        let mut config = TeamSeatConfig::default();
        config.accept_url_base = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invitation_expiry_out_of_range() {
        let now = Utc::now();
        let config = TeamSeatConfig::default();
        assert_eq!(config.invitation_expiry(now), Some(now + Duration::days(7)));

        let config = TeamSeatConfig {
            invitation_ttl_days: i64::MAX,
            ..TeamSeatConfig::default()
        };
        assert_eq!(config.invitation_ttl(), None);
        assert_eq!(config.invitation_expiry(now), None);

        let config = TeamSeatConfig {
            invitation_ttl_days: 10_000_000_000,
            ..TeamSeatConfig::default()
        };
        assert!(config.invitation_ttl().is_some());
        assert_eq!(config.invitation_expiry(now), None);
    }
}
