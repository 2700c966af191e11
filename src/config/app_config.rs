use chrono::Duration;
use serde::Deserialize;

use crate::domain::DomainError;

/// Longest OTP the generator will be configured for
pub const MAX_OTP_LENGTH: usize = 12;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub otp: OtpConfig,
    pub password: PasswordConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// One-time password settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OtpConfig {
    /// Digits per code
    pub length: usize,
    /// Seconds a code stays valid after issuance
    pub ttl_seconds: i64,
}

/// Argon2id costs for newly hashed passwords
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

/// User storage backend selection
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `memory` or `postgres`
    pub backend: String,
    pub database_url: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            length: 6,
            ttl_seconds: 300,
        }
    }
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

impl OtpConfig {
    /// Code length, checked against `1..=MAX_OTP_LENGTH`
    pub fn checked_length(&self) -> Result<usize, DomainError> {
        if (1..=MAX_OTP_LENGTH).contains(&self.length) {
            Ok(self.length)
        } else {
            Err(DomainError::configuration(format!(
                "otp.length must be between 1 and {}, got {}",
                MAX_OTP_LENGTH, self.length
            )))
        }
    }

    /// Code lifetime; must be positive and representable as a `Duration`
    pub fn ttl(&self) -> Result<Duration, DomainError> {
        Duration::try_seconds(self.ttl_seconds)
            .filter(|ttl| *ttl > Duration::zero())
            .ok_or_else(|| {
                DomainError::configuration(format!(
                    "otp.ttl_seconds must be a positive number of seconds, got {}",
                    self.ttl_seconds
                ))
            })
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            database_url: None,
        }
    }
}

impl AppConfig {
    /// Load `config/default`, `config/local`, then `APP__*` environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.otp.length, 6);
        assert_eq!(config.otp.ttl_seconds, 300);
        assert_eq!(config.password.memory_kib, 19 * 1024);
        assert_eq!(config.storage.backend, "memory");
        assert!(config.storage.database_url.is_none());
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                "[otp]\nttl_seconds = 60\n\n[logging]\nformat = \"json\"\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.otp.ttl_seconds, 60);
        assert_eq!(config.otp.length, 6);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.storage.backend, "memory");
    }

    #[test]
    fn test_otp_ttl() {
        let config = OtpConfig::default();
        assert_eq!(config.ttl().unwrap(), Duration::seconds(300));
    }

    #[test]
    fn test_otp_ttl_out_of_range() {
        for ttl_seconds in [i64::MAX, i64::MIN, 0, -5] {
            let config = OtpConfig {
                ttl_seconds,
                ..Default::default()
            };

            let err = config.ttl().unwrap_err();
            assert!(matches!(err, DomainError::Configuration { .. }), "{ttl_seconds}");
        }
    }

    #[test]
    fn test_otp_length_bounds() {
        let length = |length| OtpConfig {
            length,
            ..Default::default()
        };

        assert_eq!(length(1).checked_length().unwrap(), 1);
        assert_eq!(length(MAX_OTP_LENGTH).checked_length().unwrap(), MAX_OTP_LENGTH);
        assert!(length(0).checked_length().is_err());
        assert!(length(MAX_OTP_LENGTH + 1).checked_length().is_err());
        assert!(length(usize::MAX).checked_length().is_err());
    }

    #[test]
    fn test_oversized_ttl_in_config_file() {
        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                "[otp]\nttl_seconds = 9223372036854775807\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert!(config.otp.ttl().is_err());
    }
}
