//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use att_core::{ReferenceZone, Secret, ZoneError};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Base32 shared secret for attendance codes.
    pub totp_secret: Option<String>,
    /// IANA name of the zone that defines calendar dates and lateness.
    pub timezone: String,
    /// Password required by `att export` when set.
    pub admin_password: Option<String>,
    /// Directory for CSV exports without an explicit output path.
    pub export_dir: PathBuf,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("totp_secret", &self.totp_secret.as_ref().map(|_| "[REDACTED]"))
            .field("timezone", &self.timezone)
            .field(
                "admin_password",
                &self.admin_password.as_ref().map(|_| "[REDACTED]"),
            )
            .field("export_dir", &self.export_dir)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("att.db"),
            totp_secret: None,
            timezone: att_core::zone::DEFAULT_ZONE.name().to_string(),
            admin_password: None,
            export_dir: data_dir.join("reports"),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(path) = default_config_file() {
            figment = figment.merge(Toml::file(path));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (ATT_*)
        figment = figment.merge(Env::prefixed("ATT_"));

        figment.extract()
    }

    /// Resolves the configured reference zone.
    pub fn zone(&self) -> Result<ReferenceZone, ZoneError> {
        ReferenceZone::from_name(&self.timezone)
    }

    /// Parses the configured secret, failing if none is set.
    pub fn secret(&self) -> anyhow::Result<Secret> {
        let encoded = self
            .totp_secret
            .as_deref()
            .context("no totp_secret configured. Run 'att init' or set ATT_TOTP_SECRET.")?;
        Secret::from_base32(encoded).context("invalid totp_secret")
    }
}

/// Returns the path of the config file read on every run.
pub fn default_config_file() -> Option<PathBuf> {
    dirs_config_path().map(|dir| dir.join("config.toml"))
}

/// Returns the platform-specific config directory for att.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("att"))
}

/// Returns the platform-specific data directory for att.
///
/// On Linux: `~/.local/share/att`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("att"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_data_path_ends_with_att() {
        let path = dirs_data_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "att");
    }

    #[test]
    fn test_default_config_uses_data_dir() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("att.db"));
        assert_eq!(config.export_dir, data_dir.join("reports"));
        assert_eq!(config.timezone, "Asia/Jakarta");
        assert!(config.totp_secret.is_none());
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
database_path = "/srv/att/att.db"
totp_secret = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ"
timezone = "Asia/Makassar"
"#,
        )
        .unwrap();

        let config = Config::load_from(Some(&path)).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/srv/att/att.db"));
        assert_eq!(config.zone().unwrap().to_string(), "Asia/Makassar");
        assert!(config.secret().is_ok());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = Config {
            totp_secret: Some("GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ".to_string()),
            admin_password: Some("hunter2".to_string()),
            ..Config::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("GEZDGNBV"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_missing_secret_is_an_error() {
        let err = Config::default().secret().unwrap_err();
        assert!(err.to_string().contains("att init"));
    }

    #[test]
    fn test_unknown_timezone_is_rejected() {
        let config = Config {
            timezone: "Mars/Olympus".to_string(),
            ..Config::default()
        };
        assert!(config.zone().is_err());
    }
}
