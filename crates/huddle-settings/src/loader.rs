//! Layered settings loading with figment.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized};
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::HuddleSettings;

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "HUDDLE_";

/// Resolve the default settings file (`~/.huddle/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".huddle").join("settings.json")
}

/// Load settings from the default path with env overrides.
pub fn load_settings() -> Result<HuddleSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from `path` with env overrides.
///
/// A missing file is skipped; a malformed one is an error.
pub fn load_settings_from_path(path: &Path) -> Result<HuddleSettings> {
    if path.exists() {
        debug!(?path, "loading settings from file");
    } else {
        debug!(?path, "settings file not found, using defaults");
    }

    let settings: HuddleSettings = figment(path).extract()?;
    validate(&settings)?;
    Ok(settings)
}

fn figment(path: &Path) -> Figment {
    Figment::from(Serialized::defaults(HuddleSettings::default()))
        .merge(Json::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

fn validate(settings: &HuddleSettings) -> Result<()> {
    if settings.server.max_connections == 0 {
        return Err(SettingsError::InvalidValue(
            "server.max_connections must be at least 1".into(),
        ));
    }
    if settings.server.send_queue_capacity == 0 {
        return Err(SettingsError::InvalidValue(
            "server.send_queue_capacity must be at least 1".into(),
        ));
    }
    if settings.server.heartbeat_interval_secs == 0 {
        return Err(SettingsError::InvalidValue(
            "server.heartbeat_interval_secs must be at least 1".into(),
        ));
    }
    if settings.server.heartbeat_timeout_secs < settings.server.heartbeat_interval_secs {
        return Err(SettingsError::InvalidValue(
            "server.heartbeat_timeout_secs must not be shorter than the interval".into(),
        ));
    }
    if settings.presence.max_nickname_chars == 0 {
        return Err(SettingsError::InvalidValue(
            "presence.max_nickname_chars must be at least 1".into(),
        ));
    }
    if settings.presence.send_timeout_ms == 0 {
        return Err(SettingsError::InvalidValue(
            "presence.send_timeout_ms must be at least 1".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;
    use crate::types::LogFormat;

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|jail| {
            let path = jail.directory().join("absent.json");
            let settings = load_settings_from_path(&path).unwrap();
            assert_eq!(settings, HuddleSettings::default());
            Ok(())
        });
    }

    #[test]
    fn file_overrides_defaults() {
        Jail::expect_with(|jail| {
            let _ = jail.create_file(
                "settings.json",
                r#"{"server":{"port":9100},"presence":{"report_errors":true}}"#,
            )?;
            let path = jail.directory().join("settings.json");
            let settings = load_settings_from_path(&path).unwrap();
            assert_eq!(settings.server.port, 9100);
            assert_eq!(settings.server.host, "127.0.0.1");
            assert!(settings.presence.report_errors);
            Ok(())
        });
    }

    #[test]
    fn env_overrides_file() {
        Jail::expect_with(|jail| {
            let _ = jail.create_file("settings.json", r#"{"server":{"port":9100}}"#)?;
            jail.set_env("HUDDLE_SERVER__PORT", 9200);
            jail.set_env("HUDDLE_LOGGING__FORMAT", "pretty");
            let path = jail.directory().join("settings.json");
            let settings = load_settings_from_path(&path).unwrap();
            assert_eq!(settings.server.port, 9200);
            assert_eq!(settings.logging.format, LogFormat::Pretty);
            Ok(())
        });
    }

    #[test]
    fn malformed_file_is_an_error() {
        Jail::expect_with(|jail| {
            let _ = jail.create_file("settings.json", "{not json")?;
            let path = jail.directory().join("settings.json");
            let err = load_settings_from_path(&path).unwrap_err();
            assert!(matches!(err, SettingsError::Load(_)));
            Ok(())
        });
    }

    #[test]
    fn zero_connections_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("HUDDLE_SERVER__MAX_CONNECTIONS", 0);
            let path = jail.directory().join("absent.json");
            let err = load_settings_from_path(&path).unwrap_err();
            assert!(matches!(err, SettingsError::InvalidValue(_)));
            Ok(())
        });
    }

    #[test]
    fn heartbeat_timeout_shorter_than_interval_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("HUDDLE_SERVER__HEARTBEAT_TIMEOUT_SECS", 5);
            let path = jail.directory().join("absent.json");
            assert!(load_settings_from_path(&path).is_err());
            Ok(())
        });
    }

    #[test]
    fn zero_heartbeat_interval_rejected() {
        Jail::expect_with(|jail| {
            let _ = jail.create_file(
                "settings.json",
                r#"{"server":{"heartbeat_interval_secs":0,"heartbeat_timeout_secs":0}}"#,
            )?;
            let path = jail.directory().join("settings.json");
            let err = load_settings_from_path(&path).unwrap_err();
            assert!(
                matches!(err, SettingsError::InvalidValue(ref msg) if msg.contains("heartbeat_interval_secs"))
            );
            Ok(())
        });
    }

    #[test]
    fn settings_path_under_home() {
        let path = settings_path();
        assert!(path.ends_with(".huddle/settings.json"));
    }
}
