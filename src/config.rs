// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PATH: &str = "BIRDWATCH_CONFIG_PATH";
const ENV_EMAIL: &str = "BIRDWATCH_EMAIL";
const ENV_PASSWORD: &str = "BIRDWATCH_PASSWORD";

/// Default polling interval in minutes, bounded to a sane range. Lower
/// values give faster updates but increase API usage.
pub const DEFAULT_POLL_MINUTES: u64 = 10;
pub const MIN_POLL_MINUTES: u64 = 1;
pub const MAX_POLL_MINUTES: u64 = 20;

fn default_poll_minutes() -> u64 {
    DEFAULT_POLL_MINUTES
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_seen_path() -> PathBuf {
    PathBuf::from("state/seen_items.json")
}

/// One watched account. Several configs can coexist; each gets its own
/// watcher instance and seen-id file.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub email: String,
    pub password: String,
    /// Minutes between polls; clamped to 1..=20 on use.
    #[serde(default = "default_poll_minutes")]
    pub polling_interval: u64,
    /// Language hint passed through to the remote service.
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default = "default_seen_path")]
    pub seen_path: PathBuf,
}

impl AccountConfig {
    /// Effective poll interval with the configured minutes clamped into range.
    pub fn poll_interval(&self) -> Duration {
        let minutes = self.polling_interval.clamp(MIN_POLL_MINUTES, MAX_POLL_MINUTES);
        Duration::from_secs(minutes * 60)
    }

    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        parse_config(&content, ext.as_str())
    }

    /// Load using env var + fallbacks:
    /// 1) $BIRDWATCH_CONFIG_PATH
    /// 2) config/birdwatch.toml
    /// 3) config/birdwatch.json
    /// 4) credentials straight from $BIRDWATCH_EMAIL / $BIRDWATCH_PASSWORD
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            } else {
                return Err(anyhow!("BIRDWATCH_CONFIG_PATH points to non-existent path"));
            }
        }
        let toml_p = PathBuf::from("config/birdwatch.toml");
        if toml_p.exists() {
            return Self::load_from(&toml_p);
        }
        let json_p = PathBuf::from("config/birdwatch.json");
        if json_p.exists() {
            return Self::load_from(&json_p);
        }
        Self::from_env()
    }

    fn from_env() -> Result<Self> {
        let email = std::env::var(ENV_EMAIL).context("BIRDWATCH_EMAIL not set")?;
        let password = std::env::var(ENV_PASSWORD).context("BIRDWATCH_PASSWORD not set")?;
        Ok(Self {
            email,
            password,
            polling_interval: DEFAULT_POLL_MINUTES,
            locale: default_locale(),
            seen_path: default_seen_path(),
        })
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<AccountConfig> {
    if hint_ext == "json" {
        return serde_json::from_str(s).context("parsing JSON config");
    }
    // TOML first, JSON as fallback for extension-less files.
    match toml::from_str(s) {
        Ok(v) => Ok(v),
        Err(toml_err) => {
            serde_json::from_str(s).map_err(|_| anyhow!("unsupported config format: {toml_err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_is_clamped_into_range() {
        let mut cfg: AccountConfig =
            toml::from_str("email = \"a@b.c\"\npassword = \"x\"").unwrap();
        assert_eq!(cfg.polling_interval, DEFAULT_POLL_MINUTES);
        assert_eq!(cfg.poll_interval(), Duration::from_secs(600));

        cfg.polling_interval = 0;
        assert_eq!(cfg.poll_interval(), Duration::from_secs(60));
        cfg.polling_interval = 90;
        assert_eq!(cfg.poll_interval(), Duration::from_secs(20 * 60));
        cfg.polling_interval = 5;
        assert_eq!(cfg.poll_interval(), Duration::from_secs(300));
    }

    #[test]
    fn toml_and_json_formats_parse() {
        let toml_cfg = parse_config(
            "email = \"a@b.c\"\npassword = \"x\"\npolling_interval = 5\nlocale = \"de\"",
            "toml",
        )
        .unwrap();
        assert_eq!(toml_cfg.locale, "de");
        assert_eq!(toml_cfg.polling_interval, 5);

        let json_cfg = parse_config(
            r#"{ "email": "a@b.c", "password": "x", "seen_path": "/tmp/seen.json" }"#,
            "json",
        )
        .unwrap();
        assert_eq!(json_cfg.seen_path, PathBuf::from("/tmp/seen.json"));
        assert_eq!(json_cfg.locale, "en");
    }

    #[serial_test::serial]
    #[test]
    fn env_credentials_are_the_last_fallback() {
        let old = std::env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        std::env::set_current_dir(tmp.path()).unwrap();
        std::env::remove_var(ENV_PATH);

        std::env::remove_var(ENV_EMAIL);
        std::env::remove_var(ENV_PASSWORD);
        assert!(AccountConfig::load_default().is_err());

        std::env::set_var(ENV_EMAIL, "a@b.c");
        std::env::set_var(ENV_PASSWORD, "secret");
        let cfg = AccountConfig::load_default().unwrap();
        assert_eq!(cfg.email, "a@b.c");
        std::env::remove_var(ENV_EMAIL);
        std::env::remove_var(ENV_PASSWORD);

        std::env::set_current_dir(&old).unwrap();
    }
}
