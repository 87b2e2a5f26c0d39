//! Load config from file and environment.

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Daemon configuration. File: ~/.config/duet/config.toml or /etc/duet/config.toml.
/// Env overrides: DUET_RELAY_ADDR, DUET_DISPLAY_NAME, DUET_VIDEO_DEVICE, DUET_LOG.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Signaling relay TCP address (default 127.0.0.1:45680).
    #[serde(default = "default_relay_addr")]
    pub relay_addr: String,
    /// Name shown to invitees.
    #[serde(default = "default_display_name")]
    pub display_name: String,
    #[serde(default = "default_video_device")]
    pub video_device: PathBuf,
    #[serde(default = "default_stun_servers")]
    pub stun_servers: Vec<String>,
    /// Upper bound on ICE gathering before the signal is sent anyway.
    #[serde(default = "default_ice_gather_timeout_ms")]
    pub ice_gather_timeout_ms: u64,
    /// tracing filter used when RUST_LOG is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_relay_addr() -> String {
    "127.0.0.1:45680".to_owned()
}
fn default_display_name() -> String {
    std::env::var("USER").unwrap_or_else(|_| "duet".to_owned())
}
fn default_video_device() -> PathBuf {
    PathBuf::from("/dev/video0")
}
fn default_stun_servers() -> Vec<String> {
    vec!["stun:stun.l.google.com:19302".to_owned()]
}
fn default_ice_gather_timeout_ms() -> u64 {
    2500
}
fn default_log_level() -> String {
    "info".to_owned()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            relay_addr: default_relay_addr(),
            display_name: default_display_name(),
            video_device: default_video_device(),
            stun_servers: default_stun_servers(),
            ice_gather_timeout_ms: default_ice_gather_timeout_ms(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("invalid config")
    }

    /// Apply env-style overrides. `lookup` is `std::env::var` outside tests.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("DUET_RELAY_ADDR") {
            self.relay_addr = v;
        }
        if let Some(v) = lookup("DUET_DISPLAY_NAME") {
            if !v.trim().is_empty() {
                self.display_name = v;
            }
        }
        if let Some(v) = lookup("DUET_VIDEO_DEVICE") {
            self.video_device = PathBuf::from(v);
        }
        if let Some(v) = lookup("DUET_LOG") {
            self.log_level = v;
        }
    }
}

/// Load config: default, then the first config file found, then env vars.
/// A config file that exists but does not parse is an error.
pub fn load() -> anyhow::Result<Config> {
    let mut c = match config_paths().iter().find(|p| p.exists()) {
        Some(p) => load_file(p)?,
        None => Config::default(),
    };
    c.apply_env(|k| std::env::var(k).ok());
    Ok(c)
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/duet/config.toml"));
    }
    out.push(PathBuf::from("/etc/duet/config.toml"));
    out
}

fn load_file(path: &Path) -> anyhow::Result<Config> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    Config::from_toml(&s).with_context(|| format!("in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let c = Config::from_toml("").unwrap();
        assert_eq!(c.relay_addr, "127.0.0.1:45680");
        assert_eq!(c.video_device, PathBuf::from("/dev/video0"));
        assert_eq!(c.ice_gather_timeout_ms, 2500);
        assert_eq!(c.stun_servers.len(), 1);
    }

    #[test]
    fn file_fields_override_defaults() {
        let c = Config::from_toml(
            r#"
relay_addr = "10.0.0.2:9000"
display_name = "Ann"
stun_servers = []
ice_gather_timeout_ms = 500
"#,
        )
        .unwrap();
        assert_eq!(c.relay_addr, "10.0.0.2:9000");
        assert_eq!(c.display_name, "Ann");
        assert!(c.stun_servers.is_empty());
        assert_eq!(c.ice_gather_timeout_ms, 500);
        assert_eq!(c.log_level, "info");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(Config::from_toml("proxy_port = 3128").is_err());
    }

    #[test]
    fn env_overrides_file() {
        let mut c = Config::from_toml(r#"relay_addr = "10.0.0.2:9000""#).unwrap();
        c.apply_env(|k| match k {
            "DUET_RELAY_ADDR" => Some("relay.local:45680".to_owned()),
            "DUET_VIDEO_DEVICE" => Some("/dev/video2".to_owned()),
            "DUET_DISPLAY_NAME" => Some("  ".to_owned()),
            "DUET_LOG" => Some("duet_core=debug".to_owned()),
            _ => None,
        });
        assert_eq!(c.relay_addr, "relay.local:45680");
        assert_eq!(c.video_device, PathBuf::from("/dev/video2"));
        assert_eq!(c.display_name, Config::from_toml("").unwrap().display_name);
        assert_eq!(c.log_level, "duet_core=debug");
    }
}
