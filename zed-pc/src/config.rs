//! Load config from file and environment.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use zed_core::protocol::{DEFAULT_CTRL_PORT, DEFAULT_IMAGE_PORT};

/// PC host configuration. File: ~/.config/zed/pc.toml or /etc/zed/pc.toml.
/// Env overrides: ZED_BOARD_IP, ZED_CTRL_PORT, ZED_IMAGE_PORT, ZED_LISTEN_IP, ZED_OUTPUT,
/// ZED_POLL_TIMEOUT_MS, ZED_REQUEST_DEADLINE_MS, ZED_REPLY_TIMEOUT_MS.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Board address (default 192.168.1.50).
    #[serde(default = "default_board_ip")]
    pub board_ip: IpAddr,
    /// Board control port (default 50000).
    #[serde(default = "default_ctrl_port")]
    pub ctrl_port: u16,
    /// Local port images are received on (default 50001).
    #[serde(default = "default_image_port")]
    pub image_port: u16,
    /// Local interface to receive images on (default 0.0.0.0).
    #[serde(default = "default_listen_ip")]
    pub listen_ip: IpAddr,
    /// Where a reassembled image is written (default reconstructed.jpg).
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// Receive poll interval in listen mode (default 2000 ms).
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    /// Overall deadline for one image request (default 8000 ms).
    #[serde(default = "default_request_deadline_ms")]
    pub request_deadline_ms: u64,
    /// How long to wait for a control reply (default 2000 ms).
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,
}

fn default_board_ip() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(192, 168, 1, 50))
}
fn default_ctrl_port() -> u16 {
    DEFAULT_CTRL_PORT
}
fn default_image_port() -> u16 {
    DEFAULT_IMAGE_PORT
}
fn default_listen_ip() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}
fn default_output() -> PathBuf {
    PathBuf::from("reconstructed.jpg")
}
fn default_poll_timeout_ms() -> u64 {
    2000
}
fn default_request_deadline_ms() -> u64 {
    8000
}
fn default_reply_timeout_ms() -> u64 {
    2000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            board_ip: default_board_ip(),
            ctrl_port: default_ctrl_port(),
            image_port: default_image_port(),
            listen_ip: default_listen_ip(),
            output: default_output(),
            poll_timeout_ms: default_poll_timeout_ms(),
            request_deadline_ms: default_request_deadline_ms(),
            reply_timeout_ms: default_reply_timeout_ms(),
        }
    }
}

impl Config {
    pub fn board_ctrl_addr(&self) -> SocketAddr {
        SocketAddr::new(self.board_ip, self.ctrl_port)
    }

    pub fn image_listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_ip, self.image_port)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}

/// Load config: merge default, then config file (if present), then env vars.
pub fn load() -> Config {
    let mut c = load_file().unwrap_or_default();
    apply_env(&mut c, |name| std::env::var(name).ok());
    c
}

/// Apply overrides from `lookup`; values that fail to parse are ignored.
pub fn apply_env(c: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    fn set<T: FromStr>(slot: &mut T, value: Option<String>) {
        if let Some(v) = value.and_then(|s| s.parse::<T>().ok()) {
            *slot = v;
        }
    }
    set(&mut c.board_ip, lookup("ZED_BOARD_IP"));
    set(&mut c.ctrl_port, lookup("ZED_CTRL_PORT"));
    set(&mut c.image_port, lookup("ZED_IMAGE_PORT"));
    set(&mut c.listen_ip, lookup("ZED_LISTEN_IP"));
    set(&mut c.output, lookup("ZED_OUTPUT"));
    set(&mut c.poll_timeout_ms, lookup("ZED_POLL_TIMEOUT_MS"));
    set(&mut c.request_deadline_ms, lookup("ZED_REQUEST_DEADLINE_MS"));
    set(&mut c.reply_timeout_ms, lookup("ZED_REPLY_TIMEOUT_MS"));
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/zed/pc.toml"));
    }
    out.push(PathBuf::from("/etc/zed/pc.toml"));
    out
}

fn load_file() -> Option<Config> {
    let path = config_paths().into_iter().find(|p| p.exists())?;
    let text = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("cannot read {}: {}", path.display(), e);
            return None;
        }
    };
    match toml::from_str::<Config>(&text) {
        Ok(c) => {
            log::debug!("loaded config from {}", path.display());
            Some(c)
        }
        Err(e) => {
            log::warn!("ignoring invalid config {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_file_keeps_defaults() {
        let c: Config = toml::from_str("board_ip = \"10.0.0.7\"\nimage_port = 6000\n").unwrap();
        assert_eq!(c.board_ctrl_addr(), "10.0.0.7:50000".parse().unwrap());
        assert_eq!(c.image_listen_addr(), "0.0.0.0:6000".parse().unwrap());
        assert_eq!(c.request_deadline(), Duration::from_secs(8));
        assert_eq!(c.output, PathBuf::from("reconstructed.jpg"));
    }

    #[test]
    fn unknown_field_rejected() {
        assert!(toml::from_str::<Config>("board_port = 1\n").is_err());
    }

    #[test]
    fn env_overrides_and_bad_values_ignored() {
        let env: HashMap<&str, &str> = [
            ("ZED_CTRL_PORT", "51000"),
            ("ZED_OUTPUT", "/tmp/frame.jpg"),
            ("ZED_REPLY_TIMEOUT_MS", "soon"),
            ("ZED_BOARD_IP", "not-an-ip"),
        ]
        .into_iter()
        .collect();
        let mut c = Config::default();
        apply_env(&mut c, |k| env.get(k).map(|v| v.to_string()));
        assert_eq!(c.ctrl_port, 51000);
        assert_eq!(c.output, PathBuf::from("/tmp/frame.jpg"));
        assert_eq!(c.reply_timeout(), Duration::from_secs(2));
        assert_eq!(c.board_ip, default_board_ip());
    }
}
