//! Load board config from /etc/zed/board.toml and environment.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use zed_core::protocol::{DEFAULT_CHUNK_SIZE, DEFAULT_CTRL_PORT};

use crate::led::DEFAULT_LED_GPIO;

const CONFIG_PATH: &str = "/etc/zed/board.toml";

/// Board configuration.
/// Env overrides: ZED_CTRL_PORT, ZED_LED_GPIO, ZED_IMAGE_PATH, ZED_CHUNK_SIZE, ZED_SEND_DELAY_US.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoardConfig {
    /// Control server UDP port (default 50000).
    #[serde(default = "default_ctrl_port")]
    pub ctrl_port: u16,
    /// GPIO number of the user LED (default 185).
    #[serde(default = "default_led_gpio")]
    pub led_gpio: u32,
    /// Image streamed on `Request_img` (default /usr/bin/image.jpg).
    #[serde(default = "default_image_path")]
    pub image_path: PathBuf,
    /// Payload bytes per datagram (default 1400).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Pause after each datagram (default 1000 us).
    #[serde(default = "default_send_delay_us")]
    pub send_delay_us: u64,
}

fn default_ctrl_port() -> u16 {
    DEFAULT_CTRL_PORT
}
fn default_led_gpio() -> u32 {
    DEFAULT_LED_GPIO
}
fn default_image_path() -> PathBuf {
    PathBuf::from("/usr/bin/image.jpg")
}
fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_send_delay_us() -> u64 {
    1000
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            ctrl_port: default_ctrl_port(),
            led_gpio: default_led_gpio(),
            image_path: default_image_path(),
            chunk_size: default_chunk_size(),
            send_delay_us: default_send_delay_us(),
        }
    }
}

impl BoardConfig {
    pub fn send_delay(&self) -> Duration {
        Duration::from_micros(self.send_delay_us)
    }
}

/// Load config: merge default, then config file (if present), then env vars.
pub fn load() -> BoardConfig {
    let mut c = load_file(Path::new(CONFIG_PATH)).unwrap_or_default();
    apply_env(&mut c, |name| std::env::var(name).ok());
    c
}

pub fn apply_env(c: &mut BoardConfig, lookup: impl Fn(&str) -> Option<String>) {
    fn set<T: FromStr>(slot: &mut T, value: Option<String>) {
        if let Some(v) = value.and_then(|s| s.parse::<T>().ok()) {
            *slot = v;
        }
    }
    set(&mut c.ctrl_port, lookup("ZED_CTRL_PORT"));
    set(&mut c.led_gpio, lookup("ZED_LED_GPIO"));
    set(&mut c.image_path, lookup("ZED_IMAGE_PATH"));
    set(&mut c.chunk_size, lookup("ZED_CHUNK_SIZE"));
    set(&mut c.send_delay_us, lookup("ZED_SEND_DELAY_US"));
}

fn load_file(path: &Path) -> Option<BoardConfig> {
    let text = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<BoardConfig>(&text) {
        Ok(c) => Some(c),
        Err(e) => {
            log::warn!("ignoring invalid config {}: {}", path.display(), e);
            None
        }
    }
}
