//! Load sender config from file and environment.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use airlift_core::sender::SendConfig;

/// Sender configuration. File: ~/.config/airlift/tx.toml or
/// /etc/airlift/tx.toml. Env overrides: AIRLIFT_DEVICE, AIRLIFT_BAUD.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Serial device of the radio dongle (default /dev/ttyUSB0).
    #[serde(default = "default_device")]
    pub device: PathBuf,
    /// Serial baud rate (default 115200).
    #[serde(default = "default_baud")]
    pub baud: u32,
    /// Write attempts per frame (default 3).
    #[serde(default = "default_write_attempts")]
    pub write_attempts: u32,
    /// Backoff after a failed write, in milliseconds (default 500).
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Pause after every successful write, in milliseconds (default 100).
    #[serde(default = "default_write_pacing_ms")]
    pub write_pacing_ms: u64,
    /// Extra pause after each data frame, in milliseconds (default 200).
    #[serde(default = "default_data_pacing_ms")]
    pub data_pacing_ms: u64,
    /// Pause after the start frame, in milliseconds (default 500).
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Pause between files, in milliseconds (default 1000).
    #[serde(default = "default_inter_file_delay_ms")]
    pub inter_file_delay_ms: u64,
}

fn default_device() -> PathBuf {
    PathBuf::from("/dev/ttyUSB0")
}
fn default_baud() -> u32 {
    115_200
}
fn default_write_attempts() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    500
}
fn default_write_pacing_ms() -> u64 {
    100
}
fn default_data_pacing_ms() -> u64 {
    200
}
fn default_settle_delay_ms() -> u64 {
    500
}
fn default_inter_file_delay_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: default_device(),
            baud: default_baud(),
            write_attempts: default_write_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            write_pacing_ms: default_write_pacing_ms(),
            data_pacing_ms: default_data_pacing_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            inter_file_delay_ms: default_inter_file_delay_ms(),
        }
    }
}

impl Config {
    /// Protocol pacing knobs in the form the transmitter takes them.
    pub fn send_config(&self) -> SendConfig {
        SendConfig {
            write_attempts: self.write_attempts,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            write_pacing: Duration::from_millis(self.write_pacing_ms),
            data_pacing: Duration::from_millis(self.data_pacing_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            inter_file_delay: Duration::from_millis(self.inter_file_delay_ms),
        }
    }
}

/// Load config: default, then config file (if present), then env vars.
pub fn load() -> Config {
    let mut c = load_file().unwrap_or_default();
    if let Ok(s) = std::env::var("AIRLIFT_DEVICE") {
        c.device = PathBuf::from(s);
    }
    if let Ok(s) = std::env::var("AIRLIFT_BAUD") {
        if let Ok(b) = s.parse::<u32>() {
            c.baud = b;
        }
    }
    c
}

fn config_paths() -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        out.push(home.join(".config/airlift/tx.toml"));
    }
    out.push(PathBuf::from("/etc/airlift/tx.toml"));
    out
}

fn load_file() -> Option<Config> {
    for p in config_paths() {
        if p.exists() {
            if let Ok(s) = std::fs::read_to_string(&p) {
                if let Ok(c) = toml::from_str::<Config>(&s) {
                    return Some(c);
                }
            }
            break;
        }
    }
    None
}
