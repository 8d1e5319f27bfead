//! Load receiver config from file and environment.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use airlift_core::receiver::RecvConfig;

/// Receiver configuration. File: ~/.config/airlift/rx.toml or
/// /etc/airlift/rx.toml. Env overrides: AIRLIFT_DEVICE, AIRLIFT_BAUD,
/// AIRLIFT_OUTPUT_DIR.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Serial device of the radio dongle. Auto-detected when absent.
    #[serde(default)]
    pub device: Option<PathBuf>,
    /// Serial baud rate (default 115200).
    #[serde(default = "default_baud")]
    pub baud: u32,
    /// Directory for reassembled files (default received_images).
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Sleep between empty polls, in milliseconds (default 100).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Idle span before a waiting notice, in seconds (default 10).
    #[serde(default = "default_idle_report_secs")]
    pub idle_report_secs: u64,
}

fn default_baud() -> u32 {
    115_200
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("received_images")
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_idle_report_secs() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: None,
            baud: default_baud(),
            output_dir: default_output_dir(),
            poll_interval_ms: default_poll_interval_ms(),
            idle_report_secs: default_idle_report_secs(),
        }
    }
}

impl Config {
    /// Protocol polling knobs in the form the reassembler takes them.
    pub fn recv_config(&self) -> RecvConfig {
        RecvConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            idle_report: Duration::from_secs(self.idle_report_secs),
        }
    }
}

/// Load config: default, then config file (if present), then env vars.
pub fn load() -> Config {
    let mut c = load_file().unwrap_or_default();
    if let Ok(s) = std::env::var("AIRLIFT_DEVICE") {
        c.device = Some(PathBuf::from(s));
    }
    if let Ok(s) = std::env::var("AIRLIFT_BAUD") {
        if let Ok(b) = s.parse::<u32>() {
            c.baud = b;
        }
    }
    if let Ok(s) = std::env::var("AIRLIFT_OUTPUT_DIR") {
        c.output_dir = PathBuf::from(s);
    }
    c
}

fn config_paths() -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        out.push(home.join(".config/airlift/rx.toml"));
    }
    out.push(PathBuf::from("/etc/airlift/rx.toml"));
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
