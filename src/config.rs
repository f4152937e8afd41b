//! Launcher configuration.
//!
//! Fixed defaults for the bundled Dash server, optionally overlaid from a
//! JSON profile file (`FRETBOARD_PROFILE`) and environment overrides.

use serde::Deserialize;
use std::env;
use std::fs;
use std::time::Duration;

/// Entry script of the bundled Dash server, relative to the install location.
pub const APP_SCRIPT: &str = "server/fretboard_app.py";

const DEFAULT_PORT: u16 = 8050;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_GRACE_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, Default, Deserialize)]
struct LauncherProfile {
    port: Option<u16>,
    python_bin: Option<String>,
    poll_interval_ms: Option<u64>,
    grace_timeout_ms: Option<u64>,
    max_probe_attempts: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct LauncherConfig {
    /// Port the Dash server listens on (localhost only).
    pub port: u16,
    /// Interpreter used to start the server.
    pub python_bin: String,
    /// Delay between readiness probe attempts.
    pub poll_interval: Duration,
    /// How long to wait after the graceful signal before force-killing.
    pub grace_timeout: Duration,
    /// Probe attempt bound. `None` polls forever.
    pub max_probe_attempts: Option<u64>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            python_bin: default_python_bin().to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            grace_timeout: Duration::from_millis(DEFAULT_GRACE_TIMEOUT_MS),
            max_probe_attempts: None,
        }
    }
}

fn default_python_bin() -> &'static str {
    if cfg!(target_os = "windows") {
        "python"
    } else {
        "python3"
    }
}

fn load_profile(raw_path: &str) -> LauncherProfile {
    let path = raw_path.trim();
    if path.is_empty() {
        return LauncherProfile::default();
    }
    match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str::<LauncherProfile>(&raw).unwrap_or_default(),
        Err(_) => LauncherProfile::default(),
    }
}

impl LauncherConfig {
    /// Defaults, then profile file overlay, then environment overrides.
    pub fn load() -> Self {
        let mut config = Self::default();
        if let Ok(profile_path) = env::var("FRETBOARD_PROFILE") {
            config.apply_profile(load_profile(&profile_path));
        }
        if let Ok(python) = env::var("PYTHON_BIN") {
            let python = python.trim();
            if !python.is_empty() {
                config.python_bin = python.to_string();
            }
        }
        config
    }

    fn apply_profile(&mut self, profile: LauncherProfile) {
        if let Some(port) = profile.port {
            self.port = port;
        }
        if let Some(python) = profile.python_bin {
            if !python.trim().is_empty() {
                self.python_bin = python.trim().to_string();
            }
        }
        if let Some(ms) = profile.poll_interval_ms {
            self.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = profile.grace_timeout_ms {
            self.grace_timeout = Duration::from_millis(ms);
        }
        if profile.max_probe_attempts.is_some() {
            self.max_probe_attempts = profile.max_probe_attempts;
        }
    }

    /// Address loaded into the window once the server is ready.
    pub fn server_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Address polled by the readiness probe.
    pub fn health_url(&self) -> String {
        format!("http://127.0.0.1:{}/", self.port)
    }
}
