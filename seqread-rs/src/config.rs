//! Configuration management for seqread-rs.
//!
//! Loads config from a YAML file in one of the standard locations.
//! Every field has a default, so a partial (or missing) file is fine.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Largest datagram the daemon accepts.
pub const DEFAULT_MAX_DATAGRAM: usize = 4096;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SocketConfig {
    pub path: PathBuf,
    pub max_datagram_size: usize,
    pub mode: u32,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            path: default_socket_path(),
            max_datagram_size: DEFAULT_MAX_DATAGRAM,
            mode: 0o600,
        }
    }
}

fn default_socket_path() -> PathBuf {
    socket_path_in(dirs::runtime_dir())
}

/// `seqread.sock` under the runtime dir, or `/tmp` when there is none.
fn socket_path_in(runtime_dir: Option<PathBuf>) -> PathBuf {
    runtime_dir
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("seqread.sock")
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub command: PathBuf,
    pub args: Vec<String>,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            command: PathBuf::from("vvtts"),
            args: vec!["--stdout".into()],
        }
    }
}

/// Which playback program to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendPreference {
    /// Look for `aplay`, then sox `play`.
    #[default]
    Auto,
    Aplay,
    Sox,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub backend: BackendPreference,
    pub aplay_device: String,
    pub sox_device: String,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            backend: BackendPreference::Auto,
            aplay_device: "default".into(),
            sox_device: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub tick_ms: u64,
    /// Upper bound for each queue. `None` keeps them unbounded.
    pub max_pending: Option<usize>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1000,
            max_pending: None,
        }
    }
}

impl SchedulerConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub socket: SocketConfig,
    pub synthesis: SynthesisConfig,
    pub playback: PlaybackConfig,
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Load configuration from YAML file.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./config.yaml
    /// 2. ~/.config/seqread/config.yaml
    /// 3. /etc/seqread/config.yaml
    pub fn load(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("config.yaml")),
                dirs::config_dir().map(|c| c.join("seqread/config.yaml")),
                Some(PathBuf::from("/etc/seqread/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match Self::from_yaml(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    warn!("Failed to parse {}: {e}, using defaults", config_path.display());
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read {}: {e}, using defaults", config_path.display());
                Self::default()
            }
        }
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yml::Error> {
        serde_yml::from_str(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = Config::from_yaml(
            "playback:\n  backend: sox\n  sox_device: hw:1\nscheduler:\n  max_pending: 8\n",
        )
        .unwrap();

        assert_eq!(config.playback.backend, BackendPreference::Sox);
        assert_eq!(config.playback.sox_device, "hw:1");
        assert_eq!(config.playback.aplay_device, "default");
        assert_eq!(config.scheduler.max_pending, Some(8));
        assert_eq!(config.scheduler.tick_ms, 1000);
        assert_eq!(config.socket.max_datagram_size, DEFAULT_MAX_DATAGRAM);
        assert_eq!(config.synthesis.args, vec!["--stdout".to_string()]);
    }

    #[test]
    fn socket_falls_back_to_tmp_without_runtime_dir() {
        assert_eq!(socket_path_in(None), PathBuf::from("/tmp/seqread.sock"));
        assert_eq!(
            socket_path_in(Some(PathBuf::from("/run/user/1000"))),
            PathBuf::from("/run/user/1000/seqread.sock")
        );
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(Config::from_yaml("playback:\n  backend: pulse\n").is_err());
    }

    #[test]
    fn missing_explicit_path_falls_back_to_defaults() {
        let config = Config::load(Some(Path::new("/nonexistent/seqread/config.yaml")));
        assert_eq!(config.scheduler.tick(), Duration::from_secs(1));
    }
}
