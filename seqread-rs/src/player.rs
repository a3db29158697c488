//! Audio playback through `aplay` or sox `play`.
//!
//! The backend is chosen once at startup. Audio bytes are piped to the
//! player's stdin; the player's exit status is the only result.

use std::env;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::process::Command;
use tracing::{debug, info};

use crate::config::{BackendPreference, PlaybackConfig};
use crate::error::{Result, SeqreadError};
use crate::process::{describe_failure, run_with_stdin};
use crate::stage::{AudioBuffer, Play, StageFuture};

/// A resolved playback program plus its device selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackBackend {
    /// `aplay -D <device>`
    Aplay { program: PathBuf, device: String },
    /// `play -` with the device passed via `AUDIODEV`
    Sox { program: PathBuf, device: String },
}

impl PlaybackBackend {
    /// Pick a backend according to `config`, probing `PATH`.
    pub fn select(config: &PlaybackConfig) -> Result<Self> {
        let path = env::var_os("PATH").unwrap_or_default();
        Self::select_in(config, &path)
    }

    /// Same as [`select`](Self::select) with an explicit search path.
    pub fn select_in(config: &PlaybackConfig, search_path: &std::ffi::OsStr) -> Result<Self> {
        let aplay = || {
            find_executable("aplay", search_path).map(|program| PlaybackBackend::Aplay {
                program,
                device: config.aplay_device.clone(),
            })
        };
        let sox = || {
            find_executable("play", search_path).map(|program| PlaybackBackend::Sox {
                program,
                device: config.sox_device.clone(),
            })
        };

        let backend = match config.backend {
            BackendPreference::Aplay => aplay().ok_or_else(|| {
                SeqreadError::Configuration("playback command \"aplay\" not found".into())
            })?,
            BackendPreference::Sox => sox().ok_or_else(|| {
                SeqreadError::Configuration("playback command \"play\" (sox) not found".into())
            })?,
            BackendPreference::Auto => {
                debug!("Probing for a playback command");
                aplay().or_else(sox).ok_or_else(|| {
                    SeqreadError::Configuration(
                        "neither \"aplay\" nor \"play\" (sox) found; cannot play audio".into(),
                    )
                })?
            }
        };

        info!("Playback backend: {}", backend.describe());
        Ok(backend)
    }

    /// Program path, as used in log lines and errors.
    pub fn describe(&self) -> String {
        match self {
            Self::Aplay { program, device } => format!("{} -D {device}", program.display()),
            Self::Sox { program, device } if device.is_empty() => format!("{} -", program.display()),
            Self::Sox { program, device } => {
                format!("AUDIODEV={device} {} -", program.display())
            }
        }
    }

    fn command(&self) -> Command {
        match self {
            Self::Aplay { program, device } => {
                let mut cmd = Command::new(program);
                cmd.arg("-q");
                if !device.is_empty() {
                    cmd.args(["-D", device.as_str()]);
                }
                cmd
            }
            Self::Sox { program, device } => {
                let mut cmd = Command::new(program);
                cmd.args(["-q", "-"]);
                if !device.is_empty() {
                    cmd.env("AUDIODEV", device);
                }
                cmd
            }
        }
    }
}

/// First executable file named `name` in `search_path`.
fn find_executable(name: &str, search_path: &std::ffi::OsStr) -> Option<PathBuf> {
    env::split_paths(search_path)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

pub struct CommandPlayer {
    backend: Arc<PlaybackBackend>,
}

impl CommandPlayer {
    pub fn new(backend: PlaybackBackend) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }
}

async fn play_one(backend: Arc<PlaybackBackend>, audio: AudioBuffer) -> Result<()> {
    let t0 = Instant::now();
    let playback_error = |reason: String| SeqreadError::Playback {
        command: backend.describe(),
        reason,
    };

    let output = run_with_stdin(backend.command(), &audio.0)
        .await
        .map_err(|e| playback_error(e.to_string()))?;
    if !output.status.success() {
        return Err(playback_error(describe_failure(&output)));
    }

    debug!("Played {} bytes in {}ms", audio.len(), t0.elapsed().as_millis());
    Ok(())
}

impl Play for CommandPlayer {
    fn play(&self, audio: AudioBuffer) -> StageFuture<()> {
        Box::pin(play_one(self.backend.clone(), audio))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fake_bin(dir: &Path, name: &str, script: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn playback(backend: BackendPreference) -> PlaybackConfig {
        PlaybackConfig {
            backend,
            aplay_device: "plughw:1,0".into(),
            sox_device: "hw:2".into(),
        }
    }

    #[test]
    fn auto_prefers_aplay() {
        let dir = tempfile::tempdir().unwrap();
        let aplay = fake_bin(dir.path(), "aplay", "cat >/dev/null");
        fake_bin(dir.path(), "play", "cat >/dev/null");

        let backend =
            PlaybackBackend::select_in(&playback(BackendPreference::Auto), dir.path().as_os_str())
                .unwrap();
        assert_eq!(
            backend,
            PlaybackBackend::Aplay {
                program: aplay,
                device: "plughw:1,0".into()
            }
        );
    }

    #[test]
    fn auto_falls_back_to_sox() {
        let dir = tempfile::tempdir().unwrap();
        let play = fake_bin(dir.path(), "play", "cat >/dev/null");

        let backend =
            PlaybackBackend::select_in(&playback(BackendPreference::Auto), dir.path().as_os_str())
                .unwrap();
        assert_eq!(
            backend,
            PlaybackBackend::Sox {
                program: play,
                device: "hw:2".into()
            }
        );
    }

    #[test]
    fn missing_backend_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        // Present but not executable.
        fs::write(dir.path().join("aplay"), "").unwrap();

        for preference in [
            BackendPreference::Auto,
            BackendPreference::Aplay,
            BackendPreference::Sox,
        ] {
            assert!(matches!(
                PlaybackBackend::select_in(&playback(preference), dir.path().as_os_str()),
                Err(SeqreadError::Configuration(_))
            ));
        }
    }

    #[tokio::test]
    async fn sox_receives_device_and_audio() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("played");
        let play = fake_bin(
            dir.path(),
            "play",
            &format!("echo \"$AUDIODEV\" > '{0}.dev'; cat > '{0}'", out.display()),
        );
        let player = CommandPlayer::new(PlaybackBackend::Sox {
            program: play,
            device: "hw:2".into(),
        });

        player.play(AudioBuffer(b"WAVDATA".to_vec())).await.unwrap();
        assert_eq!(fs::read(&out).unwrap(), b"WAVDATA");
        assert_eq!(
            fs::read_to_string(dir.path().join("played.dev")).unwrap().trim(),
            "hw:2"
        );
    }

    #[tokio::test]
    async fn failing_player_is_playback_error() {
        let dir = tempfile::tempdir().unwrap();
        let aplay = fake_bin(dir.path(), "aplay", "cat >/dev/null; exit 1");
        let player = CommandPlayer::new(PlaybackBackend::Aplay {
            program: aplay,
            device: "default".into(),
        });

        assert!(matches!(
            player.play(AudioBuffer(b"x".to_vec())).await,
            Err(SeqreadError::Playback { .. })
        ));
    }
}
