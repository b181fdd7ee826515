use std::path::Path;
use std::process::Command;

use tracing::{debug, warn};

use crate::error::{Result, SignboardError};

/// Plays an audio file on the local machine.
pub trait AudioPlayer: Send + Sync {
    fn play(&self, path: &Path) -> Result<()>;
}

/// Hands the file to the platform's default handler.
#[derive(Debug, Clone, Default)]
pub struct SystemAudioPlayer;

impl SystemAudioPlayer {
    fn command(path: &Path) -> Command {
        if cfg!(target_os = "windows") {
            let mut command = Command::new("cmd");
            command.args(["/C", "start", ""]).arg(path);
            command
        } else if cfg!(target_os = "macos") {
            let mut command = Command::new("open");
            command.arg(path);
            command
        } else {
            let mut command = Command::new("xdg-open");
            command.arg(path);
            command
        }
    }
}

impl AudioPlayer for SystemAudioPlayer {
    fn play(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(SignboardError::NotFound(format!(
                "Audio file {} does not exist",
                path.display()
            )));
        }

        let mut command = Self::command(path);
        debug!(?command, "Launching audio player");

        let status = command.status().map_err(|e| {
            SignboardError::Internal(format!("Failed to launch audio player: {e}"))
        })?;

        if !status.success() {
            warn!(%status, "Audio player exited unsuccessfully");
            return Err(SignboardError::Internal(format!(
                "Audio player exited with {status}"
            )));
        }
        Ok(())
    }
}

/// Play on a blocking worker without waiting for it to finish.
pub fn play_in_background<P>(player: P, path: std::path::PathBuf) -> tokio::task::JoinHandle<()>
where
    P: AudioPlayer + 'static,
{
    tokio::task::spawn_blocking(move || {
        if let Err(e) = player.play(&path) {
            warn!(path = %path.display(), "Audio playback failed: {}", e);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingPlayer {
        played: Arc<Mutex<Vec<std::path::PathBuf>>>,
    }

    impl AudioPlayer for RecordingPlayer {
        fn play(&self, path: &Path) -> Result<()> {
            self.played.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let result = SystemAudioPlayer.play(Path::new("/nonexistent/speech.mp3"));
        assert!(matches!(result, Err(SignboardError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_background_playback_runs_player() {
        let player = RecordingPlayer::default();
        let played = Arc::clone(&player.played);

        play_in_background(player, "/tmp/speech.mp3".into())
            .await
            .unwrap();

        assert_eq!(
            *played.lock().unwrap(),
            vec![std::path::PathBuf::from("/tmp/speech.mp3")]
        );
    }
}
