//! Coqui TTS CLI provider
//!
//! Runs the `tts` command line tool once per request and reads back the
//! WAV file it writes.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;

use crate::error::{Result, SynthesisError};
use crate::model::{SpeechModel, SpeechRequest};

/// Model driven through the `tts` CLI (subprocess)
pub struct CoquiCliModel {
    model_name: String,
    cli_path: PathBuf,
    timeout: Duration,
}

impl CoquiCliModel {
    /// Create a new CLI-backed model
    ///
    /// Returns an error if the `tts` binary is not found.
    pub fn new(model_name: &str, cli_path: Option<PathBuf>, timeout: Duration) -> Result<Self> {
        let cli_path = match cli_path {
            Some(path) => {
                if !path.exists() {
                    return Err(SynthesisError::ModelUnavailable(format!(
                        "tts CLI not found at specified path: {}",
                        path.display()
                    )));
                }
                path
            }
            None => which::which("tts").map_err(|_| {
                SynthesisError::ModelUnavailable(
                    "tts CLI not found. Install with `pip install coqui-tts`".into(),
                )
            })?,
        };

        Ok(Self {
            model_name: model_name.to_string(),
            cli_path,
            timeout,
        })
    }

    fn command(&self, request: &SpeechRequest, out_path: &std::path::Path) -> Command {
        let mut cmd = Command::new(&self.cli_path);
        cmd.args(["--model_name", &self.model_name])
            .args(["--text", &request.text])
            .arg("--speaker_wav")
            .arg(&request.voice_ref)
            .args(["--language_idx", &request.language])
            .arg("--out_path")
            .arg(out_path)
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl SpeechModel for CoquiCliModel {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>> {
        if request.text.trim().is_empty() {
            return Err(SynthesisError::InvalidInput("empty text".into()));
        }
        if !request.voice_ref.exists() {
            return Err(SynthesisError::InvalidInput(format!(
                "voice reference not found: {}",
                request.voice_ref.display()
            )));
        }

        let scratch = tempfile::TempDir::new()?;
        let out_path = scratch.path().join("out.wav");

        log::debug!("running {} for {} chars", self.cli_path.display(), request.text.len());
        let output = tokio::time::timeout(self.timeout, self.command(request, &out_path).output())
            .await
            .map_err(|_| SynthesisError::Timeout {
                seconds: self.timeout.as_secs(),
            })?
            .map_err(|e| SynthesisError::Command(format!("Failed to execute: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            if super::is_resource_exhaustion(&stderr) {
                return Err(SynthesisError::ResourceExhausted(stderr));
            }
            return Err(SynthesisError::Command(format!("Command failed: {}", stderr.trim())));
        }

        let bytes = tokio::fs::read(&out_path).await.map_err(|e| {
            let message = format!("tts did not produce {}: {}", out_path.display(), e);
            SynthesisError::InvalidOutput(message)
        })?;

        Ok(bytes)
    }

    fn name(&self) -> &'static str {
        "Coqui TTS CLI"
    }

    fn is_available(&self) -> Result<()> {
        // Binary location was checked in constructor
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_cli_path() {
        let result = CoquiCliModel::new(
            "tts_models/en/ljspeech/vits",
            Some(PathBuf::from("/nonexistent/bin/tts")),
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(SynthesisError::ModelUnavailable(_))));
    }

    #[test]
    fn test_command_arguments() {
        let temp = tempfile::TempDir::new().unwrap();
        let fake_cli = temp.path().join("tts");
        std::fs::write(&fake_cli, b"").unwrap();

        let model = CoquiCliModel::new("xtts", Some(fake_cli), Duration::from_secs(5)).unwrap();
        let request = SpeechRequest::new("Merhaba.", "/voices/speaker.wav", "tr");
        let cmd = model.command(&request, std::path::Path::new("/tmp/out.wav"));
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();

        assert_eq!(
            args,
            vec![
                "--model_name",
                "xtts",
                "--text",
                "Merhaba.",
                "--speaker_wav",
                "/voices/speaker.wav",
                "--language_idx",
                "tr",
                "--out_path",
                "/tmp/out.wav",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_voice_ref_is_invalid_input() {
        let temp = tempfile::TempDir::new().unwrap();
        let fake_cli = temp.path().join("tts");
        std::fs::write(&fake_cli, b"").unwrap();

        let model = CoquiCliModel::new("xtts", Some(fake_cli), Duration::from_secs(5)).unwrap();
        let request = SpeechRequest::new("Hello.", temp.path().join("missing.wav"), "en");
        let err = model.synthesize(&request).await.unwrap_err();
        assert!(matches!(err, SynthesisError::InvalidInput(_)));
    }
}
