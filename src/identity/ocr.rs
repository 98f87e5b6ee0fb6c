//! Text recognition over a scanned identity document.

use std::fmt::{Display, Formatter};
use std::io::Write;
use std::sync::Arc;

use log::{debug, info};
use serde::Serialize;
use thiserror::Error;
use tempfile::TempPath;
use tokio::{process::Command, sync::mpsc, task};

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image could not be decoded: {0}")]
    Undecodable(String),
    #[error("Recognition engine failed: {0}")]
    Engine(String),
}

/// Stages reported while recognizing an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionStatus {
    LoadingImage,
    Recognizing,
    Done,
}

impl Display for RecognitionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::LoadingImage => "loading image",
            Self::Recognizing => "recognizing text",
            Self::Done => "done",
        };
        write!(f, "{name}")
    }
}

/// One progress event; `progress` runs from 0.0 to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RecognitionProgress {
    pub status: RecognitionStatus,
    pub progress: f32,
}

/// Where progress events go. Events are informational only: every event is
/// logged, and forwarded to a channel if one is attached. A dropped receiver
/// is ignored.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    sender: Option<mpsc::UnboundedSender<RecognitionProgress>>,
}

impl ProgressReporter {
    /// Log events only.
    pub fn logging() -> Self {
        Self::default()
    }

    /// Log events and also deliver them on the returned receiver.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RecognitionProgress>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    pub fn report(&self, status: RecognitionStatus, progress: f32) {
        debug!("OCR {status} ({:.0}%)", progress * 100.0);
        if let Some(sender) = &self.sender {
            let _ = sender.send(RecognitionProgress { status, progress });
        }
    }
}

/// An engine turning an image into text.
#[rocket::async_trait]
pub trait TextRecognition: Send + Sync {
    /// Recognize the text in `image`, using `language` as the script hint.
    /// Succeeds only with non-empty text.
    async fn recognize(
        &self,
        image: &[u8],
        language: &str,
        progress: &ProgressReporter,
    ) -> Result<String, OcrError>;
}

/// Shared handle placed in Rocket managed state.
pub type SharedOcr = Arc<dyn TextRecognition>;

/// Recognition through the `tesseract` command-line engine.
pub struct TesseractCli {
    command: String,
}

impl TesseractCli {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// The engine's version banner, if the engine can be run at all.
    pub async fn probe(&self) -> Option<String> {
        let output = Command::new(&self.command).arg("--version").output().await.ok()?;
        let banner = if output.stdout.is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        String::from_utf8_lossy(&banner)
            .lines()
            .next()
            .map(str::to_string)
    }
}

#[rocket::async_trait]
impl TextRecognition for TesseractCli {
    async fn recognize(
        &self,
        image: &[u8],
        language: &str,
        progress: &ProgressReporter,
    ) -> Result<String, OcrError> {
        progress.report(RecognitionStatus::LoadingImage, 0.0);
        let format = sniff_format(image)
            .ok_or_else(|| OcrError::Undecodable("unrecognized image format".to_string()))?;

        let file = task::spawn_blocking({
            let image = image.to_vec();
            move || stage(&image, format)
        })
        .await
        .map_err(|e| OcrError::Engine(format!("could not stage image: {e}")))??;
        progress.report(RecognitionStatus::LoadingImage, 1.0);

        progress.report(RecognitionStatus::Recognizing, 0.0);
        let output = Command::new(&self.command)
            .arg(&*file)
            .arg("stdout")
            .arg("-l")
            .arg(language)
            .output()
            .await
            .map_err(|e| OcrError::Engine(format!("could not run `{}`: {e}", self.command)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            // Leptonica reports unreadable images through `pixRead*`.
            return Err(if stderr.contains("pixRead") || stderr.contains("cannot be read") {
                OcrError::Undecodable(stderr)
            } else {
                OcrError::Engine(stderr)
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        if text.trim().is_empty() {
            return Err(OcrError::Engine("no text recognized".to_string()));
        }
        progress.report(RecognitionStatus::Done, 1.0);
        info!("Recognized {} characters", text.chars().count());
        Ok(text)
    }
}

/// Write `image` to a temporary file named with extension `format`. The
/// handle is closed before returning so the engine can open the path.
fn stage(image: &[u8], format: &str) -> Result<TempPath, OcrError> {
    let mut file = tempfile::Builder::new()
        .prefix("id-scan-")
        .suffix(format)
        .tempfile()
        .map_err(|e| OcrError::Engine(format!("could not stage image: {e}")))?;
    file.write_all(image)
        .and_then(|_| file.flush())
        .map_err(|e| OcrError::Engine(format!("could not stage image: {e}")))?;
    Ok(file.into_temp_path())
}

/// File extension for the image format in `bytes`, judged by magic number.
fn sniff_format(bytes: &[u8]) -> Option<&'static str> {
    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"\x89PNG\r\n\x1a\n", ".png"),
        (b"\xff\xd8\xff", ".jpg"),
        (b"GIF87a", ".gif"),
        (b"GIF89a", ".gif"),
        (b"BM", ".bmp"),
        (b"II*\x00", ".tif"),
        (b"MM\x00*", ".tif"),
    ];

    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some(".webp");
    }
    SIGNATURES
        .iter()
        .find(|(magic, _)| bytes.starts_with(magic))
        .map(|(_, ext)| *ext)
}
