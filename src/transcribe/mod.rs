// src/transcribe/mod.rs
// Transcription Module - remote speech-to-text adapters

mod bark;
mod subtitles;
mod whisper_api;

pub use bark::BarkAdapter;
pub use subtitles::strip_subtitle_markers;
pub use whisper_api::WhisperApiAdapter;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::audio::{AudioBuffer, AudioError};
use crate::task::OperationError;

/// One audio payload ready for upload.
#[derive(Debug, Clone)]
pub struct AudioPayload {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl AudioPayload {
    pub fn from_buffer(buffer: &AudioBuffer) -> Result<Self, AudioError> {
        Ok(Self {
            file_name: "recording.wav".to_string(),
            mime: "audio/wav".to_string(),
            bytes: buffer.to_wav_bytes()?,
        })
    }

    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "recording".to_string());
        let mime = match path.extension().and_then(|e| e.to_str()) {
            Some("mp3") => "audio/mpeg",
            Some("ogg") => "audio/ogg",
            Some("m4a") => "audio/mp4",
            Some("webm") => "audio/webm",
            Some("flac") => "audio/flac",
            _ => "audio/wav",
        };
        Ok(Self {
            file_name,
            mime: mime.to_string(),
            bytes,
        })
    }
}

/// Unified transcription adapter trait
#[async_trait]
pub trait TranscribeAdapter: Send + Sync {
    /// Transcribe one uploaded audio payload to plain text
    async fn transcribe(
        &self,
        audio: &AudioPayload,
        model: &str,
        token: &CancellationToken,
    ) -> Result<String, OperationError>;

    /// Get provider name
    fn name(&self) -> &str;
}

/// Adapters keyed by the registry's provider group name.
#[derive(Default)]
pub struct ProviderSet {
    adapters: HashMap<String, Arc<dyn TranscribeAdapter>>,
}

impl ProviderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// All providers reachable with the given credential. The TalTech
    /// endpoint needs no key and is always present; the OpenAI endpoint is
    /// registered only when a key exists.
    pub fn from_api_key(api_key: Option<&str>) -> Self {
        let mut set = Self::new();
        if let Some(key) = api_key.map(str::trim).filter(|k| !k.is_empty()) {
            set = set.with_adapter("OpenAI", Arc::new(WhisperApiAdapter::new(key.to_string())));
        }
        set = set.with_adapter("TalTech", Arc::new(BarkAdapter::new()));
        tracing::info!("Transcription providers available: {}", set.adapters.len());
        set
    }

    pub fn with_adapter(mut self, provider: &str, adapter: Arc<dyn TranscribeAdapter>) -> Self {
        self.adapters.insert(provider.to_string(), adapter);
        self
    }

    pub fn get(&self, provider: &str) -> Option<Arc<dyn TranscribeAdapter>> {
        self.adapters.get(provider).cloned()
    }
}
