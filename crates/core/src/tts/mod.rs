mod disabled;
mod fallback;
mod live;
mod openai;
mod piper;

use crate::config::Locale;
use crate::util::is_http_retryable;
use bytes::Bytes;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

pub use disabled::DisabledTtsClient;
pub use fallback::FallbackTtsClient;
pub use live::LiveSpeechClient;
pub use openai::OpenAiTtsClient;
pub use piper::PiperTtsClient;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoiceId(pub String);

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TtsRequest {
    pub text: String,
    pub voice: Option<VoiceId>,
    pub locale: Locale,
}

impl TtsRequest {
    pub fn new(text: impl Into<String>, locale: Locale) -> Self {
        Self {
            text: text.into(),
            voice: None,
            locale,
        }
    }

    pub fn with_voice(mut self, voice: Option<VoiceId>) -> Self {
        self.voice = voice;
        self
    }
}

/// Parameters for a speech engine owned by the embedding shell (for example
/// a browser's speech synthesis). No audio bytes exist for these.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LiveUtterance {
    pub text: String,
    pub lang: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TtsAudio {
    /// Compressed audio as returned by a remote service.
    Encoded { mime: String, bytes: Bytes },
    /// Raw interleaved samples from a local engine.
    Pcm {
        sample_rate_hz: u32,
        channels: u16,
        pcm_i16: Vec<i16>,
    },
    /// "Speak this live" marker.
    Live(LiveUtterance),
}

impl TtsAudio {
    pub fn is_live(&self) -> bool {
        matches!(self, TtsAudio::Live(_))
    }

    /// Size of the owned audio payload in bytes; zero for live utterances.
    pub fn payload_bytes(&self) -> usize {
        match self {
            TtsAudio::Encoded { bytes, .. } => bytes.len(),
            TtsAudio::Pcm { pcm_i16, .. } => pcm_i16.len() * std::mem::size_of::<i16>(),
            TtsAudio::Live(_) => 0,
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            TtsAudio::Encoded { mime, .. } => mime,
            TtsAudio::Pcm { .. } => "pcm",
            TtsAudio::Live(_) => "live",
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TtsError {
    #[error("nothing to synthesize after cleaning the text")]
    EmptyText,
    #[error("narration is disabled")]
    Disabled,
    #[error("tts quota exhausted")]
    QuotaExhausted,
    #[error("tts request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("tts api returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("{0}")]
    Other(String),
}

impl TtsError {
    pub fn is_retryable(&self) -> bool {
        match self {
            TtsError::Network(_) => true,
            TtsError::Api { status, .. } => is_http_retryable(*status),
            _ => false,
        }
    }
}

/// Produces narration audio for one block of script text.
pub trait TtsClient: Send + Sync {
    fn synthesize(&self, request: TtsRequest) -> BoxFuture<'_, Result<TtsAudio, TtsError>>;
}
