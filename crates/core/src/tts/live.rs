use crate::script::clean_for_speech;
use crate::tts::{LiveUtterance, TtsAudio, TtsClient, TtsError, TtsRequest};
use futures::future::BoxFuture;
use futures::FutureExt;

const DEFAULT_RATE: f32 = 1.0;
const DEFAULT_PITCH: f32 = 1.0;
const DEFAULT_VOLUME: f32 = 0.9;

/// Hands narration to a speech engine living in the embedding shell.
///
/// No I/O happens here; the result is a [`TtsAudio::Live`] marker carrying
/// cleaned text plus voice parameters.
#[derive(Clone, Debug)]
pub struct LiveSpeechClient {
    rate: f32,
    pitch: f32,
    volume: f32,
}

impl LiveSpeechClient {
    pub fn new() -> Self {
        Self {
            rate: DEFAULT_RATE,
            pitch: DEFAULT_PITCH,
            volume: DEFAULT_VOLUME,
        }
    }

    /// Speaking rate, clamped to the 0.1..=10 range speech engines accept.
    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = rate.clamp(0.1, 10.0);
        self
    }

    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch.clamp(0.0, 2.0);
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume.clamp(0.0, 1.0);
        self
    }
}

impl Default for LiveSpeechClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TtsClient for LiveSpeechClient {
    fn synthesize(&self, request: TtsRequest) -> BoxFuture<'_, Result<TtsAudio, TtsError>> {
        async move {
            let text = clean_for_speech(&request.text);
            if text.is_empty() {
                return Err(TtsError::EmptyText);
            }
            Ok(TtsAudio::Live(LiveUtterance {
                text,
                lang: request.locale.lang_tag().to_owned(),
                rate: self.rate,
                pitch: self.pitch,
                volume: self.volume,
            }))
        }
        .boxed()
    }
}
