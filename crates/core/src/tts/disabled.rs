use crate::tts::{TtsAudio, TtsClient, TtsError, TtsRequest};
use futures::future::BoxFuture;
use futures::FutureExt;

/// Narration switched off: every request fails with [`TtsError::Disabled`],
/// which the narration controller treats as silent playback.
#[derive(Clone, Debug, Default)]
pub struct DisabledTtsClient;

impl DisabledTtsClient {
    pub fn new() -> Self {
        Self
    }
}

impl TtsClient for DisabledTtsClient {
    fn synthesize(&self, _request: TtsRequest) -> BoxFuture<'_, Result<TtsAudio, TtsError>> {
        async { Err(TtsError::Disabled) }.boxed()
    }
}
