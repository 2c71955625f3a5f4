use crate::narration::AudioHandle;
use crate::playback::{PlaybackError, PlaybackSink};

const LOG_TARGET: &str = "playback::null";

/// Discards audio. Used when no output device is wanted.
#[derive(Clone, Debug, Default)]
pub struct NullPlaybackSink {
    playing: Option<u64>,
}

impl NullPlaybackSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the clip that would currently be audible.
    pub fn playing(&self) -> Option<u64> {
        self.playing
    }
}

impl PlaybackSink for NullPlaybackSink {
    fn play(&mut self, handle: &AudioHandle) -> Result<(), PlaybackError> {
        tracing::debug!(
            target: LOG_TARGET,
            id = handle.id(),
            phase = %handle.phase(),
            kind = handle.audio().kind(),
            "play"
        );
        self.playing = Some(handle.id());
        Ok(())
    }

    fn pause(&mut self) {
        tracing::trace!(target: LOG_TARGET, "pause");
    }

    fn resume(&mut self) {
        tracing::trace!(target: LOG_TARGET, "resume");
    }

    fn stop(&mut self) {
        self.playing = None;
    }

    fn release(&mut self, handle: &AudioHandle) {
        if self.playing == Some(handle.id()) {
            self.playing = None;
        }
    }
}
