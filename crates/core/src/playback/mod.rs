#[cfg(feature = "audio-output")]
mod audio;
mod null;

use crate::narration::AudioHandle;

#[cfg(feature = "audio-output")]
pub use audio::RodioPlaybackSink;
pub use null::NullPlaybackSink;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("audio output unavailable: {details}")]
    AudioOutputUnavailable { details: String },
    #[error("cannot decode {kind} audio: {details}")]
    Decode { kind: String, details: String },
    #[error("audio worker has shut down")]
    WorkerGone,
}

/// Where narration clips are heard.
///
/// At most one clip plays at a time: `play` replaces whatever was playing.
/// Every method returns immediately; playback proceeds in the background.
pub trait PlaybackSink: Send {
    fn play(&mut self, handle: &AudioHandle) -> Result<(), PlaybackError>;
    fn pause(&mut self);
    fn resume(&mut self);
    fn stop(&mut self);
    /// The handle will never be played again; drop anything derived from it.
    fn release(&mut self, handle: &AudioHandle);
}

impl<P: PlaybackSink + ?Sized> PlaybackSink for Box<P> {
    fn play(&mut self, handle: &AudioHandle) -> Result<(), PlaybackError> {
        (**self).play(handle)
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn resume(&mut self) {
        (**self).resume()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn release(&mut self, handle: &AudioHandle) {
        (**self).release(handle)
    }
}
