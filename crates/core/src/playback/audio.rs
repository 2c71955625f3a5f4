use crate::narration::AudioHandle;
use crate::playback::{PlaybackError, PlaybackSink};
use crate::tts::TtsAudio;
use rodio::source::Source;
use rodio::{Decoder, OutputStreamBuilder, Sink};
use std::io::Cursor;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const LOG_TARGET: &str = "playback::rodio";

enum Command {
    Play(Arc<TtsAudio>),
    Pause,
    Resume,
    Stop,
    Shutdown,
}

/// Speaker output through rodio.
///
/// [`rodio::OutputStream`] is not `Send`, so it lives on a dedicated worker
/// thread for the sink's whole lifetime; this handle only sends commands.
/// Each `play` gets a fresh [`rodio::Sink`] so a new clip never queues behind
/// the previous one.
pub struct RodioPlaybackSink {
    commands: mpsc::Sender<Command>,
    worker: Option<JoinHandle<()>>,
    current: Option<u64>,
}

impl RodioPlaybackSink {
    /// Opens the default output device. Fails if no device is available.
    pub fn new() -> Result<Self, PlaybackError> {
        let (commands, inbox) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let worker = thread::Builder::new()
            .name("audio-output".to_owned())
            .spawn(move || run_worker(inbox, ready_tx))
            .map_err(|e| PlaybackError::AudioOutputUnavailable {
                details: format!("cannot start audio thread: {e}"),
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                commands,
                worker: Some(worker),
                current: None,
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(PlaybackError::WorkerGone),
        }
    }

    fn send(&self, command: Command) -> Result<(), PlaybackError> {
        self.commands
            .send(command)
            .map_err(|_| PlaybackError::WorkerGone)
    }
}

impl PlaybackSink for RodioPlaybackSink {
    fn play(&mut self, handle: &AudioHandle) -> Result<(), PlaybackError> {
        self.current = Some(handle.id());
        self.send(Command::Play(handle.shared_audio()))
    }

    fn pause(&mut self) {
        let _ = self.send(Command::Pause);
    }

    fn resume(&mut self) {
        let _ = self.send(Command::Resume);
    }

    fn stop(&mut self) {
        self.current = None;
        let _ = self.send(Command::Stop);
    }

    fn release(&mut self, handle: &AudioHandle) {
        if self.current == Some(handle.id()) {
            self.stop();
        }
    }
}

impl Drop for RodioPlaybackSink {
    fn drop(&mut self) {
        let _ = self.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!(target: LOG_TARGET, "audio thread panicked");
            }
        }
    }
}

fn run_worker(inbox: mpsc::Receiver<Command>, ready: mpsc::SyncSender<Result<(), PlaybackError>>) {
    let stream = match OutputStreamBuilder::open_default_stream() {
        Ok(stream) => {
            let _ = ready.send(Ok(()));
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(PlaybackError::AudioOutputUnavailable {
                details: e.to_string(),
            }));
            return;
        }
    };

    let mut sink: Option<Sink> = None;
    while let Ok(command) = inbox.recv() {
        match command {
            Command::Play(audio) => {
                if let Some(previous) = sink.take() {
                    previous.stop();
                }
                let next = Sink::connect_new(stream.mixer());
                match append_clip(&next, &audio) {
                    Ok(true) => sink = Some(next),
                    Ok(false) => {}
                    Err(e) => tracing::warn!(target: LOG_TARGET, error = %e, "skipping clip"),
                }
            }
            Command::Pause => {
                if let Some(s) = &sink {
                    s.pause();
                }
            }
            Command::Resume => {
                if let Some(s) = &sink {
                    s.play();
                }
            }
            Command::Stop => {
                if let Some(s) = sink.take() {
                    s.stop();
                }
            }
            Command::Shutdown => break,
        }
    }
    tracing::debug!(target: LOG_TARGET, "audio thread exiting");
}

/// Queues `audio` on `sink`. Returns `false` when there is nothing to play
/// through a speaker (live utterances belong to the embedding shell).
fn append_clip(sink: &Sink, audio: &TtsAudio) -> Result<bool, PlaybackError> {
    match audio {
        TtsAudio::Encoded { mime, bytes } => {
            let decoder =
                Decoder::new(Cursor::new(bytes.clone())).map_err(|e| PlaybackError::Decode {
                    kind: mime.clone(),
                    details: e.to_string(),
                })?;
            sink.append(decoder);
            Ok(true)
        }
        TtsAudio::Pcm {
            sample_rate_hz,
            channels,
            pcm_i16,
        } => {
            if *sample_rate_hz == 0 || *channels == 0 || pcm_i16.is_empty() {
                return Err(PlaybackError::Decode {
                    kind: "pcm".to_owned(),
                    details: format!(
                        "{} samples at {sample_rate_hz} Hz x {channels}",
                        pcm_i16.len()
                    ),
                });
            }
            sink.append(PcmSource::new(pcm_i16.clone(), *sample_rate_hz, *channels));
            Ok(true)
        }
        TtsAudio::Live(utterance) => {
            tracing::info!(target: LOG_TARGET, lang = %utterance.lang, "no speech engine attached; live narration stays silent");
            Ok(false)
        }
    }
}

struct PcmSource {
    samples: std::vec::IntoIter<i16>,
    sample_rate: u32,
    channels: u16,
    total: Duration,
}

impl PcmSource {
    fn new(samples: Vec<i16>, sample_rate: u32, channels: u16) -> Self {
        let frames = samples.len() as u64 / u64::from(channels);
        let total = Duration::from_secs_f64(frames as f64 / f64::from(sample_rate));
        Self {
            samples: samples.into_iter(),
            sample_rate,
            channels,
            total,
        }
    }
}

impl Iterator for PcmSource {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        self.samples
            .next()
            .map(|s| f32::from(s) / f32::from(i16::MAX))
    }
}

impl Source for PcmSource {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm_source_normalizes_samples() {
        let source = PcmSource::new(vec![0, i16::MAX, -i16::MAX], 22_050, 1);
        let samples: Vec<f32> = source.collect();
        assert_eq!(samples, vec![0.0, 1.0, -1.0]);
    }

    #[test]
    fn pcm_source_reports_duration_in_frames() {
        let source = PcmSource::new(vec![0; 44_100], 22_050, 2);
        assert_eq!(source.total_duration(), Some(Duration::from_secs(1)));
        assert_eq!(source.channels(), 2);
    }
}
