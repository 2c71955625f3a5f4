//! Best-effort narration: per-phase synthesis, caching and playback.
//!
//! Synthesis never blocks the caller. Requests are queued as
//! [`SynthesisJob`]s; whoever drives the session turns them into futures with
//! [`NarrationController::dispatch`] and feeds the results back through
//! [`NarrationController::complete`]. Failures are logged and the phase simply
//! stays silent.

mod cache;

pub use cache::{AudioCache, AudioHandle};

use crate::config::Locale;
use crate::playback::PlaybackSink;
use crate::schedule::Phase;
use crate::tts::{TtsAudio, TtsClient, TtsError, TtsRequest, VoiceId};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use std::sync::Arc;

const LOG_TARGET: &str = "narration";

/// A pending request to synthesize one phase's text.
#[derive(Clone, Debug, PartialEq)]
pub struct SynthesisJob {
    pub phase: Phase,
    pub request: TtsRequest,
}

#[derive(Debug)]
pub struct SynthesisOutcome {
    pub phase: Phase,
    pub result: Result<TtsAudio, TtsError>,
}

/// What a phase will sound like.
#[derive(Debug, PartialEq)]
pub enum Narration<'a> {
    Audio(&'a AudioHandle),
    Silent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "narration", rename_all = "snake_case")]
pub enum NarrationEvent {
    Playing { phase: Phase },
    /// Audio arrived for a phase that is no longer being narrated.
    Cached { phase: Phase },
    Silent { phase: Phase },
}

pub struct NarrationController<S: ?Sized, P: PlaybackSink> {
    synthesizer: Arc<S>,
    sink: P,
    cache: AudioCache,
    locale: Locale,
    voice: Option<VoiceId>,
    pending: [bool; 3],
    queued: Vec<SynthesisJob>,
    /// Phase whose clip the sink is currently holding.
    active: Option<Phase>,
    /// Phase the session wants narrated right now.
    wanted: Option<Phase>,
    paused: bool,
    next_id: u64,
}

impl<S, P> NarrationController<S, P>
where
    S: TtsClient + ?Sized + 'static,
    P: PlaybackSink,
{
    pub fn new(synthesizer: Arc<S>, sink: P, locale: Locale) -> Self {
        Self {
            synthesizer,
            sink,
            cache: AudioCache::new(),
            locale,
            voice: None,
            pending: [false; 3],
            queued: Vec::new(),
            active: None,
            wanted: None,
            paused: false,
            next_id: 1,
        }
    }

    pub fn with_voice(mut self, voice: Option<VoiceId>) -> Self {
        self.voice = voice;
        self
    }

    pub fn sink(&self) -> &P {
        &self.sink
    }

    pub fn cache(&self) -> &AudioCache {
        &self.cache
    }

    pub fn active_phase(&self) -> Option<Phase> {
        self.active
    }

    pub fn is_pending(&self, phase: Phase) -> bool {
        self.pending[phase.index()]
    }

    /// Switches narration to `phase`. Whatever was playing is stopped first.
    /// Cached audio starts immediately; otherwise synthesis is queued and the
    /// clip starts when it arrives, provided `phase` is still wanted then.
    pub fn play_phase(&mut self, phase: Phase, text: &str) -> Option<NarrationEvent> {
        if self.active.is_some_and(|active| active != phase) {
            self.halt();
        }
        self.wanted = Some(phase);
        self.paused = false;

        if self.active == Some(phase) {
            self.sink.resume();
            return Some(NarrationEvent::Playing { phase });
        }
        if self.cache.contains(phase) {
            return Some(self.start_cached(phase));
        }
        self.request(phase, text);
        None
    }

    /// Pauses the clip in place. Pending synthesis is left to finish.
    pub fn pause(&mut self) {
        self.paused = true;
        if self.active.is_some() {
            self.sink.pause();
        }
    }

    /// Continues narration of `phase` after a pause. The phase may have moved
    /// on while paused only through a reset, in which case it starts over.
    pub fn resume(&mut self, phase: Phase, text: &str) -> Option<NarrationEvent> {
        if self.active == Some(phase) {
            self.paused = false;
            self.wanted = Some(phase);
            self.sink.resume();
            return Some(NarrationEvent::Playing { phase });
        }
        self.play_phase(phase, text)
    }

    /// Stops and rewinds. The cache is kept for replay.
    pub fn stop(&mut self) {
        self.halt();
        self.wanted = None;
        self.paused = false;
    }

    /// The session has ended: the current clip may play out, but nothing
    /// that arrives later is started.
    pub fn finish(&mut self) {
        self.wanted = None;
    }

    /// Queues synthesis for `phase` unless it is cached or already in flight.
    pub fn request(&mut self, phase: Phase, text: &str) {
        if self.cache.contains(phase) || self.pending[phase.index()] {
            return;
        }
        self.pending[phase.index()] = true;
        let request = TtsRequest::new(text, self.locale).with_voice(self.voice.clone());
        tracing::debug!(target: LOG_TARGET, phase = %phase, "queueing synthesis");
        self.queued.push(SynthesisJob { phase, request });
    }

    pub fn take_jobs(&mut self) -> Vec<SynthesisJob> {
        std::mem::take(&mut self.queued)
    }

    /// Turns a job into a future that owns everything it needs, so it can
    /// run while the controller keeps serving ticks.
    pub fn dispatch(&self, job: SynthesisJob) -> BoxFuture<'static, SynthesisOutcome> {
        let synthesizer = Arc::clone(&self.synthesizer);
        async move {
            let result = synthesizer.synthesize(job.request).await;
            SynthesisOutcome {
                phase: job.phase,
                result,
            }
        }
        .boxed()
    }

    /// Feeds a finished synthesis back in. Successful audio is always cached;
    /// it is only played if its phase is still the one being narrated.
    pub fn complete(&mut self, outcome: SynthesisOutcome) -> NarrationEvent {
        let SynthesisOutcome { phase, result } = outcome;
        self.pending[phase.index()] = false;

        match result {
            Ok(audio) => {
                self.store(phase, audio);
                if self.wanted == Some(phase) && !self.paused && self.active.is_none() {
                    self.start_cached(phase)
                } else {
                    tracing::debug!(target: LOG_TARGET, phase = %phase, "audio cached for replay");
                    NarrationEvent::Cached { phase }
                }
            }
            Err(TtsError::Disabled) => {
                tracing::debug!(target: LOG_TARGET, phase = %phase, "narration disabled");
                NarrationEvent::Silent { phase }
            }
            Err(e) => {
                tracing::warn!(target: LOG_TARGET, phase = %phase, error = %e, "synthesis failed; continuing without audio");
                NarrationEvent::Silent { phase }
            }
        }
    }

    /// Returns the cached clip for `phase`, synthesizing and caching it first
    /// if needed. Failures yield [`Narration::Silent`] and are not cached.
    pub async fn ensure_audio_for(&mut self, phase: Phase, text: &str) -> Narration<'_> {
        if !self.cache.contains(phase) {
            let request = TtsRequest::new(text, self.locale).with_voice(self.voice.clone());
            match self.synthesizer.synthesize(request).await {
                Ok(audio) => self.store(phase, audio),
                Err(TtsError::Disabled) => {}
                Err(e) => {
                    tracing::warn!(target: LOG_TARGET, phase = %phase, error = %e, "synthesis failed; phase will be silent");
                }
            }
        }
        match self.cache.get(phase) {
            Some(handle) => Narration::Audio(handle),
            None => Narration::Silent,
        }
    }

    /// Stops playback and hands every cached clip back to the sink.
    pub fn release_all(&mut self) {
        release_all(&mut self.sink, &mut self.cache);
        self.active = None;
    }

    fn store(&mut self, phase: Phase, audio: TtsAudio) {
        if self.cache.contains(phase) {
            tracing::debug!(target: LOG_TARGET, phase = %phase, "duplicate audio dropped");
            return;
        }
        let handle = AudioHandle::new(self.next_id, phase, audio);
        self.next_id += 1;
        tracing::debug!(
            target: LOG_TARGET,
            phase = %phase,
            id = handle.id(),
            kind = handle.audio().kind(),
            bytes = handle.audio().payload_bytes(),
            "audio cached"
        );
        self.cache.insert(handle);
    }

    fn start_cached(&mut self, phase: Phase) -> NarrationEvent {
        let Some(handle) = self.cache.get(phase) else {
            return NarrationEvent::Silent { phase };
        };
        match self.sink.play(handle) {
            Ok(()) => {
                self.active = Some(phase);
                tracing::info!(target: LOG_TARGET, phase = %phase, id = handle.id(), "narrating");
                NarrationEvent::Playing { phase }
            }
            Err(e) => {
                tracing::warn!(target: LOG_TARGET, phase = %phase, error = %e, "playback failed; continuing without audio");
                NarrationEvent::Silent { phase }
            }
        }
    }

    fn halt(&mut self) {
        if self.active.take().is_some() {
            self.sink.stop();
        }
    }
}

fn release_all<P: PlaybackSink>(sink: &mut P, cache: &mut AudioCache) {
    sink.stop();
    for handle in cache.drain() {
        tracing::trace!(target: LOG_TARGET, id = handle.id(), phase = %handle.phase(), "releasing audio");
        sink.release(&handle);
    }
}

impl<S: ?Sized, P: PlaybackSink> Drop for NarrationController<S, P> {
    fn drop(&mut self) {
        release_all(&mut self.sink, &mut self.cache);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::PlaybackError;
    use crate::tts::LiveUtterance;
    use std::sync::Mutex;

    #[derive(Debug, PartialEq, Eq)]
    enum Call {
        Play(u64, Phase),
        Pause,
        Resume,
        Stop,
        Release(u64),
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        calls: Arc<Mutex<Vec<Call>>>,
        fail: bool,
    }

    impl RecordingSink {
        fn take(&self) -> Vec<Call> {
            std::mem::take(&mut *self.calls.lock().unwrap())
        }

        fn push(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl PlaybackSink for RecordingSink {
        fn play(&mut self, handle: &AudioHandle) -> Result<(), PlaybackError> {
            if self.fail {
                return Err(PlaybackError::WorkerGone);
            }
            self.push(Call::Play(handle.id(), handle.phase()));
            Ok(())
        }
        fn pause(&mut self) {
            self.push(Call::Pause);
        }
        fn resume(&mut self) {
            self.push(Call::Resume);
        }
        fn stop(&mut self) {
            self.push(Call::Stop);
        }
        fn release(&mut self, handle: &AudioHandle) {
            self.push(Call::Release(handle.id()));
        }
    }

    /// Succeeds for every phase except the one named.
    struct StubSynth {
        fail_on: Option<&'static str>,
    }

    impl TtsClient for StubSynth {
        fn synthesize(&self, request: TtsRequest) -> BoxFuture<'_, Result<TtsAudio, TtsError>> {
            let result = if self.fail_on == Some(request.text.as_str()) {
                Err(TtsError::Other("simulated outage".into()))
            } else {
                Ok(TtsAudio::Live(LiveUtterance {
                    text: request.text,
                    lang: request.locale.lang_tag().into(),
                    rate: 1.0,
                    pitch: 1.0,
                    volume: 0.9,
                }))
            };
            async move { result }.boxed()
        }
    }

    fn controller(fail_on: Option<&'static str>) -> (NarrationController<StubSynth, RecordingSink>, RecordingSink) {
        let sink = RecordingSink::default();
        let ctl = NarrationController::new(Arc::new(StubSynth { fail_on }), sink.clone(), Locale::Korean);
        (ctl, sink)
    }

    async fn run_jobs(ctl: &mut NarrationController<StubSynth, RecordingSink>) -> Vec<NarrationEvent> {
        let mut events = Vec::new();
        for job in ctl.take_jobs() {
            let outcome = ctl.dispatch(job).await;
            events.push(ctl.complete(outcome));
        }
        events
    }

    #[tokio::test]
    async fn first_play_synthesizes_then_plays() {
        let (mut ctl, sink) = controller(None);
        assert_eq!(ctl.play_phase(Phase::Intro, "intro"), None);
        assert!(ctl.is_pending(Phase::Intro));

        let events = run_jobs(&mut ctl).await;
        assert_eq!(events, vec![NarrationEvent::Playing { phase: Phase::Intro }]);
        assert_eq!(sink.take(), vec![Call::Play(1, Phase::Intro)]);
        assert_eq!(ctl.active_phase(), Some(Phase::Intro));
    }

    #[tokio::test]
    async fn new_phase_stops_previous_clip_first() {
        let (mut ctl, sink) = controller(None);
        ctl.play_phase(Phase::Intro, "intro");
        run_jobs(&mut ctl).await;
        sink.take();

        ctl.play_phase(Phase::Core, "core");
        assert_eq!(sink.take(), vec![Call::Stop]);
        run_jobs(&mut ctl).await;
        assert_eq!(sink.take(), vec![Call::Play(2, Phase::Core)]);
    }

    #[tokio::test]
    async fn failed_synthesis_is_silent_and_not_cached() {
        let (mut ctl, sink) = controller(Some("core"));
        ctl.play_phase(Phase::Core, "core");
        let events = run_jobs(&mut ctl).await;
        assert_eq!(events, vec![NarrationEvent::Silent { phase: Phase::Core }]);
        assert!(!ctl.cache().contains(Phase::Core));
        assert!(!ctl.is_pending(Phase::Core));
        assert!(sink.take().is_empty());

        ctl.play_phase(Phase::Core, "core");
        assert_eq!(ctl.take_jobs().len(), 1);
    }

    #[tokio::test]
    async fn late_result_is_cached_but_not_played() {
        let (mut ctl, sink) = controller(None);
        ctl.play_phase(Phase::Intro, "intro");
        let intro_job = ctl.take_jobs().remove(0);

        ctl.play_phase(Phase::Core, "core");
        let outcome = ctl.dispatch(intro_job).await;
        assert_eq!(ctl.complete(outcome), NarrationEvent::Cached { phase: Phase::Intro });
        assert!(ctl.cache().contains(Phase::Intro));
        assert!(sink.take().is_empty());

        run_jobs(&mut ctl).await;
        assert_eq!(sink.take(), vec![Call::Play(2, Phase::Core)]);
    }

    #[tokio::test]
    async fn audio_arriving_while_paused_waits_for_resume() {
        let (mut ctl, sink) = controller(None);
        ctl.play_phase(Phase::Intro, "intro");
        ctl.pause();
        assert_eq!(
            run_jobs(&mut ctl).await,
            vec![NarrationEvent::Cached { phase: Phase::Intro }]
        );
        assert!(sink.take().is_empty());

        assert_eq!(
            ctl.resume(Phase::Intro, "intro"),
            Some(NarrationEvent::Playing { phase: Phase::Intro })
        );
        assert_eq!(sink.take(), vec![Call::Play(1, Phase::Intro)]);
    }

    #[tokio::test]
    async fn pause_and_resume_reach_the_sink() {
        let (mut ctl, sink) = controller(None);
        ctl.play_phase(Phase::Intro, "intro");
        run_jobs(&mut ctl).await;
        sink.take();

        ctl.pause();
        ctl.resume(Phase::Intro, "intro");
        assert_eq!(sink.take(), vec![Call::Pause, Call::Resume]);
    }

    #[tokio::test]
    async fn stop_keeps_cache_and_replay_uses_it() {
        let (mut ctl, sink) = controller(None);
        ctl.play_phase(Phase::Intro, "intro");
        run_jobs(&mut ctl).await;
        ctl.stop();
        assert_eq!(ctl.active_phase(), None);
        assert!(ctl.cache().contains(Phase::Intro));
        sink.take();

        assert_eq!(
            ctl.play_phase(Phase::Intro, "intro"),
            Some(NarrationEvent::Playing { phase: Phase::Intro })
        );
        assert!(ctl.take_jobs().is_empty());
        assert_eq!(sink.take(), vec![Call::Play(1, Phase::Intro)]);
    }

    #[tokio::test]
    async fn duplicate_requests_are_coalesced() {
        let (mut ctl, _sink) = controller(None);
        ctl.request(Phase::Outro, "outro");
        ctl.request(Phase::Outro, "outro");
        ctl.play_phase(Phase::Outro, "outro");
        assert_eq!(ctl.take_jobs().len(), 1);
    }

    #[tokio::test]
    async fn finish_lets_nothing_new_start() {
        let (mut ctl, sink) = controller(None);
        ctl.play_phase(Phase::Outro, "outro");
        ctl.finish();
        assert_eq!(
            run_jobs(&mut ctl).await,
            vec![NarrationEvent::Cached { phase: Phase::Outro }]
        );
        assert!(sink.take().is_empty());
    }

    #[tokio::test]
    async fn sink_failure_degrades_to_silence() {
        let sink = RecordingSink {
            fail: true,
            ..Default::default()
        };
        let mut ctl =
            NarrationController::new(Arc::new(StubSynth { fail_on: None }), sink, Locale::English);
        ctl.play_phase(Phase::Intro, "intro");
        assert_eq!(
            run_jobs(&mut ctl).await,
            vec![NarrationEvent::Silent { phase: Phase::Intro }]
        );
        assert_eq!(ctl.active_phase(), None);
    }

    #[tokio::test]
    async fn ensure_audio_for_caches_once() {
        let (mut ctl, _sink) = controller(Some("outro"));
        assert!(matches!(
            ctl.ensure_audio_for(Phase::Intro, "intro").await,
            Narration::Audio(handle) if handle.phase() == Phase::Intro
        ));
        assert!(matches!(
            ctl.ensure_audio_for(Phase::Intro, "intro").await,
            Narration::Audio(handle) if handle.id() == 1
        ));
        assert_eq!(
            ctl.ensure_audio_for(Phase::Outro, "outro").await,
            Narration::Silent
        );
        assert_eq!(ctl.cache().len(), 1);
    }

    #[tokio::test]
    async fn every_handle_is_released_exactly_once_on_drop() {
        let (mut ctl, sink) = controller(None);
        for (phase, text) in [(Phase::Intro, "intro"), (Phase::Core, "core"), (Phase::Outro, "outro")] {
            ctl.ensure_audio_for(phase, text).await;
        }
        drop(ctl);
        let calls = sink.take();
        let released: Vec<&Call> = calls.iter().filter(|c| matches!(c, Call::Release(_))).collect();
        assert_eq!(
            released,
            vec![&Call::Release(1), &Call::Release(2), &Call::Release(3)]
        );
    }
}
