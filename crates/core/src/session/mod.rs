//! One meditation run: script, clock and narration wired together.

mod runner;

pub use runner::{SessionCommand, SessionHandle, SessionRunner, SessionUpdate};

use crate::clock::{ClockEvent, ClockState, SessionClock, StateError, TickSource};
use crate::config::{ConfigError, Locale};
use crate::narration::{
    Narration, NarrationController, NarrationEvent, SynthesisJob, SynthesisOutcome,
};
use crate::playback::PlaybackSink;
use crate::schedule::{Phase, PhaseScheduler, PhaseTimings, PhaseWeights};
use crate::script::{ParseStrategy, ScriptParser, ScriptSections};
use crate::tts::{TtsClient, VoiceId};
use futures::future::BoxFuture;
use serde::Serialize;
use std::sync::Arc;

const LOG_TARGET: &str = "session";

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    State(#[from] StateError),
}

/// What the surrounding app hands over once the script exists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionInput {
    pub name: String,
    pub script: String,
    pub duration_seconds: u32,
    pub analysis: Option<String>,
}

impl SessionInput {
    pub fn from_minutes(name: impl Into<String>, script: impl Into<String>, minutes: u32) -> Self {
        Self {
            name: name.into(),
            script: script.into(),
            duration_seconds: minutes.saturating_mul(60),
            analysis: None,
        }
    }

    pub fn with_analysis(mut self, analysis: impl Into<String>) -> Self {
        self.analysis = Some(analysis.into());
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionOptions {
    pub weights: PhaseWeights,
    pub locale: Locale,
    pub voice: Option<VoiceId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SessionEvent {
    Clock(ClockEvent),
    Narration(NarrationEvent),
}

/// Snapshot for rendering a player screen.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionView {
    pub name: String,
    pub phase: Phase,
    pub phase_label: &'static str,
    pub state: ClockState,
    pub elapsed_seconds: u32,
    pub remaining_seconds: u32,
    pub total_seconds: u32,
    pub elapsed_display: String,
    pub remaining_display: String,
    pub progress_percent: u8,
    /// Current phase's script text, when the script panel is open.
    pub script_text: Option<String>,
    /// Emotion analysis, when the analysis panel is open and one exists.
    pub analysis_text: Option<String>,
    pub narrating: Option<Phase>,
}

pub struct Session<S: ?Sized, P: PlaybackSink, T> {
    name: String,
    script: ScriptSections,
    parse_strategy: ParseStrategy,
    analysis: Option<String>,
    locale: Locale,
    clock: SessionClock<T>,
    narration: NarrationController<S, P>,
    show_script: bool,
    show_analysis: bool,
}

impl<S, P, T> Session<S, P, T>
where
    S: TtsClient + ?Sized + 'static,
    P: PlaybackSink,
    T: TickSource,
{
    /// Validates the input, splits the script and computes phase timings.
    /// Nothing plays until [`Session::play`].
    pub fn new(
        input: SessionInput,
        options: SessionOptions,
        synthesizer: Arc<S>,
        sink: P,
        ticker: T,
    ) -> Result<Self, SessionError> {
        let name = input.name.trim().to_owned();
        if name.is_empty() {
            return Err(ConfigError::EmptyName.into());
        }
        if input.duration_seconds == 0 {
            return Err(ConfigError::ZeroDuration.into());
        }
        let timings = PhaseScheduler::new(options.weights).compute_timings(input.duration_seconds)?;

        let parsed = ScriptParser::new(options.locale).parse(&input.script);
        if parsed.used_fallback() {
            tracing::debug!(target: LOG_TARGET, strategy = ?parsed.strategy, "script split without headers");
        }
        tracing::info!(
            target: LOG_TARGET,
            total = timings.total_seconds(),
            intro_end = timings.intro_end(),
            core_end = timings.core_end(),
            "session ready"
        );

        let narration = NarrationController::new(synthesizer, sink, options.locale).with_voice(options.voice);
        Ok(Self {
            name,
            script: parsed.sections,
            parse_strategy: parsed.strategy,
            analysis: input.analysis.filter(|a| !a.trim().is_empty()),
            locale: options.locale,
            clock: SessionClock::new(timings, ticker),
            narration,
            show_script: false,
            show_analysis: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn script(&self) -> &ScriptSections {
        &self.script
    }

    pub fn parse_strategy(&self) -> ParseStrategy {
        self.parse_strategy
    }

    pub fn timings(&self) -> &PhaseTimings {
        self.clock.timings()
    }

    pub fn state(&self) -> ClockState {
        self.clock.state()
    }

    pub fn phase(&self) -> Phase {
        self.clock.phase()
    }

    pub fn elapsed(&self) -> u32 {
        self.clock.elapsed()
    }

    pub fn narration(&self) -> &NarrationController<S, P> {
        &self.narration
    }

    pub fn ticker_mut(&mut self) -> &mut T {
        self.clock.ticker_mut()
    }

    /// Starts or resumes the clock and the current phase's narration. A
    /// second call while playing changes nothing.
    pub fn play(&mut self) -> Result<Vec<SessionEvent>, SessionError> {
        let Some(event) = self.clock.start()? else {
            return Ok(Vec::new());
        };
        let phase = self.clock.phase();
        let text = self.script.section(phase);
        let narration = match event {
            ClockEvent::Resumed { .. } => self.narration.resume(phase, text),
            _ => self.narration.play_phase(phase, text),
        };
        let mut events = vec![SessionEvent::Clock(event)];
        events.extend(narration.map(SessionEvent::Narration));
        Ok(events)
    }

    pub fn pause(&mut self) -> Result<Vec<SessionEvent>, SessionError> {
        let event = self.clock.pause()?;
        self.narration.pause();
        Ok(vec![SessionEvent::Clock(event)])
    }

    /// Play button semantics: pause while playing, otherwise play.
    pub fn toggle_playback(&mut self) -> Result<Vec<SessionEvent>, SessionError> {
        if self.clock.state() == ClockState::Playing {
            self.pause()
        } else {
            self.play()
        }
    }

    /// Back to the start, stopped. Cached narration is kept for the replay.
    pub fn reset(&mut self) -> Vec<SessionEvent> {
        self.narration.stop();
        vec![SessionEvent::Clock(self.clock.reset())]
    }

    /// One second of playback. Phase changes switch narration; completion
    /// lets the outro clip finish but starts nothing new.
    pub fn tick(&mut self) -> Result<Vec<SessionEvent>, SessionError> {
        let mut events = Vec::new();
        for event in self.clock.tick()? {
            events.push(SessionEvent::Clock(event));
            match event {
                ClockEvent::PhaseChanged { to, .. } => {
                    let text = self.script.section(to);
                    if let Some(n) = self.narration.play_phase(to, text) {
                        events.push(SessionEvent::Narration(n));
                    }
                }
                ClockEvent::Completed { .. } => self.narration.finish(),
                _ => {}
            }
        }
        Ok(events)
    }

    pub fn toggle_script(&mut self) -> bool {
        self.show_script = !self.show_script;
        self.show_script
    }

    pub fn toggle_analysis(&mut self) -> bool {
        self.show_analysis = !self.show_analysis;
        self.show_analysis
    }

    /// Synthesizes every phase up front, the way a loading screen would.
    /// Returns the phases that ended up with audio.
    pub async fn prefetch_narration(&mut self) -> Vec<Phase> {
        let mut ready = Vec::new();
        for phase in Phase::ALL {
            let text = self.script.section(phase);
            if let Narration::Audio(_) = self.narration.ensure_audio_for(phase, text).await {
                ready.push(phase);
            }
        }
        tracing::info!(target: LOG_TARGET, ready = ready.len(), "narration prefetched");
        ready
    }

    pub fn take_synthesis_jobs(&mut self) -> Vec<SynthesisJob> {
        self.narration.take_jobs()
    }

    pub fn dispatch(&self, job: SynthesisJob) -> BoxFuture<'static, SynthesisOutcome> {
        self.narration.dispatch(job)
    }

    pub fn complete_synthesis(&mut self, outcome: SynthesisOutcome) -> SessionEvent {
        SessionEvent::Narration(self.narration.complete(outcome))
    }

    pub fn view(&self) -> SessionView {
        let elapsed = self.clock.elapsed();
        let remaining = self.clock.remaining();
        let total = self.clock.timings().total_seconds();
        let phase = self.clock.phase();
        SessionView {
            name: self.name.clone(),
            phase,
            phase_label: self.locale.phase_label(phase),
            state: self.clock.state(),
            elapsed_seconds: elapsed,
            remaining_seconds: remaining,
            total_seconds: total,
            elapsed_display: format_clock(elapsed),
            remaining_display: format_clock(remaining),
            progress_percent: (u64::from(elapsed) * 100 / u64::from(total.max(1))) as u8,
            script_text: self
                .show_script
                .then(|| self.script.section(phase).to_owned()),
            analysis_text: self
                .show_analysis
                .then(|| self.analysis.clone())
                .flatten(),
            narrating: self.narration.active_phase(),
        }
    }
}

/// `m:ss`, minutes unbounded.
pub fn format_clock(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualTicker;
    use crate::playback::NullPlaybackSink;
    use crate::tts::{LiveUtterance, TtsAudio, TtsError, TtsRequest};
    use futures::FutureExt;

    const SCRIPT: &str = "**도입부**\nhello\n**본 명상**\nworld\n**마무리**\nbye";

    /// Fails for the text named, succeeds with a live marker otherwise.
    struct StubSynth {
        fail_on: Option<&'static str>,
    }

    impl TtsClient for StubSynth {
        fn synthesize(&self, request: TtsRequest) -> BoxFuture<'_, Result<TtsAudio, TtsError>> {
            let result = if self.fail_on == Some(request.text.as_str()) {
                Err(TtsError::Other("simulated".into()))
            } else {
                Ok(TtsAudio::Live(LiveUtterance {
                    text: request.text,
                    lang: "ko-KR".into(),
                    rate: 1.0,
                    pitch: 1.0,
                    volume: 0.9,
                }))
            };
            async move { result }.boxed()
        }
    }

    type TestSession = Session<StubSynth, NullPlaybackSink, ManualTicker>;

    fn session(seconds: u32, weights: PhaseWeights, fail_on: Option<&'static str>) -> TestSession {
        let input = SessionInput {
            name: "지민".into(),
            script: SCRIPT.into(),
            duration_seconds: seconds,
            analysis: Some("평온해 보여요.".into()),
        };
        let options = SessionOptions {
            weights,
            ..Default::default()
        };
        Session::new(
            input,
            options,
            Arc::new(StubSynth { fail_on }),
            NullPlaybackSink::new(),
            ManualTicker::new(),
        )
        .expect("valid session")
    }

    /// Drains queued synthesis synchronously, as a runner would.
    fn settle(s: &mut TestSession) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        for job in s.take_synthesis_jobs() {
            let outcome = futures::executor::block_on(s.dispatch(job));
            events.push(s.complete_synthesis(outcome));
        }
        events
    }

    #[test]
    fn rejects_bad_input() {
        let build = |name: &str, seconds: u32| {
            Session::new(
                SessionInput {
                    name: name.into(),
                    script: SCRIPT.into(),
                    duration_seconds: seconds,
                    analysis: None,
                },
                SessionOptions::default(),
                Arc::new(StubSynth { fail_on: None }),
                NullPlaybackSink::new(),
                ManualTicker::new(),
            )
            .map(|_| ())
        };
        assert_eq!(build("  ", 600), Err(ConfigError::EmptyName.into()));
        assert_eq!(build("a", 0), Err(ConfigError::ZeroDuration.into()));
        assert_eq!(
            build("a", 2),
            Err(ConfigError::DurationTooShort { seconds: 2 }.into())
        );
    }

    #[test]
    fn from_minutes_converts() {
        let input = SessionInput::from_minutes("a", "b", 10).with_analysis("calm");
        assert_eq!(input.duration_seconds, 600);
        assert_eq!(input.analysis.as_deref(), Some("calm"));
    }

    #[test]
    fn narration_failure_never_stops_the_clock() {
        let mut s = session(600, PhaseWeights::BALANCED, Some("world"));
        s.play().expect("play");
        settle(&mut s);
        assert_eq!(s.narration().active_phase(), Some(Phase::Intro));

        let mut outro_at = None;
        while s.state() == ClockState::Playing {
            for event in s.tick().expect("tick") {
                if let SessionEvent::Clock(ClockEvent::PhaseChanged { to: Phase::Outro, elapsed, .. }) = event {
                    outro_at = Some(elapsed);
                }
            }
            let events = settle(&mut s);
            if s.elapsed() == 90 {
                assert_eq!(events, vec![SessionEvent::Narration(NarrationEvent::Silent { phase: Phase::Core })]);
                assert_eq!(s.narration().active_phase(), None);
            }
        }
        assert_eq!(outro_at, Some(510));
        assert_eq!(s.elapsed(), 600);
        assert_eq!(s.phase(), Phase::Outro);
        assert_eq!(s.state(), ClockState::Completed);
        assert_eq!(s.narration().active_phase(), Some(Phase::Outro));
    }

    #[test]
    fn play_twice_is_a_no_op() {
        let mut s = session(60, PhaseWeights::EQUAL_THIRDS, None);
        assert_eq!(s.play().expect("play").len(), 1);
        assert!(s.play().expect("play").is_empty());
        assert_eq!(s.take_synthesis_jobs().len(), 1);
    }

    #[test]
    fn pause_on_stopped_session_is_rejected() {
        let mut s = session(600, PhaseWeights::BALANCED, None);
        let err = s.pause().expect_err("stopped");
        assert_eq!(err.to_string(), "cannot pause a stopped session");
        assert_eq!(s.elapsed(), 0);
        assert_eq!(s.state(), ClockState::Stopped);
    }

    #[test]
    fn toggle_pauses_and_resumes() {
        let mut s = session(60, PhaseWeights::EQUAL_THIRDS, None);
        s.toggle_playback().expect("play");
        settle(&mut s);
        for _ in 0..5 {
            s.tick().expect("tick");
        }
        let paused = s.toggle_playback().expect("pause");
        assert_eq!(paused, vec![SessionEvent::Clock(ClockEvent::Paused { elapsed: 5 })]);
        assert!(s.tick().is_err());

        let resumed = s.toggle_playback().expect("resume");
        assert_eq!(
            resumed,
            vec![
                SessionEvent::Clock(ClockEvent::Resumed { phase: Phase::Intro, elapsed: 5 }),
                SessionEvent::Narration(NarrationEvent::Playing { phase: Phase::Intro }),
            ]
        );
    }

    #[test]
    fn reset_keeps_cache_and_replays_from_intro() {
        let mut s = session(30, PhaseWeights::CORE_HEAVY, None);
        s.play().expect("play");
        settle(&mut s);
        for _ in 0..10 {
            s.tick().expect("tick");
            settle(&mut s);
        }
        assert_eq!(s.phase(), Phase::Core);

        assert_eq!(s.reset(), vec![SessionEvent::Clock(ClockEvent::Reset)]);
        assert_eq!((s.elapsed(), s.phase(), s.state()), (0, Phase::Intro, ClockState::Stopped));
        assert_eq!(s.narration().active_phase(), None);
        assert_eq!(s.narration().cache().len(), 2);

        let events = s.play().expect("replay");
        assert!(events.contains(&SessionEvent::Narration(NarrationEvent::Playing { phase: Phase::Intro })));
        assert!(s.take_synthesis_jobs().is_empty());
    }

    #[test]
    fn view_formats_time_and_panels() {
        let mut s = session(600, PhaseWeights::BALANCED, None);
        s.play().expect("play");
        for _ in 0..95 {
            s.tick().expect("tick");
        }
        let view = s.view();
        assert_eq!(view.elapsed_display, "1:35");
        assert_eq!(view.remaining_display, "8:25");
        assert_eq!(view.progress_percent, 15);
        assert_eq!(view.phase_label, "명상");
        assert_eq!(view.script_text, None);
        assert_eq!(view.analysis_text, None);

        assert!(s.toggle_script());
        assert!(s.toggle_analysis());
        let view = s.view();
        assert_eq!(view.script_text.as_deref(), Some("world"));
        assert_eq!(view.analysis_text.as_deref(), Some("평온해 보여요."));
        assert!(!s.toggle_script());
    }

    #[test]
    fn prefetch_fills_cache_so_play_starts_immediately() {
        let mut s = session(60, PhaseWeights::EQUAL_THIRDS, Some("bye"));
        let ready = futures::executor::block_on(s.prefetch_narration());
        assert_eq!(ready, vec![Phase::Intro, Phase::Core]);

        let events = s.play().expect("play");
        assert_eq!(events[1], SessionEvent::Narration(NarrationEvent::Playing { phase: Phase::Intro }));
        assert!(s.take_synthesis_jobs().is_empty());
    }

    #[test]
    fn clock_format() {
        assert_eq!(format_clock(0), "0:00");
        assert_eq!(format_clock(59), "0:59");
        assert_eq!(format_clock(600), "10:00");
        assert_eq!(format_clock(3_725), "62:05");
    }
}
