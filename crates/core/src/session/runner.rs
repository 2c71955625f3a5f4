use crate::clock::IntervalTicker;
use crate::playback::PlaybackSink;
use crate::session::{Session, SessionError, SessionEvent, SessionView};
use crate::tts::TtsClient;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc;

const LOG_TARGET: &str = "session::runner";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionCommand {
    Play,
    Pause,
    TogglePlayback,
    Reset,
    ToggleScript,
    ToggleAnalysis,
    /// Ask for a fresh [`SessionView`] without changing anything.
    Snapshot,
    Shutdown,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SessionUpdate {
    Event(SessionEvent),
    /// A command that was invalid in the current state.
    Rejected(SessionError),
    View(SessionView),
}

/// Sending half for a running session.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// Returns `false` once the runner has stopped.
    pub async fn send(&self, command: SessionCommand) -> bool {
        self.commands.send(command).await.is_ok()
    }

    /// For callers outside the runtime, such as a thread reading a terminal.
    /// Panics if called from inside an async context.
    pub fn blocking_send(&self, command: SessionCommand) -> bool {
        self.commands.blocking_send(command).is_ok()
    }
}

/// Drives a [`Session`] in real time.
///
/// One task owns the session. It multiplexes caller commands, the single
/// one-second interval and any in-flight synthesis, so a slow synthesizer
/// delays nothing but its own clip.
pub struct SessionRunner<S: ?Sized, P: PlaybackSink> {
    session: Session<S, P, IntervalTicker>,
    commands: mpsc::Receiver<SessionCommand>,
    updates: mpsc::Sender<SessionUpdate>,
}

impl<S, P> SessionRunner<S, P>
where
    S: TtsClient + ?Sized + 'static,
    P: PlaybackSink,
{
    pub fn new(
        session: Session<S, P, IntervalTicker>,
        capacity: usize,
    ) -> (Self, SessionHandle, mpsc::Receiver<SessionUpdate>) {
        let (command_tx, commands) = mpsc::channel(capacity.max(1));
        let (updates, update_rx) = mpsc::channel(capacity.max(1));
        let runner = Self {
            session,
            commands,
            updates,
        };
        (runner, SessionHandle { commands: command_tx }, update_rx)
    }

    /// Runs until [`SessionCommand::Shutdown`] or every handle is dropped,
    /// then hands the session back.
    pub async fn run(self) -> Session<S, P, IntervalTicker> {
        let SessionRunner {
            mut session,
            mut commands,
            updates,
        } = self;
        let mut in_flight = FuturesUnordered::new();

        loop {
            for job in session.take_synthesis_jobs() {
                tracing::debug!(target: LOG_TARGET, phase = %job.phase, "dispatching synthesis");
                in_flight.push(session.dispatch(job));
            }

            tokio::select! {
                biased;

                command = commands.recv() => {
                    let Some(command) = command else { break };
                    if command == SessionCommand::Shutdown {
                        break;
                    }
                    apply(&mut session, command, &updates).await;
                }
                Some(outcome) = in_flight.next(), if !in_flight.is_empty() => {
                    let event = session.complete_synthesis(outcome);
                    emit(&updates, SessionUpdate::Event(event)).await;
                }
                () = session.ticker_mut().wait_tick() => {
                    match session.tick() {
                        Ok(events) => {
                            for event in events {
                                emit(&updates, SessionUpdate::Event(event)).await;
                            }
                            emit(&updates, SessionUpdate::View(session.view())).await;
                        }
                        Err(e) => tracing::warn!(target: LOG_TARGET, error = %e, "tick rejected"),
                    }
                }
            }
        }

        tracing::debug!(
            target: LOG_TARGET,
            abandoned = in_flight.len(),
            "runner stopped"
        );
        session
    }
}

async fn apply<S, P>(
    session: &mut Session<S, P, IntervalTicker>,
    command: SessionCommand,
    updates: &mpsc::Sender<SessionUpdate>,
) where
    S: TtsClient + ?Sized + 'static,
    P: PlaybackSink,
{
    let result = match command {
        SessionCommand::Play => session.play(),
        SessionCommand::Pause => session.pause(),
        SessionCommand::TogglePlayback => session.toggle_playback(),
        SessionCommand::Reset => Ok(session.reset()),
        SessionCommand::ToggleScript => {
            session.toggle_script();
            Ok(Vec::new())
        }
        SessionCommand::ToggleAnalysis => {
            session.toggle_analysis();
            Ok(Vec::new())
        }
        SessionCommand::Snapshot | SessionCommand::Shutdown => Ok(Vec::new()),
    };

    match result {
        Ok(events) => {
            for event in events {
                emit(updates, SessionUpdate::Event(event)).await;
            }
        }
        Err(e) => {
            tracing::debug!(target: LOG_TARGET, ?command, error = %e, "command rejected");
            emit(updates, SessionUpdate::Rejected(e)).await;
        }
    }
    emit(updates, SessionUpdate::View(session.view())).await;
}

async fn emit(updates: &mpsc::Sender<SessionUpdate>, update: SessionUpdate) {
    if updates.send(update).await.is_err() {
        tracing::trace!(target: LOG_TARGET, "no one is listening for updates");
    }
}
