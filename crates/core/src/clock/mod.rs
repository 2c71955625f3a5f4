//! Session clock: elapsed time, phase transitions and completion.

mod ticker;

pub use ticker::{IntervalTicker, ManualTicker, TickSource};

use crate::schedule::{Phase, PhaseTimings};
use serde::Serialize;
use std::fmt;

const LOG_TARGET: &str = "clock";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockState {
    Stopped,
    Playing,
    Paused,
    Completed,
}

impl fmt::Display for ClockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ClockState::Stopped => "stopped",
            ClockState::Playing => "playing",
            ClockState::Paused => "paused",
            ClockState::Completed => "completed",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockOp {
    Start,
    Pause,
    Tick,
}

impl fmt::Display for ClockOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ClockOp::Start => "start",
            ClockOp::Pause => "pause",
            ClockOp::Tick => "tick",
        })
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("cannot {op} a {state} session")]
    InvalidTransition { op: ClockOp, state: ClockState },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClockEvent {
    Started { phase: Phase },
    Resumed { phase: Phase, elapsed: u32 },
    Paused { elapsed: u32 },
    Ticked { elapsed: u32, remaining: u32 },
    PhaseChanged { from: Phase, to: Phase, elapsed: u32 },
    Completed { elapsed: u32 },
    Reset,
}

/// Drives `elapsed` from 0 to the session length one second at a time.
///
/// `phase` is never stored independently of `elapsed`: it is recomputed from
/// the timings on every tick and only moves forward until `reset`.
#[derive(Debug)]
pub struct SessionClock<T> {
    timings: PhaseTimings,
    elapsed: u32,
    phase: Phase,
    state: ClockState,
    ticker: T,
}

impl<T: TickSource> SessionClock<T> {
    pub fn new(timings: PhaseTimings, ticker: T) -> Self {
        Self {
            timings,
            elapsed: 0,
            phase: Phase::Intro,
            state: ClockState::Stopped,
            ticker,
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn elapsed(&self) -> u32 {
        self.elapsed
    }

    pub fn remaining(&self) -> u32 {
        self.timings.total_seconds() - self.elapsed
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn timings(&self) -> &PhaseTimings {
        &self.timings
    }

    pub fn ticker(&self) -> &T {
        &self.ticker
    }

    pub fn ticker_mut(&mut self) -> &mut T {
        &mut self.ticker
    }

    /// Starts from `Stopped`, resumes from `Paused`. Already playing is a
    /// no-op and returns `None`; a completed session has to be reset first.
    pub fn start(&mut self) -> Result<Option<ClockEvent>, StateError> {
        let event = match self.state {
            ClockState::Playing => {
                tracing::debug!(target: LOG_TARGET, elapsed = self.elapsed, "start ignored; already playing");
                return Ok(None);
            }
            ClockState::Completed => return Err(self.invalid(ClockOp::Start)),
            ClockState::Stopped => ClockEvent::Started { phase: self.phase },
            ClockState::Paused => ClockEvent::Resumed {
                phase: self.phase,
                elapsed: self.elapsed,
            },
        };

        self.state = ClockState::Playing;
        self.ticker.start();
        tracing::debug!(target: LOG_TARGET, elapsed = self.elapsed, phase = %self.phase, "clock running");
        Ok(Some(event))
    }

    pub fn pause(&mut self) -> Result<ClockEvent, StateError> {
        if self.state != ClockState::Playing {
            return Err(self.invalid(ClockOp::Pause));
        }
        self.ticker.stop();
        self.state = ClockState::Paused;
        tracing::debug!(target: LOG_TARGET, elapsed = self.elapsed, "clock paused");
        Ok(ClockEvent::Paused {
            elapsed: self.elapsed,
        })
    }

    /// Valid from any state.
    pub fn reset(&mut self) -> ClockEvent {
        self.ticker.stop();
        self.elapsed = 0;
        self.phase = Phase::Intro;
        self.state = ClockState::Stopped;
        tracing::debug!(target: LOG_TARGET, "clock reset");
        ClockEvent::Reset
    }

    /// Advances one second. Emits `Ticked`, then `PhaseChanged` when the
    /// boundary is crossed, then `Completed` on the final second (after which
    /// the ticker is stopped and further ticks are rejected).
    pub fn tick(&mut self) -> Result<Vec<ClockEvent>, StateError> {
        if self.state != ClockState::Playing {
            return Err(self.invalid(ClockOp::Tick));
        }

        self.elapsed += 1;
        let mut events = vec![ClockEvent::Ticked {
            elapsed: self.elapsed,
            remaining: self.remaining(),
        }];

        let phase = self.timings.phase_at(self.elapsed);
        if phase != self.phase {
            tracing::info!(target: LOG_TARGET, from = %self.phase, to = %phase, elapsed = self.elapsed, "phase changed");
            events.push(ClockEvent::PhaseChanged {
                from: self.phase,
                to: phase,
                elapsed: self.elapsed,
            });
            self.phase = phase;
        }

        if self.elapsed >= self.timings.total_seconds() {
            self.ticker.stop();
            self.state = ClockState::Completed;
            tracing::info!(target: LOG_TARGET, elapsed = self.elapsed, "session completed");
            events.push(ClockEvent::Completed {
                elapsed: self.elapsed,
            });
        }

        Ok(events)
    }

    fn invalid(&self, op: ClockOp) -> StateError {
        StateError::InvalidTransition {
            op,
            state: self.state,
        }
    }
}
