use crate::schedule::Phase;
use crate::tts::TtsAudio;
use std::sync::Arc;

/// Owned narration clip for one phase.
///
/// Handles are created only by the narration controller and are deliberately
/// not `Clone`: each one is handed to the playback sink's `release` exactly
/// once, when it is superseded or when the session goes away.
#[derive(Debug, PartialEq)]
pub struct AudioHandle {
    id: u64,
    phase: Phase,
    audio: Arc<TtsAudio>,
}

impl AudioHandle {
    pub(crate) fn new(id: u64, phase: Phase, audio: TtsAudio) -> Self {
        Self {
            id,
            phase,
            audio: Arc::new(audio),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn audio(&self) -> &TtsAudio {
        &self.audio
    }

    /// Shared view of the clip for sinks that play it on another thread.
    pub fn shared_audio(&self) -> Arc<TtsAudio> {
        Arc::clone(&self.audio)
    }
}

/// At most one clip per phase. Bounded by construction.
#[derive(Debug, Default)]
pub struct AudioCache {
    slots: [Option<AudioHandle>; 3],
}

impl AudioCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, phase: Phase) -> Option<&AudioHandle> {
        self.slots[phase.index()].as_ref()
    }

    pub fn contains(&self, phase: Phase) -> bool {
        self.slots[phase.index()].is_some()
    }

    /// Stores `handle` under its phase, returning the entry it replaced.
    pub fn insert(&mut self, handle: AudioHandle) -> Option<AudioHandle> {
        let slot = &mut self.slots[handle.phase.index()];
        slot.replace(handle)
    }

    pub fn remove(&mut self, phase: Phase) -> Option<AudioHandle> {
        self.slots[phase.index()].take()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empties the cache, yielding every handle so the caller can release it.
    pub fn drain(&mut self) -> impl Iterator<Item = AudioHandle> + '_ {
        self.slots.iter_mut().filter_map(Option::take)
    }

    pub fn cached_phases(&self) -> Vec<Phase> {
        Phase::ALL
            .into_iter()
            .filter(|phase| self.contains(*phase))
            .collect()
    }
}
