//! Phase weights and the mapping from elapsed seconds to a phase.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Shortest session that still gives each phase one whole second.
pub const MIN_SESSION_SECONDS: u32 = 3;

const WEIGHT_SUM_EPSILON: f64 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Intro,
    Core,
    Outro,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Intro, Phase::Core, Phase::Outro];

    pub fn index(self) -> usize {
        match self {
            Phase::Intro => 0,
            Phase::Core => 1,
            Phase::Outro => 2,
        }
    }

    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Intro => Some(Phase::Core),
            Phase::Core => Some(Phase::Outro),
            Phase::Outro => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Intro => "intro",
            Phase::Core => "core",
            Phase::Outro => "outro",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fractional share of the session given to each phase.
///
/// Always sums to 1.0 (within a small epsilon) with every weight in `(0, 1)`;
/// `new` rejects anything else instead of normalising it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseWeights {
    intro: f64,
    core: f64,
    outro: f64,
}

impl PhaseWeights {
    pub const EQUAL_THIRDS: PhaseWeights = PhaseWeights {
        intro: 1.0 / 3.0,
        core: 1.0 / 3.0,
        outro: 1.0 / 3.0,
    };

    /// 10/80/10: short framing around a long core.
    pub const CORE_HEAVY: PhaseWeights = PhaseWeights {
        intro: 0.10,
        core: 0.80,
        outro: 0.10,
    };

    /// 15/70/15.
    pub const BALANCED: PhaseWeights = PhaseWeights {
        intro: 0.15,
        core: 0.70,
        outro: 0.15,
    };

    pub fn new(intro: f64, core: f64, outro: f64) -> Result<Self, ConfigError> {
        for (phase, value) in [
            (Phase::Intro, intro),
            (Phase::Core, core),
            (Phase::Outro, outro),
        ] {
            if !value.is_finite() || value <= 0.0 || value >= 1.0 {
                return Err(ConfigError::InvalidWeight { phase, value });
            }
        }

        let sum = intro + core + outro;
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(ConfigError::WeightSum { sum });
        }

        Ok(Self { intro, core, outro })
    }

    pub fn weight(&self, phase: Phase) -> f64 {
        match phase {
            Phase::Intro => self.intro,
            Phase::Core => self.core,
            Phase::Outro => self.outro,
        }
    }
}

impl Default for PhaseWeights {
    fn default() -> Self {
        Self::EQUAL_THIRDS
    }
}

impl FromStr for PhaseWeights {
    type Err = ConfigError;

    /// Accepts a preset name (`thirds`, `core-heavy`, `balanced`) or
    /// percentages such as `20/60/20`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let policy = s.trim().to_ascii_lowercase();
        match policy.as_str() {
            "thirds" | "equal" => return Ok(Self::EQUAL_THIRDS),
            "core-heavy" => return Ok(Self::CORE_HEAVY),
            "balanced" => return Ok(Self::BALANCED),
            _ => {}
        }

        let parts: Vec<&str> = policy.split('/').map(str::trim).collect();
        let [intro, core, outro] = parts.as_slice() else {
            return Err(ConfigError::UnknownWeightPolicy(s.to_owned()));
        };
        let percent = |raw: &str| -> Result<f64, ConfigError> {
            raw.parse::<f64>()
                .map(|p| p / 100.0)
                .map_err(|_| ConfigError::UnknownWeightPolicy(s.to_owned()))
        };
        Self::new(percent(*intro)?, percent(*core)?, percent(*outro)?)
    }
}

/// Phase boundaries in whole seconds: `0 < intro_end < core_end < total`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTimings {
    intro_end: u32,
    core_end: u32,
    total: u32,
}

impl PhaseTimings {
    pub fn intro_end(&self) -> u32 {
        self.intro_end
    }

    pub fn core_end(&self) -> u32 {
        self.core_end
    }

    pub fn total_seconds(&self) -> u32 {
        self.total
    }

    /// Step function over elapsed seconds. Anything at or past `core_end`,
    /// including the final second, is `Outro`.
    pub fn phase_at(&self, elapsed: u32) -> Phase {
        if elapsed < self.intro_end {
            Phase::Intro
        } else if elapsed < self.core_end {
            Phase::Core
        } else {
            Phase::Outro
        }
    }

    /// Half-open `[start, end)` second range covered by `phase`.
    pub fn span(&self, phase: Phase) -> (u32, u32) {
        match phase {
            Phase::Intro => (0, self.intro_end),
            Phase::Core => (self.intro_end, self.core_end),
            Phase::Outro => (self.core_end, self.total),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PhaseScheduler {
    weights: PhaseWeights,
}

impl PhaseScheduler {
    pub fn new(weights: PhaseWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &PhaseWeights {
        &self.weights
    }

    pub fn compute_timings(&self, duration_seconds: u32) -> Result<PhaseTimings, ConfigError> {
        if duration_seconds < MIN_SESSION_SECONDS {
            return Err(ConfigError::DurationTooShort {
                seconds: duration_seconds,
            });
        }

        let total = f64::from(duration_seconds);
        let w = &self.weights;

        // Round to the nearest second, then pull each boundary inward so no
        // phase ends up shorter than one second.
        let intro_end = ((total * w.intro).round() as u32).clamp(1, duration_seconds - 2);
        let core_end = ((total * (w.intro + w.core)).round() as u32)
            .clamp(intro_end + 1, duration_seconds - 1);

        Ok(PhaseTimings {
            intro_end,
            core_end,
            total: duration_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRESETS: [PhaseWeights; 3] = [
        PhaseWeights::EQUAL_THIRDS,
        PhaseWeights::CORE_HEAVY,
        PhaseWeights::BALANCED,
    ];

    #[test]
    fn balanced_ten_minutes_matches_expected_boundaries() {
        let timings = PhaseScheduler::new(PhaseWeights::BALANCED)
            .compute_timings(600)
            .expect("valid");
        assert_eq!(timings.intro_end(), 90);
        assert_eq!(timings.core_end(), 510);

        assert_eq!(timings.phase_at(89), Phase::Intro);
        assert_eq!(timings.phase_at(90), Phase::Core);
        assert_eq!(timings.phase_at(509), Phase::Core);
        assert_eq!(timings.phase_at(510), Phase::Outro);
        assert_eq!(timings.phase_at(600), Phase::Outro);
    }

    #[test]
    fn other_policies_split_ten_minutes() {
        let thirds = PhaseScheduler::default().compute_timings(600).expect("valid");
        assert_eq!((thirds.intro_end(), thirds.core_end()), (200, 400));

        let heavy = PhaseScheduler::new(PhaseWeights::CORE_HEAVY)
            .compute_timings(600)
            .expect("valid");
        assert_eq!((heavy.intro_end(), heavy.core_end()), (60, 540));
    }

    #[test]
    fn every_phase_gets_at_least_one_second() {
        for weights in PRESETS {
            let scheduler = PhaseScheduler::new(weights);
            for duration in MIN_SESSION_SECONDS..=2_000 {
                let t = scheduler.compute_timings(duration).expect("valid");
                assert!(0 < t.intro_end(), "{weights:?} {duration}");
                assert!(t.intro_end() < t.core_end(), "{weights:?} {duration}");
                assert!(t.core_end() < duration, "{weights:?} {duration}");
            }
        }
    }

    #[test]
    fn skewed_weights_still_leave_room_for_each_phase() {
        let weights = PhaseWeights::new(0.01, 0.98, 0.01).expect("valid");
        let t = PhaseScheduler::new(weights).compute_timings(3).expect("valid");
        assert_eq!((t.intro_end(), t.core_end()), (1, 2));
    }

    #[test]
    fn phase_at_never_moves_backwards() {
        for weights in PRESETS {
            let t = PhaseScheduler::new(weights).compute_timings(97).expect("valid");
            let mut previous = Phase::Intro;
            for elapsed in 0..=t.total_seconds() {
                let phase = t.phase_at(elapsed);
                assert!(phase >= previous);
                previous = phase;
            }
            assert_eq!(previous, Phase::Outro);
        }
    }

    #[test]
    fn too_short_duration_is_rejected() {
        let scheduler = PhaseScheduler::default();
        assert_eq!(
            scheduler.compute_timings(2),
            Err(ConfigError::DurationTooShort { seconds: 2 })
        );
        assert!(scheduler.compute_timings(0).is_err());
    }

    #[test]
    fn invalid_weights_are_rejected_not_clamped() {
        assert!(matches!(
            PhaseWeights::new(0.0, 0.5, 0.5),
            Err(ConfigError::InvalidWeight {
                phase: Phase::Intro,
                ..
            })
        ));
        assert!(matches!(
            PhaseWeights::new(0.2, f64::NAN, 0.2),
            Err(ConfigError::InvalidWeight {
                phase: Phase::Core,
                ..
            })
        ));
        assert!(matches!(
            PhaseWeights::new(0.2, 0.2, 0.2),
            Err(ConfigError::WeightSum { .. })
        ));
    }

    #[test]
    fn weight_policies_parse() {
        assert_eq!("thirds".parse::<PhaseWeights>(), Ok(PhaseWeights::EQUAL_THIRDS));
        assert_eq!("Core-Heavy".parse::<PhaseWeights>(), Ok(PhaseWeights::CORE_HEAVY));
        let custom: PhaseWeights = "20/60/20".parse().expect("valid");
        assert!((custom.weight(Phase::Core) - 0.6).abs() < 1e-9);
        assert!(matches!(
            "20/60".parse::<PhaseWeights>(),
            Err(ConfigError::UnknownWeightPolicy(_))
        ));
        assert!(matches!(
            "50/50/50".parse::<PhaseWeights>(),
            Err(ConfigError::WeightSum { .. })
        ));
    }

    #[test]
    fn spans_cover_the_whole_session() {
        let t = PhaseScheduler::new(PhaseWeights::BALANCED)
            .compute_timings(600)
            .expect("valid");
        assert_eq!(t.span(Phase::Intro), (0, 90));
        assert_eq!(t.span(Phase::Core), (90, 510));
        assert_eq!(t.span(Phase::Outro), (510, 600));
    }
}
