//! Journal emotion analysis. The result is only displayed; the playback
//! engine never reads it.

mod keyword;
mod openai;

pub use keyword::KeywordEmotionAnalyzer;
pub use openai::OpenAiEmotionAnalyzer;

use crate::config::Locale;
use crate::openai::ChatError;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Stress,
    Anxiety,
    Sadness,
    Anger,
    Overwhelm,
    Confusion,
    Joy,
    Calm,
}

impl Emotion {
    pub fn label(self, locale: Locale) -> &'static str {
        match (locale, self) {
            (Locale::Korean, Emotion::Stress) => "스트레스",
            (Locale::Korean, Emotion::Anxiety) => "불안",
            (Locale::Korean, Emotion::Sadness) => "슬픔",
            (Locale::Korean, Emotion::Anger) => "분노",
            (Locale::Korean, Emotion::Overwhelm) => "압도감",
            (Locale::Korean, Emotion::Confusion) => "혼란",
            (Locale::Korean, Emotion::Joy) => "기쁨",
            (Locale::Korean, Emotion::Calm) => "평온",
            (Locale::English, Emotion::Stress) => "stress",
            (Locale::English, Emotion::Anxiety) => "anxiety",
            (Locale::English, Emotion::Sadness) => "sadness",
            (Locale::English, Emotion::Anger) => "anger",
            (Locale::English, Emotion::Overwhelm) => "overwhelm",
            (Locale::English, Emotion::Confusion) => "confusion",
            (Locale::English, Emotion::Joy) => "joy",
            (Locale::English, Emotion::Calm) => "calm",
        }
    }

    /// Practice suited to the emotion.
    pub fn recommended_practice(self, locale: Locale) -> &'static str {
        match (locale, self) {
            (Locale::Korean, Emotion::Stress | Emotion::Anxiety) => "숨쉬는 것에 집중하기",
            (Locale::Korean, Emotion::Sadness) => "나에게 따뜻한 마음 보내기",
            (Locale::Korean, Emotion::Anger) => "몸의 감각을 차례로 살펴보기",
            (Locale::Korean, Emotion::Overwhelm | Emotion::Confusion) => "떠오르는 생각을 알아차리기",
            (Locale::Korean, Emotion::Joy | Emotion::Calm) => "고마운 것들 떠올리기",
            (Locale::English, Emotion::Stress | Emotion::Anxiety) => "breath awareness",
            (Locale::English, Emotion::Sadness) => "loving-kindness",
            (Locale::English, Emotion::Anger) => "body scan",
            (Locale::English, Emotion::Overwhelm | Emotion::Confusion) => "noting practice",
            (Locale::English, Emotion::Joy | Emotion::Calm) => "gratitude meditation",
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Low,
    Medium,
    High,
}

impl Intensity {
    pub fn label(self, locale: Locale) -> &'static str {
        match (locale, self) {
            (Locale::Korean, Intensity::Low) => "낮음",
            (Locale::Korean, Intensity::Medium) => "보통",
            (Locale::Korean, Intensity::High) => "높음",
            (Locale::English, Intensity::Low) => "low",
            (Locale::English, Intensity::Medium) => "medium",
            (Locale::English, Intensity::High) => "high",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct JournalEntry {
    pub name: String,
    pub text: String,
    pub locale: Locale,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmotionReport {
    /// Two or three sentences for display.
    pub summary: String,
    pub emotion: Option<Emotion>,
    pub intensity: Option<Intensity>,
}

impl fmt::Display for EmotionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AnalysisError {
    #[error("journal text is empty")]
    EmptyJournal,
    #[error(transparent)]
    Chat(#[from] ChatError),
}

pub trait EmotionAnalyzer: Send + Sync {
    fn analyze(&self, entry: JournalEntry) -> BoxFuture<'_, Result<EmotionReport, AnalysisError>>;
}
