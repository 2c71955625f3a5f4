use crate::analysis::{AnalysisError, Emotion, EmotionAnalyzer, EmotionReport, Intensity, JournalEntry};
use crate::config::Locale;
use futures::future::BoxFuture;
use futures::FutureExt;

const KEYWORDS: &[(Emotion, &[&str])] = &[
    (
        Emotion::Stress,
        &["스트레스", "바빠", "바쁜", "야근", "마감", "지쳐", "피곤", "stress", "busy", "deadline", "tired", "exhausted"],
    ),
    (
        Emotion::Anxiety,
        &["불안", "걱정", "긴장", "두려", "초조", "anxious", "anxiety", "worried", "worry", "nervous", "afraid"],
    ),
    (
        Emotion::Sadness,
        &["슬프", "슬픔", "우울", "외로", "눈물", "허전", "sad", "depressed", "lonely", "cried", "grief"],
    ),
    (
        Emotion::Anger,
        &["화가", "화나", "짜증", "억울", "분노", "angry", "annoyed", "furious", "frustrated", "mad"],
    ),
    (
        Emotion::Overwhelm,
        &["벅차", "감당", "너무 많", "정신없", "overwhelmed", "too much", "swamped"],
    ),
    (
        Emotion::Confusion,
        &["혼란", "모르겠", "헷갈", "복잡", "confused", "unsure", "lost"],
    ),
    (
        Emotion::Joy,
        &["기쁘", "기뻤", "행복", "즐거", "좋았", "감사", "happy", "joy", "glad", "grateful", "excited"],
    ),
    (
        Emotion::Calm,
        &["평온", "편안", "차분", "여유", "calm", "peaceful", "relaxed"],
    ),
];

const INTENSIFIERS: &[&str] = &["너무", "정말", "진짜", "매우", "엄청", "very", "really", "so ", "extremely"];

/// Offline analysis by keyword counting. Crude, but needs no network and
/// always answers.
#[derive(Clone, Debug, Default)]
pub struct KeywordEmotionAnalyzer;

impl KeywordEmotionAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze_now(&self, entry: &JournalEntry) -> Result<EmotionReport, AnalysisError> {
        let text = entry.text.trim().to_lowercase();
        if text.is_empty() {
            return Err(AnalysisError::EmptyJournal);
        }

        let Some((emotion, hits)) = dominant_emotion(&text) else {
            return Ok(EmotionReport {
                summary: neutral_summary(&entry.name, entry.locale),
                emotion: None,
                intensity: None,
            });
        };
        let intensity = intensity_for(hits, count_hits(&text, INTENSIFIERS));
        Ok(EmotionReport {
            summary: summary(&entry.name, emotion, intensity, entry.locale),
            emotion: Some(emotion),
            intensity: Some(intensity),
        })
    }
}

impl EmotionAnalyzer for KeywordEmotionAnalyzer {
    fn analyze(&self, entry: JournalEntry) -> BoxFuture<'_, Result<EmotionReport, AnalysisError>> {
        let report = self.analyze_now(&entry);
        async move { report }.boxed()
    }
}

fn count_hits(text: &str, words: &[&str]) -> usize {
    words.iter().map(|w| text.matches(w).count()).sum()
}

/// Emotion with the most keyword hits; earlier table entries win ties.
fn dominant_emotion(text: &str) -> Option<(Emotion, usize)> {
    KEYWORDS
        .iter()
        .map(|(emotion, words)| (*emotion, count_hits(text, words)))
        .filter(|(_, hits)| *hits > 0)
        .fold(None, |best, (emotion, hits)| match best {
            Some((_, top)) if top >= hits => best,
            _ => Some((emotion, hits)),
        })
}

fn intensity_for(hits: usize, intensifiers: usize) -> Intensity {
    match hits + intensifiers {
        0 | 1 => Intensity::Low,
        2 | 3 => Intensity::Medium,
        _ => Intensity::High,
    }
}

/// Subject particle for a Korean noun: 이 after a final consonant, 가 otherwise.
fn subject_particle(word: &str) -> &'static str {
    let has_final_consonant = word
        .chars()
        .last()
        .filter(|c| ('가'..='힣').contains(c))
        .is_some_and(|c| (u32::from(c) - u32::from('가')) % 28 != 0);
    if has_final_consonant {
        "이"
    } else {
        "가"
    }
}

fn summary(name: &str, emotion: Emotion, intensity: Intensity, locale: Locale) -> String {
    let label = emotion.label(locale);
    let level = intensity.label(locale);
    let practice = emotion.recommended_practice(locale);
    match locale {
        Locale::Korean => format!(
            "{name}님의 일기에서 {label}{} 느껴져요. 감정의 강도는 {level} 정도로 보여요. 오늘은 '{practice}'를 함께 해보면 좋겠어요.",
            subject_particle(label)
        ),
        Locale::English => format!(
            "{name}'s journal suggests {label} at a {level} level. A {practice} session could help today."
        ),
    }
}

fn neutral_summary(name: &str, locale: Locale) -> String {
    match locale {
        Locale::Korean => format!(
            "{name}님의 일기에서 뚜렷한 감정은 찾지 못했어요. 오늘은 지금 이 순간에 집중하는 시간을 가져봐요."
        ),
        Locale::English => format!(
            "{name}'s journal shows no strong emotion. Today is a good day simply to rest in the present moment."
        ),
    }
}
