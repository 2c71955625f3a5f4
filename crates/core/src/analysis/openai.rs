use crate::analysis::{AnalysisError, EmotionAnalyzer, EmotionReport, JournalEntry};
use crate::config::Locale;
use crate::openai::{ChatClient, ChatPrompt};
use futures::future::BoxFuture;
use futures::FutureExt;

const LOG_TARGET: &str = "analysis::openai";
const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 200;

const SYSTEM_KO: &str = "당신은 감정 분석 전문가입니다. 사용자의 일기를 읽고 주요 감정, 감정의 강도(낮음/보통/높음), \
주요 원인, 권장 명상 유형을 파악해 따뜻한 한국어 2-3문장으로 요약하세요.";
const SYSTEM_EN: &str = "You analyse journal entries. Identify the main emotion, its intensity (low/medium/high), \
the likely cause and a suitable meditation type, then summarise warmly in 2-3 English sentences.";

/// Free-text analysis through a chat completion. Only the summary is filled
/// in; the structured fields stay empty.
#[derive(Clone)]
pub struct OpenAiEmotionAnalyzer {
    chat: ChatClient,
}

impl OpenAiEmotionAnalyzer {
    pub fn new(chat: ChatClient) -> Self {
        Self { chat }
    }
}

fn prompt(entry: &JournalEntry) -> ChatPrompt {
    let (system, user) = match entry.locale {
        Locale::Korean => (
            SYSTEM_KO,
            format!("{}님의 일기를 분석해주세요: \"{}\"", entry.name, entry.text.trim()),
        ),
        Locale::English => (
            SYSTEM_EN,
            format!("Please analyse {}'s journal: \"{}\"", entry.name, entry.text.trim()),
        ),
    };
    ChatPrompt {
        system: system.to_owned(),
        user,
        temperature: TEMPERATURE,
        max_tokens: MAX_TOKENS,
    }
}

impl EmotionAnalyzer for OpenAiEmotionAnalyzer {
    fn analyze(&self, entry: JournalEntry) -> BoxFuture<'_, Result<EmotionReport, AnalysisError>> {
        async move {
            if entry.text.trim().is_empty() {
                return Err(AnalysisError::EmptyJournal);
            }
            tracing::debug!(target: LOG_TARGET, chars = entry.text.chars().count(), "analysing journal");
            let summary = self.chat.complete(&prompt(&entry)).await?;
            Ok(EmotionReport {
                summary,
                emotion: None,
                intensity: None,
            })
        }
        .boxed()
    }
}
