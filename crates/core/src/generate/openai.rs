use crate::config::Locale;
use crate::generate::{GenerateError, ScriptGenerator, ScriptRequest};
use crate::openai::{ChatClient, ChatPrompt};
use futures::future::BoxFuture;
use futures::FutureExt;

const LOG_TARGET: &str = "generate::openai";
const TEMPERATURE: f32 = 0.8;
const MAX_TOKENS: u32 = 2000;

const SYSTEM_KO: &str = "당신은 따뜻한 명상 가이드 작가입니다. 사용자의 일기에 공감하는 개인화된 명상 스크립트를 \
한국어로 쓰세요. 반드시 **도입부**, **본 명상**, **마무리** 세 개의 헤더를 순서대로 사용하고, \
사용자의 이름을 자연스럽게 불러주세요.";
const SYSTEM_EN: &str = "You write warm, personalised guided meditations in English that respond to the user's journal. \
Always use the three headers **Intro**, **Core** and **Outro** in that order and address the user by name.";

/// Script generation through a chat completion.
#[derive(Clone)]
pub struct OpenAiScriptGenerator {
    chat: ChatClient,
}

impl OpenAiScriptGenerator {
    pub fn new(chat: ChatClient) -> Self {
        Self { chat }
    }
}

fn prompt(request: &ScriptRequest) -> ChatPrompt {
    let name = request.name.trim();
    let minutes = request.duration_minutes;
    let journal = request.journal.trim();
    let (system, user) = match request.locale {
        Locale::Korean => (
            SYSTEM_KO,
            format!(
                "이름: {name}\n명상 길이: {minutes}분\n일기: \"{journal}\"\n\n\
                 위 정보를 바탕으로 {name}님의 현재 상태에 맞는 {minutes}분짜리 개인화된 명상 가이드를 \
                 자연스러운 텍스트 포맷으로 만들어주세요."
            ),
        ),
        Locale::English => (
            SYSTEM_EN,
            format!(
                "Name: {name}\nLength: {minutes} minutes\nJournal: \"{journal}\"\n\n\
                 Write a {minutes}-minute personalised meditation guide for {name} based on the above, as plain text."
            ),
        ),
    };
    ChatPrompt {
        system: system.to_owned(),
        user,
        temperature: TEMPERATURE,
        max_tokens: MAX_TOKENS,
    }
}

impl ScriptGenerator for OpenAiScriptGenerator {
    fn generate(&self, request: ScriptRequest) -> BoxFuture<'_, Result<String, GenerateError>> {
        async move {
            tracing::debug!(
                target: LOG_TARGET,
                minutes = request.duration_minutes,
                locale = request.locale.lang_tag(),
                "requesting meditation script"
            );
            let script = self.chat.complete(&prompt(&request)).await?;
            if script.trim().is_empty() {
                return Err(GenerateError::EmptyScript);
            }
            tracing::info!(target: LOG_TARGET, chars = script.chars().count(), "script generated");
            Ok(script)
        }
        .boxed()
    }
}
