//! Meditation script generation with an offline fallback.

mod openai;
mod template;

pub use openai::OpenAiScriptGenerator;
pub use template::TemplateScriptGenerator;

use crate::config::Locale;
use crate::openai::ChatError;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

const LOG_TARGET: &str = "generate";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScriptRequest {
    pub name: String,
    pub journal: String,
    pub duration_minutes: u32,
    pub locale: Locale,
}

#[derive(thiserror::Error, Debug)]
pub enum GenerateError {
    #[error("generated script was empty")]
    EmptyScript,
    #[error(transparent)]
    Chat(#[from] ChatError),
}

/// Produces a raw script with bold section headers, ready for the parser.
pub trait ScriptGenerator: Send + Sync {
    fn generate(&self, request: ScriptRequest) -> BoxFuture<'_, Result<String, GenerateError>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptSource {
    Generated,
    Template,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedScript {
    pub text: String,
    pub source: ScriptSource,
}

/// Tries `primary`; on any failure or an empty answer, falls back to the
/// built-in template. Always returns a non-empty script.
pub async fn generate_with_fallback(
    primary: &dyn ScriptGenerator,
    request: ScriptRequest,
) -> GeneratedScript {
    match primary.generate(request.clone()).await {
        Ok(text) if !text.trim().is_empty() => GeneratedScript {
            text,
            source: ScriptSource::Generated,
        },
        Ok(_) => {
            tracing::warn!(target: LOG_TARGET, "generator returned an empty script; using template");
            template_script(&request)
        }
        Err(e) => {
            tracing::warn!(target: LOG_TARGET, error = %e, "script generation failed; using template");
            template_script(&request)
        }
    }
}

fn template_script(request: &ScriptRequest) -> GeneratedScript {
    GeneratedScript {
        text: TemplateScriptGenerator::new().render(request),
        source: ScriptSource::Template,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    struct Canned(Result<&'static str, ()>);

    impl ScriptGenerator for Canned {
        fn generate(&self, _request: ScriptRequest) -> BoxFuture<'_, Result<String, GenerateError>> {
            let result = self
                .0
                .map(str::to_owned)
                .map_err(|()| GenerateError::Chat(ChatError::QuotaExhausted));
            async move { result }.boxed()
        }
    }

    fn request() -> ScriptRequest {
        ScriptRequest {
            name: "지민".into(),
            journal: "조금 지친 하루".into(),
            duration_minutes: 10,
            locale: Locale::Korean,
        }
    }

    #[tokio::test]
    async fn uses_primary_when_it_answers() {
        let script = generate_with_fallback(&Canned(Ok("**도입부**\n안녕")), request()).await;
        assert_eq!(script.source, ScriptSource::Generated);
        assert_eq!(script.text, "**도입부**\n안녕");
    }

    #[tokio::test]
    async fn falls_back_on_error_or_blank_answer() {
        for canned in [Canned(Err(())), Canned(Ok("  \n"))] {
            let script = generate_with_fallback(&canned, request()).await;
            assert_eq!(script.source, ScriptSource::Template);
            assert!(script.text.contains("지민님"));
        }
    }
}
