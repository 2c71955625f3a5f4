use crate::config::Locale;
use crate::generate::{GenerateError, ScriptGenerator, ScriptRequest};
use crate::schedule::Phase;
use futures::future::BoxFuture;
use futures::FutureExt;

/// Fixed breathing-meditation script personalised only by name and length.
#[derive(Clone, Debug, Default)]
pub struct TemplateScriptGenerator;

impl TemplateScriptGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, request: &ScriptRequest) -> String {
        let name = request.name.trim();
        let minutes = request.duration_minutes;
        let header = |phase| format!("**{}**", request.locale.section_name(phase));
        let (intro, core, outro) = match request.locale {
            Locale::Korean => (
                format!(
                    "안녕하세요, {name}님. 오늘 하루도 정말 고생 많으셨어요. 지금부터 {minutes}분 동안 모든 걸 잠시 내려놓고 저와 함께 편안한 시간을 보내보겠습니다.\n\
                     편안하게 앉아 어깨의 힘을 살짝 빼보세요. 천천히 눈을 감아도 좋아요."
                ),
                format!(
                    "이제 숨쉬는 것에 집중해보겠습니다. 깊게 숨을 들이마시고... 천천히 내쉬어보세요.\n\
                     {name}님, 생각이 떠오르면 구름이 지나가듯 그냥 바라보세요. 그리고 다시 호흡으로 돌아오면 됩니다.\n\
                     숨이 들어오고 나가는 것을 느끼면서 몸이 조금씩 편안해지는 것을 알아차려보세요."
                ),
                format!(
                    "이제 천천히 주변의 소리에 귀를 기울여보세요. {name}님, 오늘 느낀 이 평온한 마음을 기억해주세요.\n\
                     준비가 되면 천천히 눈을 떠보세요. 함께해주셔서 고마워요."
                ),
            ),
            Locale::English => (
                format!(
                    "Hello, {name}. Thank you for taking the next {minutes} minutes for yourself.\n\
                     Sit comfortably, let your shoulders soften, and close your eyes if you like."
                ),
                format!(
                    "Now bring your attention to your breath. Breathe in deeply... and slowly let it go.\n\
                     {name}, when thoughts arrive, let them pass like clouds and gently return to the breath.\n\
                     Notice the air moving in and out, and your body settling a little more each time."
                ),
                format!(
                    "Begin to notice the sounds around you again. {name}, remember this calm as you go on with your day.\n\
                     When you are ready, slowly open your eyes. Thank you for practising with me."
                ),
            ),
        };
        format!(
            "{}\n{intro}\n\n{}\n{core}\n\n{}\n{outro}\n",
            header(Phase::Intro),
            header(Phase::Core),
            header(Phase::Outro)
        )
    }
}

impl ScriptGenerator for TemplateScriptGenerator {
    fn generate(&self, request: ScriptRequest) -> BoxFuture<'_, Result<String, GenerateError>> {
        let script = self.render(&request);
        async move { Ok(script) }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{ParseStrategy, ScriptParser};

    fn request(locale: Locale) -> ScriptRequest {
        ScriptRequest {
            name: " 지민 ".into(),
            journal: String::new(),
            duration_minutes: 20,
            locale,
        }
    }

    #[test]
    fn korean_template_parses_on_headers() {
        let script = TemplateScriptGenerator::new().render(&request(Locale::Korean));
        let parsed = ScriptParser::new(Locale::Korean).parse(&script);
        assert_eq!(parsed.strategy, ParseStrategy::Headers);
        assert!(parsed.sections.intro().starts_with("안녕하세요, 지민님."));
        assert!(parsed.sections.intro().contains("20분"));
        assert!(parsed.sections.outro().ends_with("고마워요."));
    }

    #[test]
    fn english_template_parses_on_headers() {
        let script = TemplateScriptGenerator::new().render(&request(Locale::English));
        let parsed = ScriptParser::new(Locale::English).parse(&script);
        assert_eq!(parsed.strategy, ParseStrategy::Headers);
        assert!(parsed.sections.core().starts_with("Now bring your attention"));
    }
}
