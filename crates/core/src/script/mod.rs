//! Splitting a generated meditation script into intro / core / outro.
//!
//! Parsing never fails. Three strategies are tried in order:
//!
//! 1. bold header markers (`**도입부**`, `**본 명상**`, `**마무리**` and their
//!    English equivalents), found in that order;
//! 2. section names standing alone on a line (`## 도입부`, `1. INTRO:`, ...);
//! 3. a positional split into three runs of roughly equal word count.
//!
//! Any section that ends up empty is replaced by the locale's placeholder, so
//! every consumer sees three non-empty strings. [`ParsedScript::strategy`]
//! reports which strategy produced the result.

mod speech;

pub use speech::clean_for_speech;

use crate::config::Locale;
use crate::schedule::Phase;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

const HEADER_MARKERS: [&[&str]; 3] = [
    &["**도입부**", "**Intro**", "**INTRO**"],
    &["**본 명상**", "**본명상**", "**Core**", "**CORE**", "**Contents**", "**CONTENTS**"],
    &["**마무리**", "**Outro**", "**OUTRO**"],
];

static KEYWORD_LINES: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        keyword_line(r"도입부|도입|intro(?:duction)?|opening"),
        keyword_line(r"본\s*명상|core|contents?|main"),
        keyword_line(r"마무리|outro|closing"),
    ]
});

/// A line that holds nothing but a section name, optionally decorated with a
/// markdown heading, a list number, bold markers, a parenthesised gloss or a
/// trailing colon.
fn keyword_line(names: &str) -> Regex {
    let pattern = format!(
        r"(?im)^[ \t]*(?:#{{1,6}}[ \t]*)?(?:\d+[.)][ \t]*)?\**[ \t]*(?:{names})[ \t]*\**[ \t]*(?:\([^)\n]*\))?[ \t]*:?[ \t\r]*$"
    );
    // Built from fixed fragments above; compilation cannot fail at runtime.
    Regex::new(&pattern).unwrap_or_else(|e| panic!("invalid section pattern {pattern}: {e}"))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSections {
    intro: String,
    core: String,
    outro: String,
}

impl ScriptSections {
    /// Builds sections from already-split text, substituting the locale's
    /// placeholder for any blank part.
    pub fn new(
        intro: impl Into<String>,
        core: impl Into<String>,
        outro: impl Into<String>,
        locale: Locale,
    ) -> Self {
        let fill = |phase: Phase, text: String| {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                locale.empty_section_placeholder(phase)
            } else {
                trimmed.to_owned()
            }
        };
        Self {
            intro: fill(Phase::Intro, intro.into()),
            core: fill(Phase::Core, core.into()),
            outro: fill(Phase::Outro, outro.into()),
        }
    }

    pub fn placeholders(locale: Locale) -> Self {
        Self::new("", "", "", locale)
    }

    pub fn section(&self, phase: Phase) -> &str {
        match phase {
            Phase::Intro => &self.intro,
            Phase::Core => &self.core,
            Phase::Outro => &self.outro,
        }
    }

    pub fn intro(&self) -> &str {
        &self.intro
    }

    pub fn core(&self) -> &str {
        &self.core
    }

    pub fn outro(&self) -> &str {
        &self.outro
    }

    pub fn iter(&self) -> impl Iterator<Item = (Phase, &str)> {
        Phase::ALL.into_iter().map(move |p| (p, self.section(p)))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStrategy {
    Headers,
    Keywords,
    Positional,
    /// Input had no words at all.
    Empty,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedScript {
    pub sections: ScriptSections,
    pub strategy: ParseStrategy,
}

impl ParsedScript {
    /// True when the script lacked recognisable bold headers.
    pub fn used_fallback(&self) -> bool {
        self.strategy != ParseStrategy::Headers
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ScriptParser {
    locale: Locale,
}

impl ScriptParser {
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }

    pub fn parse(&self, raw: &str) -> ParsedScript {
        if let Some(parts) = split_on_headers(raw) {
            return self.finish(parts, ParseStrategy::Headers);
        }

        if let Some(parts) = split_on_keyword_lines(raw) {
            tracing::debug!("script has no bold headers; split on section-name lines");
            return self.finish(parts, ParseStrategy::Keywords);
        }

        match split_positionally(raw) {
            Some(parts) => {
                tracing::debug!("script has no recognisable sections; split into thirds by words");
                self.finish(parts, ParseStrategy::Positional)
            }
            None => ParsedScript {
                sections: ScriptSections::placeholders(self.locale),
                strategy: ParseStrategy::Empty,
            },
        }
    }

    fn finish(&self, [intro, core, outro]: [&str; 3], strategy: ParseStrategy) -> ParsedScript {
        ParsedScript {
            sections: ScriptSections::new(intro, core, outro, self.locale),
            strategy,
        }
    }
}

/// Byte range `(start, end)` of each located section marker.
type MarkerSpans = [(usize, usize); 3];

fn split_on_headers(raw: &str) -> Option<[&str; 3]> {
    let mut spans: MarkerSpans = [(0, 0); 3];
    let mut cursor = 0;
    for (slot, markers) in spans.iter_mut().zip(HEADER_MARKERS) {
        let (start, len) = markers
            .iter()
            .filter_map(|m| raw[cursor..].find(m).map(|at| (cursor + at, m.len())))
            .min_by_key(|(at, _)| *at)?;
        *slot = (start, start + len);
        cursor = start + len;
    }
    Some(bodies_between(raw, &spans))
}

fn split_on_keyword_lines(raw: &str) -> Option<[&str; 3]> {
    let mut spans: MarkerSpans = [(0, 0); 3];
    let mut cursor = 0;
    for (slot, pattern) in spans.iter_mut().zip(KEYWORD_LINES.iter()) {
        let found = pattern.find_at(raw, cursor)?;
        *slot = (found.start(), found.end());
        cursor = found.end();
    }
    Some(bodies_between(raw, &spans))
}

/// Text between consecutive markers. Anything before the first marker is a
/// preamble and is dropped.
fn bodies_between<'a>(raw: &'a str, spans: &MarkerSpans) -> [&'a str; 3] {
    [
        &raw[spans[0].1..spans[1].0],
        &raw[spans[1].1..spans[2].0],
        &raw[spans[2].1..],
    ]
}

/// Cuts at word starts so multi-byte text is never split inside a character
/// and the original line breaks inside each part survive.
fn split_positionally(raw: &str) -> Option<[&str; 3]> {
    let mut word_starts = Vec::new();
    let mut in_word = false;
    for (at, ch) in raw.char_indices() {
        let is_space = ch.is_whitespace();
        if !is_space && !in_word {
            word_starts.push(at);
        }
        in_word = !is_space;
    }

    let words = word_starts.len();
    if words == 0 {
        return None;
    }

    let cut = |nth: usize| word_starts.get(nth).copied().unwrap_or(raw.len());
    let first = cut(words.div_ceil(3));
    let second = cut((2 * words).div_ceil(3));
    Some([&raw[..first], &raw[first..second], &raw[second..]])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> ParsedScript {
        ScriptParser::new(Locale::Korean).parse(raw)
    }

    #[test]
    fn splits_on_korean_bold_headers() {
        let parsed = parse("**도입부**\nhello\n**본 명상**\nworld\n**마무리**\nbye");
        assert_eq!(parsed.strategy, ParseStrategy::Headers);
        assert!(!parsed.used_fallback());
        assert_eq!(parsed.sections.intro(), "hello");
        assert_eq!(parsed.sections.core(), "world");
        assert_eq!(parsed.sections.outro(), "bye");
    }

    #[test]
    fn preamble_before_first_header_is_dropped() {
        let parsed = parse("다음은 명상 가이드입니다.\n\n**도입부**\n안녕하세요\n**본 명상**\n숨을 쉬세요\n**마무리**\n고마워요\n");
        assert_eq!(parsed.sections.intro(), "안녕하세요");
        assert_eq!(parsed.sections.outro(), "고마워요");
    }

    #[test]
    fn empty_header_body_gets_placeholder_for_that_section_only() {
        let parsed = parse("**도입부**\n시작\n**본 명상**\n\n**마무리**\n끝");
        assert_eq!(parsed.strategy, ParseStrategy::Headers);
        assert_eq!(parsed.sections.intro(), "시작");
        assert_eq!(
            parsed.sections.core(),
            Locale::Korean.empty_section_placeholder(Phase::Core)
        );
        assert_eq!(parsed.sections.outro(), "끝");
    }

    #[test]
    fn headers_only_yield_three_placeholders() {
        let parsed = parse("**도입부****본 명상****마무리**");
        for (phase, text) in parsed.sections.iter() {
            assert_eq!(text, Locale::Korean.empty_section_placeholder(phase));
        }
    }

    #[test]
    fn out_of_order_headers_fall_back() {
        let parsed = parse("**마무리**\nbye\n**도입부**\nhello\n**본 명상**\nworld");
        assert!(parsed.used_fallback());
    }

    #[test]
    fn english_headers_are_accepted() {
        let parsed = ScriptParser::new(Locale::English)
            .parse("**Intro**\nWelcome.\n**Core**\nBreathe.\n**Outro**\nThank you.");
        assert_eq!(parsed.strategy, ParseStrategy::Headers);
        assert_eq!(parsed.sections.core(), "Breathe.");
    }

    #[test]
    fn plain_section_lines_are_the_second_strategy() {
        let raw = "### 1. INTRO (도입부)\n편안히 앉으세요.\n\n## 본 명상:\n호흡을 느껴보세요.\n\n마무리\n천천히 눈을 뜨세요.";
        let parsed = parse(raw);
        assert_eq!(parsed.strategy, ParseStrategy::Keywords);
        assert!(parsed.used_fallback());
        assert_eq!(parsed.sections.intro(), "편안히 앉으세요.");
        assert_eq!(parsed.sections.core(), "호흡을 느껴보세요.");
        assert_eq!(parsed.sections.outro(), "천천히 눈을 뜨세요.");
    }

    #[test]
    fn section_names_inside_prose_do_not_count_as_markers() {
        let raw = "오늘의 도입부는 짧습니다 그리고 본 명상은 길고 마무리는 부드럽습니다";
        assert_eq!(parse(raw).strategy, ParseStrategy::Positional);
    }

    #[test]
    fn positional_split_keeps_whole_words() {
        let parsed = parse("하나 둘 셋 넷 다섯 여섯");
        assert_eq!(parsed.strategy, ParseStrategy::Positional);
        assert_eq!(parsed.sections.intro(), "하나 둘");
        assert_eq!(parsed.sections.core(), "셋 넷");
        assert_eq!(parsed.sections.outro(), "다섯 여섯");
    }

    #[test]
    fn positional_split_with_uneven_word_count() {
        let parsed = parse("one two three four five six seven");
        assert_eq!(parsed.sections.intro(), "one two three");
        assert_eq!(parsed.sections.core(), "four five");
        assert_eq!(parsed.sections.outro(), "six seven");
    }

    #[test]
    fn single_word_fills_intro_and_placeholders_the_rest() {
        let parsed = parse("  숨  ");
        assert_eq!(parsed.sections.intro(), "숨");
        assert_eq!(
            parsed.sections.core(),
            Locale::Korean.empty_section_placeholder(Phase::Core)
        );
        assert_eq!(
            parsed.sections.outro(),
            Locale::Korean.empty_section_placeholder(Phase::Outro)
        );
    }

    #[test]
    fn empty_input_yields_placeholders() {
        for raw in ["", "   \n\t  "] {
            let parsed = parse(raw);
            assert_eq!(parsed.strategy, ParseStrategy::Empty);
            assert_eq!(parsed.sections, ScriptSections::placeholders(Locale::Korean));
        }
    }

    #[test]
    fn no_section_is_ever_blank() {
        let inputs = [
            "",
            "**도입부**",
            "**도입부**\n**본 명상**",
            "**도입부**\n\n**본 명상**\n\n**마무리**\n\n",
            "도입부\n본 명상\n마무리",
            "word",
            "두 단어",
            "가나다라마바사아자차카타파하 🌿 명상",
        ];
        for raw in inputs {
            let parsed = parse(raw);
            for (phase, text) in parsed.sections.iter() {
                assert!(!text.trim().is_empty(), "{phase} blank for {raw:?}");
            }
        }
    }
}
