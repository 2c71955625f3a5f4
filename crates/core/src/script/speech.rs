use regex::Regex;
use std::sync::LazyLock;

static HEADING: LazyLock<Regex> = LazyLock::new(|| compile(r"(?m)^[ \t]*#+[ \t]*"));
static BOLD: LazyLock<Regex> = LazyLock::new(|| compile(r"\*\*([^*]+)\*\*"));
static ITALIC: LazyLock<Regex> = LazyLock::new(|| compile(r"\*([^*]+)\*"));
static ASIDE: LazyLock<Regex> = LazyLock::new(|| compile(r"[ \t]*\([^)]*\)"));
static SPACES: LazyLock<Regex> = LazyLock::new(|| compile(r"[ \t]+"));

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid speech pattern {pattern}: {e}"))
}

/// Turns script text into something a speech engine can read aloud.
///
/// Markdown headings and emphasis markers go, parenthesised asides (timings,
/// stage directions) are removed, and lines are joined into one flowing
/// utterance: a line that already ends a sentence is followed by a space,
/// any other line break becomes a comma pause.
pub fn clean_for_speech(text: &str) -> String {
    let text = HEADING.replace_all(text, "");
    let text = BOLD.replace_all(&text, "$1");
    let text = ITALIC.replace_all(&text, "$1");
    let text = ASIDE.replace_all(&text, "");

    let mut spoken = String::with_capacity(text.len());
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if !spoken.is_empty() {
            if ends_sentence(&spoken) {
                spoken.push(' ');
            } else {
                spoken.push_str(", ");
            }
        }
        spoken.push_str(&SPACES.replace_all(line, " "));
    }
    spoken.trim().to_owned()
}

fn ends_sentence(s: &str) -> bool {
    s.trim_end()
        .chars()
        .last()
        .is_some_and(|c| matches!(c, '.' | '!' | '?' | '…' | ',' | '。'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_and_asides() {
        let cleaned = clean_for_speech("## 도입부\n**지민님**, 반가워요 (약 2분).\n*천천히* 숨을 쉬어보세요.");
        assert_eq!(cleaned, "도입부, 지민님, 반가워요. 천천히 숨을 쉬어보세요.");
    }

    #[test]
    fn joins_lines_with_pauses() {
        assert_eq!(
            clean_for_speech("숨을 들이마시고\n\n내쉬어보세요.\n좋아요"),
            "숨을 들이마시고, 내쉬어보세요. 좋아요"
        );
    }

    #[test]
    fn collapses_inner_whitespace() {
        assert_eq!(clean_for_speech("  a \t  b   "), "a b");
    }

    #[test]
    fn blank_or_markup_only_text_becomes_empty() {
        assert_eq!(clean_for_speech(""), "");
        assert_eq!(clean_for_speech("###\n(쉼)\n"), "");
    }
}
