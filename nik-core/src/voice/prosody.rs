//! Emphasis and pause markup for engines that understand SSML-style tags.

/// Words spoken with strong emphasis.
const EMPHASIS_WORDS: &[&str] = &[
    "important",
    "critical",
    "urgent",
    "warning",
    "error",
    "success",
    "great",
    "amazing",
    "wonderful",
    "terrible",
];

const SENTENCE_BREAK: &str = r#"<break time="500ms"/>"#;
const CLAUSE_BREAK: &str = r#"<break time="300ms"/>"#;

/// Wrap emphasis words and insert breaks after punctuation.
///
/// Emphasis matching is per whitespace-separated word, exact and
/// case-insensitive, so `great!` is left alone while `Great` is wrapped.
pub fn to_markup(text: &str) -> String {
    add_pauses(&add_emphasis(text))
}

fn add_emphasis(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            if EMPHASIS_WORDS.contains(&word.to_lowercase().as_str()) {
                format!("<emphasis level='strong'>{word}</emphasis>")
            } else {
                word.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn add_pauses(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 32);
    for c in text.chars() {
        out.push(c);
        match c {
            '.' | '!' | '?' => {
                out.push(' ');
                out.push_str(SENTENCE_BREAK);
            }
            ',' => {
                out.push(' ');
                out.push_str(CLAUSE_BREAK);
            }
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emphasis_wraps_whole_words_only() {
        assert_eq!(
            add_emphasis("a Great day, truly great!"),
            "a <emphasis level='strong'>Great</emphasis> day, truly great!"
        );
    }

    #[test]
    fn pauses_follow_punctuation() {
        assert_eq!(
            add_pauses("Hi, there."),
            r#"Hi, <break time="300ms"/> there. <break time="500ms"/>"#
        );
    }

    #[test]
    fn markup_combines_both_passes() {
        let marked = to_markup("Warning, low battery!");
        assert!(marked.starts_with("Warning, <break"), "{marked}");
        assert!(marked.ends_with(r#"battery! <break time="500ms"/>"#), "{marked}");

        let marked = to_markup("this is important");
        assert_eq!(marked, "this is <emphasis level='strong'>important</emphasis>");
    }
}
