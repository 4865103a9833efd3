//! Word, sentence and paragraph splitting shared by the lexical index and
//! the answer assembler.
//!
//! A *word* is a maximal run of alphanumeric characters or `_`, the same
//! class a `\w` regex matches.

/// True for characters that belong to a word.
pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Iterate the words of `text` as borrowed slices, in order.
pub fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !is_word_char(c))
        .filter(|w| !w.is_empty())
}

/// Lowercased words of `text`.
pub fn lowercase_words(text: &str) -> impl Iterator<Item = String> + '_ {
    words(text).map(|w| w.to_lowercase())
}

/// Split after `.`, `!` or `?` when followed by whitespace.
///
/// The terminal punctuation stays with its sentence; the whitespace run
/// between sentences is dropped. Returned sentences are trimmed and never
/// empty.
pub fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let end = i + c.len_utf8();
        match chars.peek() {
            Some(&(_, next)) if next.is_whitespace() => {
                push_trimmed(&mut out, &text[start..end]);
                start = end;
            }
            _ => {}
        }
    }
    push_trimmed(&mut out, &text[start..]);
    out
}

/// Split on blank lines (a line containing only whitespace).
///
/// Returned paragraphs are trimmed and never empty.
pub fn paragraphs(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    let mut end = 0;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        if line.trim().is_empty() {
            if let Some(s) = start.take() {
                push_trimmed(&mut out, &text[s..end]);
            }
        } else {
            if start.is_none() {
                start = Some(offset);
            }
            end = offset + line.len();
        }
        offset += line.len();
    }
    if let Some(s) = start {
        push_trimmed(&mut out, &text[s..end]);
    }
    out
}

fn push_trimmed<'a>(out: &mut Vec<&'a str>, span: &'a str) {
    let span = span.trim();
    if !span.is_empty() {
        out.push(span);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words_split_on_punctuation() {
        let w: Vec<&str> = words("Canvas-enrollment: it's snake_case, v2!").collect();
        assert_eq!(w, vec!["Canvas", "enrollment", "it", "s", "snake_case", "v2"]);
    }

    #[test]
    fn test_lowercase_words_unicode() {
        let w: Vec<String> = lowercase_words("Élève ÉCOLE").collect();
        assert_eq!(w, vec!["élève", "école"]);
    }

    #[test]
    fn test_sentences_keep_terminal_punctuation() {
        let s = sentences("First one. Second one!  Third?\nFourth without end");
        assert_eq!(
            s,
            vec!["First one.", "Second one!", "Third?", "Fourth without end"]
        );
    }

    #[test]
    fn test_sentences_ignore_inner_dots() {
        let s = sentences("Version 1.2 is out. See canvas.acu.edu.au for details.");
        assert_eq!(
            s,
            vec!["Version 1.2 is out.", "See canvas.acu.edu.au for details."]
        );
    }

    #[test]
    fn test_sentences_empty() {
        assert!(sentences("").is_empty());
        assert!(sentences("   \n ").is_empty());
    }

    #[test]
    fn test_paragraphs_split_on_blank_lines() {
        let p = paragraphs("Intro line\nstill intro\n\n  \t\nSecond para\n\n\nThird\n");
        assert_eq!(p, vec!["Intro line\nstill intro", "Second para", "Third"]);
    }

    #[test]
    fn test_paragraphs_single() {
        assert_eq!(paragraphs("  just one  "), vec!["just one"]);
        assert!(paragraphs("\n\n").is_empty());
    }
}
