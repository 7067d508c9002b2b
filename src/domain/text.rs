//! Pure derivations over post bodies: word counts, reading time, excerpts.

/// Average reading speed used for the estimate, in words per minute.
const WORDS_PER_MINUTE: usize = 200;

/// Longest derived excerpt, in characters of plain text.
const EXCERPT_MAX_CHARS: usize = 280;

/// Count the words in a markdown body.
///
/// A word is a maximal run of alphanumeric characters, so punctuation and
/// markdown syntax do not inflate the count.
pub fn word_count(body: &str) -> usize {
    body.split(|ch: char| !ch.is_alphanumeric())
        .filter(|fragment| !fragment.is_empty())
        .count()
}

/// Estimated minutes to read the body, never less than one.
pub fn reading_minutes(body: &str) -> i32 {
    let words = word_count(body);
    let minutes = (words + WORDS_PER_MINUTE / 2) / WORDS_PER_MINUTE;
    minutes.max(1) as i32
}

/// Derive a plain-text excerpt from a markdown body.
///
/// Fenced code blocks are skipped entirely; heading markers, blockquote
/// markers, list bullets, emphasis characters and link syntax are stripped.
/// The result is truncated at a word boundary with an ellipsis.
pub fn derive_excerpt(body: &str) -> String {
    let mut plain = String::new();
    let mut in_fence = false;

    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence || trimmed.is_empty() {
            continue;
        }

        let stripped = strip_inline_markup(strip_line_prefix(trimmed));
        if stripped.is_empty() {
            continue;
        }

        if !plain.is_empty() {
            plain.push(' ');
        }
        plain.push_str(&stripped);

        if plain.chars().count() > EXCERPT_MAX_CHARS {
            break;
        }
    }

    truncate_at_word_boundary(&plain, EXCERPT_MAX_CHARS)
}

fn strip_line_prefix(line: &str) -> &str {
    let line = line.trim_start_matches('#').trim_start();
    let line = line.strip_prefix('>').map(str::trim_start).unwrap_or(line);
    line.strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .unwrap_or(line)
}

fn strip_inline_markup(line: &str) -> String {
    let mut output = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '*' | '_' | '`' => {}
            // Image syntax: drop the alt-text bang, the link handling below
            // keeps the label.
            '!' if chars.peek() == Some(&'[') => {}
            '[' => {}
            ']' => {
                // Consume a following `(url)` group, keeping only the label.
                if chars.peek() == Some(&'(') {
                    for inner in chars.by_ref() {
                        if inner == ')' {
                            break;
                        }
                    }
                }
            }
            other => output.push(other),
        }
    }

    output.trim().to_string()
}

fn truncate_at_word_boundary(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let cut: String = text.chars().take(max_chars).collect();
    let boundary = cut.rfind(char::is_whitespace).unwrap_or(cut.len());
    let mut truncated = cut[..boundary].trim_end().to_string();
    truncated.push('…');
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_count_ignores_punctuation() {
        assert_eq!(word_count("Hello, world! It's me."), 5);
        assert_eq!(word_count(""), 0);
    }

    #[test]
    fn short_bodies_read_in_one_minute() {
        assert_eq!(reading_minutes("a few words only"), 1);
        assert_eq!(reading_minutes(""), 1);
    }

    #[test]
    fn reading_time_rounds_to_nearest_minute() {
        let body_300 = "word ".repeat(300);
        assert_eq!(reading_minutes(&body_300), 2);

        let body_450 = "word ".repeat(450);
        assert_eq!(reading_minutes(&body_450), 2);

        let body_500 = "word ".repeat(500);
        assert_eq!(reading_minutes(&body_500), 3);
    }

    #[test]
    fn excerpt_strips_markdown_syntax() {
        let body = "# Title\n\nSome *emphasis* and a [link](https://example.com).\n";
        assert_eq!(derive_excerpt(body), "Title Some emphasis and a link.");
    }

    #[test]
    fn excerpt_skips_code_fences() {
        let body = "Intro paragraph.\n\n```rust\nfn main() {}\n```\n\nOutro.";
        assert_eq!(derive_excerpt(body), "Intro paragraph. Outro.");
    }

    #[test]
    fn excerpt_truncates_long_bodies_at_word_boundary() {
        let body = "word ".repeat(100);
        let excerpt = derive_excerpt(&body);
        assert!(excerpt.ends_with('…'));
        assert!(excerpt.chars().count() <= 281);
        assert!(!excerpt.contains("word…word"));
    }
}
