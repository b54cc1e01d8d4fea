use std::borrow::Cow;

/// Ellipsis appended to truncated descriptions
const ELLIPSIS: &str = "...";

/// Truncates a string to at most `max_chars` characters.
///
/// When truncation happens, the last three characters of the budget are
/// replaced with `...` so the result never exceeds `max_chars`. Budgets of
/// three or fewer characters cut without an ellipsis. A budget of zero
/// disables truncation.
///
/// Counts Unicode scalar values, never splitting a code point.
///
/// # Examples
///
/// ```
/// use feedsnap::util::truncate_chars;
///
/// assert_eq!(truncate_chars("Short", 10), "Short");
/// assert_eq!(truncate_chars("Hello World", 8), "Hello...");
/// assert_eq!(truncate_chars("Hello World", 0), "Hello World");
/// ```
pub fn truncate_chars(s: &str, max_chars: usize) -> Cow<'_, str> {
    if max_chars == 0 || s.chars().nth(max_chars).is_none() {
        return Cow::Borrowed(s);
    }

    if max_chars <= ELLIPSIS.len() {
        let end = byte_offset(s, max_chars);
        return Cow::Owned(s[..end].to_owned());
    }

    let end = byte_offset(s, max_chars - ELLIPSIS.len());
    Cow::Owned(format!("{}{}", s[..end].trim_end(), ELLIPSIS))
}

fn byte_offset(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map(|(i, _)| i).unwrap_or(s.len())
}

/// Removes HTML/XML tags and collapses runs of whitespace into single spaces.
///
/// This is a lexical scan, not an HTML parser: anything between `<` and the
/// next `>` is dropped. HTML entities, named and numeric, are decoded afterwards.
/// Returns `Cow::Borrowed` when the input is already plain, single-spaced text.
pub fn strip_html(s: &str) -> Cow<'_, str> {
    let plain = !s.contains(['<', '&']) && !has_irregular_whitespace(s);
    if plain {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    let mut pending_space = false;

    for c in s.chars() {
        match c {
            '<' => {
                in_tag = true;
                // Tags separate words
                pending_space = true;
            }
            '>' if in_tag => in_tag = false,
            _ if in_tag => {}
            c if c.is_whitespace() => pending_space = true,
            c => {
                if pending_space && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
                out.push(c);
            }
        }
    }

    Cow::Owned(html_escape::decode_html_entities(&out).into_owned())
}

fn has_irregular_whitespace(s: &str) -> bool {
    if s.starts_with(char::is_whitespace) || s.ends_with(char::is_whitespace) {
        return true;
    }
    let mut prev_space = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if prev_space || c != ' ' {
                return true;
            }
            prev_space = true;
        } else {
            prev_space = false;
        }
    }
    false
}

/// Strips ASCII control characters (except tab, newline and carriage return)
/// from feed-supplied text.
///
/// Returns `Cow::Borrowed` when the input contains none (common case).
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let is_control = |c: char| c == '\x7f' || (c < ' ' && !matches!(c, '\t' | '\n' | '\r'));

    if !s.chars().any(is_control) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.chars().filter(|&c| !is_control(c)).collect())
}
