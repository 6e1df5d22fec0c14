//! Lexical helpers for pattern-based source analysis.
//!
//! These are not tokenizers. They know just enough about string literals and
//! comments to keep bracket matching and argument splitting from being fooled by
//! a `}` inside a string or an apostrophe inside a comment.

/// Comment and string-literal conventions of the analysed language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    /// `//` and `/* */` comments; `'`, `"` and `` ` `` strings
    JavaScript,
    /// `#` comments; `'`, `"` and triple-quoted strings
    Python,
}

/// Outcome of matching a delimited block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimited {
    /// Index one past the closing delimiter
    Closed(usize),
    /// Nesting exceeded the allowed depth
    TooDeep,
    /// Input ended before the block closed
    Unterminated,
}

/// If a comment or string literal starts at `i`, returns the index just past it.
fn skip_trivia(bytes: &[u8], i: usize, syntax: Syntax) -> Option<usize> {
    let b = bytes[i];
    let next = bytes.get(i + 1).copied();

    match syntax {
        Syntax::JavaScript => match (b, next) {
            (b'/', Some(b'/')) => Some(find_byte(bytes, i + 2, b'\n').unwrap_or(bytes.len())),
            (b'/', Some(b'*')) => Some(
                find_seq(bytes, i + 2, b"*/")
                    .map(|end| end + 2)
                    .unwrap_or(bytes.len()),
            ),
            (b'\'' | b'"' | b'`', _) => Some(skip_quoted(bytes, i + 1, b)),
            (b'/', _) if regex_allowed(bytes, i) => skip_regex(bytes, i + 1),
            _ => None,
        },
        Syntax::Python => match b {
            b'#' => Some(find_byte(bytes, i + 1, b'\n').unwrap_or(bytes.len())),
            b'\'' | b'"' => {
                let triple = [b, b, b];
                if bytes[i..].starts_with(&triple) {
                    Some(
                        find_seq(bytes, i + 3, &triple)
                            .map(|end| end + 3)
                            .unwrap_or(bytes.len()),
                    )
                } else {
                    Some(skip_quoted(bytes, i + 1, b))
                }
            }
            _ => None,
        },
    }
}

/// `true` when a `/` at `i` starts a regex literal rather than a division.
///
/// Decided by the previous significant byte: an operator or opening punctuation,
/// or the keywords `return` and `typeof`.
fn regex_allowed(bytes: &[u8], i: usize) -> bool {
    let before = &bytes[..i];
    let Some(last) = before.iter().rposition(|b| !b.is_ascii_whitespace()) else {
        return true;
    };

    match before[last] {
        b'(' | b',' | b'=' | b':' | b'[' | b'!' | b'&' | b'|' | b'?' | b'{' | b'}' | b';' => true,
        _ => {
            let word_start = before[..=last]
                .iter()
                .rposition(|&b| !(b.is_ascii_alphanumeric() || b == b'_' || b == b'$'))
                .map_or(0, |p| p + 1);
            matches!(&before[word_start..=last], b"return" | b"typeof")
        }
    }
}

/// Index just past a regex literal's closing `/` and flags, `i` being the byte after
/// the opening `/`. `None` when the line ends first.
fn skip_regex(bytes: &[u8], mut i: usize) -> Option<usize> {
    let mut in_class = false;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return None,
            b'[' => {
                in_class = true;
                i += 1;
            }
            b']' => {
                in_class = false;
                i += 1;
            }
            b'/' if !in_class => {
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
                    i += 1;
                }
                return Some(i);
            }
            _ => i += 1,
        }
    }
    None
}

fn is_comment_start(bytes: &[u8], i: usize, syntax: Syntax) -> bool {
    match syntax {
        Syntax::JavaScript => {
            bytes[i] == b'/' && matches!(bytes.get(i + 1), Some(b'/') | Some(b'*'))
        }
        Syntax::Python => bytes[i] == b'#',
    }
}

fn skip_quoted(bytes: &[u8], mut i: usize, quote: u8) -> usize {
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn find_byte(bytes: &[u8], from: usize, needle: u8) -> Option<usize> {
    bytes
        .get(from..)?
        .iter()
        .position(|&b| b == needle)
        .map(|p| p + from)
}

fn find_seq(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

fn scan_delimited(
    text: &str,
    open: usize,
    syntax: Syntax,
    openers: &[u8],
    closers: &[u8],
    max_depth: Option<usize>,
) -> Delimited {
    let bytes = text.as_bytes();
    if open >= bytes.len() || !openers.contains(&bytes[open]) {
        return Delimited::Unterminated;
    }

    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        if let Some(next) = skip_trivia(bytes, i, syntax) {
            i = next;
            continue;
        }

        let b = bytes[i];
        if openers.contains(&b) {
            depth += 1;
            if max_depth.is_some_and(|max| depth > max) {
                return Delimited::TooDeep;
            }
        } else if closers.contains(&b) {
            depth -= 1;
            if depth == 0 {
                return Delimited::Closed(i + 1);
            }
        }
        i += 1;
    }

    Delimited::Unterminated
}

/// Finds the bracket closing the one at `open` (`(`, `[` or `{`), tracking all three
/// kinds of nesting. Returns the index of the closing bracket.
pub fn find_closing(text: &str, open: usize, syntax: Syntax) -> Option<usize> {
    match scan_delimited(text, open, syntax, b"([{", b")]}", None) {
        Delimited::Closed(end) => Some(end - 1),
        _ => None,
    }
}

/// Matches the `{ ... }` block opening at `open`, allowing at most `max_depth`
/// levels of braces including the outer pair.
pub fn match_braces(text: &str, open: usize, max_depth: usize, syntax: Syntax) -> Delimited {
    scan_delimited(text, open, syntax, b"{", b"}", Some(max_depth))
}

/// Splits `text` at every `separator` that is not nested in brackets, a string or a
/// comment. Pieces are trimmed and empty pieces dropped.
pub fn split_top_level(text: &str, separator: u8, syntax: Syntax) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if let Some(next) = skip_trivia(bytes, i, syntax) {
            i = next;
            continue;
        }

        match bytes[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b if b == separator && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&text[start..]);

    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Top-level arguments of the call whose parentheses sit at `open` and `close`.
///
/// Splitting happens on `masked` (see [`mask_comments`]) so commas inside comments
/// are not separators; the pieces are sliced from `text`.
pub fn split_arguments<'t>(
    text: &'t str,
    masked: &str,
    open: usize,
    close: usize,
    syntax: Syntax,
) -> Vec<&'t str> {
    let base = masked.as_ptr() as usize;
    split_top_level(&masked[open + 1..close], b',', syntax)
        .into_iter()
        .map(|piece| {
            let start = piece.as_ptr() as usize - base;
            text[start..start + piece.len()].trim()
        })
        .collect()
}

/// Index of the end of the statement starting at `start`: the first `;` or line
/// break outside brackets, or the end of `text`.
pub fn statement_end(text: &str, start: usize, syntax: Syntax) -> usize {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut i = start;

    while i < bytes.len() {
        if let Some(next) = skip_trivia(bytes, i, syntax) {
            // A line comment ends the statement with it
            if next < bytes.len() && bytes[next] == b'\n' && depth == 0 && is_comment_start(bytes, i, syntax) {
                return i;
            }
            i = next;
            continue;
        }

        match bytes[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => {
                if depth == 0 {
                    return i;
                }
                depth -= 1;
            }
            b';' | b'\n' if depth == 0 => return i,
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}

/// Removes comments while leaving string literals intact.
pub fn strip_comments(text: &str, syntax: Syntax) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match skip_trivia(bytes, i, syntax) {
            Some(next) => {
                if is_comment_start(bytes, i, syntax) {
                    out.push_str(&text[start..i]);
                    start = next;
                }
                i = next;
            }
            None => i += 1,
        }
    }
    out.push_str(&text[start..]);
    out
}

/// Blanks out comments with spaces, keeping byte offsets and line breaks intact.
///
/// Offsets found in the masked text index the original text unchanged.
pub fn mask_comments(text: &str, syntax: Syntax) -> String {
    let bytes = text.as_bytes();
    let mut masked = bytes.to_vec();
    let mut i = 0;

    while i < bytes.len() {
        match skip_trivia(bytes, i, syntax) {
            Some(next) => {
                if is_comment_start(bytes, i, syntax) {
                    for b in &mut masked[i..next] {
                        if *b != b'\n' {
                            *b = b' ';
                        }
                    }
                }
                i = next;
            }
            None => i += 1,
        }
    }
    String::from_utf8(masked).unwrap_or_else(|_| text.to_string())
}

/// Collapses every run of whitespace into a single space and trims the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `true` for a bare JavaScript/Python identifier such as `getUser` or `$scope`.
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Returns the inner text when `text` is exactly one quoted string literal.
pub fn string_literal_value(text: &str) -> Option<&str> {
    let text = text.trim();
    let quote = text.chars().next()?;
    if !matches!(quote, '\'' | '"' | '`') || text.len() < 2 || !text.ends_with(quote) {
        return None;
    }
    let inner = &text[1..text.len() - 1];
    // Reject `'a' + 'b'` and friends
    let unescaped_quote = inner
        .char_indices()
        .any(|(i, c)| c == quote && !inner[..i].ends_with('\\'));
    if unescaped_quote {
        None
    } else {
        Some(inner)
    }
}
