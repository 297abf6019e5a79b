//! Lexical discovery of `require("...")` calls.
//!
//! Not a parser. Comments and the contents of string literals are blanked
//! out, then a regex picks up calls with a single string literal argument.
//! Blanking keeps byte offsets, so the specifier is read back from the
//! untouched source. Dynamic requires are ignored.

use once_cell::sync::Lazy;
use regex::Regex;

static REQUIRE_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|[^.\w$])require\s*\(\s*('[ ]+'|"[ ]+")\s*\)"#)
        .expect("require pattern is valid")
});

static GLOBAL_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^.\w$])(?:global|__filename|__dirname)\b").expect("global pattern is valid")
});

/// Specifiers of every static `require` call, in first-seen order, deduplicated.
pub fn find_requires(source: &str) -> Vec<String> {
    let code = blank_literals(source);
    let mut found: Vec<String> = Vec::new();

    for caps in REQUIRE_CALL.captures_iter(&code) {
        let Some(literal) = caps.get(1) else {
            continue;
        };
        let specifier = &source[literal.start() + 1..literal.end() - 1];
        if specifier.contains('\\') {
            continue;
        }
        if !found.iter().any(|seen| seen == specifier) {
            found.push(specifier.to_string());
        }
    }

    found
}

/// Whether the module mentions `global`, `__filename` or `__dirname`.
pub fn mentions_globals(source: &str) -> bool {
    GLOBAL_REF.is_match(&blank_literals(source))
}

/// Replace comments and string literal contents with spaces.
///
/// Quotes and newlines survive, and every blanked character becomes as many
/// spaces as it has bytes, so offsets into the result are offsets into
/// `source`.
fn blank_literals(source: &str) -> String {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        Str(char),
        LineComment,
        BlockComment,
    }

    let mut out = String::with_capacity(source.len());
    let mut state = State::Code;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '\'' | '"' | '`' => {
                    state = State::Str(c);
                    out.push(c);
                }
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    state = State::LineComment;
                    out.push_str("  ");
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = State::BlockComment;
                    out.push_str("  ");
                }
                _ => out.push(c),
            },
            State::Str(quote) => {
                if c == quote || (c == '\n' && quote != '`') {
                    state = State::Code;
                    out.push(c);
                } else if c == '\\' {
                    out.push(' ');
                    if let Some(escaped) = chars.next() {
                        blank(&mut out, escaped);
                    }
                } else {
                    blank(&mut out, c);
                }
            }
            State::LineComment => {
                if c == '\n' {
                    state = State::Code;
                }
                blank(&mut out, c);
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Code;
                    out.push_str("  ");
                } else {
                    blank(&mut out, c);
                }
            }
        }
    }

    out
}

fn blank(out: &mut String, c: char) {
    if c == '\n' {
        out.push('\n');
    } else {
        out.extend(std::iter::repeat_n(' ', c.len_utf8()));
    }
}
