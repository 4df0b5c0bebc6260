//! String interner (spec §4.1, component A).
//!
//! Rewrites every quoted literal in the raw source into an opaque `&N`
//! handle before tokenisation, so later lexer rules never have to worry
//! about operator-looking characters living inside a string body. Grounded
//! in the hashmap-backed interning style of the original compiler's symbol
//! table, but narrower in scope: this interner only ever holds the literal
//! bodies of a single source buffer, not a global identifier table.

use std::collections::HashMap;

use pimoc_util::{CompileError, Span};

/// Maps `&N` handles back to their original (escape-expanded) text.
#[derive(Debug, Default)]
pub struct StringInterner {
    handles: HashMap<u32, String>,
    next: u32,
}

impl StringInterner {
    pub fn new() -> Self {
        Self {
            handles: HashMap::new(),
            next: 1,
        }
    }

    fn intern(&mut self, text: String) -> u32 {
        let handle = self.next;
        self.next += 1;
        self.handles.insert(handle, text);
        handle
    }

    /// Looks up a previously interned handle's original text.
    pub fn resolve(&self, handle: u32) -> Option<&str> {
        self.handles.get(&handle).map(String::as_str)
    }

    /// Rewrites `source`, replacing every quoted literal with `&N`, and
    /// returns the rewritten text alongside the interner holding the
    /// handle → text mapping the lexer will need for rule 3 (spec §4.2).
    pub fn rewrite(source: &str) -> Result<(String, StringInterner), CompileError> {
        let mut interner = StringInterner::new();
        let mut out = String::with_capacity(source.len());
        let mut line: u32 = 1;
        let mut chars = source.char_indices().peekable();

        while let Some((_, ch)) = chars.next() {
            match ch {
                '\n' => {
                    out.push('\n');
                    line += 1;
                }
                '"' | '\'' => {
                    let quote = ch;
                    let mut body = String::new();
                    let mut closed = false;
                    while let Some((_, c)) = chars.next() {
                        if c == quote {
                            closed = true;
                            break;
                        }
                        if c == '\n' {
                            return Err(CompileError::InvalidStringReference {
                                span: Span::new(line),
                                detail: "unterminated string literal".into(),
                            });
                        }
                        if c == '\\' {
                            let (_, esc) =
                                chars.next().ok_or(CompileError::InvalidStringReference {
                                    span: Span::new(line),
                                    detail: "unterminated string literal".into(),
                                })?;
                            body.push_str(expand_escape(esc, &mut chars, line)?);
                        } else {
                            body.push(c);
                        }
                    }
                    if !closed {
                        return Err(CompileError::InvalidStringReference {
                            span: Span::new(line),
                            detail: "unterminated string literal".into(),
                        });
                    }
                    let handle = interner.intern(body);
                    out.push('&');
                    out.push_str(&handle.to_string());
                }
                other => out.push(other),
            }
        }

        Ok((out, interner))
    }
}

/// Expands one of the nine recognised escape sequences to its resolved
/// text. The four `\so`/`\sc`/`\sm`-style escapes let string bodies embed
/// comment/statement delimiters the lexer would otherwise treat specially.
fn expand_escape(
    esc: char,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    line: u32,
) -> Result<&'static str, CompileError> {
    match esc {
        '\\' => Ok("\\"),
        'n' => Ok("\n"),
        't' => Ok("\t"),
        '"' => Ok("\""),
        '\'' => Ok("'"),
        's' => {
            // `\s` alone, or one of the three two-letter forms `\so`, `\sc`, `\sm`.
            match chars.peek().map(|&(_, c)| c) {
                Some('o') => {
                    chars.next();
                    Ok("/*")
                }
                Some('c') => {
                    chars.next();
                    Ok("*/")
                }
                Some('m') => {
                    chars.next();
                    Ok(";")
                }
                _ => Ok("//"),
            }
        }
        other => Err(CompileError::InvalidStringReference {
            span: Span::new(line),
            detail: format!("invalid escape sequence '\\{other}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_simple_string_to_handle() {
        let (rewritten, interner) = StringInterner::rewrite(r#"x = "hi""#).unwrap();
        assert_eq!(rewritten, "x = &1");
        assert_eq!(interner.resolve(1), Some("hi"));
    }

    #[test]
    fn expands_semicolon_escape() {
        let (_, interner) = StringInterner::rewrite(r#""a\smb""#).unwrap();
        assert_eq!(interner.resolve(1), Some("a;b"));
    }

    #[test]
    fn expands_comment_escapes() {
        let (_, interner) = StringInterner::rewrite(r#""\so \sc""#).unwrap();
        assert_eq!(interner.resolve(1), Some("/* */"));
    }

    #[test]
    fn rejects_unterminated_string() {
        let err = StringInterner::rewrite("\"no closing quote").unwrap_err();
        assert!(matches!(err, CompileError::InvalidStringReference { .. }));
    }

    #[test]
    fn multiple_literals_get_distinct_handles() {
        let (rewritten, interner) = StringInterner::rewrite(r#"("a", "b")"#).unwrap();
        assert_eq!(rewritten, "(&1, &2)");
        assert_eq!(interner.resolve(1), Some("a"));
        assert_eq!(interner.resolve(2), Some("b"));
    }
}
