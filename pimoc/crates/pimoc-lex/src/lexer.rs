//! Lexer (spec §4.2, component B).
//!
//! Processes the interner's rewritten text line by line. Each line is split
//! on whitespace and on non-identifier characters into raw chunks, then
//! reassembled into typed tokens with a three-chunk lookahead, applying the
//! thirteen priority-ordered rules below. Grounded on the Cursor-based,
//! direct-coded dispatch style of the reference lexer, generalised from a
//! single-character switch to a rule list that needs multi-chunk lookahead.

use log::{debug, trace};

use pimoc_util::{CompileError, Span};

use crate::interner::StringInterner;
use crate::token::{LineTokens, Token, TokenKind};

/// Recognised literal/primitive type names (spec §6), used by rule 13's
/// `type` classification and by rule 7's sized-type rule.
const TYPE_NAMES: &[&str] = &[
    "u8", "i8", "u16", "i16", "u24", "i24", "u32", "i32", "u64", "i64", "u128", "i128", "u256",
    "i256", "f32", "float", "f64", "double", "chr", "bool", "void", "int", "dec", "byte",
];

const INSTRUCTION_NAMES: &[&str] = &[
    "func", "proc", "return", "if", "elif", "else", "while", "ops",
];

const FUSED_OPERATORS: &[&str] = &["==", "!=", "<=", ">=", ".%", "..%", "##"];

fn is_type_name(text: &str) -> bool {
    TYPE_NAMES.contains(&text)
}

fn is_instruction_name(text: &str) -> bool {
    INSTRUCTION_NAMES.contains(&text)
}

/// Splits one source line into whitespace/punctuation-delimited chunks,
/// keeping each run of identifier characters together and every other
/// character as its own chunk (so `==`, `::`, `:[` etc. can be re-fused by
/// the rule dispatcher below from single-char chunks).
fn split_line(line: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let is_ident = |c: char| c.is_alphanumeric() || c == '_';

    for c in line.chars() {
        if c.is_whitespace() {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
        } else if is_ident(c) {
            if !current.is_empty() && !current.chars().next().unwrap().is_alphanumeric() && !current.starts_with('_') {
                chunks.push(std::mem::take(&mut current));
            }
            current.push(c);
        } else {
            if !current.is_empty() && is_ident(current.chars().next().unwrap()) {
                chunks.push(std::mem::take(&mut current));
            }
            current.push(c);
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Lexes interned source text into one [`LineTokens`] record per non-empty
/// line, applying the thirteen priority-ordered rules of spec §4.2.
pub struct Lexer<'a> {
    interner: &'a StringInterner,
}

impl<'a> Lexer<'a> {
    pub fn new(interner: &'a StringInterner) -> Self {
        Self { interner }
    }

    pub fn lex(&self, text: &str) -> Result<Vec<LineTokens>, CompileError> {
        debug!("lexing {} source lines", text.lines().count());
        let mut out = Vec::new();
        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = idx as u32 + 1;
            let tokens = self.lex_line(raw_line, line_no)?;
            if !tokens.is_empty() {
                trace!("line {}: {} tokens", line_no, tokens.len());
                out.push(LineTokens {
                    line: line_no,
                    tokens,
                });
            }
        }
        Ok(out)
    }

    fn lex_line(&self, line: &str, line_no: u32) -> Result<Vec<Token>, CompileError> {
        let chunks = split_line(line);
        let mut tokens = Vec::new();
        let mut i = 0usize;

        while i < chunks.len() {
            // Rule 1: line comment discards the rest of the line.
            if chunks[i] == "/" && chunks.get(i + 1).map(String::as_str) == Some("/") {
                break;
            }

            // Rule 2: fused `##` operator.
            if chunks[i] == "#" && chunks.get(i + 1).map(String::as_str) == Some("#") {
                tokens.push(Token::new("##", TokenKind::Operator, line_no));
                i += 2;
                continue;
            }

            // Rule 3: `&<digits>` string reference.
            if chunks[i] == "&" {
                if let Some(digits) = chunks.get(i + 1).filter(|c| c.chars().all(|ch| ch.is_ascii_digit())) {
                    let handle: u32 = digits.parse().map_err(|_| CompileError::InvalidStringReference {
                        span: Span::new(line_no),
                        detail: format!("&{digits}"),
                    })?;
                    let text = self.interner.resolve(handle).ok_or_else(|| {
                        CompileError::InvalidStringReference {
                            span: Span::new(line_no),
                            detail: format!("&{handle}"),
                        }
                    })?;
                    tokens.push(Token::new(text.to_string(), TokenKind::String, line_no));
                    i += 2;
                    continue;
                }
            }

            // Rule 4: `<digits>.<digits>` optionally followed by `:<type>`.
            if is_digits(&chunks[i])
                && chunks.get(i + 1).map(String::as_str) == Some(".")
                && chunks.get(i + 2).map(|c| is_digits(c)).unwrap_or(false)
            {
                let text = format!("{}.{}", chunks[i], chunks[i + 2]);
                let mut consumed = 3;
                let mut tok = Token::new(text, TokenKind::Decimal, line_no);
                if chunks.get(i + 3).map(String::as_str) == Some(":")
                    && chunks.get(i + 4).map(|c| is_type_name(c)).unwrap_or(false)
                {
                    tok = tok.with_type(chunks[i + 4].clone());
                    consumed += 2;
                }
                tokens.push(tok);
                i += consumed;
                continue;
            }

            // Rule 5: `§<UPPER_NAME>` macro call.
            if chunks[i] == "§" {
                let name = chunks.get(i + 1).cloned().unwrap_or_default();
                if name.is_empty() || name.chars().any(|c| c.is_lowercase()) {
                    return Err(CompileError::NotUpperCaseMacroName {
                        span: Span::new(line_no),
                        name,
                    });
                }
                tokens.push(Token::new(name, TokenKind::Macro, line_no));
                i += 2;
                continue;
            }

            // Rule 6: `%<register>` register token.
            if chunks[i] == "%" && chunks.get(i + 1).map(|c| is_ident_text(c)).unwrap_or(false) {
                tokens.push(Token::new(chunks[i + 1].clone(), TokenKind::Register, line_no));
                i += 2;
                continue;
            }

            // Rule 7: `<type><N>` sized type.
            if let Some((ty, len)) = split_type_and_digits(&chunks[i]) {
                if is_type_name(ty) {
                    tokens.push(Token::new(ty.to_string(), TokenKind::Type, line_no).with_length(len));
                    i += 1;
                    continue;
                }
            }

            // Rule 8: `<N>:[` sized stack opener.
            if is_digits(&chunks[i])
                && chunks.get(i + 1).map(String::as_str) == Some(":")
                && chunks.get(i + 2).map(String::as_str) == Some("[")
            {
                let size: u32 = chunks[i].parse().unwrap_or(128);
                tokens.push(Token::new("[", TokenKind::Delimiter, line_no).with_size(size));
                i += 3;
                continue;
            }

            // Rule 9: `UPPER::lower` qualified variable reference.
            if chunks[i].chars().all(|c| c.is_uppercase() || c == '_')
                && !chunks[i].is_empty()
                && chunks.get(i + 1).map(String::as_str) == Some(":")
                && chunks.get(i + 2).map(String::as_str) == Some(":")
                && chunks.get(i + 3).map(|c| is_ident_text(c)).unwrap_or(false)
            {
                let tok = Token::new(chunks[i + 3].clone(), TokenKind::Name, line_no)
                    .with_memory(chunks[i].clone());
                tokens.push(tok);
                i += 4;
                continue;
            }

            // Rule 10: `<N>:%` sized dereference operator.
            if is_digits(&chunks[i])
                && chunks.get(i + 1).map(String::as_str) == Some(":")
                && chunks.get(i + 2).map(String::as_str) == Some("%")
            {
                let size: u32 = chunks[i].parse().unwrap_or(0);
                tokens.push(Token::new("%", TokenKind::Operator, line_no).with_size(size));
                i += 3;
                continue;
            }

            // Rule 11: `<atom>:<type>` explicit LLVM type suffix on a literal/name.
            if chunks.get(i + 1).map(String::as_str) == Some(":")
                && chunks.get(i + 2).map(|c| is_type_name(c)).unwrap_or(false)
                && !chunks[i].is_empty()
            {
                let mut tok = classify_chunk(&chunks[i], line_no);
                tok.ty = Some(chunks[i + 2].clone());
                tokens.push(tok);
                i += 3;
                continue;
            }

            // Rule 12: remaining fused operators.
            if let Some(op) = FUSED_OPERATORS.iter().find(|op| {
                let len = op.chars().count();
                (0..len).all(|k| chunks.get(i + k).map(String::as_str) == op.chars().nth(k).map(|c| c.to_string()).as_deref())
            }) {
                let len = op.chars().count();
                tokens.push(Token::new(*op, TokenKind::Operator, line_no));
                i += len;
                continue;
            }

            // Rule 13: fall back to plain kind classification.
            tokens.push(classify_chunk(&chunks[i], line_no));
            i += 1;
        }

        Ok(tokens)
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn is_ident_text(s: &str) -> bool {
    !s.is_empty() && s.chars().next().map(|c| c.is_alphabetic() || c == '_').unwrap_or(false)
}

/// Splits a chunk like `i32` or `u8` that may carry a trailing digit run
/// (`i328` → `("i32", 8)`) by testing every suffix split point against the
/// known type-name table, preferring the longest matching prefix.
fn split_type_and_digits(chunk: &str) -> Option<(&str, u32)> {
    let digit_start = chunk.find(|c: char| c.is_ascii_digit())?;
    let (prefix, digits) = chunk.split_at(digit_start);
    if prefix.is_empty() || digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let len: u32 = digits.parse().ok()?;
    Some((prefix, len))
}

fn classify_chunk(text: &str, line: u32) -> Token {
    let kind = if is_digits(text) {
        TokenKind::Integer
    } else if text == "true" || text == "false" {
        TokenKind::Boolean
    } else if matches!(
        text,
        "+" | "-" | "*" | "/" | "%" | "=" | "<" | ">" | "!" | "&" | "|" | "." | ":" | "^"
    ) {
        TokenKind::Operator
    } else if matches!(text, "(" | ")" | "{" | "}" | "[" | "]" | ";" | ",") {
        TokenKind::Delimiter
    } else if is_instruction_name(text) {
        TokenKind::Instruction
    } else if is_type_name(text) {
        TokenKind::Type
    } else if text.starts_with('#') {
        TokenKind::PpCommand
    } else if is_ident_text(text) {
        TokenKind::Name
    } else {
        TokenKind::Unknown
    };
    Token::new(text, kind, line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lex(src: &str) -> Vec<LineTokens> {
        let (rewritten, interner) = StringInterner::rewrite(src).unwrap();
        Lexer::new(&interner).lex(&rewritten).unwrap()
    }

    #[test]
    fn line_comment_is_discarded() {
        let lines = lex("x = 1 // trailing comment\n");
        assert_eq!(lines[0].tokens.len(), 3);
    }

    #[test]
    fn decimal_literal_with_type_suffix() {
        let lines = lex("3.14:float\n");
        let tok = &lines[0].tokens[0];
        assert_eq!(tok.kind, TokenKind::Decimal);
        assert_eq!(tok.ty.as_deref(), Some("float"));
    }

    #[test]
    fn string_reference_resolves_through_interner() {
        let lines = lex("\"hi\"\n");
        assert_eq!(lines[0].tokens[0].kind, TokenKind::String);
        assert_eq!(lines[0].tokens[0].text, "hi");
    }

    #[test]
    fn macro_call_token_requires_upper_case() {
        let err = {
            let (rewritten, interner) = StringInterner::rewrite("§lower\n").unwrap();
            Lexer::new(&interner).lex(&rewritten).unwrap_err()
        };
        assert!(matches!(err, CompileError::NotUpperCaseMacroName { .. }));
    }

    #[test]
    fn qualified_name_carries_memory_attribute() {
        let lines = lex("GLOBAL::counter\n");
        let tok = &lines[0].tokens[0];
        assert_eq!(tok.kind, TokenKind::Name);
        assert_eq!(tok.memory.as_deref(), Some("GLOBAL"));
    }

    #[test]
    fn sized_stack_opener_carries_size() {
        let lines = lex("256:[ 1 2 ]\n");
        assert_eq!(lines[0].tokens[0].size, Some(256));
    }

    #[test]
    fn instruction_keyword_classified() {
        let lines = lex("return 0\n");
        assert_eq!(lines[0].tokens[0].kind, TokenKind::Instruction);
    }

    proptest! {
        /// Invariant 1 (spec §8): the concatenated token text reproduces the
        /// source, insertion order preserved, for any run of simple
        /// whitespace-separated words with no comments or string literals.
        #[test]
        fn concatenated_token_text_round_trips(words in proptest::collection::vec("[a-z][a-z0-9]{0,5}", 1..8)) {
            let src = format!("{}\n", words.join(" "));
            let lines = lex(&src);
            let rebuilt: Vec<&str> = lines.iter().flat_map(|l| l.tokens.iter()).map(|t| t.text.as_str()).collect();
            let expected: Vec<&str> = words.iter().map(String::as_str).collect();
            prop_assert_eq!(rebuilt, expected);
        }
    }
}
