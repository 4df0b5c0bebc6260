//! Token type produced by the lexer.
//!
//! Tagged-variant-of-attributes rather than a dynamic attribute bag (spec
//! §9 design note): every token carries its source line and kind-specific
//! fields as `Option`s rather than relying on runtime presence checks.

use std::fmt;

/// Discriminates the token's syntactic category. Drives both how the lexer
/// finishes classifying a raw span of text (priority rule 13, spec §4.2)
/// and how the block parser and semantic compiler dispatch on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Integer,
    Decimal,
    Boolean,
    String,
    Name,
    Macro,
    Type,
    Register,
    Operator,
    Delimiter,
    Instruction,
    PpCommand,
    PpOsCommand,
    Unknown,
}

/// One lexical unit, its original text, and whatever attributes its kind
/// accumulated during lexing or the block parser's post-processing pass.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    /// Original textual form, after string-interning rewrite but before any
    /// further substitution.
    pub text: String,
    pub kind: TokenKind,
    /// 1-based source line this token was read from.
    pub line: u32,
    /// Byte size attached to a stack opener (`N:[`) or a sized dereference
    /// (`N:%`).
    pub size: Option<u32>,
    /// Array length attached to a sized type (`type<N>`).
    pub length: Option<u32>,
    /// LLVM type name attached via a `:type` suffix.
    pub ty: Option<String>,
    /// Qualifying upper-case memory/namespace name from `UPPER::lower`.
    pub memory: Option<String>,
}

impl Token {
    pub fn new(text: impl Into<String>, kind: TokenKind, line: u32) -> Self {
        Self {
            text: text.into(),
            kind,
            line,
            size: None,
            length: None,
            ty: None,
            memory: None,
        }
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_type(mut self, ty: impl Into<String>) -> Self {
        self.ty = Some(ty.into());
        self
    }

    pub fn with_memory(mut self, memory: impl Into<String>) -> Self {
        self.memory = Some(memory.into());
        self
    }

    pub fn is_kind(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// A single source line and the tokens it produced; the lexer's output
/// unit (spec §4.2: "a list of `{line, tokens}` records").
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LineTokens {
    pub line: u32,
    pub tokens: Vec<Token>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_methods_set_optional_attributes() {
        let tok = Token::new("i32", TokenKind::Type, 4)
            .with_length(8)
            .with_type("i32");
        assert_eq!(tok.length, Some(8));
        assert_eq!(tok.ty.as_deref(), Some("i32"));
        assert!(tok.is_kind(TokenKind::Type));
    }
}
