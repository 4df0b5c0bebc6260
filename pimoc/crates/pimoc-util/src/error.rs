//! Flat, fatal error taxonomy shared by every compiler crate.
//!
//! Every `.pim` compile error is fatal: the core never recovers and
//! continues past a bad token, an unbalanced bracket, an undefined macro, or
//! a failed type evaluation. That fail-fast model calls for one flat
//! `thiserror`-derived enum threaded through `Result<T, CompileError>`
//! rather than a `Handler` that accumulates multiple diagnostics at
//! different severities. Variant names are the error "kind" the driver
//! prints (`<kind>: <arg1> ↳ <arg2> …`).

use crate::span::Span;
use thiserror::Error;

/// The single error type produced anywhere in the pipeline: lexer, block
/// parser, macro layer, or semantic compiler. Each variant carries the span
/// of the offending source line plus whatever positional detail its
/// message needs.
#[derive(Debug, Error)]
pub enum CompileError {
    // --- Lexical ---
    #[error("{span}: InvalidStringReference: {detail}")]
    InvalidStringReference { span: Span, detail: String },

    #[error("{span}: NotUpperCaseMacroName: {name}")]
    NotUpperCaseMacroName { span: Span, name: String },

    // --- Structural ---
    #[error("{span}: BlockDelimitation: {detail}")]
    BlockDelimitation { span: Span, detail: String },

    #[error("{span}: SemicolonSeparation: {detail}")]
    SemicolonSeparation { span: Span, detail: String },

    #[error("{span}: EmptySegment: {context}")]
    EmptySegment { span: Span, context: String },

    // --- Preprocessor ---
    #[error("{span}: InvalidPreprocessorCommand: {command}")]
    InvalidPreprocessorCommand { span: Span, command: String },

    #[error("{span}: InvalidMacro: {name}")]
    InvalidMacro { span: Span, name: String },

    // --- Naming ---
    #[error("{span}: InvalidNameCase: {name}")]
    InvalidNameCase { span: Span, name: String },

    #[error("{span}: NameNotFound: {name}")]
    NameNotFound { span: Span, name: String },

    #[error("{span}: NameAlreadyTaken: {name}")]
    NameAlreadyTaken { span: Span, name: String },

    // --- Syntactic / semantic ---
    #[error("{span}: InvalidInstruction: {token}")]
    InvalidInstruction { span: Span, token: String },

    #[error("{span}: InvalidInstructionSyntax: {detail}")]
    InvalidInstructionSyntax { span: Span, detail: String },

    #[error("{span}: InvalidInstructionContext: {detail}")]
    InvalidInstructionContext { span: Span, detail: String },

    #[error("{span}: InvalidElementType: {detail}")]
    InvalidElementType { span: Span, detail: String },

    #[error("{span}: InvalidLiteralValueType: {detail}")]
    InvalidLiteralValueType { span: Span, detail: String },

    #[error("{span}: InvalidOperator: {op}")]
    InvalidOperator { span: Span, op: String },

    #[error("{span}: InvalidArgumentSyntax: {detail} ↳ expected {expected}, found {found}")]
    InvalidArgumentSyntax {
        span: Span,
        detail: String,
        expected: usize,
        found: usize,
    },

    #[error("{span}: InvalidTypeValue: {name}")]
    InvalidTypeValue { span: Span, name: String },

    #[error("{span}: NotStructure: {name}")]
    NotStructure { span: Span, name: String },

    #[error("{span}: NotType: {name}")]
    NotType { span: Span, name: String },

    #[error("internal compiler error: {message}")]
    Internal { message: String },
}

impl CompileError {
    /// Location of the offending source line, when the error carries one.
    pub fn span(&self) -> Option<Span> {
        match self {
            CompileError::Internal { .. } => None,
            CompileError::InvalidStringReference { span, .. }
            | CompileError::NotUpperCaseMacroName { span, .. }
            | CompileError::BlockDelimitation { span, .. }
            | CompileError::SemicolonSeparation { span, .. }
            | CompileError::EmptySegment { span, .. }
            | CompileError::InvalidPreprocessorCommand { span, .. }
            | CompileError::InvalidMacro { span, .. }
            | CompileError::InvalidNameCase { span, .. }
            | CompileError::NameNotFound { span, .. }
            | CompileError::NameAlreadyTaken { span, .. }
            | CompileError::InvalidInstruction { span, .. }
            | CompileError::InvalidInstructionSyntax { span, .. }
            | CompileError::InvalidInstructionContext { span, .. }
            | CompileError::InvalidElementType { span, .. }
            | CompileError::InvalidLiteralValueType { span, .. }
            | CompileError::InvalidOperator { span, .. }
            | CompileError::InvalidArgumentSyntax { span, .. }
            | CompileError::InvalidTypeValue { span, .. }
            | CompileError::NotStructure { span, .. }
            | CompileError::NotType { span, .. } => Some(*span),
        }
    }
}

/// Shorthand used throughout the core crates.
pub type CompileResult<T> = Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_kind_then_arrow_format() {
        let err = CompileError::InvalidArgumentSyntax {
            span: Span::new(3),
            detail: "call to foo".into(),
            expected: 2,
            found: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("3: InvalidArgumentSyntax: call to foo"));
        assert!(msg.contains("expected 2, found 1"));
    }

    #[test]
    fn span_accessor_returns_none_for_internal() {
        let err = CompileError::Internal {
            message: "unreachable".into(),
        };
        assert!(err.span().is_none());
    }

    #[test]
    fn span_accessor_returns_span_for_located_errors() {
        let err = CompileError::NameNotFound {
            span: Span::new(9),
            name: "foo".into(),
        };
        assert_eq!(err.span(), Some(Span::new(9)));
    }
}
