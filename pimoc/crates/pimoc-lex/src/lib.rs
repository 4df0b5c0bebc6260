//! pimoc-lex - string interner and lexer (spec §4.1, §4.2).
//!
//! Turns raw `.pim` source text into per-line token lists. Two passes:
//! [`interner::StringInterner::rewrite`] first replaces every quoted literal
//! with an opaque `&N` handle, then [`lexer::Lexer`] walks the rewritten text
//! applying the thirteen priority-ordered rules of spec §4.2.

pub mod interner;
pub mod lexer;
pub mod token;

pub use interner::StringInterner;
pub use lexer::Lexer;
pub use token::{LineTokens, Token, TokenKind};
