//! pimoc-par - block parser (spec §4.3).
//!
//! Folds the lexer's flat per-line token records into a tree of
//! bracket/brace/paren-delimited [`Block`]s, then repeatedly post-processes
//! the tree until a full pass makes no further change: dotted names
//! collapse, explicit type suffixes attach to the preceding atom, and
//! `options` blocks attach to the name they follow.

pub mod block;
pub mod parser;

pub use block::{Block, BlockId, BlockKind, BlockTree, Element, TokenNode};
pub use parser::parse;
