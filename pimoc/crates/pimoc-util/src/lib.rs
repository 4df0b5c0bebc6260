//! pimoc-util - foundation types shared by every core crate.
//!
//! Holds the two pieces of infrastructure every stage of the pipeline
//! touches: source locations ([`span`]), and the flat fatal error type
//! ([`error::CompileError`]) every `Result` in the core resolves to. The
//! arena index type ([`index_vec`]) backs the block tree built in
//! `pimoc-par` and the scope tree built in `pimoc-sem`.

pub mod error;
pub mod index_vec;
pub mod span;

pub use error::{CompileError, CompileResult};
pub use span::{SourceMap, Span};
