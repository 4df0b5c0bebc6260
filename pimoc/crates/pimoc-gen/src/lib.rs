//! pimoc-gen - LLVM backend setup and the shared OperatorStack helper pair
//! (spec §4.5.2).
//!
//! `pimoc-sem` owns instruction dispatch and expression evaluation; this
//! crate only sets up the `Context`/`Module`/`Builder` triple, the type name
//! table (spec §6), and the two module-wide stack push/pop functions every
//! OperatorStack instance calls.

pub mod backend;
pub mod types;

pub use backend::{Backend, DEFAULT_STACK_SIZE, STACK_POP_NAME, STACK_PUSH_NAME};
pub use types::TypeMapper;
