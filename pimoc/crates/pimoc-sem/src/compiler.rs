//! The semantic compiler's per-run state (spec §3, §4.5, §4.6).
//!
//! One [`Compiler`] walks a single [`BlockTree`] once and drives a single
//! [`Backend`] to emit IR for it; grounded on the teacher's general
//! `Resolver`/`Lowerer`-style "one struct bundling the arena plus the
//! current position" shape, generalized to the scope tree and instruction
//! dispatch this spec needs instead of a full Rust-expression lowering.

use std::collections::HashSet;

use pimoc_gen::Backend;
use pimoc_par::BlockTree;

use crate::scope::{ScopeId, ScopeTree};

/// Bundles everything a single compile pass threads through instruction
/// dispatch, expression evaluation, and control-flow emission.
pub struct Compiler<'a, 'ctx> {
    pub tree: &'a BlockTree,
    pub backend: &'a mut Backend<'ctx>,
    pub scopes: ScopeTree<'ctx>,
    pub current_scope: ScopeId,
    /// Generated function identifiers already used (spec §4.5's `func_<id>`
    /// collision-avoidance scheme), shared mutable state per spec §5.
    pub used_ids: HashSet<String>,
    next_id: u32,
}

impl<'a, 'ctx> Compiler<'a, 'ctx> {
    pub fn new(tree: &'a BlockTree, backend: &'a mut Backend<'ctx>) -> Self {
        let scopes = ScopeTree::new();
        let root = scopes.root();
        Self {
            tree,
            backend,
            scopes,
            current_scope: root,
            used_ids: HashSet::new(),
            next_id: 0,
        }
    }

    /// Produces the next `func_<id>` identifier for an anonymous/nested
    /// function declaration (spec §4.5's naming scheme: `main` at the root,
    /// `<name>` for other root-level symbols, `func_<id>` elsewhere).
    pub fn next_func_id(&mut self) -> String {
        loop {
            let candidate = format!("func_{}", self.next_id);
            self.next_id += 1;
            if self.used_ids.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    pub fn mark_used(&mut self, name: &str) {
        self.used_ids.insert(name.to_string());
    }

    pub fn is_used(&self, name: &str) -> bool {
        self.used_ids.contains(name)
    }
}
