//! Scope tree (spec §3 "Scope (Name)").
//!
//! Grounded on the real `ScopeTree`/`Rib`/`RibId` in the teacher's
//! `scope.rs`: an arena of nodes (`pimoc_util::index_vec`), each carrying a
//! `parent` link and its own bindings map. Reworked from a flat
//! binding-lookup-by-walking-parents rib chain (name resolution scoped to
//! lexical nesting) to the spec's dotted-path tree (name resolution scoped
//! to an explicit child-name table per node, with `^` as the one navigation
//! operator), since `.pim` scopes are structural (global → function →
//! variable) rather than block-lexical.

use std::collections::HashMap;

use inkwell::basic_block::BasicBlock;
use inkwell::values::{FunctionValue, PointerValue};

use pimoc_util::define_idx;
use pimoc_util::index_vec::IndexVec;

define_idx!(ScopeId);

/// What a scope node owns (spec §3).
#[derive(Debug)]
pub enum ScopeKind<'ctx> {
    /// The single root; owns the top-level LLVM module (held by the
    /// caller, not duplicated here).
    Global,
    /// Owns an LLVM function and its entry block. The "a second `return` in
    /// the same block raises `InvalidInstructionContext`" invariant (spec
    /// §4.5) is checked against the current basic block's terminator rather
    /// than a flag here — a function with an `if`/`else` where both branches
    /// return is valid, and a function-global flag would wrongly reject the
    /// second branch.
    Function {
        function: FunctionValue<'ctx>,
        entry: BasicBlock<'ctx>,
        return_type: Option<String>,
    },
    /// A storage cell typed `pointer-to-T`; `cell` is the alloca holding
    /// the (possibly re-pointed) storage pointer, per the "double
    /// indirection" invariant in spec §4.5's variable-declaration rule.
    Variable {
        cell: PointerValue<'ctx>,
        ty: String,
        constant: bool,
    },
}

#[derive(Debug)]
pub struct Scope<'ctx> {
    pub kind: ScopeKind<'ctx>,
    pub parent: Option<ScopeId>,
    children: HashMap<String, ScopeId>,
}

impl<'ctx> Scope<'ctx> {
    fn new(kind: ScopeKind<'ctx>, parent: Option<ScopeId>) -> Self {
        Self {
            kind,
            parent,
            children: HashMap::new(),
        }
    }
}

/// The compiler's one scope tree, rooted at a `Global` scope.
pub struct ScopeTree<'ctx> {
    nodes: IndexVec<ScopeId, Scope<'ctx>>,
    root: ScopeId,
}

impl<'ctx> ScopeTree<'ctx> {
    pub fn new() -> Self {
        let mut nodes = IndexVec::new();
        let root = nodes.push(Scope::new(ScopeKind::Global, None));
        Self { nodes, root }
    }

    pub fn root(&self) -> ScopeId {
        self.root
    }

    pub fn get(&self, id: ScopeId) -> &Scope<'ctx> {
        &self.nodes[id]
    }

    pub fn get_mut(&mut self, id: ScopeId) -> &mut Scope<'ctx> {
        &mut self.nodes[id]
    }

    /// Declares `name` as a child of `parent`, failing if the name is
    /// already taken in that exact scope ("unique within its immediate
    /// parent", spec §3).
    pub fn declare(
        &mut self,
        parent: ScopeId,
        name: &str,
        kind: ScopeKind<'ctx>,
    ) -> Result<ScopeId, ScopeId> {
        if let Some(&existing) = self.nodes[parent].children.get(name) {
            return Err(existing);
        }
        let id = self.nodes.push(Scope::new(kind, Some(parent)));
        self.nodes[parent].children.insert(name.to_string(), id);
        Ok(id)
    }

    /// Resolves a dotted path (`a.b.c`) from `from`, walking children;
    /// `^` ascends to the parent (spec §3).
    pub fn resolve(&self, from: ScopeId, path: &str) -> Option<ScopeId> {
        let mut current = from;
        for segment in path.split('.') {
            if segment == "^" {
                current = self.nodes[current].parent?;
                continue;
            }
            current = *self.nodes[current].children.get(segment)?;
        }
        Some(current)
    }
}

impl<'ctx> Default for ScopeTree<'ctx> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwell::context::Context;

    #[test]
    fn declare_then_resolve_round_trips() {
        let context = Context::create();
        let module = context.create_module("t");
        let func = module.add_function("f", context.void_type().fn_type(&[], false), None);
        let entry = context.append_basic_block(func, "entry");

        let mut tree: ScopeTree = ScopeTree::new();
        let root = tree.root();
        let fn_scope = tree
            .declare(
                root,
                "main",
                ScopeKind::Function {
                    function: func,
                    entry,
                    return_type: None,
                },
            )
            .unwrap();
        assert_eq!(tree.resolve(root, "main"), Some(fn_scope));
    }

    #[test]
    fn redeclaring_the_same_name_fails() {
        let mut tree: ScopeTree = ScopeTree::new();
        let root = tree.root();
        let ctx = Context::create();
        let module = ctx.create_module("t");
        let func = module.add_function("f", ctx.void_type().fn_type(&[], false), None);
        let entry = ctx.append_basic_block(func, "entry");
        tree.declare(
            root,
            "main",
            ScopeKind::Function {
                function: func,
                entry,
                return_type: None,
            },
        )
        .unwrap();
        let err = tree.declare(
            root,
            "main",
            ScopeKind::Function {
                function: func,
                entry,
                return_type: None,
            },
        );
        assert!(err.is_err());
    }

    #[test]
    fn caret_ascends_to_parent() {
        let mut tree: ScopeTree = ScopeTree::new();
        let root = tree.root();
        let ctx = Context::create();
        let module = ctx.create_module("t");
        let func = module.add_function("f", ctx.void_type().fn_type(&[], false), None);
        let entry = ctx.append_basic_block(func, "entry");
        let fn_scope = tree
            .declare(
                root,
                "main",
                ScopeKind::Function {
                    function: func,
                    entry,
                    return_type: None,
                },
            )
            .unwrap();
        assert_eq!(tree.resolve(fn_scope, "^"), Some(root));
    }
}
