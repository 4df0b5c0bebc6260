//! `if`/`elif`/`else` and `while` emission (spec §4.6).
//!
//! Grounded on the teacher's general "emit into a freshly appended basic
//! block, branch, reposition the builder" idiom used throughout its former
//! LIR-to-LLVM lowering, generalized to the control-flow shapes this spec
//! names. [`IfContext`]/[`WhileContext`] only scaffold one construct at a
//! time — they are never stored past the call that builds them.

use inkwell::basic_block::BasicBlock;
use inkwell::values::FunctionValue;
use inkwell::IntPredicate;

use pimoc_par::BlockId;
use pimoc_util::{CompileError, Span};

use crate::compiler::Compiler;
use crate::context::{IfContext, WhileContext};

/// One `if`/`elif` alternative: its condition token-node and its body
/// segment, collected by the instruction dispatcher before calling
/// [`Compiler::emit_if`].
pub struct Alternative {
    pub cond: pimoc_par::TokenNode,
    pub body: BlockId,
}

impl<'a, 'ctx> Compiler<'a, 'ctx> {
    fn current_function(&self) -> Result<FunctionValue<'ctx>, CompileError> {
        let mut scope = self.current_scope;
        loop {
            if let crate::scope::ScopeKind::Function { function, .. } = &self.scopes.get(scope).kind {
                return Ok(*function);
            }
            match self.scopes.get(scope).parent {
                Some(parent) => scope = parent,
                None => {
                    return Err(CompileError::InvalidInstructionContext {
                        span: Span::DUMMY,
                        detail: "control flow outside of a function body".into(),
                    })
                }
            }
        }
    }

    fn evaluate_condition(&mut self, cond: &pimoc_par::TokenNode) -> Result<inkwell::values::IntValue<'ctx>, CompileError> {
        let value = self.evaluate_token(cond, Some("bool"))?;
        let bool_ty = self.backend.context.bool_type();
        let as_bool = value.value.into_int_value();
        let false_v = bool_ty.const_zero();
        self.backend
            .builder
            .build_int_compare(IntPredicate::NE, as_bool, false_v, "cond")
            .map_err(|e| CompileError::Internal {
                message: e.to_string(),
            })
    }

    /// Emits `if`/`elif`/`else` per spec §4.6. `alternatives[0]` is the
    /// `if`; the rest are `elif`s. `else_body` is `None` when omitted.
    pub fn emit_if(&mut self, alternatives: &[Alternative], else_body: Option<BlockId>) -> Result<(), CompileError> {
        let function = self.current_function()?;
        let final_block = self.backend.context.append_basic_block(function, "if_final");
        let if_block = self.backend.context.append_basic_block(function, "if_then");
        let else_block = self.backend.context.append_basic_block(function, "if_else");

        let elif_blocks: Vec<BasicBlock<'ctx>> = (1..alternatives.len())
            .map(|i| self.backend.context.append_basic_block(function, &format!("elif_{i}")))
            .collect();
        let interm_blocks: Vec<BasicBlock<'ctx>> = (1..alternatives.len())
            .map(|i| self.backend.context.append_basic_block(function, &format!("elif_cond_{i}")))
            .collect();

        let ctx = IfContext {
            final_block,
            if_block,
            else_block,
            elif_blocks,
            interm_blocks,
        };

        let first = &alternatives[0];
        let cmp = self.evaluate_condition(&first.cond)?;
        let first_false_target = ctx.interm_blocks.first().copied().unwrap_or(ctx.else_block);
        self.backend
            .builder
            .build_conditional_branch(cmp, ctx.if_block, first_false_target)
            .map_err(internal)?;

        self.backend.builder.position_at_end(ctx.if_block);
        self.compile_segment(first.body)?;
        self.branch_to_if_unterminated(ctx.final_block)?;

        for (i, alt) in alternatives.iter().enumerate().skip(1) {
            let interm = ctx.interm_blocks[i - 1];
            let elif_block = ctx.elif_blocks[i - 1];
            let next_false_target = ctx.interm_blocks.get(i).copied().unwrap_or(ctx.else_block);

            self.backend.builder.position_at_end(interm);
            let cmp = self.evaluate_condition(&alt.cond)?;
            self.backend
                .builder
                .build_conditional_branch(cmp, elif_block, next_false_target)
                .map_err(internal)?;

            self.backend.builder.position_at_end(elif_block);
            self.compile_segment(alt.body)?;
            self.branch_to_if_unterminated(ctx.final_block)?;
        }

        self.backend.builder.position_at_end(ctx.else_block);
        if let Some(body) = else_body {
            self.compile_segment(body)?;
        }
        self.branch_to_if_unterminated(ctx.final_block)?;

        self.backend.builder.position_at_end(ctx.final_block);
        Ok(())
    }

    fn branch_to_if_unterminated(&self, target: BasicBlock<'ctx>) -> Result<(), CompileError> {
        let current = self.backend.builder.get_insert_block().expect("builder always has an insertion point");
        if current.get_terminator().is_none() {
            self.backend.builder.build_unconditional_branch(target).map_err(internal)?;
        }
        Ok(())
    }

    /// Emits `while` per spec §4.6.
    pub fn emit_while(&mut self, cond: &pimoc_par::TokenNode, body: BlockId) -> Result<(), CompileError> {
        let function = self.current_function()?;
        let while_block = self.backend.context.append_basic_block(function, "while_body");
        let final_block = self.backend.context.append_basic_block(function, "while_final");
        let ctx = WhileContext {
            while_block,
            final_block,
        };

        let cmp = self.evaluate_condition(cond)?;
        self.backend
            .builder
            .build_conditional_branch(cmp, ctx.while_block, ctx.final_block)
            .map_err(internal)?;

        self.backend.builder.position_at_end(ctx.while_block);
        self.compile_segment(body)?;
        let cmp_again = self.evaluate_condition(cond)?;
        let current = self.backend.builder.get_insert_block().expect("builder always has an insertion point");
        if current.get_terminator().is_none() {
            self.backend
                .builder
                .build_conditional_branch(cmp_again, ctx.while_block, ctx.final_block)
                .map_err(internal)?;
        }

        self.backend.builder.position_at_end(ctx.final_block);
        Ok(())
    }
}

fn internal(e: impl std::fmt::Display) -> CompileError {
    CompileError::Internal {
        message: e.to_string(),
    }
}
