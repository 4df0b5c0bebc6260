//! `LiteralValue` evaluator (spec §4.5.1, §3 "Value").
//!
//! Produces a transient [`Value`] from either a single token (the "simple
//! form") or a `stack` block (the "composite form", backed by an
//! [`pimoc_gen::Backend`]-declared `OperatorStack`). Grounded on the
//! teacher's general instruction-builder idiom (`self.builder.build_*(...)
//! .map_err(...)`) seen throughout `pimoc-gen`'s former `llvm.rs`, adapted
//! to return `pimoc_util::CompileError` instead of `CodeGenError`.

use inkwell::values::{BasicValue, BasicValueEnum, IntValue, PointerValue};
use inkwell::{AddressSpace, IntPredicate};

use pimoc_lex::{Token, TokenKind};
use pimoc_par::{BlockId, BlockKind, Element, TokenNode};
use pimoc_util::{CompileError, Span};

use crate::compiler::Compiler;
use crate::scope::ScopeKind;

/// A transient, per-use bundle (spec §3 "Value"). Never stored past the
/// instruction that produced it.
#[derive(Clone, Copy)]
pub struct Value<'ctx> {
    pub ty: &'static str,
    pub value: BasicValueEnum<'ctx>,
    pub value_ptr: Option<PointerValue<'ctx>>,
}

impl<'ctx> Value<'ctx> {
    fn new(ty: &'static str, value: BasicValueEnum<'ctx>) -> Self {
        Self {
            ty,
            value,
            value_ptr: None,
        }
    }
}

impl<'a, 'ctx> Compiler<'a, 'ctx> {
    /// Evaluates a leaf token (the simple `LiteralValue` form). Takes the
    /// whole [`TokenNode`], not just its [`Token`], so a `Name` token's
    /// attached `options` block (a call's argument list, spec §4.3) is
    /// still visible when the name turns out to resolve to a function.
    pub fn evaluate_token(&mut self, node: &TokenNode, type_ctx: Option<&str>) -> Result<Value<'ctx>, CompileError> {
        let token = &node.token;
        match token.kind {
            TokenKind::Integer => self.evaluate_integer(token, type_ctx),
            TokenKind::Decimal => self.evaluate_decimal(token, type_ctx),
            TokenKind::Boolean => {
                let bits = if token.text == "true" { 1 } else { 0 };
                let v = self.backend.context.bool_type().const_int(bits, false);
                Ok(Value::new("bool", v.into()))
            }
            TokenKind::String => self.evaluate_string(token),
            TokenKind::Name => self.evaluate_name(node),
            _ => Err(CompileError::InvalidLiteralValueType {
                span: Span::new(token.line),
                detail: format!("{:?} token cannot be evaluated as a value", token.kind),
            }),
        }
    }

    fn evaluate_integer(&self, token: &Token, type_ctx: Option<&str>) -> Result<Value<'ctx>, CompileError> {
        let value: i128 = token.text.parse().map_err(|_| CompileError::InvalidLiteralValueType {
            span: Span::new(token.line),
            detail: format!("'{}' is not a valid integer literal", token.text),
        })?;
        let name = token
            .ty
            .as_deref()
            .or(type_ctx)
            .map(str::to_string)
            .unwrap_or_else(|| {
                let bits = pimoc_gen::TypeMapper::int_bits_for_value(value);
                format!("i{bits}")
            });
        let ty = self
            .backend
            .types
            .resolve(&name)
            .ok_or_else(|| CompileError::InvalidTypeValue {
                span: Span::new(token.line),
                name: name.clone(),
            })?
            .into_int_type();
        let v = ty.const_int(value as u64, value < 0);
        Ok(Value::new(leak(name), v.into()))
    }

    fn evaluate_decimal(&self, token: &Token, type_ctx: Option<&str>) -> Result<Value<'ctx>, CompileError> {
        let value: f64 = token.text.parse().map_err(|_| CompileError::InvalidLiteralValueType {
            span: Span::new(token.line),
            detail: format!("'{}' is not a valid decimal literal", token.text),
        })?;
        let name = token.ty.as_deref().or(type_ctx).unwrap_or("double");
        let ty = self
            .backend
            .types
            .resolve(name)
            .ok_or_else(|| CompileError::InvalidTypeValue {
                span: Span::new(token.line),
                name: name.to_string(),
            })?
            .into_float_type();
        let v = ty.const_float(value);
        Ok(Value::new(leak(name.to_string()), v.into()))
    }

    fn evaluate_string(&mut self, token: &Token) -> Result<Value<'ctx>, CompileError> {
        let bytes = token.text.as_bytes();
        let i8_ty = self.backend.context.i8_type();
        let array_ty = i8_ty.array_type(bytes.len() as u32);
        let alloca = self
            .backend
            .builder
            .build_alloca(array_ty, "strlit")
            .map_err(internal)?;
        for (idx, byte) in bytes.iter().enumerate() {
            let index = self.backend.context.i32_type().const_int(idx as u64, false);
            let zero = self.backend.context.i32_type().const_zero();
            let slot = unsafe {
                self.backend
                    .builder
                    .build_in_bounds_gep(array_ty, alloca, &[zero, index], "char")
                    .map_err(internal)?
            };
            let c = i8_ty.const_int(*byte as u64, false);
            self.backend.builder.build_store(slot, c).map_err(internal)?;
        }
        let mut value = Value::new("string", alloca.as_basic_value_enum());
        value.value_ptr = Some(alloca);
        Ok(value)
    }

    fn evaluate_name(&mut self, node: &TokenNode) -> Result<Value<'ctx>, CompileError> {
        let token = &node.token;
        let current = self.current_scope;
        let resolved = self
            .scopes
            .resolve(current, &token.text)
            .ok_or_else(|| CompileError::NameNotFound {
                span: Span::new(token.line),
                name: token.text.clone(),
            })?;

        match &self.scopes.get(resolved).kind {
            ScopeKind::Variable { cell, ty, .. } => {
                let cell = *cell;
                let ty_name = ty.clone();
                let pointee = self
                    .backend
                    .types
                    .resolve(&ty_name)
                    .ok_or_else(|| CompileError::NotType {
                        span: Span::new(token.line),
                        name: ty_name.clone(),
                    })?;
                let inner_ptr = self
                    .backend
                    .builder
                    .build_load(self.backend.context.ptr_type(AddressSpace::default()), cell, "inner_ptr")
                    .map_err(internal)?
                    .into_pointer_value();
                let loaded = self
                    .backend
                    .builder
                    .build_load(pointee, inner_ptr, "loaded")
                    .map_err(internal)?;
                let mut value = Value::new(leak(ty_name), loaded);
                value.value_ptr = Some(inner_ptr);
                Ok(value)
            }
            ScopeKind::Function { .. } => {
                if let Some(options) = node.options {
                    self.evaluate_call(token, resolved, options)
                } else {
                    Err(CompileError::InvalidElementType {
                        span: Span::new(token.line),
                        detail: format!("'{}' used as a value without a call", token.text),
                    })
                }
            }
            ScopeKind::Global => Err(CompileError::InvalidElementType {
                span: Span::new(token.line),
                detail: "global scope is not a value".into(),
            }),
        }
    }

    fn evaluate_call(
        &mut self,
        token: &Token,
        fn_scope: crate::scope::ScopeId,
        options: BlockId,
    ) -> Result<Value<'ctx>, CompileError> {
        let (function, _) = match &self.scopes.get(fn_scope).kind {
            ScopeKind::Function { function, .. } => (*function, ()),
            _ => unreachable!("resolved via ScopeKind::Function arm"),
        };

        let elements = self.tree.get(options).elements.clone();
        let mut args = Vec::new();
        for element in &elements {
            if let Element::Token(t) = element {
                let arg = self.evaluate_token(t, None)?;
                args.push(inkwell::values::BasicMetadataValueEnum::from(arg.value));
            }
        }

        let expected = function.count_params() as usize;
        if expected != args.len() {
            return Err(CompileError::InvalidArgumentSyntax {
                span: Span::new(token.line),
                detail: format!("call to '{}'", token.text),
                expected,
                found: args.len(),
            });
        }

        let call = self
            .backend
            .builder
            .build_call(function, &args, "calltmp")
            .map_err(internal)?;
        let result = call
            .try_as_basic_value()
            .left()
            .unwrap_or_else(|| self.backend.context.i32_type().const_zero().into());
        Ok(Value::new("i32", result))
    }

    /// Evaluates a `stack` block (the composite `LiteralValue` form, spec
    /// §4.5.1). Allocates a fresh OperatorStack of the block's requested
    /// size (default 128 slots) and walks its children left to right.
    pub fn evaluate_stack(&mut self, block_id: BlockId, type_ctx: Option<&str>) -> Result<Value<'ctx>, CompileError> {
        let size = self
            .tree
            .get(block_id)
            .size
            .unwrap_or(pimoc_gen::DEFAULT_STACK_SIZE);

        let i8_ptr = self.backend.context.ptr_type(AddressSpace::default());
        let i32_ty = self.backend.context.i32_type();
        let array_ty = i8_ptr.array_type(size);
        let base = self.backend.builder.build_alloca(array_ty, "opstack").map_err(internal)?;
        let top = self.backend.builder.build_alloca(i32_ty, "opstack_top").map_err(internal)?;
        self.backend
            .builder
            .build_store(top, i32_ty.const_zero())
            .map_err(internal)?;
        let base_ptr = {
            let zero = i32_ty.const_zero();
            unsafe {
                self.backend
                    .builder
                    .build_in_bounds_gep(array_ty, base, &[zero, zero], "opstack_base")
                    .map_err(internal)?
            }
        };

        let elements = self.tree.get(block_id).elements.clone();
        let mut pushed_any = false;

        for element in &elements {
            match element {
                Element::Token(t) if is_stack_operator(&t.token.text) => {
                    self.apply_stack_operator(&t.token, base_ptr, top, pushed_any)?;
                    pushed_any = true;
                }
                Element::Token(t) => {
                    let value = self.evaluate_token(t, type_ctx)?;
                    let slot = self.spill(value)?;
                    self.push_stack(base_ptr, top, slot)?;
                    pushed_any = true;
                }
                Element::Block(id) => {
                    let kind = self.tree.get(*id).kind;
                    let value = match kind {
                        BlockKind::Stack => self.evaluate_stack(*id, type_ctx)?,
                        BlockKind::Segment | BlockKind::Options | BlockKind::Root => {
                            return Err(CompileError::InvalidLiteralValueType {
                                span: Span::DUMMY,
                                detail: "segment/options blocks cannot appear inside a stack literal".into(),
                            })
                        }
                    };
                    let slot = self.spill(value)?;
                    self.push_stack(base_ptr, top, slot)?;
                    pushed_any = true;
                }
            }
        }

        let result_ptr = self.pop_stack(base_ptr, top)?;
        let target = type_ctx.unwrap_or("i8");
        let target_ty = self
            .backend
            .types
            .resolve(target)
            .ok_or_else(|| CompileError::InvalidTypeValue {
                span: Span::DUMMY,
                name: target.to_string(),
            })?;
        let loaded = self
            .backend
            .builder
            .build_load(target_ty, result_ptr, "stack_result")
            .map_err(internal)?;
        Ok(Value::new(leak(target.to_string()), loaded))
    }

    fn spill(&mut self, value: Value<'ctx>) -> Result<PointerValue<'ctx>, CompileError> {
        if let Some(ptr) = value.value_ptr {
            return Ok(ptr);
        }
        let alloca = self
            .backend
            .builder
            .build_alloca(value.value.get_type(), "spill")
            .map_err(internal)?;
        self.backend.builder.build_store(alloca, value.value).map_err(internal)?;
        Ok(alloca)
    }

    fn push_stack(&self, base: PointerValue<'ctx>, top: PointerValue<'ctx>, value: PointerValue<'ctx>) -> Result<(), CompileError> {
        let push_fn = self.backend.stack_push_fn();
        self.backend
            .builder
            .build_call(push_fn, &[base.into(), top.into(), value.into()], "")
            .map_err(internal)?;
        Ok(())
    }

    fn pop_stack(&self, base: PointerValue<'ctx>, top: PointerValue<'ctx>) -> Result<PointerValue<'ctx>, CompileError> {
        let pop_fn = self.backend.stack_pop_fn();
        let call = self
            .backend
            .builder
            .build_call(pop_fn, &[base.into(), top.into()], "popped")
            .map_err(internal)?;
        Ok(call
            .try_as_basic_value()
            .left()
            .expect("pimoc_stack_pop always returns i8*")
            .into_pointer_value())
    }

    /// Applies one composite-form operator token (spec §4.5.1's table).
    /// `stack_is_empty` distinguishes the two `!` spellings per §11 Open
    /// Question 2: "push the stack's size" only when `!` is the first
    /// element evaluated against this stack.
    fn apply_stack_operator(
        &self,
        token: &Token,
        base: PointerValue<'ctx>,
        top: PointerValue<'ctx>,
        stack_has_contents: bool,
    ) -> Result<(), CompileError> {
        let i32_ty = self.backend.context.i32_type();
        match token.text.as_str() {
            ".%" | "..%" | "%" | "dup" | "*" | "+" | "-" => {
                self.apply_binary_or_unary_operator(token, base, top)
            }
            "!" if !stack_has_contents => {
                let size = self
                    .backend
                    .builder
                    .build_load(i32_ty, top, "stack_size")
                    .map_err(internal)?;
                let alloca = self.backend.builder.build_alloca(i32_ty, "size_spill").map_err(internal)?;
                self.backend.builder.build_store(alloca, size).map_err(internal)?;
                self.push_stack(base, top, alloca.into())?;
                Ok(())
            }
            "!" => {
                let popped = self.pop_stack(base, top)?;
                let loaded = self
                    .backend
                    .builder
                    .build_load(i32_ty, popped, "negate_operand")
                    .map_err(internal)?
                    .into_int_value();
                let is_zero = self
                    .backend
                    .builder
                    .build_int_compare(IntPredicate::EQ, loaded, i32_ty.const_zero(), "is_zero")
                    .map_err(internal)?;
                let extended = self
                    .backend
                    .builder
                    .build_int_z_extend(is_zero, i32_ty, "negated")
                    .map_err(internal)?;
                let alloca = self.backend.builder.build_alloca(i32_ty, "negated_spill").map_err(internal)?;
                self.backend.builder.build_store(alloca, extended).map_err(internal)?;
                self.push_stack(base, top, alloca.into())?;
                Ok(())
            }
            "==" | "!=" | "<=" | ">=" | "<" | ">" | "and" | "or" => {
                self.apply_compare_or_logic_operator(token, base, top)
            }
            other => Err(CompileError::InvalidOperator {
                span: Span::new(token.line),
                op: other.to_string(),
            }),
        }
    }

    fn apply_binary_or_unary_operator(
        &self,
        token: &Token,
        base: PointerValue<'ctx>,
        top: PointerValue<'ctx>,
    ) -> Result<(), CompileError> {
        let i32_ty = self.backend.context.i32_type();
        match token.text.as_str() {
            ".%" => {
                let current_top = self.backend.builder.build_load(i32_ty, top, "cur_top").map_err(internal)?.into_int_value();
                let prev = self.backend.builder.build_int_sub(current_top, i32_ty.const_int(1, false), "prev_idx").map_err(internal)?;
                let ptr_ty = self.backend.context.ptr_type(AddressSpace::default());
                let slot = unsafe { self.backend.builder.build_in_bounds_gep(ptr_ty, base, &[prev], "top_slot").map_err(internal)? };
                let value = self.backend.builder.build_load(ptr_ty, slot, "top_val").map_err(internal)?;
                let alloca = self.backend.builder.build_alloca(ptr_ty, "top_spill").map_err(internal)?;
                self.backend.builder.build_store(alloca, value).map_err(internal)?;
                self.push_stack(base, top, alloca)
            }
            "..%" => self.push_stack(base, top, base),
            "%" => {
                let popped = self.pop_stack(base, top)?;
                let ptr_ty = self.backend.context.ptr_type(AddressSpace::default());
                let inner = self.backend.builder.build_load(ptr_ty, popped, "deref").map_err(internal)?;
                let alloca = self.backend.builder.build_alloca(ptr_ty, "deref_spill").map_err(internal)?;
                self.backend.builder.build_store(alloca, inner).map_err(internal)?;
                self.push_stack(base, top, alloca)
            }
            "dup" => {
                let popped = self.pop_stack(base, top)?;
                self.push_stack(base, top, popped)?;
                self.push_stack(base, top, popped)
            }
            "*" => {
                let popped = self.pop_stack(base, top)?;
                let ptr_ty = self.backend.context.ptr_type(AddressSpace::default());
                let loaded = self.backend.builder.build_load(ptr_ty, popped, "spill_src").map_err(internal)?;
                let alloca = self.backend.builder.build_alloca(ptr_ty, "spilled").map_err(internal)?;
                self.backend.builder.build_store(alloca, loaded).map_err(internal)?;
                self.push_stack(base, top, alloca)
            }
            "+" | "-" => {
                let (a, b) = self.pop_two_ints(base, top)?;
                let result = if token.text == "+" {
                    self.backend.builder.build_int_add(a, b, "add_tmp").map_err(internal)?
                } else {
                    self.backend.builder.build_int_sub(a, b, "sub_tmp").map_err(internal)?
                };
                self.push_int_result(base, top, result)
            }
            other => Err(CompileError::InvalidOperator {
                span: Span::new(token.line),
                op: other.to_string(),
            }),
        }
    }

    fn apply_compare_or_logic_operator(
        &self,
        token: &Token,
        base: PointerValue<'ctx>,
        top: PointerValue<'ctx>,
    ) -> Result<(), CompileError> {
        let (a, b) = self.pop_two_ints(base, top)?;
        let predicate = match token.text.as_str() {
            "==" => IntPredicate::EQ,
            "!=" => IntPredicate::NE,
            "<=" => IntPredicate::ULE,
            ">=" => IntPredicate::UGE,
            "<" => IntPredicate::ULT,
            ">" => IntPredicate::UGT,
            "and" | "or" => {
                let i32_ty = self.backend.context.i32_type();
                let zero = i32_ty.const_zero();
                let a_bool = self.backend.builder.build_int_compare(IntPredicate::NE, a, zero, "a_bool").map_err(internal)?;
                let b_bool = self.backend.builder.build_int_compare(IntPredicate::NE, b, zero, "b_bool").map_err(internal)?;
                let combined = if token.text == "and" {
                    self.backend.builder.build_and(a_bool, b_bool, "and_tmp").map_err(internal)?
                } else {
                    self.backend.builder.build_or(a_bool, b_bool, "or_tmp").map_err(internal)?
                };
                return self.push_bool_result(base, top, combined);
            }
            other => {
                return Err(CompileError::InvalidOperator {
                    span: Span::new(token.line),
                    op: other.to_string(),
                })
            }
        };
        let cmp = self
            .backend
            .builder
            .build_int_compare(predicate, a, b, "cmp_tmp")
            .map_err(internal)?;
        self.push_bool_result(base, top, cmp)
    }

    fn pop_two_ints(&self, base: PointerValue<'ctx>, top: PointerValue<'ctx>) -> Result<(IntValue<'ctx>, IntValue<'ctx>), CompileError> {
        let i32_ty = self.backend.context.i32_type();
        let b_ptr = self.pop_stack(base, top)?;
        let a_ptr = self.pop_stack(base, top)?;
        let a = self.backend.builder.build_load(i32_ty, a_ptr, "lhs").map_err(internal)?.into_int_value();
        let b = self.backend.builder.build_load(i32_ty, b_ptr, "rhs").map_err(internal)?.into_int_value();
        Ok((a, b))
    }

    fn push_int_result(&self, base: PointerValue<'ctx>, top: PointerValue<'ctx>, value: IntValue<'ctx>) -> Result<(), CompileError> {
        let alloca = self.backend.builder.build_alloca(value.get_type(), "result_spill").map_err(internal)?;
        self.backend.builder.build_store(alloca, value).map_err(internal)?;
        self.push_stack(base, top, alloca)
    }

    fn push_bool_result(&self, base: PointerValue<'ctx>, top: PointerValue<'ctx>, value: IntValue<'ctx>) -> Result<(), CompileError> {
        self.push_int_result(base, top, value)
    }
}

/// True for every spelling in the composite-form operator table (spec
/// §4.5.1), whether the lexer classified it as `TokenKind::Operator` (the
/// punctuation spellings) or `TokenKind::Name` (the word spellings `dup`,
/// `and`, `or` — the lexer has no reserved-word list for these).
fn is_stack_operator(text: &str) -> bool {
    matches!(
        text,
        ".%" | "..%" | "%" | "dup" | "*" | "+" | "-" | "!" | "==" | "!=" | "<=" | ">=" | "<" | ">" | "and" | "or"
    )
}

fn internal(e: impl std::fmt::Display) -> CompileError {
    CompileError::Internal {
        message: e.to_string(),
    }
}

/// Short-lived type-name strings are leaked to satisfy `Value`'s `'static`
/// `ty` field; type names are drawn from a small fixed vocabulary (spec §6)
/// so this never grows unbounded in practice.
fn leak(s: String) -> &'static str {
    Box::leak(s.into_boxed_str())
}
