//! Instruction splitting and dispatch (spec §4.5).
//!
//! Grounded on the teacher's general block-walking lowering pass, reworked
//! around this spec's semicolon-delimited instruction model instead of a
//! statement-list AST.

use inkwell::AddressSpace;

use pimoc_lex::TokenKind;
use pimoc_par::{BlockId, BlockKind, Element, TokenNode};
use pimoc_util::{CompileError, Span};

use crate::compiler::Compiler;
use crate::control_flow::Alternative;
use crate::scope::ScopeKind;

impl<'a, 'ctx> Compiler<'a, 'ctx> {
    /// Compiles a `Segment` block's children: split on `;` into
    /// instructions, dispatch each in order (spec §4.5).
    pub fn compile_segment(&mut self, block_id: BlockId) -> Result<(), CompileError> {
        let elements = self.tree.get(block_id).elements.clone();
        let instructions = split_instructions(&elements);
        if instructions.is_empty() {
            return Err(CompileError::EmptySegment {
                span: Span::DUMMY,
                context: "function body".into(),
            });
        }
        log::trace!("compiling segment {block_id:?} with {} instructions", instructions.len());
        for instruction in instructions {
            if instruction.is_empty() {
                continue;
            }
            self.dispatch_instruction(&instruction)?;
        }
        Ok(())
    }

    fn dispatch_instruction(&mut self, instruction: &[Element]) -> Result<(), CompileError> {
        let head = instruction[0].as_token().ok_or_else(|| CompileError::InvalidInstruction {
            span: Span::DUMMY,
            token: "<block>".into(),
        })?;

        match head.token.text.as_str() {
            "func" => self.dispatch_func(instruction),
            "proc" => self.dispatch_proc(instruction),
            "return" => self.dispatch_return(instruction),
            "if" => self.dispatch_if(instruction),
            "while" => self.dispatch_while(instruction),
            _ if is_assignment(instruction) => self.dispatch_assignment(instruction),
            _ if is_variable_decl(self, instruction) => self.dispatch_variable_decl(instruction),
            "ops" => self.dispatch_ops(instruction),
            _ => self.dispatch_bare_expression(instruction),
        }
    }

    fn dispatch_func(&mut self, instruction: &[Element]) -> Result<(), CompileError> {
        if instruction.len() < 3 {
            return Err(CompileError::InvalidInstructionSyntax {
                span: Span::DUMMY,
                detail: "'func' requires a return type and a name".into(),
            });
        }
        let ret_type_tok = instruction[1].as_token().ok_or_else(|| CompileError::InvalidInstructionSyntax {
            span: Span::DUMMY,
            detail: "'func' return type must be a token".into(),
        })?;
        let name_node = instruction[2].as_token().ok_or_else(|| CompileError::InvalidInstructionSyntax {
            span: Span::DUMMY,
            detail: "'func' name must be a token".into(),
        })?;
        let params_block = name_node.options;
        let body_block = instruction.get(3).and_then(Element::as_block);

        self.declare_function(&ret_type_tok.token.text, &name_node.token, params_block, body_block, false)
    }

    fn dispatch_proc(&mut self, instruction: &[Element]) -> Result<(), CompileError> {
        if instruction.len() < 2 {
            return Err(CompileError::InvalidInstructionSyntax {
                span: Span::DUMMY,
                detail: "'proc' requires a name".into(),
            });
        }
        let name_node = instruction[1].as_token().ok_or_else(|| CompileError::InvalidInstructionSyntax {
            span: Span::DUMMY,
            detail: "'proc' name must be a token".into(),
        })?;
        let body_block = instruction.get(2).and_then(Element::as_block);
        self.declare_function("void", &name_node.token, None, body_block, true)
    }

    fn declare_function(
        &mut self,
        ret_type: &str,
        name_token: &pimoc_lex::Token,
        params_block: Option<BlockId>,
        body_block: Option<BlockId>,
        is_proc: bool,
    ) -> Result<(), CompileError> {
        let is_root = self.scopes.get(self.current_scope).parent.is_none();
        let ident = if name_token.text == "main" && is_root {
            "main".to_string()
        } else if is_root {
            name_token.text.clone()
        } else {
            self.next_func_id()
        };
        self.mark_used(&ident);
        log::debug!("declaring function '{}' as @{ident} (ret {ret_type})", name_token.text);

        let param_types: Vec<String> = params_block
            .map(|id| {
                self.tree
                    .get(id)
                    .elements
                    .iter()
                    .filter_map(Element::as_token)
                    .filter(|t| t.token.kind == TokenKind::Type || t.token.ty.is_some())
                    .map(|t| t.token.text.clone())
                    .collect()
            })
            .unwrap_or_default();

        let param_llvm_types: Vec<inkwell::types::BasicMetadataTypeEnum> = param_types
            .iter()
            .filter_map(|t| self.backend.types.resolve(t))
            .map(Into::into)
            .collect();

        let fn_type = if ret_type == "void" {
            self.backend.context.void_type().fn_type(&param_llvm_types, false)
        } else {
            let ret = self
                .backend
                .types
                .resolve(ret_type)
                .ok_or_else(|| CompileError::InvalidTypeValue {
                    span: Span::new(name_token.line),
                    name: ret_type.to_string(),
                })?;
            ret.fn_type(&param_llvm_types, false)
        };

        if let Some(existing) = self.scopes.resolve(self.current_scope, &name_token.text) {
            if body_block.is_some() {
                if let ScopeKind::Function { .. } = self.scopes.get(existing).kind {
                    return Err(CompileError::NameAlreadyTaken {
                        span: Span::new(name_token.line),
                        name: name_token.text.clone(),
                    });
                }
            }
        }

        let function = self.backend.module.add_function(&ident, fn_type, None);
        let entry = self.backend.context.append_basic_block(function, "entry");

        let parent = self.current_scope;
        let fn_scope = match self.scopes.declare(
            parent,
            &name_token.text,
            ScopeKind::Function {
                function,
                entry,
                return_type: if ret_type == "void" { None } else { Some(ret_type.to_string()) },
            },
        ) {
            Ok(id) => id,
            Err(existing) => existing,
        };

        let Some(body_block) = body_block else {
            return Ok(());
        };

        let saved_scope = self.current_scope;
        self.current_scope = fn_scope;
        self.backend.builder.position_at_end(entry);

        if let Some(params_block) = params_block {
            self.spill_parameters(params_block, function)?;
        }

        self.compile_segment(body_block)?;

        let current_block = self.backend.builder.get_insert_block().expect("builder always has an insertion point");
        if current_block.get_terminator().is_none() {
            if ret_type == "void" || is_proc {
                self.backend.builder.build_return(None).map_err(internal)?;
            } else {
                let ty = self.backend.types.resolve(ret_type).expect("checked above");
                let zero = zero_value(ty);
                self.backend.builder.build_return(Some(&zero)).map_err(internal)?;
            }
        }

        self.current_scope = saved_scope;
        Ok(())
    }

    fn spill_parameters(&mut self, params_block: BlockId, function: inkwell::values::FunctionValue<'ctx>) -> Result<(), CompileError> {
        let params: Vec<TokenNode> = self
            .tree
            .get(params_block)
            .elements
            .iter()
            .filter_map(Element::as_token)
            .cloned()
            .collect();

        for (i, param) in params.iter().enumerate() {
            let ty_name = param.token.ty.clone().unwrap_or_else(|| "i32".to_string());
            let ty = self
                .backend
                .types
                .resolve(&ty_name)
                .ok_or_else(|| CompileError::InvalidTypeValue {
                    span: Span::new(param.token.line),
                    name: ty_name.clone(),
                })?;
            let arg_value = function.get_nth_param(i as u32).ok_or_else(|| CompileError::InvalidArgumentSyntax {
                span: Span::new(param.token.line),
                detail: "parameter spill".into(),
                expected: params.len(),
                found: i,
            })?;

            let storage = self.backend.builder.build_alloca(ty, &format!("{}_storage", param.token.text)).map_err(internal)?;
            self.backend.builder.build_store(storage, arg_value).map_err(internal)?;
            let cell = self
                .backend
                .builder
                .build_alloca(self.backend.context.ptr_type(AddressSpace::default()), &format!("{}_cell", param.token.text))
                .map_err(internal)?;
            self.backend.builder.build_store(cell, storage).map_err(internal)?;

            self.scopes
                .declare(
                    self.current_scope,
                    &param.token.text,
                    ScopeKind::Variable {
                        cell,
                        ty: ty_name,
                        constant: false,
                    },
                )
                .map_err(|_| CompileError::NameAlreadyTaken {
                    span: Span::new(param.token.line),
                    name: param.token.text.clone(),
                })?;
        }
        Ok(())
    }

    fn dispatch_return(&mut self, instruction: &[Element]) -> Result<(), CompileError> {
        let fn_scope = self.enclosing_function_scope()?;
        let already_terminated = self
            .backend
            .builder
            .get_insert_block()
            .map(|block| block.get_terminator().is_some())
            .unwrap_or(false);
        if already_terminated {
            return Err(CompileError::InvalidInstructionContext {
                span: Span::DUMMY,
                detail: "a second 'return' in the same block".into(),
            });
        }

        let return_type = match &self.scopes.get(fn_scope).kind {
            ScopeKind::Function { return_type, .. } => return_type.clone(),
            _ => None,
        };

        if instruction.len() == 1 {
            match &return_type {
                None => self.backend.builder.build_return(None).map_err(internal)?,
                Some(ty_name) => {
                    let ty = self.backend.types.resolve(ty_name).ok_or_else(|| CompileError::InvalidTypeValue {
                        span: Span::DUMMY,
                        name: ty_name.clone(),
                    })?;
                    let zero = zero_value(ty);
                    self.backend.builder.build_return(Some(&zero)).map_err(internal)?
                }
            };
        } else {
            let value = self.evaluate_operand(&instruction[1], return_type.as_deref())?;
            self.backend.builder.build_return(Some(&value.value)).map_err(internal)?;
        }

        Ok(())
    }

    fn enclosing_function_scope(&self) -> Result<crate::scope::ScopeId, CompileError> {
        let mut scope = self.current_scope;
        loop {
            if matches!(self.scopes.get(scope).kind, ScopeKind::Function { .. }) {
                return Ok(scope);
            }
            match self.scopes.get(scope).parent {
                Some(parent) => scope = parent,
                None => {
                    return Err(CompileError::InvalidInstructionContext {
                        span: Span::DUMMY,
                        detail: "'return' outside of a function body".into(),
                    })
                }
            }
        }
    }

    fn dispatch_if(&mut self, instruction: &[Element]) -> Result<(), CompileError> {
        let mut alternatives = Vec::new();
        let mut i = 1;
        let cond = instruction[i].as_token().cloned().ok_or_else(|| CompileError::InvalidInstructionSyntax {
            span: Span::DUMMY,
            detail: "'if' requires a condition".into(),
        })?;
        i += 1;
        let body = instruction[i].as_block().ok_or_else(|| CompileError::InvalidInstructionSyntax {
            span: Span::DUMMY,
            detail: "'if' requires a body segment".into(),
        })?;
        alternatives.push(Alternative { cond, body });
        i += 1;

        let mut else_body = None;
        while i < instruction.len() {
            match instruction[i].as_token().map(|t| t.token.text.as_str()) {
                Some("elif") => {
                    let cond = instruction[i + 1].as_token().cloned().ok_or_else(|| CompileError::InvalidInstructionSyntax {
                        span: Span::DUMMY,
                        detail: "'elif' requires a condition".into(),
                    })?;
                    let body = instruction[i + 2].as_block().ok_or_else(|| CompileError::InvalidInstructionSyntax {
                        span: Span::DUMMY,
                        detail: "'elif' requires a body segment".into(),
                    })?;
                    alternatives.push(Alternative { cond, body });
                    i += 3;
                }
                Some("else") => {
                    else_body = Some(instruction[i + 1].as_block().ok_or_else(|| CompileError::InvalidInstructionSyntax {
                        span: Span::DUMMY,
                        detail: "'else' requires a body segment".into(),
                    })?);
                    i += 2;
                }
                _ => {
                    return Err(CompileError::InvalidInstructionSyntax {
                        span: Span::DUMMY,
                        detail: "unexpected token in 'if' chain".into(),
                    })
                }
            }
        }

        self.emit_if(&alternatives, else_body)
    }

    fn dispatch_while(&mut self, instruction: &[Element]) -> Result<(), CompileError> {
        let cond = instruction.get(1).and_then(Element::as_token).cloned().ok_or_else(|| CompileError::InvalidInstructionSyntax {
            span: Span::DUMMY,
            detail: "'while' requires a condition".into(),
        })?;
        let body = instruction.get(2).and_then(Element::as_block).ok_or_else(|| CompileError::InvalidInstructionSyntax {
            span: Span::DUMMY,
            detail: "'while' requires a body segment".into(),
        })?;
        self.emit_while(&cond, body)
    }

    fn dispatch_variable_decl(&mut self, instruction: &[Element]) -> Result<(), CompileError> {
        let ty_tok = instruction[0].as_token().expect("checked by is_variable_decl");
        let name_tok = instruction[1].as_token().ok_or_else(|| CompileError::InvalidInstructionSyntax {
            span: Span::DUMMY,
            detail: "variable declaration requires a name".into(),
        })?;
        let ty_name = ty_tok.token.text.clone();
        let ty = self.backend.types.resolve(&ty_name).ok_or_else(|| CompileError::InvalidTypeValue {
            span: Span::new(ty_tok.token.line),
            name: ty_name.clone(),
        })?;

        let cell = self
            .backend
            .builder
            .build_alloca(self.backend.context.ptr_type(AddressSpace::default()), &format!("{}_cell", name_tok.token.text))
            .map_err(internal)?;

        let initial_storage = if instruction.len() > 3 {
            let value = self.evaluate_operand(&instruction[3], Some(&ty_name))?;
            let storage = self.backend.builder.build_alloca(ty, &format!("{}_storage", name_tok.token.text)).map_err(internal)?;
            self.backend.builder.build_store(storage, value.value).map_err(internal)?;
            storage
        } else {
            self.backend.builder.build_alloca(ty, &format!("{}_storage", name_tok.token.text)).map_err(internal)?
        };
        self.backend.builder.build_store(cell, initial_storage).map_err(internal)?;

        self.scopes
            .declare(
                self.current_scope,
                &name_tok.token.text,
                ScopeKind::Variable {
                    cell,
                    ty: ty_name,
                    constant: false,
                },
            )
            .map_err(|_| CompileError::NameAlreadyTaken {
                span: Span::new(name_tok.token.line),
                name: name_tok.token.text.clone(),
            })?;
        Ok(())
    }

    fn dispatch_assignment(&mut self, instruction: &[Element]) -> Result<(), CompileError> {
        let name_tok = instruction[0].as_token().expect("checked by is_assignment");
        let scope_id = self.scopes.resolve(self.current_scope, &name_tok.token.text).ok_or_else(|| CompileError::NameNotFound {
            span: Span::new(name_tok.token.line),
            name: name_tok.token.text.clone(),
        })?;
        let (cell, ty_name) = match &self.scopes.get(scope_id).kind {
            ScopeKind::Variable { cell, ty, .. } => (*cell, ty.clone()),
            _ => {
                return Err(CompileError::InvalidElementType {
                    span: Span::new(name_tok.token.line),
                    detail: format!("'{}' is not an assignable variable", name_tok.token.text),
                })
            }
        };

        let value = self.evaluate_operand(&instruction[2], Some(&ty_name))?;
        let storage = self.spill_for_assignment(value, &ty_name)?;
        self.backend.builder.build_store(cell, storage).map_err(internal)?;
        Ok(())
    }

    fn spill_for_assignment(&mut self, value: crate::value::Value<'ctx>, ty_name: &str) -> Result<inkwell::values::PointerValue<'ctx>, CompileError> {
        if let Some(ptr) = value.value_ptr {
            return Ok(ptr);
        }
        let ty = self.backend.types.resolve(ty_name).ok_or_else(|| CompileError::InvalidTypeValue {
            span: Span::DUMMY,
            name: ty_name.to_string(),
        })?;
        let storage = self.backend.builder.build_alloca(ty, "assign_storage").map_err(internal)?;
        self.backend.builder.build_store(storage, value.value).map_err(internal)?;
        Ok(storage)
    }

    fn dispatch_ops(&mut self, instruction: &[Element]) -> Result<(), CompileError> {
        let body = instruction.get(1).and_then(Element::as_block).ok_or_else(|| CompileError::InvalidInstructionSyntax {
            span: Span::DUMMY,
            detail: "'ops' requires a parenthesised operation list".into(),
        })?;
        let body_elements = self.tree.get(body).elements.clone();
        let op_tok = body_elements.first().and_then(Element::as_token).ok_or_else(|| CompileError::InvalidInstructionSyntax {
            span: Span::DUMMY,
            detail: "'ops' requires a leading operator".into(),
        })?;
        let dest_tok = body_elements.get(1).and_then(Element::as_token).ok_or_else(|| CompileError::InvalidInstructionSyntax {
            span: Span::DUMMY,
            detail: "'ops' requires a destination variable".into(),
        })?;

        let scope_id = self.scopes.resolve(self.current_scope, &dest_tok.token.text).ok_or_else(|| CompileError::NameNotFound {
            span: Span::new(dest_tok.token.line),
            name: dest_tok.token.text.clone(),
        })?;
        let (cell, ty_name) = match &self.scopes.get(scope_id).kind {
            ScopeKind::Variable { cell, ty, .. } => (*cell, ty.clone()),
            _ => {
                return Err(CompileError::InvalidElementType {
                    span: Span::new(dest_tok.token.line),
                    detail: format!("'{}' is not an assignable variable", dest_tok.token.text),
                })
            }
        };

        let dest_value = self.evaluate_operand(&Element::Token(dest_tok.clone()), Some(&ty_name))?.value.into_int_value();
        let mut result = dest_value;
        for operand_elem in &body_elements[2..] {
            let operand = self.evaluate_operand(operand_elem, Some(&ty_name))?.value.into_int_value();
            result = match op_tok.token.text.as_str() {
                "add" => self.backend.builder.build_int_add(result, operand, "ops_add").map_err(internal)?,
                "sub" => self.backend.builder.build_int_sub(result, operand, "ops_sub").map_err(internal)?,
                other => {
                    return Err(CompileError::InvalidOperator {
                        span: Span::new(op_tok.token.line),
                        op: other.to_string(),
                    })
                }
            };
        }

        let ty = self.backend.types.resolve(&ty_name).ok_or_else(|| CompileError::InvalidTypeValue {
            span: Span::DUMMY,
            name: ty_name.clone(),
        })?;
        let storage = self.backend.builder.build_alloca(ty, "ops_result").map_err(internal)?;
        self.backend.builder.build_store(storage, result).map_err(internal)?;
        self.backend.builder.build_store(cell, storage).map_err(internal)?;
        Ok(())
    }

    fn dispatch_bare_expression(&mut self, instruction: &[Element]) -> Result<(), CompileError> {
        for element in instruction {
            self.evaluate_operand(element, None)?;
        }
        Ok(())
    }

    fn evaluate_operand(&mut self, element: &Element, type_ctx: Option<&str>) -> Result<crate::value::Value<'ctx>, CompileError> {
        match element {
            Element::Token(t) => self.evaluate_token(t, type_ctx),
            Element::Block(id) if self.tree.get(*id).kind == BlockKind::Stack => self.evaluate_stack(*id, type_ctx),
            Element::Block(_) => Err(CompileError::InvalidElementType {
                span: Span::DUMMY,
                detail: "expected a value, found a non-stack block".into(),
            }),
        }
    }
}

fn split_instructions(elements: &[Element]) -> Vec<Vec<Element>> {
    let mut instructions = Vec::new();
    let mut current = Vec::new();
    for element in elements {
        if let Element::Token(t) = element {
            if t.token.kind == TokenKind::Delimiter && t.token.text == ";" {
                instructions.push(std::mem::take(&mut current));
                continue;
            }
        }
        current.push(element.clone());
    }
    if !current.is_empty() {
        instructions.push(current);
    }
    instructions
}

fn is_assignment(instruction: &[Element]) -> bool {
    instruction.len() >= 3
        && matches!(instruction[0].as_token().map(|t| t.token.kind), Some(TokenKind::Name))
        && matches!(instruction[1].as_token().map(|t| t.token.text.as_str()), Some("="))
}

fn is_variable_decl(compiler: &Compiler<'_, '_>, instruction: &[Element]) -> bool {
    let Some(head) = instruction.first().and_then(Element::as_token) else {
        return false;
    };
    if instruction.len() < 2 {
        return false;
    }
    let is_type_name = head.token.kind == TokenKind::Type
        || pimoc_gen::TypeMapper::is_known_type_name(&head.token.text)
        || compiler.scopes.resolve(compiler.current_scope, &head.token.text).is_some();
    is_type_name && matches!(instruction[1].as_token().map(|t| t.token.kind), Some(TokenKind::Name))
}

fn zero_value(ty: inkwell::types::BasicTypeEnum) -> inkwell::values::BasicValueEnum {
    use inkwell::types::BasicType;
    ty.const_zero()
}

fn internal(e: impl std::fmt::Display) -> CompileError {
    CompileError::Internal {
        message: e.to_string(),
    }
}
