//! LLVM backend setup (spec §4.5.2).
//!
//! Grounded on the teacher's `LlvmBackend` in the now-removed `llvm.rs`:
//! same `&'ctx Context` / `Module<'ctx>` / `Builder<'ctx>` triple, same
//! `emit_llvm_ir` via `module.print_to_string()`. The GC runtime
//! declarations and the LIR-instruction-dispatch `compile_function` that
//! filled most of that file have no counterpart in this spec and are
//! dropped; in their place, `Backend::new` defines the single shared
//! `pimoc_stack_push`/`pimoc_stack_pop` function pair every OperatorStack
//! instance calls (§9 redesign note: one push/pop pair per module, not one
//! generated per stack).

use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::values::FunctionValue;
use inkwell::AddressSpace;

use pimoc_util::CompileError;

use crate::types::TypeMapper;

pub const STACK_PUSH_NAME: &str = "pimoc_stack_push";
pub const STACK_POP_NAME: &str = "pimoc_stack_pop";

/// Default OperatorStack capacity when no `N:[` sized opener is given
/// (spec §4.5.1).
pub const DEFAULT_STACK_SIZE: u32 = 128;

pub struct Backend<'ctx> {
    pub context: &'ctx Context,
    pub module: Module<'ctx>,
    pub builder: Builder<'ctx>,
    pub types: TypeMapper<'ctx>,
}

impl<'ctx> Backend<'ctx> {
    pub fn new(context: &'ctx Context, module_name: &str) -> Self {
        let module = context.create_module(module_name);
        let builder = context.create_builder();
        let types = TypeMapper::new(context);
        let mut backend = Self {
            context,
            module,
            builder,
            types,
        };
        backend.declare_stack_helpers();
        backend
    }

    /// Emits `pimoc_stack_push(i8** base, i32* top, i8* value)` and
    /// `pimoc_stack_pop(i8** base, i32* top) -> i8*`. The array's capacity
    /// is not part of either signature — only the call site (which owns the
    /// `alloca`) knows it — so one pair serves every OperatorStack
    /// regardless of its requested size.
    fn declare_stack_helpers(&mut self) {
        let i8_ptr = self.context.ptr_type(AddressSpace::default());
        let void_ty = self.context.void_type();

        let push_ty = void_ty.fn_type(&[i8_ptr.into(), i8_ptr.into(), i8_ptr.into()], false);
        let push_fn = self.module.add_function(STACK_PUSH_NAME, push_ty, None);
        self.build_push_body(push_fn, i8_ptr);

        let pop_ty = i8_ptr.fn_type(&[i8_ptr.into(), i8_ptr.into()], false);
        let pop_fn = self.module.add_function(STACK_POP_NAME, pop_ty, None);
        self.build_pop_body(pop_fn, i8_ptr);
    }

    fn build_push_body(&self, func: FunctionValue<'ctx>, i8_ptr: inkwell::types::PointerType<'ctx>) {
        let entry = self.context.append_basic_block(func, "entry");
        self.builder.position_at_end(entry);
        let i32_ty = self.context.i32_type();

        let base = func.get_nth_param(0).unwrap().into_pointer_value();
        let top_ptr = func.get_nth_param(1).unwrap().into_pointer_value();
        let value = func.get_nth_param(2).unwrap().into_pointer_value();

        let top = self
            .builder
            .build_load(i32_ty, top_ptr, "top")
            .unwrap()
            .into_int_value();
        let slot = unsafe {
            self.builder
                .build_in_bounds_gep(i8_ptr, base, &[top], "slot")
                .unwrap()
        };
        self.builder.build_store(slot, value).unwrap();
        let next_top = self
            .builder
            .build_int_add(top, i32_ty.const_int(1, false), "next_top")
            .unwrap();
        self.builder.build_store(top_ptr, next_top).unwrap();
        self.builder.build_return(None).unwrap();
    }

    fn build_pop_body(&self, func: FunctionValue<'ctx>, i8_ptr: inkwell::types::PointerType<'ctx>) {
        let entry = self.context.append_basic_block(func, "entry");
        self.builder.position_at_end(entry);
        let i32_ty = self.context.i32_type();

        let base = func.get_nth_param(0).unwrap().into_pointer_value();
        let top_ptr = func.get_nth_param(1).unwrap().into_pointer_value();

        let top = self
            .builder
            .build_load(i32_ty, top_ptr, "top")
            .unwrap()
            .into_int_value();
        let new_top = self
            .builder
            .build_int_sub(top, i32_ty.const_int(1, false), "new_top")
            .unwrap();
        self.builder.build_store(top_ptr, new_top).unwrap();
        let slot = unsafe {
            self.builder
                .build_in_bounds_gep(i8_ptr, base, &[new_top], "slot")
                .unwrap()
        };
        let value = self.builder.build_load(i8_ptr, slot, "value").unwrap();
        self.builder.build_return(Some(&value)).unwrap();
    }

    pub fn stack_push_fn(&self) -> FunctionValue<'ctx> {
        self.module.get_function(STACK_PUSH_NAME).expect("declared in Backend::new")
    }

    pub fn stack_pop_fn(&self) -> FunctionValue<'ctx> {
        self.module.get_function(STACK_POP_NAME).expect("declared in Backend::new")
    }

    /// Renders the finished module as LLVM IR text (spec §6's output
    /// contract: IR text only, no object/asm/executable emission here).
    pub fn emit_llvm_ir(&self) -> String {
        self.module.print_to_string().to_string()
    }

    pub fn verify(&self) -> Result<(), CompileError> {
        self.module.verify().map_err(|e| CompileError::Internal {
            message: format!("module verification failed: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_declares_shared_stack_helpers_once() {
        let context = Context::create();
        let backend = Backend::new(&context, "test");
        assert!(backend.module.get_function(STACK_PUSH_NAME).is_some());
        assert!(backend.module.get_function(STACK_POP_NAME).is_some());
    }

    #[test]
    fn emitted_ir_mentions_both_helpers() {
        let context = Context::create();
        let backend = Backend::new(&context, "test");
        let ir = backend.emit_llvm_ir();
        assert!(ir.contains(STACK_PUSH_NAME));
        assert!(ir.contains(STACK_POP_NAME));
    }
}
