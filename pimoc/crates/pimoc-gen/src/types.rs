//! Type name table (spec §6 "Recognised literal types").
//!
//! Grounded on the teacher's `TypeMapper` — a thin wrapper around `&'ctx
//! Context` with a lookup method — but driven from the spec's named type
//! table instead of a placeholder enum with a single `i64`-for-everything
//! fallback.

use inkwell::context::Context;
use inkwell::types::BasicTypeEnum;

/// Maps the source language's type names to LLVM IR basic types.
pub struct TypeMapper<'ctx> {
    context: &'ctx Context,
}

impl<'ctx> TypeMapper<'ctx> {
    pub fn new(context: &'ctx Context) -> Self {
        Self { context }
    }

    /// Resolves a type name to its LLVM basic type, normalising the spec's
    /// aliases (`int`, `dec`, `byte`, `chr`) to their canonical width first.
    pub fn resolve(&self, name: &str) -> Option<BasicTypeEnum<'ctx>> {
        let canonical = match name {
            "int" => "u32",
            "dec" => "f64",
            "byte" => "u8",
            "chr" => "i8",
            other => other,
        };
        let ty = match canonical {
            "u8" | "i8" => self.context.i8_type().into(),
            "u16" | "i16" => self.context.i16_type().into(),
            "u24" | "i24" => self.context.custom_width_int_type(24).into(),
            "u32" | "i32" => self.context.i32_type().into(),
            "u64" | "i64" => self.context.i64_type().into(),
            "u128" | "i128" => self.context.i128_type().into(),
            "u256" | "i256" => self.context.custom_width_int_type(256).into(),
            "f32" | "float" => self.context.f32_type().into(),
            "f64" | "double" => self.context.f64_type().into(),
            "bool" => self.context.bool_type().into(),
            _ => return None,
        };
        Some(ty)
    }

    /// Bit width for an integer type name, used by the lexer-independent
    /// "smallest integer type that fits" rule of §4.5.1's simple
    /// `LiteralValue` form.
    pub fn int_bits_for_value(value: i128) -> u32 {
        let bits = [8u32, 16, 32, 64, 128];
        for width in bits {
            let max = if width == 128 { i128::MAX } else { (1i128 << (width - 1)) - 1 };
            let min = if width == 128 { i128::MIN } else { -(1i128 << (width - 1)) };
            if value <= max && value >= min {
                return width;
            }
        }
        128
    }

    /// True if `name` is one of §6's recognised type names (including
    /// `void`, which carries no `BasicTypeEnum`).
    pub fn is_known_type_name(name: &str) -> bool {
        matches!(
            name,
            "u8" | "i8"
                | "u16" | "i16"
                | "u24" | "i24"
                | "u32" | "i32"
                | "u64" | "i64"
                | "u128" | "i128"
                | "u256" | "i256"
                | "f32" | "float"
                | "f64" | "double"
                | "chr"
                | "bool"
                | "void"
                | "int"
                | "dec"
                | "byte"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_alias_normalises_to_u32_width() {
        let ctx = Context::create();
        let mapper = TypeMapper::new(&ctx);
        let int_ty = mapper.resolve("int").unwrap();
        let i32_ty = mapper.resolve("i32").unwrap();
        assert_eq!(format!("{int_ty:?}"), format!("{i32_ty:?}"));
    }

    #[test]
    fn smallest_width_grows_with_magnitude() {
        assert_eq!(TypeMapper::int_bits_for_value(10), 8);
        assert_eq!(TypeMapper::int_bits_for_value(1000), 16);
        assert_eq!(TypeMapper::int_bits_for_value(i64::MAX as i128), 64);
    }

    #[test]
    fn void_is_known_but_unresolvable_as_basic_type() {
        assert!(TypeMapper::is_known_type_name("void"));
        let ctx = Context::create();
        let mapper = TypeMapper::new(&ctx);
        assert!(mapper.resolve("void").is_none());
    }
}
