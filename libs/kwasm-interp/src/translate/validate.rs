// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Decode-time checks of constant expressions and function bodies.
//!
//! Only index bounds and the shape of constant expressions are checked here.
//! Control structure, stack heights and operand types are checked when a body
//! is translated.

use cranelift_entity::{EntityRef, PrimaryMap};
use kwasm_parser::{
    BlockType, ConstExpr, FunctionBody, Instruction, MAX_WASM_FUNCTION_LOCALS, MemArg, NumericOp,
    RefType, ValType,
};
use smallvec::SmallVec;

use super::{DataMode, ElementItems, ElementMode, TranslatedModule, malformed};
use crate::indices::DefinedFuncIndex;

pub(super) fn validate_module(
    module: &TranslatedModule,
    bodies: &PrimaryMap<DefinedFuncIndex, FunctionBody>,
) -> crate::Result<()> {
    for (index, init) in &module.global_initializers {
        let global = module.global_index(index);
        let ty = module.globals[global].content;
        // initializers may only read globals declared before them
        check_const_expr(module, init, ty, global.index())?;
    }

    let num_globals = module.globals.len();
    for (_, segment) in &module.elements {
        if let ElementMode::Active { offset, .. } = &segment.mode {
            check_const_expr(module, offset, ValType::I32, num_globals)?;
        }
        if let ElementItems::Expressions(exprs) = &segment.items {
            for expr in exprs {
                check_const_expr(module, expr, ValType::from(segment.ty), num_globals)?;
            }
        }
    }

    for (_, segment) in &module.data {
        if let DataMode::Active { offset, .. } = &segment.mode {
            check_const_expr(module, offset, ValType::I32, num_globals)?;
        }
    }

    for (index, body) in bodies {
        check_body(module, index, body)?;
    }

    Ok(())
}

fn check_const_expr(
    module: &TranslatedModule,
    expr: &ConstExpr,
    expected: ValType,
    visible_globals: usize,
) -> crate::Result<()> {
    let err = |message: &str| malformed(message, Some(expr.position));
    let mut stack: SmallVec<[ValType; 2]> = SmallVec::new();

    for instr in &expr.instructions {
        match instr {
            Instruction::I32Const(_) => stack.push(ValType::I32),
            Instruction::I64Const(_) => stack.push(ValType::I64),
            Instruction::F32Const(_) => stack.push(ValType::F32),
            Instruction::F64Const(_) => stack.push(ValType::F64),
            Instruction::RefNull(ty) => stack.push(ValType::from(*ty)),
            Instruction::RefFunc(index) => {
                if usize::try_from(*index).is_ok_and(|index| index < module.functions.len()) {
                    stack.push(ValType::FuncRef);
                } else {
                    return Err(err("unknown function in constant expression"));
                }
            }
            Instruction::GlobalGet(index) => {
                let ty = usize::try_from(*index)
                    .ok()
                    .filter(|index| *index < visible_globals)
                    .and_then(|index| module.globals.get(EntityRef::new(index)))
                    .ok_or_else(|| err("unknown global in constant expression"))?;
                if ty.is_mutable() {
                    return Err(err("constant expression required"));
                }
                stack.push(ty.content);
            }
            Instruction::Numeric(op) => {
                let ty = match op {
                    NumericOp::I32Add | NumericOp::I32Sub | NumericOp::I32Mul => ValType::I32,
                    NumericOp::I64Add | NumericOp::I64Sub | NumericOp::I64Mul => ValType::I64,
                    _ => return Err(err("constant expression required")),
                };
                let rhs = stack.pop();
                let lhs = stack.pop();
                if lhs != Some(ty) || rhs != Some(ty) {
                    return Err(err("type mismatch in constant expression"));
                }
                stack.push(ty);
            }
            _ => return Err(err("constant expression required")),
        }
    }

    if stack.as_slice() == [expected] {
        Ok(())
    } else {
        Err(err("type mismatch in constant expression"))
    }
}

struct BodyChecker<'a> {
    module: &'a TranslatedModule,
    num_locals: u64,
    offset: usize,
}

impl BodyChecker<'_> {
    fn bounds(&self, index: u32, len: usize, what: &str) -> crate::Result<()> {
        if usize::try_from(index).is_ok_and(|index| index < len) {
            Ok(())
        } else {
            Err(malformed(format!("unknown {what} {index}"), Some(self.offset)))
        }
    }

    fn ty(&self, index: u32) -> crate::Result<()> {
        self.bounds(index, self.module.types.len(), "type")
    }

    fn func(&self, index: u32) -> crate::Result<()> {
        self.bounds(index, self.module.functions.len(), "function")
    }

    fn table(&self, index: u32) -> crate::Result<()> {
        self.bounds(index, self.module.tables.len(), "table")
    }

    fn memory(&self, index: u32) -> crate::Result<()> {
        self.bounds(index, self.module.memories.len(), "memory")
    }

    fn global(&self, index: u32) -> crate::Result<()> {
        self.bounds(index, self.module.globals.len(), "global")
    }

    fn elem(&self, index: u32) -> crate::Result<()> {
        self.bounds(index, self.module.elements.len(), "elem segment")
    }

    fn data(&self, index: u32) -> crate::Result<()> {
        let Some(count) = self.module.data_count else {
            return Err(malformed("data count section required", Some(self.offset)));
        };
        if index < count {
            Ok(())
        } else {
            Err(malformed(
                format!("unknown data segment {index}"),
                Some(self.offset),
            ))
        }
    }

    fn local(&self, index: u32) -> crate::Result<()> {
        if u64::from(index) < self.num_locals {
            Ok(())
        } else {
            Err(malformed(
                format!("unknown local {index}"),
                Some(self.offset),
            ))
        }
    }

    fn block_type(&self, ty: BlockType) -> crate::Result<()> {
        match ty {
            BlockType::Func(index) => self.ty(index),
            BlockType::Empty | BlockType::Value(_) => Ok(()),
        }
    }

    fn memarg(&self, memarg: &MemArg, width: usize) -> crate::Result<()> {
        self.memory(memarg.memory)?;
        if 1_u64.checked_shl(memarg.align).is_none_or(|align| align > width as u64) {
            return Err(malformed(
                "alignment must not be larger than natural",
                Some(self.offset),
            ));
        }
        Ok(())
    }

    fn check(&self, instr: &Instruction) -> crate::Result<()> {
        match instr {
            Instruction::Block(ty) | Instruction::Loop(ty) | Instruction::If(ty) => {
                self.block_type(*ty)
            }
            Instruction::Call(index) | Instruction::RefFunc(index) => self.func(*index),
            Instruction::CallIndirect { ty, table } => {
                self.ty(*ty)?;
                self.table(*table)?;
                if self.module.tables[EntityRef::new(*table as usize)].element != RefType::FuncRef
                {
                    return Err(malformed(
                        "call_indirect requires a funcref table",
                        Some(self.offset),
                    ));
                }
                Ok(())
            }
            Instruction::LocalGet(index)
            | Instruction::LocalSet(index)
            | Instruction::LocalTee(index) => self.local(*index),
            Instruction::GlobalGet(index) => self.global(*index),
            Instruction::GlobalSet(index) => {
                self.global(*index)?;
                if !self.module.globals[EntityRef::new(*index as usize)].is_mutable() {
                    return Err(malformed("global is immutable", Some(self.offset)));
                }
                Ok(())
            }
            Instruction::TableGet(table)
            | Instruction::TableSet(table)
            | Instruction::TableGrow(table)
            | Instruction::TableSize(table)
            | Instruction::TableFill(table) => self.table(*table),
            Instruction::TableInit { elem, table } => {
                self.elem(*elem)?;
                self.table(*table)
            }
            Instruction::ElemDrop(elem) => self.elem(*elem),
            Instruction::TableCopy { dst, src } => {
                self.table(*dst)?;
                self.table(*src)
            }
            Instruction::Load(op, memarg) => self.memarg(memarg, op.width()),
            Instruction::Store(op, memarg) => self.memarg(memarg, op.width()),
            Instruction::MemorySize(memory)
            | Instruction::MemoryGrow(memory)
            | Instruction::MemoryFill(memory) => self.memory(*memory),
            Instruction::MemoryInit { data, memory } => {
                self.memory(*memory)?;
                self.data(*data)
            }
            Instruction::DataDrop(data) => self.data(*data),
            Instruction::MemoryCopy { dst, src } => {
                self.memory(*dst)?;
                self.memory(*src)
            }
            _ => Ok(()),
        }
    }
}

fn check_body(
    module: &TranslatedModule,
    index: DefinedFuncIndex,
    body: &FunctionBody,
) -> crate::Result<()> {
    let ty = module
        .func_type(module.func_index(index))
        .ok_or_else(|| malformed("unknown function type", Some(body.code_offset)))?;

    let num_locals = body
        .locals
        .iter()
        .fold(ty.params().len() as u64, |acc, (count, _)| {
            acc.saturating_add(u64::from(*count))
        });
    if num_locals > MAX_WASM_FUNCTION_LOCALS as u64 {
        return Err(malformed("too many locals", Some(body.code_offset)));
    }

    let mut checker = BodyChecker {
        module,
        num_locals,
        offset: body.code_offset,
    };
    for res in body.instructions() {
        let (offset, instr) = res?;
        checker.offset = offset;
        checker.check(&instr)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use kwasm_parser::{Parser, SliceCursor};

    use crate::Error;
    use crate::translate::ModuleTranslator;

    fn check(wat: &str) -> crate::Result<()> {
        let wasm = wat::parse_str(wat).unwrap();
        ModuleTranslator::new()
            .translate(Parser::new(SliceCursor::new(&wasm)))
            .map(drop)
    }

    #[test]
    fn const_exprs() {
        check(r#"(module (global i32 (i32.add (i32.const 1) (i32.const 2))))"#).unwrap();
        check(
            r#"(module
                (import "env" "g" (global i64))
                (global i64 (global.get 0)))"#,
        )
        .unwrap();

        let err = check(r#"(module (global i32 (i64.const 1)))"#).unwrap_err();
        assert!(err.to_string().contains("type mismatch"), "{err}");

        let err = check(r#"(module (global (mut i32) (i32.const 0)) (global i32 (global.get 0)))"#)
            .unwrap_err();
        assert!(matches!(err, Error::Malformed { .. }));

        let err = check(r#"(module (global i32 (i32.div_s (i32.const 1) (i32.const 1))))"#)
            .unwrap_err();
        assert!(err.to_string().contains("constant expression required"), "{err}");
    }

    #[test]
    fn body_indices() {
        check(r#"(module (memory 1) (func (drop (i32.load offset=4 (i32.const 0)))))"#).unwrap();

        assert!(check(r#"(module (func (drop (i32.load (i32.const 0)))))"#).is_err());
        assert!(check(r#"(module (func (global.set 0 (i32.const 1))) (global i32 (i32.const 0)))"#).is_err());
        assert!(check(r#"(module (func (drop (table.size 0))))"#).is_err());
    }

    #[test]
    fn data_count_required() {
        let err = check(
            r#"(module
                (memory 1)
                (func (data.drop 0)))"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Malformed { offset: Some(_), .. }), "{err}");
    }
}
