// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use kwasm_parser::{ConstExpr, Instruction, NumericOp};
use smallvec::SmallVec;

use crate::func::Func;
use crate::global::Global;
use crate::store::StoreOpaque;
use crate::translate::malformed;
use crate::values::VmVal;

/// The entities a constant expression can refer to.
pub(crate) struct ConstEvalContext<'a> {
    pub(crate) store: &'a StoreOpaque,
    /// Globals initialized so far, imported ones first.
    pub(crate) globals: &'a [Global],
    pub(crate) functions: &'a [Func],
}

/// Simple interpreter for constant expressions.
#[derive(Debug, Default)]
pub(crate) struct ConstExprEvaluator {
    stack: SmallVec<[VmVal; 2]>,
}

impl ConstExprEvaluator {
    /// Evaluate a `ConstExpr` returning the result value.
    ///
    /// Constant expressions produce init values for globals and table
    /// elements or segment offsets, so all of them produce exactly one value.
    ///
    /// # Errors
    ///
    /// Fails if the expression refers to an entity that is not available yet
    /// or does not produce exactly one value. Decoding already rejects such
    /// expressions.
    pub(crate) fn eval(
        &mut self,
        cx: &ConstEvalContext<'_>,
        expr: &ConstExpr,
    ) -> crate::Result<VmVal> {
        let err = |message: &str| malformed(message, Some(expr.position));
        self.stack.clear();

        for instr in &expr.instructions {
            match instr {
                Instruction::I32Const(value) => self.stack.push(VmVal::from_i32(*value)),
                Instruction::I64Const(value) => self.stack.push(VmVal::from_i64(*value)),
                Instruction::F32Const(bits) => self.stack.push(VmVal::from_u32(*bits)),
                Instruction::F64Const(bits) => self.stack.push(VmVal::from_u64(*bits)),
                Instruction::RefNull(_) => self.stack.push(VmVal::from_ref(None)),
                Instruction::RefFunc(index) => {
                    let func = usize::try_from(*index)
                        .ok()
                        .and_then(|index| cx.functions.get(index))
                        .ok_or_else(|| err("unknown function in constant expression"))?;
                    self.stack.push(VmVal::from_ref(Some(func.arena_index())));
                }
                Instruction::GlobalGet(index) => {
                    let global = usize::try_from(*index)
                        .ok()
                        .and_then(|index| cx.globals.get(index))
                        .ok_or_else(|| err("unknown global in constant expression"))?;
                    self.stack.push(cx.store.get_global(global.0).value);
                }
                Instruction::Numeric(op) => {
                    let (Some(rhs), Some(lhs)) = (self.stack.pop(), self.stack.pop()) else {
                        return Err(err("operand stack underflow in constant expression"));
                    };
                    let val = match op {
                        NumericOp::I32Add => VmVal::from_i32(lhs.as_i32().wrapping_add(rhs.as_i32())),
                        NumericOp::I32Sub => VmVal::from_i32(lhs.as_i32().wrapping_sub(rhs.as_i32())),
                        NumericOp::I32Mul => VmVal::from_i32(lhs.as_i32().wrapping_mul(rhs.as_i32())),
                        NumericOp::I64Add => VmVal::from_i64(lhs.as_i64().wrapping_add(rhs.as_i64())),
                        NumericOp::I64Sub => VmVal::from_i64(lhs.as_i64().wrapping_sub(rhs.as_i64())),
                        NumericOp::I64Mul => VmVal::from_i64(lhs.as_i64().wrapping_mul(rhs.as_i64())),
                        _ => return Err(err("constant expression required")),
                    };
                    self.stack.push(val);
                }
                _ => return Err(err("constant expression required")),
            }
        }

        match (self.stack.pop(), self.stack.is_empty()) {
            (Some(val), true) => Ok(val),
            _ => Err(err("constant expression must produce exactly one value")),
        }
    }
}
