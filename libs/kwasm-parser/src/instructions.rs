// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::types::{BlockType, MemArg, ValType};

/// A single decoded instruction of a function body or constant expression.
///
/// Operators without immediates that only consume and produce numbers are
/// grouped into [`NumericOp`], memory accesses into [`LoadOp`] and
/// [`StoreOp`].
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Unreachable,
    Nop,
    Block(BlockType),
    Loop(BlockType),
    If(BlockType),
    Else,
    End,
    Br(u32),
    BrIf(u32),
    BrTable { targets: Box<[u32]>, default: u32 },
    Return,
    Call(u32),
    CallIndirect { ty: u32, table: u32 },

    Drop,
    Select,
    TypedSelect(ValType),

    LocalGet(u32),
    LocalSet(u32),
    LocalTee(u32),
    GlobalGet(u32),
    GlobalSet(u32),

    TableGet(u32),
    TableSet(u32),
    TableInit { elem: u32, table: u32 },
    ElemDrop(u32),
    TableCopy { dst: u32, src: u32 },
    TableGrow(u32),
    TableSize(u32),
    TableFill(u32),

    Load(LoadOp, MemArg),
    Store(StoreOp, MemArg),
    MemorySize(u32),
    MemoryGrow(u32),
    MemoryInit { data: u32, memory: u32 },
    DataDrop(u32),
    MemoryCopy { dst: u32, src: u32 },
    MemoryFill(u32),

    I32Const(i32),
    I64Const(i64),
    /// Raw IEEE 754 bits, kept as is so NaN payloads survive.
    F32Const(u32),
    F64Const(u64),

    RefNull(crate::RefType),
    RefIsNull,
    RefFunc(u32),

    Numeric(NumericOp),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LoadOp {
    I32Load,
    I64Load,
    F32Load,
    F64Load,
    I32Load8S,
    I32Load8U,
    I32Load16S,
    I32Load16U,
    I64Load8S,
    I64Load8U,
    I64Load16S,
    I64Load16U,
    I64Load32S,
    I64Load32U,
}

impl LoadOp {
    /// Number of bytes read from memory.
    pub fn width(self) -> usize {
        match self {
            LoadOp::I32Load8S | LoadOp::I32Load8U | LoadOp::I64Load8S | LoadOp::I64Load8U => 1,
            LoadOp::I32Load16S | LoadOp::I32Load16U | LoadOp::I64Load16S | LoadOp::I64Load16U => {
                2
            }
            LoadOp::I32Load | LoadOp::F32Load | LoadOp::I64Load32S | LoadOp::I64Load32U => 4,
            LoadOp::I64Load | LoadOp::F64Load => 8,
        }
    }

    /// Type of the loaded value.
    pub fn ty(self) -> ValType {
        match self {
            LoadOp::I32Load
            | LoadOp::I32Load8S
            | LoadOp::I32Load8U
            | LoadOp::I32Load16S
            | LoadOp::I32Load16U => ValType::I32,
            LoadOp::I64Load
            | LoadOp::I64Load8S
            | LoadOp::I64Load8U
            | LoadOp::I64Load16S
            | LoadOp::I64Load16U
            | LoadOp::I64Load32S
            | LoadOp::I64Load32U => ValType::I64,
            LoadOp::F32Load => ValType::F32,
            LoadOp::F64Load => ValType::F64,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum StoreOp {
    I32Store,
    I64Store,
    F32Store,
    F64Store,
    I32Store8,
    I32Store16,
    I64Store8,
    I64Store16,
    I64Store32,
}

impl StoreOp {
    /// Number of bytes written to memory.
    pub fn width(self) -> usize {
        match self {
            StoreOp::I32Store8 | StoreOp::I64Store8 => 1,
            StoreOp::I32Store16 | StoreOp::I64Store16 => 2,
            StoreOp::I32Store | StoreOp::F32Store | StoreOp::I64Store32 => 4,
            StoreOp::I64Store | StoreOp::F64Store => 8,
        }
    }

    /// Type of the stored value.
    pub fn ty(self) -> ValType {
        match self {
            StoreOp::I32Store | StoreOp::I32Store8 | StoreOp::I32Store16 => ValType::I32,
            StoreOp::I64Store | StoreOp::I64Store8 | StoreOp::I64Store16 | StoreOp::I64Store32 => {
                ValType::I64
            }
            StoreOp::F32Store => ValType::F32,
            StoreOp::F64Store => ValType::F64,
        }
    }
}

macro_rules! numeric_ops {
    (
        plain { $($opcode:literal => $name:ident: [$($param:ident)*] -> $result:ident,)* }
        prefixed { $($sub:literal => $pname:ident: [$($pparam:ident)*] -> $presult:ident,)* }
    ) => {
        /// Operators that pop one or two numbers and push exactly one.
        #[derive(Debug, Copy, Clone, Eq, PartialEq)]
        pub enum NumericOp {
            $($name,)*
            $($pname,)*
        }

        impl NumericOp {
            pub(crate) fn from_opcode(opcode: u8) -> Option<Self> {
                match opcode {
                    $($opcode => Some(NumericOp::$name),)*
                    _ => None,
                }
            }

            /// Looks up an operator with the `0xFC` prefix.
            pub(crate) fn from_prefixed_opcode(sub: u32) -> Option<Self> {
                match sub {
                    $($sub => Some(NumericOp::$pname),)*
                    _ => None,
                }
            }

            /// Types of the operands, bottom of the stack first.
            pub fn params(self) -> &'static [ValType] {
                match self {
                    $(NumericOp::$name => &[$(ValType::$param),*],)*
                    $(NumericOp::$pname => &[$(ValType::$pparam),*],)*
                }
            }

            pub fn result(self) -> ValType {
                match self {
                    $(NumericOp::$name => ValType::$result,)*
                    $(NumericOp::$pname => ValType::$presult,)*
                }
            }

            /// Number of operands popped off the stack.
            pub fn operands(self) -> usize {
                self.params().len()
            }
        }
    };
}

numeric_ops! {
    plain {
        0x45 => I32Eqz: [I32] -> I32,
        0x46 => I32Eq: [I32 I32] -> I32,
        0x47 => I32Ne: [I32 I32] -> I32,
        0x48 => I32LtS: [I32 I32] -> I32,
        0x49 => I32LtU: [I32 I32] -> I32,
        0x4a => I32GtS: [I32 I32] -> I32,
        0x4b => I32GtU: [I32 I32] -> I32,
        0x4c => I32LeS: [I32 I32] -> I32,
        0x4d => I32LeU: [I32 I32] -> I32,
        0x4e => I32GeS: [I32 I32] -> I32,
        0x4f => I32GeU: [I32 I32] -> I32,
        0x50 => I64Eqz: [I64] -> I32,
        0x51 => I64Eq: [I64 I64] -> I32,
        0x52 => I64Ne: [I64 I64] -> I32,
        0x53 => I64LtS: [I64 I64] -> I32,
        0x54 => I64LtU: [I64 I64] -> I32,
        0x55 => I64GtS: [I64 I64] -> I32,
        0x56 => I64GtU: [I64 I64] -> I32,
        0x57 => I64LeS: [I64 I64] -> I32,
        0x58 => I64LeU: [I64 I64] -> I32,
        0x59 => I64GeS: [I64 I64] -> I32,
        0x5a => I64GeU: [I64 I64] -> I32,
        0x5b => F32Eq: [F32 F32] -> I32,
        0x5c => F32Ne: [F32 F32] -> I32,
        0x5d => F32Lt: [F32 F32] -> I32,
        0x5e => F32Gt: [F32 F32] -> I32,
        0x5f => F32Le: [F32 F32] -> I32,
        0x60 => F32Ge: [F32 F32] -> I32,
        0x61 => F64Eq: [F64 F64] -> I32,
        0x62 => F64Ne: [F64 F64] -> I32,
        0x63 => F64Lt: [F64 F64] -> I32,
        0x64 => F64Gt: [F64 F64] -> I32,
        0x65 => F64Le: [F64 F64] -> I32,
        0x66 => F64Ge: [F64 F64] -> I32,
        0x67 => I32Clz: [I32] -> I32,
        0x68 => I32Ctz: [I32] -> I32,
        0x69 => I32Popcnt: [I32] -> I32,
        0x6a => I32Add: [I32 I32] -> I32,
        0x6b => I32Sub: [I32 I32] -> I32,
        0x6c => I32Mul: [I32 I32] -> I32,
        0x6d => I32DivS: [I32 I32] -> I32,
        0x6e => I32DivU: [I32 I32] -> I32,
        0x6f => I32RemS: [I32 I32] -> I32,
        0x70 => I32RemU: [I32 I32] -> I32,
        0x71 => I32And: [I32 I32] -> I32,
        0x72 => I32Or: [I32 I32] -> I32,
        0x73 => I32Xor: [I32 I32] -> I32,
        0x74 => I32Shl: [I32 I32] -> I32,
        0x75 => I32ShrS: [I32 I32] -> I32,
        0x76 => I32ShrU: [I32 I32] -> I32,
        0x77 => I32Rotl: [I32 I32] -> I32,
        0x78 => I32Rotr: [I32 I32] -> I32,
        0x79 => I64Clz: [I64] -> I64,
        0x7a => I64Ctz: [I64] -> I64,
        0x7b => I64Popcnt: [I64] -> I64,
        0x7c => I64Add: [I64 I64] -> I64,
        0x7d => I64Sub: [I64 I64] -> I64,
        0x7e => I64Mul: [I64 I64] -> I64,
        0x7f => I64DivS: [I64 I64] -> I64,
        0x80 => I64DivU: [I64 I64] -> I64,
        0x81 => I64RemS: [I64 I64] -> I64,
        0x82 => I64RemU: [I64 I64] -> I64,
        0x83 => I64And: [I64 I64] -> I64,
        0x84 => I64Or: [I64 I64] -> I64,
        0x85 => I64Xor: [I64 I64] -> I64,
        0x86 => I64Shl: [I64 I64] -> I64,
        0x87 => I64ShrS: [I64 I64] -> I64,
        0x88 => I64ShrU: [I64 I64] -> I64,
        0x89 => I64Rotl: [I64 I64] -> I64,
        0x8a => I64Rotr: [I64 I64] -> I64,
        0x8b => F32Abs: [F32] -> F32,
        0x8c => F32Neg: [F32] -> F32,
        0x8d => F32Ceil: [F32] -> F32,
        0x8e => F32Floor: [F32] -> F32,
        0x8f => F32Trunc: [F32] -> F32,
        0x90 => F32Nearest: [F32] -> F32,
        0x91 => F32Sqrt: [F32] -> F32,
        0x92 => F32Add: [F32 F32] -> F32,
        0x93 => F32Sub: [F32 F32] -> F32,
        0x94 => F32Mul: [F32 F32] -> F32,
        0x95 => F32Div: [F32 F32] -> F32,
        0x96 => F32Min: [F32 F32] -> F32,
        0x97 => F32Max: [F32 F32] -> F32,
        0x98 => F32Copysign: [F32 F32] -> F32,
        0x99 => F64Abs: [F64] -> F64,
        0x9a => F64Neg: [F64] -> F64,
        0x9b => F64Ceil: [F64] -> F64,
        0x9c => F64Floor: [F64] -> F64,
        0x9d => F64Trunc: [F64] -> F64,
        0x9e => F64Nearest: [F64] -> F64,
        0x9f => F64Sqrt: [F64] -> F64,
        0xa0 => F64Add: [F64 F64] -> F64,
        0xa1 => F64Sub: [F64 F64] -> F64,
        0xa2 => F64Mul: [F64 F64] -> F64,
        0xa3 => F64Div: [F64 F64] -> F64,
        0xa4 => F64Min: [F64 F64] -> F64,
        0xa5 => F64Max: [F64 F64] -> F64,
        0xa6 => F64Copysign: [F64 F64] -> F64,
        0xa7 => I32WrapI64: [I64] -> I32,
        0xa8 => I32TruncF32S: [F32] -> I32,
        0xa9 => I32TruncF32U: [F32] -> I32,
        0xaa => I32TruncF64S: [F64] -> I32,
        0xab => I32TruncF64U: [F64] -> I32,
        0xac => I64ExtendI32S: [I32] -> I64,
        0xad => I64ExtendI32U: [I32] -> I64,
        0xae => I64TruncF32S: [F32] -> I64,
        0xaf => I64TruncF32U: [F32] -> I64,
        0xb0 => I64TruncF64S: [F64] -> I64,
        0xb1 => I64TruncF64U: [F64] -> I64,
        0xb2 => F32ConvertI32S: [I32] -> F32,
        0xb3 => F32ConvertI32U: [I32] -> F32,
        0xb4 => F32ConvertI64S: [I64] -> F32,
        0xb5 => F32ConvertI64U: [I64] -> F32,
        0xb6 => F32DemoteF64: [F64] -> F32,
        0xb7 => F64ConvertI32S: [I32] -> F64,
        0xb8 => F64ConvertI32U: [I32] -> F64,
        0xb9 => F64ConvertI64S: [I64] -> F64,
        0xba => F64ConvertI64U: [I64] -> F64,
        0xbb => F64PromoteF32: [F32] -> F64,
        0xbc => I32ReinterpretF32: [F32] -> I32,
        0xbd => I64ReinterpretF64: [F64] -> I64,
        0xbe => F32ReinterpretI32: [I32] -> F32,
        0xbf => F64ReinterpretI64: [I64] -> F64,
        0xc0 => I32Extend8S: [I32] -> I32,
        0xc1 => I32Extend16S: [I32] -> I32,
        0xc2 => I64Extend8S: [I64] -> I64,
        0xc3 => I64Extend16S: [I64] -> I64,
        0xc4 => I64Extend32S: [I64] -> I64,
    }
    prefixed {
        0 => I32TruncSatF32S: [F32] -> I32,
        1 => I32TruncSatF32U: [F32] -> I32,
        2 => I32TruncSatF64S: [F64] -> I32,
        3 => I32TruncSatF64U: [F64] -> I32,
        4 => I64TruncSatF32S: [F32] -> I64,
        5 => I64TruncSatF32U: [F32] -> I64,
        6 => I64TruncSatF64S: [F64] -> I64,
        7 => I64TruncSatF64U: [F64] -> I64,
    }
}

pub(crate) fn load_op(opcode: u8) -> Option<LoadOp> {
    Some(match opcode {
        0x28 => LoadOp::I32Load,
        0x29 => LoadOp::I64Load,
        0x2a => LoadOp::F32Load,
        0x2b => LoadOp::F64Load,
        0x2c => LoadOp::I32Load8S,
        0x2d => LoadOp::I32Load8U,
        0x2e => LoadOp::I32Load16S,
        0x2f => LoadOp::I32Load16U,
        0x30 => LoadOp::I64Load8S,
        0x31 => LoadOp::I64Load8U,
        0x32 => LoadOp::I64Load16S,
        0x33 => LoadOp::I64Load16U,
        0x34 => LoadOp::I64Load32S,
        0x35 => LoadOp::I64Load32U,
        _ => return None,
    })
}

pub(crate) fn store_op(opcode: u8) -> Option<StoreOp> {
    Some(match opcode {
        0x36 => StoreOp::I32Store,
        0x37 => StoreOp::I64Store,
        0x38 => StoreOp::F32Store,
        0x39 => StoreOp::F64Store,
        0x3a => StoreOp::I32Store8,
        0x3b => StoreOp::I32Store16,
        0x3c => StoreOp::I64Store8,
        0x3d => StoreOp::I64Store16,
        0x3e => StoreOp::I64Store32,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_signatures() {
        assert_eq!(NumericOp::I32Add.params(), [ValType::I32, ValType::I32]);
        assert_eq!(NumericOp::I32Add.result(), ValType::I32);
        assert_eq!(NumericOp::F64Lt.result(), ValType::I32);
        assert_eq!(NumericOp::I64Eqz.params(), [ValType::I64]);
        assert_eq!(NumericOp::I32WrapI64.params(), [ValType::I64]);
        assert_eq!(NumericOp::F64PromoteF32.params(), [ValType::F32]);
        assert_eq!(NumericOp::I64Extend32S.params(), [ValType::I64]);
        assert_eq!(NumericOp::I64TruncSatF32U.result(), ValType::I64);
        assert_eq!(NumericOp::I32Extend8S.operands(), 1);
    }

    #[test]
    fn memory_access_types() {
        assert_eq!(LoadOp::I64Load32U.ty(), ValType::I64);
        assert_eq!(LoadOp::F32Load.ty(), ValType::F32);
        assert_eq!(StoreOp::I32Store16.ty(), ValType::I32);
        assert_eq!(StoreOp::F64Store.ty(), ValType::F64);
    }
}
