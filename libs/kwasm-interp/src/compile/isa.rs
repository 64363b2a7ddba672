// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The flat instruction set executed by the interpreter.

use kwasm_parser::{LoadOp, NumericOp, StoreOp};

use crate::indices::{
    DataIndex, ElemIndex, FuncIndex, GlobalIndex, MemoryIndex, TableIndex, TypeIndex,
};

/// How the operand stack is adjusted when a branch is taken: the topmost
/// `keep` values are preserved, the `drop` values below them are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DropKeep {
    pub drop: u32,
    pub keep: u32,
}

/// A resolved branch destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchTarget {
    /// Index of the instruction to continue at.
    pub pc: u32,
    pub drop_keep: DropKeep,
}

impl BranchTarget {
    pub(crate) const UNRESOLVED: u32 = u32::MAX;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Instr {
    Unreachable,
    Br(BranchTarget),
    /// Pops an `i32` and branches if it is non-zero.
    BrIfNez(BranchTarget),
    /// Pops an `i32` and branches if it is zero.
    BrIfEqz(BranchTarget),
    /// Pops an index and branches to `br_tables[start + min(index, len - 1)]`.
    BrTable {
        start: u32,
        len: u32,
    },
    /// Returns the topmost values of the operand stack, as many as the
    /// function has results.
    Return,
    Call(FuncIndex),
    CallIndirect {
        ty: TypeIndex,
        table: TableIndex,
    },

    Drop,
    Select,

    /// Locals are addressed relative to the frame base, parameters first.
    LocalGet(u32),
    LocalSet(u32),
    LocalTee(u32),
    GlobalGet(GlobalIndex),
    GlobalSet(GlobalIndex),

    TableGet(TableIndex),
    TableSet(TableIndex),
    TableSize(TableIndex),
    TableGrow(TableIndex),
    TableFill(TableIndex),
    TableCopy {
        dst: TableIndex,
        src: TableIndex,
    },
    TableInit {
        elem: ElemIndex,
        table: TableIndex,
    },
    ElemDrop(ElemIndex),

    Load {
        op: LoadOp,
        memory: MemoryIndex,
        offset: u64,
    },
    Store {
        op: StoreOp,
        memory: MemoryIndex,
        offset: u64,
    },
    MemorySize(MemoryIndex),
    MemoryGrow(MemoryIndex),
    MemoryFill(MemoryIndex),
    MemoryCopy {
        dst: MemoryIndex,
        src: MemoryIndex,
    },
    MemoryInit {
        data: DataIndex,
        memory: MemoryIndex,
    },
    DataDrop(DataIndex),

    /// Pushes an `i32` or `f32` bit pattern.
    Const32(u32),
    /// Pushes an `i64` or `f64` bit pattern.
    Const64(u64),
    RefNull,
    RefIsNull,
    RefFunc(FuncIndex),

    Numeric(NumericOp),
}

/// The materialized form of a function body.
#[derive(Debug)]
pub struct InstrSeq {
    pub(crate) instrs: Box<[Instr]>,
    /// Module offset of the instruction each entry of `instrs` was
    /// translated from.
    pub(crate) offsets: Box<[usize]>,
    pub(crate) br_tables: Box<[BranchTarget]>,
    pub(crate) num_results: u32,
    /// Upper bound of the operand stack height, excluding locals.
    pub(crate) max_stack_height: u32,
}

impl InstrSeq {
    pub fn instrs(&self) -> &[Instr] {
        &self.instrs
    }

    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    /// Module offset of the instruction at `pc`.
    pub fn offset_of(&self, pc: usize) -> Option<usize> {
        self.offsets.get(pc).copied()
    }
}
