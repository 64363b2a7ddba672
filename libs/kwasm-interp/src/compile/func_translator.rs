// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Single pass translation of structured function bodies into [`InstrSeq`]s.
//!
//! The translator tracks the type of every operand on the stack and rejects
//! bodies whose instructions, blocks or branches see operands of the wrong
//! type. Every control frame records the operand stack height at its entry.
//! Branches to a `loop` resolve immediately against the loop's start, branches
//! to a `block`, `if` or the function itself are recorded as fixups on the
//! target frame and patched once its `end` is reached.

use cranelift_entity::EntityRef;
use kwasm_parser::{BlockType, FuncType, FunctionBody, GlobalType, Instruction, ValType};

use super::TranslationError;
use super::isa::{BranchTarget, DropKeep, Instr, InstrSeq};
use crate::indices::{
    DataIndex, ElemIndex, FuncIndex, GlobalIndex, MemoryIndex, TableIndex, TypeIndex,
};
use crate::translate::TranslatedModule;

type Result<T> = core::result::Result<T, TranslationError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Function,
    Block,
    Loop,
    If,
    Else,
}

#[derive(Debug, Clone, Copy)]
enum Fixup {
    /// A branch instruction at this pc.
    Instr(usize),
    /// An entry of the branch table side table.
    Table(usize),
}

#[derive(Debug)]
struct ControlStackFrame {
    kind: FrameKind,
    /// Operand stack height below the frame's parameters.
    height: u32,
    params: Box<[ValType]>,
    results: Box<[ValType]>,
    /// First instruction of a loop body.
    start: u32,
    /// Forward branches waiting for the frame's end.
    fixups: Vec<Fixup>,
    /// The `br_if_eqz` of an `if` that jumps to its `else` branch.
    else_fixup: Option<usize>,
}

impl ControlStackFrame {
    /// Types of the values a branch to this frame carries.
    fn label_types(&self) -> &[ValType] {
        if self.kind == FrameKind::Loop {
            &self.params
        } else {
            &self.results
        }
    }

    fn label_arity(&self) -> u32 {
        count(self.label_types().len())
    }
}

/// Translates one function body.
pub struct FuncTranslator<'a> {
    module: &'a TranslatedModule,
    instrs: Vec<Instr>,
    offsets: Vec<usize>,
    br_tables: Vec<BranchTarget>,
    control_stack: Vec<ControlStackFrame>,
    /// Types of the parameters followed by the declared locals.
    locals: Vec<ValType>,
    operands: Vec<ValType>,
    max_height: u32,
    reachable: bool,
    /// Blocks entered while translating unreachable code.
    unreachable_depth: u32,
    /// Offset of the instruction being translated.
    offset: usize,
}

impl<'a> FuncTranslator<'a> {
    pub fn new(module: &'a TranslatedModule) -> Self {
        Self {
            module,
            instrs: Vec::new(),
            offsets: Vec::new(),
            br_tables: Vec::new(),
            control_stack: Vec::new(),
            locals: Vec::new(),
            operands: Vec::new(),
            max_height: 0,
            reachable: true,
            unreachable_depth: 0,
            offset: 0,
        }
    }

    /// Translates `body` of the function with index `func_index`.
    ///
    /// # Errors
    ///
    /// Fails if the body's control structure is not well nested, a branch
    /// refers to a label that does not exist or the number or types of
    /// operands do not match what an instruction or block expects.
    pub fn translate(mut self, func_index: FuncIndex, body: &FunctionBody) -> Result<InstrSeq> {
        let ty = self
            .module
            .func_type(func_index)
            .ok_or(TranslationError::Malformed {
                message: format!("unknown function {}", func_index.as_u32()),
                offset: body.code_offset,
            })?;
        let num_results = count(ty.results().len());

        self.locals.extend_from_slice(ty.params());
        for (n, ty) in &body.locals {
            let n = usize::try_from(*n).unwrap_or(usize::MAX);
            self.locals.extend(core::iter::repeat_n(*ty, n));
        }

        self.offset = body.code_offset;
        self.control_stack.push(ControlStackFrame {
            kind: FrameKind::Function,
            height: 0,
            params: Box::default(),
            results: ty.results().into(),
            start: 0,
            fixups: Vec::new(),
            else_fixup: None,
        });

        for res in body.instructions() {
            let (offset, instr) = res.map_err(|err| TranslationError::Malformed {
                offset: err.position().unwrap_or(self.offset),
                message: err.to_string(),
            })?;
            self.offset = offset;

            if self.control_stack.is_empty() {
                return Err(TranslationError::UnbalancedEnd { offset });
            }

            if self.reachable {
                self.translate_operator(instr)?;
            } else {
                self.translate_unreachable_operator(instr)?;
            }
        }

        if !self.control_stack.is_empty() {
            return Err(TranslationError::UnbalancedEnd {
                offset: self.offset,
            });
        }

        Ok(InstrSeq {
            instrs: self.instrs.into_boxed_slice(),
            offsets: self.offsets.into_boxed_slice(),
            br_tables: self.br_tables.into_boxed_slice(),
            num_results,
            max_stack_height: self.max_height,
        })
    }

    #[expect(clippy::too_many_lines, reason = "big match statement")]
    fn translate_operator(&mut self, instr: Instruction) -> Result<()> {
        use ValType::{F32, F64, FuncRef, I32, I64};

        match instr {
            Instruction::Unreachable => {
                self.emit(Instr::Unreachable);
                self.reachable = false;
            }
            Instruction::Nop => {}
            Instruction::Block(ty) => {
                let (params, results) = self.block_types(ty)?;
                self.push_frame(FrameKind::Block, params, results)?;
            }
            Instruction::Loop(ty) => {
                let (params, results) = self.block_types(ty)?;
                self.push_frame(FrameKind::Loop, params, results)?;
            }
            Instruction::If(ty) => {
                let (params, results) = self.block_types(ty)?;
                self.pop_expect(I32)?;
                let pc = self.emit(Instr::BrIfEqz(unresolved(DropKeep::default())));
                self.push_frame(FrameKind::If, params, results)?;
                self.current_frame_mut().else_fixup = Some(pc);
            }
            Instruction::Else => self.translate_else()?,
            Instruction::End => self.translate_end()?,
            Instruction::Br(depth) => {
                let target = self.branch_target(depth)?;
                self.emit_branch(depth, Instr::Br(target));
                self.reachable = false;
            }
            Instruction::BrIf(depth) => {
                self.pop_expect(I32)?;
                let target = self.branch_target(depth)?;
                self.emit_branch(depth, Instr::BrIfNez(target));
            }
            Instruction::BrTable { targets, default } => {
                self.pop_expect(I32)?;
                let arity = self.frame_at(default)?.label_arity();
                let start = count(self.br_tables.len());

                for depth in targets.iter().copied().chain([default]) {
                    let target = self.branch_target(depth)?;
                    if target.drop_keep.keep != arity {
                        return Err(TranslationError::ArityMismatch {
                            expected: arity,
                            found: target.drop_keep.keep,
                            offset: self.offset,
                        });
                    }

                    let entry = self.br_tables.len();
                    self.br_tables.push(target);
                    if target.pc == BranchTarget::UNRESOLVED {
                        self.frame_at_mut(depth)?.fixups.push(Fixup::Table(entry));
                    }
                }

                self.emit(Instr::BrTable {
                    start,
                    len: count(targets.len() + 1),
                });
                self.reachable = false;
            }
            Instruction::Return => {
                self.expect_top(self.function_results())?;
                self.emit(Instr::Return);
                self.reachable = false;
            }
            Instruction::Call(index) => {
                let index = FuncIndex::from_u32(index);
                let ty = self.func_type(index)?;
                self.pop_types(ty.params())?;
                self.emit(Instr::Call(index));
                self.push_types(ty.results());
            }
            Instruction::CallIndirect { ty, table } => {
                let ty = TypeIndex::from_u32(ty);
                let func_ty = self.type_at(ty)?;
                self.pop_expect(I32)?;
                self.pop_types(func_ty.params())?;
                self.emit(Instr::CallIndirect {
                    ty,
                    table: TableIndex::from_u32(table),
                });
                self.push_types(func_ty.results());
            }

            Instruction::Drop => {
                self.pop_any()?;
                self.emit(Instr::Drop);
            }
            Instruction::Select => {
                self.ensure_available(3)?;
                self.pop_expect(I32)?;
                let rhs = self.pop_any()?;
                let lhs = self.pop_any()?;
                if lhs.is_ref() {
                    return Err(TranslationError::UntypedSelect {
                        found: lhs,
                        offset: self.offset,
                    });
                }
                if lhs != rhs {
                    return Err(self.mismatch(lhs, rhs));
                }
                self.emit(Instr::Select);
                self.push_ty(lhs);
            }
            Instruction::TypedSelect(ty) => self.op(Instr::Select, &[ty, ty, I32], &[ty])?,

            Instruction::LocalGet(index) => {
                let ty = self.local_type(index)?;
                self.op(Instr::LocalGet(index), &[], &[ty])?;
            }
            Instruction::LocalSet(index) => {
                let ty = self.local_type(index)?;
                self.op(Instr::LocalSet(index), &[ty], &[])?;
            }
            Instruction::LocalTee(index) => {
                let ty = self.local_type(index)?;
                self.op(Instr::LocalTee(index), &[ty], &[ty])?;
            }
            Instruction::GlobalGet(index) => {
                let index = GlobalIndex::from_u32(index);
                let ty = self.global_type(index)?.content;
                self.op(Instr::GlobalGet(index), &[], &[ty])?;
            }
            Instruction::GlobalSet(index) => {
                let index = GlobalIndex::from_u32(index);
                let ty = self.global_type(index)?.content;
                self.op(Instr::GlobalSet(index), &[ty], &[])?;
            }

            Instruction::TableGet(table) => {
                let table = TableIndex::from_u32(table);
                let elem = self.table_element(table)?;
                self.op(Instr::TableGet(table), &[I32], &[elem])?;
            }
            Instruction::TableSet(table) => {
                let table = TableIndex::from_u32(table);
                let elem = self.table_element(table)?;
                self.op(Instr::TableSet(table), &[I32, elem], &[])?;
            }
            Instruction::TableSize(table) => {
                self.op(Instr::TableSize(TableIndex::from_u32(table)), &[], &[I32])?;
            }
            Instruction::TableGrow(table) => {
                let table = TableIndex::from_u32(table);
                let elem = self.table_element(table)?;
                self.op(Instr::TableGrow(table), &[elem, I32], &[I32])?;
            }
            Instruction::TableFill(table) => {
                let table = TableIndex::from_u32(table);
                let elem = self.table_element(table)?;
                self.op(Instr::TableFill(table), &[I32, elem, I32], &[])?;
            }
            Instruction::TableCopy { dst, src } => {
                let (dst, src) = (TableIndex::from_u32(dst), TableIndex::from_u32(src));
                let (dst_elem, src_elem) = (self.table_element(dst)?, self.table_element(src)?);
                if dst_elem != src_elem {
                    return Err(self.mismatch(dst_elem, src_elem));
                }
                self.op(Instr::TableCopy { dst, src }, &[I32, I32, I32], &[])?;
            }
            Instruction::TableInit { elem, table } => {
                let (elem, table) = (ElemIndex::from_u32(elem), TableIndex::from_u32(table));
                let segment = self.segment_element(elem)?;
                let expected = self.table_element(table)?;
                if segment != expected {
                    return Err(self.mismatch(expected, segment));
                }
                self.op(Instr::TableInit { elem, table }, &[I32, I32, I32], &[])?;
            }
            Instruction::ElemDrop(elem) => {
                self.op(Instr::ElemDrop(ElemIndex::from_u32(elem)), &[], &[])?;
            }

            Instruction::Load(op, memarg) => {
                let instr = Instr::Load {
                    op,
                    memory: MemoryIndex::from_u32(memarg.memory),
                    offset: memarg.offset,
                };
                self.op(instr, &[I32], &[op.ty()])?;
            }
            Instruction::Store(op, memarg) => {
                let instr = Instr::Store {
                    op,
                    memory: MemoryIndex::from_u32(memarg.memory),
                    offset: memarg.offset,
                };
                self.op(instr, &[I32, op.ty()], &[])?;
            }
            Instruction::MemorySize(memory) => {
                self.op(Instr::MemorySize(MemoryIndex::from_u32(memory)), &[], &[I32])?;
            }
            Instruction::MemoryGrow(memory) => {
                self.op(Instr::MemoryGrow(MemoryIndex::from_u32(memory)), &[I32], &[I32])?;
            }
            Instruction::MemoryFill(memory) => {
                let instr = Instr::MemoryFill(MemoryIndex::from_u32(memory));
                self.op(instr, &[I32, I32, I32], &[])?;
            }
            Instruction::MemoryCopy { dst, src } => {
                let instr = Instr::MemoryCopy {
                    dst: MemoryIndex::from_u32(dst),
                    src: MemoryIndex::from_u32(src),
                };
                self.op(instr, &[I32, I32, I32], &[])?;
            }
            Instruction::MemoryInit { data, memory } => {
                let instr = Instr::MemoryInit {
                    data: DataIndex::from_u32(data),
                    memory: MemoryIndex::from_u32(memory),
                };
                self.op(instr, &[I32, I32, I32], &[])?;
            }
            Instruction::DataDrop(data) => {
                self.op(Instr::DataDrop(DataIndex::from_u32(data)), &[], &[])?;
            }

            Instruction::I32Const(value) => {
                self.op(Instr::Const32(u32::from_ne_bytes(value.to_ne_bytes())), &[], &[I32])?;
            }
            Instruction::I64Const(value) => {
                self.op(Instr::Const64(u64::from_ne_bytes(value.to_ne_bytes())), &[], &[I64])?;
            }
            Instruction::F32Const(bits) => self.op(Instr::Const32(bits), &[], &[F32])?,
            Instruction::F64Const(bits) => self.op(Instr::Const64(bits), &[], &[F64])?,

            Instruction::RefNull(ty) => self.op(Instr::RefNull, &[], &[ValType::from(ty)])?,
            Instruction::RefIsNull => {
                let found = self.pop_any()?;
                if !found.is_ref() {
                    return Err(TranslationError::NotAReference {
                        found,
                        offset: self.offset,
                    });
                }
                self.emit(Instr::RefIsNull);
                self.push_ty(I32);
            }
            Instruction::RefFunc(index) => {
                self.op(Instr::RefFunc(FuncIndex::from_u32(index)), &[], &[FuncRef])?;
            }

            Instruction::Numeric(op) => self.op(Instr::Numeric(op), op.params(), &[op.result()])?,
        }

        Ok(())
    }

    /// Skips over dead code, only tracking nesting to find the end of the
    /// unreachable region.
    fn translate_unreachable_operator(&mut self, instr: Instruction) -> Result<()> {
        match instr {
            Instruction::Block(_) | Instruction::Loop(_) | Instruction::If(_) => {
                self.unreachable_depth += 1;
            }
            Instruction::Else if self.unreachable_depth == 0 => self.translate_else()?,
            Instruction::End if self.unreachable_depth == 0 => self.translate_end()?,
            Instruction::End => self.unreachable_depth -= 1,
            _ => {}
        }
        Ok(())
    }

    fn translate_else(&mut self) -> Result<()> {
        let offset = self.offset;
        let Some(frame) = self.control_stack.last() else {
            return Err(TranslationError::ElseWithoutIf { offset });
        };
        if frame.kind != FrameKind::If {
            return Err(TranslationError::ElseWithoutIf { offset });
        }

        if self.reachable {
            self.check_frame_results(frame)?;
            let keep = count(frame.results.len());
            let pc = self.emit(Instr::Br(unresolved(DropKeep { drop: 0, keep })));
            self.current_frame_mut().fixups.push(Fixup::Instr(pc));
        }

        let else_pc = count(self.instrs.len());
        let frame = self.current_frame_mut();
        frame.kind = FrameKind::Else;
        let fixup = frame.else_fixup.take();
        let height = frame.height as usize;
        let params = frame.params.clone();
        if let Some(fixup) = fixup {
            self.patch(Fixup::Instr(fixup), else_pc);
        }

        self.operands.truncate(height);
        self.push_types(&params);
        self.reachable = true;
        Ok(())
    }

    fn translate_end(&mut self) -> Result<()> {
        let offset = self.offset;
        let Some(frame) = self.control_stack.last() else {
            return Err(TranslationError::UnbalancedEnd { offset });
        };

        if self.reachable {
            self.check_frame_results(frame)?;
        }
        if frame.kind == FrameKind::If && frame.params != frame.results {
            // the implicit empty else branch passes the parameters through
            return Err(mismatched_types(&frame.results, &frame.params, offset));
        }

        let Some(frame) = self.control_stack.pop() else {
            return Err(TranslationError::UnbalancedEnd { offset });
        };
        let end_pc = count(self.instrs.len());
        for fixup in &frame.fixups {
            self.patch(*fixup, end_pc);
        }
        if let Some(fixup) = frame.else_fixup {
            self.patch(Fixup::Instr(fixup), end_pc);
        }

        if frame.kind == FrameKind::Function {
            self.emit(Instr::Return);
        }

        self.operands.truncate(frame.height as usize);
        self.push_types(&frame.results);
        self.reachable = true;
        Ok(())
    }

    /// Opens a frame whose parameters are already on the operand stack.
    fn push_frame(
        &mut self,
        kind: FrameKind,
        params: Box<[ValType]>,
        results: Box<[ValType]>,
    ) -> Result<()> {
        self.expect_top(&params)?;
        self.control_stack.push(ControlStackFrame {
            kind,
            height: self.height() - count(params.len()),
            params,
            results,
            start: count(self.instrs.len()),
            fixups: Vec::new(),
            else_fixup: None,
        });
        Ok(())
    }

    fn current_frame(&self) -> &ControlStackFrame {
        // the function frame is only popped by the final `end`, after which
        // no instruction is translated anymore
        match self.control_stack.last() {
            Some(frame) => frame,
            None => unreachable!("control stack is empty"),
        }
    }

    fn current_frame_mut(&mut self) -> &mut ControlStackFrame {
        match self.control_stack.last_mut() {
            Some(frame) => frame,
            None => unreachable!("control stack is empty"),
        }
    }

    fn frame_at(&self, depth: u32) -> Result<&ControlStackFrame> {
        let available = self.control_stack.len();
        usize::try_from(depth)
            .ok()
            .and_then(|depth| available.checked_sub(depth + 1))
            .and_then(|index| self.control_stack.get(index))
            .ok_or(TranslationError::BranchDepthOutOfRange {
                depth,
                available,
                offset: self.offset,
            })
    }

    fn frame_at_mut(&mut self, depth: u32) -> Result<&mut ControlStackFrame> {
        let available = self.control_stack.len();
        let offset = self.offset;
        usize::try_from(depth)
            .ok()
            .and_then(|depth| available.checked_sub(depth + 1))
            .and_then(|index| self.control_stack.get_mut(index))
            .ok_or(TranslationError::BranchDepthOutOfRange {
                depth,
                available,
                offset,
            })
    }

    /// Resolves the destination and stack adjustment of a branch to the
    /// label at `depth`. Forward targets are left unresolved.
    fn branch_target(&self, depth: u32) -> Result<BranchTarget> {
        let target = self.frame_at(depth)?;
        self.expect_top(target.label_types())?;

        let arity = target.label_arity();
        let drop_keep = DropKeep {
            drop: self.height() - arity - target.height,
            keep: arity,
        };
        let pc = if target.kind == FrameKind::Loop {
            target.start
        } else {
            BranchTarget::UNRESOLVED
        };
        Ok(BranchTarget { pc, drop_keep })
    }

    fn emit_branch(&mut self, depth: u32, instr: Instr) {
        let pc = self.emit(instr);
        let unresolved = match instr {
            Instr::Br(target) | Instr::BrIfNez(target) => target.pc == BranchTarget::UNRESOLVED,
            _ => false,
        };
        if unresolved && let Ok(frame) = self.frame_at_mut(depth) {
            frame.fixups.push(Fixup::Instr(pc));
        }
    }

    fn patch(&mut self, fixup: Fixup, pc: u32) {
        let target = match fixup {
            Fixup::Instr(index) => match self.instrs.get_mut(index) {
                Some(Instr::Br(target) | Instr::BrIfNez(target) | Instr::BrIfEqz(target)) => {
                    target
                }
                _ => return,
            },
            Fixup::Table(index) => match self.br_tables.get_mut(index) {
                Some(target) => target,
                None => return,
            },
        };
        target.pc = pc;
    }

    fn emit(&mut self, instr: Instr) -> usize {
        let pc = self.instrs.len();
        self.instrs.push(instr);
        self.offsets.push(self.offset);
        pc
    }

    /// Emits an instruction that pops operands of types `pops` and pushes
    /// operands of types `pushes`.
    fn op(&mut self, instr: Instr, pops: &[ValType], pushes: &[ValType]) -> Result<()> {
        self.pop_types(pops)?;
        self.emit(instr);
        self.push_types(pushes);
        Ok(())
    }

    fn height(&self) -> u32 {
        count(self.operands.len())
    }

    fn ensure_available(&self, n: u32) -> Result<()> {
        if self.height() - self.current_frame().height >= n {
            Ok(())
        } else {
            Err(TranslationError::StackUnderflow {
                offset: self.offset,
            })
        }
    }

    /// Checks that the topmost operands have the types `expected` without
    /// popping them.
    fn expect_top(&self, expected: &[ValType]) -> Result<()> {
        self.ensure_available(count(expected.len()))?;
        let top = &self.operands[self.operands.len() - expected.len()..];
        for (expected, found) in expected.iter().zip(top) {
            if expected != found {
                return Err(self.mismatch(*expected, *found));
            }
        }
        Ok(())
    }

    fn pop_any(&mut self) -> Result<ValType> {
        self.ensure_available(1)?;
        self.operands.pop().ok_or(TranslationError::StackUnderflow {
            offset: self.offset,
        })
    }

    fn pop_expect(&mut self, expected: ValType) -> Result<()> {
        let found = self.pop_any()?;
        if found == expected {
            Ok(())
        } else {
            Err(self.mismatch(expected, found))
        }
    }

    /// Pops operands of types `expected`, the last one first.
    fn pop_types(&mut self, expected: &[ValType]) -> Result<()> {
        self.expect_top(expected)?;
        self.operands.truncate(self.operands.len() - expected.len());
        Ok(())
    }

    fn push_ty(&mut self, ty: ValType) {
        self.operands.push(ty);
        self.max_height = self.max_height.max(self.height());
    }

    fn push_types(&mut self, types: &[ValType]) {
        self.operands.extend_from_slice(types);
        self.max_height = self.max_height.max(self.height());
    }

    fn mismatch(&self, expected: ValType, found: ValType) -> TranslationError {
        TranslationError::TypeMismatch {
            expected,
            found,
            offset: self.offset,
        }
    }

    fn check_frame_results(&self, frame: &ControlStackFrame) -> Result<()> {
        let found = self.operands.get(frame.height as usize..).unwrap_or_default();
        if found == &*frame.results {
            Ok(())
        } else {
            Err(mismatched_types(&frame.results, found, self.offset))
        }
    }

    fn function_results(&self) -> &[ValType] {
        match self.control_stack.first() {
            Some(frame) => &frame.results,
            None => &[],
        }
    }

    fn block_types(&self, ty: BlockType) -> Result<(Box<[ValType]>, Box<[ValType]>)> {
        match ty {
            BlockType::Empty => Ok((Box::default(), Box::default())),
            BlockType::Value(ty) => Ok((Box::default(), vec![ty].into_boxed_slice())),
            BlockType::Func(index) => {
                let ty = self.type_at(TypeIndex::from_u32(index))?;
                Ok((ty.params().into(), ty.results().into()))
            }
        }
    }

    fn type_at(&self, index: TypeIndex) -> Result<&'a FuncType> {
        let module = self.module;
        module
            .types
            .get(index)
            .ok_or_else(|| self.unknown("type", index.index()))
    }

    fn func_type(&self, index: FuncIndex) -> Result<&'a FuncType> {
        let module = self.module;
        let ty = module
            .functions
            .get(index)
            .ok_or_else(|| self.unknown("function", index.index()))?;
        self.type_at(*ty)
    }

    fn local_type(&self, index: u32) -> Result<ValType> {
        usize::try_from(index)
            .ok()
            .and_then(|index| self.locals.get(index))
            .copied()
            .ok_or_else(|| self.unknown("local", index as usize))
    }

    fn global_type(&self, index: GlobalIndex) -> Result<GlobalType> {
        self.module
            .globals
            .get(index)
            .copied()
            .ok_or_else(|| self.unknown("global", index.index()))
    }

    fn table_element(&self, index: TableIndex) -> Result<ValType> {
        self.module
            .tables
            .get(index)
            .map(|table| ValType::from(table.element))
            .ok_or_else(|| self.unknown("table", index.index()))
    }

    fn segment_element(&self, index: ElemIndex) -> Result<ValType> {
        self.module
            .elements
            .get(index)
            .map(|segment| ValType::from(segment.ty))
            .ok_or_else(|| self.unknown("elem segment", index.index()))
    }

    fn unknown(&self, what: &str, index: usize) -> TranslationError {
        TranslationError::Malformed {
            message: format!("unknown {what} {index}"),
            offset: self.offset,
        }
    }
}

/// Reports a block or function end that leaves `found` instead of
/// `expected`.
fn mismatched_types(expected: &[ValType], found: &[ValType], offset: usize) -> TranslationError {
    if expected.len() != found.len() {
        return TranslationError::ArityMismatch {
            expected: count(expected.len()),
            found: count(found.len()),
            offset,
        };
    }
    expected
        .iter()
        .zip(found)
        .find(|(expected, found)| expected != found)
        .map_or(
            TranslationError::ArityMismatch {
                expected: count(expected.len()),
                found: count(found.len()),
                offset,
            },
            |(expected, found)| TranslationError::TypeMismatch {
                expected: *expected,
                found: *found,
                offset,
            },
        )
}

fn unresolved(drop_keep: DropKeep) -> BranchTarget {
    BranchTarget {
        pc: BranchTarget::UNRESOLVED,
        drop_keep,
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "function bodies are limited to MAX_WASM_FUNCTION_SIZE bytes"
)]
fn count(n: usize) -> u32 {
    n as u32
}
