// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use leb128::{Leb128Int, Leb128Read};

use crate::error::ensure;
use crate::instructions::{self, Instruction, NumericOp};
use crate::limits::{
    MAX_PREALLOCATION, MAX_WASM_BR_TABLE_SIZE, MAX_WASM_ELEMENT_ITEMS, MAX_WASM_FUNCTION_LOCALS,
    MAX_WASM_FUNCTION_PARAMS, MAX_WASM_FUNCTION_RETURNS, MAX_WASM_FUNCTION_SIZE,
    MAX_WASM_STRING_SIZE, MAX_WASM32_MEMORY_PAGES,
};
use crate::types::{
    BlockType, FuncType, GlobalType, Limits, MemArg, MemoryType, Mutability, RefType, TableType,
    ValType,
};
use crate::{
    ByteCursor, ConstExpr, Data, DataMode, Element, ElementItems, ElementMode, Error, Export,
    ExportDesc, FunctionBody, Global, Import, ImportDesc,
};

const VAL_TYPES: [u8; 7] = [0x7F, 0x7E, 0x7D, 0x7C, 0x7B, 0x70, 0x6F];
const REF_TYPES: [u8; 2] = [0x70, 0x6F];
const FUNC_TYPE_TAG: u8 = 0x60;
const EXTERNAL_KINDS: [u8; 4] = [0x00, 0x01, 0x02, 0x03];

/// Decodes the primitives of the binary format from a [`ByteCursor`].
pub struct BinaryReader<C> {
    cursor: C,
}

impl<C: ByteCursor> BinaryReader<C> {
    pub fn new(cursor: C) -> Self {
        Self { cursor }
    }

    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    pub fn cursor_mut(&mut self) -> &mut C {
        &mut self.cursor
    }

    pub fn into_inner(self) -> C {
        self.cursor
    }

    /// # Errors
    ///
    /// Fails if the underlying source fails.
    pub fn is_at_end(&mut self) -> crate::Result<bool> {
        self.cursor.is_at_end()
    }

    /// # Errors
    ///
    /// Returns [`Error::UnexpectedEnd`] at the end of input.
    pub fn read_u8(&mut self) -> crate::Result<u8> {
        self.cursor.consume_any()
    }

    /// # Errors
    ///
    /// Fails if the underlying source fails.
    pub fn peek_u8(&mut self) -> crate::Result<Option<u8>> {
        self.cursor.peek()
    }

    /// # Errors
    ///
    /// Returns [`Error::UnexpectedEnd`] if fewer than `len` bytes remain.
    pub fn read_bytes(&mut self, len: usize) -> crate::Result<&[u8]> {
        self.cursor.consume_n(len)
    }

    fn malformed(&self, reason: &'static str) -> Error {
        Error::Malformed {
            reason,
            position: self.position(),
        }
    }

    fn read_leb<T: Leb128Int>(&mut self) -> crate::Result<T> {
        let position = self.position();
        let mut failure = None;
        let result = leb128::from_fn(|| next_byte(&mut self.cursor, &mut failure)).read::<T>();
        leb_result(result, position, failure)
    }

    /// # Errors
    ///
    /// Returns [`Error::Leb128`] for truncated or overlong encodings.
    pub fn read_var_u32(&mut self) -> crate::Result<u32> {
        self.read_leb()
    }

    /// # Errors
    ///
    /// Returns [`Error::Leb128`] for truncated or overlong encodings.
    pub fn read_var_u64(&mut self) -> crate::Result<u64> {
        self.read_leb()
    }

    /// # Errors
    ///
    /// Returns [`Error::Leb128`] for truncated or overlong encodings.
    pub fn read_var_i32(&mut self) -> crate::Result<i32> {
        self.read_leb()
    }

    /// # Errors
    ///
    /// Returns [`Error::Leb128`] for truncated or overlong encodings.
    pub fn read_var_i64(&mut self) -> crate::Result<i64> {
        self.read_leb()
    }

    /// The 33-bit signed integer used to encode block type indices.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Leb128`] for truncated or overlong encodings.
    pub fn read_var_s33(&mut self) -> crate::Result<i64> {
        let position = self.position();
        let mut failure = None;
        let result = leb128::from_fn(|| next_byte(&mut self.cursor, &mut failure)).read_signed(33);
        leb_result(result, position, failure)
    }

    /// Reads a `u32` length or count and widens it to `usize`.
    fn read_size(&mut self, limit: usize, what: &'static str) -> crate::Result<usize> {
        let position = self.position();
        let size = usize::try_from(self.read_var_u32()?).unwrap_or(usize::MAX);
        ensure!(
            size <= limit,
            Error::Malformed {
                reason: what,
                position
            }
        );
        Ok(size)
    }

    /// # Errors
    ///
    /// Returns [`Error::UnexpectedEnd`] if fewer than 4 bytes remain.
    pub fn read_f32_bits(&mut self) -> crate::Result<u32> {
        let bytes = self.cursor.consume_n(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// # Errors
    ///
    /// Returns [`Error::UnexpectedEnd`] if fewer than 8 bytes remain.
    pub fn read_f64_bits(&mut self) -> crate::Result<u64> {
        let bytes = self.cursor.consume_n(8)?;
        let mut buf = [0; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }

    /// # Errors
    ///
    /// Fails on truncated input, overlong names or invalid UTF-8.
    pub fn read_name(&mut self) -> crate::Result<String> {
        let len = self.read_size(MAX_WASM_STRING_SIZE, "name too long")?;
        let position = self.position();
        let bytes = self.cursor.consume_n(len)?;
        core::str::from_utf8(bytes)
            .map(ToOwned::to_owned)
            .map_err(|_| Error::Utf8 { position })
    }

    /// Reads a length-prefixed vector, calling `f` for each element.
    ///
    /// # Errors
    ///
    /// Fails if the count exceeds `limit` or `f` fails.
    pub fn read_vec<T>(
        &mut self,
        limit: usize,
        what: &'static str,
        mut f: impl FnMut(&mut Self) -> crate::Result<T>,
    ) -> crate::Result<Vec<T>> {
        let count = self.read_size(limit, what)?;
        let mut items = Vec::with_capacity(count.min(MAX_PREALLOCATION));
        for _ in 0..count {
            items.push(f(self)?);
        }
        Ok(items)
    }

    /// # Errors
    ///
    /// Returns [`Error::Unexpected`] for unknown value type encodings.
    pub fn read_val_type(&mut self) -> crate::Result<ValType> {
        Ok(match self.cursor.consume(&VAL_TYPES)? {
            0x7F => ValType::I32,
            0x7E => ValType::I64,
            0x7D => ValType::F32,
            0x7C => ValType::F64,
            0x7B => ValType::V128,
            0x70 => ValType::FuncRef,
            _ => ValType::ExternRef,
        })
    }

    /// # Errors
    ///
    /// Returns [`Error::Unexpected`] for unknown reference type encodings.
    pub fn read_ref_type(&mut self) -> crate::Result<RefType> {
        Ok(match self.cursor.consume(&REF_TYPES)? {
            0x70 => RefType::FuncRef,
            _ => RefType::ExternRef,
        })
    }

    /// # Errors
    ///
    /// Fails on unknown flags or if the minimum exceeds the maximum.
    pub fn read_limits(&mut self) -> crate::Result<Limits> {
        let has_max = self.cursor.consume(&[0x00, 0x01])? == 0x01;
        let min = self.read_var_u32()?;
        let max = if has_max {
            Some(self.read_var_u32()?)
        } else {
            None
        };

        if let Some(max) = max {
            ensure!(
                min <= max,
                self.malformed("size minimum must not be greater than maximum")
            );
        }

        Ok(Limits { min, max })
    }

    /// # Errors
    ///
    /// See [`BinaryReader::read_ref_type`] and [`BinaryReader::read_limits`].
    pub fn read_table_type(&mut self) -> crate::Result<TableType> {
        Ok(TableType {
            element: self.read_ref_type()?,
            limits: self.read_limits()?,
        })
    }

    /// # Errors
    ///
    /// Fails on malformed limits or a size beyond 4 GiB.
    pub fn read_memory_type(&mut self) -> crate::Result<MemoryType> {
        let limits = self.read_limits()?;
        ensure!(
            limits.min <= MAX_WASM32_MEMORY_PAGES
                && limits.max.is_none_or(|max| max <= MAX_WASM32_MEMORY_PAGES),
            self.malformed("memory size must be at most 65536 pages (4GiB)")
        );
        Ok(MemoryType { limits })
    }

    /// # Errors
    ///
    /// Fails on unknown value types or mutability flags.
    pub fn read_global_type(&mut self) -> crate::Result<GlobalType> {
        let content = self.read_val_type()?;
        let mutability = match self.cursor.consume(&[0x00, 0x01])? {
            0x00 => Mutability::Const,
            _ => Mutability::Var,
        };
        Ok(GlobalType {
            content,
            mutability,
        })
    }

    /// # Errors
    ///
    /// Fails if the entry does not start with the function type tag.
    pub fn read_func_type(&mut self) -> crate::Result<FuncType> {
        self.cursor.consume(&[FUNC_TYPE_TAG])?;
        let params = self.read_vec(
            MAX_WASM_FUNCTION_PARAMS,
            "too many function parameters",
            Self::read_val_type,
        )?;
        let results = self.read_vec(
            MAX_WASM_FUNCTION_RETURNS,
            "too many function results",
            Self::read_val_type,
        )?;
        Ok(FuncType::new(params, results))
    }

    /// # Errors
    ///
    /// Fails on malformed encodings or negative type indices.
    pub fn read_block_type(&mut self) -> crate::Result<BlockType> {
        match self.cursor.peek()? {
            Some(0x40) => {
                self.read_u8()?;
                Ok(BlockType::Empty)
            }
            Some(byte) if VAL_TYPES.contains(&byte) => Ok(BlockType::Value(self.read_val_type()?)),
            _ => {
                let position = self.position();
                let idx = self.read_var_s33()?;
                u32::try_from(idx)
                    .map(BlockType::Func)
                    .map_err(|_| Error::Malformed {
                        reason: "malformed block type",
                        position,
                    })
            }
        }
    }

    /// # Errors
    ///
    /// Fails on malformed flags or alignments of 2^64 and above.
    pub fn read_memarg(&mut self) -> crate::Result<MemArg> {
        let mut flags = self.read_var_u32()?;
        let memory = if flags & (1 << 6) != 0 {
            flags ^= 1 << 6;
            self.read_var_u32()?
        } else {
            0
        };
        ensure!(flags < 64, self.malformed("alignment too large"));
        let offset = u64::from(self.read_var_u32()?);

        Ok(MemArg {
            align: flags,
            offset,
            memory,
        })
    }

    /// Reads instructions up to and including the terminating `end`.
    ///
    /// # Errors
    ///
    /// Fails on any malformed instruction.
    pub fn read_const_expr(&mut self) -> crate::Result<ConstExpr> {
        let position = self.position();
        let mut instructions = Vec::new();
        loop {
            match self.read_instruction()? {
                Instruction::End => break,
                instr => instructions.push(instr),
            }
        }

        Ok(ConstExpr {
            instructions: instructions.into_boxed_slice(),
            position,
        })
    }

    /// # Errors
    ///
    /// Fails on malformed names or import descriptions.
    pub fn read_import(&mut self) -> crate::Result<Import> {
        let module = self.read_name()?;
        let name = self.read_name()?;
        let desc = match self.cursor.consume(&EXTERNAL_KINDS)? {
            0x00 => ImportDesc::Func(self.read_var_u32()?),
            0x01 => ImportDesc::Table(self.read_table_type()?),
            0x02 => ImportDesc::Memory(self.read_memory_type()?),
            _ => ImportDesc::Global(self.read_global_type()?),
        };

        Ok(Import { module, name, desc })
    }

    /// # Errors
    ///
    /// Fails on malformed names or export descriptions.
    pub fn read_export(&mut self) -> crate::Result<Export> {
        let name = self.read_name()?;
        let kind = self.cursor.consume(&EXTERNAL_KINDS)?;
        let index = self.read_var_u32()?;
        let desc = match kind {
            0x00 => ExportDesc::Func(index),
            0x01 => ExportDesc::Table(index),
            0x02 => ExportDesc::Memory(index),
            _ => ExportDesc::Global(index),
        };

        Ok(Export { name, desc })
    }

    /// # Errors
    ///
    /// Fails on a malformed type or initializer.
    pub fn read_global(&mut self) -> crate::Result<Global> {
        Ok(Global {
            ty: self.read_global_type()?,
            init: self.read_const_expr()?,
        })
    }

    /// # Errors
    ///
    /// Fails on unknown segment flags or malformed items.
    pub fn read_element(&mut self) -> crate::Result<Element> {
        let flags = self.read_var_u32()?;
        ensure!(flags <= 0b111, self.malformed("malformed elements segment kind"));

        // bit 0 differentiates between active and declarative/passive
        let mode = if flags & 0b001 != 0 {
            // bit 1 differentiates between declarative and passive
            if flags & 0b010 != 0 {
                ElementMode::Declarative
            } else {
                ElementMode::Passive
            }
        } else {
            // bit 1 indicates the presence of an explicit table index
            let table = if flags & 0b010 != 0 {
                self.read_var_u32()?
            } else {
                0
            };
            let offset = self.read_const_expr()?;

            ElementMode::Active { table, offset }
        };

        // bit 2 indicates element type + element expressions are used
        let uses_exprs = flags & 0b100 != 0;

        // variant 0 and 4 don't have an explicit type
        let ty = if flags & 0b011 != 0 {
            if uses_exprs {
                self.read_ref_type()?
            } else {
                // only the `funcref` element kind exists
                self.cursor.consume(&[0x00])?;
                RefType::FuncRef
            }
        } else {
            RefType::FuncRef
        };

        let items = if uses_exprs {
            ElementItems::Expressions(self.read_vec(
                MAX_WASM_ELEMENT_ITEMS,
                "too many element items",
                Self::read_const_expr,
            )?)
        } else {
            ElementItems::Functions(self.read_vec(
                MAX_WASM_ELEMENT_ITEMS,
                "too many element items",
                Self::read_var_u32,
            )?)
        };

        Ok(Element { mode, ty, items })
    }

    /// # Errors
    ///
    /// Fails on unknown segment flags or truncated contents.
    pub fn read_data(&mut self) -> crate::Result<Data> {
        let flags = self.read_var_u32()?;

        let mode = match flags {
            0 => DataMode::Active {
                memory: 0,
                offset: self.read_const_expr()?,
            },
            1 => DataMode::Passive,
            2 => DataMode::Active {
                memory: self.read_var_u32()?,
                offset: self.read_const_expr()?,
            },
            _ => return Err(self.malformed("malformed data segment kind")),
        };

        let len = self.read_size(usize::MAX, "data segment too large")?;
        let init = self.cursor.consume_n(len)?.to_vec();

        Ok(Data { mode, init })
    }

    /// Reads one entry of the code section: the local declarations are
    /// decoded, the instructions are kept as raw bytes.
    ///
    /// # Errors
    ///
    /// Fails on malformed local declarations or a body size mismatch.
    pub fn read_function_body(&mut self) -> crate::Result<FunctionBody> {
        let size = self.read_size(MAX_WASM_FUNCTION_SIZE, "function body too large")?;
        let start = self.position();

        let groups = self.read_size(MAX_WASM_FUNCTION_LOCALS, "too many locals")?;
        let mut locals = Vec::with_capacity(groups.min(MAX_PREALLOCATION));
        let mut total: usize = 0;
        for _ in 0..groups {
            let count = self.read_size(MAX_WASM_FUNCTION_LOCALS, "too many locals")?;
            let ty = self.read_val_type()?;
            total += count;
            ensure!(total <= MAX_WASM_FUNCTION_LOCALS, self.malformed("too many locals"));
            locals.push((u32::try_from(count).unwrap_or(u32::MAX), ty));
        }

        let consumed = self.position() - start;
        ensure!(consumed <= size, self.malformed("function body size mismatch"));
        let code_offset = self.position();
        let code = self.cursor.consume_n(size - consumed)?.into();

        Ok(FunctionBody {
            locals,
            code,
            code_offset,
        })
    }

    fn read_br_table(&mut self) -> crate::Result<Instruction> {
        let targets = self.read_vec(
            MAX_WASM_BR_TABLE_SIZE,
            "br_table too large",
            Self::read_var_u32,
        )?;
        let default = self.read_var_u32()?;
        Ok(Instruction::BrTable {
            targets: targets.into_boxed_slice(),
            default,
        })
    }

    /// # Errors
    ///
    /// Fails on unknown or unsupported opcodes and malformed immediates.
    pub fn read_instruction(&mut self) -> crate::Result<Instruction> {
        use Instruction::*;

        let position = self.position();
        let opcode = self.read_u8()?;

        if let Some(op) = instructions::load_op(opcode) {
            return Ok(Load(op, self.read_memarg()?));
        }
        if let Some(op) = instructions::store_op(opcode) {
            return Ok(Store(op, self.read_memarg()?));
        }
        if let Some(op) = NumericOp::from_opcode(opcode) {
            return Ok(Numeric(op));
        }

        Ok(match opcode {
            0x00 => Unreachable,
            0x01 => Nop,
            0x02 => Block(self.read_block_type()?),
            0x03 => Loop(self.read_block_type()?),
            0x04 => If(self.read_block_type()?),
            0x05 => Else,
            0x0b => End,
            0x0c => Br(self.read_var_u32()?),
            0x0d => BrIf(self.read_var_u32()?),
            0x0e => self.read_br_table()?,
            0x0f => Return,
            0x10 => Call(self.read_var_u32()?),
            0x11 => CallIndirect {
                ty: self.read_var_u32()?,
                table: self.read_var_u32()?,
            },
            0x1a => Drop,
            0x1b => Select,
            0x1c => {
                let arity_position = self.position();
                let arity = self.read_var_u32()?;
                ensure!(
                    arity == 1,
                    Error::Malformed {
                        reason: "invalid result arity",
                        position: arity_position,
                    }
                );
                TypedSelect(self.read_val_type()?)
            }
            0x20 => LocalGet(self.read_var_u32()?),
            0x21 => LocalSet(self.read_var_u32()?),
            0x22 => LocalTee(self.read_var_u32()?),
            0x23 => GlobalGet(self.read_var_u32()?),
            0x24 => GlobalSet(self.read_var_u32()?),
            0x25 => TableGet(self.read_var_u32()?),
            0x26 => TableSet(self.read_var_u32()?),
            0x3f => MemorySize(self.read_var_u32()?),
            0x40 => MemoryGrow(self.read_var_u32()?),
            0x41 => I32Const(self.read_var_i32()?),
            0x42 => I64Const(self.read_var_i64()?),
            0x43 => F32Const(self.read_f32_bits()?),
            0x44 => F64Const(self.read_f64_bits()?),
            0xd0 => RefNull(self.read_ref_type()?),
            0xd1 => RefIsNull,
            0xd2 => RefFunc(self.read_var_u32()?),
            0xfc => self.read_0xfc_instruction(position)?,
            // exception handling, tail calls and SIMD
            0x06..=0x0a | 0x12 | 0x13 | 0x18 | 0x19 | 0xfd => {
                return Err(Error::UnsupportedInstruction {
                    opcode: u32::from(opcode),
                    position,
                });
            }
            _ => {
                return Err(Error::UnknownInstruction {
                    opcode: u32::from(opcode),
                    position,
                });
            }
        })
    }

    fn read_0xfc_instruction(&mut self, position: usize) -> crate::Result<Instruction> {
        use Instruction::*;

        let sub = self.read_var_u32()?;
        if let Some(op) = NumericOp::from_prefixed_opcode(sub) {
            return Ok(Numeric(op));
        }

        Ok(match sub {
            8 => MemoryInit {
                data: self.read_var_u32()?,
                memory: self.read_var_u32()?,
            },
            9 => DataDrop(self.read_var_u32()?),
            10 => MemoryCopy {
                dst: self.read_var_u32()?,
                src: self.read_var_u32()?,
            },
            11 => MemoryFill(self.read_var_u32()?),
            12 => TableInit {
                elem: self.read_var_u32()?,
                table: self.read_var_u32()?,
            },
            13 => ElemDrop(self.read_var_u32()?),
            14 => TableCopy {
                dst: self.read_var_u32()?,
                src: self.read_var_u32()?,
            },
            15 => TableGrow(self.read_var_u32()?),
            16 => TableSize(self.read_var_u32()?),
            17 => TableFill(self.read_var_u32()?),
            _ => {
                return Err(Error::UnknownInstruction {
                    opcode: 0xfc00_u32.saturating_add(sub),
                    position,
                });
            }
        })
    }
}

fn next_byte<C: ByteCursor>(cursor: &mut C, failure: &mut Option<Error>) -> Option<u8> {
    match cursor.consume_any() {
        Ok(byte) => Some(byte),
        Err(Error::UnexpectedEnd { .. }) => None,
        Err(err) => {
            *failure = Some(err);
            None
        }
    }
}

fn leb_result<T>(
    result: leb128::Result<T>,
    position: usize,
    failure: Option<Error>,
) -> crate::Result<T> {
    match failure {
        Some(err) => Err(err),
        None => result.map_err(|error| Error::Leb128 { position, error }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SliceCursor;
    use crate::instructions::LoadOp;

    fn reader(bytes: &[u8]) -> BinaryReader<SliceCursor<'_>> {
        BinaryReader::new(SliceCursor::new(bytes))
    }

    #[test]
    fn leb_errors_carry_start_position() {
        let mut r = reader(&[0x01, 0x80, 0x80]);
        r.read_u8().unwrap();
        let err = r.read_var_u32().unwrap_err();
        assert!(matches!(
            err,
            Error::Leb128 {
                position: 1,
                error: leb128::Error::InsufficientBytes
            }
        ));
    }

    #[test]
    fn unknown_value_type_reports_accepted_set() {
        let mut r = reader(&[0x7F, 0x40]);
        assert_eq!(r.read_val_type().unwrap(), ValType::I32);
        let err = r.read_val_type().unwrap_err();
        assert!(matches!(err, Error::Unexpected { byte: 0x40, position: 1, ref expected } if **expected == VAL_TYPES));
    }

    #[test]
    fn block_types() {
        let mut r = reader(&[0x40, 0x7E, 0x05, 0x7F]);
        assert_eq!(r.read_block_type().unwrap(), BlockType::Empty);
        assert_eq!(r.read_block_type().unwrap(), BlockType::Value(ValType::I64));
        assert_eq!(r.read_block_type().unwrap(), BlockType::Func(5));
        assert_eq!(r.read_block_type().unwrap(), BlockType::Value(ValType::I32));

        // 0x41 is a negative s33 that is not a value type
        let mut r = reader(&[0x41]);
        assert!(matches!(
            r.read_block_type(),
            Err(Error::Malformed { position: 0, .. })
        ));
    }

    #[test]
    fn limits_min_above_max() {
        let mut r = reader(&[0x01, 0x02, 0x01]);
        assert!(matches!(r.read_limits(), Err(Error::Malformed { .. })));
    }

    #[test]
    fn memory_pages_are_bounded() {
        // 65537 pages
        let mut r = reader(&[0x00, 0x81, 0x80, 0x04]);
        assert!(matches!(r.read_memory_type(), Err(Error::Malformed { .. })));
    }

    #[test]
    fn float_constants_are_little_endian_bits() {
        let mut r = reader(&[0x43, 0x00, 0x00, 0xC0, 0x7F]);
        assert_eq!(r.read_instruction().unwrap(), Instruction::F32Const(0x7FC0_0000));
    }

    #[test]
    fn memarg_with_memory_index() {
        let mut r = reader(&[0x28, 0x42, 0x01, 0x10]);
        assert_eq!(
            r.read_instruction().unwrap(),
            Instruction::Load(
                LoadOp::I32Load,
                MemArg {
                    align: 2,
                    offset: 0x10,
                    memory: 1
                }
            )
        );
    }

    #[test]
    fn simd_is_unsupported() {
        let mut r = reader(&[0xFD, 0x0C]);
        assert!(matches!(
            r.read_instruction(),
            Err(Error::UnsupportedInstruction {
                opcode: 0xFD,
                position: 0
            })
        ));
    }

    #[test]
    fn function_body_locals() {
        // size 6: two local groups (2 x i32, 1 x f64), then `end`
        let mut r = reader(&[0x06, 0x02, 0x02, 0x7F, 0x01, 0x7C, 0x0B]);
        let body = r.read_function_body().unwrap();
        assert_eq!(body.locals, vec![(2, ValType::I32), (1, ValType::F64)]);
        assert_eq!(&*body.code, &[0x0B]);
        assert_eq!(body.code_offset, 6);
    }
}
