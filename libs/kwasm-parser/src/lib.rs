// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Decoder for the WebAssembly binary format.
//!
//! The [`Parser`] reads a module section by section from a [`ByteCursor`]
//! and yields owned [`Section`] payloads. Function bodies are not decoded
//! into instructions here, they are handed out as raw bytes together with
//! their local declarations so that consumers can translate them lazily.

mod binary_reader;
mod cursor;
mod error;
mod instructions;
mod limits;
mod names;
mod parser;
mod types;

pub use binary_reader::BinaryReader;
pub use cursor::{ByteCursor, DEFAULT_CHUNK_SIZE, SliceCursor, StreamCursor};
pub use error::Error;
pub use instructions::{Instruction, LoadOp, NumericOp, StoreOp};
pub use limits::*;
pub use names::{Names, parse_name_section};
pub use parser::{Parser, SectionId};
pub use types::{
    BlockType, FuncType, GlobalType, Limits, MemArg, MemoryType, Mutability, RefType, TableType,
    ValType,
};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub enum Section {
    Custom(CustomSection),
    Type(Vec<FuncType>),
    Import(Vec<Import>),
    Function(Vec<u32>),
    Table(Vec<TableType>),
    Memory(Vec<MemoryType>),
    Global(Vec<Global>),
    Export(Vec<Export>),
    Start(u32),
    Element(Vec<Element>),
    DataCount(u32),
    Code(Vec<FunctionBody>),
    Data(Vec<Data>),
}

#[derive(Debug)]
pub struct CustomSection {
    pub name: String,
    pub data: Vec<u8>,
    /// Offset of `data` in the module.
    pub data_offset: usize,
}

#[derive(Debug, Clone)]
pub struct Import {
    pub module: String,
    pub name: String,
    pub desc: ImportDesc,
}

#[derive(Debug, Clone)]
pub enum ImportDesc {
    /// Index into the type section.
    Func(u32),
    Table(TableType),
    Memory(MemoryType),
    Global(GlobalType),
}

#[derive(Debug, Clone)]
pub struct Export {
    pub name: String,
    pub desc: ExportDesc,
}

#[derive(Debug, Copy, Clone)]
pub enum ExportDesc {
    Func(u32),
    Table(u32),
    Memory(u32),
    Global(u32),
}

/// An initializer expression, without its terminating `end`.
#[derive(Debug, Clone)]
pub struct ConstExpr {
    pub instructions: Box<[Instruction]>,
    pub position: usize,
}

#[derive(Debug, Clone)]
pub struct Global {
    pub ty: GlobalType,
    pub init: ConstExpr,
}

#[derive(Debug, Clone)]
pub struct Element {
    pub mode: ElementMode,
    pub ty: RefType,
    pub items: ElementItems,
}

#[derive(Debug, Clone)]
pub enum ElementMode {
    Passive,
    Active { table: u32, offset: ConstExpr },
    Declarative,
}

#[derive(Debug, Clone)]
pub enum ElementItems {
    Functions(Vec<u32>),
    Expressions(Vec<ConstExpr>),
}

impl ElementItems {
    pub fn len(&self) -> usize {
        match self {
            ElementItems::Functions(funcs) => funcs.len(),
            ElementItems::Expressions(exprs) => exprs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct Data {
    pub mode: DataMode,
    pub init: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum DataMode {
    Passive,
    Active { memory: u32, offset: ConstExpr },
}

/// A function body as stored in the code section.
#[derive(Debug, Clone)]
pub struct FunctionBody {
    /// Run-length encoded local declarations `(count, type)`.
    pub locals: Vec<(u32, ValType)>,
    /// The instruction bytes, including the final `end`.
    pub code: Box<[u8]>,
    /// Offset of `code` in the module.
    pub code_offset: usize,
}

impl FunctionBody {
    /// Iterates over the instructions of this body.
    pub fn instructions(&self) -> InstructionsIter<'_> {
        InstructionsIter {
            reader: BinaryReader::new(SliceCursor::with_base(&self.code, self.code_offset)),
            done: false,
        }
    }
}

/// Yields `(offset, instruction)` pairs until the end of a function body or
/// the first error.
pub struct InstructionsIter<'a> {
    reader: BinaryReader<SliceCursor<'a>>,
    done: bool,
}

impl Iterator for InstructionsIter<'_> {
    type Item = Result<(usize, Instruction)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.reader.is_at_end() {
            Ok(true) => {
                self.done = true;
                None
            }
            Ok(false) => {
                let offset = self.reader.position();
                let res = self.reader.read_instruction().map(|instr| (offset, instr));
                self.done = res.is_err();
                Some(res)
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
