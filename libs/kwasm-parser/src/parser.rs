// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::limits::{
    MAX_WASM_DATA_SEGMENTS, MAX_WASM_ELEMENT_SEGMENTS, MAX_WASM_EXPORTS, MAX_WASM_FUNCTIONS,
    MAX_WASM_GLOBALS, MAX_WASM_IMPORTS, MAX_WASM_MEMORIES, MAX_WASM_TABLES, MAX_WASM_TYPES,
};
use crate::{BinaryReader, ByteCursor, CustomSection, Error, Section};

const WASM_MAGIC_BYTES: &[u8; 4] = b"\0asm";
const WASM_VERSION: u32 = 0x01;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum SectionId {
    Custom = 0,
    Type = 1,
    Import = 2,
    Function = 3,
    Table = 4,
    Memory = 5,
    Global = 6,
    Export = 7,
    Start = 8,
    Element = 9,
    Code = 10,
    Data = 11,
    DataCount = 12,
}

impl SectionId {
    fn from_u8(id: u8) -> Option<Self> {
        Some(match id {
            0 => SectionId::Custom,
            1 => SectionId::Type,
            2 => SectionId::Import,
            3 => SectionId::Function,
            4 => SectionId::Table,
            5 => SectionId::Memory,
            6 => SectionId::Global,
            7 => SectionId::Export,
            8 => SectionId::Start,
            9 => SectionId::Element,
            10 => SectionId::Code,
            11 => SectionId::Data,
            12 => SectionId::DataCount,
            _ => return None,
        })
    }

    /// Position in the canonical section order. The data count section sits
    /// between the element and the code section.
    fn order(self) -> u8 {
        match self {
            SectionId::Custom => 0,
            SectionId::DataCount => 10,
            SectionId::Code => 11,
            SectionId::Data => 12,
            id => id as u8,
        }
    }
}

enum State {
    Header,
    Sections,
    Done,
}

/// Iterates over the sections of a module.
///
/// The header is checked before the first section is produced. Iteration
/// stops after the first error.
pub struct Parser<C> {
    reader: BinaryReader<C>,
    state: State,
    last_order: u8,
}

impl<C: ByteCursor> Parser<C> {
    pub fn new(cursor: C) -> Self {
        Self {
            reader: BinaryReader::new(cursor),
            state: State::Header,
            last_order: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.reader.position()
    }

    fn read_header(&mut self) -> crate::Result<()> {
        let magic = self.reader.read_bytes(WASM_MAGIC_BYTES.len())?;
        if magic != WASM_MAGIC_BYTES {
            return Err(Error::InvalidMagicNumber);
        }

        let version = self.reader.read_bytes(4)?;
        let version = u32::from_le_bytes([version[0], version[1], version[2], version[3]]);
        if version != WASM_VERSION {
            return Err(Error::UnknownVersion(version));
        }

        Ok(())
    }

    fn read_section(&mut self) -> crate::Result<Section> {
        let position = self.reader.position();
        let raw_id = self.reader.read_u8()?;
        let id = SectionId::from_u8(raw_id).ok_or(Error::UnknownSection {
            id: raw_id,
            position,
        })?;

        if id != SectionId::Custom {
            if id.order() <= self.last_order {
                return Err(Error::SectionOutOfOrder {
                    id: raw_id,
                    position,
                });
            }
            self.last_order = id.order();
        }

        let declared = usize::try_from(self.reader.read_var_u32()?).unwrap_or(usize::MAX);
        let start = self.reader.position();

        let r = &mut self.reader;
        let section = match id {
            SectionId::Custom => {
                log::debug!("Parsing custom section... len {declared:#x?}");
                let name = r.read_name()?;
                let consumed = r.position() - start;
                if consumed > declared {
                    return Err(Error::SectionSizeMismatch {
                        id: raw_id,
                        declared,
                        consumed,
                    });
                }
                let data_offset = r.position();
                let data = r.read_bytes(declared - consumed)?.to_vec();
                Section::Custom(CustomSection {
                    name,
                    data,
                    data_offset,
                })
            }
            SectionId::Type => {
                log::debug!("Parsing type section...");
                Section::Type(r.read_vec(MAX_WASM_TYPES, "too many types", |r| {
                    r.read_func_type()
                })?)
            }
            SectionId::Import => {
                log::debug!("Parsing import section...");
                Section::Import(r.read_vec(MAX_WASM_IMPORTS, "too many imports", |r| {
                    r.read_import()
                })?)
            }
            SectionId::Function => {
                log::debug!("Parsing function section...");
                Section::Function(r.read_vec(MAX_WASM_FUNCTIONS, "too many functions", |r| {
                    r.read_var_u32()
                })?)
            }
            SectionId::Table => {
                log::debug!("Parsing table section...");
                Section::Table(r.read_vec(MAX_WASM_TABLES, "too many tables", |r| {
                    r.read_table_type()
                })?)
            }
            SectionId::Memory => {
                log::debug!("Parsing memory section...");
                Section::Memory(r.read_vec(MAX_WASM_MEMORIES, "too many memories", |r| {
                    r.read_memory_type()
                })?)
            }
            SectionId::Global => {
                log::debug!("Parsing global section...");
                Section::Global(r.read_vec(MAX_WASM_GLOBALS, "too many globals", |r| {
                    r.read_global()
                })?)
            }
            SectionId::Export => {
                log::debug!("Parsing export section...");
                Section::Export(r.read_vec(MAX_WASM_EXPORTS, "too many exports", |r| {
                    r.read_export()
                })?)
            }
            SectionId::Start => Section::Start(r.read_var_u32()?),
            SectionId::Element => {
                log::debug!("Parsing element section...");
                Section::Element(r.read_vec(
                    MAX_WASM_ELEMENT_SEGMENTS,
                    "too many element segments",
                    |r| r.read_element(),
                )?)
            }
            SectionId::DataCount => Section::DataCount(r.read_var_u32()?),
            SectionId::Code => {
                log::debug!("Parsing code section...");
                Section::Code(r.read_vec(MAX_WASM_FUNCTIONS, "too many functions", |r| {
                    r.read_function_body()
                })?)
            }
            SectionId::Data => {
                log::debug!("Parsing data section...");
                Section::Data(r.read_vec(
                    MAX_WASM_DATA_SEGMENTS,
                    "too many data segments",
                    |r| r.read_data(),
                )?)
            }
        };

        let consumed = self.reader.position() - start;
        if consumed != declared {
            return Err(Error::SectionSizeMismatch {
                id: raw_id,
                declared,
                consumed,
            });
        }

        Ok(section)
    }
}

impl<C: ByteCursor> Iterator for Parser<C> {
    type Item = crate::Result<Section>;

    fn next(&mut self) -> Option<Self::Item> {
        let res = match self.state {
            State::Done => return None,
            State::Header => self.read_header().and_then(|()| {
                self.state = State::Sections;
                match self.reader.is_at_end() {
                    Ok(true) => Ok(None),
                    Ok(false) => self.read_section().map(Some),
                    Err(err) => Err(err),
                }
            }),
            State::Sections => match self.reader.is_at_end() {
                Ok(true) => Ok(None),
                Ok(false) => self.read_section().map(Some),
                Err(err) => Err(err),
            },
        };

        match res {
            Ok(Some(section)) => Some(Ok(section)),
            Ok(None) => {
                self.state = State::Done;
                None
            }
            Err(err) => {
                self.state = State::Done;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExportDesc, SliceCursor, StreamCursor};

    fn sections(bytes: &[u8]) -> crate::Result<Vec<Section>> {
        Parser::new(SliceCursor::new(bytes)).collect()
    }

    #[test]
    fn empty_module() {
        assert!(sections(b"\0asm\x01\0\0\0").unwrap().is_empty());
    }

    #[test]
    fn bad_header() {
        assert!(matches!(
            sections(b"\0wasm\x01\0\0"),
            Err(Error::InvalidMagicNumber)
        ));
        assert!(matches!(
            sections(b"\0asm\x02\0\0\0"),
            Err(Error::UnknownVersion(2))
        ));
        assert!(matches!(
            sections(b"\0as"),
            Err(Error::UnexpectedEnd { position: 0, .. })
        ));
    }

    #[test]
    fn memory_export_module() {
        let wasm = wat::parse_str(r#"(module (memory 0) (export "a" (memory 0)))"#).unwrap();
        let sections = sections(&wasm).unwrap();

        assert!(matches!(&sections[0], Section::Memory(mems) if mems.len() == 1));
        assert!(matches!(
            &sections[1],
            Section::Export(exports)
                if exports[0].name == "a" && matches!(exports[0].desc, ExportDesc::Memory(0))
        ));
    }

    #[test]
    fn section_size_mismatch() {
        // type section declaring 5 bytes but containing an empty vector
        let wasm = b"\0asm\x01\0\0\0\x01\x05\x00\x00\x00\x00\x00";
        assert!(matches!(
            sections(wasm),
            Err(Error::SectionSizeMismatch {
                id: 1,
                declared: 5,
                consumed: 1
            })
        ));
    }

    #[test]
    fn out_of_order_sections() {
        // memory section followed by a type section
        let wasm = b"\0asm\x01\0\0\0\x05\x01\x00\x01\x01\x00";
        assert!(matches!(
            sections(wasm),
            Err(Error::SectionOutOfOrder { id: 1, position: 11 })
        ));
    }

    #[test]
    fn stream_and_slice_agree() {
        let wasm = wat::parse_str(
            r#"(module
                (func (export "_start") (result i32) (local i32)
                    i32.const 42
                    local.set 0
                    local.get 0))"#,
        )
        .unwrap();

        let from_slice = sections(&wasm).unwrap();
        let from_stream: Vec<_> = Parser::new(StreamCursor::with_chunk_size(wasm.as_slice(), 3))
            .collect::<crate::Result<_>>()
            .unwrap();

        assert_eq!(format!("{from_slice:?}"), format!("{from_stream:?}"));
    }
}
