// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::io;
use std::path::Path;
use std::sync::Arc;

use cranelift_entity::PrimaryMap;
use kwasm_parser::{
    ByteCursor, FuncType, GlobalType, MemoryType, Parser, SliceCursor, StreamCursor, TableType,
};

use crate::Engine;
use crate::compile::{GuestFunction, InstrSeq, TranslationError};
use crate::indices::{DefinedFuncIndex, EntityIndex, FuncIndex, SharedTypeIndex, TypeIndex};
use crate::translate::{ModuleTranslator, TranslatedModule};

/// A decoded WebAssembly module, ready to be instantiated.
///
/// Function bodies are not translated up front. Each one is translated the
/// first time it is called, or all at once through [`Module::materialize_all`].
#[derive(Debug, Clone)]
pub struct Module(Arc<ModuleInner>);

#[derive(Debug)]
struct ModuleInner {
    engine: Engine,
    translated: TranslatedModule,
    functions: PrimaryMap<DefinedFuncIndex, GuestFunction>,
    type_ids: PrimaryMap<TypeIndex, SharedTypeIndex>,
}

/// The type of an importable or exportable entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternType {
    Func(FuncType),
    Table(TableType),
    Memory(MemoryType),
    Global(GlobalType),
}

impl ExternType {
    /// Human readable name of the entity kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ExternType::Func(_) => "function",
            ExternType::Table(_) => "table",
            ExternType::Memory(_) => "memory",
            ExternType::Global(_) => "global",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportType<'module> {
    pub module: &'module str,
    pub name: &'module str,
    pub ty: ExternType,
}

#[derive(Debug, Clone)]
pub struct ExportType<'module> {
    pub name: &'module str,
    pub ty: ExternType,
}

impl Module {
    /// Decodes a module from its binary representation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`](crate::Error::Malformed) if the bytes are
    /// not a well-formed module.
    pub fn new(engine: &Engine, bytes: &[u8]) -> crate::Result<Self> {
        Self::from_cursor(engine, SliceCursor::new(bytes))
    }

    /// Decodes a module from a file, reading it in chunks of
    /// [`EngineConfig::stream_chunk_size`](crate::EngineConfig::stream_chunk_size) bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the file cannot be read and
    /// [`Error::Malformed`](crate::Error::Malformed) if it is not a
    /// well-formed module.
    pub fn from_file(engine: &Engine, path: impl AsRef<Path>) -> crate::Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(engine, file)
    }

    /// Decodes a module from any byte source.
    ///
    /// # Errors
    ///
    /// Same as [`Module::from_file`].
    pub fn from_reader(engine: &Engine, reader: impl io::Read) -> crate::Result<Self> {
        let chunk_size = engine.config().stream_chunk_size;
        Self::from_cursor(engine, StreamCursor::with_chunk_size(reader, chunk_size))
    }

    fn from_cursor<C: ByteCursor>(engine: &Engine, cursor: C) -> crate::Result<Self> {
        let translation = ModuleTranslator::new().translate(Parser::new(cursor))?;
        let translated = translation.module;

        let mut functions = PrimaryMap::with_capacity(translation.function_bodies.len());
        for (def_index, body) in translation.function_bodies {
            let index = translated.func_index(def_index);
            functions.push(GuestFunction::new(&translated, index, body)?);
        }

        let type_ids = translated
            .types
            .values()
            .map(|ty| engine.type_registry().register(ty))
            .collect();

        Ok(Self(Arc::new(ModuleInner {
            engine: engine.clone(),
            translated,
            functions,
            type_ids,
        })))
    }

    /// Returns the module's name from the `name` custom section, if present.
    pub fn name(&self) -> Option<&str> {
        self.0.translated.name.as_deref()
    }

    pub fn engine(&self) -> &Engine {
        &self.0.engine
    }

    /// Returns the module's imports in declaration order.
    pub fn imports(&self) -> impl ExactSizeIterator<Item = ImportType<'_>> + '_ {
        self.0.translated.imports.iter().map(|import| ImportType {
            module: &import.module,
            name: &import.name,
            ty: self.extern_type(import.index),
        })
    }

    /// Returns the module's exports in declaration order.
    pub fn exports(&self) -> impl ExactSizeIterator<Item = ExportType<'_>> + '_ {
        self.0
            .translated
            .exports
            .iter()
            .map(|(name, index)| ExportType {
                name,
                ty: self.extern_type(*index),
            })
    }

    /// Translates every function body that has not been translated yet.
    ///
    /// # Errors
    ///
    /// Returns the first [`TranslationError`] encountered.
    pub fn materialize_all(&self) -> crate::Result<()> {
        for (_, func) in &self.0.functions {
            func.materialize(&self.0.engine, &self.0.translated)?;
        }
        Ok(())
    }

    fn extern_type(&self, index: EntityIndex) -> ExternType {
        let module = &self.0.translated;
        match index {
            EntityIndex::Function(index) => {
                ExternType::Func(module.types[module.functions[index]].clone())
            }
            EntityIndex::Table(index) => ExternType::Table(module.tables[index]),
            EntityIndex::Memory(index) => ExternType::Memory(module.memories[index]),
            EntityIndex::Global(index) => ExternType::Global(module.globals[index]),
        }
    }

    pub(crate) fn translated(&self) -> &TranslatedModule {
        &self.0.translated
    }

    pub(crate) fn function(&self, index: DefinedFuncIndex) -> &GuestFunction {
        &self.0.functions[index]
    }

    pub(crate) fn type_id(&self, index: TypeIndex) -> SharedTypeIndex {
        self.0.type_ids[index]
    }

    pub(crate) fn func_name(&self, index: FuncIndex) -> Option<&str> {
        self.0.translated.func_names.get(&index).map(String::as_str)
    }

    /// Returns the translated body of `index`, translating it if necessary.
    pub(crate) fn materialize(
        &self,
        index: DefinedFuncIndex,
    ) -> Result<Arc<InstrSeq>, TranslationError> {
        self.function(index)
            .materialize(&self.0.engine, &self.0.translated)
    }
}

#[cfg(test)]
mod tests {
    use kwasm_parser::ValType;

    use super::*;

    #[test]
    fn imports_and_exports() {
        let engine = Engine::default();
        let wasm = wat::parse_str(
            r#"(module $m
                (import "env" "f" (func (param i32) (result i64)))
                (import "env" "mem" (memory 1 2))
                (global (export "g") (mut f32) (f32.const 0))
                (func (export "run")))"#,
        )
        .unwrap();
        let module = Module::new(&engine, &wasm).unwrap();

        assert_eq!(module.name(), Some("m"));

        let imports: Vec<_> = module.imports().collect();
        assert_eq!(imports.len(), 2);
        assert_eq!((imports[0].module, imports[0].name), ("env", "f"));
        assert_eq!(
            imports[0].ty,
            ExternType::Func(FuncType::new([ValType::I32], [ValType::I64]))
        );
        assert!(matches!(imports[1].ty, ExternType::Memory(_)));

        let exports: Vec<_> = module.exports().map(|e| e.name).collect();
        assert_eq!(exports, ["g", "run"]);
    }

    #[test]
    fn from_reader_matches_new() {
        let engine = Engine::default();
        let wasm = wat::parse_str(r#"(module (func (export "a") (result i32) i32.const 1))"#)
            .unwrap();
        let module = Module::from_reader(&engine, wasm.as_slice()).unwrap();
        assert_eq!(module.exports().len(), 1);
    }

    #[test]
    fn materialize_all_reports_first_error() {
        let engine = Engine::default();
        let wasm = wat::parse_str(
            r#"(module
                (func)
                (func (result i32) (block (result i32) nop)))"#,
        )
        .unwrap();
        let module = Module::new(&engine, &wasm).unwrap();
        let err = module.materialize_all().unwrap_err();
        assert!(matches!(err, crate::Error::Translation(_)), "{err}");
        assert_eq!(engine.translation_count(), 2);
    }

    #[test]
    fn malformed_bytes() {
        let engine = Engine::default();
        let err = Module::new(&engine, b"\0asm\x02\0\0\0").unwrap_err();
        assert!(matches!(err, crate::Error::Malformed { .. }), "{err}");
    }
}
