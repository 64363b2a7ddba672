// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

mod validate;

use std::sync::Arc;

use cranelift_entity::{EntityRef, PrimaryMap};
use hashbrown::HashMap;
use indexmap::IndexMap;
use kwasm_parser::{
    ByteCursor, ConstExpr, ExportDesc, FuncType, FunctionBody, GlobalType, ImportDesc,
    MemoryType, Parser, RefType, Section, TableType, parse_name_section,
};

use crate::Error;
use crate::indices::{
    DataIndex, DefinedFuncIndex, DefinedGlobalIndex, ElemIndex, EntityIndex, FuncIndex,
    GlobalIndex, MemoryIndex, TableIndex, TypeIndex,
};

#[derive(Debug, Default)]
pub struct ModuleTranslation {
    /// The translated module.
    pub module: TranslatedModule,
    /// The raw bodies of all functions defined by the module.
    pub function_bodies: PrimaryMap<DefinedFuncIndex, FunctionBody>,
}

/// A decoded WebAssembly module with all of its cross references checked.
#[derive(Debug, Default)]
pub struct TranslatedModule {
    /// The name of this wasm module, if found.
    pub name: Option<String>,
    /// The types declared in this module.
    pub types: PrimaryMap<TypeIndex, FuncType>,

    /// The type of every function, imported ones first.
    pub functions: PrimaryMap<FuncIndex, TypeIndex>,
    /// The tables declared in this module, imported ones first.
    pub tables: PrimaryMap<TableIndex, TableType>,
    /// The memories declared in this module, imported ones first.
    pub memories: PrimaryMap<MemoryIndex, MemoryType>,
    /// The globals declared in this module, imported ones first.
    pub globals: PrimaryMap<GlobalIndex, GlobalType>,

    /// The index of the start function if defined.
    /// This function will be called during module initialization.
    pub start: Option<FuncIndex>,
    /// Imports declared in this module.
    pub imports: Vec<Import>,
    /// Exports declared in this module, in declaration order.
    pub exports: IndexMap<String, EntityIndex>,

    /// Initialization expressions for globals defined in this module.
    pub global_initializers: PrimaryMap<DefinedGlobalIndex, ConstExpr>,
    pub elements: PrimaryMap<ElemIndex, ElementSegment>,
    pub data: PrimaryMap<DataIndex, DataSegment>,
    /// The declared number of data segments, required by `memory.init` and
    /// `data.drop`.
    pub data_count: Option<u32>,

    /// Function names from the `name` custom section.
    pub func_names: HashMap<FuncIndex, String>,

    /// The number of imported functions. The first `num_imported_functions`
    /// functions in the `functions` table are imported functions.
    pub num_imported_functions: u32,
    pub num_imported_tables: u32,
    pub num_imported_memories: u32,
    pub num_imported_globals: u32,
}

#[derive(Debug, Clone)]
pub struct Import {
    pub module: String,
    pub name: String,
    pub index: EntityIndex,
}

#[derive(Debug, Clone)]
pub struct ElementSegment {
    pub mode: ElementMode,
    pub ty: RefType,
    pub items: ElementItems,
}

#[derive(Debug, Clone)]
pub enum ElementMode {
    Passive,
    Active { table: TableIndex, offset: ConstExpr },
    Declarative,
}

#[derive(Debug, Clone)]
pub enum ElementItems {
    Functions(Box<[FuncIndex]>),
    Expressions(Box<[ConstExpr]>),
}

#[derive(Debug, Clone)]
pub struct DataSegment {
    pub mode: DataMode,
    pub bytes: Arc<[u8]>,
}

#[derive(Debug, Clone)]
pub enum DataMode {
    Passive,
    Active {
        memory: MemoryIndex,
        offset: ConstExpr,
    },
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

impl TranslatedModule {
    #[inline]
    pub fn func_index(&self, index: DefinedFuncIndex) -> FuncIndex {
        FuncIndex::from_u32(self.num_imported_functions + index.as_u32())
    }

    #[inline]
    pub fn defined_func_index(&self, index: FuncIndex) -> Option<DefinedFuncIndex> {
        if self.is_imported_func(index) {
            None
        } else {
            Some(DefinedFuncIndex::from_u32(
                index.as_u32() - self.num_imported_functions,
            ))
        }
    }

    #[inline]
    pub fn is_imported_func(&self, index: FuncIndex) -> bool {
        index.as_u32() < self.num_imported_functions
    }

    #[inline]
    pub fn global_index(&self, index: DefinedGlobalIndex) -> GlobalIndex {
        GlobalIndex::from_u32(self.num_imported_globals + index.as_u32())
    }

    /// Returns the signature of the function at `index`.
    pub fn func_type(&self, index: FuncIndex) -> Option<&FuncType> {
        self.types.get(*self.functions.get(index)?)
    }

    pub fn num_defined_funcs(&self) -> usize {
        self.functions.len() - self.num_imported_functions as usize
    }
}

pub(crate) fn malformed(message: impl Into<String>, offset: Option<usize>) -> Error {
    Error::Malformed {
        message: message.into(),
        offset,
    }
}

/// Builds a [`ModuleTranslation`] from the sections produced by a [`Parser`].
pub struct ModuleTranslator {
    result: ModuleTranslation,
}

impl Default for ModuleTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleTranslator {
    pub fn new() -> Self {
        Self {
            result: ModuleTranslation::default(),
        }
    }

    /// Decodes and checks all sections of a module.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] for structural problems and out of range
    /// indices, [`Error::Io`] if the cursor's source fails.
    pub fn translate<C: ByteCursor>(mut self, parser: Parser<C>) -> crate::Result<ModuleTranslation> {
        for section in parser {
            self.translate_section(section?)?;
        }

        let module = &self.result.module;
        if self.result.function_bodies.len() != module.num_defined_funcs() {
            return Err(malformed(
                "function and code section have inconsistent lengths",
                None,
            ));
        }
        if let Some(count) = module.data_count
            && usize::try_from(count).ok() != Some(module.data.len())
        {
            return Err(malformed(
                "data count and data section have inconsistent lengths",
                None,
            ));
        }

        validate::validate_module(module, &self.result.function_bodies)?;

        tracing::debug!(
            "decoded module {:?}: {} types, {} functions ({} imported), {} exports",
            module.name,
            module.types.len(),
            module.functions.len(),
            module.num_imported_functions,
            module.exports.len()
        );

        Ok(self.result)
    }

    #[expect(clippy::too_many_lines, reason = "big match statement")]
    fn translate_section(&mut self, section: Section) -> crate::Result<()> {
        let module = &mut self.result.module;

        match section {
            Section::Custom(custom) => {
                if custom.name == "name" {
                    // malformed name sections are not fatal
                    match parse_name_section(&custom.data, custom.data_offset) {
                        Ok(names) => {
                            module.name = names.module;
                            module.func_names = names
                                .functions
                                .into_iter()
                                .map(|(index, name)| (FuncIndex::from_u32(index), name))
                                .collect();
                        }
                        Err(err) => tracing::debug!("ignoring malformed name section: {err}"),
                    }
                }
            }
            Section::Type(types) => {
                module.types.reserve_exact(types.len());
                for ty in types {
                    module.types.push(ty);
                }
            }
            Section::Import(imports) => {
                for import in imports {
                    let index = match import.desc {
                        ImportDesc::Func(ty) => {
                            let ty = type_index(module, ty)?;
                            module.num_imported_functions += 1;
                            EntityIndex::Function(module.functions.push(ty))
                        }
                        ImportDesc::Table(ty) => {
                            check_table_type(&ty)?;
                            module.num_imported_tables += 1;
                            EntityIndex::Table(module.tables.push(ty))
                        }
                        ImportDesc::Memory(ty) => {
                            check_memory_type(&ty)?;
                            module.num_imported_memories += 1;
                            EntityIndex::Memory(module.memories.push(ty))
                        }
                        ImportDesc::Global(ty) => {
                            module.num_imported_globals += 1;
                            EntityIndex::Global(module.globals.push(ty))
                        }
                    };

                    module.imports.push(Import {
                        module: import.module,
                        name: import.name,
                        index,
                    });
                }
            }
            Section::Function(functions) => {
                module.functions.reserve_exact(functions.len());
                for ty in functions {
                    let ty = type_index(module, ty)?;
                    module.functions.push(ty);
                }
            }
            Section::Table(tables) => {
                for ty in tables {
                    check_table_type(&ty)?;
                    module.tables.push(ty);
                }
            }
            Section::Memory(memories) => {
                for ty in memories {
                    check_memory_type(&ty)?;
                    module.memories.push(ty);
                }
            }
            Section::Global(globals) => {
                for global in globals {
                    module.globals.push(global.ty);
                    module.global_initializers.push(global.init);
                }
            }
            Section::Export(exports) => {
                for export in exports {
                    let index = match export.desc {
                        ExportDesc::Func(index) => {
                            EntityIndex::Function(func_index(module, index)?)
                        }
                        ExportDesc::Table(index) => EntityIndex::Table(table_index(module, index)?),
                        ExportDesc::Memory(index) => {
                            EntityIndex::Memory(memory_index(module, index)?)
                        }
                        ExportDesc::Global(index) => {
                            EntityIndex::Global(global_index(module, index)?)
                        }
                    };

                    if module.exports.insert(export.name.clone(), index).is_some() {
                        return Err(malformed(
                            format!("duplicate export name `{}`", export.name),
                            None,
                        ));
                    }
                }
            }
            Section::Start(index) => {
                let index = func_index(module, index)?;
                let ty = module
                    .func_type(index)
                    .ok_or_else(|| malformed("unknown function type", None))?;
                if !ty.params().is_empty() || !ty.results().is_empty() {
                    return Err(malformed(
                        format!("start function must have type (func), found {ty}"),
                        None,
                    ));
                }
                module.start = Some(index);
            }
            Section::Element(elements) => {
                for element in elements {
                    let segment = translate_element(module, element)?;
                    module.elements.push(segment);
                }
            }
            Section::DataCount(count) => module.data_count = Some(count),
            Section::Code(bodies) => {
                for body in bodies {
                    self.result.function_bodies.push(body);
                }
            }
            Section::Data(data) => {
                for data in data {
                    let mode = match data.mode {
                        kwasm_parser::DataMode::Passive => DataMode::Passive,
                        kwasm_parser::DataMode::Active { memory, offset } => DataMode::Active {
                            memory: memory_index(module, memory)?,
                            offset,
                        },
                    };
                    module.data.push(DataSegment {
                        mode,
                        bytes: Arc::from(data.init),
                    });
                }
            }
        }

        Ok(())
    }
}

fn translate_element(
    module: &TranslatedModule,
    element: kwasm_parser::Element,
) -> crate::Result<ElementSegment> {
    let mode = match element.mode {
        kwasm_parser::ElementMode::Passive => ElementMode::Passive,
        kwasm_parser::ElementMode::Declarative => ElementMode::Declarative,
        kwasm_parser::ElementMode::Active { table, offset } => {
            let table = table_index(module, table)?;
            let table_ty = module.tables[table];
            if table_ty.element != element.ty {
                return Err(malformed(
                    format!(
                        "element segment of type {} does not match table of type {}",
                        element.ty, table_ty.element
                    ),
                    Some(offset.position),
                ));
            }
            ElementMode::Active { table, offset }
        }
    };

    let items = match element.items {
        kwasm_parser::ElementItems::Functions(funcs) => ElementItems::Functions(
            funcs
                .into_iter()
                .map(|index| func_index(module, index))
                .collect::<crate::Result<_>>()?,
        ),
        kwasm_parser::ElementItems::Expressions(exprs) => {
            ElementItems::Expressions(exprs.into_boxed_slice())
        }
    };

    Ok(ElementSegment {
        mode,
        ty: element.ty,
        items,
    })
}

fn check_bounds<I: EntityRef>(index: u32, len: usize, what: &str) -> crate::Result<I> {
    let index_usize = usize::try_from(index).unwrap_or(usize::MAX);
    if index_usize < len {
        Ok(I::new(index_usize))
    } else {
        Err(malformed(format!("unknown {what} {index}"), None))
    }
}

fn type_index(module: &TranslatedModule, index: u32) -> crate::Result<TypeIndex> {
    check_bounds(index, module.types.len(), "type")
}

fn func_index(module: &TranslatedModule, index: u32) -> crate::Result<FuncIndex> {
    check_bounds(index, module.functions.len(), "function")
}

fn table_index(module: &TranslatedModule, index: u32) -> crate::Result<TableIndex> {
    check_bounds(index, module.tables.len(), "table")
}

fn memory_index(module: &TranslatedModule, index: u32) -> crate::Result<MemoryIndex> {
    check_bounds(index, module.memories.len(), "memory")
}

fn global_index(module: &TranslatedModule, index: u32) -> crate::Result<GlobalIndex> {
    check_bounds(index, module.globals.len(), "global")
}

fn check_memory_type(ty: &MemoryType) -> crate::Result<()> {
    let limits = ty.limits;
    if limits.min > kwasm_parser::MAX_WASM32_MEMORY_PAGES
        || limits
            .max
            .is_some_and(|max| max > kwasm_parser::MAX_WASM32_MEMORY_PAGES)
    {
        return Err(malformed("memory size must be at most 65536 pages (4GiB)", None));
    }
    if limits.max.is_some_and(|max| max < limits.min) {
        return Err(malformed(
            "size minimum must not be greater than maximum",
            None,
        ));
    }
    Ok(())
}

fn check_table_type(ty: &TableType) -> crate::Result<()> {
    if ty.limits.max.is_some_and(|max| max < ty.limits.min) {
        return Err(malformed(
            "size minimum must not be greater than maximum",
            None,
        ));
    }
    Ok(())
}
