// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::sync::Arc;

use cranelift_entity::{EntityRef, PrimaryMap};
use hashbrown::HashMap;
use kwasm_parser::{FuncType, Limits};

use crate::const_eval::{ConstEvalContext, ConstExprEvaluator};
use crate::func::{Func, FuncData, FuncKind, TypedFunc, WasmParams, WasmResults};
use crate::global::{Global, GlobalData};
use crate::indices::{
    DataIndex, ElemIndex, EntityIndex, FuncIndex, GlobalIndex, MemoryIndex, TableIndex, TypeIndex,
};
use crate::memory::{Memory, MemoryData};
use crate::module::Module;
use crate::store::{AsContextMut, StoreOpaque, Stored};
use crate::table::{Table, TableData};
use crate::translate::{DataMode, ElementItems, ElementMode};
use crate::values::{Val, VmVal};
use crate::{Error, Extern};

/// An instantiated module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Instance(pub(crate) Stored<InstanceData>);

#[derive(Debug)]
pub(crate) struct InstanceData {
    pub(crate) module: Module,
    pub(crate) functions: PrimaryMap<FuncIndex, Func>,
    pub(crate) tables: PrimaryMap<TableIndex, Table>,
    pub(crate) memories: PrimaryMap<MemoryIndex, Memory>,
    pub(crate) globals: PrimaryMap<GlobalIndex, Global>,
    /// Element segments, emptied once dropped.
    pub(crate) elements: PrimaryMap<ElemIndex, Box<[VmVal]>>,
    /// Data segments, emptied once dropped.
    pub(crate) data: PrimaryMap<DataIndex, Arc<[u8]>>,
}

#[derive(Clone, Debug)]
pub struct Export<'instance> {
    /// The name of the export.
    pub name: &'instance str,
    /// The definition of the export.
    pub definition: Extern,
}

/// Imports sorted by kind, in module order.
#[derive(Default)]
struct Imports {
    functions: Vec<Func>,
    tables: Vec<Table>,
    memories: Vec<Memory>,
    globals: Vec<Global>,
}

// ===== impl Instance =====

impl Instance {
    /// Instantiates `module` with `imports` given in the order the module
    /// declares its imports.
    ///
    /// Instantiation either succeeds completely or leaves no guest visible
    /// effect on imported objects: all active segments are bounds checked
    /// before the first one is written. A trap in the start function is the
    /// exception, writes performed by segments and the start function up to
    /// that point stay.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingImport`] if fewer imports than declared are given.
    /// - [`Error::ImportMismatch`] if an import has the wrong kind or type,
    ///   or belongs to another store.
    /// - [`Error::SegmentOutOfRange`] if an active segment does not fit.
    /// - [`Error::ResourceLimitExceeded`] if the limiter rejects an initial
    ///   memory or table allocation.
    /// - Any error raised by the start function.
    ///
    /// # Panics
    ///
    /// Panics if `module` was created by a different engine than `store`.
    pub fn new<T: 'static>(
        mut store: impl AsContextMut<Data = T>,
        module: &Module,
        imports: &[Extern],
    ) -> crate::Result<Self> {
        let store = store.as_context_mut();
        assert!(
            crate::Engine::same(store.engine(), module.engine()),
            "cross-engine instantiation is not supported"
        );

        let objects_before = store.object_count();
        let res = Self::new_inner(store, module, imports);
        match &res {
            Ok(instance) => tracing::debug!(
                "instantiated module {:?} as {instance:?}",
                module.name().unwrap_or("<unnamed>")
            ),
            Err(err) if store.object_count() > objects_before => tracing::warn!(
                "instantiation failed after allocating {} objects that stay in the store: {err}",
                store.object_count() - objects_before
            ),
            Err(_) => {}
        }
        res
    }

    fn new_inner<T: 'static>(
        store: &mut crate::store::StoreInner<T>,
        module: &Module,
        imports: &[Extern],
    ) -> crate::Result<Self> {
        let translated = module.translated();
        let imports = check_imports(store, module, imports)?;

        let mut memories = imports.memories;
        for (_, ty) in translated
            .memories
            .iter()
            .skip(translated.num_imported_memories as usize)
        {
            let data = MemoryData::new(*ty, store.limiter())?;
            memories.push(Memory(store.add_memory(data)));
        }

        let mut tables = imports.tables;
        for (_, ty) in translated
            .tables
            .iter()
            .skip(translated.num_imported_tables as usize)
        {
            let data = TableData::new(*ty, VmVal::ZERO, store.limiter())?;
            tables.push(Table(store.add_table(data)));
        }

        // Guest functions need their instance handle, so the instance is
        // allocated first and filled in once everything else exists.
        let instance = Instance(store.add_instance(InstanceData {
            module: module.clone(),
            functions: PrimaryMap::new(),
            tables: PrimaryMap::new(),
            memories: PrimaryMap::new(),
            globals: PrimaryMap::new(),
            elements: PrimaryMap::new(),
            data: PrimaryMap::new(),
        }));

        let mut functions = imports.functions;
        let mut signatures: HashMap<TypeIndex, Arc<FuncType>> = HashMap::new();
        for (func_index, type_index) in translated
            .functions
            .iter()
            .skip(translated.num_imported_functions as usize)
        {
            let Some(def_index) = translated.defined_func_index(func_index) else {
                continue;
            };
            let ty = signatures
                .entry(*type_index)
                .or_insert_with(|| Arc::new(translated.types[*type_index].clone()))
                .clone();
            let func = store.add_function(FuncData {
                ty,
                type_id: module.type_id(*type_index),
                kind: FuncKind::Wasm {
                    instance,
                    module: module.clone(),
                    def_index,
                },
            });
            functions.push(Func(func));
        }

        let mut const_eval = ConstExprEvaluator::default();
        let mut globals = imports.globals;
        for (def_index, init) in &translated.global_initializers {
            let index = translated.global_index(def_index);
            let value = const_eval.eval(
                &ConstEvalContext {
                    store,
                    globals: &globals,
                    functions: &functions,
                },
                init,
            )?;
            let ty = translated.globals[index];
            globals.push(Global(store.add_global(GlobalData { ty, value })));
        }

        let cx = ConstEvalContext {
            store,
            globals: &globals,
            functions: &functions,
        };
        let mut elements = PrimaryMap::with_capacity(translated.elements.len());
        for (_, segment) in &translated.elements {
            let items: Box<[VmVal]> = match &segment.items {
                ElementItems::Functions(indices) => indices
                    .iter()
                    .map(|index| VmVal::from_ref(Some(functions[index.index()].arena_index())))
                    .collect(),
                ElementItems::Expressions(exprs) => exprs
                    .iter()
                    .map(|expr| const_eval.eval(&cx, expr))
                    .collect::<crate::Result<_>>()?,
            };
            elements.push(items);
        }

        let mut element_offsets = Vec::new();
        for (index, segment) in &translated.elements {
            if let ElementMode::Active { table, offset } = &segment.mode {
                let offset = const_eval.eval(&cx, offset)?.as_u32();
                let table = tables[table.index()];
                let size = store.get_table(table.0).size();
                if !fits(offset, elements[index].len(), size as usize) {
                    return Err(Error::SegmentOutOfRange {
                        kind: "element",
                        index: index.as_u32(),
                    });
                }
                element_offsets.push((index, table, offset));
            }
        }

        let mut data_offsets = Vec::new();
        for (index, segment) in &translated.data {
            if let DataMode::Active { memory, offset } = &segment.mode {
                let offset = const_eval.eval(&cx, offset)?.as_u32();
                let memory = memories[memory.index()];
                let size = store.get_memory(memory.0).bytes().len();
                if !fits(offset, segment.bytes.len(), size) {
                    return Err(Error::SegmentOutOfRange {
                        kind: "data",
                        index: index.as_u32(),
                    });
                }
                data_offsets.push((index, memory, offset));
            }
        }

        for (index, table, offset) in element_offsets {
            let items = &elements[index];
            let start = offset as usize;
            store.get_table_mut(table.0).elements_mut()[start..start + items.len()]
                .copy_from_slice(items);
        }
        for (index, memory, offset) in data_offsets {
            let bytes = &translated.data[index].bytes;
            let start = offset as usize;
            store.get_memory_mut(memory.0).bytes_mut()[start..start + bytes.len()]
                .copy_from_slice(bytes);
        }

        // Active and declarative element segments behave as if dropped
        // right after instantiation, and so do active data segments.
        for (index, segment) in &translated.elements {
            if !matches!(segment.mode, ElementMode::Passive) {
                elements[index] = Box::default();
            }
        }
        let data = translated
            .data
            .values()
            .map(|segment| match segment.mode {
                DataMode::Passive => segment.bytes.clone(),
                DataMode::Active { .. } => Arc::from(&[][..]),
            })
            .collect();

        let inner = store.get_instance_mut(instance.0);
        inner.functions = PrimaryMap::from_iter(functions);
        inner.tables = PrimaryMap::from_iter(tables);
        inner.memories = PrimaryMap::from_iter(memories);
        inner.globals = PrimaryMap::from_iter(globals);
        inner.elements = elements;
        inner.data = data;

        if let Some(start) = translated.start {
            let func = store.get_instance(instance.0).functions[start];
            crate::exec::invoke(store, func, &[])?;
        }

        Ok(instance)
    }

    /// Returns the module this instance was instantiated from.
    pub fn module<'a>(&self, store: &'a StoreOpaque) -> &'a Module {
        &store.get_instance(self.0).module
    }

    /// Returns the exports of this instance in declaration order.
    pub fn exports(self, store: &StoreOpaque) -> impl ExactSizeIterator<Item = Export<'_>> {
        let data = store.get_instance(self.0);
        data.module
            .translated()
            .exports
            .iter()
            .map(move |(name, index)| Export {
                name,
                definition: data.get(*index),
            })
    }

    /// Attempts to get an export from this instance.
    pub fn get_export(&self, store: &StoreOpaque, name: &str) -> Option<Extern> {
        let data = store.get_instance(self.0);
        let index = *data.module.translated().exports.get(name)?;
        Some(data.get(index))
    }

    /// Attempts to get an exported `Func` from this instance.
    pub fn get_func(&self, store: &StoreOpaque, name: &str) -> Option<Func> {
        self.get_export(store, name)?.into_func()
    }

    /// Attempts to get an exported function and check its signature.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExportNotFound`] if there is no such function and
    /// [`Error::TypeMismatch`] if the signature does not match.
    pub fn get_typed_func<Params, Results>(
        &self,
        store: &StoreOpaque,
        name: &str,
    ) -> crate::Result<TypedFunc<Params, Results>>
    where
        Params: WasmParams,
        Results: WasmResults,
    {
        self.get_func(store, name)
            .ok_or_else(|| Error::ExportNotFound(name.to_string()))?
            .typed(store)
    }

    /// Attempts to get an exported `Table` from this instance.
    pub fn get_table(&self, store: &StoreOpaque, name: &str) -> Option<Table> {
        self.get_export(store, name)?.into_table()
    }

    /// Attempts to get an exported `Memory` from this instance.
    pub fn get_memory(&self, store: &StoreOpaque, name: &str) -> Option<Memory> {
        self.get_export(store, name)?.into_memory()
    }

    /// Attempts to get an exported `Global` from this instance.
    pub fn get_global(&self, store: &StoreOpaque, name: &str) -> Option<Global> {
        self.get_export(store, name)?.into_global()
    }

    /// Calls the exported function `name` and returns its results.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExportNotFound`] if there is no exported function
    /// with that name, otherwise see [`Func::call`].
    pub fn invoke<T: 'static>(
        &self,
        mut store: impl AsContextMut<Data = T>,
        name: &str,
        params: &[Val],
    ) -> crate::Result<Vec<Val>> {
        let store = store.as_context_mut();
        let func = self
            .get_func(store, name)
            .ok_or_else(|| Error::ExportNotFound(name.to_string()))?;
        let mut results: Vec<Val> = func
            .ty(store)
            .results()
            .iter()
            .map(|ty| Val::default_for_ty(*ty))
            .collect();
        func.call(&mut *store, params, &mut results)?;
        Ok(results)
    }

    pub(crate) fn comes_from_same_store(&self, store: &StoreOpaque) -> bool {
        store.owns(self.0)
    }
}

// ===== impl InstanceData =====

impl InstanceData {
    fn get(&self, index: EntityIndex) -> Extern {
        match index {
            EntityIndex::Function(index) => Extern::Func(self.functions[index]),
            EntityIndex::Table(index) => Extern::Table(self.tables[index]),
            EntityIndex::Memory(index) => Extern::Memory(self.memories[index]),
            EntityIndex::Global(index) => Extern::Global(self.globals[index]),
        }
    }
}

/// Whether `len` items starting at `offset` fit into `size`.
fn fits(offset: u32, len: usize, size: usize) -> bool {
    (offset as usize)
        .checked_add(len)
        .is_some_and(|end| end <= size)
}

fn check_imports(
    store: &StoreOpaque,
    module: &Module,
    imports: &[Extern],
) -> crate::Result<Imports> {
    let translated = module.translated();
    if let Some(missing) = translated.imports.get(imports.len()) {
        return Err(Error::MissingImport {
            module: missing.module.clone(),
            field: missing.name.clone(),
            kind: missing.index.kind(),
        });
    }
    if imports.len() > translated.imports.len() {
        return Err(Error::TypeMismatch(format!(
            "expected {} imports, got {}",
            translated.imports.len(),
            imports.len()
        )));
    }

    let mut out = Imports::default();
    for (import, value) in translated.imports.iter().zip(imports) {
        let mismatch = |message: String| Error::ImportMismatch {
            module: import.module.clone(),
            field: import.name.clone(),
            message,
        };

        if !value.comes_from_same_store(store) {
            return Err(mismatch("import belongs to a different store".to_string()));
        }

        match (import.index, value) {
            (EntityIndex::Function(index), Extern::Func(func)) => {
                let expected = translated.functions[index];
                let actual = store.get_function(func.0);
                if actual.type_id != module.type_id(expected) {
                    return Err(mismatch(format!(
                        "expected {}, found {}",
                        translated.types[expected], actual.ty
                    )));
                }
                out.functions.push(*func);
            }
            (EntityIndex::Table(index), Extern::Table(table)) => {
                let expected = translated.tables[index];
                let actual = store.get_table(table.0);
                let limits = Limits {
                    min: actual.size(),
                    max: actual.ty().limits.max,
                };
                if actual.ty().element != expected.element
                    || !limits.matches(&expected.limits)
                {
                    return Err(mismatch(format!(
                        "expected table with limits {}, found {limits}",
                        expected.limits
                    )));
                }
                out.tables.push(*table);
            }
            (EntityIndex::Memory(index), Extern::Memory(memory)) => {
                let expected = translated.memories[index];
                let actual = store.get_memory(memory.0);
                let limits = Limits {
                    min: actual.size(),
                    max: actual.ty().limits.max,
                };
                if !limits.matches(&expected.limits) {
                    return Err(mismatch(format!(
                        "expected memory with limits {}, found {limits}",
                        expected.limits
                    )));
                }
                out.memories.push(*memory);
            }
            (EntityIndex::Global(index), Extern::Global(global)) => {
                let expected = translated.globals[index];
                let actual = store.get_global(global.0).ty;
                if actual != expected {
                    return Err(mismatch(format!(
                        "expected global {expected:?}, found {actual:?}"
                    )));
                }
                out.globals.push(*global);
            }
            (index, value) => {
                return Err(mismatch(format!(
                    "expected {}, found {}",
                    index.kind(),
                    value.kind()
                )));
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use kwasm_parser::{MemoryType, ValType};

    use super::*;
    use crate::{Engine, Store};

    fn instantiate(store: &mut Store<()>, wat: &str, imports: &[Extern]) -> crate::Result<Instance> {
        let wasm = wat::parse_str(wat).unwrap();
        let module = Module::new(store.engine(), &wasm).unwrap();
        Instance::new(store, &module, imports)
    }

    #[test]
    fn exports_in_declaration_order() {
        let mut store = Store::new(&Engine::default(), ());
        let instance = instantiate(
            &mut store,
            r#"(module
                (memory (export "mem") 1)
                (global (export "g") i32 (i32.const 7))
                (func (export "f") (result i32) global.get 0))"#,
            &[],
        )
        .unwrap();

        let names: Vec<_> = instance.exports(&store).map(|e| e.name).collect();
        assert_eq!(names, ["mem", "g", "f"]);
        assert_eq!(instance.get_global(&store, "g").unwrap().get(&store), Val::I32(7));
        assert!(instance.get_memory(&store, "f").is_none());
        assert_eq!(
            instance.invoke(&mut store, "f", &[]).unwrap(),
            [Val::I32(7)]
        );
        assert!(matches!(
            instance.invoke(&mut store, "nope", &[]),
            Err(Error::ExportNotFound(_))
        ));
    }

    #[test]
    fn segments_are_written() {
        let mut store = Store::new(&Engine::default(), ());
        let instance = instantiate(
            &mut store,
            r#"(module
                (memory (export "mem") 1)
                (table (export "t") 2 funcref)
                (func $f)
                (elem (i32.const 1) $f)
                (data (i32.const 4) "hi"))"#,
            &[],
        )
        .unwrap();

        let mem = instance.get_memory(&store, "mem").unwrap();
        assert_eq!(&mem.data(&store)[4..6], b"hi");
        let table = instance.get_table(&store, "t").unwrap();
        assert!(table.get(&store, 0).unwrap().is_null());
        assert!(table.get(&store, 1).unwrap().is_non_null());
    }

    #[test]
    fn segments_are_checked_before_writing() {
        let mut store = Store::new(&Engine::default(), ());
        let memory = Memory::new(
            &mut store,
            MemoryType {
                limits: Limits { min: 1, max: None },
            },
        )
        .unwrap();

        let err = instantiate(
            &mut store,
            r#"(module
                (import "env" "mem" (memory 1))
                (data (i32.const 0) "abc")
                (data (i32.const 65535) "xy"))"#,
            &[memory.into()],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::SegmentOutOfRange {
                kind: "data",
                index: 1
            }
        ));
        assert_eq!(&memory.data(&store)[0..3], [0, 0, 0]);
    }

    #[test]
    fn imports_are_checked() {
        let mut store = Store::new(&Engine::default(), ());
        let wat = r#"(module (import "env" "f" (func (param i32))))"#;

        let err = instantiate(&mut store, wat, &[]).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingImport { kind: "function", .. }
        ));

        let wrong_sig = Func::wrap(&mut store, |_: i64| {});
        let err = instantiate(&mut store, wat, &[wrong_sig.into()]).unwrap_err();
        assert!(matches!(err, Error::ImportMismatch { .. }), "{err}");

        let global = Global::new(
            &mut store,
            kwasm_parser::GlobalType {
                content: ValType::I32,
                mutability: kwasm_parser::Mutability::Const,
            },
            Val::I32(0),
        )
        .unwrap();
        let err = instantiate(&mut store, wat, &[global.into()]).unwrap_err();
        assert!(matches!(err, Error::ImportMismatch { .. }), "{err}");

        let ok = Func::wrap(&mut store, |_: i32| {});
        instantiate(&mut store, wat, &[ok.into()]).unwrap();
    }

    #[test]
    fn imported_memory_limits() {
        let mut store = Store::new(&Engine::default(), ());
        let small = Memory::new(
            &mut store,
            MemoryType {
                limits: Limits { min: 1, max: None },
            },
        )
        .unwrap();

        let err = instantiate(
            &mut store,
            r#"(module (import "env" "mem" (memory 2)))"#,
            &[small.into()],
        )
        .unwrap_err();
        assert!(matches!(err, Error::ImportMismatch { .. }), "{err}");

        small.grow(&mut store, 1).unwrap();
        instantiate(
            &mut store,
            r#"(module (import "env" "mem" (memory 2)))"#,
            &[small.into()],
        )
        .unwrap();
    }

    #[test]
    fn start_function_runs() {
        let mut store = Store::new(&Engine::default(), ());
        let instance = instantiate(
            &mut store,
            r#"(module
                (global (export "g") (mut i32) (i32.const 0))
                (func $init i32.const 5 global.set 0)
                (start $init))"#,
            &[],
        )
        .unwrap();
        assert_eq!(instance.get_global(&store, "g").unwrap().get(&store), Val::I32(5));
    }
}
