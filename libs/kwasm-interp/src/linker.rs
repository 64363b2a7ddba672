// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::marker::PhantomData;
use std::sync::Arc;

use hashbrown::HashMap;
use hashbrown::hash_map::Entry;
use kwasm_parser::FuncType;

use crate::func::{Caller, HostFunc, IntoFunc};
use crate::store::{AsContextMut, StoreOpaque};
use crate::values::Val;
use crate::{Engine, Error, Extern, Func, Global, Instance, Memory, Module, Table};

/// Resolves imports by `(module, name)` so modules can be instantiated
/// without assembling import lists by hand.
///
/// Host functions defined on a linker are not tied to a store. They are
/// allocated in the store of each instantiation that imports them.
#[derive(Debug)]
pub struct Linker<T> {
    engine: Engine,
    string2idx: HashMap<Arc<str>, usize>,
    strings: Vec<Arc<str>>,
    map: HashMap<ImportKey, Definition>,
    _m: PhantomData<fn() -> T>,
}

#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
struct ImportKey {
    name: usize,
    module: usize,
}

#[derive(Debug, Clone)]
enum Definition {
    Func(Func),
    HostFunc(Arc<HostFunc>),
    Global(Global),
    Table(Table),
    Memory(Memory),
}

impl<T: 'static> Linker<T> {
    /// Create a new `Linker`.
    ///
    /// This linker is scoped to the provided engine and cannot be used to link modules from other engines.
    pub fn new(engine: &Engine) -> Self {
        Self {
            engine: engine.clone(),
            string2idx: HashMap::new(),
            strings: Vec::new(),
            map: HashMap::new(),
            _m: PhantomData,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Defines `module::name` as `def`, an object owned by `store`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyDefined`] if the name is taken.
    ///
    /// # Panics
    ///
    /// Panics if `store` belongs to a different engine than this linker.
    pub fn define(
        &mut self,
        store: &StoreOpaque,
        module: &str,
        name: &str,
        def: impl Into<Extern>,
    ) -> crate::Result<&mut Self> {
        assert!(
            Engine::same(&self.engine, store.engine()),
            "linker and store belong to different engines"
        );
        let key = self.import_key(module, name);
        self.insert(key, Definition::new(def.into()))?;
        Ok(self)
    }

    /// Defines `module::name` as a host function built from a closure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyDefined`] if the name is taken.
    pub fn func_wrap<Params, Results>(
        &mut self,
        module: &str,
        name: &str,
        func: impl IntoFunc<T, Params, Results>,
    ) -> crate::Result<&mut Self> {
        let func = HostFunc::wrap(&self.engine, func);
        let key = self.import_key(module, name);
        self.insert(key, Definition::HostFunc(Arc::new(func)))?;
        Ok(self)
    }

    /// Defines `module::name` as a host function with a dynamically typed
    /// signature, see [`Func::new`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyDefined`] if the name is taken.
    pub fn func_new(
        &mut self,
        module: &str,
        name: &str,
        ty: FuncType,
        func: impl Fn(Caller<'_, T>, &[Val], &mut [Val]) -> anyhow::Result<()>
        + Send
        + Sync
        + 'static,
    ) -> crate::Result<&mut Self> {
        let func = HostFunc::new(&self.engine, ty, func);
        let key = self.import_key(module, name);
        self.insert(key, Definition::HostFunc(Arc::new(func)))?;
        Ok(self)
    }

    /// Attempt to retrieve a definition from this linker.
    ///
    /// Host functions are allocated in `store` on every lookup.
    pub fn get(
        &self,
        store: impl AsContextMut<Data = T>,
        module: &str,
        name: &str,
    ) -> Option<Extern> {
        Some(self._get(module, name)?.to_extern(store))
    }

    fn _get(&self, module: &str, name: &str) -> Option<&Definition> {
        let key = ImportKey {
            module: *self.string2idx.get(module)?,
            name: *self.string2idx.get(name)?,
        };
        self.map.get(&key)
    }

    /// Alias all definitions of `module` under the name `as_module`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyDefined`] if one of the aliased names is
    /// taken. Aliases inserted before the conflict stay defined.
    pub fn alias_module(&mut self, module: &str, as_module: &str) -> crate::Result<&mut Self> {
        let module = self.intern_str(module);
        let as_module = self.intern_str(as_module);
        let items = self
            .map
            .iter()
            .filter(|(key, _def)| key.module == module)
            .map(|(key, def)| (key.name, def.clone()))
            .collect::<Vec<_>>();
        for (name, item) in items {
            self.insert(
                ImportKey {
                    module: as_module,
                    name,
                },
                item,
            )?;
        }
        Ok(self)
    }

    /// Define all exports of the provided `instance` under the module name `module_name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyDefined`] if one of the export names is taken.
    pub fn define_instance(
        &mut self,
        store: &StoreOpaque,
        module_name: &str,
        instance: Instance,
    ) -> crate::Result<&mut Self> {
        let exports = instance
            .exports(store)
            .map(|e| (self.import_key(module_name, e.name), e.definition))
            .collect::<Vec<_>>();

        for (key, ext) in exports {
            self.insert(key, Definition::new(ext))?;
        }

        Ok(self)
    }

    /// Instantiate the provided `module`.
    ///
    /// Each import of `module` is looked up in this linker and must have
    /// been defined before. Type checking is left to [`Instance::new`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingImport`] for the first import without a
    /// definition, otherwise see [`Instance::new`].
    ///
    /// # Panics
    ///
    /// Panics if `module` belongs to a different engine than this linker.
    pub fn instantiate(
        &self,
        mut store: impl AsContextMut<Data = T>,
        module: &Module,
    ) -> crate::Result<Instance> {
        assert!(
            Engine::same(&self.engine, module.engine()),
            "linker and module belong to different engines"
        );
        let store = store.as_context_mut();

        let mut imports = Vec::with_capacity(module.imports().len());
        for import in module.imports() {
            let Some(def) = self._get(import.module, import.name) else {
                return Err(Error::MissingImport {
                    module: import.module.to_string(),
                    field: import.name.to_string(),
                    kind: import.ty.kind(),
                });
            };
            imports.push(def.to_extern(&mut *store));
        }

        Instance::new(store, module, &imports)
    }

    fn insert(&mut self, key: ImportKey, item: Definition) -> crate::Result<()> {
        match self.map.entry(key) {
            Entry::Occupied(_) => {
                return Err(Error::AlreadyDefined {
                    module: self.strings[key.module].to_string(),
                    field: self.strings[key.name].to_string(),
                });
            }
            Entry::Vacant(v) => {
                v.insert(item);
            }
        }

        Ok(())
    }

    fn import_key(&mut self, module: &str, name: &str) -> ImportKey {
        ImportKey {
            module: self.intern_str(module),
            name: self.intern_str(name),
        }
    }

    fn intern_str(&mut self, string: &str) -> usize {
        if let Some(idx) = self.string2idx.get(string) {
            return *idx;
        }
        let string: Arc<str> = string.into();
        let idx = self.strings.len();
        self.strings.push(string.clone());
        self.string2idx.insert(string, idx);
        idx
    }
}

impl Definition {
    fn new(item: Extern) -> Definition {
        match item {
            Extern::Func(f) => Definition::Func(f),
            Extern::Table(t) => Definition::Table(t),
            Extern::Memory(m) => Definition::Memory(m),
            Extern::Global(g) => Definition::Global(g),
        }
    }

    fn to_extern<T: 'static>(&self, store: impl AsContextMut<Data = T>) -> Extern {
        match self {
            Definition::Func(f) => Extern::Func(*f),
            Definition::HostFunc(f) => Extern::Func(f.clone().to_func(store)),
            Definition::Global(g) => Extern::Global(*g),
            Definition::Table(t) => Extern::Table(*t),
            Definition::Memory(m) => Extern::Memory(*m),
        }
    }
}

#[cfg(test)]
mod tests {
    use kwasm_parser::ValType;

    use super::*;
    use crate::Store;

    fn module(engine: &Engine, wat: &str) -> Module {
        Module::new(engine, &wat::parse_str(wat).unwrap()).unwrap()
    }

    #[test]
    fn resolves_host_functions() {
        let engine = Engine::default();
        let mut store = Store::new(&engine, 0_i32);
        let mut linker = Linker::new(&engine);
        linker
            .func_wrap("env", "bump", |mut caller: Caller<'_, i32>, by: i32| {
                *caller.data_mut() += by;
            })
            .unwrap();

        let module = module(
            &engine,
            r#"(module
                (import "env" "bump" (func $bump (param i32)))
                (func (export "run") i32.const 3 call $bump))"#,
        );
        let instance = linker.instantiate(&mut store, &module).unwrap();
        instance.invoke(&mut store, "run", &[]).unwrap();
        assert_eq!(*store.data(), 3);
    }

    #[test]
    fn duplicate_definitions() {
        let engine = Engine::default();
        let mut linker = Linker::<()>::new(&engine);
        linker.func_wrap("env", "f", || {}).unwrap();
        let err = linker.func_wrap("env", "f", || {}).unwrap_err();
        assert!(
            matches!(&err, Error::AlreadyDefined { module, field } if module == "env" && field == "f")
        );

        linker.alias_module("env", "other").unwrap();
        assert!(linker.alias_module("env", "other").is_err());
    }

    #[test]
    fn missing_definition() {
        let engine = Engine::default();
        let mut store = Store::new(&engine, ());
        let linker = Linker::new(&engine);
        let module = module(&engine, r#"(module (import "env" "mem" (memory 1)))"#);

        let err = linker.instantiate(&mut store, &module).unwrap_err();
        assert!(matches!(err, Error::MissingImport { kind: "memory", .. }), "{err}");
    }

    #[test]
    fn define_instance_exports() {
        let engine = Engine::default();
        let mut store = Store::new(&engine, ());
        let mut linker = Linker::new(&engine);

        let provider = module(
            &engine,
            r#"(module (func (export "seven") (result i32) i32.const 7))"#,
        );
        let provider = linker.instantiate(&mut store, &provider).unwrap();
        linker.define_instance(&store, "lib", provider).unwrap();

        let consumer = module(
            &engine,
            r#"(module
                (import "lib" "seven" (func $seven (result i32)))
                (func (export "run") (result i32) call $seven i32.const 1 i32.add))"#,
        );
        let consumer = linker.instantiate(&mut store, &consumer).unwrap();
        assert_eq!(
            consumer.invoke(&mut store, "run", &[]).unwrap(),
            [Val::I32(8)]
        );
        assert!(linker.get(&mut store, "lib", "seven").unwrap().is_func());
    }

    #[test]
    fn dynamic_host_function() {
        let engine = Engine::default();
        let mut store = Store::new(&engine, ());
        let mut linker = Linker::new(&engine);
        linker
            .func_new(
                "env",
                "double",
                FuncType::new([ValType::I64], [ValType::I64]),
                |_, params, results| {
                    results[0] = Val::I64(params[0].unwrap_i64() * 2);
                    Ok(())
                },
            )
            .unwrap();

        let module = module(
            &engine,
            r#"(module
                (import "env" "double" (func $double (param i64) (result i64)))
                (func (export "run") (param i64) (result i64) local.get 0 call $double))"#,
        );
        let instance = linker.instantiate(&mut store, &module).unwrap();
        assert_eq!(
            instance.invoke(&mut store, "run", &[Val::I64(21)]).unwrap(),
            [Val::I64(42)]
        );
    }
}
