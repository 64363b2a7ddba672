// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A WebAssembly interpreter.
//!
//! Modules are decoded eagerly but function bodies are translated to a flat
//! instruction sequence only when first called. All runtime objects live in a
//! [`Store`] and are referred to through copyable handles.

mod backtrace;
mod compile;
mod const_eval;
mod engine;
mod errors;
mod exec;
mod externref;
mod func;
mod global;
mod indices;
mod inspect;
mod instance;
mod limiter;
mod linker;
mod memory;
mod module;
mod store;
mod table;
mod trap;
mod translate;
mod type_registry;
mod utils;
mod values;

use crate::utils::variant_accessors;

pub type Result<T> = core::result::Result<T, Error>;

pub use backtrace::{FrameInfo, WasmBacktrace};
pub use compile::TranslationError;
pub use engine::{
    DEFAULT_MAX_CALL_DEPTH, DEFAULT_MAX_VALUE_STACK, DEFAULT_STREAM_CHUNK_SIZE, Engine,
    EngineConfig,
};
pub use errors::Error;
pub use externref::ExternRef;
pub use func::{
    Caller, Func, HostFunc, HostParams, HostResults, IntoFunc, TypedFunc, WasmParams,
    WasmResults, WasmTy,
};
pub use global::Global;
pub use inspect::{CODE_BASE, CallHook, FrameView, Inspector, MEMORY_BASE, SLOT_SIZE, STACK_BASE};
pub use instance::{Export, Instance};
pub use kwasm_parser::{
    FuncType, GlobalType, Limits, MemoryType, Mutability, RefType, TableType, ValType,
};
pub use limiter::{ResourceLimiter, StoreLimits};
pub use linker::Linker;
pub use memory::{Memory, MemoryAccessError, WASM_PAGE_SIZE};
pub use module::{ExportType, ExternType, ImportType, Module};
pub use store::{AsContextMut, Store, StoreId, StoreOpaque};
pub use table::Table;
pub use trap::Trap;
pub use values::{Ref, Val};

/// A WebAssembly external value which is just any type that can be imported or exported between modules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Extern {
    Func(Func),
    Table(Table),
    Memory(Memory),
    Global(Global),
}

impl From<Func> for Extern {
    fn from(f: Func) -> Self {
        Extern::Func(f)
    }
}

impl From<Table> for Extern {
    fn from(t: Table) -> Self {
        Extern::Table(t)
    }
}

impl From<Memory> for Extern {
    fn from(m: Memory) -> Self {
        Extern::Memory(m)
    }
}

impl From<Global> for Extern {
    fn from(g: Global) -> Self {
        Extern::Global(g)
    }
}

impl Extern {
    /// Human readable name of the entity kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Extern::Func(_) => "function",
            Extern::Table(_) => "table",
            Extern::Memory(_) => "memory",
            Extern::Global(_) => "global",
        }
    }

    /// The type of this object as it would be declared by an import.
    pub fn ty(&self, store: &StoreOpaque) -> ExternType {
        match self {
            Extern::Func(f) => ExternType::Func(f.ty(store)),
            Extern::Table(t) => ExternType::Table(t.ty(store)),
            Extern::Memory(m) => ExternType::Memory(m.ty(store)),
            Extern::Global(g) => ExternType::Global(g.ty(store)),
        }
    }

    pub(crate) fn comes_from_same_store(&self, store: &StoreOpaque) -> bool {
        match self {
            Extern::Func(f) => f.comes_from_same_store(store),
            Extern::Table(t) => t.comes_from_same_store(store),
            Extern::Memory(m) => m.comes_from_same_store(store),
            Extern::Global(g) => g.comes_from_same_store(store),
        }
    }

    variant_accessors! {
        e
        (Func(Func) is_func get_func unwrap_func | into_func => *e)
        (Table(Table) is_table get_table unwrap_table | into_table => *e)
        (Memory(Memory) is_memory get_memory unwrap_memory | into_memory => *e)
        (Global(Global) is_global get_global unwrap_global | into_global => *e)
    }
}
