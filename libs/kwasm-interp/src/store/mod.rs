// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

mod stored;

use core::fmt;
use core::ops::{Deref, DerefMut};

use static_assertions::assert_impl_all;

use crate::Engine;
use crate::externref::ExternRef;
use crate::func::Func;
use crate::inspect::{CallHook, FrameView};
use crate::limiter::ResourceLimiter;
use crate::memory::MemoryData;
use crate::table::TableData;
use crate::values::VmVal;
pub(crate) use stored::{ARENA_PAGE_CAPACITY, StoredData};
pub use stored::{StoreId, Stored};

pub(crate) type BoxedLimiter = Box<dyn ResourceLimiter + Send + Sync>;
pub(crate) type CallHookFn =
    Box<dyn FnMut(CallHook, &FrameView<'_>) -> anyhow::Result<()> + Send + Sync>;

/// Owner of all runtime objects (functions, memories, tables, globals and
/// instances) created for one embedding.
///
/// Objects are only ever freed together with the store. Handles such as
/// [`Func`] or [`Memory`](crate::Memory) are plain indices and do not keep
/// the store alive.
pub struct Store<T>(Box<StoreInner<T>>);

#[doc(hidden)]
pub struct StoreInner<T> {
    pub(crate) opaque: StoreOpaque,
    pub(crate) data: T,
}

pub struct StoreOpaque {
    /// Identifies handles issued by this store.
    id: StoreId,
    /// The engine this store belongs to, used mainly for compatibility checking and to access the
    /// global type registry.
    engine: Engine,
    /// Indexed data within this `Store`, used to store information about
    /// globals, functions, memories, etc.
    stored: StoredData,
    limiter: Option<BoxedLimiter>,
    /// Absolute engine epoch at which running code is interrupted.
    epoch_deadline: Option<u64>,
    call_hook: Option<CallHookFn>,
    /// Number of frames that are live across all nested invocations.
    pub(crate) call_depth: usize,
    /// Number of value stack slots held by enclosing invocations.
    pub(crate) stack_height: usize,
    /// Reused between invocations to avoid allocating a new value stack on
    /// every host to wasm call.
    pub(crate) stack_cache: Vec<VmVal>,
}
assert_impl_all!(StoreOpaque: Send, Sync);

// ===== impl Store =====

impl<T> Store<T> {
    pub fn new(engine: &Engine, data: T) -> Self {
        let id = StoreId::allocate();
        tracing::trace!("created store {id:?}");

        Self(Box::new(StoreInner {
            opaque: StoreOpaque {
                id,
                engine: engine.clone(),
                stored: StoredData::default(),
                limiter: None,
                epoch_deadline: None,
                call_hook: None,
                call_depth: 0,
                stack_height: 0,
                stack_cache: Vec::new(),
            },
            data,
        }))
    }

    pub fn data(&self) -> &T {
        &self.0.data
    }

    pub fn data_mut(&mut self) -> &mut T {
        &mut self.0.data
    }

    pub fn into_data(self) -> T {
        self.0.data
    }
}

impl<T> Deref for Store<T> {
    type Target = StoreOpaque;

    fn deref(&self) -> &Self::Target {
        &self.0.opaque
    }
}

impl<T> DerefMut for Store<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0.opaque
    }
}

impl<T: fmt::Debug> fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("opaque", &self.0.opaque)
            .field("data", &self.0.data)
            .finish()
    }
}

// ===== impl StoreInner =====

impl<T> Deref for StoreInner<T> {
    type Target = StoreOpaque;

    fn deref(&self) -> &Self::Target {
        &self.opaque
    }
}

impl<T> DerefMut for StoreInner<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.opaque
    }
}

// ===== impl StoreOpaque =====

impl StoreOpaque {
    pub fn id(&self) -> StoreId {
        self.id
    }

    #[inline]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Installs a hook that is consulted before memories and tables grow.
    pub fn set_limiter(&mut self, limiter: impl ResourceLimiter + Send + Sync + 'static) {
        self.limiter = Some(Box::new(limiter));
    }

    pub(crate) fn limiter(&mut self) -> &mut Option<BoxedLimiter> {
        &mut self.limiter
    }

    /// Makes running code trap with [`Trap::Interrupted`](crate::Trap::Interrupted)
    /// once the engine epoch advanced `ticks` times from its current value.
    pub fn set_epoch_deadline(&mut self, ticks: u64) {
        self.epoch_deadline = Some(self.engine.current_epoch().saturating_add(ticks));
    }

    pub fn clear_epoch_deadline(&mut self) {
        self.epoch_deadline = None;
    }

    #[inline]
    pub(crate) fn epoch_deadline_reached(&self) -> bool {
        self.epoch_deadline
            .is_some_and(|deadline| self.engine.current_epoch() >= deadline)
    }

    /// Installs a hook that is called whenever a guest function is entered
    /// or exited.
    pub fn set_call_hook(
        &mut self,
        hook: impl FnMut(CallHook, &FrameView<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    ) {
        self.call_hook = Some(Box::new(hook));
    }

    pub(crate) fn take_call_hook(&mut self) -> Option<CallHookFn> {
        self.call_hook.take()
    }

    pub(crate) fn restore_call_hook(&mut self, hook: CallHookFn) {
        self.call_hook = Some(hook);
    }

    #[inline]
    pub(crate) fn has_call_hook(&self) -> bool {
        self.call_hook.is_some()
    }

    /// Number of objects allocated in this store, across all kinds.
    pub fn object_count(&self) -> usize {
        let s = &self.stored;
        s.instances.len()
            + s.functions.len()
            + s.tables.len()
            + s.memories.len()
            + s.globals.len()
            + s.extern_refs.len()
    }

    /// Number of arena pages backing this store, across all kinds.
    pub fn page_count(&self) -> usize {
        let s = &self.stored;
        s.instances.page_count()
            + s.functions.page_count()
            + s.tables.page_count()
            + s.memories.page_count()
            + s.globals.page_count()
            + s.extern_refs.page_count()
    }

    #[inline]
    #[track_caller]
    pub(crate) fn assert_owns(&self, id: StoreId) {
        assert_eq!(
            self.id, id,
            "object used with the wrong store (handle from {id:?}, store is {:?})",
            self.id
        );
    }

    #[inline]
    pub(crate) fn owns<T>(&self, stored: Stored<T>) -> bool {
        stored.store_id() == self.id
    }

    /// Grows `memory` by `delta` pages, returning the previous size in pages.
    ///
    /// Returns `None` if the declared maximum or the resource limiter forbid
    /// the growth, or the host is out of memory.
    #[track_caller]
    pub(crate) fn grow_memory(&mut self, memory: Stored<MemoryData>, delta: u32) -> Option<u32> {
        self.assert_owns(memory.store_id());
        let Some(data) = self.stored.memories.get_mut(memory.index()) else {
            panic!("dangling memory handle {memory:?}");
        };
        data.grow(delta, &mut self.limiter)
    }

    /// Grows `table` by `delta` elements set to `init`, returning the
    /// previous size.
    #[track_caller]
    pub(crate) fn grow_table(
        &mut self,
        table: Stored<TableData>,
        delta: u32,
        init: VmVal,
    ) -> Option<u32> {
        self.assert_owns(table.store_id());
        let Some(data) = self.stored.tables.get_mut(table.index()) else {
            panic!("dangling table handle {table:?}");
        };
        data.grow(delta, init, &mut self.limiter)
    }

    /// Turns a raw reference slot index back into a function handle.
    pub(crate) fn func_at(&self, index: usize) -> Func {
        Func(Stored::new(self.id, index))
    }

    pub(crate) fn extern_ref_at(&self, index: usize) -> ExternRef {
        ExternRef(Stored::new(self.id, index))
    }
}

impl fmt::Debug for StoreOpaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOpaque")
            .field("id", &self.id)
            .field("engine", &self.engine)
            .field("stored", &self.stored)
            .field("epoch_deadline", &self.epoch_deadline)
            .finish_non_exhaustive()
    }
}

/// Types that give access to a store together with its embedder data.
///
/// Implemented by [`Store`], [`Caller`](crate::Caller) and mutable references
/// to either, so functions can be called from the host as well as from
/// within host functions.
pub trait AsContextMut {
    type Data;

    #[doc(hidden)]
    fn as_context_mut(&mut self) -> &mut StoreInner<Self::Data>;
}

impl<T> AsContextMut for Store<T> {
    type Data = T;

    fn as_context_mut(&mut self) -> &mut StoreInner<T> {
        &mut self.0
    }
}

impl<T> AsContextMut for StoreInner<T> {
    type Data = T;

    fn as_context_mut(&mut self) -> &mut StoreInner<T> {
        self
    }
}

impl<C: AsContextMut + ?Sized> AsContextMut for &mut C {
    type Data = C::Data;

    fn as_context_mut(&mut self) -> &mut StoreInner<C::Data> {
        (**self).as_context_mut()
    }
}
