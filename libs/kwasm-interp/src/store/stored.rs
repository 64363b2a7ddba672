// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

/// Number of objects per arena page.
pub(crate) const ARENA_PAGE_CAPACITY: usize = 64;

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one [`Store`](crate::Store) for the lifetime of the process.
///
/// Ids are never reused, so a handle carrying the id of a dropped store can
/// never be mistaken for a handle into a newer one.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct StoreId(u64);

impl StoreId {
    pub(crate) fn allocate() -> Self {
        Self(NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A bump allocator for objects of one kind.
///
/// Objects live in fixed-capacity pages, so pushing never moves existing
/// objects and indices stay valid for the lifetime of the arena. Objects are
/// only ever freed together with the whole arena.
pub(crate) struct Arena<T> {
    pages: Vec<Vec<T>>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self {
            pages: Vec::new(),
            len: 0,
        }
    }
}

impl<T> Arena<T> {
    pub fn alloc(&mut self, value: T) -> usize {
        let needs_page = self
            .pages
            .last()
            .is_none_or(|page| page.len() == ARENA_PAGE_CAPACITY);
        if needs_page {
            self.pages.push(Vec::with_capacity(ARENA_PAGE_CAPACITY));
        }

        let index = self.len;
        if let Some(page) = self.pages.last_mut() {
            page.push(value);
        }
        self.len += 1;
        index
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.pages
            .get(index / ARENA_PAGE_CAPACITY)?
            .get(index % ARENA_PAGE_CAPACITY)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.pages
            .get_mut(index / ARENA_PAGE_CAPACITY)?
            .get_mut(index % ARENA_PAGE_CAPACITY)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

impl<T> fmt::Debug for Arena<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("len", &self.len)
            .field("pages", &self.pages.len())
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct StoredData {
    pub(super) instances: Arena<crate::instance::InstanceData>,
    pub(super) functions: Arena<crate::func::FuncData>,
    pub(super) tables: Arena<crate::table::TableData>,
    pub(super) memories: Arena<crate::memory::MemoryData>,
    pub(super) globals: Arena<crate::global::GlobalData>,
    pub(super) extern_refs: Arena<crate::externref::ExternRefData>,
}

/// A handle to an object owned by a store.
///
/// Handles are plain `(store id, index)` pairs. They do not keep anything
/// alive and resolving them against a store other than the one that issued
/// them panics.
pub struct Stored<T> {
    store_id: StoreId,
    index: usize,
    _m: PhantomData<fn() -> T>,
}

// ===== impl Stored =====

impl<T> Stored<T> {
    pub(crate) fn new(store_id: StoreId, index: usize) -> Self {
        Self {
            store_id,
            index,
            _m: PhantomData,
        }
    }

    pub fn store_id(&self) -> StoreId {
        self.store_id
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }
}

impl<T> Clone for Stored<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Stored<T> {}

impl<T> PartialEq for Stored<T> {
    fn eq(&self, other: &Self) -> bool {
        self.store_id == other.store_id && self.index == other.index
    }
}

impl<T> Eq for Stored<T> {}

impl<T> Hash for Stored<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.store_id.hash(state);
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Stored<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Stored")
            .field(&self.store_id.0)
            .field(&self.index)
            .finish()
    }
}

macro_rules! stored_impls {
    ($bind:ident $(($ty:path, $add:ident, $get:ident, $get_mut:ident, $field:expr))*) => {
        $(
            impl super::StoreOpaque {
                pub(crate) fn $add(&mut self, val: $ty) -> Stored<$ty> {
                    let id = self.id;
                    let $bind = self;
                    let index = $field.alloc(val);
                    Stored::new(id, index)
                }

                #[track_caller]
                pub(crate) fn $get(&self, index: Stored<$ty>) -> &$ty {
                    self.assert_owns(index.store_id);
                    let $bind = self;
                    match $field.get(index.index) {
                        Some(val) => val,
                        None => panic!("dangling {} handle {index:?}", stringify!($ty)),
                    }
                }

                #[track_caller]
                pub(crate) fn $get_mut(&mut self, index: Stored<$ty>) -> &mut $ty {
                    self.assert_owns(index.store_id);
                    let $bind = self;
                    match $field.get_mut(index.index) {
                        Some(val) => val,
                        None => panic!("dangling {} handle {index:?}", stringify!($ty)),
                    }
                }
            }
        )*
    };
}

stored_impls! {
    s
    (crate::instance::InstanceData, add_instance, get_instance, get_instance_mut, s.stored.instances)
    (crate::func::FuncData, add_function, get_function, get_function_mut, s.stored.functions)
    (crate::table::TableData, add_table, get_table, get_table_mut, s.stored.tables)
    (crate::memory::MemoryData, add_memory, get_memory, get_memory_mut, s.stored.memories)
    (crate::global::GlobalData, add_global, get_global, get_global_mut, s.stored.globals)
    (crate::externref::ExternRefData, add_extern_ref, get_extern_ref, get_extern_ref_mut, s.stored.extern_refs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_pages() {
        let mut arena = Arena::default();
        for i in 0..ARENA_PAGE_CAPACITY * 2 + 1 {
            assert_eq!(arena.alloc(i), i);
        }

        assert_eq!(arena.len(), ARENA_PAGE_CAPACITY * 2 + 1);
        assert_eq!(arena.page_count(), 3);
        assert_eq!(arena.get(ARENA_PAGE_CAPACITY), Some(&ARENA_PAGE_CAPACITY));
        assert_eq!(arena.get(ARENA_PAGE_CAPACITY * 3), None);

        *arena.get_mut(5).unwrap() = 500;
        assert_eq!(arena.get(5), Some(&500));
    }

    #[test]
    fn arena_elements_do_not_move() {
        let mut arena = Arena::default();
        arena.alloc(0_u64);
        let first: *const u64 = arena.get(0).unwrap();
        for i in 1..1000 {
            arena.alloc(i);
        }
        assert!(core::ptr::eq(first, arena.get(0).unwrap()));
    }

    #[test]
    fn store_ids_are_unique() {
        let a = StoreId::allocate();
        let b = StoreId::allocate();
        assert_ne!(a, b);
    }
}
