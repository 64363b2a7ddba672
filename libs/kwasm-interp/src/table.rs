// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use kwasm_parser::{MAX_WASM_TABLE_ENTRIES, TableType, ValType};

use crate::Error;
use crate::store::{AsContextMut, BoxedLimiter, StoreOpaque, Stored};
use crate::values::{Ref, Val, VmVal};

/// A WebAssembly table of references.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Table(pub(crate) Stored<TableData>);

#[derive(Debug)]
pub(crate) struct TableData {
    ty: TableType,
    elements: Vec<VmVal>,
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "MAX_WASM_TABLE_ENTRIES fits in u32"
)]
const MAX_TABLE_ELEMENTS: u32 = MAX_WASM_TABLE_ENTRIES as u32;

// ===== impl Table =====

impl Table {
    /// Allocates a table of `ty.limits.min` elements, all set to `init`.
    ///
    /// # Errors
    ///
    /// Fails if `init` does not match the element type, the limits are
    /// invalid or the store's limiter rejects the initial size.
    pub fn new(mut store: impl AsContextMut, ty: TableType, init: Ref) -> crate::Result<Self> {
        let store = store.as_context_mut();
        let init = Val::from(init);
        init.ensure_matches_ty(store, ValType::from(ty.element))?;
        let data = TableData::new(ty, init.to_vmval(), store.limiter())?;
        Ok(Self(store.add_table(data)))
    }

    pub fn ty(&self, store: &StoreOpaque) -> TableType {
        store.get_table(self.0).ty
    }

    pub fn size(&self, store: &StoreOpaque) -> u32 {
        store.get_table(self.0).size()
    }

    /// Returns the element at `index`, or `None` if it is out of bounds.
    pub fn get(&self, store: &StoreOpaque, index: u32) -> Option<Ref> {
        let data = store.get_table(self.0);
        let slot = data.get(index)?;
        Ref::from_val(Val::from_vmval(store, slot, ValType::from(data.ty.element)))
    }

    /// # Errors
    ///
    /// Fails if `value` has the wrong type or `index` is out of bounds.
    pub fn set(&self, store: &mut StoreOpaque, index: u32, value: Ref) -> crate::Result<()> {
        let ty = self.ty(store);
        let value = Val::from(value);
        value.ensure_matches_ty(store, ValType::from(ty.element))?;
        store
            .get_table_mut(self.0)
            .set(index, value.to_vmval())
            .ok_or(Error::trap(crate::Trap::TableOutOfBounds))
    }

    /// Grows this table by `delta` elements set to `init` and returns the
    /// previous size.
    ///
    /// # Errors
    ///
    /// Fails if `init` has the wrong type, or with
    /// [`Error::ResourceLimitExceeded`] if the growth exceeds the declared
    /// maximum or is rejected by the store's limiter.
    pub fn grow(&self, store: &mut StoreOpaque, delta: u32, init: Ref) -> crate::Result<u32> {
        let ty = self.ty(store);
        let init = Val::from(init);
        init.ensure_matches_ty(store, ValType::from(ty.element))?;
        store
            .grow_table(self.0, delta, init.to_vmval())
            .ok_or(Error::ResourceLimitExceeded("table"))
    }

    pub(crate) fn comes_from_same_store(&self, store: &StoreOpaque) -> bool {
        store.owns(self.0)
    }
}

// ===== impl TableData =====

impl TableData {
    pub(crate) fn new(
        ty: TableType,
        init: VmVal,
        limiter: &mut Option<BoxedLimiter>,
    ) -> crate::Result<Self> {
        let limits = ty.limits;
        if limits.min > MAX_TABLE_ELEMENTS || limits.max.is_some_and(|max| max < limits.min) {
            return Err(Error::Malformed {
                message: format!("invalid table limits {limits}"),
                offset: None,
            });
        }

        let len = usize::try_from(limits.min).map_err(|_| Error::ResourceLimitExceeded("table"))?;
        let maximum = limits.max.and_then(|max| usize::try_from(max).ok());
        if let Some(limiter) = limiter.as_mut()
            && !limiter.table_growing(0, len, maximum)
        {
            return Err(Error::ResourceLimitExceeded("table"));
        }

        let mut elements = Vec::new();
        elements
            .try_reserve_exact(len)
            .map_err(|_| Error::ResourceLimitExceeded("table"))?;
        elements.resize(len, init);

        Ok(Self { ty, elements })
    }

    pub(crate) fn ty(&self) -> TableType {
        self.ty
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "tables never exceed MAX_TABLE_ELEMENTS"
    )]
    pub(crate) fn size(&self) -> u32 {
        self.elements.len() as u32
    }

    pub(crate) fn get(&self, index: u32) -> Option<VmVal> {
        self.elements.get(usize::try_from(index).ok()?).copied()
    }

    pub(crate) fn set(&mut self, index: u32, value: VmVal) -> Option<()> {
        *self.elements.get_mut(usize::try_from(index).ok()?)? = value;
        Some(())
    }

    pub(crate) fn elements(&self) -> &[VmVal] {
        &self.elements
    }

    pub(crate) fn elements_mut(&mut self) -> &mut [VmVal] {
        &mut self.elements
    }

    pub(crate) fn grow(
        &mut self,
        delta: u32,
        init: VmVal,
        limiter: &mut Option<BoxedLimiter>,
    ) -> Option<u32> {
        let old_len = self.size();
        if delta == 0 {
            return Some(old_len);
        }

        let new_len = old_len.checked_add(delta)?;
        let maximum = self.ty.limits.max.unwrap_or(u32::MAX);
        if new_len > maximum.min(MAX_TABLE_ELEMENTS) {
            return None;
        }

        let current = self.elements.len();
        let desired = usize::try_from(new_len).ok()?;
        let declared = self.ty.limits.max.and_then(|max| usize::try_from(max).ok());
        if let Some(limiter) = limiter.as_mut()
            && !limiter.table_growing(current, desired, declared)
        {
            tracing::debug!("table growth to {new_len} elements rejected by limiter");
            return None;
        }

        self.elements.try_reserve_exact(desired - current).ok()?;
        self.elements.resize(desired, init);
        Some(old_len)
    }
}

#[cfg(test)]
mod tests {
    use kwasm_parser::{Limits, RefType};

    use super::*;
    use crate::{Engine, Func, Store};

    fn table_type(min: u32, max: Option<u32>) -> TableType {
        TableType {
            element: RefType::FuncRef,
            limits: Limits { min, max },
        }
    }

    #[test]
    fn get_set_grow() {
        let mut store = Store::new(&Engine::default(), ());
        let func = Func::wrap(&mut store, || {});
        let table = Table::new(&mut store, table_type(2, Some(4)), Ref::Func(None)).unwrap();

        assert_eq!(table.size(&store), 2);
        assert_eq!(table.get(&store, 1), Some(Ref::Func(None)));
        assert_eq!(table.get(&store, 2), None);

        table.set(&mut store, 1, Ref::Func(Some(func))).unwrap();
        assert_eq!(table.get(&store, 1), Some(Ref::Func(Some(func))));
        assert!(table.set(&mut store, 5, Ref::Func(None)).is_err());

        assert_eq!(table.grow(&mut store, 2, func.into()).unwrap(), 2);
        assert_eq!(table.get(&store, 3), Some(Ref::Func(Some(func))));
        assert!(table.grow(&mut store, 1, Ref::Func(None)).is_err());
        assert_eq!(table.size(&store), 4);
    }

    #[test]
    fn element_type_is_checked() {
        let mut store = Store::new(&Engine::default(), ());
        assert!(matches!(
            Table::new(&mut store, table_type(1, None), Ref::Extern(None)),
            Err(Error::TypeMismatch(_))
        ));
    }
}
