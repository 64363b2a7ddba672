// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::any::Any;
use core::fmt;

use crate::store::{AsContextMut, StoreOpaque, Stored};

/// An opaque reference to a host value, passed through guest code as an
/// `externref`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExternRef(pub(crate) Stored<ExternRefData>);

pub(crate) struct ExternRefData {
    value: Box<dyn Any + Send + Sync>,
}

impl ExternRef {
    pub fn new<T>(mut store: impl AsContextMut, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        let store = store.as_context_mut();
        Self(store.add_extern_ref(ExternRefData {
            value: Box::new(value),
        }))
    }

    /// Returns the host value, or `None` if it is not a `T`.
    pub fn data<'a, T: Any>(&self, store: &'a StoreOpaque) -> Option<&'a T> {
        store.get_extern_ref(self.0).value.downcast_ref()
    }

    pub fn data_mut<'a, T: Any>(&self, store: &'a mut StoreOpaque) -> Option<&'a mut T> {
        store.get_extern_ref_mut(self.0).value.downcast_mut()
    }

    pub(crate) fn arena_index(self) -> usize {
        self.0.index()
    }

    pub(crate) fn comes_from_same_store(&self, store: &StoreOpaque) -> bool {
        store.owns(self.0)
    }
}

impl fmt::Debug for ExternRefData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternRefData").finish_non_exhaustive()
    }
}
