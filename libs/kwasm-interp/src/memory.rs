// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;

use kwasm_parser::{MAX_WASM32_MEMORY_PAGES, MemoryType};

use crate::Error;
use crate::store::{AsContextMut, BoxedLimiter, StoreOpaque, Stored};

/// Size of a WebAssembly page in bytes.
pub const WASM_PAGE_SIZE: usize = 0x10000;

/// A WebAssembly linear memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Memory(pub(crate) Stored<MemoryData>);

#[derive(Debug)]
pub(crate) struct MemoryData {
    ty: MemoryType,
    bytes: Vec<u8>,
}

/// Error for out of bounds [`Memory`] access.
#[derive(Debug)]
#[non_exhaustive]
pub struct MemoryAccessError {
    // Keep struct internals private for future extensibility.
    _private: (),
}

fn pages_to_bytes(pages: u32) -> Option<usize> {
    usize::try_from(pages).ok()?.checked_mul(WASM_PAGE_SIZE)
}

// ===== impl Memory =====

impl Memory {
    /// Allocates a new memory of `ty.limits.min` zeroed pages in `store`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the limits are invalid and
    /// [`Error::ResourceLimitExceeded`] if the store's limiter rejects the
    /// initial size.
    pub fn new(mut store: impl AsContextMut, ty: MemoryType) -> crate::Result<Self> {
        let store = store.as_context_mut();
        let data = MemoryData::new(ty, store.limiter())?;
        Ok(Self(store.add_memory(data)))
    }

    pub fn ty(&self, store: &StoreOpaque) -> MemoryType {
        store.get_memory(self.0).ty
    }

    /// Current size in pages.
    pub fn size(&self, store: &StoreOpaque) -> u32 {
        store.get_memory(self.0).size()
    }

    pub fn data<'a>(&self, store: &'a StoreOpaque) -> &'a [u8] {
        &store.get_memory(self.0).bytes
    }

    pub fn data_mut<'a>(&self, store: &'a mut StoreOpaque) -> &'a mut [u8] {
        &mut store.get_memory_mut(self.0).bytes
    }

    /// Copies `buffer.len()` bytes starting at `offset` out of this memory.
    ///
    /// # Errors
    ///
    /// Fails if the range is out of bounds, `buffer` is left untouched.
    pub fn read(
        &self,
        store: &StoreOpaque,
        offset: usize,
        buffer: &mut [u8],
    ) -> Result<(), MemoryAccessError> {
        let src = offset
            .checked_add(buffer.len())
            .and_then(|end| self.data(store).get(offset..end))
            .ok_or_else(MemoryAccessError::new)?;
        buffer.copy_from_slice(src);
        Ok(())
    }

    /// Copies `buffer` into this memory starting at `offset`.
    ///
    /// # Errors
    ///
    /// Fails if the range is out of bounds, the memory is left untouched.
    pub fn write(
        &self,
        store: &mut StoreOpaque,
        offset: usize,
        buffer: &[u8],
    ) -> Result<(), MemoryAccessError> {
        let dst = offset
            .checked_add(buffer.len())
            .and_then(|end| self.data_mut(store).get_mut(offset..end))
            .ok_or_else(MemoryAccessError::new)?;
        dst.copy_from_slice(buffer);
        Ok(())
    }

    /// Grows this memory by `delta` pages and returns the previous size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceLimitExceeded`] if the growth exceeds the
    /// declared maximum or is rejected by the store's limiter. The memory
    /// keeps its previous size in that case.
    pub fn grow(&self, store: &mut StoreOpaque, delta: u32) -> crate::Result<u32> {
        store
            .grow_memory(self.0, delta)
            .ok_or(Error::ResourceLimitExceeded("memory"))
    }

    pub(crate) fn comes_from_same_store(&self, store: &StoreOpaque) -> bool {
        store.owns(self.0)
    }
}

// ===== impl MemoryData =====

impl MemoryData {
    pub(crate) fn new(ty: MemoryType, limiter: &mut Option<BoxedLimiter>) -> crate::Result<Self> {
        let limits = ty.limits;
        if limits.min > MAX_WASM32_MEMORY_PAGES
            || limits.max.is_some_and(|max| max > MAX_WASM32_MEMORY_PAGES || max < limits.min)
        {
            return Err(Error::Malformed {
                message: format!("invalid memory limits {limits}"),
                offset: None,
            });
        }

        let len = pages_to_bytes(limits.min).ok_or(Error::ResourceLimitExceeded("memory"))?;
        let maximum = limits.max.and_then(pages_to_bytes);
        if let Some(limiter) = limiter.as_mut()
            && !limiter.memory_growing(0, len, maximum)
        {
            return Err(Error::ResourceLimitExceeded("memory"));
        }

        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(len)
            .map_err(|_| Error::ResourceLimitExceeded("memory"))?;
        bytes.resize(len, 0);

        Ok(Self { ty, bytes })
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub(crate) fn ty(&self) -> MemoryType {
        self.ty
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "memories never exceed 2^16 pages"
    )]
    pub(crate) fn size(&self) -> u32 {
        (self.bytes.len() / WASM_PAGE_SIZE) as u32
    }

    pub(crate) fn grow(&mut self, delta: u32, limiter: &mut Option<BoxedLimiter>) -> Option<u32> {
        let old_pages = self.size();
        if delta == 0 {
            return Some(old_pages);
        }

        let new_pages = old_pages.checked_add(delta)?;
        let maximum = self.ty.limits.max.unwrap_or(MAX_WASM32_MEMORY_PAGES);
        if new_pages > maximum.min(MAX_WASM32_MEMORY_PAGES) {
            return None;
        }

        let current = self.bytes.len();
        let desired = pages_to_bytes(new_pages)?;
        if let Some(limiter) = limiter.as_mut()
            && !limiter.memory_growing(current, desired, self.ty.limits.max.and_then(pages_to_bytes))
        {
            tracing::debug!("memory growth to {new_pages} pages rejected by limiter");
            return None;
        }

        self.bytes.try_reserve_exact(desired - current).ok()?;
        self.bytes.resize(desired, 0);
        Some(old_pages)
    }
}

// ===== impl MemoryAccessError =====

impl MemoryAccessError {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }
}

impl fmt::Display for MemoryAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "out of bounds memory access")
    }
}

impl core::error::Error for MemoryAccessError {}

#[cfg(test)]
mod tests {
    use kwasm_parser::Limits;

    use super::*;
    use crate::limiter::StoreLimits;
    use crate::{Engine, Store};

    fn memory_type(min: u32, max: Option<u32>) -> MemoryType {
        MemoryType {
            limits: Limits { min, max },
        }
    }

    #[test]
    fn read_write_bounds() {
        let mut store = Store::new(&Engine::default(), ());
        let memory = Memory::new(&mut store, memory_type(1, None)).unwrap();

        memory.write(&mut store, 10, b"hello").unwrap();
        let mut buf = [0; 5];
        memory.read(&store, 10, &mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        assert!(memory.write(&mut store, WASM_PAGE_SIZE - 2, b"abc").is_err());
        assert!(memory.read(&store, usize::MAX, &mut buf).is_err());
        assert_eq!(memory.data(&store)[WASM_PAGE_SIZE - 2], 0);
    }

    #[test]
    fn grow_respects_maximum() {
        let mut store = Store::new(&Engine::default(), ());
        let memory = Memory::new(&mut store, memory_type(0, Some(2))).unwrap();

        assert_eq!(memory.grow(&mut store, 1).unwrap(), 0);
        assert_eq!(memory.grow(&mut store, 1).unwrap(), 1);
        assert!(matches!(
            memory.grow(&mut store, 1),
            Err(Error::ResourceLimitExceeded(_))
        ));
        assert_eq!(memory.size(&store), 2);
        assert_eq!(memory.data(&store).len(), 2 * WASM_PAGE_SIZE);
    }

    #[test]
    fn limiter_rejects_growth() {
        let mut store = Store::new(&Engine::default(), ());
        store.set_limiter(StoreLimits::new().memory_size(WASM_PAGE_SIZE));

        assert!(matches!(
            Memory::new(&mut store, memory_type(2, None)),
            Err(Error::ResourceLimitExceeded(_))
        ));

        let memory = Memory::new(&mut store, memory_type(1, None)).unwrap();
        assert!(memory.grow(&mut store, 1).is_err());
        assert_eq!(memory.size(&store), 1);
    }

    #[test]
    fn invalid_limits() {
        let mut store = Store::new(&Engine::default(), ());
        assert!(matches!(
            Memory::new(&mut store, memory_type(2, Some(1))),
            Err(Error::Malformed { .. })
        ));
    }
}
