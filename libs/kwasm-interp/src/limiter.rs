// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

/// Hook that decides whether memories and tables of a store may grow.
///
/// The limiter is consulted before every allocation and growth, both when
/// instantiating a module and when guest code executes `memory.grow` or
/// `table.grow`. A rejected request leaves the object at its previous size.
pub trait ResourceLimiter {
    /// A memory wants to grow from `current` to `desired` bytes.
    ///
    /// `maximum` is the declared maximum in bytes, if any. Requests beyond
    /// the declared maximum are rejected before the limiter is asked.
    fn memory_growing(&mut self, current: usize, desired: usize, maximum: Option<usize>) -> bool;

    /// A table wants to grow from `current` to `desired` elements.
    fn table_growing(&mut self, current: usize, desired: usize, maximum: Option<usize>) -> bool;
}

/// A [`ResourceLimiter`] with fixed upper bounds.
#[derive(Debug, Clone, Copy)]
pub struct StoreLimits {
    memory_size: Option<usize>,
    table_elements: Option<usize>,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreLimits {
    /// Limits that allow everything.
    pub const fn new() -> Self {
        Self {
            memory_size: None,
            table_elements: None,
        }
    }

    /// Maximum size of any single linear memory in bytes.
    #[must_use]
    pub const fn memory_size(mut self, bytes: usize) -> Self {
        self.memory_size = Some(bytes);
        self
    }

    /// Maximum number of elements of any single table.
    #[must_use]
    pub const fn table_elements(mut self, elements: usize) -> Self {
        self.table_elements = Some(elements);
        self
    }
}

impl ResourceLimiter for StoreLimits {
    fn memory_growing(&mut self, _current: usize, desired: usize, _maximum: Option<usize>) -> bool {
        self.memory_size.is_none_or(|limit| desired <= limit)
    }

    fn table_growing(&mut self, _current: usize, desired: usize, _maximum: Option<usize>) -> bool {
        self.table_elements.is_none_or(|limit| desired <= limit)
    }
}
