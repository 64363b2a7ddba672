// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Read-only views into running guest code for debuggers and profilers.
//!
//! Debug tooling addresses everything through one flat 64-bit address space:
//!
//! | range                                   | contents                          |
//! |-----------------------------------------|-----------------------------------|
//! | `MEMORY_BASE..CODE_BASE`                | the instance's default memory     |
//! | `CODE_BASE..STACK_BASE`                 | module bytes, by module offset    |
//! | `STACK_BASE..`                          | value stack slots, 16 bytes each  |
//!
//! Nothing in this module can mutate the store.

use kwasm_parser::ValType;

use crate::memory::{Memory, MemoryAccessError};
use crate::store::StoreOpaque;
use crate::values::{Val, VmVal};

pub const MEMORY_BASE: u64 = 0;
pub const CODE_BASE: u64 = 0x4000_0000_0000_0000;
pub const STACK_BASE: u64 = 0x6000_0000_0000_0000;
/// Size of one value stack slot in the stack address range.
pub const SLOT_SIZE: u64 = 16;

/// The event a call hook is invoked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallHook {
    /// A guest function was entered, its locals are initialized.
    Enter,
    /// A guest function is about to return.
    Exit,
}

/// A guest frame as seen by a call hook.
pub struct FrameView<'a> {
    pub(crate) store: &'a StoreOpaque,
    pub(crate) memory: Option<Memory>,
    pub(crate) func_index: u32,
    pub(crate) depth: usize,
    /// Module offset of the current instruction.
    pub(crate) offset: usize,
    /// Slot index of the first local, counted across all nested
    /// invocations of the store.
    pub(crate) base: usize,
    pub(crate) params: &'a [ValType],
    pub(crate) locals: &'a [ValType],
    pub(crate) slots: &'a [VmVal],
}

impl<'a> FrameView<'a> {
    /// Index of the function in its module's function index space.
    pub fn func_index(&self) -> u32 {
        self.func_index
    }

    /// Number of guest frames below this one.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Address of the current instruction.
    pub fn code_address(&self) -> u64 {
        CODE_BASE + self.offset as u64
    }

    /// Number of locals, parameters included.
    pub fn local_count(&self) -> usize {
        self.params.len() + self.locals.len()
    }

    fn local_type(&self, index: usize) -> Option<ValType> {
        match index.checked_sub(self.params.len()) {
            None => self.params.get(index).copied(),
            Some(index) => self.locals.get(index).copied(),
        }
    }

    /// Address of the stack slot holding local `index`.
    ///
    /// Slots of guest frames entered from host functions are placed above
    /// those of the calling invocation, so addresses are unique among all live
    /// frames of a store.
    pub fn local_address(&self, index: usize) -> Option<u64> {
        if index >= self.local_count() {
            return None;
        }
        Some(STACK_BASE + (self.base + index) as u64 * SLOT_SIZE)
    }

    /// Current value of local `index`.
    pub fn local(&self, index: usize) -> Option<Val> {
        let ty = self.local_type(index)?;
        let slot = *self.slots.get(index)?;
        Some(Val::from_vmval(self.store, slot, ty))
    }

    pub fn inspector(&self) -> Inspector<'a> {
        Inspector {
            store: self.store,
            memory: self.memory,
        }
    }
}

impl core::fmt::Debug for FrameView<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FrameView")
            .field("func_index", &self.func_index)
            .field("depth", &self.depth)
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

/// Byte-range reads by address.
#[derive(Debug, Clone, Copy)]
pub struct Inspector<'a> {
    store: &'a StoreOpaque,
    memory: Option<Memory>,
}

impl<'a> Inspector<'a> {
    /// Creates an inspector whose memory range maps to `memory`.
    pub fn new(store: &'a StoreOpaque, memory: Option<Memory>) -> Self {
        Self { store, memory }
    }

    /// Fills `buf` with the bytes at `addr`.
    ///
    /// # Errors
    ///
    /// Fails if the range is not entirely backed by the memory.
    pub fn read_memory(&self, addr: u64, buf: &mut [u8]) -> Result<(), MemoryAccessError> {
        let memory = self.memory.ok_or_else(MemoryAccessError::new)?;
        if addr >= CODE_BASE {
            return Err(MemoryAccessError::new());
        }
        let offset = usize::try_from(addr - MEMORY_BASE).map_err(|_| MemoryAccessError::new())?;
        memory.read(self.store, offset, buf)
    }
}

#[cfg(test)]
mod tests {
    use kwasm_parser::{Limits, MemoryType};

    use super::*;
    use crate::{Engine, Store};

    #[test]
    fn frame_view_locals() {
        let store = Store::new(&Engine::default(), ());
        let slots = [VmVal::from_i32(-3), VmVal::from_i64(7)];
        let view = FrameView {
            store: &store,
            memory: None,
            func_index: 2,
            depth: 0,
            offset: 0x20,
            base: 4,
            params: &[ValType::I32],
            locals: &[ValType::I64],
            slots: &slots,
        };

        assert_eq!(view.local_count(), 2);
        assert_eq!(view.local(0), Some(Val::I32(-3)));
        assert_eq!(view.local(1), Some(Val::I64(7)));
        assert_eq!(view.local(2), None);
        assert_eq!(view.local_address(1), Some(STACK_BASE + 5 * SLOT_SIZE));
        assert_eq!(view.code_address(), CODE_BASE + 0x20);
    }

    #[test]
    fn inspector_reads_memory() {
        let mut store = Store::new(&Engine::default(), ());
        let memory = Memory::new(
            &mut store,
            MemoryType {
                limits: Limits { min: 1, max: None },
            },
        )
        .unwrap();
        memory.write(&mut store, 8, b"abcd").unwrap();

        let inspector = Inspector::new(&store, Some(memory));
        let mut buf = [0; 4];
        inspector.read_memory(MEMORY_BASE + 8, &mut buf).unwrap();
        assert_eq!(&buf, b"abcd");
        assert!(inspector.read_memory(CODE_BASE, &mut buf).is_err());
        assert!(Inspector::new(&store, None).read_memory(0, &mut buf).is_err());
    }
}
