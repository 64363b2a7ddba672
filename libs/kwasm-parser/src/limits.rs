// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Implementation limits that bound allocations made while decoding
//! untrusted input.

pub const MAX_WASM_TYPES: usize = 1_000_000;
pub const MAX_WASM_FUNCTIONS: usize = 1_000_000;
pub const MAX_WASM_IMPORTS: usize = 100_000;
pub const MAX_WASM_EXPORTS: usize = 100_000;
pub const MAX_WASM_GLOBALS: usize = 1_000_000;
pub const MAX_WASM_ELEMENT_SEGMENTS: usize = 100_000;
pub const MAX_WASM_DATA_SEGMENTS: usize = 100_000;
pub const MAX_WASM_TABLES: usize = 100;
pub const MAX_WASM_MEMORIES: usize = 100;
pub const MAX_WASM_STRING_SIZE: usize = 100_000;
pub const MAX_WASM_FUNCTION_SIZE: usize = 7_654_321;
pub const MAX_WASM_FUNCTION_LOCALS: usize = 50_000;
pub const MAX_WASM_FUNCTION_PARAMS: usize = 1_000;
pub const MAX_WASM_FUNCTION_RETURNS: usize = 1_000;
pub const MAX_WASM_BR_TABLE_SIZE: usize = MAX_WASM_FUNCTION_SIZE;
pub const MAX_WASM_TABLE_ENTRIES: usize = 10_000_000;
pub const MAX_WASM_ELEMENT_ITEMS: usize = MAX_WASM_TABLE_ENTRIES;
pub const MAX_WASM_NAMES: usize = MAX_WASM_FUNCTIONS;

/// Maximum number of 64 KiB pages a 32-bit linear memory may declare.
pub const MAX_WASM32_MEMORY_PAGES: u32 = 1 << 16;

/// Sizes used for pre-allocating vectors are clamped to this, the rest is
/// grown on demand as items are actually decoded.
pub(crate) const MAX_PREALLOCATION: usize = 1024;
