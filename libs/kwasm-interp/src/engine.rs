// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::type_registry::TypeRegistry;

/// Default limit for nested guest and host calls.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 1024;
/// Default capacity of the value stack in slots.
pub const DEFAULT_MAX_VALUE_STACK: usize = 1024 * 1024;
/// Default read size when decoding modules from a stream.
pub const DEFAULT_STREAM_CHUNK_SIZE: usize = kwasm_parser::DEFAULT_CHUNK_SIZE;

/// Global settings shared by everything created from one [`Engine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub(crate) max_call_depth: usize,
    pub(crate) max_value_stack: usize,
    pub(crate) stream_chunk_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_value_stack: DEFAULT_MAX_VALUE_STACK,
            stream_chunk_size: DEFAULT_STREAM_CHUNK_SIZE,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum number of active frames before calls trap with
    /// [`Trap::StackOverflow`](crate::Trap::StackOverflow).
    pub fn max_call_depth(&mut self, depth: usize) -> &mut Self {
        self.max_call_depth = depth;
        self
    }

    /// Maximum number of value stack slots (locals and operands of all
    /// active frames).
    pub fn max_value_stack(&mut self, slots: usize) -> &mut Self {
        self.max_value_stack = slots;
        self
    }

    /// Number of bytes read at a time by [`Module::from_file`](crate::Module::from_file).
    pub fn stream_chunk_size(&mut self, bytes: usize) -> &mut Self {
        self.stream_chunk_size = bytes.max(1);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Engine(Arc<EngineInner>);

#[derive(Debug)]
struct EngineInner {
    config: EngineConfig,
    type_registry: TypeRegistry,
    epoch_counter: AtomicU64,
    translations: AtomicU64,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Engine {
        Engine(Arc::new(EngineInner {
            config,
            type_registry: TypeRegistry::new(),
            epoch_counter: AtomicU64::new(0),
            translations: AtomicU64::new(0),
        }))
    }

    pub fn same(lhs: &Engine, rhs: &Engine) -> bool {
        Arc::ptr_eq(&lhs.0, &rhs.0)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.0.config
    }

    /// Returns the type registry of this engine, used to canonicalize types.
    pub fn type_registry(&self) -> &TypeRegistry {
        &self.0.type_registry
    }

    /// Advances the epoch. Stores whose deadline is reached trap with
    /// [`Trap::Interrupted`](crate::Trap::Interrupted) at the next call or
    /// loop back-edge.
    pub fn increment_epoch(&self) {
        self.0.epoch_counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn current_epoch(&self) -> u64 {
        self.0.epoch_counter.load(Ordering::Relaxed)
    }

    /// Total number of function bodies translated by this engine.
    pub fn translation_count(&self) -> u64 {
        self.0.translations.load(Ordering::Relaxed)
    }

    pub(crate) fn record_translation(&self) {
        self.0.translations.fetch_add(1, Ordering::Relaxed);
    }
}
