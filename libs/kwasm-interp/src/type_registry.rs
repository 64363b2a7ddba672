// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::sync::Arc;

use hashbrown::HashMap;
use kwasm_parser::FuncType;
use spin::RwLock;
use wasmtime_slab::Slab;

use crate::indices::SharedTypeIndex;

fn shared_type_index_to_slab_id(index: SharedTypeIndex) -> wasmtime_slab::Id {
    wasmtime_slab::Id::from_raw(index.as_u32())
}

#[inline]
fn slab_id_to_shared_type_index(id: wasmtime_slab::Id) -> SharedTypeIndex {
    SharedTypeIndex::from_u32(id.into_raw())
}

/// Engine-wide interning of function types.
///
/// Every structurally distinct [`FuncType`] is assigned exactly one
/// [`SharedTypeIndex`], so signature checks at runtime (indirect calls,
/// import matching) are a single integer comparison. Types are never
/// unregistered, the registry lives as long as its engine.
#[derive(Debug)]
pub struct TypeRegistry(RwLock<TypeRegistryInner>);

#[derive(Debug)]
struct TypeRegistryInner {
    // A hash map from a function type to its `SharedTypeIndex`. Before
    // registering a new type we check this map to reuse an identical one.
    hash_consing_map: HashMap<Arc<FuncType>, SharedTypeIndex>,
    // A map from `SharedTypeIndex::as_u32()` to the type.
    types: Slab<Arc<FuncType>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self(RwLock::new(TypeRegistryInner {
            hash_consing_map: HashMap::new(),
            types: Slab::new(),
        }))
    }

    /// Interns `ty`, returning the index of an identical, previously
    /// registered type if there is one.
    pub fn register(&self, ty: &FuncType) -> SharedTypeIndex {
        if let Some(index) = self.0.read().hash_consing_map.get(ty) {
            return *index;
        }

        let mut inner = self.0.write();
        // somebody else might have registered the type in between
        if let Some(index) = inner.hash_consing_map.get(ty) {
            return *index;
        }

        let ty = Arc::new(ty.clone());
        let index = slab_id_to_shared_type_index(inner.types.alloc(ty.clone()));
        inner.hash_consing_map.insert(ty, index);
        tracing::trace!("registered new type {index:?}");
        index
    }

    /// Returns the type for `index`, if it was registered with this registry.
    pub fn get(&self, index: SharedTypeIndex) -> Option<Arc<FuncType>> {
        self.0
            .read()
            .types
            .get(shared_type_index_to_slab_id(index))
            .cloned()
    }

    /// Number of distinct registered types.
    pub fn len(&self) -> usize {
        self.0.read().types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use kwasm_parser::ValType;

    use super::*;

    #[test]
    fn interning() {
        let registry = TypeRegistry::new();
        let a = registry.register(&FuncType::new([ValType::I32], [ValType::I64]));
        let b = registry.register(&FuncType::new([ValType::I32], [ValType::I64]));
        let c = registry.register(&FuncType::new([ValType::I64], [ValType::I32]));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.get(c).unwrap().params(),
            &[ValType::I64] as &[ValType]
        );
    }
}
