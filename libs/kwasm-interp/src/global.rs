// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use kwasm_parser::GlobalType;

use crate::Error;
use crate::store::{AsContextMut, StoreOpaque, Stored};
use crate::values::{Val, VmVal};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Global(pub(crate) Stored<GlobalData>);

#[derive(Debug)]
pub(crate) struct GlobalData {
    pub(crate) ty: GlobalType,
    pub(crate) value: VmVal,
}

impl Global {
    /// Allocates a new global with the initial value `val`.
    ///
    /// # Errors
    ///
    /// Fails if `val` does not match `ty.content`.
    pub fn new(mut store: impl AsContextMut, ty: GlobalType, val: Val) -> crate::Result<Self> {
        let store = store.as_context_mut();
        val.ensure_matches_ty(store, ty.content)?;
        Ok(Self(store.add_global(GlobalData {
            ty,
            value: val.to_vmval(),
        })))
    }

    pub fn ty(&self, store: &StoreOpaque) -> GlobalType {
        store.get_global(self.0).ty
    }

    pub fn get(&self, store: &StoreOpaque) -> Val {
        let data = store.get_global(self.0);
        Val::from_vmval(store, data.value, data.ty.content)
    }

    /// # Errors
    ///
    /// Fails if the global is immutable or `val` has the wrong type.
    pub fn set(&self, store: &mut StoreOpaque, val: Val) -> crate::Result<()> {
        let ty = self.ty(store);
        if !ty.is_mutable() {
            return Err(Error::TypeMismatch(
                "immutable global cannot be set".to_string(),
            ));
        }
        val.ensure_matches_ty(store, ty.content)?;
        store.get_global_mut(self.0).value = val.to_vmval();
        Ok(())
    }

    pub(crate) fn comes_from_same_store(&self, store: &StoreOpaque) -> bool {
        store.owns(self.0)
    }
}

#[cfg(test)]
mod tests {
    use kwasm_parser::{Mutability, ValType};

    use super::*;
    use crate::{Engine, Store};

    #[test]
    fn get_set() {
        let mut store = Store::new(&Engine::default(), ());
        let ty = GlobalType {
            content: ValType::I64,
            mutability: Mutability::Var,
        };
        let global = Global::new(&mut store, ty, Val::I64(-7)).unwrap();
        assert_eq!(global.get(&store), Val::I64(-7));

        global.set(&mut store, Val::I64(9)).unwrap();
        assert_eq!(global.get(&store), Val::I64(9));
        assert!(global.set(&mut store, Val::I32(9)).is_err());
    }

    #[test]
    fn immutable_global() {
        let mut store = Store::new(&Engine::default(), ());
        let ty = GlobalType {
            content: ValType::F32,
            mutability: Mutability::Const,
        };
        let global = Global::new(&mut store, ty, Val::from(1.0f32)).unwrap();
        assert!(matches!(
            global.set(&mut store, Val::from(2.0f32)),
            Err(Error::TypeMismatch(_))
        ));
        assert!(Global::new(&mut store, ty, Val::I32(0)).is_err());
    }
}
