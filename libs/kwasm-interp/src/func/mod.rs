// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

mod host;
mod typed;

use std::sync::Arc;

use kwasm_parser::FuncType;
use smallvec::SmallVec;

pub use host::{Caller, HostFunc, HostParams, HostResults, IntoFunc};
pub use typed::{TypedFunc, WasmParams, WasmResults, WasmTy};

use crate::Error;
use crate::indices::{DefinedFuncIndex, FuncIndex, SharedTypeIndex};
use crate::instance::Instance;
use crate::module::Module;
use crate::store::{AsContextMut, StoreOpaque, Stored};
use crate::values::{Val, VmVal};

/// A WebAssembly function, either defined by a module or by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Func(pub(crate) Stored<FuncData>);

#[derive(Debug)]
pub(crate) struct FuncData {
    pub(crate) ty: Arc<FuncType>,
    /// The engine-wide id of `ty`, used for indirect call signature checks.
    pub(crate) type_id: SharedTypeIndex,
    pub(crate) kind: FuncKind,
}

#[derive(Debug)]
pub(crate) enum FuncKind {
    Wasm {
        instance: Instance,
        module: Module,
        def_index: DefinedFuncIndex,
    },
    Host(Arc<HostFunc>),
}

impl FuncKind {
    pub(crate) fn func_index(&self) -> Option<FuncIndex> {
        match self {
            FuncKind::Wasm {
                module, def_index, ..
            } => Some(module.translated().func_index(*def_index)),
            FuncKind::Host(_) => None,
        }
    }
}

impl Func {
    /// Creates a host function with a dynamically typed signature.
    ///
    /// `func` receives the arguments and fills in `results`, which is
    /// pre-populated with default values of the declared result types.
    pub fn new<T: 'static>(
        mut store: impl AsContextMut<Data = T>,
        ty: FuncType,
        func: impl Fn(Caller<'_, T>, &[Val], &mut [Val]) -> anyhow::Result<()>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        let store = store.as_context_mut();
        let host = HostFunc::new(store.engine(), ty, func);
        Arc::new(host).to_func(store)
    }

    /// Creates a host function from a Rust closure, deriving the signature
    /// from its parameter and result types.
    ///
    /// The closure may take a [`Caller`] as its first argument to access the
    /// store and the calling instance.
    pub fn wrap<T: 'static, Params, Results>(
        mut store: impl AsContextMut<Data = T>,
        func: impl IntoFunc<T, Params, Results>,
    ) -> Self {
        let store = store.as_context_mut();
        let host = HostFunc::wrap(store.engine(), func);
        Arc::new(host).to_func(store)
    }

    pub fn ty(&self, store: &StoreOpaque) -> FuncType {
        FuncType::clone(&store.get_function(self.0).ty)
    }

    pub(crate) fn ty_arc(&self, store: &StoreOpaque) -> Arc<FuncType> {
        store.get_function(self.0).ty.clone()
    }

    /// Calls this function with `params`, writing its results to `results`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the number or types of `params`
    /// or the length of `results` do not match the signature. Any error
    /// raised while executing (a trap, a translation error or a host error)
    /// is returned as is.
    pub fn call<T: 'static>(
        &self,
        mut store: impl AsContextMut<Data = T>,
        params: &[Val],
        results: &mut [Val],
    ) -> crate::Result<()> {
        let store = store.as_context_mut();
        store.assert_owns(self.0.store_id());
        let ty = self.ty_arc(store);

        if params.len() != ty.params().len() {
            return Err(Error::TypeMismatch(format!(
                "expected {} arguments, got {}",
                ty.params().len(),
                params.len()
            )));
        }
        if results.len() != ty.results().len() {
            return Err(Error::TypeMismatch(format!(
                "expected {} results, got {}",
                ty.results().len(),
                results.len()
            )));
        }

        let mut args = SmallVec::<[VmVal; 8]>::with_capacity(params.len());
        for (param, expected) in params.iter().zip(ty.params()) {
            param.ensure_matches_ty(store, *expected)?;
            args.push(param.to_vmval());
        }

        let ret = crate::exec::invoke(store, *self, &args)?;
        for ((slot, vmval), ty) in results.iter_mut().zip(ret).zip(ty.results()) {
            *slot = Val::from_vmval(store, vmval, *ty);
        }
        Ok(())
    }

    /// Checks the signature once and returns a statically typed view of
    /// this function.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if `Params` or `Results` do not match
    /// the function's signature.
    pub fn typed<Params, Results>(
        &self,
        store: &StoreOpaque,
    ) -> crate::Result<TypedFunc<Params, Results>>
    where
        Params: WasmParams,
        Results: WasmResults,
    {
        let ty = self.ty_arc(store);
        typed::check_signature::<Params, Results>(&ty)?;
        Ok(TypedFunc::new_unchecked(*self))
    }

    /// Index of the function in the function index space of its module, for
    /// functions defined by a module.
    pub fn module_index(&self, store: &StoreOpaque) -> Option<u32> {
        store
            .get_function(self.0)
            .kind
            .func_index()
            .map(|index| index.as_u32())
    }

    pub(crate) fn arena_index(self) -> usize {
        self.0.index()
    }

    pub(crate) fn comes_from_same_store(&self, store: &StoreOpaque) -> bool {
        store.owns(self.0)
    }
}

#[cfg(test)]
mod tests {
    use kwasm_parser::ValType;

    use super::*;
    use crate::{Engine, Store};

    #[test]
    fn call_host_function() {
        let mut store = Store::new(&Engine::default(), 10_i32);
        let add = Func::wrap(&mut store, |caller: Caller<'_, i32>, a: i32| a + *caller.data());

        let mut results = [Val::I32(0)];
        add.call(&mut store, &[Val::I32(5)], &mut results).unwrap();
        assert_eq!(results[0], Val::I32(15));
        assert_eq!(
            add.ty(&store),
            FuncType::new([ValType::I32], [ValType::I32])
        );
        assert_eq!(add.module_index(&store), None);
    }

    #[test]
    fn arguments_are_checked() {
        let mut store = Store::new(&Engine::default(), ());
        let f = Func::wrap(&mut store, |a: i64| a);

        let mut results = [Val::I64(0)];
        assert!(matches!(
            f.call(&mut store, &[Val::I32(1)], &mut results),
            Err(Error::TypeMismatch(_))
        ));
        assert!(matches!(
            f.call(&mut store, &[], &mut results),
            Err(Error::TypeMismatch(_))
        ));
        assert!(matches!(
            f.call(&mut store, &[Val::I64(1)], &mut []),
            Err(Error::TypeMismatch(_))
        ));
    }

    #[test]
    fn dynamic_host_function() {
        let mut store = Store::new(&Engine::default(), ());
        let ty = FuncType::new([ValType::F64, ValType::F64], [ValType::F64]);
        let mul = Func::new(&mut store, ty, |_, params, results| {
            results[0] = Val::from(params[0].unwrap_f64() * params[1].unwrap_f64());
            Ok(())
        });

        let mut results = [Val::F64(0)];
        mul.call(
            &mut store,
            &[Val::from(1.5_f64), Val::from(4.0_f64)],
            &mut results,
        )
        .unwrap();
        assert_eq!(results[0].unwrap_f64(), 6.0);
    }

    #[test]
    fn host_results_are_checked() {
        let mut store = Store::new(&Engine::default(), ());
        let ty = FuncType::new([], [ValType::I32]);
        let bad = Func::new(&mut store, ty, |_, _, results| {
            results[0] = Val::I64(1);
            Ok(())
        });

        let mut results = [Val::I32(0)];
        assert!(matches!(
            bad.call(&mut store, &[], &mut results),
            Err(Error::TypeMismatch(_))
        ));
    }

    #[test]
    fn host_errors_are_surfaced() {
        let mut store = Store::new(&Engine::default(), ());
        let fail = Func::wrap(&mut store, || -> anyhow::Result<()> {
            anyhow::bail!("host gave up")
        });

        let err = fail.call(&mut store, &[], &mut []).unwrap_err();
        assert!(matches!(&err, Error::Host(e) if e.to_string() == "host gave up"));
    }
}
