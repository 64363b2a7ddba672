// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::any::Any;
use core::fmt;
use core::ops::{Deref, DerefMut};
use std::sync::Arc;

use kwasm_parser::{FuncType, ValType};

use crate::func::typed::WasmTy;
use crate::func::{Func, FuncData, FuncKind};
use crate::indices::SharedTypeIndex;
use crate::instance::Instance;
use crate::memory::Memory;
use crate::store::{AsContextMut, StoreInner, StoreOpaque};
use crate::values::Val;
use crate::{Engine, Error, Extern};

type HostFnBox<T> =
    Box<dyn Fn(Caller<'_, T>, &[Val], &mut [Val]) -> anyhow::Result<()> + Send + Sync>;

/// A host function that is not yet bound to a store.
///
/// The same `HostFunc` can be turned into a [`Func`] in any number of stores
/// whose data type matches the one it was created for.
pub struct HostFunc {
    ty: Arc<FuncType>,
    type_id: SharedTypeIndex,
    /// A `HostFnBox<T>` for the store data type `T`.
    func: Box<dyn Any + Send + Sync>,
}

impl HostFunc {
    pub fn new<T: 'static>(
        engine: &Engine,
        ty: FuncType,
        func: impl Fn(Caller<'_, T>, &[Val], &mut [Val]) -> anyhow::Result<()>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        let type_id = engine.type_registry().register(&ty);
        let func: HostFnBox<T> = Box::new(func);
        Self {
            ty: Arc::new(ty),
            type_id,
            func: Box::new(func),
        }
    }

    pub fn wrap<T: 'static, Params, Results>(
        engine: &Engine,
        func: impl IntoFunc<T, Params, Results>,
    ) -> Self {
        func.into_func(engine)
    }

    fn from_closure<T, F, Params, Results>(engine: &Engine, func: F) -> Self
    where
        T: 'static,
        F: Fn(Caller<'_, T>, Params) -> Results + Send + Sync + 'static,
        Params: HostParams,
        Results: HostResults,
    {
        let ty = FuncType::new(Params::valtypes(), Results::valtypes());
        Self::new(engine, ty, move |mut caller, params, results| {
            let params = Params::load(params).ok_or_else(|| {
                Error::TypeMismatch("host function received mistyped arguments".to_string())
            })?;
            let ret = func(caller.sub_caller(), params);
            if !ret.compatible_with_store(&caller) {
                anyhow::bail!("host function attempted to return cross-`Store` value to Wasm");
            }
            ret.store(results)
        })
    }

    pub fn ty(&self) -> &FuncType {
        &self.ty
    }

    /// Allocates a function in `store` that calls this host function.
    pub fn to_func<T: 'static>(self: Arc<Self>, mut store: impl AsContextMut<Data = T>) -> Func {
        let store = store.as_context_mut();
        Func(store.add_function(FuncData {
            ty: self.ty.clone(),
            type_id: self.type_id,
            kind: FuncKind::Host(self),
        }))
    }

    /// Runs the host closure.
    ///
    /// Errors raised by nested wasm calls inside the closure are passed
    /// through unchanged, everything else is wrapped in [`Error::Host`].
    pub(crate) fn call<T: 'static>(
        &self,
        store: &mut StoreInner<T>,
        caller: Option<Instance>,
        params: &[Val],
        results: &mut [Val],
    ) -> crate::Result<()> {
        let Some(func) = self.func.downcast_ref::<HostFnBox<T>>() else {
            return Err(Error::TypeMismatch(
                "host function was created for a different store data type".to_string(),
            ));
        };

        func(Caller { store, caller }, params, results).map_err(|err| {
            match err.downcast::<Error>() {
                Ok(err) => err,
                Err(err) => Error::Host(err),
            }
        })
    }
}

impl fmt::Debug for HostFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunc")
            .field("ty", &self.ty)
            .field("type_id", &self.type_id)
            .finish_non_exhaustive()
    }
}

/// The context a host function is called in.
///
/// Gives access to the store's data and objects, and to the exports of the
/// instance whose code called the host function.
pub struct Caller<'a, T> {
    pub(crate) store: &'a mut StoreInner<T>,
    pub(crate) caller: Option<Instance>,
}

impl<T> Caller<'_, T> {
    pub fn data(&self) -> &T {
        &self.store.data
    }

    pub fn data_mut(&mut self) -> &mut T {
        &mut self.store.data
    }

    pub fn engine(&self) -> &Engine {
        self.store.engine()
    }

    /// The instance that called this host function, `None` if the host
    /// called it directly.
    pub fn instance(&self) -> Option<Instance> {
        self.caller
    }

    /// Looks up an export of the calling instance.
    pub fn get_export(&self, name: &str) -> Option<Extern> {
        self.caller?.get_export(self, name)
    }

    pub fn get_memory(&self, name: &str) -> Option<Memory> {
        self.get_export(name)?.into_memory()
    }

    fn sub_caller(&mut self) -> Caller<'_, T> {
        Caller {
            store: self.store,
            caller: self.caller,
        }
    }
}

impl<T> Deref for Caller<'_, T> {
    type Target = StoreOpaque;

    fn deref(&self) -> &Self::Target {
        &self.store.opaque
    }
}

impl<T> DerefMut for Caller<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.store.opaque
    }
}

impl<T> AsContextMut for Caller<'_, T> {
    type Data = T;

    fn as_context_mut(&mut self) -> &mut StoreInner<T> {
        self.store
    }
}

/// Rust closures that can be used as host functions.
///
/// Implemented for closures of up to 16 [`WasmTy`] arguments, optionally
/// preceded by a [`Caller`], returning a [`HostResults`].
pub trait IntoFunc<T, Params, Results>: Send + Sync + 'static {
    #[doc(hidden)]
    fn into_func(self, engine: &Engine) -> HostFunc;
}

/// Argument lists of host functions.
pub trait HostParams: Sized {
    fn valtypes() -> impl Iterator<Item = ValType>;
    /// Converts the arguments, returns `None` if they have the wrong types.
    fn load(values: &[Val]) -> Option<Self>;
}

/// Return types of host functions.
pub trait HostResults {
    fn valtypes() -> impl Iterator<Item = ValType>;
    /// Writes the results to `out`, or returns the error the host function
    /// failed with.
    fn store(self, out: &mut [Val]) -> anyhow::Result<()>;
    fn compatible_with_store(&self, store: &StoreOpaque) -> bool;
}

macro_rules! for_each_function_signature {
    ($mac:ident) => {
        $mac!(0);
        $mac!(1 A1);
        $mac!(2 A1 A2);
        $mac!(3 A1 A2 A3);
        $mac!(4 A1 A2 A3 A4);
        $mac!(5 A1 A2 A3 A4 A5);
        $mac!(6 A1 A2 A3 A4 A5 A6);
        $mac!(7 A1 A2 A3 A4 A5 A6 A7);
        $mac!(8 A1 A2 A3 A4 A5 A6 A7 A8);
        $mac!(9 A1 A2 A3 A4 A5 A6 A7 A8 A9);
        $mac!(10 A1 A2 A3 A4 A5 A6 A7 A8 A9 A10);
        $mac!(11 A1 A2 A3 A4 A5 A6 A7 A8 A9 A10 A11);
        $mac!(12 A1 A2 A3 A4 A5 A6 A7 A8 A9 A10 A11 A12);
        $mac!(13 A1 A2 A3 A4 A5 A6 A7 A8 A9 A10 A11 A12 A13);
        $mac!(14 A1 A2 A3 A4 A5 A6 A7 A8 A9 A10 A11 A12 A13 A14);
        $mac!(15 A1 A2 A3 A4 A5 A6 A7 A8 A9 A10 A11 A12 A13 A14 A15);
        $mac!(16 A1 A2 A3 A4 A5 A6 A7 A8 A9 A10 A11 A12 A13 A14 A15 A16);
    };
}
pub(crate) use for_each_function_signature;

macro_rules! impl_into_func {
    ($num:tt $($args:ident)*) => {
        #[allow(non_snake_case, reason = "argument names above are uppercase")]
        impl<T, F, $($args,)* Results> IntoFunc<T, ($($args,)*), Results> for F
        where
            T: 'static,
            F: Fn($($args),*) -> Results + Send + Sync + 'static,
            $($args: WasmTy,)*
            Results: HostResults,
        {
            fn into_func(self, engine: &Engine) -> HostFunc {
                HostFunc::from_closure(engine, move |_: Caller<'_, T>, ($($args,)*)| {
                    self($($args),*)
                })
            }
        }

        #[allow(non_snake_case, reason = "argument names above are uppercase")]
        impl<T, F, $($args,)* Results> IntoFunc<T, (Caller<'_, T>, $($args,)*), Results> for F
        where
            T: 'static,
            F: Fn(Caller<'_, T>, $($args),*) -> Results + Send + Sync + 'static,
            $($args: WasmTy,)*
            Results: HostResults,
        {
            fn into_func(self, engine: &Engine) -> HostFunc {
                HostFunc::from_closure(engine, move |caller: Caller<'_, T>, ($($args,)*)| {
                    self(caller, $($args),*)
                })
            }
        }
    };
}
for_each_function_signature!(impl_into_func);

macro_rules! impl_host_params {
    ($n:tt $($t:ident)*) => {
        #[allow(non_snake_case, reason = "argument names above are uppercase")]
        #[allow(clippy::unused_unit, unused_mut, reason = "macro quirk")]
        impl<$($t: WasmTy,)*> HostParams for ($($t,)*) {
            fn valtypes() -> impl Iterator<Item = ValType> {
                IntoIterator::into_iter([$($t::valtype(),)*])
            }

            fn load(values: &[Val]) -> Option<Self> {
                let mut _values = values.iter();
                let ret = ($($t::from_val(*_values.next()?)?,)*);
                Some(ret)
            }
        }
    };
}
for_each_function_signature!(impl_host_params);

impl<T: WasmTy> HostResults for T {
    fn valtypes() -> impl Iterator<Item = ValType> {
        core::iter::once(T::valtype())
    }

    fn store(self, out: &mut [Val]) -> anyhow::Result<()> {
        let Some(slot) = out.first_mut() else {
            anyhow::bail!("missing result slot");
        };
        *slot = self.into_val();
        Ok(())
    }

    fn compatible_with_store(&self, store: &StoreOpaque) -> bool {
        WasmTy::compatible_with_store(self, store)
    }
}

impl<T: HostResults> HostResults for anyhow::Result<T> {
    fn valtypes() -> impl Iterator<Item = ValType> {
        T::valtypes()
    }

    fn store(self, out: &mut [Val]) -> anyhow::Result<()> {
        self.and_then(|val| val.store(out))
    }

    fn compatible_with_store(&self, store: &StoreOpaque) -> bool {
        match self {
            Ok(val) => val.compatible_with_store(store),
            Err(_) => true,
        }
    }
}

macro_rules! impl_host_results {
    ($n:tt $($t:ident)*) => {
        #[allow(non_snake_case, unused_mut, reason = "argument names above are uppercase")]
        impl<$($t: WasmTy,)*> HostResults for ($($t,)*) {
            fn valtypes() -> impl Iterator<Item = ValType> {
                IntoIterator::into_iter([$($t::valtype(),)*])
            }

            fn store(self, _out: &mut [Val]) -> anyhow::Result<()> {
                let ($($t,)*) = self;
                let mut _slots = _out.iter_mut();
                $(
                    let Some(slot) = _slots.next() else {
                        anyhow::bail!("missing result slot");
                    };
                    *slot = $t.into_val();
                )*
                Ok(())
            }

            fn compatible_with_store(&self, _store: &StoreOpaque) -> bool {
                let ($($t,)*) = self;
                true $(&& WasmTy::compatible_with_store($t, _store))*
            }
        }
    };
}
for_each_function_signature!(impl_host_results);
