// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;
use core::marker::PhantomData;

use kwasm_parser::{FuncType, ValType};
use smallvec::SmallVec;

use super::host::for_each_function_signature;
use crate::Error;
use crate::externref::ExternRef;
use crate::func::Func;
use crate::store::{AsContextMut, StoreOpaque};
use crate::values::{Val, VmVal};

/// A function whose signature was checked against `Params` and `Results`
/// once, so calls need no further type checks on the Rust side.
pub struct TypedFunc<Params, Results> {
    func: Func,
    _m: PhantomData<fn(Params) -> Results>,
}

impl<Params, Results> Clone for TypedFunc<Params, Results> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Params, Results> Copy for TypedFunc<Params, Results> {}

impl<Params, Results> fmt::Debug for TypedFunc<Params, Results> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedFunc").field("func", &self.func).finish()
    }
}

impl<Params, Results> TypedFunc<Params, Results>
where
    Params: WasmParams,
    Results: WasmResults,
{
    pub(super) fn new_unchecked(func: Func) -> Self {
        Self {
            func,
            _m: PhantomData,
        }
    }

    pub fn func(&self) -> &Func {
        &self.func
    }

    /// Calls the function.
    ///
    /// # Errors
    ///
    /// Fails if a reference argument belongs to another store, or with
    /// whatever error the execution raised.
    pub fn call<T: 'static>(
        &self,
        mut store: impl AsContextMut<Data = T>,
        params: Params,
    ) -> crate::Result<Results> {
        let store = store.as_context_mut();
        store.assert_owns(self.func.0.store_id());
        if !params.compatible_with_store(store) {
            return Err(Error::TypeMismatch(
                "argument belongs to a different store".to_string(),
            ));
        }

        let mut args = SmallVec::<[VmVal; 8]>::new();
        params.store(&mut args);
        let ret = crate::exec::invoke(store, self.func, &args)?;

        let ty = self.func.ty_arc(store);
        let vals: SmallVec<[Val; 4]> = ret
            .into_iter()
            .zip(ty.results())
            .map(|(vmval, ty)| Val::from_vmval(store, vmval, *ty))
            .collect();
        Results::load(&vals)
            .ok_or_else(|| Error::TypeMismatch("unexpected result types".to_string()))
    }
}

pub(super) fn check_signature<Params, Results>(ty: &FuncType) -> crate::Result<()>
where
    Params: WasmParams,
    Results: WasmResults,
{
    if !Params::valtypes().eq(ty.params().iter().copied()) {
        return Err(Error::TypeMismatch(format!(
            "type mismatch with parameters of {ty}"
        )));
    }
    if !Results::valtypes().eq(ty.results().iter().copied()) {
        return Err(Error::TypeMismatch(format!(
            "type mismatch with results of {ty}"
        )));
    }
    Ok(())
}

/// Rust types that correspond to a single WebAssembly value type.
pub trait WasmTy: Send + Sized + 'static {
    fn valtype() -> ValType;
    fn into_val(self) -> Val;
    /// Returns `None` if `val` has a different type.
    fn from_val(val: Val) -> Option<Self>;
    fn compatible_with_store(&self, _store: &StoreOpaque) -> bool {
        true
    }
}

macro_rules! integers {
    ($($primitive:ident/$get_primitive:ident => $ty:ident)*) => ($(
        impl WasmTy for $primitive {
            #[inline]
            fn valtype() -> ValType {
                ValType::$ty
            }
            #[inline]
            fn into_val(self) -> Val {
                Val::$ty(self)
            }
            #[inline]
            fn from_val(val: Val) -> Option<Self> {
                val.$get_primitive()
            }
        }
    )*)
}

integers! {
    i32/i32 => I32
    i64/i64 => I64
}

#[expect(
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    reason = "unsigned integers are reinterpreted"
)]
impl WasmTy for u32 {
    fn valtype() -> ValType {
        ValType::I32
    }
    fn into_val(self) -> Val {
        Val::I32(self as i32)
    }
    fn from_val(val: Val) -> Option<Self> {
        val.i32().map(|v| v as u32)
    }
}

#[expect(
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    reason = "unsigned integers are reinterpreted"
)]
impl WasmTy for u64 {
    fn valtype() -> ValType {
        ValType::I64
    }
    fn into_val(self) -> Val {
        Val::I64(self as i64)
    }
    fn from_val(val: Val) -> Option<Self> {
        val.i64().map(|v| v as u64)
    }
}

macro_rules! floats {
    ($($float:ident/$get_float:ident => $ty:ident)*) => ($(
        impl WasmTy for $float {
            #[inline]
            fn valtype() -> ValType {
                ValType::$ty
            }
            #[inline]
            fn into_val(self) -> Val {
                Val::from(self)
            }
            #[inline]
            fn from_val(val: Val) -> Option<Self> {
                val.$get_float()
            }
        }
    )*)
}

floats! {
    f32/f32 => F32
    f64/f64 => F64
}

impl WasmTy for u128 {
    fn valtype() -> ValType {
        ValType::V128
    }
    fn into_val(self) -> Val {
        Val::V128(self)
    }
    fn from_val(val: Val) -> Option<Self> {
        val.v128()
    }
}

impl WasmTy for Option<Func> {
    fn valtype() -> ValType {
        ValType::FuncRef
    }
    fn into_val(self) -> Val {
        Val::FuncRef(self)
    }
    fn from_val(val: Val) -> Option<Self> {
        val.func_ref()
    }
    fn compatible_with_store(&self, store: &StoreOpaque) -> bool {
        self.is_none_or(|f| f.comes_from_same_store(store))
    }
}

/// A non-null function reference. Receiving a null reference where a
/// `Func` is expected is a type mismatch.
impl WasmTy for Func {
    fn valtype() -> ValType {
        ValType::FuncRef
    }
    fn into_val(self) -> Val {
        Val::FuncRef(Some(self))
    }
    fn from_val(val: Val) -> Option<Self> {
        val.func_ref().flatten()
    }
    fn compatible_with_store(&self, store: &StoreOpaque) -> bool {
        self.comes_from_same_store(store)
    }
}

impl WasmTy for Option<ExternRef> {
    fn valtype() -> ValType {
        ValType::ExternRef
    }
    fn into_val(self) -> Val {
        Val::ExternRef(self)
    }
    fn from_val(val: Val) -> Option<Self> {
        val.extern_ref()
    }
    fn compatible_with_store(&self, store: &StoreOpaque) -> bool {
        self.is_none_or(|e| e.comes_from_same_store(store))
    }
}

/// Argument lists of typed calls.
pub trait WasmParams: Send {
    fn valtypes() -> impl Iterator<Item = ValType>;
    fn compatible_with_store(&self, store: &StoreOpaque) -> bool;
    #[doc(hidden)]
    fn store(self, out: &mut SmallVec<[VmVal; 8]>);
}

/// Result lists of typed calls.
pub trait WasmResults: Sized {
    fn valtypes() -> impl Iterator<Item = ValType>;
    #[doc(hidden)]
    fn load(vals: &[Val]) -> Option<Self>;
}

impl<T: WasmTy> WasmParams for T {
    fn valtypes() -> impl Iterator<Item = ValType> {
        core::iter::once(T::valtype())
    }
    fn compatible_with_store(&self, store: &StoreOpaque) -> bool {
        WasmTy::compatible_with_store(self, store)
    }
    fn store(self, out: &mut SmallVec<[VmVal; 8]>) {
        out.push(self.into_val().to_vmval());
    }
}

impl<T: WasmTy> WasmResults for T {
    fn valtypes() -> impl Iterator<Item = ValType> {
        core::iter::once(T::valtype())
    }
    fn load(vals: &[Val]) -> Option<Self> {
        match vals {
            [val] => T::from_val(*val),
            _ => None,
        }
    }
}

macro_rules! impl_wasm_params_results {
    ($n:tt $($t:ident)*) => {
        #[allow(non_snake_case, reason = "argument names above are uppercase")]
        impl<$($t: WasmTy,)*> WasmParams for ($($t,)*) {
            fn valtypes() -> impl Iterator<Item = ValType> {
                IntoIterator::into_iter([$($t::valtype(),)*])
            }

            fn compatible_with_store(&self, _store: &StoreOpaque) -> bool {
                let ($($t,)*) = self;
                true $(&& WasmTy::compatible_with_store($t, _store))*
            }

            fn store(self, _out: &mut SmallVec<[VmVal; 8]>) {
                let ($($t,)*) = self;
                $(_out.push($t.into_val().to_vmval());)*
            }
        }

        #[allow(non_snake_case, reason = "argument names above are uppercase")]
        #[allow(clippy::unused_unit, unused_mut, reason = "macro quirk")]
        impl<$($t: WasmTy,)*> WasmResults for ($($t,)*) {
            fn valtypes() -> impl Iterator<Item = ValType> {
                IntoIterator::into_iter([$($t::valtype(),)*])
            }

            fn load(vals: &[Val]) -> Option<Self> {
                if vals.len() != $n {
                    return None;
                }
                let mut _vals = vals.iter();
                Some(($($t::from_val(*_vals.next()?)?,)*))
            }
        }
    };
}
for_each_function_signature!(impl_wasm_params_results);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Engine, Store};

    #[test]
    fn signature_checks() {
        let ty = FuncType::new([ValType::I32, ValType::I64], [ValType::F32]);
        assert!(check_signature::<(i32, i64), f32>(&ty).is_ok());
        assert!(check_signature::<(u32, u64), (f32,)>(&ty).is_ok());
        assert!(check_signature::<(i32,), f32>(&ty).is_err());
        assert!(check_signature::<(i32, i64), ()>(&ty).is_err());
    }

    #[test]
    fn typed_host_call() {
        let mut store = Store::new(&Engine::default(), ());
        let swap = Func::wrap(&mut store, |a: i32, b: i64| (b, a));

        let typed = swap.typed::<(i32, i64), (i64, i32)>(&store).unwrap();
        assert_eq!(typed.call(&mut store, (1, 2)).unwrap(), (2, 1));
        assert!(swap.typed::<(i32, i32), (i64, i32)>(&store).is_err());
    }

    #[test]
    fn func_refs() {
        let mut store = Store::new(&Engine::default(), ());
        let nop = Func::wrap(&mut store, || {});
        let id = Func::wrap(&mut store, |f: Option<Func>| f);

        let typed = id.typed::<Option<Func>, Option<Func>>(&store).unwrap();
        assert_eq!(typed.call(&mut store, Some(nop)).unwrap(), Some(nop));
        assert_eq!(typed.call(&mut store, None).unwrap(), None);
    }
}
