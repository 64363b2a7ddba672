// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;

use kwasm_parser::{RefType, ValType};
use static_assertions::const_assert_eq;

use crate::externref::ExternRef;
use crate::func::Func;
use crate::store::StoreOpaque;
use crate::utils::variant_accessors;

/// Possible runtime values that a WebAssembly module can either consume or
/// produce.
///
/// Note that we inline the `enum Ref { ... }` variants into `enum Val { ... }`
/// here as a size optimization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Val {
    /// A 32-bit integer.
    I32(i32),

    /// A 64-bit integer.
    I64(i64),

    /// A 32-bit float.
    ///
    /// Note that the raw bits of the float are stored here, and you can use
    /// `f32::from_bits` to create an `f32` value.
    F32(u32),

    /// A 64-bit float.
    ///
    /// Note that the raw bits of the float are stored here, and you can use
    /// `f64::from_bits` to create an `f64` value.
    F64(u64),

    /// A 128-bit vector, as raw little-endian bits.
    V128(u128),

    /// A function reference.
    FuncRef(Option<Func>),

    /// An external reference.
    ExternRef(Option<ExternRef>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ref {
    /// A first-class reference to a WebAssembly function.
    ///
    /// The host can create function references via [`Func::new`] or
    /// [`Func::wrap`]. The guest can create non-null function references via
    /// the `ref.func` instruction, or null references via `ref.null func`.
    Func(Option<Func>),
    /// A reference to a value outside of the Wasm heap.
    ///
    /// These references are opaque to the guest. It can only pass them
    /// around, store them in globals and tables, and test them for null.
    Extern(Option<ExternRef>),
}

// === impl Val ===

impl Val {
    /// Returns the null reference of the given type.
    #[inline]
    pub fn null_ref(ty: RefType) -> Val {
        Ref::null(ty).into()
    }

    /// Returns the default (zero or null) value for the given type.
    pub fn default_for_ty(ty: ValType) -> Val {
        match ty {
            ValType::I32 => Val::I32(0),
            ValType::I64 => Val::I64(0),
            ValType::F32 => Val::F32(0),
            ValType::F64 => Val::F64(0),
            ValType::V128 => Val::V128(0),
            ValType::FuncRef => Val::FuncRef(None),
            ValType::ExternRef => Val::ExternRef(None),
        }
    }

    /// Returns the corresponding [`ValType`] for this `Val`.
    #[inline]
    pub fn ty(&self) -> ValType {
        match self {
            Val::I32(_) => ValType::I32,
            Val::I64(_) => ValType::I64,
            Val::F32(_) => ValType::F32,
            Val::F64(_) => ValType::F64,
            Val::V128(_) => ValType::V128,
            Val::FuncRef(_) => ValType::FuncRef,
            Val::ExternRef(_) => ValType::ExternRef,
        }
    }

    pub(crate) fn ensure_matches_ty(&self, store: &StoreOpaque, ty: ValType) -> crate::Result<()> {
        if self.ty() != ty {
            return Err(crate::Error::TypeMismatch(format!(
                "expected {ty}, found {}",
                self.ty()
            )));
        }
        if !self.comes_from_same_store(store) {
            return Err(crate::Error::TypeMismatch(
                "reference belongs to a different store".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn comes_from_same_store(&self, store: &StoreOpaque) -> bool {
        match self {
            Val::FuncRef(Some(f)) => f.comes_from_same_store(store),
            Val::ExternRef(Some(e)) => e.comes_from_same_store(store),
            _ => true,
        }
    }

    /// Lowers this value into an untyped stack slot.
    pub(crate) fn to_vmval(self) -> VmVal {
        match self {
            Val::I32(v) => VmVal::from_i32(v),
            Val::I64(v) => VmVal::from_i64(v),
            Val::F32(bits) => VmVal::from_u32(bits),
            Val::F64(bits) => VmVal::from_u64(bits),
            Val::V128(bits) => VmVal(bits),
            Val::FuncRef(f) => VmVal::from_ref(f.map(Func::arena_index)),
            Val::ExternRef(e) => VmVal::from_ref(e.map(ExternRef::arena_index)),
        }
    }

    /// Lifts an untyped stack slot into a value of type `ty`.
    pub(crate) fn from_vmval(store: &StoreOpaque, vmval: VmVal, ty: ValType) -> Self {
        match ty {
            ValType::I32 => Val::I32(vmval.as_i32()),
            ValType::I64 => Val::I64(vmval.as_i64()),
            ValType::F32 => Val::F32(vmval.as_u32()),
            ValType::F64 => Val::F64(vmval.as_u64()),
            ValType::V128 => Val::V128(vmval.0),
            ValType::FuncRef => Val::FuncRef(vmval.as_ref().map(|i| store.func_at(i))),
            ValType::ExternRef => Val::ExternRef(vmval.as_ref().map(|i| store.extern_ref_at(i))),
        }
    }

    variant_accessors! {
        e
        (I32(i32) is_i32 i32 unwrap_i32 => *e)
        (I64(i64) is_i64 i64 unwrap_i64 => *e)
        (F32(f32) is_f32 f32 unwrap_f32 => f32::from_bits(*e))
        (F64(f64) is_f64 f64 unwrap_f64 => f64::from_bits(*e))
        (V128(u128) is_v128 v128 unwrap_v128 => *e)
        (FuncRef(Option<Func>) is_func_ref func_ref unwrap_func_ref => *e)
        (ExternRef(Option<ExternRef>) is_extern_ref extern_ref unwrap_extern_ref => *e)
    }
}

impl From<i32> for Val {
    #[inline]
    fn from(val: i32) -> Val {
        Val::I32(val)
    }
}

impl From<i64> for Val {
    #[inline]
    fn from(val: i64) -> Val {
        Val::I64(val)
    }
}

impl From<f32> for Val {
    #[inline]
    fn from(val: f32) -> Val {
        Val::F32(val.to_bits())
    }
}

impl From<f64> for Val {
    #[inline]
    fn from(val: f64) -> Val {
        Val::F64(val.to_bits())
    }
}

impl From<u128> for Val {
    #[inline]
    fn from(val: u128) -> Val {
        Val::V128(val)
    }
}

impl From<Ref> for Val {
    #[inline]
    fn from(val: Ref) -> Val {
        match val {
            Ref::Func(f) => Val::FuncRef(f),
            Ref::Extern(e) => Val::ExternRef(e),
        }
    }
}

impl From<Func> for Val {
    #[inline]
    fn from(val: Func) -> Val {
        Val::FuncRef(Some(val))
    }
}

impl From<Option<Func>> for Val {
    #[inline]
    fn from(val: Option<Func>) -> Val {
        Val::FuncRef(val)
    }
}

impl From<ExternRef> for Val {
    #[inline]
    fn from(val: ExternRef) -> Val {
        Val::ExternRef(Some(val))
    }
}

// === impl Ref ===

impl From<Func> for Ref {
    #[inline]
    fn from(f: Func) -> Ref {
        Ref::Func(Some(f))
    }
}

impl From<Option<Func>> for Ref {
    #[inline]
    fn from(f: Option<Func>) -> Ref {
        Ref::Func(f)
    }
}

impl Ref {
    /// Create a null reference of the given type.
    #[inline]
    pub fn null(ty: RefType) -> Self {
        match ty {
            RefType::FuncRef => Ref::Func(None),
            RefType::ExternRef => Ref::Extern(None),
        }
    }

    /// Is this a null reference?
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Ref::Func(None) | Ref::Extern(None))
    }

    /// Is this a non-null reference?
    #[inline]
    pub fn is_non_null(&self) -> bool {
        !self.is_null()
    }

    pub fn ty(&self) -> RefType {
        match self {
            Ref::Func(_) => RefType::FuncRef,
            Ref::Extern(_) => RefType::ExternRef,
        }
    }

    pub(crate) fn from_val(val: Val) -> Option<Self> {
        match val {
            Val::FuncRef(f) => Some(Ref::Func(f)),
            Val::ExternRef(e) => Some(Ref::Extern(e)),
            _ => None,
        }
    }
}

/// An untyped 16-byte value stack slot.
///
/// The interpreter never tags slots, the static types of the instruction
/// sequence determine how a slot is read. Numbers are stored zero-extended
/// in the low bits, references as their arena index plus one so that zero is
/// the null reference.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct VmVal(pub(crate) u128);
const_assert_eq!(size_of::<VmVal>(), 16);

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    reason = "slots are reinterpreted bit patterns"
)]
impl VmVal {
    pub const ZERO: VmVal = VmVal(0);

    #[inline]
    pub fn from_i32(v: i32) -> Self {
        Self(u128::from(v as u32))
    }
    #[inline]
    pub fn from_u32(v: u32) -> Self {
        Self(u128::from(v))
    }
    #[inline]
    pub fn from_i64(v: i64) -> Self {
        Self(u128::from(v as u64))
    }
    #[inline]
    pub fn from_u64(v: u64) -> Self {
        Self(u128::from(v))
    }
    #[inline]
    pub fn from_f32(v: f32) -> Self {
        Self::from_u32(v.to_bits())
    }
    #[inline]
    pub fn from_f64(v: f64) -> Self {
        Self::from_u64(v.to_bits())
    }
    #[inline]
    pub fn from_bool(v: bool) -> Self {
        Self(u128::from(v))
    }
    #[inline]
    pub fn from_ref(index: Option<usize>) -> Self {
        Self(index.map_or(0, |i| i as u128 + 1))
    }

    #[inline]
    pub fn as_i32(self) -> i32 {
        self.0 as u32 as i32
    }
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0 as u32
    }
    #[inline]
    pub fn as_i64(self) -> i64 {
        self.0 as u64 as i64
    }
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0 as u64
    }
    #[inline]
    pub fn as_f32(self) -> f32 {
        f32::from_bits(self.as_u32())
    }
    #[inline]
    pub fn as_f64(self) -> f64 {
        f64::from_bits(self.as_u64())
    }
    #[inline]
    pub fn as_ref(self) -> Option<usize> {
        self.0.checked_sub(1).map(|i| i as usize)
    }
    #[inline]
    pub fn is_null_ref(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for VmVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VmVal({:#x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vmval_sign_handling() {
        assert_eq!(VmVal::from_i32(-1).as_i32(), -1);
        assert_eq!(VmVal::from_i32(-1).as_u32(), u32::MAX);
        // i32 slots are zero-extended, never sign-extended
        assert_eq!(VmVal::from_i32(-1).as_u64(), u64::from(u32::MAX));
        assert_eq!(VmVal::from_i64(i64::MIN).as_i64(), i64::MIN);
    }

    #[test]
    fn vmval_refs() {
        assert!(VmVal::from_ref(None).is_null_ref());
        assert_eq!(VmVal::from_ref(None).as_ref(), None);
        assert_eq!(VmVal::from_ref(Some(0)).as_ref(), Some(0));
        assert_eq!(VmVal::from_ref(Some(41)).as_ref(), Some(41));
        assert_eq!(VmVal::ZERO, VmVal::from_ref(None));
    }

    #[test]
    fn nan_payload_survives() {
        let bits = 0x7fc0_0001_u32;
        assert_eq!(VmVal::from_u32(bits).as_f32().to_bits(), bits);
        assert_eq!(Val::F32(bits).to_vmval().as_u32(), bits);
    }

    #[test]
    fn defaults() {
        assert_eq!(Val::default_for_ty(ValType::I64), Val::I64(0));
        assert_eq!(Val::default_for_ty(ValType::FuncRef), Val::FuncRef(None));
        assert!(Ref::null(RefType::ExternRef).is_null());
        assert_eq!(Val::from(1.5f64).unwrap_f64().to_bits(), 1.5f64.to_bits());
    }
}
