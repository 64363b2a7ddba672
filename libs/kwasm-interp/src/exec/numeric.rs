// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Semantics of the numeric operators.
//!
//! Floats are handled as their bit patterns wherever the operation is a pure
//! bit manipulation (`abs`, `neg`, `copysign`, reinterpretations) so NaN
//! payloads pass through unchanged.

#![expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_lossless,
    clippy::float_cmp,
    reason = "numeric operators are defined in terms of these conversions"
)]

use kwasm_parser::NumericOp;

use crate::trap::Trap;
use crate::values::VmVal;

const F32_SIGN: u32 = 1 << 31;
const F64_SIGN: u64 = 1 << 63;

fn bool(v: bool) -> VmVal {
    VmVal::from_bool(v)
}

fn fmin32(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        a + b
    } else if a == b {
        // -0.0 and 0.0 compare equal
        if a.is_sign_negative() { a } else { b }
    } else {
        a.min(b)
    }
}

fn fmax32(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        a + b
    } else if a == b {
        if a.is_sign_positive() { a } else { b }
    } else {
        a.max(b)
    }
}

fn fmin64(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        a + b
    } else if a == b {
        if a.is_sign_negative() { a } else { b }
    } else {
        a.min(b)
    }
}

fn fmax64(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        a + b
    } else if a == b {
        if a.is_sign_positive() { a } else { b }
    } else {
        a.max(b)
    }
}

/// Truncates `x` towards zero, trapping if the result is not within
/// `[min, max_exclusive)`.
fn checked_trunc(x: f64, min: f64, max_exclusive: f64) -> Result<f64, Trap> {
    if x.is_nan() {
        return Err(Trap::BadConversionToInteger);
    }
    let t = x.trunc();
    if t >= min && t < max_exclusive {
        Ok(t)
    } else {
        Err(Trap::IntegerOverflow)
    }
}

const I32_MIN: f64 = -2_147_483_648.0;
const I32_END: f64 = 2_147_483_648.0;
const U32_END: f64 = 4_294_967_296.0;
const I64_MIN: f64 = -9_223_372_036_854_775_808.0;
const I64_END: f64 = 9_223_372_036_854_775_808.0;
const U64_END: f64 = 18_446_744_073_709_551_616.0;

/// Executes a unary operator.
#[expect(clippy::too_many_lines, reason = "big match statement")]
pub(super) fn unary(op: NumericOp, x: VmVal) -> Result<VmVal, Trap> {
    let v = match op {
        NumericOp::I32Eqz => bool(x.as_i32() == 0),
        NumericOp::I64Eqz => bool(x.as_i64() == 0),

        NumericOp::I32Clz => VmVal::from_u32(x.as_u32().leading_zeros()),
        NumericOp::I32Ctz => VmVal::from_u32(x.as_u32().trailing_zeros()),
        NumericOp::I32Popcnt => VmVal::from_u32(x.as_u32().count_ones()),
        NumericOp::I64Clz => VmVal::from_u64(u64::from(x.as_u64().leading_zeros())),
        NumericOp::I64Ctz => VmVal::from_u64(u64::from(x.as_u64().trailing_zeros())),
        NumericOp::I64Popcnt => VmVal::from_u64(u64::from(x.as_u64().count_ones())),

        NumericOp::F32Abs => VmVal::from_u32(x.as_u32() & !F32_SIGN),
        NumericOp::F32Neg => VmVal::from_u32(x.as_u32() ^ F32_SIGN),
        NumericOp::F32Ceil => VmVal::from_f32(x.as_f32().ceil()),
        NumericOp::F32Floor => VmVal::from_f32(x.as_f32().floor()),
        NumericOp::F32Trunc => VmVal::from_f32(x.as_f32().trunc()),
        NumericOp::F32Nearest => VmVal::from_f32(x.as_f32().round_ties_even()),
        NumericOp::F32Sqrt => VmVal::from_f32(x.as_f32().sqrt()),
        NumericOp::F64Abs => VmVal::from_u64(x.as_u64() & !F64_SIGN),
        NumericOp::F64Neg => VmVal::from_u64(x.as_u64() ^ F64_SIGN),
        NumericOp::F64Ceil => VmVal::from_f64(x.as_f64().ceil()),
        NumericOp::F64Floor => VmVal::from_f64(x.as_f64().floor()),
        NumericOp::F64Trunc => VmVal::from_f64(x.as_f64().trunc()),
        NumericOp::F64Nearest => VmVal::from_f64(x.as_f64().round_ties_even()),
        NumericOp::F64Sqrt => VmVal::from_f64(x.as_f64().sqrt()),

        NumericOp::I32WrapI64 => VmVal::from_u32(x.as_u64() as u32),
        NumericOp::I32TruncF32S => {
            VmVal::from_i32(checked_trunc(x.as_f32() as f64, I32_MIN, I32_END)? as i32)
        }
        NumericOp::I32TruncF32U => {
            VmVal::from_u32(checked_trunc(x.as_f32() as f64, 0.0, U32_END)? as u32)
        }
        NumericOp::I32TruncF64S => {
            VmVal::from_i32(checked_trunc(x.as_f64(), I32_MIN, I32_END)? as i32)
        }
        NumericOp::I32TruncF64U => VmVal::from_u32(checked_trunc(x.as_f64(), 0.0, U32_END)? as u32),
        NumericOp::I64ExtendI32S => VmVal::from_i64(x.as_i32() as i64),
        NumericOp::I64ExtendI32U => VmVal::from_u64(x.as_u32() as u64),
        NumericOp::I64TruncF32S => {
            VmVal::from_i64(checked_trunc(x.as_f32() as f64, I64_MIN, I64_END)? as i64)
        }
        NumericOp::I64TruncF32U => {
            VmVal::from_u64(checked_trunc(x.as_f32() as f64, 0.0, U64_END)? as u64)
        }
        NumericOp::I64TruncF64S => {
            VmVal::from_i64(checked_trunc(x.as_f64(), I64_MIN, I64_END)? as i64)
        }
        NumericOp::I64TruncF64U => VmVal::from_u64(checked_trunc(x.as_f64(), 0.0, U64_END)? as u64),

        // `as` casts from floats saturate and map NaN to zero
        NumericOp::I32TruncSatF32S => VmVal::from_i32(x.as_f32() as i32),
        NumericOp::I32TruncSatF32U => VmVal::from_u32(x.as_f32() as u32),
        NumericOp::I32TruncSatF64S => VmVal::from_i32(x.as_f64() as i32),
        NumericOp::I32TruncSatF64U => VmVal::from_u32(x.as_f64() as u32),
        NumericOp::I64TruncSatF32S => VmVal::from_i64(x.as_f32() as i64),
        NumericOp::I64TruncSatF32U => VmVal::from_u64(x.as_f32() as u64),
        NumericOp::I64TruncSatF64S => VmVal::from_i64(x.as_f64() as i64),
        NumericOp::I64TruncSatF64U => VmVal::from_u64(x.as_f64() as u64),

        NumericOp::F32ConvertI32S => VmVal::from_f32(x.as_i32() as f32),
        NumericOp::F32ConvertI32U => VmVal::from_f32(x.as_u32() as f32),
        NumericOp::F32ConvertI64S => VmVal::from_f32(x.as_i64() as f32),
        NumericOp::F32ConvertI64U => VmVal::from_f32(x.as_u64() as f32),
        NumericOp::F32DemoteF64 => VmVal::from_f32(x.as_f64() as f32),
        NumericOp::F64ConvertI32S => VmVal::from_f64(x.as_i32() as f64),
        NumericOp::F64ConvertI32U => VmVal::from_f64(x.as_u32() as f64),
        NumericOp::F64ConvertI64S => VmVal::from_f64(x.as_i64() as f64),
        NumericOp::F64ConvertI64U => VmVal::from_f64(x.as_u64() as f64),
        NumericOp::F64PromoteF32 => VmVal::from_f64(x.as_f32() as f64),

        NumericOp::I32ReinterpretF32 | NumericOp::F32ReinterpretI32 => {
            VmVal::from_u32(x.as_u32())
        }
        NumericOp::I64ReinterpretF64 | NumericOp::F64ReinterpretI64 => {
            VmVal::from_u64(x.as_u64())
        }

        NumericOp::I32Extend8S => VmVal::from_i32(x.as_i32() as i8 as i32),
        NumericOp::I32Extend16S => VmVal::from_i32(x.as_i32() as i16 as i32),
        NumericOp::I64Extend8S => VmVal::from_i64(x.as_i64() as i8 as i64),
        NumericOp::I64Extend16S => VmVal::from_i64(x.as_i64() as i16 as i64),
        NumericOp::I64Extend32S => VmVal::from_i64(x.as_i64() as i32 as i64),

        _ => return binary(op, x, VmVal::ZERO),
    };
    Ok(v)
}

/// Executes a binary operator with operands `a` (pushed first) and `b`.
#[expect(clippy::too_many_lines, reason = "big match statement")]
pub(super) fn binary(op: NumericOp, a: VmVal, b: VmVal) -> Result<VmVal, Trap> {
    let v = match op {
        NumericOp::I32Eq => bool(a.as_i32() == b.as_i32()),
        NumericOp::I32Ne => bool(a.as_i32() != b.as_i32()),
        NumericOp::I32LtS => bool(a.as_i32() < b.as_i32()),
        NumericOp::I32LtU => bool(a.as_u32() < b.as_u32()),
        NumericOp::I32GtS => bool(a.as_i32() > b.as_i32()),
        NumericOp::I32GtU => bool(a.as_u32() > b.as_u32()),
        NumericOp::I32LeS => bool(a.as_i32() <= b.as_i32()),
        NumericOp::I32LeU => bool(a.as_u32() <= b.as_u32()),
        NumericOp::I32GeS => bool(a.as_i32() >= b.as_i32()),
        NumericOp::I32GeU => bool(a.as_u32() >= b.as_u32()),
        NumericOp::I64Eq => bool(a.as_i64() == b.as_i64()),
        NumericOp::I64Ne => bool(a.as_i64() != b.as_i64()),
        NumericOp::I64LtS => bool(a.as_i64() < b.as_i64()),
        NumericOp::I64LtU => bool(a.as_u64() < b.as_u64()),
        NumericOp::I64GtS => bool(a.as_i64() > b.as_i64()),
        NumericOp::I64GtU => bool(a.as_u64() > b.as_u64()),
        NumericOp::I64LeS => bool(a.as_i64() <= b.as_i64()),
        NumericOp::I64LeU => bool(a.as_u64() <= b.as_u64()),
        NumericOp::I64GeS => bool(a.as_i64() >= b.as_i64()),
        NumericOp::I64GeU => bool(a.as_u64() >= b.as_u64()),

        NumericOp::F32Eq => bool(a.as_f32() == b.as_f32()),
        NumericOp::F32Ne => bool(a.as_f32() != b.as_f32()),
        NumericOp::F32Lt => bool(a.as_f32() < b.as_f32()),
        NumericOp::F32Gt => bool(a.as_f32() > b.as_f32()),
        NumericOp::F32Le => bool(a.as_f32() <= b.as_f32()),
        NumericOp::F32Ge => bool(a.as_f32() >= b.as_f32()),
        NumericOp::F64Eq => bool(a.as_f64() == b.as_f64()),
        NumericOp::F64Ne => bool(a.as_f64() != b.as_f64()),
        NumericOp::F64Lt => bool(a.as_f64() < b.as_f64()),
        NumericOp::F64Gt => bool(a.as_f64() > b.as_f64()),
        NumericOp::F64Le => bool(a.as_f64() <= b.as_f64()),
        NumericOp::F64Ge => bool(a.as_f64() >= b.as_f64()),

        NumericOp::I32Add => VmVal::from_i32(a.as_i32().wrapping_add(b.as_i32())),
        NumericOp::I32Sub => VmVal::from_i32(a.as_i32().wrapping_sub(b.as_i32())),
        NumericOp::I32Mul => VmVal::from_i32(a.as_i32().wrapping_mul(b.as_i32())),
        NumericOp::I32DivS => {
            let (a, b) = (a.as_i32(), b.as_i32());
            if b == 0 {
                return Err(Trap::IntegerDivisionByZero);
            }
            VmVal::from_i32(a.checked_div(b).ok_or(Trap::IntegerOverflow)?)
        }
        NumericOp::I32DivU => VmVal::from_u32(
            a.as_u32()
                .checked_div(b.as_u32())
                .ok_or(Trap::IntegerDivisionByZero)?,
        ),
        NumericOp::I32RemS => {
            let (a, b) = (a.as_i32(), b.as_i32());
            if b == 0 {
                return Err(Trap::IntegerDivisionByZero);
            }
            VmVal::from_i32(a.wrapping_rem(b))
        }
        NumericOp::I32RemU => VmVal::from_u32(
            a.as_u32()
                .checked_rem(b.as_u32())
                .ok_or(Trap::IntegerDivisionByZero)?,
        ),
        NumericOp::I32And => VmVal::from_u32(a.as_u32() & b.as_u32()),
        NumericOp::I32Or => VmVal::from_u32(a.as_u32() | b.as_u32()),
        NumericOp::I32Xor => VmVal::from_u32(a.as_u32() ^ b.as_u32()),
        NumericOp::I32Shl => VmVal::from_u32(a.as_u32().wrapping_shl(b.as_u32())),
        NumericOp::I32ShrS => VmVal::from_i32(a.as_i32().wrapping_shr(b.as_u32())),
        NumericOp::I32ShrU => VmVal::from_u32(a.as_u32().wrapping_shr(b.as_u32())),
        NumericOp::I32Rotl => VmVal::from_u32(a.as_u32().rotate_left(b.as_u32() % 32)),
        NumericOp::I32Rotr => VmVal::from_u32(a.as_u32().rotate_right(b.as_u32() % 32)),

        NumericOp::I64Add => VmVal::from_i64(a.as_i64().wrapping_add(b.as_i64())),
        NumericOp::I64Sub => VmVal::from_i64(a.as_i64().wrapping_sub(b.as_i64())),
        NumericOp::I64Mul => VmVal::from_i64(a.as_i64().wrapping_mul(b.as_i64())),
        NumericOp::I64DivS => {
            let (a, b) = (a.as_i64(), b.as_i64());
            if b == 0 {
                return Err(Trap::IntegerDivisionByZero);
            }
            VmVal::from_i64(a.checked_div(b).ok_or(Trap::IntegerOverflow)?)
        }
        NumericOp::I64DivU => VmVal::from_u64(
            a.as_u64()
                .checked_div(b.as_u64())
                .ok_or(Trap::IntegerDivisionByZero)?,
        ),
        NumericOp::I64RemS => {
            let (a, b) = (a.as_i64(), b.as_i64());
            if b == 0 {
                return Err(Trap::IntegerDivisionByZero);
            }
            VmVal::from_i64(a.wrapping_rem(b))
        }
        NumericOp::I64RemU => VmVal::from_u64(
            a.as_u64()
                .checked_rem(b.as_u64())
                .ok_or(Trap::IntegerDivisionByZero)?,
        ),
        NumericOp::I64And => VmVal::from_u64(a.as_u64() & b.as_u64()),
        NumericOp::I64Or => VmVal::from_u64(a.as_u64() | b.as_u64()),
        NumericOp::I64Xor => VmVal::from_u64(a.as_u64() ^ b.as_u64()),
        NumericOp::I64Shl => VmVal::from_u64(a.as_u64().wrapping_shl(b.as_u64() as u32)),
        NumericOp::I64ShrS => VmVal::from_i64(a.as_i64().wrapping_shr(b.as_u64() as u32)),
        NumericOp::I64ShrU => VmVal::from_u64(a.as_u64().wrapping_shr(b.as_u64() as u32)),
        NumericOp::I64Rotl => VmVal::from_u64(a.as_u64().rotate_left((b.as_u64() % 64) as u32)),
        NumericOp::I64Rotr => VmVal::from_u64(a.as_u64().rotate_right((b.as_u64() % 64) as u32)),

        NumericOp::F32Add => VmVal::from_f32(a.as_f32() + b.as_f32()),
        NumericOp::F32Sub => VmVal::from_f32(a.as_f32() - b.as_f32()),
        NumericOp::F32Mul => VmVal::from_f32(a.as_f32() * b.as_f32()),
        NumericOp::F32Div => VmVal::from_f32(a.as_f32() / b.as_f32()),
        NumericOp::F32Min => VmVal::from_f32(fmin32(a.as_f32(), b.as_f32())),
        NumericOp::F32Max => VmVal::from_f32(fmax32(a.as_f32(), b.as_f32())),
        NumericOp::F32Copysign => {
            VmVal::from_u32((a.as_u32() & !F32_SIGN) | (b.as_u32() & F32_SIGN))
        }
        NumericOp::F64Add => VmVal::from_f64(a.as_f64() + b.as_f64()),
        NumericOp::F64Sub => VmVal::from_f64(a.as_f64() - b.as_f64()),
        NumericOp::F64Mul => VmVal::from_f64(a.as_f64() * b.as_f64()),
        NumericOp::F64Div => VmVal::from_f64(a.as_f64() / b.as_f64()),
        NumericOp::F64Min => VmVal::from_f64(fmin64(a.as_f64(), b.as_f64())),
        NumericOp::F64Max => VmVal::from_f64(fmax64(a.as_f64(), b.as_f64())),
        NumericOp::F64Copysign => {
            VmVal::from_u64((a.as_u64() & !F64_SIGN) | (b.as_u64() & F64_SIGN))
        }

        _ => return unary(op, a),
    };
    Ok(v)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn i32s(op: NumericOp, a: i32, b: i32) -> Result<i32, Trap> {
        binary(op, VmVal::from_i32(a), VmVal::from_i32(b)).map(VmVal::as_i32)
    }

    #[test]
    fn integer_division() {
        assert_eq!(i32s(NumericOp::I32DivS, 7, -2), Ok(-3));
        assert_eq!(i32s(NumericOp::I32RemS, -7, 2), Ok(-1));
        assert_eq!(i32s(NumericOp::I32DivS, 1, 0), Err(Trap::IntegerDivisionByZero));
        assert_eq!(i32s(NumericOp::I32DivU, 1, 0), Err(Trap::IntegerDivisionByZero));
        assert_eq!(
            i32s(NumericOp::I32DivS, i32::MIN, -1),
            Err(Trap::IntegerOverflow)
        );
        assert_eq!(i32s(NumericOp::I32RemS, i32::MIN, -1), Ok(0));
        assert_eq!(i32s(NumericOp::I32DivU, -1, 2), Ok(i32::MAX));
    }

    #[test]
    fn shifts_and_rotates() {
        assert_eq!(i32s(NumericOp::I32Shl, 1, 33), Ok(2));
        assert_eq!(i32s(NumericOp::I32ShrS, -8, 1), Ok(-4));
        assert_eq!(i32s(NumericOp::I32ShrU, -8, 1), Ok(0x7fff_fffc));
        assert_eq!(i32s(NumericOp::I32Rotl, 0x8000_0001_u32 as i32, 1), Ok(3));
        let v = binary(NumericOp::I64Rotr, VmVal::from_u64(1), VmVal::from_u64(65)).unwrap();
        assert_eq!(v.as_u64(), 1 << 63);
    }

    #[test]
    fn float_to_int() {
        let t = |op, x: f64| unary(op, VmVal::from_f64(x)).map(VmVal::as_i32);
        assert_eq!(t(NumericOp::I32TruncF64S, -1.9), Ok(-1));
        assert_eq!(t(NumericOp::I32TruncF64U, -0.9), Ok(0));
        assert_eq!(
            t(NumericOp::I32TruncF64S, 2_147_483_648.0),
            Err(Trap::IntegerOverflow)
        );
        assert_eq!(
            t(NumericOp::I32TruncF64S, f64::NAN),
            Err(Trap::BadConversionToInteger)
        );
        assert_eq!(t(NumericOp::I32TruncSatF64S, 1e12), Ok(i32::MAX));
        assert_eq!(t(NumericOp::I32TruncSatF64U, -5.0), Ok(0));
        assert_eq!(t(NumericOp::I32TruncSatF64S, f64::NAN), Ok(0));
    }

    #[test]
    fn float_min_max() {
        let min = binary(
            NumericOp::F32Min,
            VmVal::from_f32(0.0),
            VmVal::from_f32(-0.0),
        )
        .unwrap();
        assert!(min.as_f32().is_sign_negative());

        let max = binary(
            NumericOp::F64Max,
            VmVal::from_f64(f64::NAN),
            VmVal::from_f64(1.0),
        )
        .unwrap();
        assert!(max.as_f64().is_nan());
    }

    #[test]
    fn bit_ops_keep_nan_payload() {
        let nan = 0x7fc0_0123_u32;
        let neg = unary(NumericOp::F32Neg, VmVal::from_u32(nan)).unwrap();
        assert_eq!(neg.as_u32(), nan | F32_SIGN);
        let abs = unary(NumericOp::F32Abs, neg).unwrap();
        assert_eq!(abs.as_u32(), nan);
    }

    #[test]
    fn sign_extension() {
        let v = unary(NumericOp::I32Extend8S, VmVal::from_i32(0x80)).unwrap();
        assert_eq!(v.as_i32(), -128);
        let v = unary(NumericOp::I64ExtendI32U, VmVal::from_i32(-1)).unwrap();
        assert_eq!(v.as_u64(), u64::from(u32::MAX));
        let v = unary(NumericOp::I64ExtendI32S, VmVal::from_i32(-1)).unwrap();
        assert_eq!(v.as_i64(), -1);
    }

    proptest! {
        #[test]
        fn i32_arithmetic_wraps(a: i32, b: i32) {
            prop_assert_eq!(i32s(NumericOp::I32Add, a, b), Ok(a.wrapping_add(b)));
            prop_assert_eq!(i32s(NumericOp::I32Sub, a, b), Ok(a.wrapping_sub(b)));
            prop_assert_eq!(i32s(NumericOp::I32Mul, a, b), Ok(a.wrapping_mul(b)));
        }

        #[test]
        fn i32_division_agrees_with_checked_ops(a: i32, b: i32) {
            let expected = match a.checked_div(b) {
                Some(v) => Ok(v),
                None if b == 0 => Err(Trap::IntegerDivisionByZero),
                None => Err(Trap::IntegerOverflow),
            };
            prop_assert_eq!(i32s(NumericOp::I32DivS, a, b), expected);
            prop_assert_eq!(
                i32s(NumericOp::I32RemS, a, b).ok(),
                (b != 0).then(|| a.wrapping_rem(b))
            );
        }
    }
}
