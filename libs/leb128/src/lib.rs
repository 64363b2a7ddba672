// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Read and write "Little Endian Base 128" (LEB128) variable length integers
//! of a fixed bit width.
//!
//! Decoding is width aware: the reader knows how many bits the target integer
//! has and rejects encodings that carry more significant bits than that, or
//! whose unused padding bits in the final byte disagree with the value's sign.
//! This is the canonicality rule of the WebAssembly binary format.
//!
//! ```
//! use leb128::{Leb128Read, Leb128Write};
//!
//! let mut buf = [0; 16];
//! {
//!     let mut writable = &mut buf[..];
//!     writable.write_sleb128(-12345).expect("Should write number");
//! }
//!
//! let mut readable = &buf[..];
//! let val: i32 = readable.read().expect("Should read number");
//! assert_eq!(val, -12345);
//! ```
//!
//! Any byte producer can be decoded from, not only slices:
//!
//! ```
//! use leb128::Leb128Read;
//!
//! let mut bytes = [0xE5, 0x8E, 0x26].into_iter();
//! let val: u32 = leb128::from_fn(|| bytes.next()).read().unwrap();
//! assert_eq!(val, 624485);
//! ```
#![cfg_attr(not(test), no_std)]

use core::mem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, onlyerror::Error)]
pub enum Error {
    /// The input ended before a terminating byte was seen.
    #[error("insufficient bytes for LEB128 integer")]
    InsufficientBytes,
    /// The encoded value does not fit the requested bit width.
    #[error("LEB128 integer overflows its bit width")]
    Overflow,
    /// Failed to write to the provided buffer.
    #[error("not enough space to write LEB128 integer")]
    NotEnoughSpace,
}
pub type Result<T> = core::result::Result<T, Error>;

const CONTINUATION_BIT: u8 = 1 << 7;
const SIGN_BIT: u8 = 1 << 6;

pub trait Leb128Read {
    /// Produce the next byte of input.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InsufficientBytes`] when the source is exhausted.
    fn read_byte(&mut self) -> Result<u8>;

    /// Decode an unsigned integer that must fit into `bits` bits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InsufficientBytes`] if the input ends early and
    /// [`Error::Overflow`] if the encoding has significant bits beyond `bits`
    /// or is longer than `bits` permits.
    fn read_unsigned(&mut self, bits: u32) -> Result<u64> {
        debug_assert!(bits > 0 && bits <= 64);

        let mut result = 0;
        let mut shift = 0;

        loop {
            let byte = self.read_byte()?;
            let next_shift = shift + 7;

            // the final permitted byte must not have bits set above the
            // target width, including the continuation bit
            if next_shift >= bits && (byte >> (bits - shift)) != 0 {
                return Err(Error::Overflow);
            }

            result |= u64::from(low_bits_of_byte(byte)) << shift;

            if byte & CONTINUATION_BIT == 0 {
                return Ok(result);
            }

            shift = next_shift;
        }
    }

    /// Decode a two's complement integer that must fit into `bits` bits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InsufficientBytes`] if the input ends early and
    /// [`Error::Overflow`] if the value does not fit or the padding bits of
    /// the final byte are not a sign extension of the value.
    fn read_signed(&mut self, bits: u32) -> Result<i64> {
        debug_assert!(bits > 0 && bits <= 64);

        let mut result: i64 = 0;
        let mut shift = 0;

        loop {
            let byte = self.read_byte()?;
            let remaining = bits - shift;

            if remaining <= 7 {
                if byte & CONTINUATION_BIT != 0 {
                    return Err(Error::Overflow);
                }

                // Shift the payload up so its top bit lands in the sign
                // position, then arithmetic-shift the used bits away. What is
                // left are the padding bits, which must all equal the sign.
                #[expect(clippy::cast_possible_wrap, reason = "reinterpreting bits")]
                let padding = ((byte << 1) as i8) >> remaining;
                if padding != 0 && padding != -1 {
                    return Err(Error::Overflow);
                }
            }

            result |= i64::from(low_bits_of_byte(byte)) << shift;
            shift += 7;

            if byte & CONTINUATION_BIT == 0 {
                if shift < 64 && (SIGN_BIT & byte) == SIGN_BIT {
                    // Sign extend the result.
                    result |= !0 << shift;
                }
                return Ok(result);
            }
        }
    }

    /// Decode a LEB128 integer into the concrete type `T`.
    ///
    /// # Errors
    ///
    /// See [`Leb128Read::read_unsigned`] and [`Leb128Read::read_signed`].
    fn read<T: Leb128Int>(&mut self) -> Result<T>
    where
        Self: Sized,
    {
        T::read_from(self)
    }

    /// Decode an unsigned 64-bit integer.
    ///
    /// # Errors
    ///
    /// See [`Leb128Read::read_unsigned`].
    fn read_uleb128(&mut self) -> Result<u64> {
        self.read_unsigned(64)
    }

    /// Decode a signed 64-bit integer.
    ///
    /// # Errors
    ///
    /// See [`Leb128Read::read_signed`].
    fn read_sleb128(&mut self) -> Result<i64> {
        self.read_signed(64)
    }
}

impl Leb128Read for &[u8] {
    fn read_byte(&mut self) -> Result<u8> {
        let (byte, rest) = self.split_first().ok_or(Error::InsufficientBytes)?;
        *self = rest;
        Ok(*byte)
    }
}

/// Adapts a byte producer closure into a [`Leb128Read`] source.
///
/// The closure returns `None` once the input is exhausted.
pub struct FromFn<F>(F);

pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: FnMut() -> Option<u8>,
{
    FromFn(f)
}

impl<F> Leb128Read for FromFn<F>
where
    F: FnMut() -> Option<u8>,
{
    fn read_byte(&mut self) -> Result<u8> {
        (self.0)().ok_or(Error::InsufficientBytes)
    }
}

/// Integer types with a fixed LEB128 bit width.
pub trait Leb128Int: Sized + Copy {
    const BITS: u32;

    /// # Errors
    ///
    /// See [`Leb128Read::read_unsigned`] and [`Leb128Read::read_signed`].
    fn read_from<R: Leb128Read>(reader: &mut R) -> Result<Self>;
}

macro_rules! impl_leb128_int {
    (unsigned $($ty:ty),*) => {$(
        impl Leb128Int for $ty {
            const BITS: u32 = <$ty>::BITS;

            fn read_from<R: Leb128Read>(reader: &mut R) -> Result<Self> {
                let value = reader.read_unsigned(Self::BITS)?;
                Self::try_from(value).map_err(|_| Error::Overflow)
            }
        }
    )*};
    (signed $($ty:ty),*) => {$(
        impl Leb128Int for $ty {
            const BITS: u32 = <$ty>::BITS;

            fn read_from<R: Leb128Read>(reader: &mut R) -> Result<Self> {
                let value = reader.read_signed(Self::BITS)?;
                Self::try_from(value).map_err(|_| Error::Overflow)
            }
        }
    )*};
}

impl_leb128_int!(unsigned u8, u16, u32, u64);
impl_leb128_int!(signed i8, i16, i32, i64);

pub trait Leb128Write {
    /// # Errors
    ///
    /// Returns [`Error::NotEnoughSpace`] when the destination is full.
    fn write_byte(&mut self, val: u8) -> Result<()>;

    /// Encode `val` in the shortest unsigned form, returning the number of
    /// bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotEnoughSpace`] when the destination is full.
    fn write_uleb128(&mut self, mut val: u64) -> Result<usize> {
        let mut bytes_written = 0;
        loop {
            let mut byte = low_bits_of_u64(val);
            val >>= 7;
            if val != 0 {
                // More bytes to come, so set the continuation bit.
                byte |= CONTINUATION_BIT;
            }

            self.write_byte(byte)?;
            bytes_written += 1;

            if val == 0 {
                return Ok(bytes_written);
            }
        }
    }

    /// Encode `val` in the shortest signed form, returning the number of
    /// bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotEnoughSpace`] when the destination is full.
    fn write_sleb128(&mut self, mut val: i64) -> Result<usize> {
        let mut bytes_written = 0;
        loop {
            #[expect(clippy::cast_sign_loss, reason = "only the low 7 bits are kept")]
            let mut byte = low_bits_of_u64(val as u64);
            // Keep the sign bit for testing
            val >>= 6;
            let done = val == 0 || val == -1;
            if done {
                byte &= !CONTINUATION_BIT;
            } else {
                // Remove the sign bit
                val >>= 1;
                // More bytes to come, so set the continuation bit.
                byte |= CONTINUATION_BIT;
            }

            self.write_byte(byte)?;
            bytes_written += 1;

            if done {
                return Ok(bytes_written);
            }
        }
    }
}

impl Leb128Write for &mut [u8] {
    #[inline]
    fn write_byte(&mut self, val: u8) -> Result<()> {
        let (a, b) = mem::take(self)
            .split_first_mut()
            .ok_or(Error::NotEnoughSpace)?;
        *a = val;
        *self = b;
        Ok(())
    }
}

#[inline]
fn low_bits_of_byte(byte: u8) -> u8 {
    byte & !CONTINUATION_BIT
}

#[inline]
fn low_bits_of_u64(val: u64) -> u8 {
    #[expect(clippy::cast_possible_truncation, reason = "masked to 8 bits")]
    let byte = (val & u64::from(u8::MAX)) as u8;
    low_bits_of_byte(byte)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn encode_unsigned(val: u64) -> Vec<u8> {
        let mut buf = [0u8; 16];
        let len = (&mut buf[..]).write_uleb128(val).unwrap();
        buf[..len].to_vec()
    }

    fn encode_signed(val: i64) -> Vec<u8> {
        let mut buf = [0u8; 16];
        let len = (&mut buf[..]).write_sleb128(val).unwrap();
        buf[..len].to_vec()
    }

    #[test]
    fn low_bits() {
        for i in 0..127 {
            assert_eq!(i, low_bits_of_byte(i));
            assert_eq!(i, low_bits_of_byte(i | CONTINUATION_BIT));
        }
    }

    // Examples from the DWARF 4 standard, section 7.6, figure 22.
    #[test]
    fn read_unsigned_dwarf_examples() {
        let cases: &[(&[u8], u64)] = &[
            (&[2], 2),
            (&[127], 127),
            (&[CONTINUATION_BIT, 1], 128),
            (&[1 | CONTINUATION_BIT, 1], 129),
            (&[2 | CONTINUATION_BIT, 1], 130),
            (&[57 | CONTINUATION_BIT, 100], 12857),
        ];

        for (bytes, expected) in cases {
            let mut readable = *bytes;
            assert_eq!(*expected, readable.read_uleb128().unwrap());
            assert!(readable.is_empty());
        }
    }

    // Examples from the DWARF 4 standard, section 7.6, figure 23.
    #[test]
    fn read_signed_dwarf_examples() {
        let cases: &[(&[u8], i64)] = &[
            (&[2], 2),
            (&[0x7e], -2),
            (&[127 | CONTINUATION_BIT, 0], 127),
            (&[1 | CONTINUATION_BIT, 0x7f], -127),
            (&[CONTINUATION_BIT, 1], 128),
            (&[CONTINUATION_BIT, 0x7f], -128),
            (&[1 | CONTINUATION_BIT, 1], 129),
            (&[0x7f | CONTINUATION_BIT, 0x7e], -129),
        ];

        for (bytes, expected) in cases {
            let mut readable = *bytes;
            assert_eq!(*expected, readable.read_sleb128().unwrap());
        }
    }

    #[test]
    fn u8_width_is_enforced() {
        let mut readable = &[0xFF, 0x01][..];
        assert_eq!(readable.read::<u8>(), Ok(255));

        let mut readable = &[0x80, 0x02][..];
        assert_eq!(readable.read::<u8>(), Err(Error::Overflow));
    }

    #[test]
    fn u32_rejects_sixth_byte_and_high_padding() {
        // 5 bytes is the maximum for u32, the last one may only carry 4 bits
        let mut readable = &[0xFF, 0xFF, 0xFF, 0xFF, 0x0F][..];
        assert_eq!(readable.read::<u32>(), Ok(u32::MAX));

        let mut readable = &[0xFF, 0xFF, 0xFF, 0xFF, 0x1F][..];
        assert_eq!(readable.read::<u32>(), Err(Error::Overflow));

        let mut readable = &[0x80, 0x80, 0x80, 0x80, 0x80, 0x00][..];
        assert_eq!(readable.read::<u32>(), Err(Error::Overflow));
    }

    #[test]
    fn i32_padding_must_match_sign() {
        let mut readable = &[0x80, 0x80, 0x80, 0x80, 0x78][..];
        assert_eq!(readable.read::<i32>(), Ok(i32::MIN));

        // sign bit of the value is set but the padding is not
        let mut readable = &[0x80, 0x80, 0x80, 0x80, 0x08][..];
        assert_eq!(readable.read::<i32>(), Err(Error::Overflow));

        // padding is set but the value is positive
        let mut readable = &[0xFF, 0xFF, 0xFF, 0xFF, 0x77][..];
        assert_eq!(readable.read::<i32>(), Err(Error::Overflow));
    }

    #[test]
    fn s33_block_type_index() {
        let mut readable = &[0x40][..];
        assert_eq!(readable.read_signed(33), Ok(-64));

        let mut readable = &[0xFF, 0xFF, 0xFF, 0xFF, 0x0F][..];
        assert_eq!(readable.read_signed(33), Ok(i64::from(u32::MAX)));
    }

    #[test]
    fn read_signed_63_bits() {
        let mut buf = [CONTINUATION_BIT; 9];
        buf[8] = 0x40;
        let mut readable = &buf[..];
        assert_eq!(-0x4000000000000000, readable.read_sleb128().unwrap());
    }

    #[test]
    fn truncated_input() {
        let mut readable = &[CONTINUATION_BIT][..];
        assert_eq!(readable.read_uleb128(), Err(Error::InsufficientBytes));

        let mut readable = &[CONTINUATION_BIT][..];
        assert_eq!(readable.read_sleb128(), Err(Error::InsufficientBytes));

        let mut readable = &[][..];
        assert_eq!(readable.read::<u8>(), Err(Error::InsufficientBytes));
    }

    #[test]
    fn write_not_enough_space() {
        let mut buf = [0; 1];
        let mut writable = &mut buf[..];
        assert_eq!(writable.write_uleb128(128), Err(Error::NotEnoughSpace));

        let mut writable = &mut buf[..];
        assert_eq!(writable.write_sleb128(128), Err(Error::NotEnoughSpace));
    }

    #[test]
    fn from_fn_reads_until_exhausted() {
        let bytes = [0x80, 0x01, 0x7F];
        let mut iter = bytes.iter().copied();
        let mut source = from_fn(|| iter.next());

        assert_eq!(source.read::<u16>(), Ok(128));
        assert_eq!(source.read::<i8>(), Ok(-1));
        assert_eq!(source.read::<u8>(), Err(Error::InsufficientBytes));
    }

    proptest! {
        #[test]
        fn unsigned_round_trip(val: u64) {
            let bytes = encode_unsigned(val);
            prop_assert_eq!((&bytes[..]).read::<u64>(), Ok(val));

            if let Ok(narrow) = u32::try_from(val) {
                prop_assert_eq!((&bytes[..]).read::<u32>(), Ok(narrow));
            } else {
                prop_assert_eq!((&bytes[..]).read::<u32>(), Err(Error::Overflow));
            }
        }

        #[test]
        fn signed_round_trip(val: i64) {
            let bytes = encode_signed(val);
            prop_assert_eq!((&bytes[..]).read::<i64>(), Ok(val));

            if let Ok(narrow) = i32::try_from(val) {
                prop_assert_eq!((&bytes[..]).read::<i32>(), Ok(narrow));
            } else {
                prop_assert_eq!((&bytes[..]).read::<i32>(), Err(Error::Overflow));
            }
        }

        #[test]
        fn truncation_is_always_detected(val in 128u64.., cut in 1usize..10) {
            let bytes = encode_unsigned(val);
            let cut = cut.min(bytes.len() - 1);
            prop_assert_eq!(
                (&bytes[..bytes.len() - cut]).read::<u64>(),
                Err(Error::InsufficientBytes)
            );
        }
    }
}
