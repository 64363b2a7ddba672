// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Sequential, checked access to the bytes of a module.
//!
//! Two realizations exist: [`SliceCursor`] over a fully buffered byte slice
//! and [`StreamCursor`] over any [`std::io::Read`] source that is pulled in
//! fixed-size chunks. Both report failures with identical error values, so
//! the rest of the decoder does not care which one it is driven by.

mod stream;

pub use stream::{DEFAULT_CHUNK_SIZE, StreamCursor};

use crate::Error;

pub trait ByteCursor {
    /// Absolute offset of the next byte from the start of the input.
    fn position(&self) -> usize;

    /// Returns the next byte without consuming it, `None` at the end of input.
    ///
    /// # Errors
    ///
    /// Only fails if the underlying source fails to produce more bytes.
    fn peek(&mut self) -> crate::Result<Option<u8>>;

    /// Consumes and returns the next byte.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedEnd`] at the end of input, in which case the
    /// position is unchanged.
    fn consume_any(&mut self) -> crate::Result<u8>;

    /// Consumes exactly `count` bytes and returns them.
    ///
    /// The returned slice is only valid until the next call on the cursor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedEnd`] if fewer than `count` bytes remain, in
    /// which case the position is unchanged.
    fn consume_n(&mut self, count: usize) -> crate::Result<&[u8]>;

    /// Consumes the next byte if it is a member of `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unexpected`] if the next byte is not in `expected` and
    /// [`Error::UnexpectedEnd`] at the end of input. The position is unchanged
    /// in both cases.
    fn consume(&mut self, expected: &[u8]) -> crate::Result<u8> {
        let position = self.position();
        match self.peek()? {
            None => Err(Error::UnexpectedEnd {
                position,
                expected: Some(expected.into()),
            }),
            Some(byte) if expected.contains(&byte) => self.consume_any(),
            Some(byte) => Err(Error::Unexpected {
                byte,
                position,
                expected: expected.into(),
            }),
        }
    }

    /// # Errors
    ///
    /// Only fails if the underlying source fails to produce more bytes.
    fn is_at_end(&mut self) -> crate::Result<bool> {
        Ok(self.peek()?.is_none())
    }
}

impl<C: ByteCursor + ?Sized> ByteCursor for &mut C {
    fn position(&self) -> usize {
        (**self).position()
    }

    fn peek(&mut self) -> crate::Result<Option<u8>> {
        (**self).peek()
    }

    fn consume_any(&mut self) -> crate::Result<u8> {
        (**self).consume_any()
    }

    fn consume_n(&mut self, count: usize) -> crate::Result<&[u8]> {
        (**self).consume_n(count)
    }
}

/// A cursor over an in-memory byte slice.
///
/// `base` is added to every reported position, which lets a cursor over a
/// sub-slice (a single function body, say) report offsets relative to the
/// start of the whole module.
#[derive(Debug, Clone)]
pub struct SliceCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> SliceCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self::with_base(bytes, 0)
    }

    pub fn with_base(bytes: &'a [u8], base: usize) -> Self {
        Self {
            bytes,
            pos: 0,
            base,
        }
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }

    /// Like [`ByteCursor::consume_n`] but the returned slice borrows from the
    /// underlying buffer instead of the cursor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedEnd`] if fewer than `count` bytes remain.
    pub fn consume_slice(&mut self, count: usize) -> crate::Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(count)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(Error::UnexpectedEnd {
                position: self.position(),
                expected: None,
            })?;
        let bytes = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }
}

impl ByteCursor for SliceCursor<'_> {
    fn position(&self) -> usize {
        self.base + self.pos
    }

    fn peek(&mut self) -> crate::Result<Option<u8>> {
        Ok(self.bytes.get(self.pos).copied())
    }

    fn consume_any(&mut self) -> crate::Result<u8> {
        let byte = *self.bytes.get(self.pos).ok_or(Error::UnexpectedEnd {
            position: self.position(),
            expected: None,
        })?;
        self.pos += 1;
        Ok(byte)
    }

    fn consume_n(&mut self, count: usize) -> crate::Result<&[u8]> {
        self.consume_slice(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn consume_checks_expected_set() {
        let mut cursor = SliceCursor::new(&[0x60, 0x7F]);

        assert_eq!(cursor.consume(&[0x60]).unwrap(), 0x60);
        let err = cursor.consume(&[0x60]).unwrap_err();
        assert!(matches!(
            err,
            Error::Unexpected { byte: 0x7F, position: 1, ref expected } if **expected == [0x60]
        ));
        assert_eq!(cursor.position(), 1);

        assert_eq!(cursor.consume(&[0x7E, 0x7F]).unwrap(), 0x7F);
        let err = cursor.consume(&[0x7F]).unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedEnd { position: 2, expected: Some(ref expected) } if **expected == [0x7F]
        ));
    }

    #[test]
    fn base_offsets_positions() {
        let mut cursor = SliceCursor::with_base(&[1, 2], 0x100);
        assert_eq!(cursor.position(), 0x100);
        cursor.consume_n(2).unwrap();
        let err = cursor.consume_any().unwrap_err();
        assert!(matches!(err, Error::UnexpectedEnd { position: 0x102, .. }));
    }

    proptest! {
        #[test]
        fn scan_visits_every_byte_in_order(bytes: Vec<u8>) {
            let mut cursor = SliceCursor::new(&bytes);
            let mut seen = Vec::new();

            while let Some(peeked) = cursor.peek().unwrap() {
                let position = cursor.position();
                prop_assert_eq!(cursor.peek().unwrap(), Some(peeked));
                prop_assert_eq!(cursor.position(), position);
                seen.push(cursor.consume_any().unwrap());
            }

            prop_assert_eq!(&seen, &bytes);
            prop_assert!(cursor.consume_any().is_err());
            prop_assert_eq!(cursor.position(), bytes.len());
        }

        #[test]
        fn over_read_leaves_position_unchanged(bytes: Vec<u8>, extra in 1usize..64) {
            let mut cursor = SliceCursor::new(&bytes);
            let err = cursor.consume_n(bytes.len() + extra).unwrap_err();
            let is_end = matches!(err, Error::UnexpectedEnd { position: 0, .. });
            prop_assert!(is_end);
            prop_assert_eq!(cursor.position(), 0);
            prop_assert_eq!(cursor.consume_n(bytes.len()).unwrap(), &bytes[..]);
        }
    }
}
