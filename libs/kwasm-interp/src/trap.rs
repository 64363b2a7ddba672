// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Trap {
    /// Out-of-bounds access to a table.
    TableOutOfBounds,
    /// Indirect call to a null table entry.
    IndirectCallToNull,
    /// Signature mismatch on indirect call.
    BadSignature,
    /// Code that was supposed to have been unreachable was reached.
    UnreachableCodeReached,
    /// Call to a null reference.
    NullReference,

    /// The call stack or the value stack was exhausted.
    StackOverflow,
    /// An out-of-bounds memory access.
    MemoryOutOfBounds,
    /// An integer arithmetic operation caused an overflow.
    IntegerOverflow,
    /// An integer division by zero.
    IntegerDivisionByZero,
    /// Failed float-to-int conversion.
    BadConversionToInteger,
    /// The store's epoch deadline was reached.
    Interrupted,
}

impl fmt::Display for Trap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trap::TableOutOfBounds => f.write_str("out of bounds table access"),
            Trap::IndirectCallToNull => f.write_str("accessed uninitialized table element"),
            Trap::BadSignature => f.write_str("indirect call signature mismatch"),
            Trap::UnreachableCodeReached => f.write_str("unreachable code executed"),
            Trap::NullReference => f.write_str("null reference called"),

            Trap::StackOverflow => f.write_str("call stack exhausted"),
            Trap::MemoryOutOfBounds => f.write_str("out of bounds memory access"),
            Trap::IntegerOverflow => f.write_str("integer overflow"),
            Trap::IntegerDivisionByZero => f.write_str("integer divide by zero"),
            Trap::BadConversionToInteger => f.write_str("invalid conversion to integer"),
            Trap::Interrupted => f.write_str("interrupted"),
        }
    }
}

impl core::error::Error for Trap {}
