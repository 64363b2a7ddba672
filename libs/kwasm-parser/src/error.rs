// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::io;

// `onlyerror`'s derive cannot parse slice types like `[u8]` in field position,
// so the byte set is named through an alias.
type ByteSet = Box<[u8]>;

#[derive(Debug, onlyerror::Error)]
pub enum Error {
    /// The input ended while more bytes were required.
    ///
    /// `expected` is the set of bytes that would have been accepted, if the
    /// failing read was a [`consume`](crate::ByteCursor::consume) of a
    /// specific set.
    #[error("unexpected end of input at offset {position:#x}")]
    UnexpectedEnd {
        position: usize,
        expected: Option<ByteSet>,
    },
    #[error("unexpected byte {byte:#04x} at offset {position:#x}, expected one of {expected:02x?}")]
    Unexpected {
        byte: u8,
        position: usize,
        expected: ByteSet,
    },
    #[error("malformed LEB128 integer at offset {position:#x}: {error}")]
    Leb128 {
        position: usize,
        error: leb128::Error,
    },
    #[error("failed to read module bytes: {0}")]
    Io(#[from] io::Error),
    #[error("malformed UTF-8 encoding at offset {position:#x}")]
    Utf8 { position: usize },
    #[error("invalid magic number")]
    InvalidMagicNumber,
    #[error("unknown binary version {0:#x}")]
    UnknownVersion(u32),
    #[error("unknown section id {id} at offset {position:#x}")]
    UnknownSection { id: u8, position: usize },
    #[error("section {id} out of order at offset {position:#x}")]
    SectionOutOfOrder { id: u8, position: usize },
    #[error("section {id} size mismatch: declared {declared:#x} bytes, consumed {consumed:#x}")]
    SectionSizeMismatch {
        id: u8,
        declared: usize,
        consumed: usize,
    },
    #[error("unknown instruction {opcode:#x} at offset {position:#x}")]
    UnknownInstruction { opcode: u32, position: usize },
    #[error("unsupported instruction {opcode:#x} at offset {position:#x}")]
    UnsupportedInstruction { opcode: u32, position: usize },
    #[error("{reason} at offset {position:#x}")]
    Malformed {
        reason: &'static str,
        position: usize,
    },
}

impl Error {
    /// Byte offset into the module where the error was detected, if known.
    pub fn position(&self) -> Option<usize> {
        match self {
            Error::UnexpectedEnd { position, .. }
            | Error::Unexpected { position, .. }
            | Error::Leb128 { position, .. }
            | Error::Utf8 { position }
            | Error::UnknownSection { position, .. }
            | Error::SectionOutOfOrder { position, .. }
            | Error::UnknownInstruction { position, .. }
            | Error::UnsupportedInstruction { position, .. }
            | Error::Malformed { position, .. } => Some(*position),
            Error::InvalidMagicNumber => Some(0),
            Error::UnknownVersion(_) => Some(4),
            Error::Io(_) | Error::SectionSizeMismatch { .. } => None,
        }
    }
}

macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !$cond {
            return Err($err);
        }
    };
}

pub(crate) use ensure;
