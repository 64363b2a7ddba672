// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::io;

use crate::backtrace::WasmBacktrace;
use crate::compile::TranslationError;
use crate::trap::Trap;

/// Error type for the crate
#[derive(Debug, onlyerror::Error)]
pub enum Error {
    /// The module binary is malformed or references out-of-range indices.
    #[error("invalid WASM input: {message}")]
    Malformed {
        message: String,
        /// The byte offset where the error was detected.
        offset: Option<usize>,
    },
    /// The module bytes could not be read.
    #[error("failed to read module: {0}")]
    Io(#[from] io::Error),
    /// A function body could not be translated.
    #[error("failed to translate function: {0}")]
    Translation(#[from] TranslationError),
    /// A required import was not provided.
    #[error("missing required import {module}::{field} ({kind})")]
    MissingImport {
        module: String,
        field: String,
        kind: &'static str,
    },
    /// A provided import does not match the declared import type.
    #[error("incompatible import type for {module}::{field}: {message}")]
    ImportMismatch {
        module: String,
        field: String,
        message: String,
    },
    /// An active element or data segment does not fit its table or memory.
    #[error("{kind} segment {index} does not fit")]
    SegmentOutOfRange { kind: &'static str, index: u32 },
    /// The store's resource limiter rejected an allocation or growth.
    #[error("{0} growth rejected by the resource limiter")]
    ResourceLimitExceeded(&'static str),
    /// A WebAssembly trap occurred.
    #[error("wasm trap: {trap}{trace}")]
    Trap { trap: Trap, trace: WasmBacktrace },
    /// Values passed to or returned from a function do not match its type.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("export `{0}` not found")]
    ExportNotFound(String),
    /// The name is already defined.
    #[error("name {module}::{field} is already defined")]
    AlreadyDefined { module: String, field: String },
    /// The WebAssembly code used an unsupported feature.
    #[error("feature used by the WebAssembly code is not supported: {0}")]
    Unsupported(String),
    /// A host function returned an error.
    #[error("host function failed: {0}")]
    Host(anyhow::Error),
}

impl Error {
    /// Returns the trap that aborted execution, if this error is a trap.
    pub fn as_trap(&self) -> Option<Trap> {
        match self {
            Error::Trap { trap, .. } => Some(*trap),
            _ => None,
        }
    }

    pub(crate) fn trap(trap: Trap) -> Self {
        Error::Trap {
            trap,
            trace: WasmBacktrace::default(),
        }
    }
}

impl From<kwasm_parser::Error> for Error {
    fn from(err: kwasm_parser::Error) -> Self {
        match err {
            kwasm_parser::Error::Io(err) => Error::Io(err),
            err @ kwasm_parser::Error::UnsupportedInstruction { .. } => {
                Error::Unsupported(err.to_string())
            }
            err => Error::Malformed {
                offset: err.position(),
                message: err.to_string(),
            },
        }
    }
}

impl From<Trap> for Error {
    fn from(trap: Trap) -> Self {
        Error::trap(trap)
    }
}
