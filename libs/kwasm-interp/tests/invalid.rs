// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::io::{self, Read};

use kwasm_interp::{
    Engine, EngineConfig, Error, Instance, Module, Store, TranslationError, ValType,
};

fn module(engine: &Engine, wat: &str) -> Module {
    Module::new(engine, &wat::parse_str(wat).unwrap()).unwrap()
}

/// A reader that remembers the largest buffer it was asked to fill.
struct Recording<'a> {
    bytes: &'a [u8],
    largest: usize,
}

impl Read for Recording<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.largest = self.largest.max(buf.len());
        self.bytes.read(buf)
    }
}

#[test]
fn integers_cannot_be_stored_as_references() {
    let engine = Engine::default();
    let mut store = Store::new(&engine, ());
    let module = module(
        &engine,
        r#"(module
            (type $t (func))
            (table 1 funcref)
            (func (export "forge") (param i32)
                i32.const 0
                local.get 0
                table.set 0
                i32.const 0
                call_indirect (type $t)))"#,
    );

    let instance = Instance::new(&mut store, &module, &[]).unwrap();
    let err = instance
        .invoke(&mut store, "forge", &[0x7fff_i32.into()])
        .unwrap_err();
    assert!(
        matches!(
            err,
            Error::Translation(TranslationError::TypeMismatch {
                expected: ValType::FuncRef,
                found: ValType::I32,
                ..
            })
        ),
        "{err}"
    );
}

#[test]
fn ill_typed_results_are_rejected_up_front() {
    let engine = Engine::default();
    let module = module(&engine, r#"(module (func (result funcref) i32.const 5))"#);

    let err = module.materialize_all().unwrap_err();
    assert!(
        matches!(
            err,
            Error::Translation(TranslationError::TypeMismatch {
                expected: ValType::FuncRef,
                found: ValType::I32,
                ..
            })
        ),
        "{err}"
    );
}

#[test]
fn oversized_section_length_from_reader() {
    let mut config = EngineConfig::new();
    config.stream_chunk_size(32);
    let engine = Engine::new(config);

    let mut reader = Recording {
        bytes: b"\0asm\x01\0\0\0\x00\x80\x80\x80\x80\x01\x01a",
        largest: 0,
    };
    let err = Module::from_reader(&engine, &mut reader).unwrap_err();
    assert!(matches!(err, Error::Malformed { .. }), "{err}");
    assert!(reader.largest <= 32, "asked for {} bytes", reader.largest);
}
