// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use kwasm_interp::{Engine, EngineConfig, Error, Instance, Module, Store, Trap, Val};

fn instantiate(engine: &Engine, store: &mut Store<()>, wat: &str) -> Instance {
    let module = Module::new(engine, &wat::parse_str(wat).unwrap()).unwrap();
    Instance::new(store, &module, &[]).unwrap()
}

fn trap_of(res: kwasm_interp::Result<Vec<Val>>) -> Trap {
    match res {
        Err(err) => err
            .as_trap()
            .unwrap_or_else(|| panic!("expected a trap, got {err}")),
        Ok(vals) => panic!("expected a trap, got {vals:?}"),
    }
}

#[test]
fn arithmetic_traps() {
    let engine = Engine::default();
    let mut store = Store::new(&engine, ());
    let instance = instantiate(
        &engine,
        &mut store,
        r#"(module
            (func (export "div") (param i32 i32) (result i32)
                local.get 0
                local.get 1
                i32.div_s)
            (func (export "trunc") (param f64) (result i32)
                local.get 0
                i32.trunc_f64_s))"#,
    );

    assert_eq!(
        instance
            .invoke(&mut store, "div", &[Val::I32(7), Val::I32(2)])
            .unwrap(),
        [Val::I32(3)]
    );
    assert_eq!(
        trap_of(instance.invoke(&mut store, "div", &[Val::I32(1), Val::I32(0)])),
        Trap::IntegerDivisionByZero
    );
    assert_eq!(
        trap_of(instance.invoke(&mut store, "div", &[Val::I32(i32::MIN), Val::I32(-1)])),
        Trap::IntegerOverflow
    );
    assert_eq!(
        trap_of(instance.invoke(&mut store, "trunc", &[Val::from(f64::NAN)])),
        Trap::BadConversionToInteger
    );
    assert_eq!(
        trap_of(instance.invoke(&mut store, "trunc", &[Val::from(1e10_f64)])),
        Trap::IntegerOverflow
    );
}

#[test]
fn unreachable_and_memory_bounds() {
    let engine = Engine::default();
    let mut store = Store::new(&engine, ());
    let instance = instantiate(
        &engine,
        &mut store,
        r#"(module
            (memory 1)
            (func (export "unreachable") unreachable)
            (func (export "load") (param i32) (result i32)
                local.get 0
                i32.load offset=4))"#,
    );

    assert_eq!(
        trap_of(instance.invoke(&mut store, "unreachable", &[])),
        Trap::UnreachableCodeReached
    );
    assert_eq!(
        instance
            .invoke(&mut store, "load", &[Val::I32(65528)])
            .unwrap(),
        [Val::I32(0)]
    );
    assert_eq!(
        trap_of(instance.invoke(&mut store, "load", &[Val::I32(65529)])),
        Trap::MemoryOutOfBounds
    );
    assert_eq!(
        trap_of(instance.invoke(&mut store, "load", &[Val::I32(-1)])),
        Trap::MemoryOutOfBounds
    );
}

#[test]
fn indirect_calls() {
    let engine = Engine::default();
    let mut store = Store::new(&engine, ());
    let instance = instantiate(
        &engine,
        &mut store,
        r#"(module
            (type $void (func))
            (type $unary (func (param i32) (result i32)))
            (table 3 funcref)
            (func $nop)
            (elem (i32.const 1) $nop)
            (func (export "call_void") (param i32)
                local.get 0
                call_indirect (type $void))
            (func (export "call_unary") (param i32) (result i32)
                i32.const 0
                local.get 0
                call_indirect (type $unary)))"#,
    );

    instance
        .invoke(&mut store, "call_void", &[Val::I32(1)])
        .unwrap();
    assert_eq!(
        trap_of(instance.invoke(&mut store, "call_void", &[Val::I32(0)])),
        Trap::IndirectCallToNull
    );
    assert_eq!(
        trap_of(instance.invoke(&mut store, "call_void", &[Val::I32(3)])),
        Trap::TableOutOfBounds
    );
    assert_eq!(
        trap_of(instance.invoke(&mut store, "call_unary", &[Val::I32(1)])),
        Trap::BadSignature
    );
}

#[test]
fn stack_overflow_has_backtrace() {
    let mut config = EngineConfig::new();
    config.max_call_depth(64);
    let engine = Engine::new(config);
    let mut store = Store::new(&engine, ());
    let instance = instantiate(
        &engine,
        &mut store,
        r#"(module $deep
            (func $recurse (export "recurse")
                call $recurse))"#,
    );

    let err = instance.invoke(&mut store, "recurse", &[]).unwrap_err();
    let Error::Trap { trap, trace } = &err else {
        panic!("expected a trap, got {err}");
    };
    assert_eq!(*trap, Trap::StackOverflow);
    assert_eq!(trace.frames().len(), 64);
    let frame = &trace.frames()[0];
    assert_eq!(frame.func_index, 0);
    assert_eq!(frame.func_name.as_deref(), Some("recurse"));
    assert_eq!(frame.module_name.as_deref(), Some("deep"));
    assert!(err.to_string().contains("deep!recurse"), "{err}");

    // the store stays usable after unwinding
    let err = instance.invoke(&mut store, "recurse", &[]).unwrap_err();
    assert_eq!(err.as_trap(), Some(Trap::StackOverflow));
}

#[test]
fn traps_keep_committed_writes() {
    let engine = Engine::default();
    let mut store = Store::new(&engine, ());
    let instance = instantiate(
        &engine,
        &mut store,
        r#"(module
            (memory (export "mem") 1)
            (global (export "g") (mut i32) (i32.const 0))
            (func (export "run") (result i32)
                i32.const 7
                global.set 0
                i32.const 0
                i32.const 0xaa
                i32.store8
                i32.const 65536
                i32.load))"#,
    );

    assert_eq!(
        trap_of(instance.invoke(&mut store, "run", &[])),
        Trap::MemoryOutOfBounds
    );
    let global = instance.get_global(&store, "g").unwrap();
    assert_eq!(global.get(&store), Val::I32(7));
    let memory = instance.get_memory(&store, "mem").unwrap();
    assert_eq!(memory.data(&store)[0], 0xaa);
}

#[test]
fn start_function_trap_fails_instantiation() {
    let engine = Engine::default();
    let mut store = Store::new(&engine, ());
    let wasm = wat::parse_str(r#"(module (func $start unreachable) (start $start))"#).unwrap();
    let module = Module::new(&engine, &wasm).unwrap();

    let err = Instance::new(&mut store, &module, &[]).unwrap_err();
    assert_eq!(err.as_trap(), Some(Trap::UnreachableCodeReached));
}
