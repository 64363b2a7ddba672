// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::sync::{Arc, Mutex};

use kwasm_interp::{
    CallHook, Caller, Engine, Error, Extern, Func, Global, GlobalType, Instance, Limits, Linker,
    Memory, MemoryType, Module, Mutability, Store, Trap, Val, ValType,
};

fn module(engine: &Engine, wat: &str) -> Module {
    Module::new(engine, &wat::parse_str(wat).unwrap()).unwrap()
}

#[test]
fn host_reads_guest_memory() {
    let engine = Engine::default();
    let mut store = Store::new(&engine, Vec::<String>::new());
    let mut linker = Linker::new(&engine);
    linker
        .func_wrap(
            "env",
            "log",
            |mut caller: Caller<'_, Vec<String>>, ptr: u32, len: u32| -> anyhow::Result<()> {
                let memory = caller
                    .get_memory("memory")
                    .ok_or_else(|| anyhow::anyhow!("missing memory export"))?;
                let mut buf = vec![0; len as usize];
                memory
                    .read(&caller, ptr as usize, &mut buf)
                    .map_err(|_| anyhow::anyhow!("pointer out of bounds"))?;
                let message = String::from_utf8(buf)?;
                caller.data_mut().push(message);
                Ok(())
            },
        )
        .unwrap();

    let module = module(
        &engine,
        r#"(module
            (import "env" "log" (func $log (param i32 i32)))
            (memory (export "memory") 1)
            (data (i32.const 8) "hello from wasm")
            (func (export "run")
                i32.const 8
                i32.const 15
                call $log
                i32.const 65530
                i32.const 15
                call $log))"#,
    );
    let instance = linker.instantiate(&mut store, &module).unwrap();

    let err = instance.invoke(&mut store, "run", &[]).unwrap_err();
    assert!(
        matches!(&err, Error::Host(e) if e.to_string() == "pointer out of bounds"),
        "{err}"
    );
    assert_eq!(store.data().as_slice(), ["hello from wasm"]);
}

#[test]
fn host_calls_back_into_guest() {
    let engine = Engine::default();
    let mut store = Store::new(&engine, ());
    let mut linker = Linker::new(&engine);
    linker
        .func_wrap(
            "env",
            "twice",
            |mut caller: Caller<'_, ()>, x: i32| -> anyhow::Result<i32> {
                let inner = caller
                    .get_export("inner")
                    .and_then(Extern::into_func)
                    .ok_or_else(|| anyhow::anyhow!("missing inner"))?;
                let inner = inner.typed::<i32, i32>(&caller)?;
                let once = inner.call(&mut caller, x)?;
                Ok(inner.call(&mut caller, once)?)
            },
        )
        .unwrap();

    let module = module(
        &engine,
        r#"(module
            (import "env" "twice" (func $twice (param i32) (result i32)))
            (func (export "inner") (param i32) (result i32)
                local.get 0
                i32.const 10
                i32.mul
                local.get 0
                i32.const 0
                i32.eq
                if
                    unreachable
                end)
            (func (export "run") (param i32) (result i32)
                local.get 0
                call $twice
                i32.const 1
                i32.add))"#,
    );
    let instance = linker.instantiate(&mut store, &module).unwrap();
    let run = instance.get_typed_func::<i32, i32>(&store, "run").unwrap();

    assert_eq!(run.call(&mut store, 3).unwrap(), 301);

    // guest traps raised inside nested calls come out unchanged
    let err = run.call(&mut store, 0).unwrap_err();
    assert_eq!(err.as_trap(), Some(Trap::UnreachableCodeReached), "{err}");
}

#[test]
fn nested_frames_get_distinct_slots() {
    let engine = Engine::default();
    let mut store = Store::new(&engine, ());
    let mut linker = Linker::new(&engine);
    linker
        .func_wrap(
            "env",
            "reenter",
            |mut caller: Caller<'_, ()>, x: i32| -> anyhow::Result<i32> {
                let leaf = caller
                    .get_export("leaf")
                    .and_then(Extern::into_func)
                    .ok_or_else(|| anyhow::anyhow!("missing leaf"))?;
                let leaf = leaf.typed::<i32, i32>(&caller)?;
                Ok(leaf.call(&mut caller, x)?)
            },
        )
        .unwrap();

    let module = module(
        &engine,
        r#"(module
            (import "env" "reenter" (func $reenter (param i32) (result i32)))
            (func (export "leaf") (param i32) (result i32)
                local.get 0)
            (func (export "run") (param i32) (result i32)
                local.get 0
                call $reenter))"#,
    );
    let instance = linker.instantiate(&mut store, &module).unwrap();

    let entered = Arc::new(Mutex::new(Vec::new()));
    let recorded = entered.clone();
    store.set_call_hook(move |kind, frame| {
        if kind == CallHook::Enter {
            recorded
                .lock()
                .unwrap()
                .push((frame.depth(), frame.local_address(0).unwrap()));
        }
        Ok(())
    });

    let run = instance.get_typed_func::<i32, i32>(&store, "run").unwrap();
    assert_eq!(run.call(&mut store, 5).unwrap(), 5);

    let entered = entered.lock().unwrap();
    let [(0, outer), (1, inner)] = entered[..] else {
        panic!("unexpected frames {entered:?}");
    };
    assert!(inner > outer, "{inner:#x} <= {outer:#x}");
}

#[test]
fn host_objects_as_imports() {
    let engine = Engine::default();
    let mut store = Store::new(&engine, ());
    let memory = Memory::new(
        &mut store,
        MemoryType {
            limits: Limits {
                min: 1,
                max: Some(2),
            },
        },
    )
    .unwrap();
    let global = Global::new(
        &mut store,
        GlobalType {
            content: ValType::I64,
            mutability: Mutability::Var,
        },
        Val::I64(5),
    )
    .unwrap();
    let add = Func::wrap(&mut store, |a: i64, b: i64| a + b);

    let module = module(
        &engine,
        r#"(module
            (import "env" "mem" (memory 1 2))
            (import "env" "g" (global (mut i64)))
            (import "env" "add" (func $add (param i64 i64) (result i64)))
            (func (export "run")
                i32.const 0
                global.get 0
                i64.const 10
                call $add
                i64.store
                global.get 0
                i64.const 1
                i64.add
                global.set 0))"#,
    );
    let instance = Instance::new(
        &mut store,
        &module,
        &[memory.into(), global.into(), add.into()],
    )
    .unwrap();
    instance.invoke(&mut store, "run", &[]).unwrap();

    assert_eq!(memory.data(&store)[..8], 15_i64.to_le_bytes());
    assert_eq!(global.get(&store), Val::I64(6));
}

#[test]
fn import_shapes_are_checked() {
    let engine = Engine::default();
    let mut store = Store::new(&engine, ());
    let unbounded = Memory::new(
        &mut store,
        MemoryType {
            limits: Limits { min: 1, max: None },
        },
    )
    .unwrap();
    let constant = Global::new(
        &mut store,
        GlobalType {
            content: ValType::I32,
            mutability: Mutability::Const,
        },
        Val::I32(1),
    )
    .unwrap();

    let bounded = module(&engine, r#"(module (import "env" "mem" (memory 1 2)))"#);
    let err = Instance::new(&mut store, &bounded, &[unbounded.into()]).unwrap_err();
    assert!(
        matches!(&err, Error::ImportMismatch { module, field, .. } if module == "env" && field == "mem"),
        "{err}"
    );

    let mutable = module(&engine, r#"(module (import "env" "g" (global (mut i32))))"#);
    let err = Instance::new(&mut store, &mutable, &[constant.into()]).unwrap_err();
    assert!(matches!(err, Error::ImportMismatch { .. }), "{err}");

    let err = Instance::new(&mut store, &mutable, &[unbounded.into()]).unwrap_err();
    assert!(matches!(err, Error::ImportMismatch { .. }), "{err}");

    let mut other = Store::new(&engine, ());
    let err = Instance::new(&mut other, &bounded, &[unbounded.into()]).unwrap_err();
    assert!(matches!(err, Error::ImportMismatch { .. }), "{err}");
}

#[test]
fn host_functions_are_shared_by_linker() {
    let engine = Engine::default();
    let mut linker = Linker::new(&engine);
    linker
        .func_wrap("env", "count", |mut caller: Caller<'_, u32>| {
            *caller.data_mut() += 1;
        })
        .unwrap();
    let module = module(
        &engine,
        r#"(module
            (import "env" "count" (func $count))
            (func (export "run") call $count call $count))"#,
    );

    for _ in 0..2 {
        let mut store = Store::new(&engine, 0_u32);
        let instance = linker.instantiate(&mut store, &module).unwrap();
        instance.invoke(&mut store, "run", &[]).unwrap();
        assert_eq!(store.into_data(), 2);
    }
}
