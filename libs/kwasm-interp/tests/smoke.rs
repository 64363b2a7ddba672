// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use kwasm_interp::{Engine, Error, Instance, Linker, Module, Store, Val};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::SubscriberInitExt;

fn module(engine: &Engine, wat: &str) -> Module {
    Module::new(engine, &wat::parse_str(wat).unwrap()).unwrap()
}

#[test]
fn exported_memory_without_code() {
    let engine = Engine::default();
    let mut store = Store::new(&engine, ());
    let module = module(&engine, r#"(module (memory 0) (export "a" (memory 0)))"#);

    let instance = Instance::new(&mut store, &module, &[]).unwrap();
    let memory = instance.get_memory(&store, "a").unwrap();
    assert_eq!(memory.size(&store), 0);
    assert_eq!(engine.translation_count(), 0);
}

#[test]
fn start_returns_42() {
    let engine = Engine::default();
    let mut store = Store::new(&engine, ());
    let module = module(
        &engine,
        r#"(module
            (func (export "_start") (result i32)
                (local i32)
                i32.const 40
                local.set 0
                local.get 0
                i32.const 2
                i32.add))"#,
    );

    let instance = Instance::new(&mut store, &module, &[]).unwrap();
    assert_eq!(
        instance.invoke(&mut store, "_start", &[]).unwrap(),
        [Val::I32(42)]
    );
}

#[test]
fn fib() {
    let _trace = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .set_default();

    let engine = Engine::default();
    let mut store = Store::new(&engine, ());
    let module = module(
        &engine,
        r#"(module
            (func $fib (export "fib") (param i32) (result i32)
                local.get 0
                i32.const 2
                i32.lt_s
                if (result i32)
                    local.get 0
                else
                    local.get 0
                    i32.const 1
                    i32.sub
                    call $fib
                    local.get 0
                    i32.const 2
                    i32.sub
                    call $fib
                    i32.add
                end))"#,
    );

    let instance = Linker::new(&engine)
        .instantiate(&mut store, &module)
        .unwrap();
    let fib = instance
        .get_typed_func::<i32, i32>(&store, "fib")
        .unwrap();
    assert_eq!(fib.call(&mut store, 8).unwrap(), 21);
    assert_eq!(fib.call(&mut store, 20).unwrap(), 6765);
}

#[test]
fn loops_and_branch_tables() {
    let engine = Engine::default();
    let mut store = Store::new(&engine, ());
    let module = module(
        &engine,
        r#"(module
            (func (export "sum") (param $n i64) (result i64)
                (local $acc i64)
                block $done
                    loop $next
                        local.get $n
                        i64.eqz
                        br_if $done
                        local.get $acc
                        local.get $n
                        i64.add
                        local.set $acc
                        local.get $n
                        i64.const 1
                        i64.sub
                        local.set $n
                        br $next
                    end
                end
                local.get $acc)
            (func (export "classify") (param i32) (result i32)
                block $two
                    block $one
                        block $zero
                            local.get 0
                            br_table $zero $one $two
                        end
                        i32.const 100
                        return
                    end
                    i32.const 101
                    return
                end
                i32.const 102))"#,
    );

    let instance = Instance::new(&mut store, &module, &[]).unwrap();
    let sum = instance.get_typed_func::<i64, i64>(&store, "sum").unwrap();
    assert_eq!(sum.call(&mut store, 100).unwrap(), 5050);

    let classify = instance
        .get_typed_func::<i32, i32>(&store, "classify")
        .unwrap();
    assert_eq!(classify.call(&mut store, 0).unwrap(), 100);
    assert_eq!(classify.call(&mut store, 1).unwrap(), 101);
    assert_eq!(classify.call(&mut store, 2).unwrap(), 102);
    assert_eq!(classify.call(&mut store, 77).unwrap(), 102);
}

#[test]
fn translation_is_memoized() {
    let engine = Engine::default();
    let mut store = Store::new(&engine, ());
    let module = module(
        &engine,
        r#"(module
            (func (export "a") (result i32) i32.const 1)
            (func (export "b") (result i32) i32.const 2))"#,
    );

    let instance = Instance::new(&mut store, &module, &[]).unwrap();
    assert_eq!(engine.translation_count(), 0);

    let first = instance.invoke(&mut store, "a", &[]).unwrap();
    let second = instance.invoke(&mut store, "a", &[]).unwrap();
    assert_eq!(first, second);
    assert_eq!(engine.translation_count(), 1);

    // a second instance shares the translated code of the module
    let other = Instance::new(&mut store, &module, &[]).unwrap();
    other.invoke(&mut store, "a", &[]).unwrap();
    assert_eq!(engine.translation_count(), 1);

    module.materialize_all().unwrap();
    assert_eq!(engine.translation_count(), 2);
}

#[test]
fn translation_errors_are_memoized() {
    let engine = Engine::default();
    let mut store = Store::new(&engine, ());
    let module = module(
        &engine,
        r#"(module
            (func (export "bad") (result i32)
                block (result i32)
                    nop
                end))"#,
    );

    let instance = Instance::new(&mut store, &module, &[]).unwrap();
    for _ in 0..2 {
        let err = instance.invoke(&mut store, "bad", &[]).unwrap_err();
        assert!(matches!(err, Error::Translation(_)), "{err}");
    }
    assert_eq!(engine.translation_count(), 1);
}

#[test]
fn arguments_are_type_checked() {
    let engine = Engine::default();
    let mut store = Store::new(&engine, ());
    let module = module(
        &engine,
        r#"(module (func (export "id") (param i32) (result i32) local.get 0))"#,
    );
    let instance = Instance::new(&mut store, &module, &[]).unwrap();

    assert!(matches!(
        instance.invoke(&mut store, "id", &[Val::I64(1)]),
        Err(Error::TypeMismatch(_))
    ));
    assert!(matches!(
        instance.invoke(&mut store, "id", &[]),
        Err(Error::TypeMismatch(_))
    ));
    assert!(matches!(
        instance.get_typed_func::<i64, i32>(&store, "id"),
        Err(Error::TypeMismatch(_))
    ));
    assert_eq!(engine.translation_count(), 0);
}

#[test]
fn globals_tables_and_bulk_memory() {
    let engine = Engine::default();
    let mut store = Store::new(&engine, ());
    let module = module(
        &engine,
        r#"(module
            (memory (export "mem") 1)
            (table $t 4 funcref)
            (global $counter (export "counter") (mut i32) (i32.const 0))
            (func $one (result i32) i32.const 1)
            (func $two (result i32) i32.const 2)
            (elem func $one $two)
            (data "hello")
            (type $ret_i32 (func (result i32)))

            (func (export "init")
                i32.const 0
                i32.const 0
                i32.const 2
                table.init 0
                elem.drop 0
                i32.const 16
                i32.const 0
                i32.const 5
                memory.init 0
                data.drop 0
                i32.const 32
                i32.const 16
                i32.const 5
                memory.copy
                i32.const 37
                i32.const 33
                i32.const 3
                memory.fill)

            (func (export "call") (param i32) (result i32)
                global.get $counter
                i32.const 1
                i32.add
                global.set $counter
                local.get 0
                call_indirect (type $ret_i32))

            (func (export "grow") (result i32)
                ref.null func
                i32.const 2
                table.grow $t))"#,
    );

    let instance = Instance::new(&mut store, &module, &[]).unwrap();
    instance.invoke(&mut store, "init", &[]).unwrap();

    let memory = instance.get_memory(&store, "mem").unwrap();
    assert_eq!(&memory.data(&store)[16..21], b"hello");
    assert_eq!(&memory.data(&store)[32..40], b"hello!!!");

    let call = instance.get_typed_func::<i32, i32>(&store, "call").unwrap();
    assert_eq!(call.call(&mut store, 0).unwrap(), 1);
    assert_eq!(call.call(&mut store, 1).unwrap(), 2);
    let counter = instance.get_global(&store, "counter").unwrap();
    assert_eq!(counter.get(&store), Val::I32(2));

    assert_eq!(
        instance.invoke(&mut store, "grow", &[]).unwrap(),
        [Val::I32(4)]
    );

    // dropped segments behave as empty segments
    let err = instance.invoke(&mut store, "init", &[]).unwrap_err();
    assert!(err.as_trap().is_some(), "{err}");
}

#[test]
fn modules_from_files() {
    let engine = Engine::default();
    let wasm = wat::parse_str(
        r#"(module $named (func $answer (export "answer") (result i64) i64.const 42))"#,
    )
    .unwrap();

    let path = std::env::temp_dir().join(format!("kwasm-interp-{}.wasm", std::process::id()));
    std::fs::write(&path, &wasm).unwrap();
    let module = Module::from_file(&engine, &path);
    std::fs::remove_file(&path).unwrap();
    let module = module.unwrap();
    assert_eq!(module.name(), Some("named"));

    let mut store = Store::new(&engine, ());
    let instance = Instance::new(&mut store, &module, &[]).unwrap();
    assert_eq!(
        instance.invoke(&mut store, "answer", &[]).unwrap(),
        [Val::I64(42)]
    );

    let err = Module::from_file(&engine, path.with_extension("missing")).unwrap_err();
    assert!(matches!(err, Error::Io(_)), "{err}");
}
