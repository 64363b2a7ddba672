// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The interpreter.
//!
//! One [`Executor`] runs one invocation: a value stack shared by all guest
//! frames of the invocation (locals live at each frame's base, operands on
//! top) and a separate frame stack. Host functions called from guest code run
//! on the Rust stack and may start nested invocations through their
//! [`Caller`](crate::Caller).

mod numeric;

use core::ops::Range;
use std::sync::Arc;

use kwasm_parser::LoadOp;
use smallvec::SmallVec;

use crate::Error;
use crate::backtrace::{FrameInfo, WasmBacktrace};
use crate::compile::InstrSeq;
use crate::compile::isa::{BranchTarget, DropKeep, Instr};
use crate::func::{Func, FuncKind, HostFunc};
use crate::indices::{
    DataIndex, DefinedFuncIndex, ElemIndex, GlobalIndex, MemoryIndex, TableIndex,
};
use crate::inspect::{CallHook, FrameView};
use crate::instance::{Instance, InstanceData};
use crate::memory::MemoryData;
use crate::module::Module;
use crate::store::{StoreInner, StoreOpaque, Stored};
use crate::table::TableData;
use crate::trap::Trap;
use crate::values::{Val, VmVal};

/// Runs `func` with already type checked `args` and returns its results.
pub(crate) fn invoke<T: 'static>(
    store: &mut StoreInner<T>,
    func: Func,
    args: &[VmVal],
) -> crate::Result<Vec<VmVal>> {
    if let FuncKind::Host(host) = &store.get_function(func.0).kind {
        let host = host.clone();
        return call_host(store, &host, None, args).map(SmallVec::into_vec);
    }

    let mut exec = Executor::new(store);
    let res = exec.run(store, func, args);
    exec.finish(store, res)
}

/// Lifts `args`, runs the host closure and lowers its results after checking
/// them against the declared result types.
fn call_host<T: 'static>(
    store: &mut StoreInner<T>,
    host: &HostFunc,
    caller: Option<Instance>,
    args: &[VmVal],
) -> crate::Result<SmallVec<[VmVal; 4]>> {
    let ty = host.ty();
    let params: SmallVec<[Val; 8]> = args
        .iter()
        .zip(ty.params())
        .map(|(arg, ty)| Val::from_vmval(store, *arg, *ty))
        .collect();
    let mut results: SmallVec<[Val; 4]> = ty
        .results()
        .iter()
        .map(|ty| Val::default_for_ty(*ty))
        .collect();

    host.call(store, caller, &params, &mut results)?;

    results
        .iter()
        .zip(ty.results())
        .map(|(val, ty)| {
            val.ensure_matches_ty(store, *ty)?;
            Ok(val.to_vmval())
        })
        .collect()
}

struct Frame {
    instance: Instance,
    module: Module,
    def_index: DefinedFuncIndex,
    code: Arc<InstrSeq>,
    /// Index of the next instruction.
    pc: usize,
    /// Value stack index of the first local.
    base: usize,
}

#[derive(Default)]
struct ValueStack {
    slots: Vec<VmVal>,
}

impl ValueStack {
    #[inline]
    fn push(&mut self, val: VmVal) {
        self.slots.push(val);
    }

    #[inline]
    fn pop(&mut self) -> VmVal {
        debug_assert!(!self.slots.is_empty(), "value stack underflow");
        self.slots.pop().unwrap_or_default()
    }

    #[inline]
    fn pop_u32(&mut self) -> u32 {
        self.pop().as_u32()
    }

    #[inline]
    fn top(&self) -> VmVal {
        debug_assert!(!self.slots.is_empty(), "value stack underflow");
        self.slots.last().copied().unwrap_or_default()
    }

    fn len(&self) -> usize {
        self.slots.len()
    }

    /// Removes the `drop` values below the topmost `keep` values.
    fn drop_keep(&mut self, drop_keep: DropKeep) {
        let (drop, keep) = (drop_keep.drop as usize, drop_keep.keep as usize);
        if drop == 0 {
            return;
        }
        let len = self.slots.len();
        self.slots.copy_within(len - keep..len, len - keep - drop);
        self.slots.truncate(len - drop);
    }
}

struct Executor {
    stack: ValueStack,
    frames: Vec<Frame>,
    /// Guest frames live in enclosing invocations.
    depth_base: usize,
    /// Value stack slots live in enclosing invocations.
    stack_base: usize,
    max_call_depth: usize,
    max_value_stack: usize,
}

impl Executor {
    fn new(store: &mut StoreOpaque) -> Self {
        let mut slots = core::mem::take(&mut store.stack_cache);
        slots.clear();
        let config = store.engine().config();
        Self {
            stack: ValueStack { slots },
            frames: Vec::new(),
            depth_base: store.call_depth,
            stack_base: store.stack_height,
            max_call_depth: config.max_call_depth,
            max_value_stack: config.max_value_stack,
        }
    }

    fn run<T: 'static>(
        &mut self,
        store: &mut StoreInner<T>,
        func: Func,
        args: &[VmVal],
    ) -> crate::Result<()> {
        self.stack.slots.extend_from_slice(args);
        self.call(store, func)?;
        self.execute(store)
    }

    /// Collects the results or turns the error into a trap with backtrace,
    /// and hands the value stack back to the store.
    fn finish(
        mut self,
        store: &mut StoreOpaque,
        res: crate::Result<()>,
    ) -> crate::Result<Vec<VmVal>> {
        let res = match res {
            Ok(()) => Ok(self.stack.slots.clone()),
            Err(Error::Trap { trap, trace }) => {
                tracing::debug!(%trap, depth = self.frames.len(), "trap unwound invocation");
                let trace = if trace.is_empty() {
                    self.backtrace()
                } else {
                    trace
                };
                Err(Error::Trap { trap, trace })
            }
            Err(err) => Err(err),
        };

        store.call_depth = self.depth_base;
        store.stack_height = self.stack_base;
        self.stack.slots.clear();
        store.stack_cache = self.stack.slots;
        res
    }

    fn backtrace(&self) -> WasmBacktrace {
        let frames = self
            .frames
            .iter()
            .rev()
            .map(|frame| {
                let index = frame.module.translated().func_index(frame.def_index);
                FrameInfo {
                    func_index: index.as_u32(),
                    func_name: frame.module.func_name(index).map(ToString::to_string),
                    module_name: frame.module.name().map(ToString::to_string),
                    offset: frame
                        .pc
                        .checked_sub(1)
                        .and_then(|pc| frame.code.offset_of(pc)),
                }
            })
            .collect();
        WasmBacktrace::new(frames)
    }

    fn depth(&self) -> usize {
        self.depth_base + self.frames.len()
    }

    /// Calls `func` with its arguments on top of the value stack.
    fn call<T: 'static>(&mut self, store: &mut StoreInner<T>, func: Func) -> crate::Result<()> {
        match &store.get_function(func.0).kind {
            FuncKind::Wasm {
                instance,
                module,
                def_index,
            } => {
                let (instance, module, def_index) = (*instance, module.clone(), *def_index);
                self.push_frame(store, instance, module, def_index)
            }
            FuncKind::Host(host) => {
                let host = host.clone();
                let caller = self.frames.last().map(|frame| frame.instance);
                let start = self.stack.len().saturating_sub(host.ty().params().len());
                let args: SmallVec<[VmVal; 8]> = self.stack.slots.drain(start..).collect();

                store.call_depth = self.depth();
                store.stack_height = self.stack_base + self.stack.len();
                let res = call_host(store, &host, caller, &args);
                store.call_depth = self.depth_base;
                store.stack_height = self.stack_base;

                self.stack.slots.extend(res?);
                Ok(())
            }
        }
    }

    fn push_frame<T: 'static>(
        &mut self,
        store: &mut StoreInner<T>,
        instance: Instance,
        module: Module,
        def_index: DefinedFuncIndex,
    ) -> crate::Result<()> {
        if self.depth() >= self.max_call_depth {
            return Err(Trap::StackOverflow.into());
        }
        if store.epoch_deadline_reached() {
            return Err(Trap::Interrupted.into());
        }

        let code = module.materialize(def_index)?;
        let guest = module.function(def_index);
        let num_params = guest.num_params as usize;
        let num_locals = num_params + guest.locals.len();

        let base = self.stack.len().saturating_sub(num_params);
        let frame_top = base + num_locals + code.max_stack_height as usize;
        if self.stack_base + frame_top > self.max_value_stack {
            return Err(Trap::StackOverflow.into());
        }
        // declared locals start out zeroed, which is also the null reference
        self.stack.slots.resize(base + num_locals, VmVal::ZERO);

        self.frames.push(Frame {
            instance,
            module,
            def_index,
            code,
            pc: 0,
            base,
        });

        if store.has_call_hook() {
            self.fire_call_hook(store, CallHook::Enter)?;
        }
        Ok(())
    }

    /// Pops the current frame, moving its results to the frame base.
    fn pop_frame<T: 'static>(&mut self, store: &mut StoreInner<T>) -> crate::Result<()> {
        if store.has_call_hook() {
            self.fire_call_hook(store, CallHook::Exit)?;
        }

        let Some(frame) = self.frames.pop() else {
            return Ok(());
        };
        let num_results = frame.code.num_results as usize;
        let len = self.stack.len();
        self.stack
            .slots
            .copy_within(len - num_results..len, frame.base);
        self.stack.slots.truncate(frame.base + num_results);
        Ok(())
    }

    fn fire_call_hook<T: 'static>(
        &self,
        store: &mut StoreInner<T>,
        kind: CallHook,
    ) -> crate::Result<()> {
        let Some(frame) = self.frames.last() else {
            return Ok(());
        };
        let Some(mut hook) = store.take_call_hook() else {
            return Ok(());
        };

        let res = {
            let store: &StoreOpaque = store;
            let module = frame.module.translated();
            let guest = frame.module.function(frame.def_index);
            let num_locals = guest.num_params as usize + guest.locals.len();
            let params = module
                .types
                .get(guest.type_index)
                .map_or(&[][..], |ty| ty.params());
            let view = FrameView {
                store,
                memory: store
                    .get_instance(frame.instance.0)
                    .memories
                    .values()
                    .next()
                    .copied(),
                func_index: module.func_index(frame.def_index).as_u32(),
                depth: self.depth() - 1,
                offset: frame
                    .code
                    .offset_of(frame.pc.saturating_sub(1))
                    .unwrap_or_default(),
                base: self.stack_base + frame.base,
                params,
                locals: &guest.locals,
                slots: self
                    .stack
                    .slots
                    .get(frame.base..frame.base + num_locals)
                    .unwrap_or_default(),
            };
            hook(kind, &view)
        };

        store.restore_call_hook(hook);
        res.map_err(|err| match err.downcast::<Error>() {
            Ok(err) => err,
            Err(err) => Error::Host(err),
        })
    }

    fn branch(&mut self, store: &StoreOpaque, pc: usize, target: BranchTarget) -> crate::Result<()> {
        let target_pc = target.pc as usize;
        // back edges are where loops spin
        if target_pc <= pc && store.epoch_deadline_reached() {
            return Err(Trap::Interrupted.into());
        }
        self.stack.drop_keep(target.drop_keep);
        if let Some(frame) = self.frames.last_mut() {
            frame.pc = target_pc;
        }
        Ok(())
    }

    #[expect(clippy::too_many_lines, reason = "big match statement")]
    fn execute<T: 'static>(&mut self, store: &mut StoreInner<T>) -> crate::Result<()> {
        loop {
            let Some(frame) = self.frames.last_mut() else {
                return Ok(());
            };
            let pc = frame.pc;
            let Some(instr) = frame.code.instrs.get(pc).copied() else {
                // falling off the end is prevented by the trailing `return`
                return Err(Trap::UnreachableCodeReached.into());
            };
            frame.pc += 1;
            let (instance, base) = (frame.instance, frame.base);

            match instr {
                Instr::Unreachable => return Err(Trap::UnreachableCodeReached.into()),
                Instr::Br(target) => self.branch(store, pc, target)?,
                Instr::BrIfNez(target) => {
                    if self.stack.pop_u32() != 0 {
                        self.branch(store, pc, target)?;
                    }
                }
                Instr::BrIfEqz(target) => {
                    if self.stack.pop_u32() == 0 {
                        self.branch(store, pc, target)?;
                    }
                }
                Instr::BrTable { start, len } => {
                    let index = self.stack.pop_u32().min(len.saturating_sub(1));
                    let target = self.frames.last().and_then(|frame| {
                        frame
                            .code
                            .br_tables
                            .get(start as usize + index as usize)
                            .copied()
                    });
                    let Some(target) = target else {
                        return Err(Trap::UnreachableCodeReached.into());
                    };
                    self.branch(store, pc, target)?;
                }
                Instr::Return => self.pop_frame(store)?,
                Instr::Call(index) => {
                    let func = instance_data(store, instance).functions[index];
                    self.call(store, func)?;
                }
                Instr::CallIndirect { ty, table } => {
                    let index = self.stack.pop_u32();
                    let table = instance_data(store, instance).tables[table];
                    let slot = store
                        .get_table(table.0)
                        .get(index)
                        .ok_or(Trap::TableOutOfBounds)?;
                    let func = store.func_at(slot.as_ref().ok_or(Trap::IndirectCallToNull)?);

                    let expected = self
                        .frames
                        .last()
                        .map(|frame| frame.module.type_id(ty));
                    if Some(store.get_function(func.0).type_id) != expected {
                        return Err(Trap::BadSignature.into());
                    }
                    self.call(store, func)?;
                }

                Instr::Drop => {
                    self.stack.pop();
                }
                Instr::Select => {
                    let cond = self.stack.pop_u32();
                    let b = self.stack.pop();
                    let a = self.stack.pop();
                    self.stack.push(if cond != 0 { a } else { b });
                }

                Instr::LocalGet(index) => {
                    let val = self.stack.slots[base + index as usize];
                    self.stack.push(val);
                }
                Instr::LocalSet(index) => {
                    let val = self.stack.pop();
                    self.stack.slots[base + index as usize] = val;
                }
                Instr::LocalTee(index) => {
                    let val = self.stack.top();
                    self.stack.slots[base + index as usize] = val;
                }
                Instr::GlobalGet(index) => {
                    let global = global_handle(store, instance, index);
                    self.stack.push(store.get_global(global).value);
                }
                Instr::GlobalSet(index) => {
                    let global = global_handle(store, instance, index);
                    store.get_global_mut(global).value = self.stack.pop();
                }

                Instr::TableGet(table) => {
                    let index = self.stack.pop_u32();
                    let table = table_handle(store, instance, table);
                    let val = store
                        .get_table(table)
                        .get(index)
                        .ok_or(Trap::TableOutOfBounds)?;
                    self.stack.push(val);
                }
                Instr::TableSet(table) => {
                    let val = self.stack.pop();
                    let index = self.stack.pop_u32();
                    let table = table_handle(store, instance, table);
                    store
                        .get_table_mut(table)
                        .set(index, val)
                        .ok_or(Trap::TableOutOfBounds)?;
                }
                Instr::TableSize(table) => {
                    let table = table_handle(store, instance, table);
                    self.stack.push(VmVal::from_u32(store.get_table(table).size()));
                }
                Instr::TableGrow(table) => {
                    let delta = self.stack.pop_u32();
                    let init = self.stack.pop();
                    let table = table_handle(store, instance, table);
                    let old = store
                        .grow_table(table, delta, init)
                        .map_or(VmVal::from_i32(-1), VmVal::from_u32);
                    self.stack.push(old);
                }
                Instr::TableFill(table) => {
                    let len = self.stack.pop_u32();
                    let val = self.stack.pop();
                    let dst = self.stack.pop_u32();
                    let table = table_handle(store, instance, table);
                    let elements = store.get_table_mut(table).elements_mut();
                    let range =
                        checked_range(dst, len, elements.len()).ok_or(Trap::TableOutOfBounds)?;
                    elements[range].fill(val);
                }
                Instr::TableCopy { dst, src } => {
                    let len = self.stack.pop_u32();
                    let src_index = self.stack.pop_u32();
                    let dst_index = self.stack.pop_u32();
                    let src = table_handle(store, instance, src);
                    let dst = table_handle(store, instance, dst);

                    let elements = store.get_table(src).elements();
                    let src_range = checked_range(src_index, len, elements.len())
                        .ok_or(Trap::TableOutOfBounds)?;
                    let tmp: SmallVec<[VmVal; 16]> = elements[src_range].iter().copied().collect();
                    let elements = store.get_table_mut(dst).elements_mut();
                    let dst_range = checked_range(dst_index, len, elements.len())
                        .ok_or(Trap::TableOutOfBounds)?;
                    elements[dst_range].copy_from_slice(&tmp);
                }
                Instr::TableInit { elem, table } => {
                    let len = self.stack.pop_u32();
                    let src = self.stack.pop_u32();
                    let dst = self.stack.pop_u32();
                    let segment = elem_segment(store, instance, elem);
                    let src_range =
                        checked_range(src, len, segment.len()).ok_or(Trap::TableOutOfBounds)?;
                    let items: SmallVec<[VmVal; 16]> =
                        segment[src_range].iter().copied().collect();

                    let table = table_handle(store, instance, table);
                    let elements = store.get_table_mut(table).elements_mut();
                    let dst_range =
                        checked_range(dst, len, elements.len()).ok_or(Trap::TableOutOfBounds)?;
                    elements[dst_range].copy_from_slice(&items);
                }
                Instr::ElemDrop(elem) => {
                    if let Some(segment) = store
                        .get_instance_mut(instance.0)
                        .elements
                        .get_mut(elem)
                    {
                        *segment = Box::default();
                    }
                }

                Instr::Load {
                    op,
                    memory,
                    offset,
                } => {
                    let addr = self.stack.pop_u32();
                    let memory = memory_handle(store, instance, memory);
                    let bytes = store.get_memory(memory).bytes();
                    let range = effective_range(addr, offset, op.width(), bytes.len())
                        .ok_or(Trap::MemoryOutOfBounds)?;
                    self.stack.push(load(op, &bytes[range]));
                }
                Instr::Store {
                    op,
                    memory,
                    offset,
                } => {
                    let val = self.stack.pop();
                    let addr = self.stack.pop_u32();
                    let memory = memory_handle(store, instance, memory);
                    let bytes = store.get_memory_mut(memory).bytes_mut();
                    let range = effective_range(addr, offset, op.width(), bytes.len())
                        .ok_or(Trap::MemoryOutOfBounds)?;
                    let width = range.len();
                    bytes[range].copy_from_slice(&val.as_u64().to_le_bytes()[..width]);
                }
                Instr::MemorySize(memory) => {
                    let memory = memory_handle(store, instance, memory);
                    self.stack.push(VmVal::from_u32(store.get_memory(memory).size()));
                }
                Instr::MemoryGrow(memory) => {
                    let delta = self.stack.pop_u32();
                    let memory = memory_handle(store, instance, memory);
                    let old = store
                        .grow_memory(memory, delta)
                        .map_or(VmVal::from_i32(-1), VmVal::from_u32);
                    self.stack.push(old);
                }
                Instr::MemoryFill(memory) => {
                    let len = self.stack.pop_u32();
                    let val = self.stack.pop_u32();
                    let dst = self.stack.pop_u32();
                    let memory = memory_handle(store, instance, memory);
                    let bytes = store.get_memory_mut(memory).bytes_mut();
                    let range =
                        checked_range(dst, len, bytes.len()).ok_or(Trap::MemoryOutOfBounds)?;
                    #[expect(clippy::cast_possible_truncation, reason = "fill takes the low byte")]
                    bytes[range].fill(val as u8);
                }
                Instr::MemoryCopy { dst, src } => {
                    let len = self.stack.pop_u32();
                    let src_addr = self.stack.pop_u32();
                    let dst_addr = self.stack.pop_u32();
                    let src = memory_handle(store, instance, src);
                    let dst = memory_handle(store, instance, dst);

                    if src == dst {
                        let bytes = store.get_memory_mut(dst).bytes_mut();
                        let src_range = checked_range(src_addr, len, bytes.len())
                            .ok_or(Trap::MemoryOutOfBounds)?;
                        let dst_range = checked_range(dst_addr, len, bytes.len())
                            .ok_or(Trap::MemoryOutOfBounds)?;
                        bytes.copy_within(src_range, dst_range.start);
                    } else {
                        let bytes = store.get_memory(src).bytes();
                        let src_range = checked_range(src_addr, len, bytes.len())
                            .ok_or(Trap::MemoryOutOfBounds)?;
                        let tmp = bytes[src_range].to_vec();
                        let bytes = store.get_memory_mut(dst).bytes_mut();
                        let dst_range = checked_range(dst_addr, len, bytes.len())
                            .ok_or(Trap::MemoryOutOfBounds)?;
                        bytes[dst_range].copy_from_slice(&tmp);
                    }
                }
                Instr::MemoryInit { data, memory } => {
                    let len = self.stack.pop_u32();
                    let src = self.stack.pop_u32();
                    let dst = self.stack.pop_u32();
                    let segment = data_segment(store, instance, data);
                    let src_range =
                        checked_range(src, len, segment.len()).ok_or(Trap::MemoryOutOfBounds)?;

                    let memory = memory_handle(store, instance, memory);
                    let bytes = store.get_memory_mut(memory).bytes_mut();
                    let dst_range =
                        checked_range(dst, len, bytes.len()).ok_or(Trap::MemoryOutOfBounds)?;
                    bytes[dst_range].copy_from_slice(&segment[src_range]);
                }
                Instr::DataDrop(data) => {
                    if let Some(segment) = store.get_instance_mut(instance.0).data.get_mut(data) {
                        *segment = Arc::from(&[][..]);
                    }
                }

                Instr::Const32(bits) => self.stack.push(VmVal::from_u32(bits)),
                Instr::Const64(bits) => self.stack.push(VmVal::from_u64(bits)),
                Instr::RefNull => self.stack.push(VmVal::ZERO),
                Instr::RefIsNull => {
                    let val = self.stack.pop();
                    self.stack.push(VmVal::from_bool(val.is_null_ref()));
                }
                Instr::RefFunc(index) => {
                    let func = instance_data(store, instance).functions[index];
                    self.stack.push(VmVal::from_ref(Some(func.arena_index())));
                }

                Instr::Numeric(op) => {
                    let val = if op.operands() == 1 {
                        let x = self.stack.pop();
                        numeric::unary(op, x)?
                    } else {
                        let b = self.stack.pop();
                        let a = self.stack.pop();
                        numeric::binary(op, a, b)?
                    };
                    self.stack.push(val);
                }
            }
        }
    }
}

fn instance_data(store: &StoreOpaque, instance: Instance) -> &InstanceData {
    store.get_instance(instance.0)
}

fn global_handle(
    store: &StoreOpaque,
    instance: Instance,
    index: GlobalIndex,
) -> Stored<crate::global::GlobalData> {
    instance_data(store, instance).globals[index].0
}

fn table_handle(store: &StoreOpaque, instance: Instance, index: TableIndex) -> Stored<TableData> {
    instance_data(store, instance).tables[index].0
}

fn memory_handle(
    store: &StoreOpaque,
    instance: Instance,
    index: MemoryIndex,
) -> Stored<MemoryData> {
    instance_data(store, instance).memories[index].0
}

fn elem_segment(store: &StoreOpaque, instance: Instance, index: ElemIndex) -> &[VmVal] {
    instance_data(store, instance)
        .elements
        .get(index)
        .map_or(&[][..], |segment| &segment[..])
}

fn data_segment(store: &StoreOpaque, instance: Instance, index: DataIndex) -> Arc<[u8]> {
    instance_data(store, instance)
        .data
        .get(index)
        .cloned()
        .unwrap_or_else(|| Arc::from(&[][..]))
}

/// `start..start + len`, if it lies within `0..size`.
fn checked_range(start: u32, len: u32, size: usize) -> Option<Range<usize>> {
    let end = u64::from(start) + u64::from(len);
    if end > size as u64 {
        return None;
    }
    Some(start as usize..usize::try_from(end).ok()?)
}

/// The bytes accessed by a load or store of `width` bytes at `addr + offset`.
fn effective_range(addr: u32, offset: u64, width: usize, size: usize) -> Option<Range<usize>> {
    let start = u64::from(addr).checked_add(offset)?;
    let end = start.checked_add(width as u64)?;
    if end > size as u64 {
        return None;
    }
    Some(usize::try_from(start).ok()?..usize::try_from(end).ok()?)
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_lossless,
    reason = "loads sign or zero extend narrow values"
)]
fn load(op: LoadOp, bytes: &[u8]) -> VmVal {
    let mut buf = [0; 8];
    buf[..bytes.len()].copy_from_slice(bytes);
    let raw = u64::from_le_bytes(buf);

    match op {
        LoadOp::I32Load
        | LoadOp::F32Load
        | LoadOp::I32Load8U
        | LoadOp::I32Load16U
        | LoadOp::I64Load
        | LoadOp::F64Load
        | LoadOp::I64Load8U
        | LoadOp::I64Load16U
        | LoadOp::I64Load32U => VmVal::from_u64(raw),
        LoadOp::I32Load8S => VmVal::from_i32(raw as u8 as i8 as i32),
        LoadOp::I32Load16S => VmVal::from_i32(raw as u16 as i16 as i32),
        LoadOp::I64Load8S => VmVal::from_i64(raw as u8 as i8 as i64),
        LoadOp::I64Load16S => VmVal::from_i64(raw as u16 as i16 as i64),
        LoadOp::I64Load32S => VmVal::from_i64(raw as u32 as i32 as i64),
    }
}
