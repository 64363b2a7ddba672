// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Lazy translation of function bodies into flat instruction sequences.

mod func_translator;
pub mod isa;

use std::sync::Arc;

use kwasm_parser::{FunctionBody, ValType};

pub use func_translator::FuncTranslator;
pub use isa::InstrSeq;

use crate::Engine;
use crate::indices::{FuncIndex, TypeIndex};
use crate::translate::TranslatedModule;

#[derive(Debug, Clone, PartialEq, Eq, onlyerror::Error)]
pub enum TranslationError {
    /// A branch refers to a label that is not in scope.
    #[error("branch depth {depth} exceeds the {available} enclosing labels at {offset:#x}")]
    BranchDepthOutOfRange {
        depth: u32,
        available: usize,
        offset: usize,
    },
    /// A branch or block end leaves the wrong number of operands.
    #[error("expected {expected} operands but found {found} at {offset:#x}")]
    ArityMismatch {
        expected: u32,
        found: u32,
        offset: usize,
    },
    #[error("operand stack underflow at {offset:#x}")]
    StackUnderflow { offset: usize },
    /// An operand, block result or branch value has the wrong type.
    #[error("type mismatch: expected {expected} but found {found} at {offset:#x}")]
    TypeMismatch {
        expected: ValType,
        found: ValType,
        offset: usize,
    },
    #[error("select without a type annotation on {found} operands at {offset:#x}")]
    UntypedSelect { found: ValType, offset: usize },
    #[error("expected a reference but found {found} at {offset:#x}")]
    NotAReference { found: ValType, offset: usize },
    #[error("else without matching if at {offset:#x}")]
    ElseWithoutIf { offset: usize },
    /// The body has instructions after its final `end`, or lacks one.
    #[error("unbalanced end at {offset:#x}")]
    UnbalancedEnd { offset: usize },
    /// The body could not be decoded.
    #[error("{message} at {offset:#x}")]
    Malformed { message: String, offset: usize },
}

#[derive(Debug)]
enum CodeState {
    Pending(Arc<FunctionBody>),
    Materialized(Arc<InstrSeq>),
    Failed(TranslationError),
}

/// A function defined by a module.
///
/// The body starts out pending and is translated on first use. The result,
/// successful or not, is retained for the lifetime of the module.
#[derive(Debug)]
pub struct GuestFunction {
    pub(crate) index: FuncIndex,
    pub(crate) type_index: TypeIndex,
    pub(crate) num_params: u32,
    /// Types of the declared locals, excluding parameters.
    pub(crate) locals: Box<[ValType]>,
    code: spin::RwLock<CodeState>,
}

impl GuestFunction {
    pub(crate) fn new(
        module: &TranslatedModule,
        index: FuncIndex,
        body: FunctionBody,
    ) -> crate::Result<Self> {
        let type_index = module.functions[index];
        let num_params = u32::try_from(module.types[type_index].params().len())
            .map_err(|_| crate::translate::malformed("too many parameters", None))?;

        let locals = body
            .locals
            .iter()
            .flat_map(|(count, ty)| {
                core::iter::repeat_n(*ty, usize::try_from(*count).unwrap_or(usize::MAX))
            })
            .collect();

        Ok(Self {
            index,
            type_index,
            num_params,
            locals,
            code: spin::RwLock::new(CodeState::Pending(Arc::new(body))),
        })
    }

    pub fn is_materialized(&self) -> bool {
        matches!(*self.code.read(), CodeState::Materialized(_))
    }

    /// Returns the translated body, translating it first if necessary.
    ///
    /// # Errors
    ///
    /// Returns the [`TranslationError`] of the body. A failed translation is
    /// not retried.
    pub(crate) fn materialize(
        &self,
        engine: &Engine,
        module: &TranslatedModule,
    ) -> Result<Arc<InstrSeq>, TranslationError> {
        let body = match &*self.code.read() {
            CodeState::Materialized(seq) => return Ok(seq.clone()),
            CodeState::Failed(err) => return Err(err.clone()),
            CodeState::Pending(body) => body.clone(),
        };

        // translate without holding the lock, concurrent callers may race
        let res = FuncTranslator::new(module)
            .translate(self.index, &body)
            .map(Arc::new);

        let mut code = self.code.write();
        match &*code {
            CodeState::Materialized(seq) => Ok(seq.clone()),
            CodeState::Failed(err) => Err(err.clone()),
            CodeState::Pending(_) => {
                engine.record_translation();
                match res {
                    Ok(seq) => {
                        tracing::trace!(
                            index = self.index.as_u32(),
                            instrs = seq.len(),
                            "materialized function"
                        );
                        *code = CodeState::Materialized(seq.clone());
                        Ok(seq)
                    }
                    Err(err) => {
                        tracing::trace!(index = self.index.as_u32(), %err, "failed to materialize function");
                        *code = CodeState::Failed(err.clone());
                        Err(err)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use cranelift_entity::EntityRef;
    use kwasm_parser::{Parser, SliceCursor};

    use super::*;
    use crate::indices::DefinedFuncIndex;
    use crate::translate::ModuleTranslator;

    fn guest_function(wat: &str) -> (TranslatedModule, GuestFunction) {
        let wasm = wat::parse_str(wat).unwrap();
        let mut translation = ModuleTranslator::new()
            .translate(Parser::new(SliceCursor::new(&wasm)))
            .unwrap();
        let def = DefinedFuncIndex::new(0);
        let index = translation.module.func_index(def);
        let body = translation.function_bodies[def].clone();
        translation.function_bodies.clear();
        let func = GuestFunction::new(&translation.module, index, body).unwrap();
        (translation.module, func)
    }

    #[test]
    fn materialize_is_memoized() {
        let engine = Engine::default();
        let (module, func) =
            guest_function(r#"(module (func (param i32) (local i64 i64 f32) (nop)))"#);
        assert_eq!(func.num_params, 1);
        assert_eq!(
            &*func.locals,
            &[ValType::I64, ValType::I64, ValType::F32]
        );
        assert!(!func.is_materialized());

        let a = func.materialize(&engine, &module).unwrap();
        let b = func.materialize(&engine, &module).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(func.is_materialized());
        assert_eq!(engine.translation_count(), 1);
    }

    #[test]
    fn failures_are_memoized() {
        let engine = Engine::default();
        let (module, func) = guest_function(r#"(module (func (block br 3)))"#);

        let a = func.materialize(&engine, &module).unwrap_err();
        let b = func.materialize(&engine, &module).unwrap_err();
        assert_eq!(a, b);
        assert!(matches!(a, TranslationError::BranchDepthOutOfRange { .. }));
        assert_eq!(engine.translation_count(), 1);
    }

    #[test]
    fn concurrent_materialization_converges() {
        let engine = Engine::default();
        let (module, func) = guest_function(
            r#"(module (func (result i32) (local i32) i32.const 42 local.set 0 local.get 0))"#,
        );

        let seqs: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| func.materialize(&engine, &module).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for seq in &seqs {
            assert!(Arc::ptr_eq(seq, &seqs[0]));
        }
        assert_eq!(engine.translation_count(), 1);
    }
}
