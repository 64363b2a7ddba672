// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ValType {
    I32,
    I64,
    F32,
    F64,
    V128,
    FuncRef,
    ExternRef,
}

impl ValType {
    pub fn is_ref(self) -> bool {
        matches!(self, ValType::FuncRef | ValType::ExternRef)
    }

    pub fn as_ref_type(self) -> Option<RefType> {
        match self {
            ValType::FuncRef => Some(RefType::FuncRef),
            ValType::ExternRef => Some(RefType::ExternRef),
            _ => None,
        }
    }
}

impl fmt::Display for ValType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValType::I32 => f.write_str("i32"),
            ValType::I64 => f.write_str("i64"),
            ValType::F32 => f.write_str("f32"),
            ValType::F64 => f.write_str("f64"),
            ValType::V128 => f.write_str("v128"),
            ValType::FuncRef => f.write_str("funcref"),
            ValType::ExternRef => f.write_str("externref"),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RefType {
    FuncRef,
    ExternRef,
}

impl From<RefType> for ValType {
    fn from(ty: RefType) -> Self {
        match ty {
            RefType::FuncRef => ValType::FuncRef,
            RefType::ExternRef => ValType::ExternRef,
        }
    }
}

impl fmt::Display for RefType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ValType::from(*self).fmt(f)
    }
}

/// The signature of a function.
///
/// Two function types are equal iff their parameter and result lists are
/// equal element-wise.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Default)]
pub struct FuncType {
    params: Box<[ValType]>,
    results: Box<[ValType]>,
}

impl FuncType {
    pub fn new(
        params: impl IntoIterator<Item = ValType>,
        results: impl IntoIterator<Item = ValType>,
    ) -> Self {
        Self {
            params: params.into_iter().collect(),
            results: results.into_iter().collect(),
        }
    }

    pub fn params(&self) -> &[ValType] {
        &self.params
    }

    pub fn results(&self) -> &[ValType] {
        &self.results
    }
}

impl fmt::Display for FuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(func")?;
        if !self.params.is_empty() {
            f.write_str(" (param")?;
            for ty in &self.params {
                write!(f, " {ty}")?;
            }
            f.write_str(")")?;
        }
        if !self.results.is_empty() {
            f.write_str(" (result")?;
            for ty in &self.results {
                write!(f, " {ty}")?;
            }
            f.write_str(")")?;
        }
        f.write_str(")")
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Limits {
    pub min: u32,
    pub max: Option<u32>,
}

impl Limits {
    /// Whether an object with these limits can stand in for an import that
    /// declared `expected`.
    pub fn matches(&self, expected: &Limits) -> bool {
        if self.min < expected.min {
            return false;
        }
        match (self.max, expected.max) {
            (_, None) => true,
            (Some(actual), Some(expected)) => actual <= expected,
            (None, Some(_)) => false,
        }
    }
}

impl fmt::Display for Limits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "{} {max}", self.min),
            None => write!(f, "{}", self.min),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MemoryType {
    pub limits: Limits,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TableType {
    pub element: RefType,
    pub limits: Limits,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Mutability {
    Const,
    Var,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct GlobalType {
    pub content: ValType,
    pub mutability: Mutability,
}

impl GlobalType {
    pub fn is_mutable(&self) -> bool {
        self.mutability == Mutability::Var
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BlockType {
    Empty,
    Value(ValType),
    /// Index into the type section.
    Func(u32),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MemArg {
    pub align: u32,
    pub offset: u64,
    pub memory: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn func_type_display() {
        let ty = FuncType::new([ValType::I32, ValType::F64], [ValType::ExternRef]);
        assert_eq!(
            ty.to_string(),
            "(func (param i32 f64) (result externref))"
        );
        assert_eq!(FuncType::default().to_string(), "(func)");
    }

    #[test]
    fn limits_subtyping() {
        let declared = Limits {
            min: 1,
            max: Some(4),
        };

        assert!(Limits { min: 2, max: Some(3) }.matches(&declared));
        assert!(!Limits { min: 0, max: Some(3) }.matches(&declared));
        assert!(!Limits { min: 2, max: None }.matches(&declared));
        assert!(Limits { min: 1, max: None }.matches(&Limits { min: 1, max: None }));
    }
}
