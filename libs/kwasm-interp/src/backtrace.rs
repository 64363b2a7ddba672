// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;

/// The guest frames that were active when a trap unwound an invocation,
/// innermost first.
#[derive(Debug, Clone, Default)]
pub struct WasmBacktrace(Vec<FrameInfo>);

#[derive(Debug, Clone)]
pub struct FrameInfo {
    /// Index of the function in its module's function index space.
    pub func_index: u32,
    pub func_name: Option<String>,
    pub module_name: Option<String>,
    /// Byte offset in the module binary of the instruction that was
    /// executing, if known.
    pub offset: Option<usize>,
}

impl WasmBacktrace {
    pub(crate) fn new(frames: Vec<FrameInfo>) -> Self {
        Self(frames)
    }

    pub fn frames(&self) -> &[FrameInfo] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for WasmBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return Ok(());
        }

        writeln!(f)?;
        writeln!(f, "wasm backtrace:")?;
        for (i, frame) in self.0.iter().enumerate() {
            write!(f, "  {i:>3}: ")?;
            if let Some(offset) = frame.offset {
                write!(f, "{offset:#8x} - ")?;
            }
            if let Some(module) = &frame.module_name {
                write!(f, "{module}!")?;
            }
            match &frame.func_name {
                Some(name) => writeln!(f, "{name}")?,
                None => writeln!(f, "<wasm function {}>", frame.func_index)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_frames() {
        let backtrace = WasmBacktrace::new(vec![
            FrameInfo {
                func_index: 3,
                func_name: Some("inner".to_string()),
                module_name: Some("demo".to_string()),
                offset: Some(0x2a),
            },
            FrameInfo {
                func_index: 1,
                func_name: None,
                module_name: None,
                offset: None,
            },
        ]);

        let out = backtrace.to_string();
        assert!(out.contains("demo!inner"));
        assert!(out.contains("<wasm function 1>"));
        assert!(out.contains("0x2a"));
        assert!(WasmBacktrace::default().to_string().is_empty());
    }
}
