// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::limits::MAX_WASM_NAMES;
use crate::{BinaryReader, ByteCursor, SliceCursor};

const MODULE_NAME: u8 = 0;
const FUNCTION_NAMES: u8 = 1;

/// Debug names recovered from the `name` custom section.
#[derive(Debug, Default, Clone)]
pub struct Names {
    pub module: Option<String>,
    /// `(function index, name)` pairs in the order they were declared.
    pub functions: Vec<(u32, String)>,
}

/// Parses the payload of a `name` custom section.
///
/// Subsections other than the module and function names are skipped.
///
/// # Errors
///
/// Fails on any malformed subsection.
pub fn parse_name_section(data: &[u8], offset: usize) -> crate::Result<Names> {
    let mut reader = BinaryReader::new(SliceCursor::with_base(data, offset));
    let mut names = Names::default();

    while !reader.is_at_end()? {
        let id = reader.read_u8()?;
        let len = usize::try_from(reader.read_var_u32()?).unwrap_or(usize::MAX);
        let position = reader.position();
        let bytes = reader.cursor_mut().consume_n(len)?;
        let mut sub = BinaryReader::new(SliceCursor::with_base(bytes, position));

        match id {
            MODULE_NAME => names.module = Some(sub.read_name()?),
            FUNCTION_NAMES => {
                names.functions = sub.read_vec(MAX_WASM_NAMES, "too many names", |r| {
                    Ok((r.read_var_u32()?, r.read_name()?))
                })?;
            }
            _ => {}
        }
    }

    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Parser, Section};

    #[test]
    fn module_and_function_names() {
        let wasm = wat::parse_str(
            r#"(module $demo
                (func $first)
                (func $second))"#,
        )
        .unwrap();

        let custom = Parser::new(SliceCursor::new(&wasm))
            .filter_map(Result::ok)
            .find_map(|section| match section {
                Section::Custom(custom) if custom.name == "name" => Some(custom),
                _ => None,
            })
            .unwrap();

        let names = parse_name_section(&custom.data, custom.data_offset).unwrap();
        assert_eq!(names.module.as_deref(), Some("demo"));
        assert_eq!(
            names.functions,
            vec![(0, "first".to_string()), (1, "second".to_string())]
        );
    }
}
