//! Enum and variant code: declarations plus their `parse` / `serialize`.

use crate::ast::{AlternativeKind, Enum, EnumType, Variant};
use crate::common::rust_string_literal;
use crate::error::CompileError;
use crate::writer::IndentedTextWriter;

fn write_description(w: &mut IndentedTextWriter, description: &Option<String>) {
    if let Some(description) = description {
        for line in description.lines() {
            w.write_line(format!("/// {}", line.trim()).trim_end());
        }
    }
}

/// The wire value of `value` as a Rust pattern or literal.
fn value_literal(e: &Enum, value: &str) -> String {
    match e.enum_type {
        EnumType::String => rust_string_literal(value),
        EnumType::Int => value.to_owned(),
    }
}

pub fn write_enum_declaration(w: &mut IndentedTextWriter, e: &Enum) -> Result<(), CompileError> {
    let first = e.values.first().ok_or_else(|| {
        CompileError::Generate(format!("enum '{}' has no values", e.name))
    })?;

    write_description(w, &e.description);
    w.write_line("#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]");
    if e.enum_type == EnumType::Int {
        w.write_line("#[repr(i32)]");
    }
    w.block(&format!("pub enum {} {{", e.rust_name), "}", |w| {
        for value in &e.values {
            match e.enum_type {
                EnumType::String => w.write_line(format!("{},", value.rust_name)),
                EnumType::Int => w.write_line(format!("{} = {},", value.rust_name, value.value)),
            }
        }
        Ok(())
    })?;
    w.write_empty_line();

    w.block(&format!("impl Default for {} {{", e.rust_name), "}", |w| {
        w.block(&format!("fn default() -> {} {{", e.rust_name), "}", |w| {
            w.write_line(format!("{}::{}", e.rust_name, first.rust_name));
            Ok(())
        })
    })?;
    w.write_empty_line();
    Ok(())
}

pub fn write_enum_definition(w: &mut IndentedTextWriter, e: &Enum) -> Result<(), CompileError> {
    let (arg_type, return_type) = match e.enum_type {
        EnumType::String => ("&str", "&'static str"),
        EnumType::Int => ("i32", "i32"),
    };

    w.block(&format!("impl {} {{", e.rust_name), "}", |w| {
        w.block(
            &format!(
                "pub fn parse(ctxt: &ParserContext, value: {}) -> Result<{}, IdlError> {{",
                arg_type, e.rust_name
            ),
            "}",
            |w| {
                w.block("match value {", "}", |w| {
                    for value in &e.values {
                        w.write_line(format!(
                            "{} => Ok({}::{}),",
                            value_literal(e, &value.value),
                            e.rust_name,
                            value.rust_name
                        ));
                    }
                    w.write_line("_ => Err(ctxt.bad_enum_value(value)),");
                    Ok(())
                })
            },
        )?;
        w.write_empty_line();

        w.block(&format!("pub fn serialize(self) -> {} {{", return_type), "}", |w| {
            w.block("match self {", "}", |w| {
                for value in &e.values {
                    w.write_line(format!(
                        "{}::{} => {},",
                        e.rust_name,
                        value.rust_name,
                        value_literal(e, &value.value)
                    ));
                }
                Ok(())
            })
        })
    })?;
    w.write_empty_line();
    Ok(())
}

/// A variant field's storage enum. It gets `PartialEq`/`PartialOrd` only when
/// the owning struct compares its fields.
pub fn write_variant_declaration(
    w: &mut IndentedTextWriter,
    variant: &Variant,
    compared: bool,
) -> Result<(), CompileError> {
    let first = variant.alternatives.first().ok_or_else(|| {
        CompileError::Generate(format!("variant '{}' has no alternatives", variant.rust_name))
    })?;

    if compared {
        w.write_line("#[derive(Debug, Clone, PartialEq, PartialOrd)]");
    } else {
        w.write_line("#[derive(Debug, Clone)]");
    }
    w.block(&format!("pub enum {} {{", variant.rust_name), "}", |w| {
        for alternative in &variant.alternatives {
            w.write_line(format!(
                "{}({}),",
                alternative.rust_name,
                alternative_rust_type(&alternative.kind)
            ));
        }
        Ok(())
    })?;
    w.write_empty_line();

    w.block(&format!("impl Default for {} {{", variant.rust_name), "}", |w| {
        w.block(&format!("fn default() -> {} {{", variant.rust_name), "}", |w| {
            w.write_line(format!(
                "{}::{}(Default::default())",
                variant.rust_name, first.rust_name
            ));
            Ok(())
        })
    })?;
    w.write_empty_line();
    Ok(())
}

pub fn alternative_rust_type(kind: &AlternativeKind) -> &str {
    match kind {
        AlternativeKind::Basic(basic) => basic.rust_type.trim(),
        AlternativeKind::Struct(s) => &s.rust_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::EnumValue;

    fn color(enum_type: EnumType) -> Enum {
        let values = match enum_type {
            EnumType::String => vec![("Red", "red"), ("Blue", "blue")],
            EnumType::Int => vec![("Red", "0"), ("Blue", "7")],
        };
        Enum {
            name: "color".to_owned(),
            rust_name: "Color".to_owned(),
            description: Some("Paint colors".to_owned()),
            enum_type,
            values: values
                .into_iter()
                .map(|(rust_name, value)| EnumValue {
                    name:      rust_name.to_lowercase(),
                    rust_name: rust_name.to_owned(),
                    value:     value.to_owned(),
                })
                .collect(),
        }
    }

    #[test]
    fn string_enum_round_trips_through_match_arms() {
        let e = color(EnumType::String);
        let mut w = IndentedTextWriter::new();
        write_enum_definition(&mut w, &e).unwrap();
        let text = w.into_string();
        assert!(text.contains("pub fn parse(ctxt: &ParserContext, value: &str) -> Result<Color, IdlError> {"));
        assert!(text.contains("            \"red\" => Ok(Color::Red),"));
        assert!(text.contains("            _ => Err(ctxt.bad_enum_value(value)),"));
        assert!(text.contains("            Color::Blue => \"blue\","));
    }

    #[test]
    fn int_enum_is_repr_i32() {
        let e = color(EnumType::Int);
        let mut w = IndentedTextWriter::new();
        write_enum_declaration(&mut w, &e).unwrap();
        assert_eq!(
            w.into_string(),
            "/// Paint colors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i32)]
pub enum Color {
    Red = 0,
    Blue = 7,
}

impl Default for Color {
    fn default() -> Color {
        Color::Red
    }
}
"
        );
    }

    #[test]
    fn empty_enum_is_an_error() {
        let mut e = color(EnumType::String);
        e.values.clear();
        let mut w = IndentedTextWriter::new();
        assert!(write_enum_declaration(&mut w, &e).is_err());
        assert!(w.is_empty());
    }
}
