use heck::{ToShoutySnakeCase, ToSnakeCase, ToUpperCamelCase};

use crate::error::CompileError;

pub fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{}\"", text))
}

/// A Rust string literal for `text`.
pub fn rust_string_literal(text: &str) -> String {
    format!("{:?}", text)
}

/// `text` as a literal of `rust_type`: integer text becomes a float literal
/// for `f32` and `f64`.
pub fn numeric_literal(rust_type: &str, text: &str) -> String {
    let is_float = matches!(rust_type.trim(), "f32" | "f64");
    if is_float && text.trim().parse::<i64>().is_ok() {
        format!("{}.0", text.trim())
    } else {
        text.to_owned()
    }
}

pub fn error(msg: &str, line: usize, column: usize) -> CompileError {
    CompileError::ParseError {
        msg: msg.to_string(),
        line,
        column,
    }
}

/// Rust reserved words plus the method names every generated struct defines.
const RESERVED: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true",
    "type", "unsafe", "use", "where", "while", "new", "parse", "parse_protected",
    "parse_op_msg_request", "serialize", "serialize_op_msg_request", "to_bson",
    "with_required",
];

pub fn escape_rust_keyword(s: &str) -> String {
    if RESERVED.contains(&s) {
        format!("{}_", s)
    } else {
        s.to_string()
    }
}

pub fn title_case(name: &str) -> String {
    name.to_upper_camel_case()
}

pub fn snake_case(name: &str) -> String {
    name.to_snake_case()
}

pub fn shouty_case(name: &str) -> String {
    name.trim_end_matches('_').to_shouty_snake_case()
}

/// `kRed` becomes `Red`; anything else is title cased.
pub fn enum_variant_name(name: &str) -> String {
    let mut chars = name.chars();
    if let (Some('k'), Some(second)) = (chars.next(), chars.next()) {
        if second.is_ascii_uppercase() {
            return title_case(&name[1..]);
        }
    }
    title_case(name)
}

/// A serializer or deserializer written as a path (`module::func`) is a free
/// function; a bare identifier is a method on the value.
pub fn is_function_path(name: &str) -> bool {
    name.contains("::")
}

pub fn field_name_const(rust_name: &str) -> String {
    format!("{}_FIELD_NAME", shouty_case(rust_name))
}

pub fn default_const(rust_name: &str) -> String {
    format!("DEFAULT_{}", shouty_case(rust_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn naming_helpers() {
        assert_eq!(title_case("find_and_modify"), "FindAndModify");
        assert_eq!(snake_case("batchSize"), "batch_size");
        assert_eq!(escape_rust_keyword("type"), "type_");
        assert_eq!(escape_rust_keyword("serialize"), "serialize_");
        assert_eq!(escape_rust_keyword("name"), "name");
        assert_eq!(field_name_const("type_"), "TYPE_FIELD_NAME");
        assert_eq!(field_name_const("batch_size"), "BATCH_SIZE_FIELD_NAME");
        assert_eq!(default_const("count"), "DEFAULT_COUNT");
    }

    #[test]
    fn enum_variants_drop_k_prefix() {
        assert_eq!(enum_variant_name("kRed"), "Red");
        assert_eq!(enum_variant_name("kind"), "Kind");
        assert_eq!(enum_variant_name("zero_value"), "ZeroValue");
    }

    #[test]
    fn paths_versus_methods() {
        assert!(is_function_path("crate::codec::parse_point"));
        assert!(!is_function_path("to_string"));
        assert_eq!(quote("a\"b"), "\"a\\\"b\"");
    }

    #[test]
    fn float_literals() {
        assert_eq!(numeric_literal("f64", "5"), "5.0");
        assert_eq!(numeric_literal("f64", "2.5"), "2.5");
        assert_eq!(numeric_literal("i32", "5"), "5");
    }
}
