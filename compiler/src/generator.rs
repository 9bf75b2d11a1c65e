//! Turns a bound [Idl] into the declarations and definitions files.
//!
//! The declarations file holds the types, constants, constructors and
//! accessors. The definitions file `include!`s it and adds the decoders,
//! encoders, validators, server parameters and config options.

use crate::ast::{
    AlternativeKind, BasicType, Condition, ConfigOption, EnumType, Expression, Field,
    FieldKind, Idl, ServerParameter, Struct, Validator, Variant,
};
use crate::bson::{bindata_subtype_expr, element_type_expr, get_bson_type_info};
use crate::common::{
    default_const, field_name_const, is_function_path, numeric_literal, rust_string_literal,
    snake_case,
};
use crate::enum_types::{
    write_enum_declaration, write_enum_definition, write_variant_declaration,
};
use crate::error::CompileError;
use crate::field_usage::FieldUsageChecker;
use crate::rust_types::{
    contains_embedded_document, get_element_rust_type, get_rust_type, is_primitive_scalar_type,
};
use crate::struct_types::StructTypeInfo;
use crate::writer::IndentedTextWriter;

/// The text of both generated files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedCode {
    pub header: String,
    pub source: String,
}

fn generate_error(msg: String) -> CompileError {
    CompileError::Generate(msg)
}

fn banner(input_name: &str) -> String {
    format!("// Generated by bidlc from {}. Do not edit.", input_name)
}

fn write_description(w: &mut IndentedTextWriter, description: &Option<String>) {
    if let Some(description) = description {
        for line in description.lines() {
            w.write_line(format!("/// {}", line.trim()).trim_end());
        }
    }
}

/// Where a decoder reads one element from, and the names errors use.
#[derive(Debug, Clone, Copy)]
pub struct ElementSource<'s> {
    /// Context the type checks run against.
    pub ctxt:       &'s str,
    /// The same context as a `&ParserContext` expression.
    pub ctxt_ref:   &'s str,
    pub field_name: &'s str,
    pub element:    &'s str,
    /// Name for child contexts of nested structs and enums.
    pub child_name: &'s str,
}

fn deserializer_call(basic: &BasicType, argument: &str) -> Result<String, CompileError> {
    let deserializer = basic.deserializer.as_deref().ok_or_else(|| {
        generate_error(format!("type '{}' has no deserializer", basic.name))
    })?;
    if is_function_path(deserializer) {
        return Ok(format!("{}({})?", deserializer, argument));
    }
    let rust_type = basic.rust_type.trim();
    if rust_type.contains('<') {
        Ok(format!("<{}>::{}({})?", rust_type, deserializer, argument))
    } else {
        Ok(format!("{}::{}({})?", rust_type, deserializer, argument))
    }
}

fn element_type_list(tags: &[String]) -> Result<String, CompileError> {
    let exprs = tags
        .iter()
        .map(|tag| {
            element_type_expr(tag)
                .ok_or_else(|| generate_error(format!("'{}' has no element type", tag)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!("&[{}]", exprs.join(", ")))
}

fn bindata_subtype(basic: &BasicType) -> Result<&'static str, CompileError> {
    basic
        .bindata_subtype
        .as_deref()
        .and_then(bindata_subtype_expr)
        .ok_or_else(|| generate_error(format!("type '{}' needs a bindata_subtype", basic.name)))
}

/// Decoded value of a single-tag type, after the type check has run.
fn single_tag_value(basic: &BasicType, tag: &str, element: &str) -> Result<String, CompileError> {
    let info = get_bson_type_info(tag)
        .ok_or_else(|| generate_error(format!("unknown bson type '{}'", tag)))?;
    let accessor = info
        .accessor
        .ok_or_else(|| generate_error(format!("bson type '{}' cannot be decoded", tag)))?;
    let view = format!("{}.{}", element, accessor);
    if basic.deserializer.is_some() {
        deserializer_call(basic, &view)
    } else {
        Ok(format!("{}{}", view, info.to_owned))
    }
}

fn write_type_check(
    w: &mut IndentedTextWriter,
    basic: &BasicType,
    tag: &str,
    source: &ElementSource,
) -> Result<(), CompileError> {
    if tag == "bindata" {
        w.write_line(format!(
            "{}.check_and_assert_bin_data_type({}, {}, {})?;",
            source.ctxt,
            source.field_name,
            source.element,
            bindata_subtype(basic)?
        ));
    } else {
        let element_type = element_type_expr(tag)
            .ok_or_else(|| generate_error(format!("unknown bson type '{}'", tag)))?;
        w.write_line(format!(
            "{}.check_and_assert_type({}, {}, {})?;",
            source.ctxt, source.field_name, source.element, element_type
        ));
    }
    Ok(())
}

fn basic_value_expr(
    w: &mut IndentedTextWriter,
    basic: &BasicType,
    source: &ElementSource,
) -> Result<String, CompileError> {
    if basic.is_any() {
        return deserializer_call(basic, source.element);
    }
    match basic.single_bson_type() {
        Some(tag) => {
            write_type_check(w, basic, tag, source)?;
            single_tag_value(basic, tag, source.element)
        }
        None => {
            w.write_line(format!(
                "{}.check_and_assert_types({}, {}, {})?;",
                source.ctxt,
                source.field_name,
                source.element,
                element_type_list(&basic.bson_serialization_type)?
            ));
            deserializer_call(basic, source.element)
        }
    }
}

fn child_context(source: &ElementSource) -> String {
    format!(
        "&ParserContext::with_parent({}, {})",
        source.child_name, source.ctxt_ref
    )
}

fn variant_value_expr(variant: &Variant, source: &ElementSource) -> Result<String, CompileError> {
    let mut arms = Vec::new();
    let mut tags: Vec<String> = Vec::new();
    for alternative in &variant.alternatives {
        let constructor = format!("{}::{}", variant.rust_name, alternative.rust_name);
        match &alternative.kind {
            AlternativeKind::Struct(s) => {
                tags.push("object".to_owned());
                arms.push(format!(
                    "ElementType::Object => {}({}::parse({}, {}.as_document())?),",
                    constructor,
                    s.rust_name,
                    child_context(source),
                    source.element
                ));
            }
            AlternativeKind::Basic(basic) => match basic.single_bson_type() {
                Some("bindata") => {
                    tags.push("bindata".to_owned());
                    arms.push("ElementType::BinData => {".to_owned());
                    arms.push(format!(
                        "    {}.check_and_assert_bin_data_type({}, {}, {})?;",
                        source.ctxt,
                        source.field_name,
                        source.element,
                        bindata_subtype(basic)?
                    ));
                    arms.push(format!(
                        "    {}({})",
                        constructor,
                        single_tag_value(basic, "bindata", source.element)?
                    ));
                    arms.push("}".to_owned());
                }
                Some(tag) => {
                    tags.push(tag.to_owned());
                    let element_type = element_type_expr(tag)
                        .ok_or_else(|| generate_error(format!("unknown bson type '{}'", tag)))?;
                    arms.push(format!(
                        "{} => {}({}),",
                        element_type,
                        constructor,
                        single_tag_value(basic, tag, source.element)?
                    ));
                }
                None => {
                    let value = deserializer_call(basic, source.element)?;
                    for tag in &basic.bson_serialization_type {
                        tags.push(tag.clone());
                        let element_type = element_type_expr(tag).ok_or_else(|| {
                            generate_error(format!("unknown bson type '{}'", tag))
                        })?;
                        arms.push(format!("{} => {}({}),", element_type, constructor, value));
                    }
                }
            },
        }
    }
    arms.push(format!(
        "_ => return Err({}.wrong_type({}, {}, {})),",
        source.ctxt,
        source.field_name,
        source.element,
        element_type_list(&tags)?
    ));

    let mut text = format!("match {}.element_type() {{", source.element);
    for arm in arms {
        text.push_str("\n    ");
        text.push_str(&arm);
    }
    text.push_str("\n}");
    Ok(text)
}

/// Writes the checks for one element and returns the expression that
/// decodes it.
fn element_value_expr(
    w: &mut IndentedTextWriter,
    kind: &FieldKind,
    source: &ElementSource,
) -> Result<String, CompileError> {
    match kind {
        FieldKind::Basic(basic) => basic_value_expr(w, basic, source),
        FieldKind::Enum(e) => {
            let (element_type, accessor) = match e.enum_type {
                EnumType::String => ("ElementType::String", "as_str()"),
                EnumType::Int => ("ElementType::Int32", "as_i32()"),
            };
            w.write_line(format!(
                "{}.check_and_assert_type({}, {}, {})?;",
                source.ctxt, source.field_name, source.element, element_type
            ));
            Ok(format!(
                "{}::parse({}, {}.{})?",
                e.rust_name,
                child_context(source),
                source.element,
                accessor
            ))
        }
        FieldKind::Struct(s) => {
            w.write_line(format!(
                "{}.check_and_assert_type({}, {}, ElementType::Object)?;",
                source.ctxt, source.field_name, source.element
            ));
            Ok(format!(
                "{}::parse({}, {}.as_document())?",
                s.rust_name,
                child_context(source),
                source.element
            ))
        }
        FieldKind::Variant(variant) => variant_value_expr(variant, source),
    }
}

fn write_validation_call(w: &mut IndentedTextWriter, field: &Field, ctxt_ref: &str, value: &str) {
    if field.validator.is_some() && field.chained_struct_field.is_none() {
        w.write_line(format!(
            "Self::validate_{}(Some({}), &{})?;",
            field.rust_name, ctxt_ref, value
        ));
    }
}

/// Writes the decoding of a whole field value, arrays included, and returns
/// the local holding it.
pub fn write_field_value_parse(
    w: &mut IndentedTextWriter,
    field: &Field,
    source: &ElementSource,
) -> Result<&'static str, CompileError> {
    if !field.array {
        let expr = element_value_expr(w, &field.kind, source)?;
        w.write_line(format!("let value = {};", expr));
        write_validation_call(w, field, source.ctxt_ref, "value");
        return Ok("value");
    }

    w.write_line(format!(
        "{}.check_and_assert_type({}, {}, ElementType::Array)?;",
        source.ctxt, source.field_name, source.element
    ));
    w.write_line(format!(
        "let array_ctxt = ParserContext::with_parent({}, {});",
        source.child_name, source.ctxt_ref
    ));
    w.write_line("let mut values = Vec::new();");
    w.write_line("let mut expected_field_number: u32 = 0;");
    w.block(
        &format!(
            "for (array_field_name, array_element) in {}.as_array().iter() {{",
            source.element
        ),
        "}",
        |w| {
            w.block("match parse_array_field_number(array_field_name) {", "}", |w| {
                w.write_line("Some(field_number) if field_number == expected_field_number => {}");
                w.block("Some(field_number) => {", "}", |w| {
                    w.write_line("return Err(array_ctxt.bad_array_field_number_sequence(field_number, expected_field_number));");
                    Ok(())
                })?;
                w.write_line("None => return Err(array_ctxt.bad_array_field_number_value(array_field_name)),");
                Ok(())
            })?;
            w.write_empty_line();
            let inner = ElementSource {
                ctxt:       "array_ctxt",
                ctxt_ref:   "&array_ctxt",
                field_name: "array_field_name",
                element:    "array_element",
                child_name: "array_field_name",
            };
            let expr = element_value_expr(w, &field.kind, &inner)?;
            w.write_line(format!("let value = {};", expr));
            write_validation_call(w, field, source.ctxt_ref, "value");
            w.write_line("values.push(value);");
            w.write_line("expected_field_number += 1;");
            Ok(())
        },
    )?;
    Ok("values")
}

fn write_assignment(w: &mut IndentedTextWriter, field: &Field, value: &str) {
    let value = if field.optional {
        format!("Some({})", value)
    } else {
        value.to_owned()
    };
    match &field.chained_struct_field {
        Some(member) => {
            let fallible = if field.validator.is_some() { "?" } else { "" };
            w.write_line(format!(
                "self.{}.set_{}({}){};",
                member, field.rust_name, value, fallible
            ));
        }
        None => {
            w.write_line(format!("self.{} = {};", field.rust_name, value));
            if field.has_flag() {
                w.write_line(format!("self.has_{} = true;", field.rust_name));
            }
        }
    }
}

fn basic_to_bson(basic: &BasicType, expr: &str, is_ref: bool) -> Result<String, CompileError> {
    if let Some(serializer) = &basic.serializer {
        if is_function_path(serializer) {
            let argument = if is_ref {
                expr.to_owned()
            } else {
                format!("&{}", expr)
            };
            return Ok(format!("{}({})", serializer, argument));
        }
        return Ok(format!("{}.{}()", expr, serializer));
    }
    if basic.single_bson_type() == Some("bindata") && basic.deserializer.is_none() {
        return Ok(format!(
            "BinData::new({}, {}.clone())",
            bindata_subtype(basic)?,
            expr
        ));
    }
    if is_primitive_scalar_type(&basic.rust_type) {
        return Ok(if is_ref {
            format!("*{}", expr)
        } else {
            expr.to_owned()
        });
    }
    Ok(format!("{}.clone()", expr))
}

/// An expression convertible into `Bson` for one value. `is_ref` says
/// whether `expr` is a reference binding rather than a place.
fn value_to_bson(kind: &FieldKind, expr: &str, is_ref: bool) -> Result<String, CompileError> {
    match kind {
        FieldKind::Basic(basic) => basic_to_bson(basic, expr, is_ref),
        FieldKind::Enum(_) => Ok(format!("{}.serialize()", expr)),
        FieldKind::Struct(_) | FieldKind::Variant(_) => Ok(format!("{}.to_bson()", expr)),
    }
}

fn alternative_to_bson(kind: &AlternativeKind, expr: &str) -> Result<String, CompileError> {
    match kind {
        AlternativeKind::Basic(basic) => basic_to_bson(basic, expr, true),
        AlternativeKind::Struct(_) => Ok(format!("{}.to_bson()", expr)),
    }
}

fn write_any_serializer(
    w: &mut IndentedTextWriter,
    basic: &BasicType,
    name_expr: &str,
    value_ref: &str,
) -> Result<(), CompileError> {
    let serializer = basic.serializer.as_deref().ok_or_else(|| {
        generate_error(format!("type '{}' has no serializer", basic.name))
    })?;
    if is_function_path(serializer) {
        w.write_line(format!("{}({}, {}, builder);", serializer, value_ref, name_expr));
    } else {
        w.write_line(format!(
            "{}.{}({}, builder);",
            value_ref.trim_start_matches('&'),
            serializer,
            name_expr
        ));
    }
    Ok(())
}

fn write_present_value(
    w: &mut IndentedTextWriter,
    field: &Field,
    name_expr: &str,
    expr: &str,
    is_ref: bool,
) -> Result<(), CompileError> {
    if let FieldKind::Basic(basic) = &field.kind {
        if basic.is_any() {
            let value_ref = if is_ref {
                expr.to_owned()
            } else {
                format!("&{}", expr)
            };
            return write_any_serializer(w, basic, name_expr, &value_ref);
        }
    }

    if !field.array {
        w.write_line(format!(
            "builder.append({}, {});",
            name_expr,
            value_to_bson(&field.kind, expr, is_ref)?
        ));
        return Ok(());
    }

    let items = if is_ref {
        expr.to_owned()
    } else {
        format!("&{}", expr)
    };
    w.write_line("let mut array_builder = ArrayBuilder::new();");
    w.block(&format!("for item in {} {{", items), "}", |w| {
        w.write_line(format!(
            "array_builder.push({});",
            value_to_bson(&field.kind, "item", true)?
        ));
        Ok(())
    })?;
    w.write_line(format!("builder.append({}, array_builder);", name_expr));
    Ok(())
}

/// Appends the value stored at `place` under `name_expr`.
pub fn write_value_serializer(
    w: &mut IndentedTextWriter,
    field: &Field,
    name_expr: &str,
    place: &str,
) -> Result<(), CompileError> {
    if field.optional {
        w.block(&format!("if let Some(value) = &{} {{", place), "}", |w| {
            write_present_value(w, field, name_expr, "value", true)
        })
    } else {
        write_present_value(w, field, name_expr, place, false)
    }
}

fn field_name_expr(field: &Field) -> String {
    format!("Self::{}", field_name_const(&field.rust_name))
}

/// The initial value of a field in `new()`.
fn initial_value(field: &Field) -> String {
    if field.optional {
        return "None".to_owned();
    }
    if field.array {
        return "Vec::new()".to_owned();
    }
    if let Some(default) = &field.default {
        return if default.constant {
            format!("Self::{}", default_const(&field.rust_name))
        } else {
            default.expr.clone()
        };
    }
    match &field.kind {
        FieldKind::Basic(BasicType {
            default: Some(default),
            ..
        }) => default.clone(),
        _ => "Default::default()".to_owned(),
    }
}

fn struct_variants<'a>(info: &'a StructTypeInfo<'a>) -> Vec<&'a Variant> {
    let s = info.target();
    let mut variants: Vec<&Variant> = Vec::new();
    let fields = info
        .command_field()
        .into_iter()
        .chain(s.fields.iter().filter(|f| f.chained_struct_field.is_none()));
    for field in fields {
        if let FieldKind::Variant(variant) = &field.kind {
            if !variants.iter().any(|v| v.rust_name == variant.rust_name) {
                variants.push(variant);
            }
        }
    }
    variants
}

/// Fields with a wire name, in declaration order.
fn wire_fields(s: &Struct) -> impl Iterator<Item = &Field> {
    s.fields.iter().filter(|f| !f.chained)
}

fn write_constants(w: &mut IndentedTextWriter, info: &StructTypeInfo) {
    let s = info.target();
    let mut constants: Vec<(String, &str)> = wire_fields(s)
        .map(|f| (field_name_const(&f.rust_name), f.name.as_str()))
        .collect();
    if let Some(command) = info.command() {
        constants.push(("COMMAND_NAME".to_owned(), command.command_name.as_str()));
    }
    constants.sort();
    constants.dedup_by(|a, b| a.0 == b.0);
    for (name, value) in &constants {
        w.write_line(format!(
            "pub const {}: &'static str = {};",
            name,
            rust_string_literal(value)
        ));
    }
    w.write_empty_line();

    for field in &s.fields {
        if let Some(default) = field.default.as_ref().filter(|d| d.constant) {
            w.write_line(format!(
                "pub const {}: {} = {};",
                default_const(&field.rust_name),
                get_element_rust_type(field).storage_type(),
                default.expr
            ));
        }
    }
    w.write_empty_line();
}

fn constructor_signature(name: &str, args: &[(String, String)], return_type: &str) -> String {
    let params: Vec<String> = args
        .iter()
        .map(|(arg, rust_type)| format!("{}: {}", arg, rust_type))
        .collect();
    format!("pub fn {}({}) -> {} {{", name, params.join(", "), return_type)
}

fn write_constructors(w: &mut IndentedTextWriter, info: &StructTypeInfo) -> Result<(), CompileError> {
    let s = info.target();
    let args = info.constructor_args();
    let db_name = info.db_name_from_constructor();

    w.block(&constructor_signature("new", &args, &s.rust_name), "}", |w| {
        if let Some((statement, _)) = &db_name {
            w.write_line(statement);
        }
        w.block(&format!("{} {{", s.rust_name), "}", |w| {
            if let Some(member) = info.command_member() {
                w.write_line(format!("{},", member.name));
            }
            if let Some(field) = info.command_field() {
                w.write_line(format!("{},", field.rust_name));
            }
            for field in s.fields.iter().filter(|f| f.has_storage()) {
                match &db_name {
                    Some((_, local)) if field.serialize_op_msg_request_only => {
                        w.write_line(format!("{},", local));
                    }
                    _ => w.write_line(format!("{}: {},", field.rust_name, initial_value(field))),
                }
            }
            for field in s.fields.iter().filter(|f| f.has_flag()) {
                let set = db_name.is_some() && field.serialize_op_msg_request_only;
                w.write_line(format!("has_{}: {},", field.rust_name, set));
            }
            Ok(())
        })
    })?;
    w.write_empty_line();

    let required: Vec<&Field> = s
        .fields
        .iter()
        .filter(|f| f.has_flag() && !f.serialize_op_msg_request_only)
        .collect();
    if required.is_empty() {
        return Ok(());
    }

    let mut with_args = args.clone();
    for field in &required {
        with_args.push((field.rust_name.clone(), get_rust_type(field).storage_type()));
    }
    w.write_line("/// Builds the struct with every required field set.");
    w.block(&constructor_signature("with_required", &with_args, &s.rust_name), "}", |w| {
        let arg_names: Vec<&str> = args.iter().map(|(name, _)| name.as_str()).collect();
        w.write_line(format!(
            "let mut object = {}::new({});",
            s.rust_name,
            arg_names.join(", ")
        ));
        for field in &required {
            w.write_line(format!("object.{0} = {0};", field.rust_name));
            w.write_line(format!("object.has_{} = true;", field.rust_name));
        }
        w.write_line("object");
        Ok(())
    })?;
    w.write_empty_line();
    Ok(())
}

fn write_getters(
    w: &mut IndentedTextWriter,
    s: &Struct,
    field: &Field,
) -> Result<(), CompileError> {
    let rust_type = get_rust_type(field);
    write_description(w, &field.description);
    if let Some(member) = &field.chained_struct_field {
        w.block(
            &format!("pub fn {}(&self) -> {} {{", field.rust_name, rust_type.getter_type()),
            "}",
            |w| {
                w.write_line(format!("self.{}.{}()", member, field.rust_name));
                Ok(())
            },
        )?;
        w.write_empty_line();
        return Ok(());
    }

    w.block(
        &format!("pub fn {}(&self) -> {} {{", field.rust_name, rust_type.getter_type()),
        "}",
        |w| {
            w.write_line(rust_type.getter_body(&field.rust_name));
            Ok(())
        },
    )?;
    w.write_empty_line();

    if s.immutable {
        return Ok(());
    }
    if let Some(mut_type) = rust_type.mut_getter_type() {
        let body = if field.optional {
            format!("self.{}.as_mut()", field.rust_name)
        } else {
            format!("&mut self.{}", field.rust_name)
        };
        w.block(
            &format!("pub fn {}_mut(&mut self) -> {} {{", field.rust_name, mut_type),
            "}",
            |w| {
                w.write_line(body);
                Ok(())
            },
        )?;
        w.write_empty_line();
    }
    Ok(())
}

fn write_setter_validation(w: &mut IndentedTextWriter, field: &Field) -> Result<(), CompileError> {
    let call = |item: &str| format!("Self::validate_{}(None, {})?;", field.rust_name, item);
    match (field.optional, field.array) {
        (false, false) => w.write_line(call("&value")),
        (true, false) => {
            w.block("if let Some(value) = &value {", "}", |w| {
                w.write_line(call("value"));
                Ok(())
            })?;
        }
        (false, true) => {
            w.block("for item in &value {", "}", |w| {
                w.write_line(call("item"));
                Ok(())
            })?;
        }
        (true, true) => {
            w.block("if let Some(values) = &value {", "}", |w| {
                w.block("for item in values {", "}", |w| {
                    w.write_line(call("item"));
                    Ok(())
                })
            })?;
        }
    }
    Ok(())
}

fn write_setter(w: &mut IndentedTextWriter, field: &Field, has_flag: bool) -> Result<(), CompileError> {
    let rust_type = get_rust_type(field);
    let validated = field.validator.is_some();
    let signature = if validated {
        format!(
            "pub fn set_{}(&mut self, value: {}) -> Result<(), IdlError> {{",
            field.rust_name,
            rust_type.setter_type()
        )
    } else {
        format!(
            "pub fn set_{}(&mut self, value: {}) {{",
            field.rust_name,
            rust_type.setter_type()
        )
    };
    w.block(&signature, "}", |w| {
        if validated {
            write_setter_validation(w, field)?;
        }
        w.write_line(format!("self.{} = value;", field.rust_name));
        if has_flag {
            w.write_line(format!("self.has_{} = true;", field.rust_name));
        }
        if validated {
            w.write_line("Ok(())");
        }
        Ok(())
    })?;
    w.write_empty_line();
    Ok(())
}

fn write_comparison_operators(w: &mut IndentedTextWriter, s: &Struct) -> Result<(), CompileError> {
    let fields = s.comparison_fields();

    w.block(&format!("impl PartialEq for {} {{", s.rust_name), "}", |w| {
        w.block("fn eq(&self, other: &Self) -> bool {", "}", |w| {
            if fields.is_empty() {
                w.write_line("true");
                return Ok(());
            }
            let terms: Vec<String> = fields
                .iter()
                .map(|f| {
                    if contains_embedded_document(f) {
                        format!("self.{0}.structural_eq(&other.{0})", f.rust_name)
                    } else {
                        format!("self.{0} == other.{0}", f.rust_name)
                    }
                })
                .collect();
            w.write_line(terms.join("\n    && "));
            Ok(())
        })
    })?;
    w.write_empty_line();

    w.block(&format!("impl PartialOrd for {} {{", s.rust_name), "}", |w| {
        w.block(
            "fn partial_cmp(&self, other: &Self) -> Option<::std::cmp::Ordering> {",
            "}",
            |w| {
                for field in &fields {
                    let ordering = if contains_embedded_document(field) {
                        format!("Some(self.{0}.structural_cmp(&other.{0}))", field.rust_name)
                    } else {
                        format!("self.{0}.partial_cmp(&other.{0})", field.rust_name)
                    };
                    w.block(&format!("match {} {{", ordering), "}", |w| {
                        w.write_line("Some(::std::cmp::Ordering::Equal) => {}");
                        w.write_line("ordering => return ordering,");
                        Ok(())
                    })?;
                }
                w.write_line("Some(::std::cmp::Ordering::Equal)");
                Ok(())
            },
        )
    })?;
    w.write_empty_line();
    Ok(())
}

fn write_struct_declaration(w: &mut IndentedTextWriter, info: &StructTypeInfo) -> Result<(), CompileError> {
    let s = info.target();
    for variant in struct_variants(info) {
        write_variant_declaration(w, variant, s.generate_comparison_operators)?;
    }

    write_description(w, &s.description);
    w.write_line("#[derive(Debug, Clone)]");
    w.block(&format!("pub struct {} {{", s.rust_name), "}", |w| {
        if let Some(member) = info.command_member() {
            w.write_line(format!("{}: {},", member.name, member.rust_type));
        }
        if let Some(field) = info.command_field() {
            w.write_line(format!(
                "{}: {},",
                field.rust_name,
                get_rust_type(field).storage_type()
            ));
        }
        for field in s.fields.iter().filter(|f| f.has_storage()) {
            w.write_line(format!(
                "{}: {},",
                field.rust_name,
                get_rust_type(field).storage_type()
            ));
        }
        for field in s.fields.iter().filter(|f| f.has_flag()) {
            w.write_line(format!("has_{}: bool,", field.rust_name));
        }
        Ok(())
    })?;
    w.write_empty_line();

    w.block(&format!("impl {} {{", s.rust_name), "}", |w| {
        write_constants(w, info);
        write_constructors(w, info)?;

        if let Some(member) = info.command_member() {
            w.block(
                &format!("pub fn {}(&self) -> &{} {{", member.getter, member.rust_type),
                "}",
                |w| {
                    w.write_line(format!("&self.{}", member.name));
                    Ok(())
                },
            )?;
            w.write_empty_line();
        }
        if let Some(field) = info.command_field() {
            write_getters(w, s, field)?;
            if !s.immutable {
                write_setter(w, field, false)?;
            }
        }

        for field in s.fields.iter().filter(|f| !f.ignore) {
            write_getters(w, s, field)?;
            if !s.immutable && field.has_storage() {
                write_setter(w, field, field.has_flag())?;
            }
        }
        Ok(())
    })?;
    w.write_empty_line();

    if info.constructor_args().is_empty() {
        w.block(&format!("impl Default for {} {{", s.rust_name), "}", |w| {
            w.block(&format!("fn default() -> {} {{", s.rust_name), "}", |w| {
                w.write_line(format!("{}::new()", s.rust_name));
                Ok(())
            })
        })?;
        w.write_empty_line();
    }

    if s.generate_comparison_operators {
        write_comparison_operators(w, s)?;
    }
    Ok(())
}

fn write_validator(
    w: &mut IndentedTextWriter,
    name: &str,
    value_type: &str,
    validator: &Validator,
    wire_name: &str,
) -> Result<(), CompileError> {
    w.block(
        &format!(
            "fn validate_{}(ctxt: Option<&ParserContext>, value: &{}) -> Result<(), IdlError> {{",
            name, value_type
        ),
        "}",
        |w| {
            for (op, limit) in validator.bounds() {
                let limit = numeric_literal(value_type, limit);
                w.block(&format!("if !(*value {} ({})) {{", op, limit), "}", |w| {
                    w.write_line(format!(
                        "return Err(comparison_error(ctxt, {}, {}, value, &({})));",
                        rust_string_literal(wire_name),
                        rust_string_literal(op),
                        limit
                    ));
                    Ok(())
                })?;
            }
            if let Some(callback) = &validator.callback {
                w.write_line(format!("{}(value)?;", callback));
            }
            if validator.bounds().is_empty() && validator.callback.is_none() {
                w.write_line("let _ = (ctxt, value);");
            }
            w.write_line("Ok(())");
            Ok(())
        },
    )?;
    w.write_empty_line();
    Ok(())
}

fn has_field_arms(s: &Struct) -> bool {
    wire_fields(s).next().is_some()
}

fn write_field_loop(
    w: &mut IndentedTextWriter,
    info: &StructTypeInfo,
    checker: &FieldUsageChecker,
    elements: &str,
) -> Result<(), CompileError> {
    let s = info.target();
    let strict_else = if !s.strict {
        None
    } else if info.is_command() {
        Some("else if !is_generic_argument(field_name) {")
    } else {
        Some("else {")
    };
    if !checker.is_tracking() && !has_field_arms(s) && strict_else.is_none() {
        return Ok(());
    }

    w.block(&format!("for (field_name, element) in {} {{", elements), "}", |w| {
        checker.add_store(w, "field_name");

        let mut first = true;
        for field in wire_fields(s) {
            let condition = format!("field_name == {}", field_name_expr(field));
            let opening = if first {
                format!("if {} {{", condition)
            } else {
                format!("}} else if {} {{", condition)
            };
            first = false;
            w.write_line(opening);
            w.indent();
            checker.add(w, field, "field_name");
            if !field.ignore {
                let child_name = field_name_expr(field);
                let source = ElementSource {
                    ctxt:       "ctxt",
                    ctxt_ref:   "ctxt",
                    field_name: "field_name",
                    element:    "element",
                    child_name: &child_name,
                };
                let local = write_field_value_parse(w, field, &source)?;
                write_assignment(w, field, local);
            }
            w.unindent();
        }

        match (first, strict_else) {
            (true, Some(_)) if info.is_command() => {
                w.block("if !is_generic_argument(field_name) {", "}", |w| {
                    w.write_line("return Err(ctxt.unknown_field(field_name));");
                    Ok(())
                })?;
            }
            (true, Some(_)) => w.write_line("return Err(ctxt.unknown_field(field_name));"),
            (true, None) => {}
            (false, Some(opening)) => {
                w.write_line(format!("}} {}", opening));
                w.indent();
                w.write_line("return Err(ctxt.unknown_field(field_name));");
                w.unindent();
                w.write_line("}");
            }
            (false, None) => w.write_line("}"),
        }
        Ok(())
    })?;
    w.write_empty_line();
    Ok(())
}

fn doc_sequence_value(field: &Field) -> Result<String, CompileError> {
    match &field.kind {
        FieldKind::Struct(s) => Ok(format!(
            "{}::parse(&ParserContext::with_parent({}, ctxt), sequence_object)?",
            s.rust_name,
            field_name_expr(field)
        )),
        FieldKind::Basic(basic) if basic.rust_type.trim() == "Document" => {
            Ok("sequence_object.clone()".to_owned())
        }
        _ => Err(generate_error(format!(
            "field '{}' cannot be a document sequence",
            field.name
        ))),
    }
}

fn write_doc_sequences(
    w: &mut IndentedTextWriter,
    s: &Struct,
    checker: &FieldUsageChecker,
) -> Result<(), CompileError> {
    let fields = s.doc_sequence_fields();
    if fields.is_empty() {
        w.block("if let Some(sequence) = sequences.first() {", "}", |w| {
            w.write_line("return Err(ctxt.unknown_field(&sequence.name));");
            Ok(())
        })?;
        w.write_empty_line();
        return Ok(());
    }

    w.block("for sequence in sequences {", "}", |w| {
        for (i, field) in fields.iter().enumerate() {
            let name = field_name_expr(field);
            let opening = if i == 0 {
                format!("if sequence.name == {} {{", name)
            } else {
                format!("}} else if sequence.name == {} {{", name)
            };
            w.write_line(opening);
            w.indent();
            checker.add_store(w, &name);
            checker.add(w, field, &name);
            w.write_line("let mut values = Vec::new();");
            w.block("for sequence_object in &sequence.objs {", "}", |w| {
                w.write_line(format!("values.push({});", doc_sequence_value(field)?));
                Ok(())
            })?;
            write_assignment(w, field, "values");
            w.unindent();
        }
        w.write_line("} else {");
        w.indent();
        w.write_line("return Err(ctxt.unknown_field(&sequence.name));");
        w.unindent();
        w.write_line("}");
        Ok(())
    })?;
    w.write_empty_line();
    Ok(())
}

fn write_chained_parsers(w: &mut IndentedTextWriter, s: &Struct) -> Result<(), CompileError> {
    let mut wrote = false;
    for field in s.fields.iter().filter(|f| f.chained) {
        match &field.kind {
            FieldKind::Struct(chained) if !s.inline_chained_structs => {
                w.write_line(format!(
                    "self.{} = {}::parse(ctxt, bson_object)?;",
                    field.rust_name, chained.rust_name
                ));
                wrote = true;
            }
            FieldKind::Basic(basic) => {
                w.write_line(format!(
                    "self.{} = {};",
                    field.rust_name,
                    deserializer_call(basic, "bson_object")?
                ));
                wrote = true;
            }
            _ => {}
        }
    }
    if wrote {
        w.write_empty_line();
    }
    Ok(())
}

fn write_parse_protected(w: &mut IndentedTextWriter, info: &StructTypeInfo) -> Result<(), CompileError> {
    let s = info.target();
    let method = info.parse_protected_method();
    w.block(&format!("{} {{", method.signature()), "}", |w| {
        let checker = FieldUsageChecker::new(s);
        checker.write_declaration(w);
        let elements = info.write_command_element_capture(w);
        write_field_loop(w, info, &checker, elements)?;
        if info.is_command() {
            write_doc_sequences(w, s, &checker)?;
        }
        checker.add_final_checks(w);
        write_chained_parsers(w, s)?;
        info.write_namespace_check(w)?;
        w.write_line("Ok(())");
        Ok(())
    })?;
    w.write_empty_line();
    Ok(())
}

fn write_deserializers(w: &mut IndentedTextWriter, info: &StructTypeInfo) -> Result<(), CompileError> {
    let s = info.target();
    let defaults: Vec<&str> = info.constructor_args().iter().map(|_| "Default::default()").collect();
    let new_call = format!("{}::new({})", s.rust_name, defaults.join(", "));

    let parse = info.deserializer_method();
    w.block(&format!("{} {{", parse.signature()), "}", |w| {
        w.write_line(format!("let mut object = {};", new_call));
        if info.is_command() {
            w.write_line("object.parse_protected(ctxt, bson_object, &[])?;");
        } else {
            w.write_line("object.parse_protected(ctxt, bson_object)?;");
        }
        w.write_line("Ok(object)");
        Ok(())
    })?;
    w.write_empty_line();

    if let Some(op_msg) = info.op_msg_deserializer_method() {
        w.block(&format!("{} {{", op_msg.signature()), "}", |w| {
            w.write_line(format!("let mut object = {};", new_call));
            w.write_line("object.parse_protected(ctxt, &request.body, &request.sequences)?;");
            w.write_line("Ok(object)");
            Ok(())
        })?;
        w.write_empty_line();
    }

    write_parse_protected(w, info)
}

fn write_required_assert(w: &mut IndentedTextWriter, s: &Struct, op_msg: bool) {
    let flags: Vec<String> = s
        .fields
        .iter()
        .filter(|f| f.has_flag() && (op_msg || !f.serialize_op_msg_request_only))
        .map(|f| format!("self.has_{}", f.rust_name))
        .collect();
    if !flags.is_empty() {
        w.write_line(format!(
            "assert!({}, \"{} is missing required fields\");",
            flags.join(" && "),
            s.rust_name
        ));
        w.write_empty_line();
    }
}

fn write_fields_serializer(
    w: &mut IndentedTextWriter,
    info: &StructTypeInfo,
    op_msg: bool,
) -> Result<(), CompileError> {
    let s = info.target();
    write_required_assert(w, s, op_msg);
    info.write_command_element_serializer(w)?;

    for field in &s.fields {
        if field.ignore || field.chained_struct_field.is_some() {
            continue;
        }
        if field.chained {
            match &field.kind {
                FieldKind::Basic(basic) => {
                    let serializer = basic.serializer.as_deref().ok_or_else(|| {
                        generate_error(format!("chained type '{}' has no serializer", basic.name))
                    })?;
                    if is_function_path(serializer) {
                        w.write_line(format!("{}(&self.{}, builder);", serializer, field.rust_name));
                    } else {
                        w.write_line(format!("self.{}.{}(builder);", field.rust_name, serializer));
                    }
                }
                _ => w.write_line(format!("self.{}.serialize(builder);", field.rust_name)),
            }
            continue;
        }
        if field.serialize_op_msg_request_only && !op_msg {
            continue;
        }
        if field.supports_doc_sequence && op_msg {
            continue;
        }
        write_value_serializer(
            w,
            field,
            &field_name_expr(field),
            &format!("self.{}", field.rust_name),
        )?;
    }

    if info.is_command() {
        w.write_line("append_generic_command_arguments(command_passthrough_fields, Self::KNOWN_FIELDS, builder);");
    }
    Ok(())
}

fn doc_sequence_objects(field: &Field, values: &str) -> String {
    match &field.kind {
        FieldKind::Struct(_) => format!("{}.iter().map(|value| value.to_bson()).collect()", values),
        _ => format!("{}.clone()", values),
    }
}

fn write_serializers(w: &mut IndentedTextWriter, info: &StructTypeInfo) -> Result<(), CompileError> {
    let s = info.target();
    let serializer = info.serializer_method();
    w.block(&format!("{} {{", serializer.signature()), "}", |w| {
        write_fields_serializer(w, info, false)
    })?;
    w.write_empty_line();

    if let Some(op_msg) = info.op_msg_serializer_method() {
        w.block(&format!("{} {{", op_msg.signature()), "}", |w| {
            w.write_line("let mut body = Document::new();");
            w.write_line("let builder = &mut body;");
            write_fields_serializer(w, info, true)?;
            w.write_empty_line();

            let sequences = s.doc_sequence_fields();
            if sequences.is_empty() {
                w.write_line("OpMsgRequest::new(body)");
                return Ok(());
            }
            w.write_line("let mut request = OpMsgRequest::new(body);");
            for field in sequences {
                let push = |w: &mut IndentedTextWriter, values: &str| {
                    w.block("request.sequences.push(DocumentSequence {", "});", |w| {
                        w.write_line(format!("name: {}.to_owned(),", field_name_expr(field)));
                        w.write_line(format!("objs: {},", doc_sequence_objects(field, values)));
                        Ok(())
                    })
                };
                if field.optional {
                    w.block(&format!("if let Some(values) = &self.{} {{", field.rust_name), "}", |w| {
                        push(w, "values")
                    })?;
                } else {
                    push(w, &format!("self.{}", field.rust_name))?;
                }
            }
            w.write_line("request");
            Ok(())
        })?;
        w.write_empty_line();
    }

    let to_bson = info.to_bson_method();
    w.block(&format!("{} {{", to_bson.signature()), "}", |w| {
        w.write_line("let mut builder = Document::new();");
        let mut args = info.serializer_call_args();
        args.push("&mut builder");
        w.write_line(format!("{};", serializer.call("self", &args)));
        w.write_line("builder");
        Ok(())
    })?;
    w.write_empty_line();
    Ok(())
}

fn write_variant_definition(w: &mut IndentedTextWriter, variant: &Variant) -> Result<(), CompileError> {
    w.block(&format!("impl {} {{", variant.rust_name), "}", |w| {
        w.block("pub fn to_bson(&self) -> Bson {", "}", |w| {
            w.block("match self {", "}", |w| {
                for alternative in &variant.alternatives {
                    w.write_line(format!(
                        "{}::{}(value) => Bson::from({}),",
                        variant.rust_name,
                        alternative.rust_name,
                        alternative_to_bson(&alternative.kind, "value")?
                    ));
                }
                Ok(())
            })
        })
    })?;
    w.write_empty_line();
    Ok(())
}

fn write_struct_definition(w: &mut IndentedTextWriter, info: &StructTypeInfo) -> Result<(), CompileError> {
    let s = info.target();
    for variant in struct_variants(info) {
        write_variant_definition(w, variant)?;
    }

    w.block(&format!("impl {} {{", s.rust_name), "}", |w| {
        if info.is_command() {
            let mut known = vec!["Self::COMMAND_NAME".to_owned()];
            known.extend(wire_fields(s).map(field_name_expr));
            w.write_line(format!(
                "pub const KNOWN_FIELDS: &'static [&'static str] = &[{}];",
                known.join(", ")
            ));
            w.write_empty_line();
        }

        for field in s.fields.iter().filter(|f| f.has_storage()) {
            if let Some(validator) = &field.validator {
                write_validator(
                    w,
                    &field.rust_name,
                    &get_element_rust_type(field).storage_type(),
                    validator,
                    &field.name,
                )?;
            }
        }

        write_deserializers(w, info)?;
        write_serializers(w, info)
    })?;
    w.write_empty_line();

    if !info.is_command() {
        w.block(&format!("impl IdlStruct for {} {{", s.rust_name), "}", |w| {
            let parse = info.deserializer_method();
            w.block(&format!("{} {{", parse.signature().replacen("pub ", "", 1)), "}", |w| {
                w.write_line(format!("{}::parse(ctxt, bson_object)", s.rust_name));
                Ok(())
            })?;
            w.write_empty_line();
            let serialize = info.serializer_method();
            w.block(&format!("{} {{", serialize.signature().replacen("pub ", "", 1)), "}", |w| {
                w.write_line(format!("{}::serialize(self, builder)", s.rust_name));
                Ok(())
            })
        })?;
        w.write_empty_line();
    }
    Ok(())
}

/// Opens the block a condition guards, or nothing.
fn condition_opening(condition: &Option<Condition>) -> Option<String> {
    let condition = condition.as_ref()?;
    if let Some(preprocessor) = &condition.preprocessor {
        return Some(format!("if cfg!({}) {{", preprocessor));
    }
    condition
        .constexpr
        .as_ref()
        .or(condition.expr.as_ref())
        .map(|expr| format!("if {} {{", expr))
}

fn write_conditional<F>(w: &mut IndentedTextWriter, condition: &Option<Condition>, body: F) -> Result<(), CompileError>
where
    F: FnOnce(&mut IndentedTextWriter) -> Result<(), CompileError>,
{
    match condition_opening(condition) {
        Some(opening) => w.block(&opening, "}", body),
        None => w.block("{", "}", body),
    }
}

fn storage_static(name: &str, rust_type: &str) -> String {
    format!(
        "pub static {}: ParameterStorage<{}> = ParameterStorage::new();",
        name, rust_type
    )
}

fn bound_op(op: &str) -> &'static str {
    match op {
        ">" => "BoundOp::Gt",
        ">=" => "BoundOp::Gte",
        "<" => "BoundOp::Lt",
        _ => "BoundOp::Lte",
    }
}

fn write_server_parameter(w: &mut IndentedTextWriter, param: &ServerParameter) -> Result<(), CompileError> {
    write_conditional(w, &param.condition, |w| {
        let name = rust_string_literal(&param.name);
        let mut calls: Vec<String> = Vec::new();
        let mut fallible: Vec<String> = Vec::new();

        match &param.rust_varname {
            Some(varname) => {
                let vartype = param.rust_vartype.as_deref().unwrap_or_default();
                if let Some(validator) = &param.validator {
                    for (op, limit) in validator.bounds() {
                        calls.push(format!(
                            "param.add_bound({}, {});",
                            bound_op(op),
                            numeric_literal(vartype, limit)
                        ));
                    }
                    if let Some(callback) = &validator.callback {
                        calls.push(format!("param.add_validator({});", callback));
                    }
                }
                if let Some(on_update) = &param.on_update {
                    calls.push(format!("param.set_on_update({});", on_update));
                }
                if param.redact {
                    calls.push("param.set_redact();".to_owned());
                }
                if param.test_only {
                    calls.push("param.set_test_only();".to_owned());
                }
                match &param.default {
                    Some(Expression {
                        expr: Some(expr), ..
                    }) => calls.push(format!(
                        "param.set_default({})?;",
                        numeric_literal(vartype, expr)
                    )),
                    Some(Expression {
                        literal: Some(literal),
                        ..
                    }) => fallible.push(format!(
                        "ServerParameter::set_from_string(&param, {})?;",
                        rust_string_literal(literal)
                    )),
                    _ => {}
                }

                let binding = if calls.is_empty() { "let param" } else { "let mut param" };
                w.write_line(format!(
                    "{} = ServerParameterWithStorage::new({}, {}, &{});",
                    binding,
                    name,
                    param.set_at.expr(),
                    varname
                ));
            }
            None => {
                if let Some(from_string) = &param.from_string {
                    calls.push(format!("param.set_from_string_hook({});", from_string));
                }
                if let Some(append_bson) = &param.append_bson {
                    calls.push(format!("param.set_append_bson_hook({});", append_bson));
                }
                if param.redact {
                    calls.push("param.set_redact();".to_owned());
                }
                if param.test_only {
                    calls.push("param.set_test_only();".to_owned());
                }
                let binding = if calls.is_empty() { "let param" } else { "let mut param" };
                w.write_line(format!(
                    "{} = IdlServerParameter::new({}, {});",
                    binding,
                    name,
                    param.set_at.expr()
                ));
            }
        }

        for call in calls.iter().chain(fallible.iter()) {
            w.write_line(call);
        }
        w.write_line("registry.add(Box::new(param))?;");
        for alias in &param.deprecated_names {
            w.write_line(format!(
                "registry.add_alias({}, {})?;",
                rust_string_literal(alias),
                name
            ));
        }
        Ok(())
    })
}

fn write_server_parameters(
    w: &mut IndentedTextWriter,
    params: &[ServerParameter],
    input_name: &str,
) -> Result<(), CompileError> {
    if params.is_empty() {
        return Ok(());
    }
    for param in params {
        if let (Some(varname), Some(vartype)) = (&param.rust_varname, &param.rust_vartype) {
            write_description(w, &param.description);
            w.write_line(storage_static(varname, vartype));
        }
    }
    w.write_empty_line();

    w.write_line(format!("/// Registers the server parameters declared in {}.", input_name));
    w.block(
        "pub fn register_server_parameters(registry: &mut ServerParameterRegistry) -> Result<(), IdlError> {",
        "}",
        |w| {
            for param in params {
                write_server_parameter(w, param)?;
            }
            w.write_line("Ok(())");
            Ok(())
        },
    )?;
    w.write_empty_line();
    Ok(())
}

fn option_sources(sources: &[String]) -> Option<String> {
    let mut consts: Vec<&str> = Vec::new();
    for (source, constant) in [
        ("cli", "OptionSources::COMMAND_LINE"),
        ("ini", "OptionSources::INI"),
        ("yaml", "OptionSources::YAML"),
    ] {
        if sources.iter().any(|s| s == source) {
            consts.push(constant);
        }
    }
    if consts.is_empty() || consts.len() == 3 {
        return None;
    }
    let mut text = consts[0].to_owned();
    for constant in &consts[1..] {
        text = format!("{}.union({})", text, constant);
    }
    Some(text)
}

fn option_value(option: &ConfigOption, value: &Expression) -> String {
    let text = value.literal.as_deref().or(value.expr.as_deref()).unwrap_or_default();
    match option.arg_vartype.bson_constructor() {
        Some(constructor) => {
            let rust_type = if constructor == "Bson::Double" { "f64" } else { "" };
            format!("{}({})", constructor, numeric_literal(rust_type, text))
        }
        None if value.literal.is_some() => rust_string_literal(text),
        None => text.to_owned(),
    }
}

fn option_constraint(option: &ConfigOption, validator: &Validator) -> String {
    let rust_type = if option.arg_vartype.bson_constructor() == Some("Bson::Double") {
        "f64"
    } else {
        ""
    };
    let mut lines = vec![
        "add_constraint(|value: &Bson| {".to_owned(),
        format!("    let value = value.{};", option.arg_vartype.accessor()),
    ];
    for (op, limit) in validator.bounds() {
        let limit = numeric_literal(rust_type, limit);
        lines.push(format!("    if !(value {} ({})) {{", op, limit));
        lines.push(format!(
            "        return Err(comparison_error(None, {}, {}, &value, &({})));",
            rust_string_literal(&option.name),
            rust_string_literal(op),
            limit
        ));
        lines.push("    }".to_owned());
    }
    match &validator.callback {
        Some(callback) => lines.push(format!("    {}(&value)", callback)),
        None => lines.push("    Ok(())".to_owned()),
    }
    lines.push("})".to_owned());
    lines.join("\n")
}

fn write_config_option(w: &mut IndentedTextWriter, target: &str, option: &ConfigOption) -> Result<(), CompileError> {
    let mut calls = vec![format!(
        "add_option_chaining({}, {}, {}, {})",
        rust_string_literal(&option.name),
        rust_string_literal(&option.single_name),
        option.arg_vartype.expr(),
        rust_string_literal(&option.description)
    )];
    if let Some(sources) = option_sources(&option.sources) {
        calls.push(format!("set_sources({})", sources));
    }
    if option.hidden {
        calls.push("hidden()".to_owned());
    }
    if option.redact {
        calls.push("redact()".to_owned());
    }
    if let Some(default) = &option.default {
        calls.push(format!("set_default({})", option_value(option, default)));
    }
    if let Some(implicit) = &option.implicit {
        calls.push(format!("set_implicit({})", option_value(option, implicit)));
    }
    if option.composing {
        calls.push("composing()".to_owned());
    }
    if let Some((start, end)) = option.positional {
        calls.push(format!("positional({}, {})", start, end));
    }
    for required in &option.requires {
        calls.push(format!("requires({})", rust_string_literal(required)));
    }
    for conflict in &option.conflicts {
        calls.push(format!("incompatible_with({})", rust_string_literal(conflict)));
    }
    for name in &option.deprecated_names {
        calls.push(format!("add_deprecated_dotted_name({})", rust_string_literal(name)));
    }
    for name in &option.deprecated_short_names {
        calls.push(format!("add_deprecated_single_name({})", rust_string_literal(name)));
    }
    if let Some(validator) = &option.validator {
        calls.push(option_constraint(option, validator));
    }

    let mut text = target.to_owned();
    for call in calls {
        text.push_str("\n    .");
        text.push_str(&call.replace('\n', "\n    "));
    }
    text.push(';');

    match condition_opening(&option.condition) {
        Some(opening) => w.block(&opening, "}", |w| {
            w.write_line(&text);
            Ok(())
        }),
        None => {
            w.write_line(text);
            Ok(())
        }
    }
}

fn write_config_options(
    w: &mut IndentedTextWriter,
    idl: &Idl,
    input_name: &str,
) -> Result<(), CompileError> {
    if idl.configs.is_empty() {
        return Ok(());
    }
    let initializer = snake_case(
        idl.globals
            .initializer_name
            .as_deref()
            .unwrap_or("startup_options"),
    );

    for option in &idl.configs {
        if let (Some(varname), Some(vartype)) = (&option.rust_varname, &option.rust_vartype) {
            w.write_line(storage_static(varname, vartype));
        }
    }
    w.write_empty_line();

    let mut sections: Vec<&str> = Vec::new();
    for option in &idl.configs {
        if let Some(section) = option.section.as_deref() {
            if !sections.contains(&section) {
                sections.push(section);
            }
        }
    }

    w.write_line(format!("/// Registers the startup options declared in {}.", input_name));
    w.block(
        &format!(
            "pub fn register_{}(options: &mut OptionSection) -> Result<(), IdlError> {{",
            initializer
        ),
        "}",
        |w| {
            for option in idl.configs.iter().filter(|o| o.section.is_none()) {
                write_config_option(w, "options", option)?;
            }
            w.write_empty_line();
            for section in &sections {
                w.block("{", "}", |w| {
                    w.write_line(format!(
                        "let mut section = OptionSection::new({});",
                        rust_string_literal(section)
                    ));
                    for option in idl
                        .configs
                        .iter()
                        .filter(|o| o.section.as_deref() == Some(*section))
                    {
                        write_config_option(w, "section", option)?;
                    }
                    w.write_line("options.add_section(section)?;");
                    Ok(())
                })?;
            }
            w.write_line("Ok(())");
            Ok(())
        },
    )?;
    w.write_empty_line();

    let stored: Vec<&ConfigOption> = idl.configs.iter().filter(|o| o.rust_varname.is_some()).collect();
    let params = if stored.is_empty() { "_params" } else { "params" };
    w.write_line("/// Copies parsed option values into their storage.");
    w.block(
        &format!(
            "pub fn store_{}({}: &Environment) -> Result<(), IdlError> {{",
            initializer, params
        ),
        "}",
        |w| {
            for option in &stored {
                let varname = option.rust_varname.as_deref().unwrap_or_default();
                let store = |w: &mut IndentedTextWriter| {
                    w.block(
                        &format!(
                            "if let Some(value) = params.get({}) {{",
                            rust_string_literal(&option.name)
                        ),
                        "}",
                        |w| {
                            w.write_line(format!(
                                "{}.set(value.{});",
                                varname,
                                option.arg_vartype.accessor()
                            ));
                            Ok(())
                        },
                    )
                };
                match condition_opening(&option.condition) {
                    Some(opening) => w.block(&opening, "}", store)?,
                    None => store(w)?,
                }
            }
            w.write_line("Ok(())");
            Ok(())
        },
    )?;
    w.write_empty_line();
    Ok(())
}

fn write_nested_modules<F>(w: &mut IndentedTextWriter, modules: &[&str], body: F) -> Result<(), CompileError>
where
    F: FnOnce(&mut IndentedTextWriter) -> Result<(), CompileError>,
{
    match modules.split_first() {
        None => body(w),
        Some((first, rest)) => w.block(&format!("pub mod {} {{", first), "}", |w| {
            write_nested_modules(w, rest, body)
        }),
    }
}

fn module_path(idl: &Idl) -> Vec<&str> {
    idl.globals
        .rust_module
        .as_deref()
        .map(|module| module.split("::").filter(|m| !m.is_empty()).collect())
        .unwrap_or_default()
}

fn struct_infos(idl: &Idl) -> Result<Vec<StructTypeInfo<'_>>, CompileError> {
    idl.structs.iter().map(StructTypeInfo::new).collect()
}

pub fn generate_header(idl: &Idl, input_name: &str) -> Result<String, CompileError> {
    let mut w = IndentedTextWriter::new();
    w.write_line(banner(input_name));
    w.write_empty_line();
    w.write_line("use bidl::prelude::*;");
    for used in &idl.globals.uses {
        w.write_line(format!("use {};", used));
    }
    w.write_empty_line();

    for e in &idl.enums {
        write_enum_declaration(&mut w, e)?;
    }
    for info in struct_infos(idl)? {
        write_struct_declaration(&mut w, &info)?;
    }
    Ok(w.into_string())
}

pub fn generate_source(idl: &Idl, input_name: &str, include_path: &str) -> Result<String, CompileError> {
    let infos = struct_infos(idl)?;
    let mut w = IndentedTextWriter::new();
    w.write_line(banner(input_name));
    w.write_empty_line();

    write_nested_modules(&mut w, &module_path(idl), |w| {
        w.write_line(format!(
            "include!({});",
            rust_string_literal(&include_path.replace('\\', "/"))
        ));
        w.write_empty_line();
        for e in &idl.enums {
            write_enum_definition(w, e)?;
        }
        for info in &infos {
            write_struct_definition(w, info)?;
        }
        write_server_parameters(w, &idl.server_parameters, input_name)?;
        write_config_options(w, idl, input_name)
    })?;
    Ok(w.into_string())
}

/// Generates both files. Nothing is returned unless both succeed.
pub fn generate(idl: &Idl, input_name: &str, include_path: &str) -> Result<GeneratedCode, CompileError> {
    tracing::debug!(
        "generating {} enums, {} structs from {}",
        idl.enums.len(),
        idl.structs.len(),
        input_name
    );
    let header = generate_header(idl, input_name)?;
    let source = generate_source(idl, input_name, include_path)?;
    Ok(GeneratedCode { header, source })
}
