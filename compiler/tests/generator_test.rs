#![cfg(test)]

use std::fs;

use bidl_compiler::{
    binder::bind,
    compile_file,
    generator::{generate, GeneratedCode},
    imports::MemoryImportResolver,
    parser::parse,
    write_generated, CompileError, CompileOptions,
};
use pretty_assertions::assert_eq;

fn generate_text(text: &str, resolver: &MemoryImportResolver) -> GeneratedCode {
    let spec = parse(text, "test.idl", resolver).unwrap_or_else(|e| panic!("parse failed:\n{}", e));
    let idl = bind(&spec).unwrap_or_else(|e| panic!("bind failed:\n{}", e));
    generate(&idl, "test.idl", "test_decl.rs").expect("generate failed")
}

fn generate_ok(text: &str) -> GeneratedCode {
    generate_text(text, &MemoryImportResolver::new())
}

const COLORS: &str = r#"
    enum color {
        type = string;
        value kRed = "red";
        value kBlue = "blue";
    }
"#;

#[test]
fn enum_header_and_source() {
    let code = generate_ok(COLORS);
    assert_eq!(
        code.header,
        r#"// Generated by bidlc from test.idl. Do not edit.

use bidl::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Color {
    Red,
    Blue,
}

impl Default for Color {
    fn default() -> Color {
        Color::Red
    }
}
"#
    );
    assert_eq!(
        code.source,
        r#"// Generated by bidlc from test.idl. Do not edit.

include!("test_decl.rs");

impl Color {
    pub fn parse(ctxt: &ParserContext, value: &str) -> Result<Color, IdlError> {
        match value {
            "red" => Ok(Color::Red),
            "blue" => Ok(Color::Blue),
            _ => Err(ctxt.bad_enum_value(value)),
        }
    }

    pub fn serialize(self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Blue => "blue",
        }
    }
}
"#
    );
}

#[test]
fn globals_wrap_the_source_in_modules() {
    let code = generate_ok(&format!(
        r#"
        global {{
            rust_module = "gen::paint";
            uses = ["crate::codec"];
        }}
        {}
        "#,
        COLORS
    ));
    assert!(code.header.contains("use bidl::prelude::*;\nuse crate::codec;\n"));
    assert!(code.source.contains("pub mod gen {\n    pub mod paint {\n        include!(\"test_decl.rs\");"));
    assert!(code.source.ends_with("    }\n}\n"));
}

#[test]
fn strict_struct_uses_field_bits() {
    let code = generate_ok(
        r#"
        struct point {
            description = "A point";
            field x = int;
            field y { type = int; optional; }
        }
        "#,
    );
    assert!(code.header.contains("/// A point\n#[derive(Debug, Clone)]\npub struct Point {"));
    assert!(code.header.contains("    x: i32,\n    y: Option<i32>,\n    has_x: bool,\n}"));
    assert!(code.header.contains("pub fn with_required(x: i32) -> Point {"));
    assert!(code.header.contains("pub const X_FIELD_NAME: &'static str = \"x\";"));

    assert!(code.source.contains("pub fn parse(ctxt: &ParserContext, bson_object: &Document) -> Result<Point, IdlError> {"));
    assert!(code.source.contains("for (field_name, element) in bson_object.iter() {"));
    assert!(code.source.contains("impl IdlStruct for Point {"));
    assert!(code.source.contains("assert!(self.has_x, \"Point is missing required fields\");"));
    assert!(!code.source.contains("BTreeSet"));
    assert!(!code.source.contains("KNOWN_FIELDS"));
}

#[test]
fn lenient_struct_tracks_every_name() {
    let code = generate_ok("struct bag { strict = false; field a = string; }");
    assert!(code.source.contains("BTreeSet"));
    assert!(!code.source.contains("unknown_field"));
}

#[test]
fn comparison_operators_follow_comparison_order() {
    let code = generate_ok(
        r#"
        struct pair {
            generate_comparison_operators;
            field a { type = int; comparison_order = 2; }
            field b { type = string; comparison_order = 1; }
            field c = int;
        }
        "#,
    );
    assert!(code.header.contains("impl PartialEq for Pair {"));
    assert!(code.header.contains("self.b == other.b\n            && self.a == other.a"));
    assert!(!code.header.contains("other.c"));
    let b = code.header.find("match self.b.partial_cmp(&other.b) {").expect("b is compared");
    let a = code.header.find("match self.a.partial_cmp(&other.a) {").expect("a is compared");
    assert!(b < a);
}

#[test]
fn commands_get_known_fields_and_op_msg_support() {
    let code = generate_ok(
        r#"
        command paint {
            command_name = "paint";
            namespace = concatenate_with_db;
            api_version = "1";
            field color = string;
        }
        "#,
    );
    assert!(code.header.contains("pub fn new(nss: NamespaceString) -> Paint {"));
    assert!(code.header.contains("pub fn namespace(&self) -> &NamespaceString {"));
    assert!(code.header.contains("pub const COMMAND_NAME: &'static str = \"paint\";"));
    assert!(code
        .source
        .contains("pub const KNOWN_FIELDS: &'static [&'static str] = &[Self::COMMAND_NAME, Self::COLOR_FIELD_NAME, Self::DB_NAME_FIELD_NAME];"));
    assert!(code.source.contains("pub fn parse_op_msg_request(ctxt: &ParserContext, request: &OpMsgRequest) -> Result<Paint, IdlError> {"));
    assert!(code.source.contains("append_generic_command_arguments(command_passthrough_fields, Self::KNOWN_FIELDS, builder);"));
    assert!(!code.source.contains("impl IdlStruct for Paint"));
}

#[test]
fn imported_definitions_are_not_generated() {
    let mut resolver = MemoryImportResolver::new();
    resolver.add("colors.idl", COLORS);
    let code = generate_text(
        "imports = [\"colors.idl\"]; struct brush { field color = color; }",
        &resolver,
    );
    assert!(code.header.contains("pub struct Brush {"));
    assert!(code.header.contains("color: Color,"));
    assert!(!code.header.contains("pub enum Color"));
    assert!(code.source.contains("Color::parse("));
}

#[test]
fn schema_errors_stop_generation() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.idl");
    fs::write(&input, "struct a { field x = int; field x = string; }").unwrap();
    let options = CompileOptions::new(&input, "broken_decl.rs", "broken.rs");
    match compile_file(&input, &options) {
        Err(CompileError::Schema(errors)) => assert!(errors.has_errors()),
        other => panic!("expected schema errors, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn compile_and_write_both_files() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("colors.idl");
    fs::write(&input, COLORS).unwrap();

    let mut options = CompileOptions::new(&input, "decl/colors.rs", "colors.rs");
    options.output_base_dir = Some(dir.path().join("out"));
    let code = compile_file(&input, &options).unwrap();
    write_generated(&code, &options).unwrap();

    let source = fs::read_to_string(dir.path().join("out/colors.rs")).unwrap();
    let header = fs::read_to_string(dir.path().join("out/decl/colors.rs")).unwrap();
    assert!(source.starts_with("// Generated by bidlc from colors.idl. Do not edit.\n"));
    assert!(source.contains("include!(\"decl/colors.rs\");"));
    assert_eq!(header, code.header);
}

#[test]
fn server_parameters_register_storage_bounds_and_aliases() {
    let code = generate_ok(
        r#"
        server_parameter maxThings {
            description = "Most things at once";
            set_at = runtime;
            rust_varname = "MAX_THINGS";
            rust_vartype = "i64";
            deprecated_name = [thingLimit];
            default = 8;
            validator { gte = 1; }
        }
        "#,
    );
    assert!(code
        .source
        .contains("/// Most things at once\npub static MAX_THINGS: ParameterStorage<i64> = ParameterStorage::new();"));
    assert!(code
        .source
        .contains("pub fn register_server_parameters(registry: &mut ServerParameterRegistry) -> Result<(), IdlError> {"));
    assert!(code.source.contains(
        "let mut param = ServerParameterWithStorage::new(\"maxThings\", ServerParameterType::RuntimeOnly, &MAX_THINGS);"
    ));
    let bound = code.source.find("param.add_bound(BoundOp::Gte, 1);").expect("bound is added");
    let default = code.source.find("param.set_default(8)?;").expect("default is set");
    assert!(bound < default);
    assert!(code.source.contains("registry.add(Box::new(param))?;"));
    assert!(code.source.contains("registry.add_alias(\"thingLimit\", \"maxThings\")?;"));
}

#[test]
fn startup_options_register_and_store() {
    let code = generate_ok(
        r#"
        config_option "net.port" {
            description = "Listen port";
            arg_vartype = Int;
            rust_varname = "PORT";
            rust_vartype = "i32";
            default = 27017;
            validator { gte = 1; }
        }
        "#,
    );
    assert!(code.source.contains("pub static PORT: ParameterStorage<i32> = ParameterStorage::new();"));
    assert!(code
        .source
        .contains("pub fn register_startup_options(options: &mut OptionSection) -> Result<(), IdlError> {"));
    assert!(code.source.contains(".add_option_chaining(\"net.port\", \"net.port\", OptionType::Int, \"Listen port\")"));
    assert!(code.source.contains(".set_default(Bson::Int32(27017))"));
    assert!(code
        .source
        .contains("return Err(comparison_error(None, \"net.port\", \">=\", &value, &(1)));"));
    assert!(code.source.contains("pub fn store_startup_options(params: &Environment) -> Result<(), IdlError> {"));
    assert!(code.source.contains("if let Some(value) = params.get(\"net.port\") {"));
    assert!(code.source.contains("PORT.set(value.as_i32());"));
}

#[test]
fn startup_options_without_storage_leave_the_environment_unused() {
    let code = generate_ok(
        r#"
        config_option verbose {
            description = "Log more";
            arg_vartype = Switch;
        }
        "#,
    );
    assert!(code.source.contains("pub fn store_startup_options(_params: &Environment) -> Result<(), IdlError> {"));
    assert!(!code.source.contains("params.get("));
}

#[test]
fn variant_fields_declare_their_enum_before_the_struct() {
    let code = generate_ok("struct holder { field v { variant = [string, int]; } }");
    let variant = code
        .header
        .find("#[derive(Debug, Clone)]\npub enum HolderV {\n    String(String),\n    Int(i32),\n}")
        .expect("variant enum is declared");
    let holder = code.header.find("pub struct Holder {").expect("struct is declared");
    assert!(variant < holder);
    assert!(code.header.contains("    v: HolderV,\n"));
}
