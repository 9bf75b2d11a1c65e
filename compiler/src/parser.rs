//! Maps the generic node tree onto the syntax model.
//!
//! Errors never stop the walk. Each bad node is reported through the
//! [ParserContext] and skipped, so one run reports as much as possible.

use std::collections::{BTreeSet, HashSet, VecDeque};

use crate::{
    common::snake_case,
    context::ParserContext,
    error::ErrorCollection,
    imports::ImportResolver,
    nodes::{parse_nodes, Node, NodeValue, Scalar},
    syntax::{
        ChainedStruct, ChainedType, Command, Condition, ConfigGlobal, ConfigOption, Enum,
        EnumValue, Expression, Field, FieldType, Global, IdlSpec, Import, Namespace,
        ServerParameter, SourceLocation, Struct, Type, Validator,
    },
    tokenizer::tokenize_schema,
    error::CompileError,
};

fn scalar(ctxt: &mut ParserContext, node: &Node) -> Option<String> {
    match &node.value {
        NodeValue::Scalar(Scalar::ArrayType(_)) | NodeValue::List(_) | NodeValue::Block(_) | NodeValue::Flag => {
            ctxt.add_expected_scalar_error(node);
            None
        }
        NodeValue::Scalar(s) => Some(s.text().to_owned()),
    }
}

fn bool_value(ctxt: &mut ParserContext, node: &Node) -> Option<bool> {
    match &node.value {
        NodeValue::Flag => Some(true),
        NodeValue::Scalar(Scalar::Ident(s)) if s == "true" => Some(true),
        NodeValue::Scalar(Scalar::Ident(s)) if s == "false" => Some(false),
        NodeValue::Scalar(s) => {
            ctxt.add_bad_bool_error(node, s.text());
            None
        }
        _ => {
            ctxt.add_expected_scalar_error(node);
            None
        }
    }
}

fn int_value(ctxt: &mut ParserContext, node: &Node) -> Option<i32> {
    let text = scalar(ctxt, node)?;
    match text.parse::<i32>() {
        Ok(value) => Some(value),
        Err(_) => {
            ctxt.add_bad_int_error(node, &text);
            None
        }
    }
}

/// A scalar is accepted as a one element list.
fn sequence(ctxt: &mut ParserContext, node: &Node) -> Option<Vec<String>> {
    match &node.value {
        NodeValue::Scalar(Scalar::ArrayType(_)) => {
            ctxt.add_expected_sequence_error(node);
            None
        }
        NodeValue::Scalar(s) => Some(vec![s.text().to_owned()]),
        NodeValue::List(items) => Some(items.iter().map(|s| s.text().to_owned()).collect()),
        _ => {
            ctxt.add_expected_sequence_error(node);
            None
        }
    }
}

fn block<'n>(ctxt: &mut ParserContext, node: &'n Node) -> Option<&'n [Node]> {
    match &node.value {
        NodeValue::Block(children) => Some(children),
        _ => {
            ctxt.add_expected_block_error(node);
            None
        }
    }
}

fn required_name(ctxt: &mut ParserContext, node: &Node) -> Option<String> {
    if node.name.is_none() {
        ctxt.add_missing_name_error(node);
    }
    node.name.clone()
}

/// Keys that may appear only once per block.
fn check_duplicate(ctxt: &mut ParserContext, node: &Node, seen: &mut HashSet<String>, parent: &str) -> bool {
    if seen.insert(node.key.clone()) {
        false
    } else {
        ctxt.add_duplicate_node_error(node, parent);
        true
    }
}

fn expression(ctxt: &mut ParserContext, node: &Node) -> Option<Expression> {
    match &node.value {
        NodeValue::Scalar(Scalar::Str(s)) => Some(Expression::literal(s)),
        NodeValue::Scalar(Scalar::Number(s)) | NodeValue::Scalar(Scalar::Ident(s)) => {
            Some(Expression::expr(s))
        }
        NodeValue::Block(children) => {
            let mut expr = Expression {
                is_constexpr: true,
                ..Expression::default()
            };
            let mut seen = HashSet::new();
            for child in children {
                if check_duplicate(ctxt, child, &mut seen, &node.key) {
                    continue;
                }
                match child.key.as_str() {
                    "expr" => expr.expr = scalar(ctxt, child),
                    "literal" => expr.literal = scalar(ctxt, child),
                    "is_constexpr" => expr.is_constexpr = bool_value(ctxt, child).unwrap_or(true),
                    _ => ctxt.add_unknown_node_error(child, &node.key),
                }
            }
            if expr.expr.is_none() && expr.literal.is_none() {
                ctxt.add_missing_required_field_error(node, &node.key, "expr");
                return None;
            }
            Some(expr)
        }
        _ => {
            ctxt.add_expected_scalar_error(node);
            None
        }
    }
}

fn field_type(ctxt: &mut ParserContext, node: &Node) -> Option<FieldType> {
    match &node.value {
        NodeValue::Scalar(Scalar::ArrayType(name)) => Some(FieldType::Array(name.clone())),
        NodeValue::Scalar(Scalar::Ident(name)) | NodeValue::Scalar(Scalar::Str(name)) => {
            Some(FieldType::Single(name.clone()))
        }
        NodeValue::List(items) => Some(FieldType::Variant(
            items
                .iter()
                .map(|item| match item {
                    Scalar::ArrayType(name) => FieldType::Array(name.clone()),
                    other => FieldType::Single(other.text().to_owned()),
                })
                .collect(),
        )),
        _ => {
            ctxt.add_expected_scalar_error(node);
            None
        }
    }
}

fn parse_validator(ctxt: &mut ParserContext, node: &Node) -> Option<Validator> {
    let children = block(ctxt, node)?;
    let mut validator = Validator {
        location: ctxt.location(node),
        ..Validator::default()
    };
    let mut seen = HashSet::new();
    for child in children {
        if check_duplicate(ctxt, child, &mut seen, "validator") {
            continue;
        }
        match child.key.as_str() {
            "gt" => validator.gt = scalar(ctxt, child),
            "lt" => validator.lt = scalar(ctxt, child),
            "gte" => validator.gte = scalar(ctxt, child),
            "lte" => validator.lte = scalar(ctxt, child),
            "callback" => validator.callback = scalar(ctxt, child),
            _ => ctxt.add_unknown_node_error(child, "validator"),
        }
    }
    Some(validator)
}

fn parse_condition(ctxt: &mut ParserContext, node: &Node) -> Option<Condition> {
    let children = block(ctxt, node)?;
    let mut condition = Condition::default();
    let mut seen = HashSet::new();
    for child in children {
        if check_duplicate(ctxt, child, &mut seen, "condition") {
            continue;
        }
        match child.key.as_str() {
            "expr" => condition.expr = scalar(ctxt, child),
            "constexpr" => condition.constexpr = scalar(ctxt, child),
            "preprocessor" => condition.preprocessor = scalar(ctxt, child),
            _ => ctxt.add_unknown_node_error(child, "condition"),
        }
    }
    Some(condition)
}

fn parse_global(ctxt: &mut ParserContext, node: &Node) -> Option<Global> {
    let children = block(ctxt, node)?;
    let mut global = Global {
        location: ctxt.location(node),
        ..Global::default()
    };
    let mut seen = HashSet::new();
    for child in children {
        if check_duplicate(ctxt, child, &mut seen, "global") {
            continue;
        }
        match child.key.as_str() {
            "rust_module" => global.rust_module = scalar(ctxt, child),
            "uses" => global.uses = sequence(ctxt, child).unwrap_or_default(),
            "configs" => global.configs = parse_config_global(ctxt, child),
            _ => ctxt.add_unknown_node_error(child, "global"),
        }
    }
    Some(global)
}

fn parse_config_global(ctxt: &mut ParserContext, node: &Node) -> Option<ConfigGlobal> {
    let children = block(ctxt, node)?;
    let mut configs = ConfigGlobal {
        location: ctxt.location(node),
        ..ConfigGlobal::default()
    };
    let mut seen = HashSet::new();
    for child in children {
        if check_duplicate(ctxt, child, &mut seen, "configs") {
            continue;
        }
        match child.key.as_str() {
            "section" => configs.section = scalar(ctxt, child),
            "source" => configs.source = sequence(ctxt, child).unwrap_or_default(),
            "initializer_name" => configs.initializer_name = scalar(ctxt, child),
            _ => ctxt.add_unknown_node_error(child, "configs"),
        }
    }
    Some(configs)
}

fn parse_type(ctxt: &mut ParserContext, node: &Node) -> Option<Type> {
    let name = required_name(ctxt, node)?;
    let children = block(ctxt, node)?;
    let mut idl_type = Type {
        location: ctxt.location(node),
        name,
        ..Type::default()
    };
    let mut seen = HashSet::new();
    for child in children {
        if check_duplicate(ctxt, child, &mut seen, "type") {
            continue;
        }
        match child.key.as_str() {
            "description" => idl_type.description = scalar(ctxt, child),
            "rust_type" => idl_type.rust_type = scalar(ctxt, child),
            "bson_serialization_type" => {
                idl_type.bson_serialization_type = sequence(ctxt, child).unwrap_or_default()
            }
            "bindata_subtype" => idl_type.bindata_subtype = scalar(ctxt, child),
            "serializer" => idl_type.serializer = scalar(ctxt, child),
            "deserializer" => idl_type.deserializer = scalar(ctxt, child),
            "default" => idl_type.default = expression(ctxt, child),
            _ => ctxt.add_unknown_node_error(child, "type"),
        }
    }
    if idl_type.rust_type.is_none() {
        ctxt.add_missing_required_field_error(node, "type", "rust_type");
        return None;
    }
    if idl_type.bson_serialization_type.is_empty() {
        ctxt.add_missing_required_field_error(node, "type", "bson_serialization_type");
        return None;
    }
    Some(idl_type)
}

fn parse_enum(ctxt: &mut ParserContext, node: &Node) -> Option<Enum> {
    let name = required_name(ctxt, node)?;
    let children = block(ctxt, node)?;
    let mut idl_enum = Enum {
        location:    ctxt.location(node),
        name,
        rust_name:   None,
        description: None,
        enum_type:   String::new(),
        values:      Vec::new(),
        imported:    false,
    };
    let mut seen = HashSet::new();
    for child in children {
        if child.key != "value" && check_duplicate(ctxt, child, &mut seen, "enum") {
            continue;
        }
        match child.key.as_str() {
            "description" => idl_enum.description = scalar(ctxt, child),
            "rust_name" => idl_enum.rust_name = scalar(ctxt, child),
            "type" => idl_enum.enum_type = scalar(ctxt, child).unwrap_or_default(),
            "value" => {
                let Some(value_name) = required_name(ctxt, child) else {
                    continue;
                };
                if let Some(value) = scalar(ctxt, child) {
                    idl_enum.values.push(EnumValue {
                        location: ctxt.location(child),
                        name: value_name,
                        value,
                    });
                }
            }
            _ => ctxt.add_unknown_node_error(child, "enum"),
        }
    }
    if idl_enum.enum_type.is_empty() {
        ctxt.add_missing_required_field_error(node, "enum", "type");
        return None;
    }
    if idl_enum.values.is_empty() {
        ctxt.add_missing_required_field_error(node, "enum", "value");
        return None;
    }
    Some(idl_enum)
}

fn parse_field(ctxt: &mut ParserContext, node: &Node) -> Option<Field> {
    let name = required_name(ctxt, node)?;
    let mut field = Field::new(ctxt.location(node), &name);

    match &node.value {
        NodeValue::Block(children) => {
            let mut seen = HashSet::new();
            for child in children {
                if check_duplicate(ctxt, child, &mut seen, "field") {
                    continue;
                }
                match child.key.as_str() {
                    "type" | "variant" => {
                        if field.field_type.is_some() {
                            ctxt.add_duplicate_node_error(child, "field");
                            continue;
                        }
                        field.field_type = match (child.key.as_str(), field_type(ctxt, child)) {
                            ("variant", Some(FieldType::Single(single))) => {
                                Some(FieldType::Variant(vec![FieldType::Single(single)]))
                            }
                            (_, parsed) => parsed,
                        };
                    }
                    "description" => field.description = scalar(ctxt, child),
                    "rust_name" => field.rust_name = scalar(ctxt, child),
                    "optional" => field.optional = bool_value(ctxt, child).unwrap_or(false),
                    "ignore" => field.ignore = bool_value(ctxt, child).unwrap_or(false),
                    "unstable" => field.unstable = bool_value(ctxt, child).unwrap_or(false),
                    "supports_doc_sequence" => {
                        field.supports_doc_sequence = bool_value(ctxt, child).unwrap_or(false)
                    }
                    "comparison_order" => {
                        field.comparison_order = int_value(ctxt, child).unwrap_or(-1)
                    }
                    "default" => field.default = expression(ctxt, child),
                    "validator" => field.validator = parse_validator(ctxt, child),
                    _ => ctxt.add_unknown_node_error(child, "field"),
                }
            }
        }
        NodeValue::Flag => {}
        _ => field.field_type = field_type(ctxt, node),
    }

    if field.field_type.is_none() && !field.ignore {
        ctxt.add_missing_required_field_error(node, "field", "type");
        return None;
    }
    Some(field)
}

/// Handles the keys structs and commands share. Returns false for keys it
/// does not know.
fn parse_struct_key(ctxt: &mut ParserContext, node: &Node, s: &mut Struct) -> bool {
    match node.key.as_str() {
        "description" => s.description = scalar(ctxt, node),
        "rust_name" => s.rust_name = scalar(ctxt, node),
        "strict" => s.strict = bool_value(ctxt, node).unwrap_or(true),
        "immutable" => s.immutable = bool_value(ctxt, node).unwrap_or(false),
        "inline_chained_structs" => {
            s.inline_chained_structs = bool_value(ctxt, node).unwrap_or(true)
        }
        "generate_comparison_operators" => {
            s.generate_comparison_operators = bool_value(ctxt, node).unwrap_or(false)
        }
        "chained_type" | "chained_struct" => {
            let Some(name) = required_name(ctxt, node) else {
                return true;
            };
            let rust_name = match &node.value {
                NodeValue::Flag => snake_case(&name),
                _ => match scalar(ctxt, node) {
                    Some(rust_name) => rust_name,
                    None => return true,
                },
            };
            let location = ctxt.location(node);
            if node.key == "chained_type" {
                s.chained_types.push(ChainedType { location, name, rust_name });
            } else {
                s.chained_structs.push(ChainedStruct { location, name, rust_name });
            }
        }
        "field" => {
            if let Some(field) = parse_field(ctxt, node) {
                s.fields.push(field);
            }
        }
        _ => return false,
    }
    true
}

const REPEATED_STRUCT_KEYS: &[&str] = &["field", "chained_type", "chained_struct"];

fn parse_struct(ctxt: &mut ParserContext, node: &Node) -> Option<Struct> {
    let name = required_name(ctxt, node)?;
    let children = block(ctxt, node)?;
    let mut s = Struct::new(ctxt.location(node), &name);
    let mut seen = HashSet::new();
    for child in children {
        if !REPEATED_STRUCT_KEYS.contains(&child.key.as_str())
            && check_duplicate(ctxt, child, &mut seen, "struct")
        {
            continue;
        }
        if !parse_struct_key(ctxt, child, &mut s) {
            ctxt.add_unknown_node_error(child, "struct");
        }
    }
    Some(s)
}

fn parse_command(ctxt: &mut ParserContext, node: &Node) -> Option<Command> {
    let name = required_name(ctxt, node)?;
    let children = block(ctxt, node)?;
    let mut command = Command {
        base:         Struct::new(ctxt.location(node), &name),
        command_name: name.clone(),
        namespace:    Namespace::Ignored,
        command_type: None,
        api_version:  String::new(),
        reply_type:   None,
    };
    let mut namespace_seen = false;
    let mut seen = HashSet::new();
    for child in children {
        if !REPEATED_STRUCT_KEYS.contains(&child.key.as_str())
            && check_duplicate(ctxt, child, &mut seen, "command")
        {
            continue;
        }
        match child.key.as_str() {
            "command_name" => {
                if let Some(command_name) = scalar(ctxt, child) {
                    command.command_name = command_name;
                }
            }
            "namespace" => {
                namespace_seen = true;
                let Some(text) = scalar(ctxt, child) else {
                    continue;
                };
                match Namespace::from_name(&text) {
                    Some(namespace) => command.namespace = namespace,
                    None => {
                        let location = ctxt.location(child);
                        ctxt.add_error(
                            crate::error::ErrorId::BadCommandNamespace,
                            &location,
                            format!("Command namespace '{}' is not one of ignored, concatenate_with_db, concatenate_with_db_or_uuid or type", text),
                        );
                    }
                }
            }
            "type" => command.command_type = field_type(ctxt, child),
            "api_version" => command.api_version = scalar(ctxt, child).unwrap_or_default(),
            "reply_type" => command.reply_type = scalar(ctxt, child),
            _ => {
                if !parse_struct_key(ctxt, child, &mut command.base) {
                    ctxt.add_unknown_node_error(child, "command");
                }
            }
        }
    }
    if !namespace_seen {
        ctxt.add_missing_required_field_error(node, "command", "namespace");
        return None;
    }
    Some(command)
}

fn parse_server_parameter(ctxt: &mut ParserContext, node: &Node) -> Option<ServerParameter> {
    let name = required_name(ctxt, node)?;
    let children = block(ctxt, node)?;
    let mut param = ServerParameter {
        location: ctxt.location(node),
        name,
        ..ServerParameter::default()
    };
    let mut seen = HashSet::new();
    for child in children {
        if check_duplicate(ctxt, child, &mut seen, "server_parameter") {
            continue;
        }
        match child.key.as_str() {
            "description" => param.description = scalar(ctxt, child),
            "set_at" => param.set_at = sequence(ctxt, child).unwrap_or_default(),
            "rust_vartype" => param.rust_vartype = scalar(ctxt, child),
            "rust_varname" => param.rust_varname = scalar(ctxt, child),
            "condition" => param.condition = parse_condition(ctxt, child),
            "deprecated_name" => param.deprecated_name = sequence(ctxt, child).unwrap_or_default(),
            "redact" => param.redact = bool_value(ctxt, child).unwrap_or(false),
            "test_only" => param.test_only = bool_value(ctxt, child).unwrap_or(false),
            "default" => param.default = expression(ctxt, child),
            "validator" => param.validator = parse_validator(ctxt, child),
            "on_update" => param.on_update = scalar(ctxt, child),
            "from_string" => param.from_string = scalar(ctxt, child),
            "append_bson" => param.append_bson = scalar(ctxt, child),
            _ => ctxt.add_unknown_node_error(child, "server_parameter"),
        }
    }
    if param.set_at.is_empty() {
        ctxt.add_missing_required_field_error(node, "server_parameter", "set_at");
        return None;
    }
    Some(param)
}

fn parse_config_option(ctxt: &mut ParserContext, node: &Node) -> Option<ConfigOption> {
    let name = required_name(ctxt, node)?;
    let children = block(ctxt, node)?;
    let mut option = ConfigOption {
        location: ctxt.location(node),
        name,
        ..ConfigOption::default()
    };
    let mut seen = HashSet::new();
    for child in children {
        if check_duplicate(ctxt, child, &mut seen, "config_option") {
            continue;
        }
        match child.key.as_str() {
            "short_name" => option.short_name = scalar(ctxt, child),
            "single_name" => option.single_name = scalar(ctxt, child),
            "deprecated_name" => option.deprecated_name = sequence(ctxt, child).unwrap_or_default(),
            "deprecated_short_name" => {
                option.deprecated_short_name = sequence(ctxt, child).unwrap_or_default()
            }
            "description" => option.description = scalar(ctxt, child),
            "section" => option.section = scalar(ctxt, child),
            "arg_vartype" => option.arg_vartype = scalar(ctxt, child),
            "rust_vartype" => option.rust_vartype = scalar(ctxt, child),
            "rust_varname" => option.rust_varname = scalar(ctxt, child),
            "condition" => option.condition = parse_condition(ctxt, child),
            "conflicts" => option.conflicts = sequence(ctxt, child).unwrap_or_default(),
            "requires" => option.requires = sequence(ctxt, child).unwrap_or_default(),
            "hidden" => option.hidden = bool_value(ctxt, child).unwrap_or(false),
            "redact" => option.redact = bool_value(ctxt, child).unwrap_or(false),
            "default" => option.default = expression(ctxt, child),
            "implicit" => option.implicit = expression(ctxt, child),
            "source" => option.source = sequence(ctxt, child).unwrap_or_default(),
            "duplicate_behavior" => option.duplicate_behavior = scalar(ctxt, child),
            "positional" => option.positional = scalar(ctxt, child),
            "validator" => option.validator = parse_validator(ctxt, child),
            _ => ctxt.add_unknown_node_error(child, "config_option"),
        }
    }
    if option.description.is_none() {
        ctxt.add_missing_required_field_error(node, "config_option", "description");
        return None;
    }
    if option.arg_vartype.is_none() {
        ctxt.add_missing_required_field_error(node, "config_option", "arg_vartype");
        return None;
    }
    Some(option)
}

fn parse_root(ctxt: &mut ParserContext, nodes: &[Node]) -> IdlSpec {
    let mut spec = IdlSpec::default();
    for node in nodes {
        match node.key.as_str() {
            "global" => {
                if spec.globals.is_some() {
                    ctxt.add_duplicate_node_error(node, "root");
                } else {
                    spec.globals = parse_global(ctxt, node);
                }
            }
            "imports" => {
                if spec.imports.is_some() {
                    ctxt.add_duplicate_node_error(node, "root");
                } else if let Some(imports) = sequence(ctxt, node) {
                    spec.imports = Some(Import {
                        location: ctxt.location(node),
                        imports,
                        resolved_imports: Vec::new(),
                        dependencies: Vec::new(),
                    });
                }
            }
            "type" => {
                if let Some(idl_type) = parse_type(ctxt, node) {
                    spec.symbols.add_type(ctxt, idl_type);
                }
            }
            "enum" => {
                if let Some(idl_enum) = parse_enum(ctxt, node) {
                    spec.symbols.add_enum(ctxt, idl_enum);
                }
            }
            "struct" => {
                if let Some(s) = parse_struct(ctxt, node) {
                    spec.symbols.add_struct(ctxt, s);
                }
            }
            "command" => {
                if let Some(command) = parse_command(ctxt, node) {
                    spec.symbols.add_command(ctxt, command);
                }
            }
            "server_parameter" => {
                if let Some(param) = parse_server_parameter(ctxt, node) {
                    spec.server_parameters.push(param);
                }
            }
            "config_option" => {
                if let Some(option) = parse_config_option(ctxt, node) {
                    spec.configs.push(option);
                }
            }
            _ => ctxt.add_unknown_node_error(node, "root"),
        }
    }
    spec
}

/// Parses one file without following its imports.
pub fn parse_text(text: &str, file_name: &str, errors: &mut ErrorCollection) -> IdlSpec {
    let mut ctxt = ParserContext::new(file_name, errors);
    let nodes = match tokenize_schema(text).and_then(|tokens| parse_nodes(&tokens)) {
        Ok(nodes) => nodes,
        Err(CompileError::ParseError { msg, line, column }) => {
            ctxt.add_syntax_error(&msg, line, column);
            return IdlSpec::default();
        }
        Err(other) => {
            ctxt.add_syntax_error(&other.to_string(), 0, 0);
            return IdlSpec::default();
        }
    };
    parse_root(&mut ctxt, &nodes)
}

/// Parses `text` and every file it imports, transitively. Imported symbols
/// are merged into the returned table with `imported` set.
pub fn parse(
    text: &str,
    file_name: &str,
    resolver: &dyn ImportResolver,
) -> Result<IdlSpec, ErrorCollection> {
    let mut errors = ErrorCollection::new();
    let mut spec = parse_text(text, file_name, &mut errors);

    let mut visited: BTreeSet<String> = BTreeSet::new();
    visited.insert(file_name.to_owned());
    let mut pending: VecDeque<(String, String, SourceLocation)> = VecDeque::new();
    if let Some(imports) = &spec.imports {
        for import in &imports.imports {
            pending.push_back((file_name.to_owned(), import.clone(), imports.location.clone()));
        }
    }

    let mut resolved = Vec::new();
    while let Some((base_file, import, location)) = pending.pop_front() {
        let mut ctxt = ParserContext::new(&base_file, &mut errors);
        let Some(path) = resolver.resolve(&base_file, &import) else {
            ctxt.add_import_not_found_error(&location, &import);
            continue;
        };
        if !visited.insert(path.clone()) {
            continue;
        }
        let imported_text = match resolver.open(&path) {
            Ok(imported_text) => imported_text,
            Err(e) => {
                ctxt.add_import_failed_error(&location, &import, &e.to_string());
                continue;
            }
        };

        tracing::debug!("parsing import {}", path);
        let imported = parse_text(&imported_text, &path, &mut errors);
        if let Some(imports) = &imported.imports {
            for next in &imports.imports {
                pending.push_back((path.clone(), next.clone(), imports.location.clone()));
            }
        }
        let mut ctxt = ParserContext::new(&path, &mut errors);
        spec.symbols.add_imported_symbol_table(&mut ctxt, &imported.symbols);
        resolved.push(path);
    }

    if let Some(imports) = spec.imports.as_mut() {
        imports.dependencies = resolved.clone();
        imports.resolved_imports = resolved;
    }

    if errors.has_errors() {
        Err(errors)
    } else {
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorId;
    use crate::imports::MemoryImportResolver;

    fn parse_ok(text: &str) -> IdlSpec {
        match parse(text, "test.idl", &MemoryImportResolver::new()) {
            Ok(spec) => spec,
            Err(errors) => panic!("unexpected errors:\n{}", errors),
        }
    }

    fn parse_err(text: &str) -> ErrorCollection {
        parse(text, "test.idl", &MemoryImportResolver::new()).unwrap_err()
    }

    #[test]
    fn parses_struct_fields() {
        let spec = parse_ok(
            r#"
            global {
                rust_module = "gen::points";
                uses = ["crate::codec"];
            }

            struct point {
                description = "A point";
                strict = false;
                generate_comparison_operators;
                field x = int;
                field tags = array<string>;
                field value { variant = [string, int]; }
                field label {
                    type = string;
                    optional = true;
                    comparison_order = 2;
                    validator { callback = "crate::codec::check_label"; }
                }
                field count {
                    type = long;
                    default = 5;
                    validator { gte = 0; lt = 100; }
                }
            }
            "#,
        );

        let globals = spec.globals.unwrap();
        assert_eq!(globals.rust_module.as_deref(), Some("gen::points"));
        assert_eq!(globals.uses, vec!["crate::codec"]);

        let point = spec.symbols.get_struct("point").unwrap();
        assert!(!point.strict);
        assert!(point.generate_comparison_operators);
        assert_eq!(point.fields.len(), 5);
        assert_eq!(point.fields[0].field_type, Some(FieldType::Single("int".into())));
        assert_eq!(point.fields[1].field_type, Some(FieldType::Array("string".into())));
        assert_eq!(
            point.fields[2].field_type,
            Some(FieldType::Variant(vec![
                FieldType::Single("string".into()),
                FieldType::Single("int".into())
            ]))
        );
        let label = &point.fields[3];
        assert!(label.optional);
        assert_eq!(label.comparison_order, 2);
        assert_eq!(
            label.validator.as_ref().unwrap().callback.as_deref(),
            Some("crate::codec::check_label")
        );
        let count = &point.fields[4];
        assert_eq!(count.default, Some(Expression::expr("5")));
        let validator = count.validator.as_ref().unwrap();
        assert_eq!(validator.gte.as_deref(), Some("0"));
        assert_eq!(validator.lt.as_deref(), Some("100"));
    }

    #[test]
    fn parses_commands_enums_and_parameters() {
        let spec = parse_ok(
            r#"
            enum color {
                type = string;
                value kRed = "red";
                value kBlue = "blue";
            }

            command find {
                command_name = "find";
                namespace = concatenate_with_db;
                api_version = "1";
                reply_type = find_reply;
                field filter { type = object; optional; }
            }

            struct find_reply { field ok = int; }

            server_parameter "maxConnections" {
                set_at = [startup, runtime];
                rust_vartype = i32;
                rust_varname = MAX_CONNECTIONS;
                default = 64;
                validator { gt = 0; }
            }

            config_option "net.port" {
                description = "The listen port";
                short_name = port;
                arg_vartype = Int;
                default = 27017;
            }
            "#,
        );

        let color = spec.symbols.get_enum("color").unwrap();
        assert_eq!(color.enum_type, "string");
        assert_eq!(color.values.len(), 2);
        assert_eq!(color.values[1].name, "kBlue");
        assert_eq!(color.values[1].value, "blue");

        let find = spec.symbols.get_command("find").unwrap();
        assert_eq!(find.namespace, Namespace::ConcatenateWithDb);
        assert_eq!(find.api_version, "1");
        assert_eq!(find.reply_type.as_deref(), Some("find_reply"));
        assert!(find.base.fields[0].optional);

        let param = &spec.server_parameters[0];
        assert_eq!(param.set_at, vec!["startup", "runtime"]);
        assert_eq!(param.default, Some(Expression::expr("64")));

        let option = &spec.configs[0];
        assert_eq!(option.short_name.as_deref(), Some("port"));
        assert_eq!(option.arg_vartype.as_deref(), Some("Int"));
    }

    #[test]
    fn reports_structural_errors() {
        let errors = parse_err(
            r#"
            struct a {
                strict = maybe;
                strict = true;
                bogus = 1;
                field x { optional; }
            }
            command c { field y = int; }
            "#,
        );
        assert!(errors.contains(ErrorId::IsNodeValidBool));
        assert!(errors.contains(ErrorId::DuplicateNode));
        assert!(errors.contains(ErrorId::UnknownNode));
        assert!(errors.contains(ErrorId::MissingRequiredField));
        assert_eq!(errors.count(), 5);
        assert!(errors.errors().iter().all(|e| e.file_name == "test.idl"));
        assert_eq!(errors.errors()[0].line, 3);
    }

    #[test]
    fn syntax_errors_are_collected() {
        let errors = parse_err("struct a { field x = int }");
        assert_eq!(errors.count(), 1);
        assert_eq!(errors.errors()[0].error_id, ErrorId::Syntax);
    }

    #[test]
    fn imports_are_merged_once() {
        let mut resolver = MemoryImportResolver::new();
        resolver
            .add("base.idl", "imports = [\"leaf.idl\"]; struct base { field x = int; }")
            .add("other.idl", "imports = [\"leaf.idl\"]; struct other { field y = leaf; }")
            .add("leaf.idl", "struct leaf { field z = int; }");

        let spec = parse(
            "imports = [\"base.idl\", \"other.idl\"]; struct root { field b = base; }",
            "root.idl",
            &resolver,
        )
        .unwrap();

        let names: Vec<_> = spec.symbols.structs.iter().map(|s| (s.name.as_str(), s.imported)).collect();
        assert_eq!(
            names,
            vec![("root", false), ("base", true), ("other", true), ("leaf", true)]
        );
        assert_eq!(
            spec.imports.unwrap().resolved_imports,
            vec!["base.idl", "other.idl", "leaf.idl"]
        );
    }

    #[test]
    fn missing_import_is_an_error() {
        let errors = parse("imports = [\"nope.idl\"];", "root.idl", &MemoryImportResolver::new()).unwrap_err();
        assert!(errors.contains(ErrorId::ImportNotFound));
    }
}
