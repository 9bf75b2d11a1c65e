//! Turns a parsed `IdlSpec` into the bound `ast::Idl`.
//!
//! Binding checks every schema rule that needs resolved types and fills in
//! the generated names and default expressions. Only definitions from the
//! root file are bound; imported ones are resolved against but not emitted.

use std::collections::{BTreeMap, BTreeSet};

use crate::ast::{
    self, AlternativeKind, ArgType, BasicType, DefaultValue, EnumRef, EnumType, FieldKind, Idl,
    SetAt, StructRef, Variant, VariantAlternative,
};
use crate::bson;
use crate::common::{escape_rust_keyword, numeric_literal, rust_string_literal, snake_case, title_case};
use crate::context::ParserContext;
use crate::error::{ErrorCollection, ErrorId};
use crate::rust_types::is_primitive_scalar_type;
use crate::syntax::{
    self, ConfigGlobal, Expression, FieldType, IdlSpec, Namespace, ResolvedFieldType, ResolvedType,
    SourceLocation, SymbolTable,
};

/// Binds the root file's definitions. Any error fails the whole file.
pub fn bind(spec: &IdlSpec) -> Result<Idl, ErrorCollection> {
    let mut errors = ErrorCollection::new();
    let mut idl = Idl::default();
    {
        let mut ctxt = ParserContext::new("", &mut errors);
        let symbols = &spec.symbols;

        if let Some(globals) = &spec.globals {
            idl.globals = ast::Global {
                rust_module:      globals.rust_module.clone(),
                uses:             globals.uses.clone(),
                initializer_name: globals.configs.as_ref().and_then(|c| c.initializer_name.clone()),
            };
        }

        for idl_type in symbols.types.iter().filter(|t| !t.imported) {
            validate_type(&mut ctxt, idl_type);
        }
        for idl_enum in symbols.enums.iter().filter(|e| !e.imported) {
            if let Some(bound) = bind_enum(&mut ctxt, idl_enum) {
                idl.enums.push(bound);
            }
        }
        for idl_struct in symbols.structs.iter().filter(|s| !s.imported) {
            if let Some(bound) = bind_struct(&mut ctxt, symbols, idl_struct, None) {
                idl.structs.push(bound);
            }
        }
        for command in symbols.commands.iter().filter(|c| !c.base.imported) {
            if let Some(bound) = bind_command(&mut ctxt, symbols, command) {
                idl.structs.push(bound);
            }
        }

        let mut parameter_names = BTreeSet::new();
        for param in &spec.server_parameters {
            if !parameter_names.insert(param.name.as_str()) {
                ctxt.add_duplicate_symbol_error(&param.location, &param.name, "server parameter", "server parameter");
                continue;
            }
            if let Some(bound) = bind_server_parameter(&mut ctxt, param) {
                idl.server_parameters.push(bound);
            }
        }

        let config_global = spec.globals.as_ref().and_then(|g| g.configs.as_ref());
        let mut option_names = BTreeSet::new();
        for option in &spec.configs {
            if !option_names.insert(option.name.as_str()) {
                ctxt.add_duplicate_symbol_error(&option.location, &option.name, "config option", "config option");
                continue;
            }
            if let Some(bound) = bind_config_option(&mut ctxt, config_global, option) {
                idl.configs.push(bound);
            }
        }
    }

    if errors.has_errors() {
        Err(errors)
    } else {
        tracing::debug!(
            "bound {} enums, {} structs, {} server parameters, {} config options",
            idl.enums.len(),
            idl.structs.len(),
            idl.server_parameters.len(),
            idl.configs.len()
        );
        Ok(idl)
    }
}

fn validate_type(ctxt: &mut ParserContext, idl_type: &syntax::Type) {
    let location = &idl_type.location;
    let tags = &idl_type.bson_serialization_type;

    for tag in tags {
        if !bson::is_valid_bson_type(tag) {
            ctxt.add_error(
                ErrorId::BadBsonType,
                location,
                format!("'{}' is not a valid bson type for '{}'", tag, idl_type.name),
            );
            return;
        }
    }

    let is_any = tags.iter().any(|t| t == bson::ANY);
    let is_chain = tags.iter().any(|t| t == bson::CHAIN);

    if tags.len() > 1 {
        if is_any || is_chain {
            ctxt.add_error(
                ErrorId::BadBsonTypeCombination,
                location,
                format!("'{}' mixes 'any' or 'chain' with other bson types", idl_type.name),
            );
            return;
        }
        if let Some(tag) = tags.iter().find(|t| !bson::is_scalar_bson_type(t)) {
            ctxt.add_error(
                ErrorId::BadBsonTypeCombination,
                location,
                format!(
                    "'{}' lists several bson types, but '{}' is not a scalar type",
                    idl_type.name, tag
                ),
            );
            return;
        }
    }

    let single = match tags.as_slice() {
        [single] => Some(single.as_str()),
        _ => None,
    };

    match (&idl_type.bindata_subtype, single) {
        (None, Some("bindata")) => {
            ctxt.add_error(
                ErrorId::MissingBinDataSubtype,
                location,
                format!("'{}' is bindata and needs a bindata_subtype", idl_type.name),
            );
        }
        (Some(subtype), Some("bindata")) => {
            if !bson::is_valid_bindata_subtype(subtype) {
                ctxt.add_error(
                    ErrorId::BadBinDataSubtypeValue,
                    location,
                    format!("'{}' is not a valid bindata subtype", subtype),
                );
            }
        }
        (Some(_), _) => {
            ctxt.add_error(
                ErrorId::BadBinDataSubtype,
                location,
                format!("'{}' has a bindata_subtype but is not bindata", idl_type.name),
            );
        }
        (None, _) => {}
    }

    if is_any || is_chain {
        if idl_type.serializer.is_none() || idl_type.deserializer.is_none() {
            ctxt.add_error(
                ErrorId::BadAnyTypeUse,
                location,
                format!(
                    "'{}' is an '{}' type and needs both a serializer and a deserializer",
                    idl_type.name,
                    if is_any { bson::ANY } else { bson::CHAIN }
                ),
            );
        }
        return;
    }

    if idl_type.deserializer.is_none() {
        let rust_type = idl_type.rust_type.as_deref().unwrap_or_default().trim();
        let natural = single.and_then(bson::natural_type);
        if tags.len() > 1 || natural != Some(rust_type) {
            ctxt.add_error(
                ErrorId::MissingAstRequiredField,
                location,
                format!(
                    "'{}' stores '{}', which is not the natural type of its bson type, and needs a deserializer",
                    idl_type.name, rust_type
                ),
            );
        }
    }
}

fn enum_type(idl_enum: &syntax::Enum) -> EnumType {
    if idl_enum.enum_type == "int" {
        EnumType::Int
    } else {
        EnumType::String
    }
}

fn enum_rust_name(idl_enum: &syntax::Enum) -> String {
    title_case(idl_enum.rust_name.as_deref().unwrap_or(&idl_enum.name))
}

fn struct_rust_name(idl_struct: &syntax::Struct) -> String {
    title_case(idl_struct.rust_name.as_deref().unwrap_or(&idl_struct.name))
}

fn bind_enum(ctxt: &mut ParserContext, idl_enum: &syntax::Enum) -> Option<ast::Enum> {
    let start = ctxt.error_count();

    if idl_enum.enum_type != "string" && idl_enum.enum_type != "int" {
        ctxt.add_error(
            ErrorId::BadEnumType,
            &idl_enum.location,
            format!(
                "enum '{}' has type '{}'; only 'string' and 'int' are supported",
                idl_enum.name, idl_enum.enum_type
            ),
        );
        return None;
    }

    let mut names = BTreeSet::new();
    let mut values = BTreeSet::new();
    let mut bound_values = Vec::with_capacity(idl_enum.values.len());
    for value in &idl_enum.values {
        let rust_name = crate::common::enum_variant_name(&value.name);
        if !names.insert(rust_name.clone()) {
            ctxt.add_error(
                ErrorId::DuplicateEnumValue,
                &value.location,
                format!("enum '{}' declares the name '{}' twice", idl_enum.name, value.name),
            );
        }
        if !values.insert(value.value.as_str()) {
            ctxt.add_error(
                ErrorId::DuplicateEnumValue,
                &value.location,
                format!("enum '{}' declares the value '{}' twice", idl_enum.name, value.value),
            );
        }
        if idl_enum.enum_type == "int" && value.value.parse::<i32>().is_err() {
            ctxt.add_error(
                ErrorId::BadEnumValue,
                &value.location,
                format!("'{}' is not a valid int enum value", value.value),
            );
        }
        bound_values.push(ast::EnumValue {
            name: value.name.clone(),
            rust_name,
            value: value.value.clone(),
        });
    }

    if idl_enum.values.is_empty() {
        ctxt.add_error(
            ErrorId::MissingAstRequiredField,
            &idl_enum.location,
            format!("enum '{}' has no values", idl_enum.name),
        );
    }

    if ctxt.error_count() > start {
        return None;
    }

    Some(ast::Enum {
        name:        idl_enum.name.clone(),
        rust_name:   enum_rust_name(idl_enum),
        description: idl_enum.description.clone(),
        enum_type:   enum_type(idl_enum),
        values:      bound_values,
    })
}

fn basic_default(expr: &Expression, rust_type: &str) -> DefaultValue {
    let rust_type = rust_type.trim();
    let (text, is_literal) = match (&expr.literal, &expr.expr) {
        (Some(literal), _) => (literal.as_str(), true),
        (None, Some(text)) => (text.as_str(), false),
        (None, None) => {
            return DefaultValue {
                expr:     "Default::default()".to_owned(),
                constant: false,
            }
        }
    };

    if is_primitive_scalar_type(rust_type) {
        return DefaultValue {
            expr:     numeric_literal(rust_type, text),
            constant: true,
        };
    }

    let argument = if is_literal {
        rust_string_literal(text)
    } else {
        text.to_owned()
    };
    DefaultValue {
        expr:     format!("{}::from({})", rust_type, argument),
        constant: false,
    }
}

fn expression_text(expr: &Expression) -> &str {
    expr.literal
        .as_deref()
        .or(expr.expr.as_deref())
        .unwrap_or_default()
}

fn to_basic_type(idl_type: &syntax::Type) -> BasicType {
    let rust_type = idl_type.rust_type.clone().unwrap_or_default();
    let default = idl_type
        .default
        .as_ref()
        .map(|d| basic_default(d, &rust_type).expr);
    BasicType {
        name: idl_type.name.clone(),
        rust_type,
        bson_serialization_type: idl_type.bson_serialization_type.clone(),
        bindata_subtype: idl_type.bindata_subtype.clone(),
        serializer: idl_type.serializer.clone(),
        deserializer: idl_type.deserializer.clone(),
        default,
    }
}

fn to_field_kind(resolved: ResolvedType) -> FieldKind {
    match resolved {
        ResolvedType::Type(t) => FieldKind::Basic(to_basic_type(t)),
        ResolvedType::Enum(e) => FieldKind::Enum(EnumRef {
            name:      e.name.clone(),
            rust_name: enum_rust_name(e),
            enum_type: enum_type(e),
        }),
        ResolvedType::Struct(s) => FieldKind::Struct(StructRef {
            name:      s.name.clone(),
            rust_name: struct_rust_name(s),
        }),
    }
}

fn is_sentinel_type(resolved: &ResolvedType) -> Option<&'static str> {
    match resolved {
        ResolvedType::Type(t) if t.bson_serialization_type.iter().any(|b| b == bson::ANY) => Some(bson::ANY),
        ResolvedType::Type(t) if t.bson_serialization_type.iter().any(|b| b == bson::CHAIN) => Some(bson::CHAIN),
        _ => None,
    }
}

/// Resolves a field's declared type into its kind and array marker.
fn bind_field_kind(
    ctxt: &mut ParserContext,
    symbols: &SymbolTable,
    location: &SourceLocation,
    field_name: &str,
    field_type: &FieldType,
    variant_rust_name: &str,
) -> Option<(FieldKind, bool)> {
    if let FieldType::Variant(alternatives) = field_type {
        if let Some(bad) = alternatives.iter().find(|a| !matches!(a, FieldType::Single(_))) {
            ctxt.add_error(
                ErrorId::BadVariantAlternative,
                location,
                format!("variant field '{}' cannot have the alternative '{}'", field_name, bad),
            );
            return None;
        }
    }

    match symbols.resolve_field_type(ctxt, location, field_name, field_type)? {
        ResolvedFieldType::Single(resolved) => {
            if is_sentinel_type(&resolved) == Some(bson::CHAIN) {
                ctxt.add_error(
                    ErrorId::ChainedTypeNotChain,
                    location,
                    format!(
                        "field '{}' uses the chain type '{}'; declare it with chained_type instead",
                        field_name,
                        resolved.name()
                    ),
                );
                return None;
            }
            Some((to_field_kind(resolved), false))
        }
        ResolvedFieldType::Array(resolved) => {
            if let Some(sentinel) = is_sentinel_type(&resolved) {
                ctxt.add_error(
                    ErrorId::ArrayOfAny,
                    location,
                    format!(
                        "field '{}' is an array of '{}', which has bson type '{}'",
                        field_name,
                        resolved.name(),
                        sentinel
                    ),
                );
                return None;
            }
            Some((to_field_kind(resolved), true))
        }
        ResolvedFieldType::Variant(alternatives) => {
            bind_variant(ctxt, location, field_name, &alternatives, variant_rust_name)
                .map(|v| (FieldKind::Variant(v), false))
        }
    }
}

fn bind_variant(
    ctxt: &mut ParserContext,
    location: &SourceLocation,
    field_name: &str,
    alternatives: &[ResolvedType],
    rust_name: &str,
) -> Option<Variant> {
    let start = ctxt.error_count();
    let mut seen_tags: BTreeMap<String, String> = BTreeMap::new();
    let mut struct_count = 0;
    let mut bound = Vec::with_capacity(alternatives.len());

    for alternative in alternatives {
        let (tags, kind) = match alternative {
            ResolvedType::Type(t) => {
                if is_sentinel_type(alternative).is_some() {
                    ctxt.add_error(
                        ErrorId::BadVariantAlternative,
                        location,
                        format!(
                            "variant field '{}' cannot have the 'any' or 'chain' alternative '{}'",
                            field_name, t.name
                        ),
                    );
                    continue;
                }
                (t.bson_serialization_type.clone(), AlternativeKind::Basic(to_basic_type(t)))
            }
            ResolvedType::Enum(e) => {
                ctxt.add_error(
                    ErrorId::BadVariantAlternative,
                    location,
                    format!("variant field '{}' cannot have the enum alternative '{}'", field_name, e.name),
                );
                continue;
            }
            ResolvedType::Struct(s) => {
                struct_count += 1;
                if struct_count > 1 {
                    ctxt.add_error(
                        ErrorId::VariantMultipleStructs,
                        location,
                        format!("variant field '{}' has more than one struct alternative", field_name),
                    );
                    continue;
                }
                (
                    vec!["object".to_owned()],
                    AlternativeKind::Struct(StructRef {
                        name:      s.name.clone(),
                        rust_name: struct_rust_name(s),
                    }),
                )
            }
        };

        for tag in &tags {
            if let Some(previous) = seen_tags.insert(tag.clone(), alternative.name().to_owned()) {
                ctxt.add_error(
                    ErrorId::VariantOverlap,
                    location,
                    format!(
                        "variant field '{}' has alternatives '{}' and '{}' that both accept bson type '{}'",
                        field_name,
                        previous,
                        alternative.name(),
                        tag
                    ),
                );
            }
        }

        bound.push(VariantAlternative {
            rust_name: title_case(alternative.name()),
            kind,
        });
    }

    if ctxt.error_count() > start {
        return None;
    }
    Some(Variant {
        rust_name:    rust_name.to_owned(),
        alternatives: bound,
    })
}

fn bind_validator(validator: &Option<syntax::Validator>) -> Option<ast::Validator> {
    let validator = validator.as_ref().filter(|v| !v.is_empty())?;
    Some(ast::Validator {
        gt:       validator.gt.clone(),
        lt:       validator.lt.clone(),
        gte:      validator.gte.clone(),
        lte:      validator.lte.clone(),
        callback: validator.callback.clone(),
    })
}

fn bind_default(
    ctxt: &mut ParserContext,
    symbols: &SymbolTable,
    location: &SourceLocation,
    field_name: &str,
    expr: &Expression,
    kind: &FieldKind,
) -> Option<DefaultValue> {
    match kind {
        FieldKind::Basic(basic) => Some(basic_default(expr, &basic.rust_type)),
        FieldKind::Enum(enum_ref) => {
            let text = expression_text(expr);
            let value = symbols
                .get_enum(&enum_ref.name)
                .and_then(|e| e.values.iter().find(|v| v.name == text || v.value == text));
            match value {
                Some(value) => Some(DefaultValue {
                    expr:     format!(
                        "{}::{}",
                        enum_ref.rust_name,
                        crate::common::enum_variant_name(&value.name)
                    ),
                    constant: true,
                }),
                None => {
                    ctxt.add_error(
                        ErrorId::BadEnumValue,
                        location,
                        format!(
                            "default '{}' of field '{}' is not a value of enum '{}'",
                            text, field_name, enum_ref.name
                        ),
                    );
                    None
                }
            }
        }
        FieldKind::Struct(s) => Some(DefaultValue {
            expr:     format!("{}::from({})", s.rust_name, expression_text(expr)),
            constant: false,
        }),
        FieldKind::Variant(v) => Some(DefaultValue {
            expr:     format!("{}::from({})", v.rust_name, expression_text(expr)),
            constant: false,
        }),
    }
}

fn bind_field(
    ctxt: &mut ParserContext,
    symbols: &SymbolTable,
    owner_rust_name: &str,
    field: &syntax::Field,
) -> Option<ast::Field> {
    let location = &field.location;
    let rust_name = escape_rust_keyword(&snake_case(field.rust_name.as_deref().unwrap_or(&field.name)));
    let variant_rust_name = format!("{}{}", owner_rust_name, title_case(&rust_name));

    let (kind, array) = match &field.field_type {
        Some(field_type) => {
            bind_field_kind(ctxt, symbols, location, &field.name, field_type, &variant_rust_name)?
        }
        None => {
            let object = symbols.get_type("object")?;
            (FieldKind::Basic(to_basic_type(object)), false)
        }
    };

    if field.optional && field.default.is_some() {
        ctxt.add_error(
            ErrorId::OptionalWithDefault,
            location,
            format!("field '{}' is optional and cannot also have a default", field.name),
        );
        return None;
    }
    if array && field.default.is_some() {
        ctxt.add_error(
            ErrorId::DefaultWithArray,
            location,
            format!("array field '{}' cannot have a default", field.name),
        );
        return None;
    }

    let default = match &field.default {
        Some(expr) => Some(bind_default(ctxt, symbols, location, &field.name, expr, &kind)?),
        None => None,
    };

    let validator = bind_validator(&field.validator);
    if let Some(validator) = &validator {
        let ordered = match &kind {
            FieldKind::Basic(basic) => basic.rust_type.trim() != "Document" && !basic.is_any(),
            FieldKind::Enum(_) | FieldKind::Struct(_) | FieldKind::Variant(_) => false,
        };
        if !validator.bounds().is_empty() && !ordered {
            ctxt.add_error(
                ErrorId::ValidatorOnNonNumeric,
                location,
                format!("field '{}' has a range validator but its type is not comparable", field.name),
            );
            return None;
        }
    }

    Some(ast::Field {
        name: field.name.clone(),
        rust_name,
        description: field.description.clone(),
        kind,
        array,
        optional: field.optional,
        ignore: field.ignore,
        chained: false,
        chained_struct_field: None,
        default,
        validator,
        comparison_order: field.comparison_order,
        supports_doc_sequence: field.supports_doc_sequence,
        serialize_op_msg_request_only: field.serialize_op_msg_request_only,
        unstable: field.unstable,
    })
}

fn chained_member(name: &str, rust_name: &str, kind: FieldKind) -> ast::Field {
    ast::Field {
        name: name.to_owned(),
        rust_name: escape_rust_keyword(&snake_case(rust_name)),
        description: None,
        kind,
        array: false,
        optional: false,
        ignore: false,
        chained: true,
        chained_struct_field: None,
        default: None,
        validator: None,
        comparison_order: -1,
        supports_doc_sequence: false,
        serialize_op_msg_request_only: false,
        unstable: false,
    }
}

/// The `$db` field every command carries; it only goes into an OpMsgRequest.
fn db_name_field(symbols: &SymbolTable) -> Option<ast::Field> {
    let string = symbols.get_type("string")?;
    Some(ast::Field {
        name: "$db".to_owned(),
        rust_name: "db_name".to_owned(),
        description: Some("The database name the command runs against.".to_owned()),
        kind: FieldKind::Basic(to_basic_type(string)),
        array: false,
        optional: false,
        ignore: false,
        chained: false,
        chained_struct_field: None,
        default: None,
        validator: None,
        comparison_order: -1,
        supports_doc_sequence: false,
        serialize_op_msg_request_only: true,
        unstable: false,
    })
}

fn bind_chained_types(
    ctxt: &mut ParserContext,
    symbols: &SymbolTable,
    idl_struct: &syntax::Struct,
    fields: &mut Vec<(ast::Field, SourceLocation)>,
) {
    for chained in &idl_struct.chained_types {
        match symbols.resolve_type_name(&chained.name) {
            Some(ResolvedType::Type(t)) if t.bson_serialization_type.iter().any(|b| b == bson::CHAIN) => {
                let member = chained_member(&chained.name, &chained.rust_name, FieldKind::Basic(to_basic_type(t)));
                fields.push((member, chained.location.clone()));
            }
            Some(_) => {
                ctxt.add_error(
                    ErrorId::ChainedTypeNotChain,
                    &chained.location,
                    format!("chained type '{}' does not have bson type 'chain'", chained.name),
                );
                continue;
            }
            None => {
                ctxt.add_unknown_type_error(&chained.location, &chained.rust_name, &chained.name);
                continue;
            }
        }
        if idl_struct.strict {
            ctxt.add_error(
                ErrorId::ChainedTypeWithStrict,
                &chained.location,
                format!(
                    "struct '{}' is strict and cannot have the chained type '{}'",
                    idl_struct.name, chained.name
                ),
            );
        }
    }
}

fn bind_chained_structs(
    ctxt: &mut ParserContext,
    symbols: &SymbolTable,
    idl_struct: &syntax::Struct,
    fields: &mut Vec<(ast::Field, SourceLocation)>,
) {
    for chained in &idl_struct.chained_structs {
        let chained_struct = match symbols.get_struct(&chained.name) {
            Some(s) => s,
            None => {
                if symbols.resolve_type_name(&chained.name).is_some() {
                    ctxt.add_error(
                        ErrorId::ChainedStructNotStruct,
                        &chained.location,
                        format!("chained struct '{}' is not a struct", chained.name),
                    );
                } else {
                    ctxt.add_unknown_type_error(&chained.location, &chained.rust_name, &chained.name);
                }
                continue;
            }
        };

        if !chained_struct.chained_structs.is_empty() || !chained_struct.chained_types.is_empty() {
            ctxt.add_error(
                ErrorId::ChainedStructNotStruct,
                &chained.location,
                format!("chained struct '{}' has chained members of its own", chained.name),
            );
            continue;
        }

        let chained_rust_name = struct_rust_name(chained_struct);
        let member = chained_member(
            &chained.name,
            &chained.rust_name,
            FieldKind::Struct(StructRef {
                name:      chained_struct.name.clone(),
                rust_name: chained_rust_name.clone(),
            }),
        );
        let member_rust_name = member.rust_name.clone();
        fields.push((member, chained.location.clone()));

        if !idl_struct.inline_chained_structs {
            if idl_struct.strict {
                ctxt.add_error(
                    ErrorId::ChainedTypeWithStrict,
                    &chained.location,
                    format!(
                        "struct '{}' is strict and cannot chain '{}' without inlining it",
                        idl_struct.name, chained.name
                    ),
                );
            }
            continue;
        }

        if chained_struct.immutable {
            ctxt.add_error(
                ErrorId::ChainedImmutableStruct,
                &chained.location,
                format!("immutable struct '{}' cannot be chained", chained.name),
            );
            continue;
        }

        for chained_field in &chained_struct.fields {
            let Some(mut bound) = bind_field(ctxt, symbols, &chained_rust_name, chained_field) else {
                continue;
            };
            if bound.array {
                ctxt.add_error(
                    ErrorId::ChainedStructWithArray,
                    &chained.location,
                    format!(
                        "chained struct '{}' has the array field '{}'",
                        chained.name, chained_field.name
                    ),
                );
                continue;
            }
            bound.chained_struct_field = Some(member_rust_name.clone());
            fields.push((bound, chained.location.clone()));
        }
    }
}

fn check_struct_fields(
    ctxt: &mut ParserContext,
    idl_struct: &syntax::Struct,
    fields: &[(ast::Field, SourceLocation)],
    is_command: bool,
) {
    let mut names = BTreeSet::new();
    let mut rust_names = BTreeSet::new();
    let mut orders = BTreeSet::new();

    for (field, location) in fields {
        if !field.chained {
            if !names.insert(field.name.as_str()) {
                let error_id = if field.chained_struct_field.is_some() {
                    ErrorId::ChainedFieldConflict
                } else {
                    ErrorId::DuplicateField
                };
                ctxt.add_error(
                    error_id,
                    location,
                    format!("struct '{}' has more than one field named '{}'", idl_struct.name, field.name),
                );
                continue;
            }
        }
        if field.chained_struct_field.is_none() && !rust_names.insert(field.rust_name.as_str()) {
            ctxt.add_error(
                ErrorId::DuplicateField,
                location,
                format!(
                    "struct '{}' has more than one member named '{}'",
                    idl_struct.name, field.rust_name
                ),
            );
        }

        if field.comparison_order >= 0 && !orders.insert(field.comparison_order) {
            ctxt.add_error(
                ErrorId::DuplicateComparisonOrder,
                location,
                format!(
                    "struct '{}' uses comparison_order {} more than once",
                    idl_struct.name, field.comparison_order
                ),
            );
        }

        if field.supports_doc_sequence {
            let holds_objects = match &field.kind {
                FieldKind::Struct(_) => true,
                FieldKind::Basic(basic) => basic.rust_type.trim() == "Document",
                FieldKind::Enum(_) | FieldKind::Variant(_) => false,
            };
            if !field.array || !holds_objects {
                ctxt.add_error(
                    ErrorId::DocSequenceNotArrayOfStruct,
                    location,
                    format!(
                        "field '{}' supports document sequences but is not an array of structs or objects",
                        field.name
                    ),
                );
            } else if !is_command {
                ctxt.add_error(
                    ErrorId::DocSequenceNotCommand,
                    location,
                    format!(
                        "field '{}' supports document sequences but '{}' is not a command",
                        field.name, idl_struct.name
                    ),
                );
            }
        }

        if idl_struct.generate_comparison_operators {
            if let FieldKind::Variant(variant) = &field.kind {
                let has_document = variant.alternatives.iter().any(|a| {
                    matches!(&a.kind, AlternativeKind::Basic(basic) if basic.rust_type.trim() == "Document")
                });
                if has_document {
                    ctxt.add_error(
                        ErrorId::VariantCompared,
                        location,
                        format!(
                            "variant field '{}' has an object alternative and cannot be compared",
                            field.name
                        ),
                    );
                }
            }
        }
    }
}

fn bind_struct(
    ctxt: &mut ParserContext,
    symbols: &SymbolTable,
    idl_struct: &syntax::Struct,
    command: Option<&syntax::Command>,
) -> Option<ast::Struct> {
    let start = ctxt.error_count();
    let rust_name = struct_rust_name(idl_struct);

    let mut fields: Vec<(ast::Field, SourceLocation)> = Vec::new();
    bind_chained_types(ctxt, symbols, idl_struct, &mut fields);
    bind_chained_structs(ctxt, symbols, idl_struct, &mut fields);
    for field in &idl_struct.fields {
        if let Some(bound) = bind_field(ctxt, symbols, &rust_name, field) {
            fields.push((bound, field.location.clone()));
        }
    }
    if command.is_some() {
        if let Some(db_name) = db_name_field(symbols) {
            fields.push((db_name, idl_struct.location.clone()));
        }
    }

    check_struct_fields(ctxt, idl_struct, &fields, command.is_some());

    if ctxt.error_count() > start {
        return None;
    }

    Some(ast::Struct {
        name: idl_struct.name.clone(),
        rust_name,
        description: idl_struct.description.clone(),
        strict: idl_struct.strict,
        immutable: idl_struct.immutable,
        inline_chained_structs: idl_struct.inline_chained_structs,
        generate_comparison_operators: idl_struct.generate_comparison_operators,
        fields: fields.into_iter().map(|(field, _)| field).collect(),
        command: None,
    })
}

fn bind_command(
    ctxt: &mut ParserContext,
    symbols: &SymbolTable,
    command: &syntax::Command,
) -> Option<ast::Struct> {
    let location = &command.base.location;
    let start = ctxt.error_count();
    let bound = bind_struct(ctxt, symbols, &command.base, Some(command));

    let command_field = match (command.namespace, &command.command_type) {
        (Namespace::Type, None) => {
            ctxt.add_error(
                ErrorId::MissingCommandType,
                location,
                format!("command '{}' has namespace 'type' but no type", command.command_name),
            );
            None
        }
        (Namespace::Type, Some(command_type)) => {
            let variant_rust_name = format!("{}CommandParameter", struct_rust_name(&command.base));
            bind_field_kind(
                ctxt,
                symbols,
                location,
                &command.command_name,
                command_type,
                &variant_rust_name,
            )
            .map(|(kind, array)| ast::Field {
                name: command.command_name.clone(),
                rust_name: "command_parameter".to_owned(),
                description: None,
                kind,
                array,
                optional: false,
                ignore: false,
                chained: false,
                chained_struct_field: None,
                default: None,
                validator: None,
                comparison_order: -1,
                supports_doc_sequence: false,
                serialize_op_msg_request_only: false,
                unstable: false,
            })
        }
        (namespace, Some(_)) => {
            ctxt.add_error(
                ErrorId::BadCommandNamespace,
                location,
                format!(
                    "command '{}' has namespace '{}' and cannot have a type",
                    command.command_name, namespace
                ),
            );
            None
        }
        (_, None) => None,
    };

    if let Some(reply_type) = &command.reply_type {
        if symbols.get_struct(reply_type).is_none() {
            ctxt.add_unknown_type_error(location, "reply_type", reply_type);
        }
    }

    let mut bound = bound?;
    if ctxt.error_count() > start {
        return None;
    }
    bound.command = Some(ast::Command {
        command_name: command.command_name.clone(),
        namespace: command.namespace,
        command_field,
        api_version: command.api_version.clone(),
        reply_type: command.reply_type.clone(),
    });
    Some(bound)
}

fn bind_set_at(ctxt: &mut ParserContext, param: &syntax::ServerParameter) -> Option<SetAt> {
    let set_at: BTreeSet<String> = param.set_at.iter().map(|s| s.to_lowercase()).collect();
    let names: Vec<&str> = set_at.iter().map(|s| s.as_str()).collect();
    match names.as_slice() {
        ["startup"] => Some(SetAt::StartupOnly),
        ["runtime"] => Some(SetAt::RuntimeOnly),
        ["runtime", "startup"] => Some(SetAt::StartupAndRuntime),
        ["cluster"] => Some(SetAt::ClusterWide),
        _ => {
            ctxt.add_error(
                ErrorId::BadSetAt,
                &param.location,
                format!(
                    "server parameter '{}' has set_at [{}]; use startup, runtime, both, or cluster",
                    param.name,
                    param.set_at.join(", ")
                ),
            );
            None
        }
    }
}

fn bind_server_parameter(
    ctxt: &mut ParserContext,
    param: &syntax::ServerParameter,
) -> Option<ast::ServerParameter> {
    let start = ctxt.error_count();
    let location = &param.location;
    let set_at = bind_set_at(ctxt, param);

    let has_storage = param.rust_varname.is_some();
    let has_hooks = param.from_string.is_some() || param.append_bson.is_some();

    if has_storage && has_hooks {
        ctxt.add_error(
            ErrorId::ServerParameterStorage,
            location,
            format!(
                "server parameter '{}' has both rust_varname and from_string/append_bson hooks",
                param.name
            ),
        );
    } else if !has_storage && !has_hooks {
        ctxt.add_error(
            ErrorId::ServerParameterStorage,
            location,
            format!(
                "server parameter '{}' needs either rust_varname or from_string and append_bson",
                param.name
            ),
        );
    } else if has_hooks {
        if param.from_string.is_none() || param.append_bson.is_none() {
            ctxt.add_error(
                ErrorId::ServerParameterStorage,
                location,
                format!("server parameter '{}' needs both from_string and append_bson", param.name),
            );
        }
        if param.default.is_some() || param.validator.is_some() || param.on_update.is_some() {
            ctxt.add_error(
                ErrorId::ServerParameterStorage,
                location,
                format!(
                    "server parameter '{}' has no storage and cannot have a default, validator or on_update",
                    param.name
                ),
            );
        }
    } else if param.rust_vartype.is_none() && param.default.as_ref().map_or(false, |d| d.expr.is_some()) {
        ctxt.add_error(
            ErrorId::MissingAstRequiredField,
            location,
            format!(
                "server parameter '{}' has an expression default and needs rust_vartype",
                param.name
            ),
        );
    }

    if param.rust_vartype.is_some() && param.rust_varname.is_none() {
        ctxt.add_error(
            ErrorId::MissingAstRequiredField,
            location,
            format!("server parameter '{}' has rust_vartype but no rust_varname", param.name),
        );
    }

    let set_at = set_at?;
    if ctxt.error_count() > start {
        return None;
    }

    Some(ast::ServerParameter {
        name: param.name.clone(),
        description: param.description.clone(),
        set_at,
        rust_vartype: param.rust_vartype.clone(),
        rust_varname: param.rust_varname.clone(),
        condition: param.condition.clone(),
        deprecated_names: param.deprecated_name.clone(),
        redact: param.redact,
        test_only: param.test_only,
        default: param.default.clone(),
        validator: bind_validator(&param.validator),
        on_update: param.on_update.clone(),
        from_string: param.from_string.clone(),
        append_bson: param.append_bson.clone(),
    })
}

/// `N`, `N-M` and `N-` (open ended, `-1`).
fn parse_positional(text: &str) -> Option<(i32, i32)> {
    match text.split_once('-') {
        None => {
            let n = text.trim().parse().ok()?;
            Some((n, n))
        }
        Some((start, "")) => Some((start.trim().parse().ok()?, -1)),
        Some((start, end)) => {
            let start: i32 = start.trim().parse().ok()?;
            let end: i32 = end.trim().parse().ok()?;
            (start <= end).then_some((start, end))
        }
    }
}

const OPTION_SOURCES: &[&str] = &["cli", "ini", "yaml"];

fn bind_config_option(
    ctxt: &mut ParserContext,
    global: Option<&ConfigGlobal>,
    option: &syntax::ConfigOption,
) -> Option<ast::ConfigOption> {
    let start = ctxt.error_count();
    let location = &option.location;

    let vartype = option.arg_vartype.as_deref().unwrap_or_default();
    let arg_vartype = ArgType::from_name(vartype);
    if arg_vartype.is_none() {
        ctxt.add_error(
            ErrorId::BadArgVartype,
            location,
            format!("config option '{}' has unknown arg_vartype '{}'", option.name, vartype),
        );
    }

    let sources = if option.source.is_empty() {
        global.map(|g| g.source.clone()).unwrap_or_default()
    } else {
        option.source.clone()
    };
    for source in &sources {
        if !OPTION_SOURCES.contains(&source.as_str()) {
            ctxt.add_error(
                ErrorId::BadSource,
                location,
                format!("config option '{}' has unknown source '{}'", option.name, source),
            );
        }
    }

    let composing = match option.duplicate_behavior.as_deref() {
        None | Some("overwrite") => false,
        Some("append") => true,
        Some(other) => {
            ctxt.add_error(
                ErrorId::BadDuplicateBehavior,
                location,
                format!(
                    "config option '{}' has duplicate_behavior '{}'; use append or overwrite",
                    option.name, other
                ),
            );
            false
        }
    };

    let positional = match &option.positional {
        Some(text) => {
            let parsed = parse_positional(text);
            if parsed.is_none() {
                ctxt.add_error(
                    ErrorId::BadPositional,
                    location,
                    format!("config option '{}' has invalid positional '{}'", option.name, text),
                );
            }
            parsed
        }
        None => None,
    };

    if option.rust_vartype.is_some() != option.rust_varname.is_some() {
        ctxt.add_error(
            ErrorId::MissingAstRequiredField,
            location,
            format!(
                "config option '{}' needs both rust_vartype and rust_varname, or neither",
                option.name
            ),
        );
    }

    let arg_vartype = arg_vartype?;
    if ctxt.error_count() > start {
        return None;
    }

    let long_name = option.short_name.clone().unwrap_or_else(|| option.name.clone());
    let single_name = match &option.single_name {
        Some(single) => format!("{},{}", long_name, single),
        None => long_name,
    };

    Some(ast::ConfigOption {
        name: option.name.clone(),
        single_name,
        deprecated_names: option.deprecated_name.clone(),
        deprecated_short_names: option.deprecated_short_name.clone(),
        description: option.description.clone().unwrap_or_default(),
        section: option
            .section
            .clone()
            .or_else(|| global.and_then(|g| g.section.clone())),
        arg_vartype,
        rust_vartype: option.rust_vartype.clone(),
        rust_varname: option.rust_varname.clone(),
        condition: option.condition.clone(),
        conflicts: option.conflicts.clone(),
        requires: option.requires.clone(),
        hidden: option.hidden,
        redact: option.redact,
        default: option.default.clone(),
        implicit: option.implicit.clone(),
        sources,
        composing,
        positional,
        validator: bind_validator(&option.validator),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_text;

    fn bind_text(text: &str) -> Result<Idl, ErrorCollection> {
        let mut errors = ErrorCollection::new();
        let spec = parse_text(text, "test.idl", &mut errors);
        assert!(!errors.has_errors(), "{}", errors);
        bind(&spec)
    }

    fn bind_error(text: &str, error_id: ErrorId) {
        match bind_text(text) {
            Ok(_) => panic!("expected {} but binding succeeded", error_id),
            Err(errors) => assert!(errors.contains(error_id), "expected {}, got:\n{}", error_id, errors),
        }
    }

    #[test]
    fn binds_fields_with_names_and_defaults() {
        let idl = bind_text(
            r#"
            enum color { type = string; value kRed = "red"; value kBlue = "blue"; }
            struct point {
                field x = int;
                field label { type = string; default = "origin"; }
                field shade { type = color; default = kBlue; }
                field count { type = long; default = 10; }
                field type = string;
            }
            "#,
        )
        .unwrap();

        let point = &idl.structs[0];
        assert_eq!(point.rust_name, "Point");
        let names: Vec<_> = point.fields.iter().map(|f| f.rust_name.as_str()).collect();
        assert_eq!(names, vec!["x", "label", "shade", "count", "type_"]);
        assert_eq!(
            point.fields[1].default,
            Some(DefaultValue {
                expr:     "String::from(\"origin\")".to_owned(),
                constant: false,
            })
        );
        assert_eq!(
            point.fields[2].default,
            Some(DefaultValue {
                expr:     "Color::Blue".to_owned(),
                constant: true,
            })
        );
        assert_eq!(point.fields[3].default.as_ref().map(|d| d.constant), Some(true));
        assert!(point.fields[0].is_required());
        assert!(!point.fields[1].is_required());
    }

    #[test]
    fn commands_get_db_name_and_command_parameter() {
        let idl = bind_text(
            r#"
            command find {
                namespace = type;
                type = string;
                api_version = "1";
                field filter { type = object; optional = true; }
            }
            "#,
        )
        .unwrap();

        let find = &idl.structs[0];
        let command = find.command.as_ref().unwrap();
        assert_eq!(command.namespace, Namespace::Type);
        assert_eq!(command.command_field.as_ref().unwrap().rust_name, "command_parameter");
        let db = find.fields.last().unwrap();
        assert_eq!(db.name, "$db");
        assert!(db.serialize_op_msg_request_only);
    }

    #[test]
    fn inlines_chained_struct_fields() {
        let idl = bind_text(
            r#"
            struct base { field a = int; field b { type = string; optional = true; } }
            struct derived { chained_struct base = base_fields; field c = int; }
            "#,
        )
        .unwrap();

        let derived = &idl.structs[1];
        let summary: Vec<_> = derived
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.chained, f.chained_struct_field.as_deref()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("base", true, None),
                ("a", false, Some("base_fields")),
                ("b", false, Some("base_fields")),
                ("c", false, None),
            ]
        );
    }

    #[test]
    fn rejects_bad_types() {
        bind_error(r#"type t { rust_type = "i32"; bson_serialization_type = int32; }"#, ErrorId::BadBsonType);
        bind_error(
            r#"type t { rust_type = "Bson"; bson_serialization_type = [any, int]; deserializer = "x::y"; }"#,
            ErrorId::BadBsonTypeCombination,
        );
        bind_error(
            r#"type t { rust_type = "Vec<u8>"; bson_serialization_type = bindata; }"#,
            ErrorId::MissingBinDataSubtype,
        );
        bind_error(
            r#"type t { rust_type = "Bson"; bson_serialization_type = any; deserializer = "x::y"; }"#,
            ErrorId::BadAnyTypeUse,
        );
        bind_error(
            r#"type t { rust_type = "Point"; bson_serialization_type = object; }"#,
            ErrorId::MissingAstRequiredField,
        );
    }

    #[test]
    fn rejects_bad_fields() {
        bind_error(
            r#"struct s { field a { type = int; optional = true; default = 1; } }"#,
            ErrorId::OptionalWithDefault,
        );
        bind_error(
            r#"struct s { field a { type = array<int>; default = 1; } }"#,
            ErrorId::DefaultWithArray,
        );
        bind_error(
            r#"struct s { field a { type = int; comparison_order = 1; } field b { type = int; comparison_order = 1; } }"#,
            ErrorId::DuplicateComparisonOrder,
        );
        bind_error(
            r#"struct s { field a { type = array<int>; supports_doc_sequence = true; } }"#,
            ErrorId::DocSequenceNotArrayOfStruct,
        );
        bind_error(
            r#"struct s { field a { type = array<object>; supports_doc_sequence = true; } }"#,
            ErrorId::DocSequenceNotCommand,
        );
        bind_error(
            r#"struct s { field a { type = object; validator { gt = 0; } } }"#,
            ErrorId::ValidatorOnNonNumeric,
        );
        bind_error(r#"struct s { field a = int; field b { type = int; rust_name = a; } }"#, ErrorId::DuplicateField);
    }

    #[test]
    fn rejects_bad_variants() {
        bind_error(
            r#"struct s { field v { variant = [int, int]; } }"#,
            ErrorId::VariantOverlap,
        );
        bind_error(
            r#"
            struct a { field x = int; }
            struct b { field y = int; }
            struct s { field v { variant = [a, b]; } }
            "#,
            ErrorId::VariantMultipleStructs,
        );
        bind_error(
            r#"
            enum e { type = string; value kA = "a"; }
            struct s { field v { variant = [string, e]; } }
            "#,
            ErrorId::BadVariantAlternative,
        );
        bind_error(
            r#"struct s { generate_comparison_operators = true; field v { variant = [string, object]; } }"#,
            ErrorId::VariantCompared,
        );
    }

    #[test]
    fn rejects_bad_chaining() {
        bind_error(
            r#"
            struct base { immutable = true; field a = int; }
            struct derived { chained_struct base = base; }
            "#,
            ErrorId::ChainedImmutableStruct,
        );
        bind_error(
            r#"
            struct base { field a = array<int>; }
            struct derived { chained_struct base = base; }
            "#,
            ErrorId::ChainedStructWithArray,
        );
        bind_error(
            r#"
            struct base { field a = int; }
            struct derived { chained_struct base = base; field a = long; }
            "#,
            ErrorId::DuplicateField,
        );
        bind_error(
            r#"
            type ctx { rust_type = "Ctx"; bson_serialization_type = chain; serializer = "append"; deserializer = "crate::ctx::parse"; }
            struct s { chained_type ctx = ctx; }
            "#,
            ErrorId::ChainedTypeWithStrict,
        );
    }

    #[test]
    fn rejects_bad_commands() {
        bind_error(r#"command c { namespace = type; }"#, ErrorId::MissingCommandType);
        bind_error(
            r#"command c { namespace = ignored; type = string; }"#,
            ErrorId::BadCommandNamespace,
        );
        bind_error(
            r#"command c { namespace = ignored; reply_type = missing_reply; }"#,
            ErrorId::UnknownType,
        );
    }

    #[test]
    fn binds_server_parameters_and_config_options() {
        let idl = bind_text(
            r#"
            global { configs { section = "General"; source = [cli, yaml]; initializer_name = net_options; } }
            server_parameter maxConns {
                set_at = [startup, runtime];
                rust_vartype = "i32";
                rust_varname = "MAX_CONNS";
                default = 100;
            }
            config_option "net.port" {
                description = "Port to listen on";
                arg_vartype = Int;
                single_name = p;
                positional = "1-";
                duplicate_behavior = append;
            }
            "#,
        )
        .unwrap();

        assert_eq!(idl.server_parameters[0].set_at, SetAt::StartupAndRuntime);
        let port = &idl.configs[0];
        assert_eq!(port.single_name, "net.port,p");
        assert_eq!(port.section.as_deref(), Some("General"));
        assert_eq!(port.sources, vec!["cli".to_owned(), "yaml".to_owned()]);
        assert!(port.composing);
        assert_eq!(port.positional, Some((1, -1)));
        assert_eq!(idl.globals.initializer_name.as_deref(), Some("net_options"));
    }

    #[test]
    fn rejects_bad_server_parameters_and_options() {
        bind_error(r#"server_parameter p { set_at = sometimes; rust_varname = "P"; rust_vartype = "i32"; }"#, ErrorId::BadSetAt);
        bind_error(r#"server_parameter p { set_at = startup; }"#, ErrorId::ServerParameterStorage);
        bind_error(
            r#"config_option o { description = "d"; arg_vartype = Integer; }"#,
            ErrorId::BadArgVartype,
        );
        bind_error(
            r#"config_option o { description = "d"; arg_vartype = Int; source = [env]; }"#,
            ErrorId::BadSource,
        );
        bind_error(
            r#"config_option o { description = "d"; arg_vartype = Int; positional = "3-1"; }"#,
            ErrorId::BadPositional,
        );
    }

    #[test]
    fn positional_ranges() {
        assert_eq!(parse_positional("2"), Some((2, 2)));
        assert_eq!(parse_positional("1-3"), Some((1, 3)));
        assert_eq!(parse_positional("4-"), Some((4, -1)));
        assert_eq!(parse_positional("x"), None);
    }
}
