//! The parsed form of an IDL file, before binding.
//!
//! Everything here mirrors the text closely: type references are still names
//! and defaults are still unresolved expressions. [SymbolTable] owns every
//! named definition and resolves field types against them.

use lazy_static::lazy_static;
use serde::Serialize;
use std::fmt;

use crate::context::ParserContext;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceLocation {
    pub file_name: String,
    pub line:      usize,
    pub column:    usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file_name, self.line, self.column)
    }
}

/// A default or initial value. `literal` came from a quoted string and
/// `expr` from a bare token or an explicit `expr` entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Expression {
    pub literal:      Option<String>,
    pub expr:         Option<String>,
    pub is_constexpr: bool,
}

impl Expression {
    pub fn literal(value: &str) -> Expression {
        Expression {
            literal:      Some(value.to_owned()),
            expr:         None,
            is_constexpr: true,
        }
    }

    pub fn expr(value: &str) -> Expression {
        Expression {
            literal:      None,
            expr:         Some(value.to_owned()),
            is_constexpr: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Validator {
    pub location: SourceLocation,
    pub gt:       Option<String>,
    pub lt:       Option<String>,
    pub gte:      Option<String>,
    pub lte:      Option<String>,
    pub callback: Option<String>,
}

impl Validator {
    pub fn is_empty(&self) -> bool {
        self.gt.is_none()
            && self.lt.is_none()
            && self.gte.is_none()
            && self.lte.is_none()
            && self.callback.is_none()
    }
}

impl PartialEq for Validator {
    fn eq(&self, other: &Validator) -> bool {
        self.gt == other.gt
            && self.lt == other.lt
            && self.gte == other.gte
            && self.lte == other.lte
            && self.callback == other.callback
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Condition {
    pub expr:         Option<String>,
    pub constexpr:    Option<String>,
    pub preprocessor: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigGlobal {
    pub location:         SourceLocation,
    pub section:          Option<String>,
    pub source:           Vec<String>,
    pub initializer_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Global {
    pub location:    SourceLocation,
    pub rust_module: Option<String>,
    pub uses:        Vec<String>,
    pub configs:     Option<ConfigGlobal>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Import {
    pub location:         SourceLocation,
    pub imports:          Vec<String>,
    pub resolved_imports: Vec<String>,
    pub dependencies:     Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Type {
    pub location:                SourceLocation,
    pub name:                    String,
    pub description:             Option<String>,
    pub rust_type:               Option<String>,
    pub bson_serialization_type: Vec<String>,
    pub bindata_subtype:         Option<String>,
    pub serializer:              Option<String>,
    pub deserializer:            Option<String>,
    pub default:                 Option<Expression>,
    pub imported:                bool,
}

/// How a field names its type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "type", rename_all = "snake_case")]
pub enum FieldType {
    Single(String),
    Array(String),
    Variant(Vec<FieldType>),
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Single(name) => f.write_str(name),
            FieldType::Array(name) => write!(f, "array<{}>", name),
            FieldType::Variant(alternatives) => {
                let names: Vec<String> = alternatives.iter().map(|a| a.to_string()).collect();
                write!(f, "variant<{}>", names.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Field {
    pub location:                      SourceLocation,
    pub name:                          String,
    pub rust_name:                     Option<String>,
    pub description:                   Option<String>,
    pub field_type:                    Option<FieldType>,
    pub ignore:                        bool,
    pub optional:                      bool,
    pub default:                       Option<Expression>,
    pub supports_doc_sequence:         bool,
    pub comparison_order:              i32,
    pub validator:                     Option<Validator>,
    pub unstable:                      bool,
    pub serialize_op_msg_request_only: bool,
}

impl Field {
    pub fn new(location: SourceLocation, name: &str) -> Field {
        Field {
            location,
            name: name.to_owned(),
            rust_name: None,
            description: None,
            field_type: None,
            ignore: false,
            optional: false,
            default: None,
            supports_doc_sequence: false,
            comparison_order: -1,
            validator: None,
            unstable: false,
            serialize_op_msg_request_only: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChainedStruct {
    pub location:  SourceLocation,
    pub name:      String,
    pub rust_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChainedType {
    pub location:  SourceLocation,
    pub name:      String,
    pub rust_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Struct {
    pub location:                      SourceLocation,
    pub name:                          String,
    pub rust_name:                     Option<String>,
    pub description:                   Option<String>,
    pub strict:                        bool,
    pub immutable:                     bool,
    pub inline_chained_structs:        bool,
    pub generate_comparison_operators: bool,
    pub chained_types:                 Vec<ChainedType>,
    pub chained_structs:               Vec<ChainedStruct>,
    pub fields:                        Vec<Field>,
    pub imported:                      bool,
}

impl Struct {
    pub fn new(location: SourceLocation, name: &str) -> Struct {
        Struct {
            location,
            name: name.to_owned(),
            rust_name: None,
            description: None,
            strict: true,
            immutable: false,
            inline_chained_structs: true,
            generate_comparison_operators: false,
            chained_types: Vec::new(),
            chained_structs: Vec::new(),
            fields: Vec::new(),
            imported: false,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    Ignored,
    ConcatenateWithDb,
    ConcatenateWithDbOrUuid,
    Type,
}

impl Namespace {
    pub fn from_name(name: &str) -> Option<Namespace> {
        match name {
            "ignored" => Some(Namespace::Ignored),
            "concatenate_with_db" => Some(Namespace::ConcatenateWithDb),
            "concatenate_with_db_or_uuid" => Some(Namespace::ConcatenateWithDbOrUuid),
            "type" => Some(Namespace::Type),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Ignored => "ignored",
            Namespace::ConcatenateWithDb => "concatenate_with_db",
            Namespace::ConcatenateWithDbOrUuid => "concatenate_with_db_or_uuid",
            Namespace::Type => "type",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Command {
    #[serde(flatten)]
    pub base:         Struct,
    pub command_name: String,
    pub namespace:    Namespace,
    pub command_type: Option<FieldType>,
    pub api_version:  String,
    pub reply_type:   Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnumValue {
    pub location: SourceLocation,
    pub name:     String,
    pub value:    String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Enum {
    pub location:    SourceLocation,
    pub name:        String,
    pub rust_name:   Option<String>,
    pub description: Option<String>,
    pub enum_type:   String,
    pub values:      Vec<EnumValue>,
    pub imported:    bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerParameter {
    pub location:        SourceLocation,
    pub name:            String,
    pub description:     Option<String>,
    pub set_at:          Vec<String>,
    pub rust_vartype:    Option<String>,
    pub rust_varname:    Option<String>,
    pub condition:       Option<Condition>,
    pub deprecated_name: Vec<String>,
    pub redact:          bool,
    pub test_only:       bool,
    pub default:         Option<Expression>,
    pub validator:       Option<Validator>,
    pub on_update:       Option<String>,
    pub from_string:     Option<String>,
    pub append_bson:     Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOption {
    pub location:              SourceLocation,
    pub name:                  String,
    pub short_name:            Option<String>,
    pub single_name:           Option<String>,
    pub deprecated_name:       Vec<String>,
    pub deprecated_short_name: Vec<String>,
    pub description:           Option<String>,
    pub section:               Option<String>,
    pub arg_vartype:           Option<String>,
    pub rust_vartype:          Option<String>,
    pub rust_varname:          Option<String>,
    pub condition:             Option<Condition>,
    pub conflicts:             Vec<String>,
    pub requires:              Vec<String>,
    pub hidden:                bool,
    pub redact:                bool,
    pub default:               Option<Expression>,
    pub implicit:              Option<Expression>,
    pub source:                Vec<String>,
    pub duplicate_behavior:    Option<String>,
    pub positional:            Option<String>,
    pub validator:             Option<Validator>,
}

/// A name resolved to its definition.
#[derive(Debug, Clone, Copy)]
pub enum ResolvedType<'a> {
    Type(&'a Type),
    Enum(&'a Enum),
    Struct(&'a Struct),
}

impl<'a> ResolvedType<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            ResolvedType::Type(t) => &t.name,
            ResolvedType::Enum(e) => &e.name,
            ResolvedType::Struct(s) => &s.name,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ResolvedFieldType<'a> {
    Single(ResolvedType<'a>),
    Array(ResolvedType<'a>),
    Variant(Vec<ResolvedType<'a>>),
}

fn builtin(name: &str, rust_type: &str, bson: &str) -> Type {
    Type {
        location: SourceLocation {
            file_name: "<builtin>".to_owned(),
            line:      0,
            column:    0,
        },
        name: name.to_owned(),
        description: None,
        rust_type: Some(rust_type.to_owned()),
        bson_serialization_type: vec![bson.to_owned()],
        bindata_subtype: None,
        serializer: None,
        deserializer: None,
        default: None,
        imported: true,
    }
}

fn builtin_types() -> Vec<Type> {
    let mut bindata_generic = builtin("bindata_generic", "Vec<u8>", "bindata");
    bindata_generic.bindata_subtype = Some("generic".to_owned());
    let mut uuid = builtin("uuid", "Vec<u8>", "bindata");
    uuid.bindata_subtype = Some("uuid".to_owned());
    let mut namespacestring = builtin("namespacestring", "NamespaceString", "string");
    namespacestring.deserializer = Some("NamespaceString::parse".to_owned());
    namespacestring.serializer = Some("to_string".to_owned());

    vec![
        builtin("string", "String", "string"),
        builtin("int", "i32", "int"),
        builtin("long", "i64", "long"),
        builtin("double", "f64", "double"),
        builtin("bool", "bool", "bool"),
        builtin("date", "DateTime", "date"),
        builtin("timestamp", "Timestamp", "timestamp"),
        builtin("objectid", "ObjectId", "objectid"),
        builtin("decimal", "Decimal128", "decimal"),
        builtin("object", "Document", "object"),
        bindata_generic,
        uuid,
        namespacestring,
    ]
}

lazy_static! {
    /// Types every IDL file can use without declaring them.
    pub static ref BUILTIN_TYPES: Vec<Type> = builtin_types();
}

/// Every named definition visible to one IDL file, imports included.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SymbolTable {
    pub commands: Vec<Command>,
    pub enums:    Vec<Enum>,
    pub structs:  Vec<Struct>,
    pub types:    Vec<Type>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    fn find_kind(&self, name: &str) -> Option<&'static str> {
        if BUILTIN_TYPES.iter().any(|t| t.name == name) {
            Some("builtin type")
        } else if self.commands.iter().any(|c| c.base.name == name) {
            Some("command")
        } else if self.enums.iter().any(|e| e.name == name) {
            Some("enum")
        } else if self.structs.iter().any(|s| s.name == name) {
            Some("struct")
        } else if self.types.iter().any(|t| t.name == name) {
            Some("type")
        } else {
            None
        }
    }

    fn is_duplicate(
        &self,
        ctxt: &mut ParserContext,
        location: &SourceLocation,
        name: &str,
        kind: &str,
    ) -> bool {
        match self.find_kind(name) {
            Some(previous) => {
                ctxt.add_duplicate_symbol_error(location, name, kind, previous);
                true
            }
            None => false,
        }
    }

    pub fn add_command(&mut self, ctxt: &mut ParserContext, command: Command) {
        if !self.is_duplicate(ctxt, &command.base.location, &command.base.name, "command") {
            self.commands.push(command);
        }
    }

    pub fn add_enum(&mut self, ctxt: &mut ParserContext, idl_enum: Enum) {
        if !self.is_duplicate(ctxt, &idl_enum.location, &idl_enum.name, "enum") {
            self.enums.push(idl_enum);
        }
    }

    pub fn add_struct(&mut self, ctxt: &mut ParserContext, idl_struct: Struct) {
        if !self.is_duplicate(ctxt, &idl_struct.location, &idl_struct.name, "struct") {
            self.structs.push(idl_struct);
        }
    }

    pub fn add_type(&mut self, ctxt: &mut ParserContext, idl_type: Type) {
        if !self.is_duplicate(ctxt, &idl_type.location, &idl_type.name, "type") {
            self.types.push(idl_type);
        }
    }

    /// Merges the definitions of an imported file, marking them imported.
    pub fn add_imported_symbol_table(&mut self, ctxt: &mut ParserContext, imported: &SymbolTable) {
        for command in &imported.commands {
            let mut command = command.clone();
            command.base.imported = true;
            self.add_command(ctxt, command);
        }
        for idl_enum in &imported.enums {
            let mut idl_enum = idl_enum.clone();
            idl_enum.imported = true;
            self.add_enum(ctxt, idl_enum);
        }
        for idl_struct in &imported.structs {
            let mut idl_struct = idl_struct.clone();
            idl_struct.imported = true;
            self.add_struct(ctxt, idl_struct);
        }
        for idl_type in &imported.types {
            let mut idl_type = idl_type.clone();
            idl_type.imported = true;
            self.add_type(ctxt, idl_type);
        }
    }

    pub fn get_struct(&self, name: &str) -> Option<&Struct> {
        self.structs.iter().find(|s| s.name == name)
    }

    pub fn get_command(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.base.name == name)
    }

    pub fn get_enum(&self, name: &str) -> Option<&Enum> {
        self.enums.iter().find(|e| e.name == name)
    }

    pub fn get_type(&self, name: &str) -> Option<&Type> {
        BUILTIN_TYPES
            .iter()
            .chain(self.types.iter())
            .find(|t| t.name == name)
    }

    pub fn resolve_type_name(&self, name: &str) -> Option<ResolvedType<'_>> {
        if let Some(t) = self.get_type(name) {
            return Some(ResolvedType::Type(t));
        }
        if let Some(e) = self.get_enum(name) {
            return Some(ResolvedType::Enum(e));
        }
        self.get_struct(name).map(ResolvedType::Struct)
    }

    /// Resolves without reporting. The error is the first unknown name.
    pub fn lookup_field_type(&self, field_type: &FieldType) -> Result<ResolvedFieldType<'_>, String> {
        let lookup = |name: &str| self.resolve_type_name(name).ok_or_else(|| name.to_owned());
        match field_type {
            FieldType::Single(name) => Ok(ResolvedFieldType::Single(lookup(name)?)),
            FieldType::Array(name) => Ok(ResolvedFieldType::Array(lookup(name)?)),
            FieldType::Variant(alternatives) => {
                let mut resolved = Vec::with_capacity(alternatives.len());
                for alternative in alternatives {
                    match alternative {
                        FieldType::Single(name) => resolved.push(lookup(name)?),
                        other => return Err(other.to_string()),
                    }
                }
                Ok(ResolvedFieldType::Variant(resolved))
            }
        }
    }

    pub fn resolve_field_type(
        &self,
        ctxt: &mut ParserContext,
        location: &SourceLocation,
        field_name: &str,
        field_type: &FieldType,
    ) -> Option<ResolvedFieldType<'_>> {
        match self.lookup_field_type(field_type) {
            Ok(resolved) => Some(resolved),
            Err(type_name) => {
                ctxt.add_unknown_type_error(location, field_name, &type_name);
                None
            }
        }
    }
}

/// The parse result for one root file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IdlSpec {
    pub globals:           Option<Global>,
    pub imports:           Option<Import>,
    pub symbols:           SymbolTable,
    pub server_parameters: Vec<ServerParameter>,
    pub configs:           Vec<ConfigOption>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCollection, ErrorId};

    fn location() -> SourceLocation {
        SourceLocation {
            file_name: "test.idl".to_owned(),
            line:      1,
            column:    1,
        }
    }

    #[test]
    fn duplicate_symbols_are_reported_once_and_dropped() {
        let mut errors = ErrorCollection::new();
        let mut symbols = SymbolTable::new();
        {
            let mut ctxt = ParserContext::new("test.idl", &mut errors);
            symbols.add_struct(&mut ctxt, Struct::new(location(), "point"));
            symbols.add_struct(&mut ctxt, Struct::new(location(), "point"));
            symbols.add_type(
                &mut ctxt,
                Type {
                    name: "string".to_owned(),
                    ..Type::default()
                },
            );
        }
        assert_eq!(symbols.structs.len(), 1);
        assert!(symbols.types.is_empty());
        assert_eq!(errors.count(), 2);
        assert!(errors.contains(ErrorId::DuplicateSymbol));
    }

    #[test]
    fn resolves_builtins_structs_and_variants() {
        let mut symbols = SymbolTable::new();
        let mut errors = ErrorCollection::new();
        let mut ctxt = ParserContext::new("test.idl", &mut errors);
        symbols.add_struct(&mut ctxt, Struct::new(location(), "point"));

        match symbols.lookup_field_type(&FieldType::Array("point".to_owned())) {
            Ok(ResolvedFieldType::Array(ResolvedType::Struct(s))) => assert_eq!(s.name, "point"),
            other => panic!("unexpected {:?}", other),
        }
        match symbols.lookup_field_type(&FieldType::Single("uuid".to_owned())) {
            Ok(ResolvedFieldType::Single(ResolvedType::Type(t))) => {
                assert_eq!(t.bindata_subtype.as_deref(), Some("uuid"))
            }
            other => panic!("unexpected {:?}", other),
        }
        let variant = FieldType::Variant(vec![
            FieldType::Single("string".to_owned()),
            FieldType::Single("missing".to_owned()),
        ]);
        assert_eq!(symbols.lookup_field_type(&variant).unwrap_err(), "missing");
        assert!(symbols
            .resolve_field_type(&mut ctxt, &location(), "v", &variant)
            .is_none());
        assert!(ctxt.has_errors());
    }

    #[test]
    fn field_type_display() {
        let variant = FieldType::Variant(vec![
            FieldType::Single("string".to_owned()),
            FieldType::Array("int".to_owned()),
        ]);
        assert_eq!(variant.to_string(), "variant<string, array<int>>");
    }
}
