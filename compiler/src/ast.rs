//! The bound model the generator works from.
//!
//! Every type reference is resolved, every name is already a Rust
//! identifier and every default is a Rust expression.

use serde::Serialize;

pub use crate::syntax::{Condition, Expression, Namespace};

#[derive(Debug, Clone, Default, Serialize)]
pub struct Idl {
    pub globals:           Global,
    pub enums:             Vec<Enum>,
    pub structs:           Vec<Struct>,
    pub server_parameters: Vec<ServerParameter>,
    pub configs:           Vec<ConfigOption>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Global {
    pub rust_module:      Option<String>,
    pub uses:             Vec<String>,
    pub initializer_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EnumType {
    String,
    Int,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnumValue {
    pub name:      String,
    pub rust_name: String,
    pub value:     String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Enum {
    pub name:        String,
    pub rust_name:   String,
    pub description: Option<String>,
    pub enum_type:   EnumType,
    pub values:      Vec<EnumValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Validator {
    pub gt:       Option<String>,
    pub lt:       Option<String>,
    pub gte:      Option<String>,
    pub lte:      Option<String>,
    pub callback: Option<String>,
}

impl Validator {
    /// `(op, limit)` pairs in a fixed order.
    pub fn bounds(&self) -> Vec<(&'static str, &str)> {
        let mut bounds = Vec::new();
        if let Some(gt) = &self.gt {
            bounds.push((">", gt.as_str()));
        }
        if let Some(lt) = &self.lt {
            bounds.push(("<", lt.as_str()));
        }
        if let Some(gte) = &self.gte {
            bounds.push((">=", gte.as_str()));
        }
        if let Some(lte) = &self.lte {
            bounds.push(("<=", lte.as_str()));
        }
        bounds
    }
}

/// A user or built-in type with its wire mapping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasicType {
    pub name:                    String,
    pub rust_type:               String,
    pub bson_serialization_type: Vec<String>,
    pub bindata_subtype:         Option<String>,
    pub serializer:              Option<String>,
    pub deserializer:            Option<String>,
    /// Initial value for storage, from the type's own `default`.
    pub default:                 Option<String>,
}

impl BasicType {
    pub fn is_any(&self) -> bool {
        self.bson_serialization_type.iter().any(|t| t == crate::bson::ANY)
    }

    pub fn is_chain(&self) -> bool {
        self.bson_serialization_type.iter().any(|t| t == crate::bson::CHAIN)
    }

    /// The only wire tag, if there is exactly one and it is not a sentinel.
    pub fn single_bson_type(&self) -> Option<&str> {
        match self.bson_serialization_type.as_slice() {
            [single] if !self.is_any() && !self.is_chain() => Some(single),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumRef {
    pub name:      String,
    pub rust_name: String,
    pub enum_type: EnumType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructRef {
    pub name:      String,
    pub rust_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AlternativeKind {
    Basic(BasicType),
    Struct(StructRef),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantAlternative {
    pub rust_name: String,
    pub kind:      AlternativeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variant {
    pub rust_name:    String,
    pub alternatives: Vec<VariantAlternative>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FieldKind {
    Basic(BasicType),
    Enum(EnumRef),
    Struct(StructRef),
    Variant(Variant),
}

/// A default as a Rust expression. Constant defaults become associated
/// constants; others are constructed in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefaultValue {
    pub expr:     String,
    pub constant: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Field {
    pub name:                          String,
    pub rust_name:                     String,
    pub description:                   Option<String>,
    pub kind:                          FieldKind,
    pub array:                         bool,
    pub optional:                      bool,
    pub ignore:                        bool,
    /// A chained struct or chained type member.
    pub chained:                       bool,
    /// Set on fields inlined from a chained struct: the owning member.
    pub chained_struct_field:          Option<String>,
    pub default:                       Option<DefaultValue>,
    pub validator:                     Option<Validator>,
    pub comparison_order:              i32,
    pub supports_doc_sequence:         bool,
    pub serialize_op_msg_request_only: bool,
    pub unstable:                      bool,
}

impl Field {
    /// Must be present in every decoded document.
    pub fn is_required(&self) -> bool {
        !self.optional && !self.ignore && !self.chained && self.default.is_none()
    }

    /// Tracked with a `has_x` flag and asserted on serialization.
    pub fn has_flag(&self) -> bool {
        self.is_required() && self.chained_struct_field.is_none()
    }

    /// Has storage in the struct itself.
    pub fn has_storage(&self) -> bool {
        !self.ignore && self.chained_struct_field.is_none()
    }

    pub fn is_struct(&self) -> bool {
        matches!(self.kind, FieldKind::Struct(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Command {
    pub command_name:  String,
    pub namespace:     Namespace,
    /// The command element's value when the namespace is `type`.
    pub command_field: Option<Field>,
    pub api_version:   String,
    pub reply_type:    Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Struct {
    pub name:                          String,
    pub rust_name:                     String,
    pub description:                   Option<String>,
    pub strict:                        bool,
    pub immutable:                     bool,
    pub inline_chained_structs:        bool,
    pub generate_comparison_operators: bool,
    pub fields:                        Vec<Field>,
    pub command:                       Option<Command>,
}

impl Struct {
    pub fn is_command(&self) -> bool {
        self.command.is_some()
    }

    /// Fields that take part in `eq` and `partial_cmp`, in comparison order.
    pub fn comparison_fields(&self) -> Vec<&Field> {
        let candidates = self.fields.iter().filter(|f| f.has_storage());
        if self.fields.iter().all(|f| f.comparison_order < 0) {
            return candidates.collect();
        }
        let mut ordered: Vec<&Field> = candidates.filter(|f| f.comparison_order >= 0).collect();
        ordered.sort_by_key(|f| f.comparison_order);
        ordered
    }

    pub fn doc_sequence_fields(&self) -> Vec<&Field> {
        self.fields.iter().filter(|f| f.supports_doc_sequence).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SetAt {
    StartupOnly,
    RuntimeOnly,
    StartupAndRuntime,
    ClusterWide,
}

impl SetAt {
    pub fn expr(self) -> &'static str {
        match self {
            SetAt::StartupOnly => "ServerParameterType::StartupOnly",
            SetAt::RuntimeOnly => "ServerParameterType::RuntimeOnly",
            SetAt::StartupAndRuntime => "ServerParameterType::StartupAndRuntime",
            SetAt::ClusterWide => "ServerParameterType::ClusterWide",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerParameter {
    pub name:             String,
    pub description:      Option<String>,
    pub set_at:           SetAt,
    pub rust_vartype:     Option<String>,
    pub rust_varname:     Option<String>,
    pub condition:        Option<Condition>,
    pub deprecated_names: Vec<String>,
    pub redact:           bool,
    pub test_only:        bool,
    pub default:          Option<Expression>,
    pub validator:        Option<Validator>,
    pub on_update:        Option<String>,
    pub from_string:      Option<String>,
    pub append_bson:      Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArgType {
    Switch,
    Bool,
    Int,
    Long,
    Unsigned,
    UnsignedLongLong,
    Double,
    String,
    StringVector,
    StringMap,
}

impl ArgType {
    pub fn from_name(name: &str) -> Option<ArgType> {
        match name {
            "Switch" => Some(ArgType::Switch),
            "Bool" => Some(ArgType::Bool),
            "Int" => Some(ArgType::Int),
            "Long" => Some(ArgType::Long),
            "Unsigned" => Some(ArgType::Unsigned),
            "UnsignedLongLong" => Some(ArgType::UnsignedLongLong),
            "Double" => Some(ArgType::Double),
            "String" => Some(ArgType::String),
            "StringVector" => Some(ArgType::StringVector),
            "StringMap" => Some(ArgType::StringMap),
            _ => None,
        }
    }

    pub fn expr(self) -> &'static str {
        match self {
            ArgType::Switch => "OptionType::Switch",
            ArgType::Bool => "OptionType::Bool",
            ArgType::Int => "OptionType::Int",
            ArgType::Long => "OptionType::Long",
            ArgType::Unsigned => "OptionType::Unsigned",
            ArgType::UnsignedLongLong => "OptionType::UnsignedLongLong",
            ArgType::Double => "OptionType::Double",
            ArgType::String => "OptionType::String",
            ArgType::StringVector => "OptionType::StringVector",
            ArgType::StringMap => "OptionType::StringMap",
        }
    }

    /// `Bson` constructor for a value of this option type, if it has one.
    pub fn bson_constructor(self) -> Option<&'static str> {
        match self {
            ArgType::Switch | ArgType::Bool => Some("Bson::Boolean"),
            ArgType::Int | ArgType::Unsigned => Some("Bson::Int32"),
            ArgType::Long | ArgType::UnsignedLongLong => Some("Bson::Int64"),
            ArgType::Double => Some("Bson::Double"),
            ArgType::String | ArgType::StringVector | ArgType::StringMap => None,
        }
    }

    /// Accessor on `&Bson` for the stored value.
    pub fn accessor(self) -> &'static str {
        match self {
            ArgType::Switch | ArgType::Bool => "as_bool()",
            ArgType::Int => "as_i32()",
            ArgType::Unsigned => "as_i32() as u32",
            ArgType::Long => "as_i64()",
            ArgType::UnsignedLongLong => "as_i64() as u64",
            ArgType::Double => "as_f64()",
            ArgType::String => "as_str().to_owned()",
            ArgType::StringVector => {
                "as_array().iter().map(|(_, item)| item.as_str().to_owned()).collect::<Vec<String>>()"
            }
            ArgType::StringMap => "as_document().clone()",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigOption {
    pub name:                   String,
    pub single_name:            String,
    pub deprecated_names:       Vec<String>,
    pub deprecated_short_names: Vec<String>,
    pub description:            String,
    pub section:                Option<String>,
    pub arg_vartype:            ArgType,
    pub rust_vartype:           Option<String>,
    pub rust_varname:           Option<String>,
    pub condition:              Option<Condition>,
    pub conflicts:              Vec<String>,
    pub requires:               Vec<String>,
    pub hidden:                 bool,
    pub redact:                 bool,
    pub default:                Option<Expression>,
    pub implicit:               Option<Expression>,
    pub sources:                Vec<String>,
    pub composing:              bool,
    pub positional:             Option<(i32, i32)>,
    pub validator:              Option<Validator>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, order: i32) -> Field {
        Field {
            name: name.to_owned(),
            rust_name: name.to_owned(),
            description: None,
            kind: FieldKind::Enum(EnumRef {
                name:      "color".to_owned(),
                rust_name: "Color".to_owned(),
                enum_type: EnumType::String,
            }),
            array: false,
            optional: false,
            ignore: false,
            chained: false,
            chained_struct_field: None,
            default: None,
            validator: None,
            comparison_order: order,
            supports_doc_sequence: false,
            serialize_op_msg_request_only: false,
            unstable: false,
        }
    }

    fn with_fields(fields: Vec<Field>) -> Struct {
        Struct {
            name: "s".to_owned(),
            rust_name: "S".to_owned(),
            description: None,
            strict: true,
            immutable: false,
            inline_chained_structs: true,
            generate_comparison_operators: true,
            fields,
            command: None,
        }
    }

    #[test]
    fn comparison_fields_default_to_declaration_order() {
        let mut ignored = field("c", -1);
        ignored.ignore = true;
        let s = with_fields(vec![field("a", -1), field("b", -1), ignored]);
        let names: Vec<_> = s.comparison_fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn explicit_comparison_order_filters_and_sorts() {
        let s = with_fields(vec![field("a", 2), field("b", -1), field("c", 1)]);
        let names: Vec<_> = s.comparison_fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["c", "a"]);
    }

    #[test]
    fn required_and_flags() {
        let mut f = field("a", -1);
        assert!(f.is_required() && f.has_flag());
        f.chained_struct_field = Some("base".to_owned());
        assert!(f.is_required() && !f.has_flag() && !f.has_storage());
        f.optional = true;
        assert!(!f.is_required());
    }
}
