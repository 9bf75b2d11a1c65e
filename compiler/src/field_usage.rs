//! Emits the code that tracks which fields a decoder has seen.
//!
//! Strict structs know their full field set, so they track usage in a fixed
//! `[bool; N]` indexed by per-field constants. Lenient structs must also catch
//! repeated unknown fields, so they record every name in a `BTreeSet`.

use crate::ast::{Field, Struct};
use crate::common::{default_const, field_name_const, shouty_case};
use crate::writer::IndentedTextWriter;

#[derive(Debug, Clone)]
pub enum FieldUsageChecker<'a> {
    Set {
        fields: Vec<&'a Field>,
    },
    BitSet {
        fields: Vec<&'a Field>,
    },
}

fn bit_const(field: &Field) -> String {
    format!("{}_BIT", shouty_case(&field.rust_name))
}

/// Whether the final checks have anything to do for this field.
fn needs_final_check(field: &Field) -> bool {
    !field.optional && !field.ignore && !field.chained
}

/// The statement that stores a field's default after decoding.
pub fn default_assignment(field: &Field) -> Option<String> {
    let default = field.default.as_ref()?;
    let value = if default.constant {
        format!("Self::{}", default_const(&field.rust_name))
    } else {
        default.expr.clone()
    };
    Some(match &field.chained_struct_field {
        Some(member) => {
            let fallible = if field.validator.is_some() { "?" } else { "" };
            format!("self.{}.set_{}({}){};", member, field.rust_name, value, fallible)
        }
        None => format!("self.{} = {};", field.rust_name, value),
    })
}

fn missing_or_default(w: &mut IndentedTextWriter, field: &Field) {
    match default_assignment(field) {
        Some(assignment) => w.write_line(assignment),
        None => w.write_line(format!(
            "return Err(ctxt.missing_field(Self::{}));",
            field_name_const(&field.rust_name)
        )),
    }
}

impl<'a> FieldUsageChecker<'a> {
    /// Picks the strategy for `s`: the bitset when strict, the set otherwise.
    pub fn new(s: &'a Struct) -> FieldUsageChecker<'a> {
        let fields = s.fields.iter().filter(|f| !f.chained).collect();
        if s.strict {
            FieldUsageChecker::BitSet { fields }
        } else {
            FieldUsageChecker::Set { fields }
        }
    }

    fn fields(&self) -> &[&'a Field] {
        match self {
            FieldUsageChecker::Set { fields } | FieldUsageChecker::BitSet { fields } => fields,
        }
    }

    /// Whether decoding needs the `used_fields` tracker at all.
    pub fn is_tracking(&self) -> bool {
        match self {
            FieldUsageChecker::Set { .. } => true,
            FieldUsageChecker::BitSet { fields } => !fields.is_empty(),
        }
    }

    pub fn write_declaration(&self, w: &mut IndentedTextWriter) {
        match self {
            FieldUsageChecker::Set { .. } => {
                w.write_line(
                    "let mut used_fields: ::std::collections::BTreeSet<&str> = ::std::collections::BTreeSet::new();",
                );
            }
            FieldUsageChecker::BitSet { fields } => {
                if fields.is_empty() {
                    return;
                }
                w.write_line(format!("let mut used_fields = [false; {}];", fields.len()));
                for (bit, field) in fields.iter().enumerate() {
                    w.write_line(format!("const {}: usize = {};", bit_const(field), bit));
                }
            }
        }
        w.write_empty_line();
    }

    /// Records `field_name_expr` for every element, known or not. Only the set
    /// strategy does anything here.
    pub fn add_store(&self, w: &mut IndentedTextWriter, field_name_expr: &str) {
        if let FieldUsageChecker::Set { .. } = self {
            w.write_line(format!("if !used_fields.insert({}) {{", field_name_expr));
            w.indent();
            w.write_line(format!("return Err(ctxt.duplicate_field({}));", field_name_expr));
            w.unindent();
            w.write_line("}");
            w.write_empty_line();
        }
    }

    /// Marks `field` as seen inside its dispatch arm.
    pub fn add(&self, w: &mut IndentedTextWriter, field: &Field, field_name_expr: &str) {
        if let FieldUsageChecker::BitSet { .. } = self {
            let bit = bit_const(field);
            w.write_line(format!("if used_fields[{}] {{", bit));
            w.indent();
            w.write_line(format!("return Err(ctxt.duplicate_field({}));", field_name_expr));
            w.unindent();
            w.write_line("}");
            w.write_line(format!("used_fields[{}] = true;", bit));
            w.write_empty_line();
        }
    }

    /// Missing required fields fail; missing defaulted fields get their
    /// default.
    pub fn add_final_checks(&self, w: &mut IndentedTextWriter) {
        let checked: Vec<&Field> = self
            .fields()
            .iter()
            .copied()
            .filter(|f| needs_final_check(f))
            .collect();
        if checked.is_empty() {
            return;
        }

        match self {
            FieldUsageChecker::Set { .. } => {
                for field in checked {
                    w.write_line(format!(
                        "if !used_fields.contains(Self::{}) {{",
                        field_name_const(&field.rust_name)
                    ));
                    w.indent();
                    missing_or_default(w, field);
                    w.unindent();
                    w.write_line("}");
                }
            }
            FieldUsageChecker::BitSet { .. } => {
                w.write_line("if !used_fields.iter().all(|used| *used) {");
                w.indent();
                for field in checked {
                    w.write_line(format!("if !used_fields[{}] {{", bit_const(field)));
                    w.indent();
                    missing_or_default(w, field);
                    w.unindent();
                    w.write_line("}");
                }
                w.unindent();
                w.write_line("}");
            }
        }
        w.write_empty_line();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BasicType, DefaultValue, FieldKind};

    fn field(name: &str) -> Field {
        Field {
            name: name.to_owned(),
            rust_name: name.to_owned(),
            description: None,
            kind: FieldKind::Basic(BasicType {
                name: "int".to_owned(),
                rust_type: "i32".to_owned(),
                bson_serialization_type: vec!["int".to_owned()],
                bindata_subtype: None,
                serializer: None,
                deserializer: None,
                default: None,
            }),
            array: false,
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
        }
    }

    fn test_struct(strict: bool) -> Struct {
        let mut limit = field("limit");
        limit.default = Some(DefaultValue {
            expr:     "10".to_owned(),
            constant: true,
        });
        let mut note = field("note");
        note.optional = true;
        let mut base = field("base");
        base.chained = true;
        Struct {
            name: "s".to_owned(),
            rust_name: "S".to_owned(),
            description: None,
            strict,
            immutable: false,
            inline_chained_structs: true,
            generate_comparison_operators: false,
            fields: vec![base, field("count"), limit, note],
            command: None,
        }
    }

    fn emit(s: &Struct) -> String {
        let checker = FieldUsageChecker::new(s);
        let mut w = IndentedTextWriter::new();
        checker.write_declaration(&mut w);
        checker.add_store(&mut w, "field_name");
        checker.add(&mut w, &s.fields[1], "field_name");
        checker.add_final_checks(&mut w);
        w.into_string()
    }

    #[test]
    fn strict_structs_use_bits() {
        let s = test_struct(true);
        assert!(matches!(FieldUsageChecker::new(&s), FieldUsageChecker::BitSet { .. }));
        assert_eq!(
            emit(&s),
            "let mut used_fields = [false; 3];
const COUNT_BIT: usize = 0;
const LIMIT_BIT: usize = 1;
const NOTE_BIT: usize = 2;

if used_fields[COUNT_BIT] {
    return Err(ctxt.duplicate_field(field_name));
}
used_fields[COUNT_BIT] = true;

if !used_fields.iter().all(|used| *used) {
    if !used_fields[COUNT_BIT] {
        return Err(ctxt.missing_field(Self::COUNT_FIELD_NAME));
    }
    if !used_fields[LIMIT_BIT] {
        self.limit = Self::DEFAULT_LIMIT;
    }
}
"
        );
    }

    #[test]
    fn lenient_structs_use_a_set() {
        let s = test_struct(false);
        assert_eq!(
            emit(&s),
            "let mut used_fields: ::std::collections::BTreeSet<&str> = ::std::collections::BTreeSet::new();

if !used_fields.insert(field_name) {
    return Err(ctxt.duplicate_field(field_name));
}

if !used_fields.contains(Self::COUNT_FIELD_NAME) {
    return Err(ctxt.missing_field(Self::COUNT_FIELD_NAME));
}
if !used_fields.contains(Self::LIMIT_FIELD_NAME) {
    self.limit = Self::DEFAULT_LIMIT;
}
"
        );
    }

    #[test]
    fn chained_defaults_use_the_member_setter() {
        let mut f = field("limit");
        f.chained_struct_field = Some("base".to_owned());
        f.default = Some(DefaultValue {
            expr:     "String::from(\"x\")".to_owned(),
            constant: false,
        });
        assert_eq!(
            default_assignment(&f).as_deref(),
            Some("self.base.set_limit(String::from(\"x\"));")
        );
    }
}
