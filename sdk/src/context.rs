use bidl_bson::{BinDataSubtype, Bson, ElementType};
use std::fmt;

use crate::error::IdlError;
use crate::namespace::{NamespaceString, NamespaceStringOrUuid};

/// Tracks where a generated parser currently is in a document so errors can
/// name the full path of the offending field.
#[derive(Debug, Clone, Copy)]
pub struct ParserContext<'a> {
    name:   &'a str,
    parent: Option<&'a ParserContext<'a>>,
}

impl<'a> ParserContext<'a> {
    pub fn new(name: &'a str) -> ParserContext<'a> {
        ParserContext { name, parent: None }
    }

    pub fn with_parent(name: &'a str, parent: &'a ParserContext<'a>) -> ParserContext<'a> {
        ParserContext {
            name,
            parent: Some(parent),
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    /// The dotted path from the root context to this one.
    pub fn path(&self) -> String {
        match self.parent {
            Some(parent) => format!("{}.{}", parent.path(), self.name),
            None => self.name.to_owned(),
        }
    }

    pub fn field_path(&self, field: &str) -> String {
        format!("{}.{}", self.path(), field)
    }

    pub fn check_and_assert_type(
        &self,
        field: &str,
        element: &Bson,
        expected: ElementType,
    ) -> Result<(), IdlError> {
        self.check_and_assert_types(field, element, &[expected])
    }

    pub fn check_and_assert_types(
        &self,
        field: &str,
        element: &Bson,
        expected: &[ElementType],
    ) -> Result<(), IdlError> {
        if expected.contains(&element.element_type()) {
            Ok(())
        } else {
            Err(self.wrong_type(field, element, expected))
        }
    }

    /// The error for an element whose type matches none of `expected`.
    pub fn wrong_type(&self, field: &str, element: &Bson, expected: &[ElementType]) -> IdlError {
        IdlError::TypeMismatch {
            field:    self.field_path(field),
            expected: expected.to_vec(),
            found:    element.element_type(),
        }
    }

    pub fn check_and_assert_bin_data_type(
        &self,
        field: &str,
        element: &Bson,
        subtype: BinDataSubtype,
    ) -> Result<(), IdlError> {
        self.check_and_assert_type(field, element, ElementType::BinData)?;
        match element.bin_data_subtype() {
            Some(found) if found == subtype => Ok(()),
            found => Err(IdlError::BadBinDataSubtype {
                field:    self.field_path(field),
                expected: subtype.to_u8(),
                found:    found.map(BinDataSubtype::to_u8).unwrap_or_default(),
            }),
        }
    }

    pub fn duplicate_field(&self, field: &str) -> IdlError {
        IdlError::DuplicateField {
            field: self.field_path(field),
        }
    }

    pub fn missing_field(&self, field: &str) -> IdlError {
        IdlError::MissingField {
            field: self.field_path(field),
        }
    }

    pub fn unknown_field(&self, field: &str) -> IdlError {
        IdlError::UnknownField {
            field: self.field_path(field),
        }
    }

    /// Used from inside an array context, so the path names the array field.
    pub fn bad_array_field_number_sequence(&self, actual: u32, expected: u32) -> IdlError {
        IdlError::BadArrayFieldNumberSequence {
            field: self.path(),
            actual,
            expected,
        }
    }

    pub fn bad_array_field_number_value(&self, value: &str) -> IdlError {
        IdlError::BadArrayFieldNumberValue {
            field: self.path(),
            value: value.to_owned(),
        }
    }

    pub fn bad_enum_value(&self, value: impl fmt::Display) -> IdlError {
        IdlError::BadEnumValue {
            field: self.path(),
            value: value.to_string(),
        }
    }

    /// Reads the command element of a `concatenate_with_db` command.
    pub fn parse_ns_collection_required(
        &self,
        db_name: &str,
        element: &Bson,
    ) -> Result<NamespaceString, IdlError> {
        self.check_and_assert_type(self.name, element, ElementType::String)?;
        let collection = element.as_str();
        if collection.is_empty() {
            return Err(IdlError::InvalidNamespace(format!("{}.", db_name)));
        }
        Ok(NamespaceString::new(db_name, collection))
    }

    /// Reads the command element of a `concatenate_with_db_or_uuid` command.
    pub fn parse_ns_or_uuid(
        &self,
        db_name: &str,
        element: &Bson,
    ) -> Result<NamespaceStringOrUuid, IdlError> {
        if element.element_type() == ElementType::BinData {
            self.check_and_assert_bin_data_type(self.name, element, BinDataSubtype::Uuid)?;
            return Ok(NamespaceStringOrUuid::Uuid {
                db:   db_name.to_owned(),
                uuid: element.as_bin_data().to_vec(),
            });
        }
        Ok(NamespaceStringOrUuid::Nss(
            self.parse_ns_collection_required(db_name, element)?,
        ))
    }
}

/// Builds the error returned by generated range validators.
pub fn comparison_error(
    ctxt: Option<&ParserContext>,
    field: &str,
    op: &str,
    value: &dyn fmt::Display,
    limit: &dyn fmt::Display,
) -> IdlError {
    IdlError::Comparison {
        field: ctxt
            .map(|c| c.field_path(field))
            .unwrap_or_else(|| field.to_owned()),
        op:    op.to_owned(),
        value: value.to_string(),
        limit: limit.to_string(),
    }
}

/// Parses an array element name. Only plain decimal digits are accepted.
pub fn parse_array_field_number(name: &str) -> Option<u32> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bidl_bson::BinData;

    #[test]
    fn paths_follow_parents() {
        let root = ParserContext::new("Example");
        let child = ParserContext::with_parent("point", &root);
        let array = ParserContext::with_parent("tags", &child);

        assert_eq!(root.path(), "Example");
        assert_eq!(array.path(), "Example.point.tags");
        assert_eq!(
            child.missing_field("x"),
            IdlError::MissingField {
                field: "Example.point.x".to_owned()
            }
        );
        assert_eq!(
            array.bad_array_field_number_sequence(2, 1),
            IdlError::BadArrayFieldNumberSequence {
                field:    "Example.point.tags".to_owned(),
                actual:   2,
                expected: 1,
            }
        );
    }

    #[test]
    fn type_checks() {
        let ctxt = ParserContext::new("root");
        assert!(ctxt
            .check_and_assert_type("a", &Bson::Int32(1), ElementType::Int32)
            .is_ok());
        assert!(ctxt
            .check_and_assert_types("a", &Bson::from("x"), &[ElementType::Int32, ElementType::String])
            .is_ok());

        let err = ctxt
            .check_and_assert_type("a", &Bson::from("x"), ElementType::Int32)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "BSON field 'root.a' is the wrong type 'string', expected type 'int'"
        );

        let uuid = Bson::from(BinData::new(BinDataSubtype::Uuid, vec![0; 16]));
        assert!(ctxt
            .check_and_assert_bin_data_type("u", &uuid, BinDataSubtype::Uuid)
            .is_ok());
        assert!(matches!(
            ctxt.check_and_assert_bin_data_type("u", &uuid, BinDataSubtype::Generic),
            Err(IdlError::BadBinDataSubtype { expected: 0, found: 4, .. })
        ));
    }

    #[test]
    fn array_field_numbers() {
        assert_eq!(parse_array_field_number("0"), Some(0));
        assert_eq!(parse_array_field_number("17"), Some(17));
        assert_eq!(parse_array_field_number(""), None);
        assert_eq!(parse_array_field_number("-1"), None);
        assert_eq!(parse_array_field_number("+1"), None);
        assert_eq!(parse_array_field_number("a"), None);
        assert_eq!(parse_array_field_number("99999999999"), None);
    }

    #[test]
    fn comparison_error_message() {
        let ctxt = ParserContext::new("Settings");
        let err = comparison_error(Some(&ctxt), "port", ">=", &-1, &0);
        assert_eq!(
            err.to_string(),
            "BSON field 'Settings.port' value must be >= 0, actual value '-1'"
        );
        assert_eq!(comparison_error(None, "port", "<", &9, &5).field(), Some("port"));
    }

    #[test]
    fn namespaces() {
        let ctxt = ParserContext::new("find");
        let nss = ctxt
            .parse_ns_collection_required("test", &Bson::from("coll"))
            .unwrap();
        assert_eq!(nss.ns(), "test.coll");
        assert!(ctxt
            .parse_ns_collection_required("test", &Bson::from(""))
            .is_err());

        let uuid = Bson::from(BinData::new(BinDataSubtype::Uuid, vec![1; 16]));
        assert!(matches!(
            ctxt.parse_ns_or_uuid("test", &uuid),
            Ok(NamespaceStringOrUuid::Uuid { .. })
        ));
    }
}
