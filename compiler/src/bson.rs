//! What the generator knows about each wire type tag.

use bidl_bson::{BinDataSubtype, ElementType};

/// One wire tag as generated code sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BsonTypeInfo {
    pub name:         &'static str,
    /// `ElementType` variant in generated code.
    pub element_type: &'static str,
    /// Storage type when no deserializer is involved.
    pub natural_type: Option<&'static str>,
    /// Accessor on `&Bson` yielding the natural value or its view.
    pub accessor:     Option<&'static str>,
    /// Suffix turning the accessor's view into owned storage.
    pub to_owned:     &'static str,
    /// Whether the type is a single value, rather than a container.
    pub scalar:       bool,
}

const fn info(
    name: &'static str,
    element_type: &'static str,
    natural_type: Option<&'static str>,
    accessor: Option<&'static str>,
    to_owned: &'static str,
    scalar: bool,
) -> BsonTypeInfo {
    BsonTypeInfo {
        name,
        element_type,
        natural_type,
        accessor,
        to_owned,
        scalar,
    }
}

const BSON_TYPES: &[BsonTypeInfo] = &[
    info("double", "ElementType::Double", Some("f64"), Some("as_f64()"), "", true),
    info("string", "ElementType::String", Some("String"), Some("as_str()"), ".to_owned()", true),
    info("object", "ElementType::Object", Some("Document"), Some("as_document()"), ".clone()", false),
    info("array", "ElementType::Array", None, Some("as_array()"), ".clone()", false),
    info("bindata", "ElementType::BinData", Some("Vec<u8>"), Some("as_bin_data()"), ".to_vec()", true),
    info("undefined", "ElementType::Undefined", None, None, "", true),
    info("objectid", "ElementType::ObjectId", Some("ObjectId"), Some("as_object_id()"), "", true),
    info("bool", "ElementType::Bool", Some("bool"), Some("as_bool()"), "", true),
    info("date", "ElementType::Date", Some("DateTime"), Some("as_date()"), "", true),
    info("null", "ElementType::Null", None, None, "", true),
    info("regex", "ElementType::Regex", None, None, "", true),
    info("int", "ElementType::Int32", Some("i32"), Some("as_i32()"), "", true),
    info("timestamp", "ElementType::Timestamp", Some("Timestamp"), Some("as_timestamp()"), "", true),
    info("long", "ElementType::Int64", Some("i64"), Some("as_i64()"), "", true),
    info("decimal", "ElementType::Decimal128", Some("Decimal128"), Some("as_decimal128()"), "", true),
];

/// Sentinel: the deserializer receives the whole element.
pub const ANY: &str = "any";
/// Sentinel: the deserializer receives the whole enclosing document.
pub const CHAIN: &str = "chain";

pub fn get_bson_type_info(name: &str) -> Option<&'static BsonTypeInfo> {
    BSON_TYPES.iter().find(|t| t.name == name)
}

pub fn is_valid_bson_type(name: &str) -> bool {
    name == ANY || name == CHAIN || get_bson_type_info(name).is_some()
}

pub fn is_scalar_bson_type(name: &str) -> bool {
    get_bson_type_info(name).map(|t| t.scalar).unwrap_or(false)
}

/// `ElementType::X` for a tag, as generated code spells it.
pub fn element_type_expr(name: &str) -> Option<&'static str> {
    get_bson_type_info(name).map(|t| t.element_type)
}

pub fn element_type(name: &str) -> Option<ElementType> {
    ElementType::from_name(name)
}

pub fn is_valid_bindata_subtype(name: &str) -> bool {
    BinDataSubtype::from_name(name).is_some()
}

/// `BinDataSubtype::X` for a named subtype, as generated code spells it.
pub fn bindata_subtype_expr(name: &str) -> Option<&'static str> {
    match BinDataSubtype::from_name(name)? {
        BinDataSubtype::Generic => Some("BinDataSubtype::Generic"),
        BinDataSubtype::Function => Some("BinDataSubtype::Function"),
        BinDataSubtype::Uuid => Some("BinDataSubtype::Uuid"),
        BinDataSubtype::Md5 => Some("BinDataSubtype::Md5"),
        BinDataSubtype::Encrypt => Some("BinDataSubtype::Encrypt"),
        _ => None,
    }
}

/// The storage type a field of this tag gets when `rust_type` matches it.
pub fn natural_type(name: &str) -> Option<&'static str> {
    get_bson_type_info(name).and_then(|t| t.natural_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tag_matches_an_element_type() {
        for info in BSON_TYPES {
            let element = element_type(info.name).unwrap();
            assert_eq!(format!("ElementType::{:?}", element), info.element_type);
        }
        assert_eq!(BSON_TYPES.len(), ElementType::ALL.len());
    }

    #[test]
    fn sentinels_and_subtypes() {
        assert!(is_valid_bson_type("any"));
        assert!(is_valid_bson_type("chain"));
        assert!(!is_valid_bson_type("int32"));
        assert!(is_scalar_bson_type("int"));
        assert!(!is_scalar_bson_type("object"));
        assert!(!is_scalar_bson_type("any"));
        assert_eq!(bindata_subtype_expr("uuid"), Some("BinDataSubtype::Uuid"));
        assert!(!is_valid_bindata_subtype("uuid_old"));
        assert_eq!(natural_type("long"), Some("i64"));
        assert_eq!(natural_type("null"), None);
    }
}
