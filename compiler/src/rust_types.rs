//! Storage and accessor shapes for generated fields.
//!
//! Each field's Rust type falls into one of a few kinds, and the kind decides
//! how the getter hands the value out: by value, through a borrowed view, or
//! by reference. Optional and array fields wrap the element's kind.

use crate::ast::{Field, FieldKind};

pub trait RustTypeInfo {
    /// The type stored in the struct.
    fn storage_type(&self) -> String;

    fn getter_type(&self) -> String;

    fn getter_body(&self, member: &str) -> String;

    /// Getter shape when this type sits inside an `Option`.
    fn optional_getter_type(&self) -> String;

    fn optional_getter_body(&self, member: &str) -> String;

    /// `&mut` accessor type, for types returned by reference.
    fn mut_getter_type(&self) -> Option<String>;

    /// The getter borrows through a view type such as `&str`.
    fn is_view_type(&self) -> bool;

    fn is_copy(&self) -> bool;

    fn setter_type(&self) -> String {
        self.storage_type()
    }
}

/// Copy scalars and enums, returned by value.
struct RustTypeBasic {
    rust_type: String,
}

impl RustTypeInfo for RustTypeBasic {
    fn storage_type(&self) -> String {
        self.rust_type.clone()
    }

    fn getter_type(&self) -> String {
        self.rust_type.clone()
    }

    fn getter_body(&self, member: &str) -> String {
        format!("self.{}", member)
    }

    fn optional_getter_type(&self) -> String {
        format!("Option<{}>", self.rust_type)
    }

    fn optional_getter_body(&self, member: &str) -> String {
        format!("self.{}", member)
    }

    fn mut_getter_type(&self) -> Option<String> {
        None
    }

    fn is_view_type(&self) -> bool {
        false
    }

    fn is_copy(&self) -> bool {
        true
    }
}

/// Owned storage with a borrowed view, like `String` and `&str`.
struct RustTypeView {
    rust_type: String,
    view_type: String,
}

impl RustTypeInfo for RustTypeView {
    fn storage_type(&self) -> String {
        self.rust_type.clone()
    }

    fn getter_type(&self) -> String {
        self.view_type.clone()
    }

    fn getter_body(&self, member: &str) -> String {
        format!("&self.{}", member)
    }

    fn optional_getter_type(&self) -> String {
        format!("Option<{}>", self.view_type)
    }

    fn optional_getter_body(&self, member: &str) -> String {
        format!("self.{}.as_deref()", member)
    }

    fn mut_getter_type(&self) -> Option<String> {
        None
    }

    fn is_view_type(&self) -> bool {
        true
    }

    fn is_copy(&self) -> bool {
        false
    }
}

/// Everything else: structs, documents, custom types.
struct RustTypeRef {
    rust_type: String,
}

impl RustTypeInfo for RustTypeRef {
    fn storage_type(&self) -> String {
        self.rust_type.clone()
    }

    fn getter_type(&self) -> String {
        format!("&{}", self.rust_type)
    }

    fn getter_body(&self, member: &str) -> String {
        format!("&self.{}", member)
    }

    fn optional_getter_type(&self) -> String {
        format!("Option<&{}>", self.rust_type)
    }

    fn optional_getter_body(&self, member: &str) -> String {
        format!("self.{}.as_ref()", member)
    }

    fn mut_getter_type(&self) -> Option<String> {
        Some(format!("&mut {}", self.rust_type))
    }

    fn is_view_type(&self) -> bool {
        false
    }

    fn is_copy(&self) -> bool {
        false
    }
}

struct RustTypeArray {
    element: Box<dyn RustTypeInfo>,
}

impl RustTypeInfo for RustTypeArray {
    fn storage_type(&self) -> String {
        format!("Vec<{}>", self.element.storage_type())
    }

    fn getter_type(&self) -> String {
        format!("&[{}]", self.element.storage_type())
    }

    fn getter_body(&self, member: &str) -> String {
        format!("&self.{}", member)
    }

    fn optional_getter_type(&self) -> String {
        format!("Option<&[{}]>", self.element.storage_type())
    }

    fn optional_getter_body(&self, member: &str) -> String {
        format!("self.{}.as_deref()", member)
    }

    fn mut_getter_type(&self) -> Option<String> {
        Some(format!("&mut {}", self.storage_type()))
    }

    fn is_view_type(&self) -> bool {
        true
    }

    fn is_copy(&self) -> bool {
        false
    }
}

struct RustTypeOptional {
    inner: Box<dyn RustTypeInfo>,
}

impl RustTypeInfo for RustTypeOptional {
    fn storage_type(&self) -> String {
        format!("Option<{}>", self.inner.storage_type())
    }

    fn getter_type(&self) -> String {
        self.inner.optional_getter_type()
    }

    fn getter_body(&self, member: &str) -> String {
        self.inner.optional_getter_body(member)
    }

    fn optional_getter_type(&self) -> String {
        format!("Option<{}>", self.getter_type())
    }

    fn optional_getter_body(&self, member: &str) -> String {
        self.getter_body(member)
    }

    fn mut_getter_type(&self) -> Option<String> {
        self.inner
            .mut_getter_type()
            .map(|_| format!("Option<&mut {}>", self.inner.storage_type()))
    }

    fn is_view_type(&self) -> bool {
        self.inner.is_view_type()
    }

    fn is_copy(&self) -> bool {
        self.inner.is_copy()
    }
}

const PRIMITIVE_SCALAR_TYPES: &[&str] = &[
    "bool", "i8", "i16", "i32", "i64", "u8", "u16", "u32", "u64", "f32", "f64", "ObjectId",
    "DateTime", "Timestamp", "Decimal128",
];

pub fn is_primitive_scalar_type(rust_type: &str) -> bool {
    PRIMITIVE_SCALAR_TYPES.contains(&rust_type.trim())
}

/// The type a field's single value is stored as, before array or optional
/// wrapping.
pub fn field_base_type(field: &Field) -> String {
    match &field.kind {
        FieldKind::Basic(basic) => basic.rust_type.clone(),
        FieldKind::Enum(e) => e.rust_name.clone(),
        FieldKind::Struct(s) => s.rust_name.clone(),
        FieldKind::Variant(v) => v.rust_name.clone(),
    }
}

pub fn get_rust_type_for_name(rust_type: &str) -> Box<dyn RustTypeInfo> {
    let rust_type = rust_type.trim().to_owned();
    if is_primitive_scalar_type(&rust_type) {
        Box::new(RustTypeBasic { rust_type })
    } else if rust_type == "String" {
        Box::new(RustTypeView {
            rust_type,
            view_type: "&str".to_owned(),
        })
    } else if rust_type == "Vec<u8>" {
        Box::new(RustTypeView {
            rust_type,
            view_type: "&[u8]".to_owned(),
        })
    } else {
        Box::new(RustTypeRef { rust_type })
    }
}

/// The type of one element: arrays and optionals are not applied.
pub fn get_element_rust_type(field: &Field) -> Box<dyn RustTypeInfo> {
    match &field.kind {
        FieldKind::Enum(e) => Box::new(RustTypeBasic {
            rust_type: e.rust_name.clone(),
        }),
        FieldKind::Basic(basic) => get_rust_type_for_name(&basic.rust_type),
        FieldKind::Struct(_) | FieldKind::Variant(_) => Box::new(RustTypeRef {
            rust_type: field_base_type(field),
        }),
    }
}

pub fn get_rust_type(field: &Field) -> Box<dyn RustTypeInfo> {
    let mut rust_type = get_element_rust_type(field);
    if field.array {
        rust_type = Box::new(RustTypeArray { element: rust_type });
    }
    if field.optional {
        rust_type = Box::new(RustTypeOptional { inner: rust_type });
    }
    rust_type
}

/// Whether the field's storage holds an embedded `Document` and so must be
/// compared structurally.
pub fn contains_embedded_document(field: &Field) -> bool {
    matches!(&field.kind, FieldKind::Basic(basic) if basic.rust_type.trim() == "Document")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BasicType, StructRef};

    fn basic_field(rust_type: &str) -> Field {
        Field {
            name: "f".to_owned(),
            rust_name: "f".to_owned(),
            description: None,
            kind: FieldKind::Basic(BasicType {
                name: "t".to_owned(),
                rust_type: rust_type.to_owned(),
                bson_serialization_type: vec!["string".to_owned()],
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

    fn shape(field: &Field) -> (String, String, String, Option<String>) {
        let t = get_rust_type(field);
        (t.storage_type(), t.getter_type(), t.getter_body("f"), t.mut_getter_type())
    }

    #[test]
    fn scalar_view_and_reference_shapes() {
        assert_eq!(
            shape(&basic_field("i32")),
            ("i32".into(), "i32".into(), "self.f".into(), None)
        );
        assert_eq!(
            shape(&basic_field("String")),
            ("String".into(), "&str".into(), "&self.f".into(), None)
        );
        assert_eq!(
            shape(&basic_field("Document")),
            ("Document".into(), "&Document".into(), "&self.f".into(), Some("&mut Document".into()))
        );
        assert!(get_rust_type(&basic_field("Vec<u8>")).is_view_type());
    }

    #[test]
    fn optional_and_array_shapes() {
        let mut f = basic_field("String");
        f.optional = true;
        assert_eq!(
            shape(&f),
            ("Option<String>".into(), "Option<&str>".into(), "self.f.as_deref()".into(), None)
        );

        let mut f = basic_field("i64");
        f.array = true;
        assert_eq!(
            shape(&f),
            ("Vec<i64>".into(), "&[i64]".into(), "&self.f".into(), Some("&mut Vec<i64>".into()))
        );

        f.optional = true;
        assert_eq!(
            shape(&f),
            (
                "Option<Vec<i64>>".into(),
                "Option<&[i64]>".into(),
                "self.f.as_deref()".into(),
                Some("Option<&mut Vec<i64>>".into())
            )
        );

        let mut s = basic_field("unused");
        s.kind = FieldKind::Struct(StructRef {
            name:      "point".into(),
            rust_name: "Point".into(),
        });
        s.optional = true;
        assert_eq!(
            shape(&s),
            ("Option<Point>".into(), "Option<&Point>".into(), "self.f.as_ref()".into(), Some("Option<&mut Point>".into()))
        );
    }

    #[test]
    fn documents_are_compared_structurally() {
        assert!(contains_embedded_document(&basic_field("Document")));
        assert!(!contains_embedded_document(&basic_field("String")));
    }
}
