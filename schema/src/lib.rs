//! This is a Rust library with the document model used by code generated by
//! the bidl compiler. Documents are ordered lists of named elements and are
//! encoded in the little-endian BSON layout.
//!
//! ```
//! use bidl_bson::*;
//!
//! let document = doc! { "x" => 1, "name" => "point" };
//! let bytes = document.to_bytes();
//! assert_eq!(bytes.len(), 28);
//! assert_eq!(Document::from_bytes(&bytes).unwrap(), document);
//! assert_eq!(format!("{:?}", document), r#"{x: 1, name: "point"}"#);
//! ```

pub mod bb;
pub mod document;
pub mod error;
pub mod value;

pub use bb::*;
pub use document::*;
pub use error::BsonError;
pub use value::*;

pub const TYPE_DOUBLE: u8 = 0x01;
pub const TYPE_STRING: u8 = 0x02;
pub const TYPE_OBJECT: u8 = 0x03;
pub const TYPE_ARRAY: u8 = 0x04;
pub const TYPE_BINDATA: u8 = 0x05;
pub const TYPE_UNDEFINED: u8 = 0x06;
pub const TYPE_OBJECTID: u8 = 0x07;
pub const TYPE_BOOL: u8 = 0x08;
pub const TYPE_DATE: u8 = 0x09;
pub const TYPE_NULL: u8 = 0x0A;
pub const TYPE_REGEX: u8 = 0x0B;
pub const TYPE_INT32: u8 = 0x10;
pub const TYPE_TIMESTAMP: u8 = 0x11;
pub const TYPE_INT64: u8 = 0x12;
pub const TYPE_DECIMAL: u8 = 0x13;

/// Builds a [Document] from `key => value` pairs, keeping their order.
#[macro_export]
macro_rules! doc {
    () => {
        $crate::Document::new()
    };
    ( $( $key:expr => $value:expr ),+ $(,)? ) => {{
        let mut document = $crate::Document::new();
        $( document.append($key, $value); )+
        document
    }};
}
