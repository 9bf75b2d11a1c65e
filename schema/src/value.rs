use crate::{
    TYPE_ARRAY, TYPE_BINDATA, TYPE_BOOL, TYPE_DATE, TYPE_DECIMAL, TYPE_DOUBLE, TYPE_INT32,
    TYPE_INT64, TYPE_NULL, TYPE_OBJECT, TYPE_OBJECTID, TYPE_REGEX, TYPE_STRING, TYPE_TIMESTAMP,
    TYPE_UNDEFINED,
    bb::{ByteBuffer, ByteBufferMut},
    document::Document,
    error::BsonError,
};

use std::fmt;

/// The wire-level kind of an element. The names returned by
/// [name](#method.name) are the ones used by `bson_serialization_type` in
/// schema files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementType {
    Double,
    String,
    Object,
    Array,
    BinData,
    Undefined,
    ObjectId,
    Bool,
    Date,
    Null,
    Regex,
    Int32,
    Timestamp,
    Int64,
    Decimal128,
}

impl ElementType {
    pub const ALL: [ElementType; 15] = [
        ElementType::Double,
        ElementType::String,
        ElementType::Object,
        ElementType::Array,
        ElementType::BinData,
        ElementType::Undefined,
        ElementType::ObjectId,
        ElementType::Bool,
        ElementType::Date,
        ElementType::Null,
        ElementType::Regex,
        ElementType::Int32,
        ElementType::Timestamp,
        ElementType::Int64,
        ElementType::Decimal128,
    ];

    pub fn tag(self) -> u8 {
        match self {
            ElementType::Double => TYPE_DOUBLE,
            ElementType::String => TYPE_STRING,
            ElementType::Object => TYPE_OBJECT,
            ElementType::Array => TYPE_ARRAY,
            ElementType::BinData => TYPE_BINDATA,
            ElementType::Undefined => TYPE_UNDEFINED,
            ElementType::ObjectId => TYPE_OBJECTID,
            ElementType::Bool => TYPE_BOOL,
            ElementType::Date => TYPE_DATE,
            ElementType::Null => TYPE_NULL,
            ElementType::Regex => TYPE_REGEX,
            ElementType::Int32 => TYPE_INT32,
            ElementType::Timestamp => TYPE_TIMESTAMP,
            ElementType::Int64 => TYPE_INT64,
            ElementType::Decimal128 => TYPE_DECIMAL,
        }
    }

    pub fn from_tag(tag: u8) -> Option<ElementType> {
        ElementType::ALL.iter().copied().find(|t| t.tag() == tag)
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementType::Double => "double",
            ElementType::String => "string",
            ElementType::Object => "object",
            ElementType::Array => "array",
            ElementType::BinData => "bindata",
            ElementType::Undefined => "undefined",
            ElementType::ObjectId => "objectid",
            ElementType::Bool => "bool",
            ElementType::Date => "date",
            ElementType::Null => "null",
            ElementType::Regex => "regex",
            ElementType::Int32 => "int",
            ElementType::Timestamp => "timestamp",
            ElementType::Int64 => "long",
            ElementType::Decimal128 => "decimal",
        }
    }

    pub fn from_name(name: &str) -> Option<ElementType> {
        ElementType::ALL.iter().copied().find(|t| t.name() == name)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Binary data subtypes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinDataSubtype {
    Generic,
    Function,
    BinaryOld,
    UuidOld,
    Uuid,
    Md5,
    Encrypt,
    UserDefined(u8),
}

impl BinDataSubtype {
    pub fn to_u8(self) -> u8 {
        match self {
            BinDataSubtype::Generic => 0x00,
            BinDataSubtype::Function => 0x01,
            BinDataSubtype::BinaryOld => 0x02,
            BinDataSubtype::UuidOld => 0x03,
            BinDataSubtype::Uuid => 0x04,
            BinDataSubtype::Md5 => 0x05,
            BinDataSubtype::Encrypt => 0x06,
            BinDataSubtype::UserDefined(value) => value,
        }
    }

    pub fn from_u8(value: u8) -> BinDataSubtype {
        match value {
            0x00 => BinDataSubtype::Generic,
            0x01 => BinDataSubtype::Function,
            0x02 => BinDataSubtype::BinaryOld,
            0x03 => BinDataSubtype::UuidOld,
            0x04 => BinDataSubtype::Uuid,
            0x05 => BinDataSubtype::Md5,
            0x06 => BinDataSubtype::Encrypt,
            other => BinDataSubtype::UserDefined(other),
        }
    }

    /// Subtypes that may be named by `bindata_subtype` in a schema file.
    pub fn from_name(name: &str) -> Option<BinDataSubtype> {
        match name {
            "generic" => Some(BinDataSubtype::Generic),
            "function" => Some(BinDataSubtype::Function),
            "uuid" => Some(BinDataSubtype::Uuid),
            "md5" => Some(BinDataSubtype::Md5),
            "encrypt" => Some(BinDataSubtype::Encrypt),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub [u8; 12]);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Milliseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DateTime(pub i64);

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Date({})", self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp {
    pub time:      u32,
    pub increment: u32,
}

impl Timestamp {
    fn to_u64(self) -> u64 {
        ((self.time as u64) << 32) | self.increment as u64
    }

    fn from_u64(value: u64) -> Timestamp {
        Timestamp {
            time:      (value >> 32) as u32,
            increment: value as u32,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Timestamp({}, {})", self.time, self.increment)
    }
}

/// An IEEE 754-2008 decimal, kept as its raw 16 bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Decimal128(pub [u8; 16]);

#[derive(Clone, Debug, PartialEq)]
pub struct BinData {
    pub subtype: BinDataSubtype,
    pub bytes:   Vec<u8>,
}

impl BinData {
    pub fn new(subtype: BinDataSubtype, bytes: Vec<u8>) -> BinData {
        BinData { subtype, bytes }
    }
}

/// A single element value.
///
/// Arrays are stored as documents so that the wire keys ("0", "1", ...) are
/// preserved exactly as they were decoded. Validating that sequence is the
/// job of the generated parsers.
#[derive(Clone, PartialEq)]
pub enum Bson {
    Double(f64),
    String(String),
    Document(Document),
    Array(Document),
    Binary(BinData),
    Undefined,
    ObjectId(ObjectId),
    Boolean(bool),
    DateTime(DateTime),
    Null,
    RegularExpression {
        pattern: String,
        options: String,
    },
    Int32(i32),
    Timestamp(Timestamp),
    Int64(i64),
    Decimal128(Decimal128),
}

static EMPTY_DOCUMENT: Document = Document::new();

impl Bson {
    pub fn element_type(&self) -> ElementType {
        match *self {
            Bson::Double(_) => ElementType::Double,
            Bson::String(_) => ElementType::String,
            Bson::Document(_) => ElementType::Object,
            Bson::Array(_) => ElementType::Array,
            Bson::Binary(_) => ElementType::BinData,
            Bson::Undefined => ElementType::Undefined,
            Bson::ObjectId(_) => ElementType::ObjectId,
            Bson::Boolean(_) => ElementType::Bool,
            Bson::DateTime(_) => ElementType::Date,
            Bson::Null => ElementType::Null,
            Bson::RegularExpression { .. } => ElementType::Regex,
            Bson::Int32(_) => ElementType::Int32,
            Bson::Timestamp(_) => ElementType::Timestamp,
            Bson::Int64(_) => ElementType::Int64,
            Bson::Decimal128(_) => ElementType::Decimal128,
        }
    }

    /// A convenience method to extract the value out of a [Double](#variant.Double).
    /// Returns `0.0` for other value kinds.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Bson::Double(value) => value,
            _ => 0.0,
        }
    }

    /// A convenience method to extract the value out of a [String](#variant.String).
    /// Returns `""` for other value kinds.
    pub fn as_str(&self) -> &str {
        match *self {
            Bson::String(ref value) => value.as_str(),
            _ => "",
        }
    }

    /// A convenience method to extract the value out of a
    /// [Document](#variant.Document). Returns an empty document for other
    /// value kinds.
    pub fn as_document(&self) -> &Document {
        match *self {
            Bson::Document(ref value) => value,
            _ => &EMPTY_DOCUMENT,
        }
    }

    /// The keyed elements of an [Array](#variant.Array). Returns an empty
    /// document for other value kinds.
    pub fn as_array(&self) -> &Document {
        match *self {
            Bson::Array(ref value) => value,
            _ => &EMPTY_DOCUMENT,
        }
    }

    /// Returns `&[]` for other value kinds.
    pub fn as_bin_data(&self) -> &[u8] {
        match *self {
            Bson::Binary(ref value) => value.bytes.as_slice(),
            _ => &[],
        }
    }

    pub fn bin_data_subtype(&self) -> Option<BinDataSubtype> {
        match *self {
            Bson::Binary(ref value) => Some(value.subtype),
            _ => None,
        }
    }

    pub fn as_object_id(&self) -> ObjectId {
        match *self {
            Bson::ObjectId(value) => value,
            _ => ObjectId::default(),
        }
    }

    pub fn as_bool(&self) -> bool {
        match *self {
            Bson::Boolean(value) => value,
            _ => false,
        }
    }

    pub fn as_date(&self) -> DateTime {
        match *self {
            Bson::DateTime(value) => value,
            _ => DateTime::default(),
        }
    }

    pub fn as_i32(&self) -> i32 {
        match *self {
            Bson::Int32(value) => value,
            _ => 0,
        }
    }

    pub fn as_timestamp(&self) -> Timestamp {
        match *self {
            Bson::Timestamp(value) => value,
            _ => Timestamp::default(),
        }
    }

    pub fn as_i64(&self) -> i64 {
        match *self {
            Bson::Int64(value) => value,
            _ => 0,
        }
    }

    pub fn as_decimal128(&self) -> Decimal128 {
        match *self {
            Bson::Decimal128(value) => value,
            _ => Decimal128::default(),
        }
    }

    /// Encodes the value part of an element (everything after the name).
    pub fn encode_bb(&self, bb: &mut ByteBufferMut) {
        match *self {
            Bson::Double(value) => bb.write_f64(value),
            Bson::String(ref value) => bb.write_string(value),
            Bson::Document(ref value) | Bson::Array(ref value) => value.encode_bb(bb),
            Bson::Binary(ref value) => {
                bb.write_i32(value.bytes.len() as i32);
                bb.write_byte(value.subtype.to_u8());
                bb.write_bytes(&value.bytes);
            }
            Bson::Undefined | Bson::Null => {}
            Bson::ObjectId(value) => bb.write_bytes(&value.0),
            Bson::Boolean(value) => bb.write_bool(value),
            Bson::DateTime(value) => bb.write_i64(value.0),
            Bson::RegularExpression {
                ref pattern,
                ref options,
            } => {
                bb.write_cstring(pattern);
                bb.write_cstring(options);
            }
            Bson::Int32(value) => bb.write_i32(value),
            Bson::Timestamp(value) => bb.write_u64(value.to_u64()),
            Bson::Int64(value) => bb.write_i64(value),
            Bson::Decimal128(value) => bb.write_bytes(&value.0),
        }
    }

    /// Decodes the value part of an element whose type byte was `tag`.
    pub fn decode_bb(tag: u8, field: &str, bb: &mut ByteBuffer) -> Result<Bson, BsonError> {
        Bson::decode_nested(tag, field, bb, 0)
    }

    pub(crate) fn decode_nested(
        tag: u8,
        field: &str,
        bb: &mut ByteBuffer,
        depth: usize,
    ) -> Result<Bson, BsonError> {
        let offset = bb.index();
        let eof = |_| BsonError::UnexpectedEof(offset);

        let element_type = ElementType::from_tag(tag).ok_or_else(|| {
            BsonError::UnknownElementType {
                tag,
                field: field.to_owned(),
            }
        })?;

        Ok(match element_type {
            ElementType::Double => Bson::Double(bb.read_f64().map_err(eof)?),
            ElementType::String => Bson::String(
                bb.read_string()
                    .map_err(|_| BsonError::InvalidString(offset))?
                    .to_owned(),
            ),
            ElementType::Object => Bson::Document(Document::decode_nested(bb, depth + 1)?),
            ElementType::Array => Bson::Array(Document::decode_nested(bb, depth + 1)?),
            ElementType::BinData => {
                let len = bb.read_i32().map_err(eof)?;
                if len < 0 {
                    return Err(BsonError::InvalidLength { length: len, offset });
                }
                let subtype = BinDataSubtype::from_u8(bb.read_byte().map_err(eof)?);
                let bytes = bb.read_bytes(len as usize).map_err(eof)?.to_vec();
                Bson::Binary(BinData { subtype, bytes })
            }
            ElementType::Undefined => Bson::Undefined,
            ElementType::ObjectId => Bson::ObjectId(ObjectId(bb.read_fixed().map_err(eof)?)),
            ElementType::Bool => Bson::Boolean(bb.read_bool().map_err(eof)?),
            ElementType::Date => Bson::DateTime(DateTime(bb.read_i64().map_err(eof)?)),
            ElementType::Null => Bson::Null,
            ElementType::Regex => {
                let pattern = bb
                    .read_cstring()
                    .map_err(|_| BsonError::InvalidString(offset))?
                    .to_owned();
                let options = bb
                    .read_cstring()
                    .map_err(|_| BsonError::InvalidString(offset))?
                    .to_owned();
                Bson::RegularExpression { pattern, options }
            }
            ElementType::Int32 => Bson::Int32(bb.read_i32().map_err(eof)?),
            ElementType::Timestamp => {
                Bson::Timestamp(Timestamp::from_u64(bb.read_u64().map_err(eof)?))
            }
            ElementType::Int64 => Bson::Int64(bb.read_i64().map_err(eof)?),
            ElementType::Decimal128 => {
                Bson::Decimal128(Decimal128(bb.read_fixed().map_err(eof)?))
            }
        })
    }
}

impl From<f64> for Bson {
    fn from(value: f64) -> Bson {
        Bson::Double(value)
    }
}

impl From<&str> for Bson {
    fn from(value: &str) -> Bson {
        Bson::String(value.to_owned())
    }
}

impl From<String> for Bson {
    fn from(value: String) -> Bson {
        Bson::String(value)
    }
}

impl From<Document> for Bson {
    fn from(value: Document) -> Bson {
        Bson::Document(value)
    }
}

impl From<BinData> for Bson {
    fn from(value: BinData) -> Bson {
        Bson::Binary(value)
    }
}

impl From<ObjectId> for Bson {
    fn from(value: ObjectId) -> Bson {
        Bson::ObjectId(value)
    }
}

impl From<bool> for Bson {
    fn from(value: bool) -> Bson {
        Bson::Boolean(value)
    }
}

impl From<DateTime> for Bson {
    fn from(value: DateTime) -> Bson {
        Bson::DateTime(value)
    }
}

impl From<i32> for Bson {
    fn from(value: i32) -> Bson {
        Bson::Int32(value)
    }
}

impl From<Timestamp> for Bson {
    fn from(value: Timestamp) -> Bson {
        Bson::Timestamp(value)
    }
}

impl From<i64> for Bson {
    fn from(value: i64) -> Bson {
        Bson::Int64(value)
    }
}

impl From<Decimal128> for Bson {
    fn from(value: Decimal128) -> Bson {
        Bson::Decimal128(value)
    }
}

impl fmt::Debug for Bson {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match *self {
            Bson::Double(value) => value.fmt(f),
            Bson::String(ref value) => value.fmt(f),
            Bson::Document(ref value) => value.fmt(f),
            Bson::Array(ref value) => {
                write!(f, "[")?;
                for (index, (_, element)) in value.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    element.fmt(f)?;
                }
                write!(f, "]")
            }
            Bson::Binary(ref value) => write!(f, "BinData({}, {:?})", value.subtype.to_u8(), value.bytes),
            Bson::Undefined => write!(f, "undefined"),
            Bson::ObjectId(value) => write!(f, "ObjectId({})", value),
            Bson::Boolean(value) => value.fmt(f),
            Bson::DateTime(value) => write!(f, "{}", value),
            Bson::Null => write!(f, "null"),
            Bson::RegularExpression {
                ref pattern,
                ref options,
            } => write!(f, "/{}/{}", pattern, options),
            Bson::Int32(value) => value.fmt(f),
            Bson::Timestamp(value) => write!(f, "{}", value),
            Bson::Int64(value) => write!(f, "NumberLong({})", value),
            Bson::Decimal128(value) => write!(f, "NumberDecimal({:?})", value.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_type_names() {
        assert_eq!(ElementType::from_name("int"), Some(ElementType::Int32));
        assert_eq!(ElementType::from_name("long"), Some(ElementType::Int64));
        assert_eq!(ElementType::from_name("any"), None);
        for element_type in ElementType::ALL {
            assert_eq!(ElementType::from_tag(element_type.tag()), Some(element_type));
            assert_eq!(ElementType::from_name(element_type.name()), Some(element_type));
        }
    }

    #[test]
    fn accessors_fall_back_to_defaults() {
        let value = Bson::from("abc");
        assert_eq!(value.element_type(), ElementType::String);
        assert_eq!(value.as_str(), "abc");
        assert_eq!(value.as_i32(), 0);
        assert_eq!(value.as_bool(), false);
        assert!(value.as_document().is_empty());
        assert_eq!(value.bin_data_subtype(), None);

        let value = Bson::from(BinData::new(BinDataSubtype::Uuid, vec![1, 2]));
        assert_eq!(value.as_bin_data(), &[1, 2]);
        assert_eq!(value.bin_data_subtype(), Some(BinDataSubtype::Uuid));
        assert_eq!(value.as_str(), "");
    }

    #[test]
    fn value_encode_and_decode() {
        let values = vec![
            Bson::Double(0.5),
            Bson::from("abc"),
            Bson::Binary(BinData::new(BinDataSubtype::Generic, vec![9, 8, 7])),
            Bson::ObjectId(ObjectId([7; 12])),
            Bson::Boolean(true),
            Bson::DateTime(DateTime(-5)),
            Bson::Null,
            Bson::RegularExpression {
                pattern: "^a".to_owned(),
                options: "i".to_owned(),
            },
            Bson::Int32(-3),
            Bson::Timestamp(Timestamp { time: 10, increment: 2 }),
            Bson::Int64(1 << 40),
            Bson::Decimal128(Decimal128([1; 16])),
        ];

        for value in values {
            let mut bb = ByteBufferMut::new();
            value.encode_bb(&mut bb);
            let bytes = bb.data();
            let mut reader = ByteBuffer::new(&bytes);
            let decoded = Bson::decode_bb(value.element_type().tag(), "f", &mut reader).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(reader.remaining(), 0);
        }
    }

    #[test]
    fn decode_rejects_unknown_tag() {
        let err = Bson::decode_bb(0x42, "f", &mut ByteBuffer::new(&[])).unwrap_err();
        assert_eq!(
            err,
            BsonError::UnknownElementType {
                tag:   0x42,
                field: "f".to_owned(),
            }
        );
    }

    #[test]
    fn value_debug() {
        let value = Bson::Array(crate::doc! { "0" => 1, "1" => "x", "2" => 3i64 });
        assert_eq!(format!("{:?}", value), r#"[1, "x", NumberLong(3)]"#);
    }
}
