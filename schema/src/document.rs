use crate::{
    bb::{ByteBuffer, ByteBufferMut},
    error::BsonError,
    value::Bson,
};

use std::fmt;

/// How many levels of embedded documents and arrays a decoder accepts below
/// the outermost document.
pub const MAX_NESTING_DEPTH: usize = 200;

/// An ordered list of named elements.
///
/// Duplicate names are allowed: the generated parsers are the ones that
/// decide whether a repeated field is an error, so the document model keeps
/// exactly what was on the wire.
#[derive(Clone, Default, PartialEq)]
pub struct Document {
    elements: Vec<(String, Bson)>,
}

impl Document {
    pub const fn new() -> Document {
        Document {
            elements: Vec::new(),
        }
    }

    /// Appends an element at the end of the document.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<Bson>) {
        self.elements.push((key.into(), value.into()));
    }

    /// Returns the first element named `key`.
    pub fn get(&self, key: &str) -> Option<&Bson> {
        self.elements
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Removes every element named `key`.
    pub fn remove(&mut self, key: &str) {
        self.elements.retain(|(name, _)| name != key);
    }

    pub fn first(&self) -> Option<(&str, &Bson)> {
        self.elements
            .first()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Bson)> + '_ {
        self.elements
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.elements.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Encodes this document into an array of bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bb = ByteBufferMut::new();
        self.encode_bb(&mut bb);
        bb.data()
    }

    /// Decodes a document that must span all of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Document, BsonError> {
        let mut bb = ByteBuffer::new(bytes);
        let document = Document::decode_bb(&mut bb)?;
        match bb.remaining() {
            0 => Ok(document),
            extra => Err(BsonError::TrailingBytes(extra)),
        }
    }

    /// Encodes the current document to the end of `bb`. This is mainly useful
    /// as a helper routine for [to_bytes](#method.to_bytes), which you
    /// probably want to use instead.
    pub fn encode_bb(&self, bb: &mut ByteBufferMut) {
        let offset = bb.reserve_length();
        for (name, value) in &self.elements {
            bb.write_byte(value.element_type().tag());
            bb.write_cstring(name);
            value.encode_bb(bb);
        }
        bb.write_byte(0);
        bb.backpatch_length(offset);
    }

    /// Decodes a document from `bb` starting at the current index. After this
    /// function returns, the current index will be advanced past the
    /// document's terminator.
    pub fn decode_bb(bb: &mut ByteBuffer) -> Result<Document, BsonError> {
        Document::decode_nested(bb, 0)
    }

    pub(crate) fn decode_nested(bb: &mut ByteBuffer, depth: usize) -> Result<Document, BsonError> {
        let offset = bb.index();
        if depth > MAX_NESTING_DEPTH {
            return Err(BsonError::TooDeep {
                max: MAX_NESTING_DEPTH,
                offset,
            });
        }
        let length = bb
            .read_i32()
            .map_err(|_| BsonError::UnexpectedEof(offset))?;
        if length < 5 || offset + length as usize > bb.data().len() {
            return Err(BsonError::InvalidLength { length, offset });
        }
        let end = offset + length as usize;

        let mut document = Document::new();
        loop {
            let tag = bb
                .read_byte()
                .map_err(|_| BsonError::UnexpectedEof(bb.index()))?;
            if tag == 0 {
                break;
            }
            let name = bb
                .read_cstring()
                .map_err(|_| BsonError::InvalidString(bb.index()))?
                .to_owned();
            let value = Bson::decode_nested(tag, &name, bb, depth)?;
            document.elements.push((name, value));

            if bb.index() >= end {
                return Err(BsonError::InvalidLength { length, offset });
            }
        }

        if bb.index() != end {
            return Err(BsonError::InvalidLength { length, offset });
        }
        Ok(document)
    }
}

impl<K: Into<String>, V: Into<Bson>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Document {
        let mut document = Document::new();
        for (key, value) in iter {
            document.append(key, value);
        }
        document
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{{")?;
        for (index, (name, value)) in self.elements.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {:?}", name, value)?;
        }
        write!(f, "}}")
    }
}

/// Builds an array value whose keys are the decimal positions "0", "1", ...
#[derive(Default)]
pub struct ArrayBuilder {
    elements: Document,
}

impl ArrayBuilder {
    pub fn new() -> ArrayBuilder {
        ArrayBuilder::default()
    }

    pub fn push(&mut self, value: impl Into<Bson>) {
        let key = self.elements.len().to_string();
        self.elements.append(key, value);
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn finish(self) -> Bson {
        Bson::Array(self.elements)
    }
}

impl From<ArrayBuilder> for Bson {
    fn from(value: ArrayBuilder) -> Bson {
        value.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{doc, TYPE_OBJECT};

    #[test]
    fn document_keeps_order_and_duplicates() {
        let mut document = doc! { "b" => 1, "a" => 2 };
        document.append("b", 3);
        assert_eq!(document.keys().collect::<Vec<_>>(), vec!["b", "a", "b"]);
        assert_eq!(document.get("b"), Some(&Bson::Int32(1)));
        assert_eq!(document.first(), Some(("b", &Bson::Int32(1))));

        document.remove("b");
        assert_eq!(document.len(), 1);
        assert_eq!(document.get("b"), None);
    }

    #[test]
    fn document_encode_and_decode() {
        let mut array = ArrayBuilder::new();
        array.push("x");
        array.push("y");

        let document = doc! {
            "int" => 5,
            "nested" => doc! { "flag" => true },
            "list" => array,
        };
        let bytes = document.to_bytes();
        assert_eq!(&bytes[..4], &(bytes.len() as i32).to_le_bytes());
        assert_eq!(*bytes.last().unwrap(), 0);

        let decoded = Document::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, document);
        assert_eq!(
            decoded.get("list").unwrap().as_array().keys().collect::<Vec<_>>(),
            vec!["0", "1"]
        );
    }

    #[test]
    fn empty_document_bytes() {
        assert_eq!(Document::new().to_bytes(), [5, 0, 0, 0, 0]);
        assert_eq!(Document::from_bytes(&[5, 0, 0, 0, 0]), Ok(Document::new()));
    }

    #[test]
    fn decode_rejects_bad_lengths() {
        assert_eq!(
            Document::from_bytes(&[4, 0, 0, 0]),
            Err(BsonError::InvalidLength { length: 4, offset: 0 })
        );
        assert_eq!(
            Document::from_bytes(&[9, 0, 0, 0, 0]),
            Err(BsonError::InvalidLength { length: 9, offset: 0 })
        );
        assert_eq!(
            Document::from_bytes(&[5, 0, 0, 0, 0, 1]),
            Err(BsonError::TrailingBytes(1))
        );
        assert_eq!(Document::from_bytes(&[1, 0]), Err(BsonError::UnexpectedEof(0)));
    }

    fn nested(levels: usize) -> Document {
        let mut inner = doc! { "leaf" => 1 };
        for _ in 0..levels {
            inner = doc! { "" => inner };
        }
        inner
    }

    #[test]
    fn decode_limits_nesting_depth() {
        let deepest = nested(MAX_NESTING_DEPTH);
        assert_eq!(Document::from_bytes(&deepest.to_bytes()), Ok(deepest));

        let too_deep = nested(MAX_NESTING_DEPTH + 1).to_bytes();
        assert!(matches!(
            Document::from_bytes(&too_deep),
            Err(BsonError::TooDeep { max: MAX_NESTING_DEPTH, .. })
        ));
    }

    #[test]
    fn decode_rejects_very_deep_input_without_recursing() {
        // {"": {"": ...}} written by hand so encoding does not recurse either.
        let levels = 100_000;
        let mut bytes = Vec::new();
        for level in 0..levels {
            let length = 5 + (levels - level - 1) * 7;
            bytes.extend_from_slice(&(length as i32).to_le_bytes());
            if level + 1 < levels {
                bytes.extend_from_slice(&[TYPE_OBJECT, 0]);
            }
        }
        for _ in 0..levels {
            bytes.push(0);
        }
        assert!(matches!(
            Document::from_bytes(&bytes),
            Err(BsonError::TooDeep { .. })
        ));
    }

    #[test]
    fn document_debug() {
        let document = doc! { "a" => "x", "b" => doc! { "c" => 1.5 } };
        assert_eq!(format!("{:?}", document), r#"{a: "x", b: {c: 1.5}}"#);
    }
}
