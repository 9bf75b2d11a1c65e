use bidl_bson::Document;

use crate::context::ParserContext;
use crate::error::IdlError;

/// Implemented by every generated struct that is not a command.
pub trait IdlStruct: Sized {
    fn parse(ctxt: &ParserContext, bson_object: &Document) -> Result<Self, IdlError>;

    fn serialize(&self, builder: &mut Document);

    fn to_bson(&self) -> Document {
        let mut builder = Document::new();
        self.serialize(&mut builder);
        builder
    }

    /// Decodes `bytes` and parses the result with a root context named `name`.
    fn from_bytes(name: &str, bytes: &[u8]) -> Result<Self, IdlError> {
        let document = Document::from_bytes(bytes)?;
        Self::parse(&ParserContext::new(name), &document)
    }
}
