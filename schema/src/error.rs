use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BsonError {
    #[error("Unexpected end of buffer at offset {0}")]
    UnexpectedEof(usize),

    #[error("Invalid document length {length} at offset {offset}")]
    InvalidLength {
        length: i32,
        offset: usize,
    },

    #[error("Unknown element type 0x{tag:02x} for field \"{field}\"")]
    UnknownElementType {
        tag:   u8,
        field: String,
    },

    #[error("Invalid UTF-8 at offset {0}")]
    InvalidString(usize),

    #[error("Documents nested deeper than {max} levels at offset {offset}")]
    TooDeep {
        max:    usize,
        offset: usize,
    },

    #[error("{0} trailing bytes after document")]
    TrailingBytes(usize),
}
