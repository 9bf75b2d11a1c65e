use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Stable identifiers for every diagnostic the parser and binder report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorId {
    Syntax,
    UnknownNode,
    DuplicateNode,
    IsNodeTypeScalar,
    IsNodeTypeSequence,
    IsNodeTypeBlock,
    MissingRequiredField,
    IsNodeValidBool,
    IsNodeValidInt,
    DuplicateSymbol,
    UnknownType,
    ArrayOfArray,
    BadBsonType,
    BadBsonTypeCombination,
    BadBinDataSubtypeValue,
    BadBinDataSubtype,
    MissingBinDataSubtype,
    MissingAstRequiredField,
    BadAnyTypeUse,
    BadEnumType,
    BadEnumValue,
    DuplicateEnumValue,
    OptionalWithDefault,
    DefaultWithArray,
    DuplicateComparisonOrder,
    BadCommandNamespace,
    MissingCommandType,
    DuplicateField,
    ChainedStructNotStruct,
    ChainedTypeNotChain,
    ChainedTypeWithStrict,
    ChainedImmutableStruct,
    ChainedFieldConflict,
    BadVariantAlternative,
    VariantOverlap,
    VariantMultipleStructs,
    VariantCompared,
    DocSequenceNotArrayOfStruct,
    DocSequenceNotCommand,
    ArrayOfAny,
    ImportNotFound,
    ImportFailed,
    BadSetAt,
    BadArgVartype,
    BadSource,
    BadDuplicateBehavior,
    BadPositional,
    ServerParameterStorage,
    ValidatorOnNonNumeric,
    ChainedStructWithArray,
}

impl ErrorId {
    pub fn code(self) -> &'static str {
        match self {
            ErrorId::Syntax => "ID0001",
            ErrorId::UnknownNode => "ID0002",
            ErrorId::DuplicateNode => "ID0003",
            ErrorId::IsNodeTypeScalar => "ID0004",
            ErrorId::IsNodeTypeSequence => "ID0005",
            ErrorId::IsNodeTypeBlock => "ID0006",
            ErrorId::MissingRequiredField => "ID0007",
            ErrorId::IsNodeValidBool => "ID0008",
            ErrorId::IsNodeValidInt => "ID0009",
            ErrorId::DuplicateSymbol => "ID0010",
            ErrorId::UnknownType => "ID0011",
            ErrorId::ArrayOfArray => "ID0012",
            ErrorId::BadBsonType => "ID0013",
            ErrorId::BadBsonTypeCombination => "ID0014",
            ErrorId::BadBinDataSubtypeValue => "ID0015",
            ErrorId::BadBinDataSubtype => "ID0016",
            ErrorId::MissingBinDataSubtype => "ID0017",
            ErrorId::MissingAstRequiredField => "ID0018",
            ErrorId::BadAnyTypeUse => "ID0019",
            ErrorId::BadEnumType => "ID0020",
            ErrorId::BadEnumValue => "ID0021",
            ErrorId::DuplicateEnumValue => "ID0022",
            ErrorId::OptionalWithDefault => "ID0023",
            ErrorId::DefaultWithArray => "ID0024",
            ErrorId::DuplicateComparisonOrder => "ID0025",
            ErrorId::BadCommandNamespace => "ID0026",
            ErrorId::MissingCommandType => "ID0027",
            ErrorId::DuplicateField => "ID0028",
            ErrorId::ChainedStructNotStruct => "ID0029",
            ErrorId::ChainedTypeNotChain => "ID0030",
            ErrorId::ChainedTypeWithStrict => "ID0031",
            ErrorId::ChainedImmutableStruct => "ID0032",
            ErrorId::ChainedFieldConflict => "ID0033",
            ErrorId::BadVariantAlternative => "ID0034",
            ErrorId::VariantOverlap => "ID0035",
            ErrorId::VariantMultipleStructs => "ID0036",
            ErrorId::VariantCompared => "ID0037",
            ErrorId::DocSequenceNotArrayOfStruct => "ID0038",
            ErrorId::DocSequenceNotCommand => "ID0039",
            ErrorId::ArrayOfAny => "ID0040",
            ErrorId::ImportNotFound => "ID0041",
            ErrorId::ImportFailed => "ID0042",
            ErrorId::BadSetAt => "ID0043",
            ErrorId::BadArgVartype => "ID0044",
            ErrorId::BadSource => "ID0045",
            ErrorId::BadDuplicateBehavior => "ID0046",
            ErrorId::BadPositional => "ID0047",
            ErrorId::ServerParameterStorage => "ID0048",
            ErrorId::ValidatorOnNonNumeric => "ID0049",
            ErrorId::ChainedStructWithArray => "ID0050",
        }
    }
}

impl fmt::Display for ErrorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for ErrorId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

/// A single diagnostic with its source position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParserError {
    pub error_id:  ErrorId,
    pub msg:       String,
    pub file_name: String,
    pub line:      usize,
    pub column:    usize,
}

impl fmt::Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: error: {}: {}",
            self.file_name, self.line, self.column, self.error_id, self.msg
        )
    }
}

/// Every diagnostic found while parsing and binding one input.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorCollection {
    errors: Vec<ParserError>,
}

impl ErrorCollection {
    pub fn new() -> ErrorCollection {
        ErrorCollection::default()
    }

    pub fn add(&mut self, error: ParserError) {
        tracing::debug!("{}", error);
        self.errors.push(error);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn count(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[ParserError] {
        &self.errors
    }

    pub fn contains(&self, error_id: ErrorId) -> bool {
        self.errors.iter().any(|e| e.error_id == error_id)
    }

    pub fn extend(&mut self, other: ErrorCollection) {
        self.errors.extend(other.errors);
    }

    /// One formatted line per error.
    pub fn to_list(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.to_string()).collect()
    }
}

impl fmt::Display for ErrorCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_list().join("\n"))
    }
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}, column {column}: {msg}")]
    ParseError {
        msg:    String,
        line:   usize,
        column: usize,
    },

    #[error("{0}")]
    Schema(ErrorCollection),

    #[error("Generation error: {0}")]
    Generate(String),

    #[error("Compilation aborted: {0}")]
    Abort(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_file_position_and_code() {
        let mut errors = ErrorCollection::new();
        errors.add(ParserError {
            error_id:  ErrorId::UnknownType,
            msg:       "'foo' is not a known type".to_owned(),
            file_name: "a.idl".to_owned(),
            line:      3,
            column:    9,
        });
        assert!(errors.has_errors());
        assert!(errors.contains(ErrorId::UnknownType));
        assert!(!errors.contains(ErrorId::Syntax));
        assert_eq!(
            errors.to_string(),
            "a.idl:3:9: error: ID0011: 'foo' is not a known type"
        );
    }

    #[test]
    fn codes_are_unique() {
        let ids = [
            ErrorId::Syntax,
            ErrorId::UnknownNode,
            ErrorId::DuplicateSymbol,
            ErrorId::ValidatorOnNonNumeric,
            ErrorId::ImportNotFound,
        ];
        let mut codes: Vec<_> = ids.iter().map(|id| id.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), ids.len());
    }
}
