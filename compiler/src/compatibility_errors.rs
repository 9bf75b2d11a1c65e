//! Diagnostics for the compatibility checker.
//!
//! Unlike parse errors these never stop the walk. Every incompatibility is
//! recorded and the caller decides what to do with the whole collection.

use serde::Serialize;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::error::ErrorCollection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CompatibilityErrorId {
    CommandInvalidApiVersion,
    DuplicateCommandName,
    RemovedCommand,
    RemovedCommandParameter,
    AddedRequiredCommandParameter,
    CommandParameterUnstable,
    CommandParameterStableRequired,
    CommandParameterRequired,
    CommandParameterContainsValidator,
    CommandParameterValidatorsNotEqual,
    CommandParameterTypeNotSuperset,
    NewCommandParameterTypeBsonSerializationTypeAny,
    OldCommandParameterTypeBsonSerializationTypeAny,
    CommandParameterRustTypeNotEqual,
    NewCommandParameterTypeEnumOrStruct,
    NewCommandParameterTypeNotEnum,
    NewCommandParameterTypeNotStruct,
    NewCommandParameterTypeNotVariant,
    NewCommandParameterVariantTypeNotSuperset,
    NewCommandTypeFieldMissing,
    NewCommandTypeFieldAddedRequired,
    NewCommandTypeFieldUnstable,
    NewCommandTypeFieldStableRequired,
    NewCommandTypeFieldRequired,
    CommandTypeContainsValidator,
    CommandTypeValidatorsNotEqual,
    CommandTypeNotSuperset,
    NewCommandTypeBsonSerializationTypeAny,
    OldCommandTypeBsonSerializationTypeAny,
    CommandTypeRustTypeNotEqual,
    NewCommandTypeEnumOrStruct,
    NewCommandTypeNotEnum,
    NewCommandTypeNotStruct,
    NewCommandTypeNotVariant,
    NewCommandTypeVariantTypeNotSuperset,
    NewNamespaceIncompatible,
    NewReplyFieldMissing,
    NewReplyFieldUnstable,
    NewReplyFieldOptional,
    ReplyFieldContainsValidator,
    ReplyFieldValidatorsNotEqual,
    CommandNotSubset,
    NewReplyFieldBsonSerializationTypeAny,
    OldReplyFieldBsonSerializationTypeAny,
    ReplyFieldRustTypeNotEqual,
    ReplyFieldSerializerNotEqual,
    NewReplyFieldTypeEnumOrStruct,
    NewReplyFieldTypeNotEnum,
    NewReplyFieldTypeNotStruct,
    NewReplyFieldVariantType,
    NewReplyFieldVariantTypeNotSubset,
    UnresolvedFieldType,
    MissingErrorReply,
}

impl CompatibilityErrorId {
    pub fn code(self) -> &'static str {
        use CompatibilityErrorId::*;
        match self {
            CommandInvalidApiVersion => "ID0001",
            DuplicateCommandName => "ID0002",
            RemovedCommand => "ID0003",
            RemovedCommandParameter => "ID0004",
            AddedRequiredCommandParameter => "ID0005",
            CommandParameterUnstable => "ID0006",
            CommandParameterStableRequired => "ID0007",
            CommandParameterRequired => "ID0008",
            CommandParameterContainsValidator => "ID0009",
            CommandParameterValidatorsNotEqual => "ID0010",
            CommandParameterTypeNotSuperset => "ID0011",
            NewCommandParameterTypeBsonSerializationTypeAny => "ID0012",
            OldCommandParameterTypeBsonSerializationTypeAny => "ID0013",
            CommandParameterRustTypeNotEqual => "ID0014",
            NewCommandParameterTypeEnumOrStruct => "ID0015",
            NewCommandParameterTypeNotEnum => "ID0016",
            NewCommandParameterTypeNotStruct => "ID0017",
            NewCommandParameterTypeNotVariant => "ID0018",
            NewCommandParameterVariantTypeNotSuperset => "ID0019",
            NewCommandTypeFieldMissing => "ID0020",
            NewCommandTypeFieldAddedRequired => "ID0021",
            NewCommandTypeFieldUnstable => "ID0022",
            NewCommandTypeFieldStableRequired => "ID0023",
            NewCommandTypeFieldRequired => "ID0024",
            CommandTypeContainsValidator => "ID0025",
            CommandTypeValidatorsNotEqual => "ID0026",
            CommandTypeNotSuperset => "ID0027",
            NewCommandTypeBsonSerializationTypeAny => "ID0028",
            OldCommandTypeBsonSerializationTypeAny => "ID0029",
            CommandTypeRustTypeNotEqual => "ID0030",
            NewCommandTypeEnumOrStruct => "ID0031",
            NewCommandTypeNotEnum => "ID0032",
            NewCommandTypeNotStruct => "ID0033",
            NewCommandTypeNotVariant => "ID0034",
            NewCommandTypeVariantTypeNotSuperset => "ID0035",
            NewNamespaceIncompatible => "ID0036",
            NewReplyFieldMissing => "ID0037",
            NewReplyFieldUnstable => "ID0038",
            NewReplyFieldOptional => "ID0039",
            ReplyFieldContainsValidator => "ID0040",
            ReplyFieldValidatorsNotEqual => "ID0041",
            CommandNotSubset => "ID0042",
            NewReplyFieldBsonSerializationTypeAny => "ID0043",
            OldReplyFieldBsonSerializationTypeAny => "ID0044",
            ReplyFieldRustTypeNotEqual => "ID0045",
            ReplyFieldSerializerNotEqual => "ID0046",
            NewReplyFieldTypeEnumOrStruct => "ID0047",
            NewReplyFieldTypeNotEnum => "ID0048",
            NewReplyFieldTypeNotStruct => "ID0049",
            NewReplyFieldVariantType => "ID0050",
            NewReplyFieldVariantTypeNotSubset => "ID0051",
            UnresolvedFieldType => "ID0052",
            MissingErrorReply => "ID0053",
        }
    }
}

impl fmt::Display for CompatibilityErrorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for CompatibilityErrorId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompatibilityError {
    pub error_id:     CompatibilityErrorId,
    pub command_name: String,
    pub msg:          String,
    /// The file the offending definition was found in.
    pub file:         PathBuf,
}

impl fmt::Display for CompatibilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}: {}: {}",
            self.file.display(),
            self.command_name,
            self.error_id,
            self.msg
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompatibilityErrorCollection {
    errors: Vec<CompatibilityError>,
}

impl CompatibilityErrorCollection {
    pub fn new() -> CompatibilityErrorCollection {
        CompatibilityErrorCollection::default()
    }

    pub fn add(&mut self, error_id: CompatibilityErrorId, command_name: &str, msg: String, file: &Path) {
        let error = CompatibilityError {
            error_id,
            command_name: command_name.to_owned(),
            msg,
            file: file.to_path_buf(),
        };
        tracing::debug!("{}", error);
        self.errors.push(error);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn count(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[CompatibilityError] {
        &self.errors
    }

    pub fn get_error_by_command_name(&self, command_name: &str) -> Option<&CompatibilityError> {
        self.errors.iter().find(|e| e.command_name == command_name)
    }

    pub fn get_error_by_error_id(&self, error_id: CompatibilityErrorId) -> Option<&CompatibilityError> {
        self.errors.iter().find(|e| e.error_id == error_id)
    }

    pub fn get_all_errors_by_command_name(&self, command_name: &str) -> Vec<&CompatibilityError> {
        self.errors.iter().filter(|e| e.command_name == command_name).collect()
    }

    pub fn extend(&mut self, other: CompatibilityErrorCollection) {
        self.errors.extend(other.errors);
    }

    /// One line per error, then the count.
    pub fn dump_errors(&self, out: &mut dyn io::Write) -> io::Result<()> {
        for error in &self.errors {
            writeln!(out, "{}", error)?;
        }
        writeln!(out, "Found {} compatibility errors", self.errors.len())
    }
}

/// Conditions under which comparing the two trees makes no sense.
#[derive(Debug, Error)]
pub enum CompatibilityAbort {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to scan directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("{} has schema errors:\n{errors}", .path.display())]
    Schema { path: PathBuf, errors: ErrorCollection },

    #[error("{}: {command_name}: cannot resolve {what} '{type_name}'", .file.display())]
    UnresolvedType {
        file:         PathBuf,
        command_name: String,
        what:         &'static str,
        type_name:    String,
        /// Everything recorded before the walk stopped.
        collected:    CompatibilityErrorCollection,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_lists_errors_and_count() {
        let mut errors = CompatibilityErrorCollection::new();
        errors.add(
            CompatibilityErrorId::RemovedCommand,
            "find",
            "'find' was removed".to_owned(),
            Path::new("old/find.idl"),
        );
        assert_eq!(
            errors.get_error_by_command_name("find").map(|e| e.error_id),
            Some(CompatibilityErrorId::RemovedCommand)
        );
        assert!(errors.get_error_by_error_id(CompatibilityErrorId::CommandNotSubset).is_none());

        let mut out = Vec::new();
        errors.dump_errors(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "old/find.idl: find: ID0003: 'find' was removed\nFound 1 compatibility errors\n"
        );
    }
}
