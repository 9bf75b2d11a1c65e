use crate::error::{ErrorCollection, ErrorId, ParserError};
use crate::nodes::Node;
use crate::syntax::SourceLocation;

/// Collects diagnostics for one file while it is parsed and bound.
pub struct ParserContext<'a> {
    file_name: String,
    errors:    &'a mut ErrorCollection,
}

impl<'a> ParserContext<'a> {
    pub fn new(file_name: &str, errors: &'a mut ErrorCollection) -> ParserContext<'a> {
        ParserContext {
            file_name: file_name.to_owned(),
            errors,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn location(&self, node: &Node) -> SourceLocation {
        SourceLocation {
            file_name: self.file_name.clone(),
            line:      node.line,
            column:    node.column,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.errors.has_errors()
    }

    pub fn error_count(&self) -> usize {
        self.errors.count()
    }

    pub fn add_error(&mut self, error_id: ErrorId, location: &SourceLocation, msg: String) {
        self.errors.add(ParserError {
            error_id,
            msg,
            file_name: location.file_name.clone(),
            line: location.line,
            column: location.column,
        });
    }

    fn add_node_error(&mut self, error_id: ErrorId, node: &Node, msg: String) {
        let location = self.location(node);
        self.add_error(error_id, &location, msg);
    }

    pub fn add_syntax_error(&mut self, msg: &str, line: usize, column: usize) {
        let location = SourceLocation {
            file_name: self.file_name.clone(),
            line,
            column,
        };
        self.add_error(ErrorId::Syntax, &location, msg.to_owned());
    }

    pub fn add_unknown_node_error(&mut self, node: &Node, parent: &str) {
        self.add_node_error(
            ErrorId::UnknownNode,
            node,
            format!("Unknown IDL node '{}' for IDL type '{}'", node.key, parent),
        );
    }

    pub fn add_duplicate_node_error(&mut self, node: &Node, parent: &str) {
        self.add_node_error(
            ErrorId::DuplicateNode,
            node,
            format!("Duplicate node found for '{}' in '{}'", node.key, parent),
        );
    }

    pub fn add_expected_scalar_error(&mut self, node: &Node) {
        self.add_node_error(
            ErrorId::IsNodeTypeScalar,
            node,
            format!("Illegal node type '{}' for '{}', expected a scalar", node.kind_name(), node.key),
        );
    }

    pub fn add_expected_sequence_error(&mut self, node: &Node) {
        self.add_node_error(
            ErrorId::IsNodeTypeSequence,
            node,
            format!("Illegal node type '{}' for '{}', expected a scalar or list", node.kind_name(), node.key),
        );
    }

    pub fn add_expected_block_error(&mut self, node: &Node) {
        self.add_node_error(
            ErrorId::IsNodeTypeBlock,
            node,
            format!("Illegal node type '{}' for '{}', expected a block", node.kind_name(), node.key),
        );
    }

    pub fn add_missing_name_error(&mut self, node: &Node) {
        self.add_node_error(
            ErrorId::MissingRequiredField,
            node,
            format!("IDL node '{}' requires a name", node.key),
        );
    }

    pub fn add_missing_required_field_error(&mut self, node: &Node, parent: &str, field: &str) {
        self.add_node_error(
            ErrorId::MissingRequiredField,
            node,
            format!("IDL node '{}' is missing required scalar '{}'", parent, field),
        );
    }

    pub fn add_bad_bool_error(&mut self, node: &Node, value: &str) {
        self.add_node_error(
            ErrorId::IsNodeValidBool,
            node,
            format!("Illegal bool value for '{}', expected 'true' or 'false' but found '{}'", node.key, value),
        );
    }

    pub fn add_bad_int_error(&mut self, node: &Node, value: &str) {
        self.add_node_error(
            ErrorId::IsNodeValidInt,
            node,
            format!("Illegal integer value for '{}', found '{}'", node.key, value),
        );
    }

    pub fn add_duplicate_symbol_error(
        &mut self,
        location: &SourceLocation,
        name: &str,
        kind: &str,
        previous_kind: &str,
    ) {
        self.add_error(
            ErrorId::DuplicateSymbol,
            location,
            format!("{} '{}' is a duplicate symbol of an existing {}", kind, name, previous_kind),
        );
    }

    pub fn add_unknown_type_error(&mut self, location: &SourceLocation, field_name: &str, type_name: &str) {
        self.add_error(
            ErrorId::UnknownType,
            location,
            format!("'{}' is an unknown type for field '{}'", type_name, field_name),
        );
    }

    pub fn add_import_not_found_error(&mut self, location: &SourceLocation, import: &str) {
        self.add_error(
            ErrorId::ImportNotFound,
            location,
            format!("Could not resolve import '{}', file not found", import),
        );
    }

    pub fn add_import_failed_error(&mut self, location: &SourceLocation, import: &str, reason: &str) {
        self.add_error(
            ErrorId::ImportFailed,
            location,
            format!("Could not read import '{}': {}", import, reason),
        );
    }
}
