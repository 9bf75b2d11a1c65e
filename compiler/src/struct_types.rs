//! The per-kind parts of struct code generation.
//!
//! Plain structs and the three command flavours differ in their constructor
//! arguments, extra members, method signatures and in how the first element
//! of a command document is read and written. Everything else is shared and
//! lives in the generator.

use crate::ast::{Command, Field, Namespace, Struct};
use crate::error::CompileError;
use crate::generator::{write_field_value_parse, write_value_serializer, ElementSource};
use crate::rust_types::get_rust_type;
use crate::writer::IndentedTextWriter;

/// A generated method: enough to print its signature or a call to it.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    pub name:        String,
    pub receiver:    Option<&'static str>,
    /// `name: Type` pairs.
    pub args:        Vec<(String, String)>,
    pub return_type: Option<String>,
    pub public:      bool,
}

impl MethodInfo {
    fn new(name: &str, receiver: Option<&'static str>, public: bool) -> MethodInfo {
        MethodInfo {
            name: name.to_owned(),
            receiver,
            args: Vec::new(),
            return_type: None,
            public,
        }
    }

    fn arg(mut self, name: &str, rust_type: &str) -> MethodInfo {
        self.args.push((name.to_owned(), rust_type.to_owned()));
        self
    }

    fn returns(mut self, rust_type: &str) -> MethodInfo {
        self.return_type = Some(rust_type.to_owned());
        self
    }

    /// `pub fn name(&self, a: A) -> R`, without the opening brace.
    pub fn signature(&self) -> String {
        let mut params: Vec<String> = self.receiver.iter().map(|r| r.to_string()).collect();
        params.extend(self.args.iter().map(|(name, rust_type)| format!("{}: {}", name, rust_type)));
        let visibility = if self.public { "pub " } else { "" };
        match &self.return_type {
            Some(return_type) => format!(
                "{}fn {}({}) -> {}",
                visibility,
                self.name,
                params.join(", "),
                return_type
            ),
            None => format!("{}fn {}({})", visibility, self.name, params.join(", ")),
        }
    }

    /// A call through `target` (`self`, `object`, or `Self` for associated
    /// functions) with `args` in order.
    pub fn call(&self, target: &str, args: &[&str]) -> String {
        let separator = if self.receiver.is_some() { "." } else { "::" };
        format!("{}{}{}({})", target, separator, self.name, args.join(", "))
    }
}

/// A member that only commands have, outside the field list.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandMember {
    pub name:      &'static str,
    pub rust_type: &'static str,
    pub getter:    &'static str,
}

#[derive(Debug, Clone, Copy)]
pub enum StructTypeInfo<'a> {
    Plain(&'a Struct),
    IgnoredCommand(&'a Struct, &'a Command),
    CommandWithNamespace {
        s:       &'a Struct,
        command: &'a Command,
        or_uuid: bool,
    },
    CommandFromType {
        s:       &'a Struct,
        command: &'a Command,
        field:   &'a Field,
    },
}

impl<'a> StructTypeInfo<'a> {
    pub fn new(s: &'a Struct) -> Result<StructTypeInfo<'a>, CompileError> {
        let Some(command) = &s.command else {
            return Ok(StructTypeInfo::Plain(s));
        };
        Ok(match command.namespace {
            Namespace::Ignored => StructTypeInfo::IgnoredCommand(s, command),
            Namespace::ConcatenateWithDb => StructTypeInfo::CommandWithNamespace {
                s,
                command,
                or_uuid: false,
            },
            Namespace::ConcatenateWithDbOrUuid => StructTypeInfo::CommandWithNamespace {
                s,
                command,
                or_uuid: true,
            },
            Namespace::Type => {
                let field = command.command_field.as_ref().ok_or_else(|| {
                    CompileError::Generate(format!(
                        "command '{}' has namespace 'type' but no command field",
                        command.command_name
                    ))
                })?;
                StructTypeInfo::CommandFromType { s, command, field }
            }
        })
    }

    pub fn target(&self) -> &'a Struct {
        match *self {
            StructTypeInfo::Plain(s)
            | StructTypeInfo::IgnoredCommand(s, _)
            | StructTypeInfo::CommandWithNamespace { s, .. }
            | StructTypeInfo::CommandFromType { s, .. } => s,
        }
    }

    pub fn command(&self) -> Option<&'a Command> {
        match *self {
            StructTypeInfo::Plain(_) => None,
            StructTypeInfo::IgnoredCommand(_, command)
            | StructTypeInfo::CommandWithNamespace { command, .. }
            | StructTypeInfo::CommandFromType { command, .. } => Some(command),
        }
    }

    pub fn is_command(&self) -> bool {
        self.command().is_some()
    }

    /// The namespace member, if this command has one.
    pub fn command_member(&self) -> Option<CommandMember> {
        match self {
            StructTypeInfo::CommandWithNamespace { or_uuid: false, .. } => Some(CommandMember {
                name:      "nss",
                rust_type: "NamespaceString",
                getter:    "namespace",
            }),
            StructTypeInfo::CommandWithNamespace { or_uuid: true, .. } => Some(CommandMember {
                name:      "nss_or_uuid",
                rust_type: "NamespaceStringOrUuid",
                getter:    "namespace_or_uuid",
            }),
            _ => None,
        }
    }

    /// The command parameter field of a `type` command.
    pub fn command_field(&self) -> Option<&'a Field> {
        match *self {
            StructTypeInfo::CommandFromType { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Arguments `new` takes: the namespace or the command parameter.
    pub fn constructor_args(&self) -> Vec<(String, String)> {
        if let Some(member) = self.command_member() {
            return vec![(member.name.to_owned(), member.rust_type.to_owned())];
        }
        match self.command_field() {
            Some(field) => vec![(field.rust_name.clone(), get_rust_type(field).storage_type())],
            None => Vec::new(),
        }
    }

    /// Statements `new` runs before building the struct, and the initial
    /// value of the `$db` field when the namespace supplies it.
    pub fn db_name_from_constructor(&self) -> Option<(String, &'static str)> {
        self.command_member().map(|member| {
            (
                format!("let db_name = {}.db().to_owned();", member.name),
                "db_name",
            )
        })
    }

    pub fn deserializer_method(&self) -> MethodInfo {
        MethodInfo::new("parse", None, true)
            .arg("ctxt", "&ParserContext")
            .arg("bson_object", "&Document")
            .returns(&format!("Result<{}, IdlError>", self.target().rust_name))
    }

    pub fn parse_protected_method(&self) -> MethodInfo {
        let method = MethodInfo::new("parse_protected", Some("&mut self"), false)
            .arg("ctxt", "&ParserContext")
            .arg("bson_object", "&Document");
        let method = if self.is_command() {
            method.arg("sequences", "&[DocumentSequence]")
        } else {
            method
        };
        method.returns("Result<(), IdlError>")
    }

    pub fn op_msg_deserializer_method(&self) -> Option<MethodInfo> {
        self.is_command().then(|| {
            MethodInfo::new("parse_op_msg_request", None, true)
                .arg("ctxt", "&ParserContext")
                .arg("request", "&OpMsgRequest")
                .returns(&format!("Result<{}, IdlError>", self.target().rust_name))
        })
    }

    pub fn serializer_method(&self) -> MethodInfo {
        let method = MethodInfo::new("serialize", Some("&self"), true);
        if self.is_command() {
            method
                .arg("command_passthrough_fields", "&Document")
                .arg("builder", "&mut Document")
        } else {
            method.arg("builder", "&mut Document")
        }
    }

    pub fn to_bson_method(&self) -> MethodInfo {
        let method = MethodInfo::new("to_bson", Some("&self"), true);
        let method = if self.is_command() {
            method.arg("command_passthrough_fields", "&Document")
        } else {
            method
        };
        method.returns("Document")
    }

    pub fn op_msg_serializer_method(&self) -> Option<MethodInfo> {
        self.is_command().then(|| {
            MethodInfo::new("serialize_op_msg_request", Some("&self"), true)
                .arg("command_passthrough_fields", "&Document")
                .returns("OpMsgRequest")
        })
    }

    /// Arguments to pass through when one serializer calls the other.
    pub fn serializer_call_args(&self) -> Vec<&'static str> {
        if self.is_command() {
            vec!["command_passthrough_fields"]
        } else {
            Vec::new()
        }
    }

    /// Takes the command element off the front of the document before the
    /// field loop. Returns the expression the loop iterates over.
    pub fn write_command_element_capture(&self, w: &mut IndentedTextWriter) -> &'static str {
        match self {
            StructTypeInfo::Plain(_) => "bson_object.iter()",
            StructTypeInfo::IgnoredCommand(..) => {
                w.write_line("let mut elements = bson_object.iter();");
                w.write_line("elements.next();");
                w.write_empty_line();
                "elements"
            }
            StructTypeInfo::CommandWithNamespace { .. } | StructTypeInfo::CommandFromType { .. } => {
                w.write_line("let mut elements = bson_object.iter();");
                w.write_line("let command_element = elements.next().map(|(_, element)| element);");
                w.write_empty_line();
                "elements"
            }
        }
    }

    pub fn write_command_element_serializer(
        &self,
        w: &mut IndentedTextWriter,
    ) -> Result<(), CompileError> {
        match self {
            StructTypeInfo::Plain(_) => {}
            StructTypeInfo::IgnoredCommand(..) => {
                w.write_line("builder.append(Self::COMMAND_NAME, 1i32);");
            }
            StructTypeInfo::CommandWithNamespace { or_uuid: false, .. } => {
                w.write_line("builder.append(Self::COMMAND_NAME, self.nss.coll());");
            }
            StructTypeInfo::CommandWithNamespace { or_uuid: true, .. } => {
                w.block("match &self.nss_or_uuid {", "}", |w| {
                    w.write_line(
                        "NamespaceStringOrUuid::Nss(nss) => builder.append(Self::COMMAND_NAME, nss.coll()),",
                    );
                    w.block("NamespaceStringOrUuid::Uuid { uuid, .. } => {", "}", |w| {
                        w.write_line(
                            "builder.append(Self::COMMAND_NAME, BinData::new(BinDataSubtype::Uuid, uuid.clone()));",
                        );
                        Ok(())
                    })
                })?;
            }
            StructTypeInfo::CommandFromType { field, .. } => {
                write_value_serializer(w, field, "Self::COMMAND_NAME", &format!("self.{}", field.rust_name))?;
            }
        }
        Ok(())
    }

    /// Reads the command element once `$db` is known. For `type` commands the
    /// element is decoded like any other field value.
    pub fn write_namespace_check(&self, w: &mut IndentedTextWriter) -> Result<(), CompileError> {
        match self {
            StructTypeInfo::Plain(_) | StructTypeInfo::IgnoredCommand(..) => Ok(()),
            StructTypeInfo::CommandWithNamespace { or_uuid, .. } => {
                w.block("if let Some(command_element) = command_element {", "}", |w| {
                    if *or_uuid {
                        w.write_line(
                            "self.nss_or_uuid = ctxt.parse_ns_or_uuid(&self.db_name, command_element)?;",
                        );
                    } else {
                        w.write_line(
                            "self.nss = ctxt.parse_ns_collection_required(&self.db_name, command_element)?;",
                        );
                    }
                    Ok(())
                })?;
                w.write_empty_line();
                Ok(())
            }
            StructTypeInfo::CommandFromType { field, .. } => {
                w.block("if let Some(command_element) = command_element {", "}", |w| {
                    let source = ElementSource {
                        ctxt:       "ctxt",
                        ctxt_ref:   "ctxt",
                        field_name: "Self::COMMAND_NAME",
                        element:    "command_element",
                        child_name: "Self::COMMAND_NAME",
                    };
                    let local = write_field_value_parse(w, field, &source)?;
                    w.write_line(format!("self.{} = {};", field.rust_name, local));
                    Ok(())
                })?;
                w.write_empty_line();
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_signatures_and_calls() {
        let method = MethodInfo::new("serialize", Some("&self"), true)
            .arg("command_passthrough_fields", "&Document")
            .arg("builder", "&mut Document");
        assert_eq!(
            method.signature(),
            "pub fn serialize(&self, command_passthrough_fields: &Document, builder: &mut Document)"
        );
        assert_eq!(
            method.call("self", &["command_passthrough_fields", "&mut builder"]),
            "self.serialize(command_passthrough_fields, &mut builder)"
        );

        let parse = MethodInfo::new("parse", None, true)
            .arg("ctxt", "&ParserContext")
            .returns("Result<Point, IdlError>");
        assert_eq!(
            parse.signature(),
            "pub fn parse(ctxt: &ParserContext) -> Result<Point, IdlError>"
        );
        assert_eq!(parse.call("Point", &["ctxt"]), "Point::parse(ctxt)");
    }

    #[test]
    fn private_methods_have_no_visibility() {
        let method = MethodInfo::new("parse_protected", Some("&mut self"), false)
            .returns("Result<(), IdlError>");
        assert_eq!(method.signature(), "fn parse_protected(&mut self) -> Result<(), IdlError>");
    }
}
