//! Checks that a new tree of IDL files can serve every client of an old one.
//!
//! Parameters are contravariant: the new schema must accept everything the
//! old one accepted. Replies are covariant: the new schema may only send
//! what old clients can parse. Every rule below follows from that.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::bson::ANY;
use crate::compatibility_errors::{
    CompatibilityAbort, CompatibilityErrorCollection, CompatibilityErrorId as Id,
};
use crate::imports::FileImportResolver;
use crate::parser::parse;
use crate::syntax::{
    Command, Field, IdlSpec, Namespace, ResolvedFieldType, ResolvedType, Struct,
    SymbolTable, Type,
};

/// Fields allowed to stay at bson type `any`, as `<command>-param-<name>` or
/// `<command>-reply-<field>`.
pub const ALLOW_ANY_TYPE_LIST: &[&str] = &[
    "aggregate-param-hint",
    "count-param-hint",
    "delete-param-hint",
    "explain-param-explain",
    "find-param-hint",
    "findAndModify-param-hint",
    "saslContinue-param-payload",
    "saslContinue-reply-payload",
    "saslStart-param-payload",
    "saslStart-reply-payload",
    "update-param-hint",
];

const ERROR_REPLY: &str = "ErrorReply";
const NO_COMMAND: &str = "n/a";

/// One parsed file from a scanned tree.
#[derive(Debug)]
pub struct ParsedFile {
    pub path: PathBuf,
    pub spec: IdlSpec,
}

/// Parses every `.idl` file under `dir`, in file name order.
pub fn parse_directory(dir: &Path, import_dirs: &[PathBuf]) -> Result<Vec<ParsedFile>, CompatibilityAbort> {
    let resolver = FileImportResolver::new(import_dirs.to_vec());
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().map_or(true, |ext| ext != "idl") {
            continue;
        }
        let text = fs::read_to_string(path).map_err(|source| CompatibilityAbort::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("parsing {}", path.display());
        let spec = parse(&text, &path.to_string_lossy(), &resolver).map_err(|errors| {
            CompatibilityAbort::Schema {
                path: path.to_path_buf(),
                errors,
            }
        })?;
        files.push(ParsedFile {
            path: path.to_path_buf(),
            spec,
        });
    }
    tracing::info!("parsed {} files under {}", files.len(), dir.display());
    Ok(files)
}

/// A definition together with the file and symbols it resolves against.
#[derive(Debug, Clone, Copy)]
struct Located<'a, T> {
    file:    &'a Path,
    symbols: &'a SymbolTable,
    item:    &'a T,
}

/// The two sides of one comparison.
#[derive(Debug, Clone, Copy)]
struct Sides<'a> {
    command:     &'a str,
    old_file:    &'a Path,
    new_file:    &'a Path,
    old_symbols: &'a SymbolTable,
    new_symbols: &'a SymbolTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Direction {
    Parameter,
    CommandType,
    Reply,
}

/// Field-level error ids for the two parameter-like directions.
struct FieldIds {
    missing:              Id,
    added_required:       Id,
    unstable:             Id,
    stable_required:      Id,
    required:             Id,
    contains_validator:   Id,
    validators_not_equal: Id,
}

/// Type-level error ids for one direction.
struct TypeIds {
    not_compatible:       Id,
    new_any:              Id,
    old_any:              Id,
    rust_type_not_equal:  Id,
    enum_or_struct:       Id,
    not_enum:             Id,
    not_struct:           Id,
    variant:              Id,
    variant_alternatives: Id,
}

impl Direction {
    fn field_ids(self) -> FieldIds {
        match self {
            Direction::CommandType => FieldIds {
                missing:              Id::NewCommandTypeFieldMissing,
                added_required:       Id::NewCommandTypeFieldAddedRequired,
                unstable:             Id::NewCommandTypeFieldUnstable,
                stable_required:      Id::NewCommandTypeFieldStableRequired,
                required:             Id::NewCommandTypeFieldRequired,
                contains_validator:   Id::CommandTypeContainsValidator,
                validators_not_equal: Id::CommandTypeValidatorsNotEqual,
            },
            _ => FieldIds {
                missing:              Id::RemovedCommandParameter,
                added_required:       Id::AddedRequiredCommandParameter,
                unstable:             Id::CommandParameterUnstable,
                stable_required:      Id::CommandParameterStableRequired,
                required:             Id::CommandParameterRequired,
                contains_validator:   Id::CommandParameterContainsValidator,
                validators_not_equal: Id::CommandParameterValidatorsNotEqual,
            },
        }
    }

    fn type_ids(self) -> TypeIds {
        match self {
            Direction::Parameter => TypeIds {
                not_compatible:       Id::CommandParameterTypeNotSuperset,
                new_any:              Id::NewCommandParameterTypeBsonSerializationTypeAny,
                old_any:              Id::OldCommandParameterTypeBsonSerializationTypeAny,
                rust_type_not_equal:  Id::CommandParameterRustTypeNotEqual,
                enum_or_struct:       Id::NewCommandParameterTypeEnumOrStruct,
                not_enum:             Id::NewCommandParameterTypeNotEnum,
                not_struct:           Id::NewCommandParameterTypeNotStruct,
                variant:              Id::NewCommandParameterTypeNotVariant,
                variant_alternatives: Id::NewCommandParameterVariantTypeNotSuperset,
            },
            Direction::CommandType => TypeIds {
                not_compatible:       Id::CommandTypeNotSuperset,
                new_any:              Id::NewCommandTypeBsonSerializationTypeAny,
                old_any:              Id::OldCommandTypeBsonSerializationTypeAny,
                rust_type_not_equal:  Id::CommandTypeRustTypeNotEqual,
                enum_or_struct:       Id::NewCommandTypeEnumOrStruct,
                not_enum:             Id::NewCommandTypeNotEnum,
                not_struct:           Id::NewCommandTypeNotStruct,
                variant:              Id::NewCommandTypeNotVariant,
                variant_alternatives: Id::NewCommandTypeVariantTypeNotSuperset,
            },
            Direction::Reply => TypeIds {
                not_compatible:       Id::CommandNotSubset,
                new_any:              Id::NewReplyFieldBsonSerializationTypeAny,
                old_any:              Id::OldReplyFieldBsonSerializationTypeAny,
                rust_type_not_equal:  Id::ReplyFieldRustTypeNotEqual,
                enum_or_struct:       Id::NewReplyFieldTypeEnumOrStruct,
                not_enum:             Id::NewReplyFieldTypeNotEnum,
                not_struct:           Id::NewReplyFieldTypeNotStruct,
                variant:              Id::NewReplyFieldVariantType,
                variant_alternatives: Id::NewReplyFieldVariantTypeNotSubset,
            },
        }
    }

    fn allow_list_key(self, command: &str, field: &str) -> String {
        match self {
            Direction::Reply => format!("{}-reply-{}", command, field),
            _ => format!("{}-param-{}", command, field),
        }
    }

    /// Whether every `old` item must survive into `new` (parameters) or
    /// every `new` item must already be in `old` (replies).
    fn contains<T: PartialEq>(self, old: &[T], new: &[T]) -> bool {
        match self {
            Direction::Reply => new.iter().all(|n| old.contains(n)),
            _ => old.iter().all(|o| new.contains(o)),
        }
    }
}

/// Errors so far plus the struct pairs already walked for the current
/// command.
#[derive(Debug, Default)]
pub struct CompatibilityContext {
    pub errors: CompatibilityErrorCollection,
    visited:    BTreeSet<(String, String, Direction)>,
}

impl CompatibilityContext {
    pub fn new() -> CompatibilityContext {
        CompatibilityContext::default()
    }

    fn add(&mut self, error_id: Id, sides: &Sides, msg: String) {
        self.errors.add(error_id, sides.command, msg, sides.new_file);
    }

    fn unresolved(&self, file: &Path, command_name: &str, what: &'static str, type_name: &str) -> CompatibilityAbort {
        CompatibilityAbort::UnresolvedType {
            file: file.to_path_buf(),
            command_name: command_name.to_owned(),
            what,
            type_name: type_name.to_owned(),
            collected: self.errors.clone(),
        }
    }
}

fn is_any(t: &Type) -> bool {
    t.bson_serialization_type.iter().any(|tag| tag == ANY)
}

fn check_basic_types(
    ctxt: &mut CompatibilityContext,
    sides: &Sides,
    direction: Direction,
    field: &str,
    old: &Type,
    new: &Type,
) {
    let ids = direction.type_ids();
    match (is_any(old), is_any(new)) {
        (true, true) => {
            let key = direction.allow_list_key(sides.command, field);
            if !ALLOW_ANY_TYPE_LIST.contains(&key.as_str()) {
                ctxt.add(
                    ids.old_any,
                    sides,
                    format!("'{}' has bson type 'any' and is not in the allow list", field),
                );
                return;
            }
            if old.rust_type != new.rust_type {
                ctxt.add(
                    ids.rust_type_not_equal,
                    sides,
                    format!(
                        "'{}' changed rust_type from '{}' to '{}'",
                        field,
                        old.rust_type.as_deref().unwrap_or_default(),
                        new.rust_type.as_deref().unwrap_or_default()
                    ),
                );
            }
            if direction == Direction::Reply && old.serializer != new.serializer {
                ctxt.add(
                    Id::ReplyFieldSerializerNotEqual,
                    sides,
                    format!("'{}' changed its serializer", field),
                );
            }
        }
        (false, true) => ctxt.add(
            ids.new_any,
            sides,
            format!("'{}' changed to bson type 'any' in '{}'", field, new.name),
        ),
        (true, false) => ctxt.add(
            ids.old_any,
            sides,
            format!("'{}' had bson type 'any' in '{}'", field, old.name),
        ),
        (false, false) => {
            if !direction.contains(&old.bson_serialization_type, &new.bson_serialization_type) {
                ctxt.add(
                    ids.not_compatible,
                    sides,
                    format!(
                        "'{}' bson types changed from [{}] to [{}]",
                        field,
                        old.bson_serialization_type.join(", "),
                        new.bson_serialization_type.join(", ")
                    ),
                );
            }
        }
    }
}

/// The single dispatch on the resolved tags of both sides.
fn check_type(
    ctxt: &mut CompatibilityContext,
    sides: &Sides,
    direction: Direction,
    field: &str,
    old: ResolvedType,
    new: ResolvedType,
) {
    let ids = direction.type_ids();
    match (old, new) {
        (ResolvedType::Type(old), ResolvedType::Type(new)) => {
            check_basic_types(ctxt, sides, direction, field, old, new)
        }
        (ResolvedType::Enum(old), ResolvedType::Enum(new)) => {
            let old_values: Vec<&str> = old.values.iter().map(|v| v.value.as_str()).collect();
            let new_values: Vec<&str> = new.values.iter().map(|v| v.value.as_str()).collect();
            if !direction.contains(&old_values, &new_values) {
                ctxt.add(
                    ids.not_compatible,
                    sides,
                    format!(
                        "'{}' enum values changed from [{}] to [{}]",
                        field,
                        old_values.join(", "),
                        new_values.join(", ")
                    ),
                );
            }
        }
        (ResolvedType::Struct(old), ResolvedType::Struct(new)) => {
            let key = (old.name.clone(), new.name.clone(), direction);
            if ctxt.visited.insert(key) {
                check_struct_fields(ctxt, sides, direction, old, new);
            }
        }
        (ResolvedType::Enum(_), new) => ctxt.add(
            ids.not_enum,
            sides,
            format!("'{}' was an enum and is now '{}'", field, new.name()),
        ),
        (ResolvedType::Struct(_), new) => ctxt.add(
            ids.not_struct,
            sides,
            format!("'{}' was a struct and is now '{}'", field, new.name()),
        ),
        (ResolvedType::Type(_), new) => ctxt.add(
            ids.enum_or_struct,
            sides,
            format!("'{}' changed to the enum or struct '{}'", field, new.name()),
        ),
    }
}

/// The alternative in `alternatives` standing in for `wanted`. Structs match
/// any struct since a variant holds at most one.
fn find_alternative<'a>(alternatives: &[ResolvedType<'a>], wanted: &ResolvedType) -> Option<ResolvedType<'a>> {
    alternatives.iter().copied().find(|candidate| match (candidate, wanted) {
        (ResolvedType::Struct(_), ResolvedType::Struct(_)) => true,
        (candidate, wanted) => candidate.name() == wanted.name(),
    })
}

fn check_resolved_types(
    ctxt: &mut CompatibilityContext,
    sides: &Sides,
    direction: Direction,
    field: &str,
    old: &ResolvedFieldType,
    new: &ResolvedFieldType,
) {
    let ids = direction.type_ids();
    let reply = direction == Direction::Reply;
    match (old, new) {
        (ResolvedFieldType::Single(old), ResolvedFieldType::Single(new))
        | (ResolvedFieldType::Array(old), ResolvedFieldType::Array(new)) => {
            check_type(ctxt, sides, direction, field, *old, *new)
        }
        (ResolvedFieldType::Variant(old), ResolvedFieldType::Variant(new)) => {
            // Walk the side that must be covered and look each one up in the other.
            let (required, available) = if reply { (new, old) } else { (old, new) };
            for alternative in required {
                match find_alternative(available, alternative) {
                    Some(found) if reply => check_type(ctxt, sides, direction, field, found, *alternative),
                    Some(found) => check_type(ctxt, sides, direction, field, *alternative, found),
                    None => ctxt.add(
                        ids.variant_alternatives,
                        sides,
                        format!("'{}' variant alternative '{}' has no counterpart", field, alternative.name()),
                    ),
                }
            }
        }
        (ResolvedFieldType::Single(old), ResolvedFieldType::Variant(new)) if !reply => {
            match find_alternative(new, old) {
                Some(found) => check_type(ctxt, sides, direction, field, *old, found),
                None => ctxt.add(
                    ids.variant_alternatives,
                    sides,
                    format!("'{}' became a variant without '{}'", field, old.name()),
                ),
            }
        }
        (ResolvedFieldType::Variant(old), ResolvedFieldType::Single(new)) if reply => {
            match find_alternative(old, new) {
                Some(found) => check_type(ctxt, sides, direction, field, found, *new),
                None => ctxt.add(
                    ids.variant_alternatives,
                    sides,
                    format!("'{}' narrowed to '{}', which the variant did not allow", field, new.name()),
                ),
            }
        }
        (ResolvedFieldType::Variant(_), _) | (_, ResolvedFieldType::Variant(_)) => ctxt.add(
            ids.variant,
            sides,
            format!("'{}' changed between a variant and a single type", field),
        ),
        _ => ctxt.add(
            ids.not_compatible,
            sides,
            format!("'{}' changed between an array and a single value", field),
        ),
    }
}

fn resolve_field<'a>(
    ctxt: &mut CompatibilityContext,
    sides: &Sides,
    symbols: &'a SymbolTable,
    file: &Path,
    field: &Field,
) -> Option<ResolvedFieldType<'a>> {
    let field_type = field.field_type.as_ref()?;
    match symbols.lookup_field_type(field_type) {
        Ok(resolved) => Some(resolved),
        Err(type_name) => {
            ctxt.errors.add(
                Id::UnresolvedFieldType,
                sides.command,
                format!("field '{}' has unknown type '{}'", field.name, type_name),
                file,
            );
            None
        }
    }
}

fn check_field_types(
    ctxt: &mut CompatibilityContext,
    sides: &Sides,
    direction: Direction,
    old: &Field,
    new: &Field,
) {
    let old_type = resolve_field(ctxt, sides, sides.old_symbols, sides.old_file, old);
    let new_type = resolve_field(ctxt, sides, sides.new_symbols, sides.new_file, new);
    if let (Some(old_type), Some(new_type)) = (old_type, new_type) {
        check_resolved_types(ctxt, sides, direction, &old.name, &old_type, &new_type);
    }
}

fn check_parameter_field(
    ctxt: &mut CompatibilityContext,
    sides: &Sides,
    direction: Direction,
    old: &Field,
    new: &Field,
) {
    let ids = direction.field_ids();
    if !old.unstable && new.unstable {
        ctxt.add(ids.unstable, sides, format!("'{}' is no longer stable", old.name));
    }
    if old.unstable && !new.unstable && !new.optional && new.default.is_none() {
        ctxt.add(
            ids.stable_required,
            sides,
            format!("'{}' became stable and is required with no default", new.name),
        );
    }
    if old.optional && !new.optional {
        ctxt.add(ids.required, sides, format!("'{}' is no longer optional", new.name));
    }
    if old.unstable {
        return;
    }

    match (&old.validator, &new.validator) {
        (None, Some(_)) => ctxt.add(
            ids.contains_validator,
            sides,
            format!("'{}' gained a validator", new.name),
        ),
        (Some(old_validator), Some(new_validator)) if old_validator != new_validator => ctxt.add(
            ids.validators_not_equal,
            sides,
            format!("'{}' changed its validator", new.name),
        ),
        _ => {}
    }
    check_field_types(ctxt, sides, direction, old, new);
}

fn check_reply_field(ctxt: &mut CompatibilityContext, sides: &Sides, old: &Field, new: &Field) {
    if new.unstable {
        ctxt.add(Id::NewReplyFieldUnstable, sides, format!("'{}' is no longer stable", old.name));
    }
    if !old.optional && new.optional {
        ctxt.add(Id::NewReplyFieldOptional, sides, format!("'{}' became optional", old.name));
    }
    match (&old.validator, &new.validator) {
        (None, Some(_)) => ctxt.add(
            Id::ReplyFieldContainsValidator,
            sides,
            format!("'{}' gained a validator", new.name),
        ),
        (Some(old_validator), Some(new_validator)) if old_validator != new_validator => ctxt.add(
            Id::ReplyFieldValidatorsNotEqual,
            sides,
            format!("'{}' changed its validator", new.name),
        ),
        _ => {}
    }
    check_field_types(ctxt, sides, Direction::Reply, old, new);
}

fn check_struct_fields(
    ctxt: &mut CompatibilityContext,
    sides: &Sides,
    direction: Direction,
    old: &Struct,
    new: &Struct,
) {
    if direction == Direction::Reply {
        for old_field in old.fields.iter().filter(|f| !f.unstable) {
            match new.field(&old_field.name) {
                Some(new_field) => check_reply_field(ctxt, sides, old_field, new_field),
                None => ctxt.add(
                    Id::NewReplyFieldMissing,
                    sides,
                    format!("reply field '{}' of '{}' was removed", old_field.name, old.name),
                ),
            }
        }
        return;
    }

    let ids = direction.field_ids();
    for old_field in &old.fields {
        match new.field(&old_field.name) {
            Some(new_field) => check_parameter_field(ctxt, sides, direction, old_field, new_field),
            None if !old_field.unstable => ctxt.add(
                ids.missing,
                sides,
                format!("'{}' was removed from '{}'", old_field.name, old.name),
            ),
            None => {}
        }
    }
    for new_field in &new.fields {
        if old.field(&new_field.name).is_none() && !new_field.optional && !new_field.unstable {
            ctxt.add(
                ids.added_required,
                sides,
                format!("required field '{}' was added to '{}'", new_field.name, new.name),
            );
        }
    }
}

fn command_type<'a>(
    ctxt: &CompatibilityContext,
    command: &Located<'a, Command>,
) -> Result<ResolvedFieldType<'a>, CompatibilityAbort> {
    let name = &command.item.command_name;
    let field_type = command
        .item
        .command_type
        .as_ref()
        .ok_or_else(|| ctxt.unresolved(command.file, name, "command type", ""))?;
    command
        .symbols
        .lookup_field_type(field_type)
        .map_err(|type_name| ctxt.unresolved(command.file, name, "command type", &type_name))
}

fn is_namespacestring(resolved: &ResolvedFieldType) -> bool {
    matches!(resolved, ResolvedFieldType::Single(ResolvedType::Type(t)) if t.name == "namespacestring")
}

fn check_namespace(
    ctxt: &mut CompatibilityContext,
    sides: &Sides,
    old: &Located<Command>,
    new: &Located<Command>,
) -> Result<(), CompatibilityAbort> {
    let old_namespace = old.item.namespace;
    let new_namespace = new.item.namespace;
    let compatible = match old_namespace {
        Namespace::Ignored => new_namespace == Namespace::Ignored,
        Namespace::ConcatenateWithDbOrUuid => matches!(
            new_namespace,
            Namespace::Ignored | Namespace::ConcatenateWithDbOrUuid
        ),
        Namespace::ConcatenateWithDb => new_namespace != Namespace::Type,
        Namespace::Type => {
            let old_type = command_type(ctxt, old)?;
            if new_namespace == Namespace::Type {
                let new_type = command_type(ctxt, new)?;
                let name = &old.item.command_name;
                check_resolved_types(ctxt, sides, Direction::CommandType, name, &old_type, &new_type);
                true
            } else {
                is_namespacestring(&old_type) || new_namespace == Namespace::Ignored
            }
        }
    };
    if !compatible {
        ctxt.add(
            Id::NewNamespaceIncompatible,
            sides,
            format!("namespace changed from '{}' to '{}'", old_namespace, new_namespace),
        );
    }
    Ok(())
}

fn reply_struct<'a>(
    ctxt: &CompatibilityContext,
    command: &Located<'a, Command>,
) -> Result<Option<&'a Struct>, CompatibilityAbort> {
    let Some(reply_type) = &command.item.reply_type else {
        return Ok(None);
    };
    command
        .symbols
        .get_struct(reply_type)
        .map(Some)
        .ok_or_else(|| ctxt.unresolved(command.file, &command.item.command_name, "reply type", reply_type))
}

fn check_command(
    ctxt: &mut CompatibilityContext,
    old: &Located<Command>,
    new: &Located<Command>,
) -> Result<(), CompatibilityAbort> {
    let sides = Sides {
        command:     &old.item.command_name,
        old_file:    old.file,
        new_file:    new.file,
        old_symbols: old.symbols,
        new_symbols: new.symbols,
    };
    tracing::debug!("checking command {}", sides.command);
    ctxt.visited.clear();

    check_struct_fields(ctxt, &sides, Direction::Parameter, &old.item.base, &new.item.base);
    check_namespace(ctxt, &sides, old, new)?;

    let old_reply = reply_struct(ctxt, old)?;
    let new_reply = reply_struct(ctxt, new)?;
    if let (Some(old_reply), Some(new_reply)) = (old_reply, new_reply) {
        check_struct_fields(ctxt, &sides, Direction::Reply, old_reply, new_reply);
    }
    Ok(())
}

/// Commands with an api version, keyed by command name. The first
/// definition of a duplicated name wins.
fn collect_commands<'a>(
    ctxt: &mut CompatibilityContext,
    files: &'a [ParsedFile],
) -> BTreeMap<&'a str, Located<'a, Command>> {
    let mut commands = BTreeMap::new();
    for file in files {
        let symbols = &file.spec.symbols;
        for command in symbols.commands.iter().filter(|c| !c.base.imported) {
            let name = command.command_name.as_str();
            if command.api_version.is_empty() {
                continue;
            }
            if command.api_version != "1" {
                ctxt.errors.add(
                    Id::CommandInvalidApiVersion,
                    name,
                    format!("'{}' has unsupported api_version '{}'", name, command.api_version),
                    &file.path,
                );
                continue;
            }
            if commands.contains_key(name) {
                ctxt.errors.add(
                    Id::DuplicateCommandName,
                    name,
                    format!("'{}' is defined more than once", name),
                    &file.path,
                );
                continue;
            }
            commands.insert(
                name,
                Located {
                    file: &file.path,
                    symbols,
                    item: command,
                },
            );
        }
    }
    commands
}

/// Compares every api command under `old_dir` with its counterpart under
/// `new_dir`.
pub fn check_compatibility(
    old_dir: &Path,
    new_dir: &Path,
    import_dirs: &[PathBuf],
) -> Result<CompatibilityErrorCollection, CompatibilityAbort> {
    let old_files = parse_directory(old_dir, import_dirs)?;
    let new_files = parse_directory(new_dir, import_dirs)?;

    let mut ctxt = CompatibilityContext::new();
    let new_commands = collect_commands(&mut ctxt, &new_files);
    let old_commands = collect_commands(&mut ctxt, &old_files);

    for (name, old) in &old_commands {
        match new_commands.get(name) {
            Some(new) => check_command(&mut ctxt, old, new)?,
            None => ctxt.errors.add(
                Id::RemovedCommand,
                name,
                format!("'{}' was removed", name),
                old.file,
            ),
        }
    }
    tracing::info!(
        "checked {} commands, {} errors",
        old_commands.len(),
        ctxt.errors.count()
    );
    Ok(ctxt.errors)
}

fn find_error_reply(files: &[ParsedFile]) -> Option<Located<'_, Struct>> {
    files.iter().find_map(|file| {
        file.spec.symbols.get_struct(ERROR_REPLY).map(|item| Located {
            file: &file.path,
            symbols: &file.spec.symbols,
            item,
        })
    })
}

/// Diffs `ErrorReply` between the two trees as a reply struct.
pub fn check_error_reply(
    old_dir: &Path,
    new_dir: &Path,
    import_dirs: &[PathBuf],
) -> Result<CompatibilityErrorCollection, CompatibilityAbort> {
    let old_files = parse_directory(old_dir, import_dirs)?;
    let new_files = parse_directory(new_dir, import_dirs)?;
    let mut ctxt = CompatibilityContext::new();

    let old = find_error_reply(&old_files);
    let new = find_error_reply(&new_files);
    for (found, dir) in [(&old, old_dir), (&new, new_dir)] {
        if found.is_none() {
            ctxt.errors.add(
                Id::MissingErrorReply,
                NO_COMMAND,
                format!("no '{}' struct under {}", ERROR_REPLY, dir.display()),
                dir,
            );
        }
    }

    if let (Some(old), Some(new)) = (old, new) {
        let sides = Sides {
            command:     NO_COMMAND,
            old_file:    old.file,
            new_file:    new.file,
            old_symbols: old.symbols,
            new_symbols: new.symbols,
        };
        check_struct_fields(&mut ctxt, &sides, Direction::Reply, old.item, new.item);
    }
    Ok(ctxt.errors)
}

/// Runs the command check and the `ErrorReply` check.
pub fn check_directories(
    old_dir: &Path,
    new_dir: &Path,
    import_dirs: &[PathBuf],
) -> Result<CompatibilityErrorCollection, CompatibilityAbort> {
    let mut errors = check_compatibility(old_dir, new_dir, import_dirs)?;
    errors.extend(check_error_reply(old_dir, new_dir, import_dirs)?);
    Ok(errors)
}

