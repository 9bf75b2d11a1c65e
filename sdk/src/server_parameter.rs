use bidl_bson::{Bson, Document};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;
use tracing::debug;

use crate::context::comparison_error;
use crate::error::IdlError;

/// When a server parameter may be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerParameterType {
    StartupOnly,
    RuntimeOnly,
    StartupAndRuntime,
    ClusterWide,
}

impl ServerParameterType {
    pub fn allowed_at_startup(self) -> bool {
        matches!(
            self,
            ServerParameterType::StartupOnly | ServerParameterType::StartupAndRuntime
        )
    }

    pub fn allowed_at_runtime(self) -> bool {
        !matches!(self, ServerParameterType::StartupOnly)
    }
}

/// Backing storage for a parameter or option, usable in a `static`.
pub struct ParameterStorage<T> {
    value: RwLock<Option<T>>,
}

impl<T> ParameterStorage<T> {
    pub const fn new() -> ParameterStorage<T> {
        ParameterStorage {
            value: RwLock::new(None),
        }
    }
}

impl<T: Clone + Default> ParameterStorage<T> {
    /// The stored value, or `T::default()` if nothing was set yet.
    pub fn get(&self) -> T {
        match self.value.read() {
            Ok(guard) => guard.clone().unwrap_or_default(),
            Err(poisoned) => poisoned.into_inner().clone().unwrap_or_default(),
        }
    }

    pub fn set(&self, value: T) {
        match self.value.write() {
            Ok(mut guard) => *guard = Some(value),
            Err(poisoned) => *poisoned.into_inner() = Some(value),
        }
    }
}

impl<T> Default for ParameterStorage<T> {
    fn default() -> ParameterStorage<T> {
        ParameterStorage::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl BoundOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BoundOp::Gt => ">",
            BoundOp::Gte => ">=",
            BoundOp::Lt => "<",
            BoundOp::Lte => "<=",
        }
    }

    fn holds<T: PartialOrd>(self, value: &T, limit: &T) -> bool {
        match self {
            BoundOp::Gt => value > limit,
            BoundOp::Gte => value >= limit,
            BoundOp::Lt => value < limit,
            BoundOp::Lte => value <= limit,
        }
    }
}

pub trait ServerParameter: Send + Sync {
    fn name(&self) -> &str;

    fn set_at(&self) -> ServerParameterType;

    fn set_from_string(&self, value: &str) -> Result<(), IdlError>;

    fn append(&self, name: &str, builder: &mut Document);

    fn is_redacted(&self) -> bool {
        false
    }

    fn is_test_only(&self) -> bool {
        false
    }
}

type Validator<T> = Box<dyn Fn(&T) -> Result<(), IdlError> + Send + Sync>;

/// A parameter whose value lives in a [ParameterStorage] static.
pub struct ServerParameterWithStorage<T: 'static> {
    name:       String,
    set_at:     ServerParameterType,
    storage:    &'static ParameterStorage<T>,
    validators: Vec<Validator<T>>,
    on_update:  Option<fn(&T) -> Result<(), IdlError>>,
    redact:     bool,
    test_only:  bool,
}

impl<T> ServerParameterWithStorage<T>
where
    T: Clone + Default + PartialOrd + fmt::Display + Send + Sync + 'static,
{
    pub fn new(
        name: &str,
        set_at: ServerParameterType,
        storage: &'static ParameterStorage<T>,
    ) -> ServerParameterWithStorage<T> {
        ServerParameterWithStorage {
            name: name.to_owned(),
            set_at,
            storage,
            validators: Vec::new(),
            on_update: None,
            redact: false,
            test_only: false,
        }
    }

    pub fn add_bound(&mut self, op: BoundOp, limit: T) -> &mut Self {
        let name = self.name.clone();
        self.validators.push(Box::new(move |value: &T| {
            if op.holds(value, &limit) {
                Ok(())
            } else {
                Err(comparison_error(None, &name, op.symbol(), value, &limit))
            }
        }));
        self
    }

    pub fn add_validator(&mut self, validator: fn(&T) -> Result<(), IdlError>) -> &mut Self {
        self.validators.push(Box::new(validator));
        self
    }

    pub fn set_on_update(&mut self, on_update: fn(&T) -> Result<(), IdlError>) -> &mut Self {
        self.on_update = Some(on_update);
        self
    }

    pub fn set_redact(&mut self) -> &mut Self {
        self.redact = true;
        self
    }

    pub fn set_test_only(&mut self) -> &mut Self {
        self.test_only = true;
        self
    }

    /// Validates, stores and then notifies the update hook.
    pub fn set_value(&self, value: T) -> Result<(), IdlError> {
        for validator in &self.validators {
            validator(&value)?;
        }
        self.storage.set(value.clone());
        if let Some(on_update) = self.on_update {
            on_update(&value)?;
        }
        Ok(())
    }

    pub fn set_default(&mut self, value: T) -> Result<&mut Self, IdlError> {
        self.set_value(value)?;
        Ok(self)
    }
}

impl<T> ServerParameter for ServerParameterWithStorage<T>
where
    T: Clone + Default + PartialOrd + fmt::Display + FromStr + Into<Bson> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn set_at(&self) -> ServerParameterType {
        self.set_at
    }

    fn set_from_string(&self, value: &str) -> Result<(), IdlError> {
        let parsed = value.parse::<T>().map_err(|_| {
            IdlError::ServerParameter(format!(
                "Invalid value '{}' for server parameter '{}'",
                value, self.name
            ))
        })?;
        self.set_value(parsed)
    }

    fn append(&self, name: &str, builder: &mut Document) {
        if self.redact {
            builder.append(name, "###");
        } else {
            builder.append(name, self.storage.get());
        }
    }

    fn is_redacted(&self) -> bool {
        self.redact
    }

    fn is_test_only(&self) -> bool {
        self.test_only
    }
}

/// A parameter without storage; it forwards to user hooks.
pub struct IdlServerParameter {
    name:        String,
    set_at:      ServerParameterType,
    from_string: Option<fn(&str) -> Result<(), IdlError>>,
    append_bson: Option<fn(&str, &mut Document)>,
    redact:      bool,
    test_only:   bool,
}

impl IdlServerParameter {
    pub fn new(name: &str, set_at: ServerParameterType) -> IdlServerParameter {
        IdlServerParameter {
            name: name.to_owned(),
            set_at,
            from_string: None,
            append_bson: None,
            redact: false,
            test_only: false,
        }
    }

    pub fn set_from_string_hook(&mut self, hook: fn(&str) -> Result<(), IdlError>) -> &mut Self {
        self.from_string = Some(hook);
        self
    }

    pub fn set_append_bson_hook(&mut self, hook: fn(&str, &mut Document)) -> &mut Self {
        self.append_bson = Some(hook);
        self
    }

    pub fn set_redact(&mut self) -> &mut Self {
        self.redact = true;
        self
    }

    pub fn set_test_only(&mut self) -> &mut Self {
        self.test_only = true;
        self
    }
}

impl ServerParameter for IdlServerParameter {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_at(&self) -> ServerParameterType {
        self.set_at
    }

    fn set_from_string(&self, value: &str) -> Result<(), IdlError> {
        match self.from_string {
            Some(hook) => hook(value),
            None => Err(IdlError::ServerParameter(format!(
                "Server parameter '{}' cannot be set from a string",
                self.name
            ))),
        }
    }

    fn append(&self, name: &str, builder: &mut Document) {
        if self.redact {
            builder.append(name, "###");
        } else if let Some(hook) = self.append_bson {
            hook(name, builder);
        }
    }

    fn is_redacted(&self) -> bool {
        self.redact
    }

    fn is_test_only(&self) -> bool {
        self.test_only
    }
}

/// All registered parameters plus their deprecated aliases.
#[derive(Default)]
pub struct ServerParameterRegistry {
    parameters: BTreeMap<String, Box<dyn ServerParameter>>,
    aliases:    BTreeMap<String, String>,
}

impl ServerParameterRegistry {
    pub fn new() -> ServerParameterRegistry {
        ServerParameterRegistry::default()
    }

    pub fn add(&mut self, parameter: Box<dyn ServerParameter>) -> Result<(), IdlError> {
        let name = parameter.name().to_owned();
        if self.parameters.contains_key(&name) || self.aliases.contains_key(&name) {
            return Err(IdlError::ServerParameter(format!(
                "Duplicate server parameter '{}'",
                name
            )));
        }
        debug!(parameter = %name, "registered server parameter");
        self.parameters.insert(name, parameter);
        Ok(())
    }

    pub fn add_alias(&mut self, alias: &str, name: &str) -> Result<(), IdlError> {
        if !self.parameters.contains_key(name) {
            return Err(IdlError::ServerParameter(format!(
                "Alias '{}' refers to unknown server parameter '{}'",
                alias, name
            )));
        }
        if self.parameters.contains_key(alias) || self.aliases.contains_key(alias) {
            return Err(IdlError::ServerParameter(format!(
                "Duplicate server parameter '{}'",
                alias
            )));
        }
        self.aliases.insert(alias.to_owned(), name.to_owned());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn ServerParameter> {
        let name = self.aliases.get(name).map(String::as_str).unwrap_or(name);
        self.parameters.get(name).map(|parameter| parameter.as_ref())
    }

    pub fn set_from_string(&self, name: &str, value: &str) -> Result<(), IdlError> {
        match self.get(name) {
            Some(parameter) => parameter.set_from_string(value),
            None => Err(IdlError::ServerParameter(format!(
                "Unknown server parameter '{}'",
                name
            ))),
        }
    }

    /// Appends every parameter under its canonical name.
    pub fn append_all(&self, builder: &mut Document) {
        for (name, parameter) in &self.parameters {
            parameter.append(name, builder);
        }
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static PORT: ParameterStorage<i32> = ParameterStorage::new();
    static LABEL: ParameterStorage<String> = ParameterStorage::new();

    #[test]
    fn storage_parameter_bounds_and_aliases() {
        let mut registry = ServerParameterRegistry::new();
        let mut param = ServerParameterWithStorage::new("port", ServerParameterType::StartupOnly, &PORT);
        param.add_bound(BoundOp::Gte, 1).add_bound(BoundOp::Lte, 65535);
        param.set_default(27017).unwrap();
        registry.add(Box::new(param)).unwrap();
        registry.add_alias("listenPort", "port").unwrap();

        assert_eq!(PORT.get(), 27017);
        registry.set_from_string("listenPort", "1234").unwrap();
        assert_eq!(PORT.get(), 1234);

        let err = registry.set_from_string("port", "0").unwrap_err();
        assert_eq!(err.to_string(), "BSON field 'port' value must be >= 1, actual value '0'");
        assert!(registry.set_from_string("port", "abc").is_err());
        assert_eq!(PORT.get(), 1234);

        let mut builder = Document::new();
        registry.append_all(&mut builder);
        assert_eq!(builder.get("port"), Some(&Bson::Int32(1234)));
    }

    #[test]
    fn redacted_and_duplicate_parameters() {
        let mut registry = ServerParameterRegistry::new();
        let mut param = ServerParameterWithStorage::new("label", ServerParameterType::RuntimeOnly, &LABEL);
        param.set_redact();
        registry.add(Box::new(param)).unwrap();
        registry.set_from_string("label", "secret").unwrap();

        let mut builder = Document::new();
        registry.append_all(&mut builder);
        assert_eq!(builder.get("label"), Some(&Bson::from("###")));

        let duplicate = IdlServerParameter::new("label", ServerParameterType::RuntimeOnly);
        assert!(registry.add(Box::new(duplicate)).is_err());
        assert!(registry.set_from_string("missing", "1").is_err());
    }

    #[test]
    fn hook_parameter() {
        let mut param = IdlServerParameter::new("hooked", ServerParameterType::StartupAndRuntime);
        param.set_from_string_hook(|value| {
            if value == "ok" {
                Ok(())
            } else {
                Err(IdlError::Validation("not ok".to_owned()))
            }
        });
        assert!(param.set_from_string("ok").is_ok());
        assert!(param.set_from_string("no").is_err());
        assert!(param.set_at().allowed_at_runtime());
    }
}
