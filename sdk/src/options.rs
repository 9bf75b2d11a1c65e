use bidl_bson::{Bson, ElementType};
use std::collections::BTreeMap;

use crate::error::IdlError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionType {
    Switch,
    Bool,
    Int,
    Long,
    Unsigned,
    UnsignedLongLong,
    Double,
    String,
    StringVector,
    StringMap,
}

impl OptionType {
    /// The element types a value of this option may be stored as.
    pub fn element_types(self) -> &'static [ElementType] {
        match self {
            OptionType::Switch | OptionType::Bool => &[ElementType::Bool],
            OptionType::Int | OptionType::Unsigned => &[ElementType::Int32],
            OptionType::Long | OptionType::UnsignedLongLong => &[ElementType::Int64],
            OptionType::Double => &[ElementType::Double],
            OptionType::String => &[ElementType::String],
            OptionType::StringVector => &[ElementType::Array],
            OptionType::StringMap => &[ElementType::Object],
        }
    }
}

/// Where an option may be specified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSources {
    pub command_line: bool,
    pub ini:          bool,
    pub yaml:         bool,
}

impl OptionSources {
    pub const ALL: OptionSources = OptionSources {
        command_line: true,
        ini:          true,
        yaml:         true,
    };
    pub const COMMAND_LINE: OptionSources = OptionSources {
        command_line: true,
        ini:          false,
        yaml:         false,
    };
    pub const INI: OptionSources = OptionSources {
        command_line: false,
        ini:          true,
        yaml:         false,
    };
    pub const YAML: OptionSources = OptionSources {
        command_line: false,
        ini:          false,
        yaml:         true,
    };

    pub fn union(self, other: OptionSources) -> OptionSources {
        OptionSources {
            command_line: self.command_line || other.command_line,
            ini:          self.ini || other.ini,
            yaml:         self.yaml || other.yaml,
        }
    }
}

type Constraint = Box<dyn Fn(&Bson) -> Result<(), IdlError> + Send + Sync>;

/// One startup option. Built through chained setters.
pub struct OptionDescription {
    pub dotted_name:             String,
    pub single_name:             String,
    pub option_type:             OptionType,
    pub description:             String,
    pub deprecated_dotted_names: Vec<String>,
    pub deprecated_single_names: Vec<String>,
    pub sources:                 OptionSources,
    pub hidden:                  bool,
    pub redact:                  bool,
    pub default_value:           Option<Bson>,
    pub implicit_value:          Option<Bson>,
    pub composing:               bool,
    pub positional:              Option<(i32, i32)>,
    pub requires:                Vec<String>,
    pub incompatible_with:       Vec<String>,
    constraints:                 Vec<Constraint>,
}

impl OptionDescription {
    pub fn new(
        dotted_name: &str,
        single_name: &str,
        option_type: OptionType,
        description: &str,
    ) -> OptionDescription {
        OptionDescription {
            dotted_name:             dotted_name.to_owned(),
            single_name:             single_name.to_owned(),
            option_type,
            description:             description.to_owned(),
            deprecated_dotted_names: Vec::new(),
            deprecated_single_names: Vec::new(),
            sources:                 OptionSources::ALL,
            hidden:                  false,
            redact:                  false,
            default_value:           None,
            implicit_value:          None,
            composing:               false,
            positional:              None,
            requires:                Vec::new(),
            incompatible_with:       Vec::new(),
            constraints:             Vec::new(),
        }
    }

    pub fn set_sources(&mut self, sources: OptionSources) -> &mut Self {
        self.sources = sources;
        self
    }

    pub fn hidden(&mut self) -> &mut Self {
        self.hidden = true;
        self
    }

    pub fn redact(&mut self) -> &mut Self {
        self.redact = true;
        self
    }

    pub fn set_default(&mut self, value: impl Into<Bson>) -> &mut Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn set_implicit(&mut self, value: impl Into<Bson>) -> &mut Self {
        self.implicit_value = Some(value.into());
        self
    }

    pub fn composing(&mut self) -> &mut Self {
        self.composing = true;
        self
    }

    /// `end` of -1 means unbounded.
    pub fn positional(&mut self, start: i32, end: i32) -> &mut Self {
        self.positional = Some((start, end));
        self
    }

    pub fn requires(&mut self, name: &str) -> &mut Self {
        self.requires.push(name.to_owned());
        self
    }

    pub fn incompatible_with(&mut self, name: &str) -> &mut Self {
        self.incompatible_with.push(name.to_owned());
        self
    }

    pub fn add_deprecated_dotted_name(&mut self, name: &str) -> &mut Self {
        self.deprecated_dotted_names.push(name.to_owned());
        self
    }

    pub fn add_deprecated_single_name(&mut self, name: &str) -> &mut Self {
        self.deprecated_single_names.push(name.to_owned());
        self
    }

    pub fn add_constraint(
        &mut self,
        constraint: impl Fn(&Bson) -> Result<(), IdlError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.constraints.push(Box::new(constraint));
        self
    }

    fn matches(&self, name: &str) -> bool {
        self.dotted_name == name || self.deprecated_dotted_names.iter().any(|n| n == name)
    }

    fn check(&self, value: &Bson) -> Result<(), IdlError> {
        if !self.option_type.element_types().contains(&value.element_type()) {
            return Err(IdlError::StartupOption(format!(
                "Option '{}' has the wrong type '{}'",
                self.dotted_name,
                value.element_type()
            )));
        }
        for constraint in &self.constraints {
            constraint(value)?;
        }
        Ok(())
    }
}

/// A named group of options, possibly with nested sections.
pub struct OptionSection {
    name:        String,
    options:     Vec<OptionDescription>,
    subsections: Vec<OptionSection>,
}

impl OptionSection {
    pub fn new(name: &str) -> OptionSection {
        OptionSection {
            name:        name.to_owned(),
            options:     Vec::new(),
            subsections: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_option_chaining(
        &mut self,
        dotted_name: &str,
        single_name: &str,
        option_type: OptionType,
        description: &str,
    ) -> &mut OptionDescription {
        self.options.push(OptionDescription::new(
            dotted_name,
            single_name,
            option_type,
            description,
        ));
        let last = self.options.len() - 1;
        &mut self.options[last]
    }

    pub fn add_section(&mut self, section: OptionSection) -> Result<(), IdlError> {
        for option in section.all_options() {
            if self.find(&option.dotted_name).is_some() {
                return Err(IdlError::StartupOption(format!(
                    "Attempted to register option with conflicting name '{}'",
                    option.dotted_name
                )));
            }
        }
        self.subsections.push(section);
        Ok(())
    }

    pub fn options(&self) -> &[OptionDescription] {
        &self.options
    }

    pub fn sections(&self) -> &[OptionSection] {
        &self.subsections
    }

    pub fn all_options(&self) -> Vec<&OptionDescription> {
        let mut all: Vec<&OptionDescription> = self.options.iter().collect();
        for section in &self.subsections {
            all.extend(section.all_options());
        }
        all
    }

    /// Finds an option by dotted name or deprecated dotted name.
    pub fn find(&self, name: &str) -> Option<&OptionDescription> {
        self.all_options().into_iter().find(|option| option.matches(name))
    }
}

/// Parsed option values keyed by dotted name.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Environment {
    values: BTreeMap<String, Bson>,
}

impl Environment {
    pub fn new() -> Environment {
        Environment::default()
    }

    pub fn set(&mut self, name: &str, value: impl Into<Bson>) {
        self.values.insert(name.to_owned(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Bson> {
        self.values.get(name)
    }

    pub fn count(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Fills in defaults, then checks types, constraints, requirements and
    /// conflicts for every option in `section`.
    pub fn validate(&mut self, section: &OptionSection) -> Result<(), IdlError> {
        let options = section.all_options();
        for option in &options {
            if let Some(deprecated) = option
                .deprecated_dotted_names
                .iter()
                .find(|name| self.values.contains_key(name.as_str()))
            {
                if let Some(value) = self.values.remove(deprecated.as_str()) {
                    self.values.insert(option.dotted_name.clone(), value);
                }
            }
            if !self.count(&option.dotted_name) {
                if let Some(default) = &option.default_value {
                    self.values.insert(option.dotted_name.clone(), default.clone());
                }
            }
        }

        for name in self.values.keys() {
            if !options.iter().any(|option| &option.dotted_name == name) {
                return Err(IdlError::StartupOption(format!("Unrecognized option: {}", name)));
            }
        }

        for option in &options {
            let Some(value) = self.values.get(&option.dotted_name) else {
                continue;
            };
            option.check(value)?;
            for required in &option.requires {
                if !self.count(required) {
                    return Err(IdlError::StartupOption(format!(
                        "Option '{}' requires option '{}'",
                        option.dotted_name, required
                    )));
                }
            }
            for conflict in &option.incompatible_with {
                if self.count(conflict) {
                    return Err(IdlError::StartupOption(format!(
                        "Option '{}' is not allowed with option '{}'",
                        option.dotted_name, conflict
                    )));
                }
            }
        }
        Ok(())
    }
}
