use std::collections::BTreeMap;

use serde_yaml::Value;

use crate::config::{expand, Config};
use crate::exit::{ProgrammerError, UserError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlagValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl FlagValue {
    fn type_name(&self) -> &'static str {
        match self {
            FlagValue::Bool(_) => "boolean",
            FlagValue::Int(_) => "integer",
            FlagValue::Str(_) => "string",
        }
    }
}

/// A resolved flag and whether the user chose it (command line or config file).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolved {
    pub value: FlagValue,
    pub user_set: bool,
}

/// Flag values for one command, resolved as command line > config section > default.
#[derive(Clone, Debug, Default)]
pub struct FlagValues {
    values: BTreeMap<String, Resolved>,
}

impl FlagValues {
    pub fn get_bool(&self, name: &str) -> Result<(bool, bool), ProgrammerError> {
        match self.lookup(name)? {
            Resolved {
                value: FlagValue::Bool(value),
                user_set,
            } => Ok((*value, *user_set)),
            other => Err(mistyped(name, "boolean", &other.value)),
        }
    }

    pub fn get_int(&self, name: &str) -> Result<(i64, bool), ProgrammerError> {
        match self.lookup(name)? {
            Resolved {
                value: FlagValue::Int(value),
                user_set,
            } => Ok((*value, *user_set)),
            other => Err(mistyped(name, "integer", &other.value)),
        }
    }

    pub fn get_string(&self, name: &str) -> Result<(String, bool), ProgrammerError> {
        match self.lookup(name)? {
            Resolved {
                value: FlagValue::Str(value),
                user_set,
            } => Ok((value.clone(), *user_set)),
            other => Err(mistyped(name, "string", &other.value)),
        }
    }

    fn lookup(&self, name: &str) -> Result<&Resolved, ProgrammerError> {
        self.values
            .get(name)
            .ok_or_else(|| ProgrammerError(format!("flag \"{}\" is not defined", name)))
    }

    pub fn insert(&mut self, name: &str, value: FlagValue, user_set: bool) {
        self.values
            .insert(name.to_string(), Resolved { value, user_set });
    }
}

fn mistyped(name: &str, wanted: &str, found: &FlagValue) -> ProgrammerError {
    ProgrammerError(format!(
        "flag \"{}\" was requested as {} but holds a {}",
        name,
        wanted,
        found.type_name()
    ))
}

/// Resolves the flags of one config section against command-line values.
pub struct FlagResolver<'a> {
    config: &'a Config,
    section: &'static str,
    values: FlagValues,
}

impl<'a> FlagResolver<'a> {
    pub fn new(config: &'a Config, section: &'static str) -> Self {
        Self {
            config,
            section,
            values: FlagValues::default(),
        }
    }

    pub fn bool(mut self, name: &str, cli: Option<bool>, default: bool) -> Result<Self, UserError> {
        let resolved = match (cli, self.config.lookup(self.section, name)) {
            (Some(value), _) => Resolved {
                value: FlagValue::Bool(value),
                user_set: true,
            },
            (None, Some(raw)) => match raw.as_bool() {
                Some(value) => Resolved {
                    value: FlagValue::Bool(value),
                    user_set: true,
                },
                None => return Err(self.bad_config_value(name, raw, "true or false")),
            },
            (None, None) => Resolved {
                value: FlagValue::Bool(default),
                user_set: false,
            },
        };
        self.values.insert(name, resolved.value, resolved.user_set);
        Ok(self)
    }

    pub fn int(mut self, name: &str, cli: Option<i64>, default: i64) -> Result<Self, UserError> {
        let resolved = match (cli, self.config.lookup(self.section, name)) {
            (Some(value), _) => Resolved {
                value: FlagValue::Int(value),
                user_set: true,
            },
            (None, Some(raw)) => match raw.as_i64() {
                Some(value) => Resolved {
                    value: FlagValue::Int(value),
                    user_set: true,
                },
                None => return Err(self.bad_config_value(name, raw, "an integer")),
            },
            (None, None) => Resolved {
                value: FlagValue::Int(default),
                user_set: false,
            },
        };
        self.values.insert(name, resolved.value, resolved.user_set);
        Ok(self)
    }

    /// Taken verbatim; patterns such as `a$b` keep their dollar signs.
    pub fn string(self, name: &str, cli: Option<&str>, default: &str) -> Result<Self, UserError> {
        self.text(name, cli, default, str::to_string)
    }

    /// Like [`FlagResolver::string`], with `$VAR`, `${VAR}` and `~` expanded.
    pub fn path(self, name: &str, cli: Option<&str>, default: &str) -> Result<Self, UserError> {
        self.text(name, cli, default, expand)
    }

    fn text(
        mut self,
        name: &str,
        cli: Option<&str>,
        default: &str,
        convert: fn(&str) -> String,
    ) -> Result<Self, UserError> {
        let resolved = match (cli, self.config.lookup(self.section, name)) {
            (Some(value), _) => Resolved {
                value: FlagValue::Str(convert(value)),
                user_set: true,
            },
            (None, Some(raw)) => match raw.as_str() {
                Some(value) => Resolved {
                    value: FlagValue::Str(convert(value)),
                    user_set: true,
                },
                None => return Err(self.bad_config_value(name, raw, "a string")),
            },
            (None, None) => Resolved {
                value: FlagValue::Str(convert(default)),
                user_set: false,
            },
        };
        self.values.insert(name, resolved.value, resolved.user_set);
        Ok(self)
    }

    pub fn finish(self) -> FlagValues {
        self.values
    }

    fn bad_config_value(&self, name: &str, raw: &Value, expected: &str) -> UserError {
        let rendered = serde_yaml::to_string(raw)
            .map(|text| text.trim().to_string())
            .unwrap_or_else(|_| format!("{:?}", raw));
        UserError::new(
            format!(
                "The configuration file \"{}\" contains an invalid value for \"{}\" \
                 in section \"{}\".",
                self.config.path().display(),
                name,
                self.section
            ),
            format!("The value {} is not {}.", rendered, expected),
            format!(
                "Edit the configuration file so that \"{}\" holds {}, or remove it.",
                name, expected
            ),
        )
    }
}
