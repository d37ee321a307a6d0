//! Author-facing spec shapes.
//!
//! A spec is a bare name, a descriptor table, a list of specs, or an import
//! directive. Tables are shared behind `Rc` so the resolver can recognise the
//! same table object when it shows up twice in a tree without mutating it.

use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use crate::plugin::descriptor::Plugin;
use crate::plugin::error::SpecError;

pub type Predicate = Rc<dyn Fn() -> anyhow::Result<bool>>;
pub type ConfigFn = Rc<dyn Fn(&Plugin) -> anyhow::Result<()>>;

#[derive(Debug, Clone)]
pub enum RawSpec {
    Name(String),
    Table(Rc<SpecTable>),
    List(Vec<RawSpec>),
    Import(ImportSpec),
}

/// `enabled` as authored: a plain boolean or a predicate evaluated once per pass.
#[derive(Clone)]
pub enum Enabled {
    Always,
    Never,
    Computed(Predicate),
}

/// The `config` hook. Compared by value, or by identity for native callbacks.
#[derive(Clone)]
pub enum Hook {
    Value(toml::Value),
    Native(ConfigFn),
}

#[derive(Debug, Clone)]
pub struct ImportSpec {
    pub module: String,
    pub enabled: Option<Enabled>,
}

/// A descriptor table before defaulting.
#[derive(Debug, Clone, Default)]
pub struct SpecTable {
    /// Positional short form, `repo = "org/name"` in TOML.
    pub short: Option<String>,
    pub name: Option<String>,
    pub url: Option<String>,
    pub dir: Option<PathBuf>,
    pub dev: Option<bool>,
    pub lazy: Option<bool>,
    pub priority: Option<i64>,
    pub enabled: Option<Enabled>,
    pub config: Option<Hook>,
    pub dependencies: Option<RawSpec>,
    /// Every other key, trigger fields included.
    pub fields: toml::Table,
}

impl RawSpec {
    /// Convert an authored TOML value into a spec tree.
    pub fn from_value(value: toml::Value) -> Result<Self, SpecError> {
        match value {
            toml::Value::String(name) => Ok(Self::Name(name)),
            toml::Value::Array(items) => items
                .into_iter()
                .map(Self::from_value)
                .collect::<Result<Vec<_>, _>>()
                .map(Self::List),
            toml::Value::Table(table) => Self::from_table(table),
            _ => Err(SpecError::invalid("spec", "a string, table or array")),
        }
    }

    fn from_table(mut table: toml::Table) -> Result<Self, SpecError> {
        if let Some(module) = table.remove("import") {
            let module = match module {
                toml::Value::String(module) => module,
                _ => return Err(SpecError::invalid("import", "a module path")),
            };
            let enabled = take_bool(&mut table, "enabled")?.map(Enabled::from);
            if let Some(key) = table.keys().next() {
                return Err(SpecError::invalid(
                    key.clone(),
                    "only `import` and `enabled` on an import",
                ));
            }
            return Ok(Self::Import(ImportSpec { module, enabled }));
        }

        let spec = SpecTable {
            short: take_string(&mut table, "repo")?,
            name: take_string(&mut table, "name")?,
            url: take_string(&mut table, "url")?,
            dir: take_string(&mut table, "dir")?.map(PathBuf::from),
            dev: take_bool(&mut table, "dev")?,
            lazy: take_bool(&mut table, "lazy")?,
            priority: match table.remove("priority") {
                None => None,
                Some(toml::Value::Integer(priority)) => Some(priority),
                Some(_) => return Err(SpecError::invalid("priority", "an integer")),
            },
            enabled: take_bool(&mut table, "enabled")?.map(Enabled::from),
            config: table.remove("config").map(Hook::Value),
            dependencies: table
                .remove("dependencies")
                .map(Self::from_value)
                .transpose()?,
            fields: table,
        };

        Ok(spec.into())
    }
}

impl From<&str> for RawSpec {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<SpecTable> for RawSpec {
    fn from(table: SpecTable) -> Self {
        Self::Table(Rc::new(table))
    }
}

impl From<Vec<RawSpec>> for RawSpec {
    fn from(items: Vec<RawSpec>) -> Self {
        Self::List(items)
    }
}

impl From<ImportSpec> for RawSpec {
    fn from(import: ImportSpec) -> Self {
        Self::Import(import)
    }
}

impl SpecTable {
    pub fn short(short: impl Into<String>) -> Self {
        Self {
            short: Some(short.into()),
            ..Self::default()
        }
    }

    pub fn local(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            ..Self::default()
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn with_dependencies(mut self, dependencies: impl Into<RawSpec>) -> Self {
        self.dependencies = Some(dependencies.into());
        self
    }

    pub fn with_enabled(mut self, enabled: impl Into<Enabled>) -> Self {
        self.enabled = Some(enabled.into());
        self
    }
}

impl ImportSpec {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            enabled: None,
        }
    }
}

impl Enabled {
    pub fn when(predicate: impl Fn() -> anyhow::Result<bool> + 'static) -> Self {
        Self::Computed(Rc::new(predicate))
    }

    pub fn evaluate(&self) -> anyhow::Result<bool> {
        match self {
            Self::Always => Ok(true),
            Self::Never => Ok(false),
            Self::Computed(predicate) => predicate(),
        }
    }
}

impl From<bool> for Enabled {
    fn from(value: bool) -> Self {
        if value { Self::Always } else { Self::Never }
    }
}

impl fmt::Debug for Enabled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("Always"),
            Self::Never => f.write_str("Never"),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl PartialEq for Hook {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Value(a), Self::Value(b)) => a == b,
            (Self::Native(a), Self::Native(b)) => std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
            _ => false,
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Native(_) => f.write_str("Native(..)"),
        }
    }
}

fn take_string(table: &mut toml::Table, key: &str) -> Result<Option<String>, SpecError> {
    match table.remove(key) {
        None => Ok(None),
        Some(toml::Value::String(value)) => Ok(Some(value)),
        Some(_) => Err(SpecError::invalid(key, "a string")),
    }
}

fn take_bool(table: &mut toml::Table, key: &str) -> Result<Option<bool>, SpecError> {
    match table.remove(key) {
        None => Ok(None),
        Some(toml::Value::Boolean(value)) => Ok(Some(value)),
        Some(_) => Err(SpecError::invalid(key, "a boolean")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> RawSpec {
        let mut doc: toml::Table = toml::from_str(text).unwrap();
        RawSpec::from_value(doc.remove("spec").unwrap()).unwrap()
    }

    #[test]
    fn shapes_dispatch() {
        let spec = parse(
            r#"
            spec = [
                "org/one",
                { repo = "org/two", event = "BufRead", dependencies = ["one"] },
                { import = "plugins.lang", enabled = false },
            ]
            "#,
        );

        let RawSpec::List(items) = spec else {
            panic!("expected a list");
        };
        assert!(matches!(&items[0], RawSpec::Name(name) if name == "org/one"));

        let RawSpec::Table(table) = &items[1] else {
            panic!("expected a table");
        };
        assert_eq!(table.short.as_deref(), Some("org/two"));
        assert!(table.fields.contains_key("event"));
        assert!(matches!(table.dependencies, Some(RawSpec::List(_))));

        let RawSpec::Import(import) = &items[2] else {
            panic!("expected an import");
        };
        assert_eq!(import.module, "plugins.lang");
        assert!(matches!(import.enabled, Some(Enabled::Never)));
    }

    #[test]
    fn wrong_field_type_is_rejected() {
        let mut doc: toml::Table = toml::from_str("spec = { repo = 3 }").unwrap();
        let err = RawSpec::from_value(doc.remove("spec").unwrap()).unwrap_err();
        assert!(matches!(err, SpecError::InvalidField { ref field, .. } if field == "repo"));
    }

    #[test]
    fn unknown_import_keys_are_rejected() {
        let mut doc: toml::Table =
            toml::from_str(r#"spec = { import = "plugins", enable = false }"#).unwrap();
        let err = RawSpec::from_value(doc.remove("spec").unwrap()).unwrap_err();
        assert!(matches!(err, SpecError::InvalidField { ref field, .. } if field == "enable"));
    }

    #[test]
    fn native_hooks_compare_by_identity() {
        let hook: ConfigFn = Rc::new(|_| Ok(()));
        let other: ConfigFn = Rc::new(|_| Ok(()));
        let a = Hook::Native(hook.clone());
        let b = Hook::Native(hook);
        let c = Hook::Native(other);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
