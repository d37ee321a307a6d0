use regex::Regex;
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;

use crate::plugin::spec::Hook;
use crate::plugin::trigger::Triggers;

static NON_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^[:alnum:]]+").expect("valid non-word regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PluginKind {
    #[default]
    Enabled,
    Disabled,
    /// Synthetic entry for an install-root directory no spec declares.
    Clean,
}

/// Opaque install/runtime state owned by collaborators. Never merged; only
/// carried forward by name when a registry is rebuilt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bookkeeping(toml::Table);

/// A resolved plugin.
#[derive(Debug, Clone)]
pub struct Plugin {
    pub name: String,
    pub url: Option<String>,
    pub dir: PathBuf,
    pub dev: Option<bool>,
    /// Names of the plugins this one depends on.
    pub dependencies: Vec<String>,
    pub triggers: Triggers,
    /// Only ever declared through another plugin's dependency list.
    pub is_dependency: bool,
    pub lazy: Option<bool>,
    pub priority: Option<i64>,
    pub config: Option<Hook>,
    /// Remaining authored fields (`branch`, `tag`, `build`, ...).
    pub fields: toml::Table,
    pub kind: PluginKind,
    pub installed: bool,
    pub is_local: bool,
    pub is_symlink: bool,
    pub bookkeeping: Bookkeeping,
}

impl Plugin {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            url: None,
            dir: dir.into(),
            dev: None,
            dependencies: Vec::new(),
            triggers: Triggers::new(),
            is_dependency: false,
            lazy: None,
            priority: None,
            config: None,
            fields: toml::Table::new(),
            kind: PluginKind::Enabled,
            installed: false,
            is_local: false,
            is_symlink: false,
            bookkeeping: Bookkeeping::default(),
        }
    }

    pub fn has_triggers(&self) -> bool {
        self.triggers.values().any(|values| !values.is_empty())
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy.unwrap_or(false)
    }
}

impl fmt::Display for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.url.as_ref() {
            Some(url) => write!(f, "{} ({url})", self.name),
            None => write!(f, "{} ({})", self.name, self.dir.display()),
        }
    }
}

impl Bookkeeping {
    pub fn get(&self, key: &str) -> Option<&toml::Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<toml::Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Derive a plugin name from a url or a path.
///
/// `https://host/org/repo.git` → `repo`, `/abs/path/my-plugin` → `my-plugin`.
/// A source without any `/` has every run of non-alphanumerics replaced by `_`.
pub fn derive_name(source: &str) -> String {
    let trimmed = source.strip_suffix(".git").unwrap_or(source);
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);

    match trimmed.rsplit_once('/') {
        Some((_, segment)) => segment.to_string(),
        None => NON_WORD_RE.replace_all(source, "_").into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_from_url() {
        assert_eq!(derive_name("https://host/org/repo.git"), "repo");
        assert_eq!(derive_name("https://host/org/repo/"), "repo");
        assert_eq!(derive_name("git@host:org/repo.git"), "repo");
    }

    #[test]
    fn name_from_path() {
        assert_eq!(derive_name("/abs/path/my-plugin"), "my-plugin");
    }

    #[test]
    fn name_without_separator() {
        assert_eq!(derive_name("foo.nvim"), "foo_nvim");
        assert_eq!(derive_name("a--b..c"), "a_b_c");
    }

    #[test]
    fn triggers_make_plugin_triggered() {
        let mut plugin = Plugin::new("x", "/tmp/x");
        assert!(!plugin.has_triggers());
        plugin
            .triggers
            .insert("cmd".into(), smallvec::smallvec!["X".to_string()]);
        assert!(plugin.has_triggers());
    }
}
