use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Global options consumed read-only by every resolution pass.
#[derive(Debug, Clone, Deserialize)]
pub struct Options {
    /// Managed install root. Every plugin that is not local lives at `root/<name>`.
    pub root: PathBuf,
    /// Module imported at the top level.
    pub spec: String,
    /// Trigger taxonomy field names.
    pub triggers: Vec<String>,
    pub defaults: DefaultsConfig,
    pub git: GitConfig,
    pub dev: DevConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DefaultsConfig {
    pub lazy: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitConfig {
    /// `%s`-style template applied to short identifiers such as `org/repo`.
    pub url_format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DevConfig {
    pub path: PathBuf,
    /// Substrings of a source url that mark a plugin as a dev plugin.
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl Options {
    /// Load configuration with layering: defaults → user config.
    pub fn load() -> Result<Self> {
        let user = match Self::user_config_path() {
            Some(path) if path.exists() => fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?,
            _ => String::new(),
        };

        Self::from_overlay(&user)
    }

    /// Parse the bundled defaults and deep-merge `user` on top of them.
    pub fn from_overlay(user: &str) -> Result<Self> {
        let defaults = include_str!("../../config/default.toml");
        let mut table: toml::Table = toml::from_str(defaults)?;
        let overlay: toml::Table = toml::from_str(user)?;
        deep_merge(&mut table, overlay);

        let mut options: Options = toml::Value::Table(table).try_into()?;
        options.root = expand_tilde(&options.root)?;
        options.dev.path = expand_tilde(&options.dev.path)?;
        Ok(options)
    }

    /// Directory holding the user's spec modules.
    pub fn spec_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "plugspec").map(|d| d.config_dir().to_path_buf())
    }

    /// Expand a short identifier through the url template.
    pub fn format_url(&self, short: &str) -> String {
        self.git.url_format.replacen("%s", short, 1)
    }

    pub fn is_dev_url(&self, url: &str) -> bool {
        self.dev
            .patterns
            .iter()
            .any(|pattern| !pattern.is_empty() && url.contains(pattern.as_str()))
    }

    fn user_config_path() -> Option<PathBuf> {
        Self::spec_dir().map(|dir| dir.join("config.toml"))
    }
}

fn deep_merge(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                deep_merge(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

pub(crate) fn expand_tilde(path: &Path) -> Result<PathBuf> {
    let text = path.to_string_lossy();
    if !text.starts_with('~') {
        return Ok(path.to_path_buf());
    }

    let home = dirs_home().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(PathBuf::from(text.replacen('~', &home.to_string_lossy(), 1)))
}

fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let options = Options::from_overlay("").unwrap();
        assert_eq!(options.spec, "plugins");
        assert_eq!(options.triggers, vec!["event", "keys", "cmd", "ft"]);
        assert!(!options.defaults.lazy);
        assert!(options.dev.patterns.is_empty());
    }

    #[test]
    fn overlay_merges_nested_tables() {
        let options = Options::from_overlay(
            r#"
            root = "/opt/plugins"
            [dev]
            patterns = ["me"]
            "#,
        )
        .unwrap();

        assert_eq!(options.root, PathBuf::from("/opt/plugins"));
        assert_eq!(options.dev.patterns, vec!["me"]);
        // untouched sibling keys survive the overlay
        assert_eq!(options.git.url_format, "https://github.com/%s.git");
    }

    #[test]
    fn url_template_and_dev_match() {
        let options = Options::from_overlay("[dev]\npatterns = [\"acme\"]").unwrap();
        assert_eq!(
            options.format_url("acme/tool"),
            "https://github.com/acme/tool.git"
        );
        assert!(options.is_dev_url("https://github.com/acme/tool.git"));
        assert!(!options.is_dev_url("https://github.com/other/tool.git"));
    }
}
