//! Diff of the resolved registry against the managed install root.

use std::collections::BTreeMap;

use crate::model::config::Options;
use crate::plugin::descriptor::{Plugin, PluginKind};
use crate::plugin::lister::{DirLister, EntryKind};
use crate::plugin::registry::{Registry, Severity};

/// Root entry reserved for generated documentation; never a plugin.
pub const RESERVED_ENTRY: &str = "readme";

#[derive(Debug, Default)]
pub struct Reconciliation {
    /// Directories under the root no spec declares. Not part of the registry.
    pub clean: Vec<Plugin>,
}

/// Annotate every enabled plugin with its install state and collect clean
/// candidates from a single listing of `options.root`.
pub fn reconcile(
    registry: &mut Registry,
    options: &Options,
    lister: &dyn DirLister,
) -> Reconciliation {
    let mut observed: BTreeMap<String, EntryKind> = lister
        .list(&options.root)
        .into_iter()
        .filter(|entry| entry.name != RESERVED_ENTRY)
        .filter(|entry| matches!(entry.kind, EntryKind::Directory | EntryKind::Symlink))
        .map(|entry| (entry.name, entry.kind))
        .collect();

    let mut invalid = Vec::new();
    for plugin in registry.plugins.values_mut() {
        if plugin.lazy.is_none() {
            plugin.lazy =
                Some(plugin.is_dependency || options.defaults.lazy || plugin.has_triggers());
        }

        if plugin.dir.as_os_str().is_empty() {
            invalid.push(plugin.name.clone());
            continue;
        }

        if plugin.dir.starts_with(&options.root) {
            let kind = observed.remove(&plugin.name);
            plugin.installed = kind.is_some();
            plugin.is_symlink = kind == Some(EntryKind::Symlink);
            plugin.is_local = false;
        } else {
            plugin.is_local = true;
            plugin.installed = true;
        }
    }

    for name in invalid {
        registry.notify(
            Severity::Error,
            format!("plugin `{name}` has no directory"),
            None,
        );
    }

    let clean = observed
        .into_iter()
        .map(|(name, kind)| {
            let mut plugin = Plugin::new(name.clone(), options.root.join(&name));
            plugin.kind = PluginKind::Clean;
            plugin.installed = true;
            plugin.is_symlink = kind == EntryKind::Symlink;
            plugin.is_local = plugin.is_symlink;
            plugin
        })
        .collect::<Vec<_>>();

    tracing::info!(
        plugins = registry.plugins.len(),
        clean = clean.len(),
        "reconciled install root {}",
        options.root.display()
    );

    Reconciliation { clean }
}

/// Enabled, managed plugins with no directory under the root yet.
pub fn missing(registry: &Registry) -> impl Iterator<Item = &Plugin> {
    registry
        .plugins
        .values()
        .filter(|plugin| !plugin.is_local && !plugin.installed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::lister::ObservedEntry;
    use std::path::Path;

    struct Listing(Vec<(&'static str, EntryKind)>);

    impl DirLister for Listing {
        fn list(&self, _path: &Path) -> Vec<ObservedEntry> {
            self.0
                .iter()
                .map(|(name, kind)| ObservedEntry {
                    name: name.to_string(),
                    kind: *kind,
                })
                .collect()
        }
    }

    fn options() -> Options {
        Options::from_overlay("root = \"/data/plugins\"").unwrap()
    }

    fn managed(name: &str) -> Plugin {
        Plugin::new(name, Path::new("/data/plugins").join(name))
    }

    #[test]
    fn classifies_installed_missing_and_clean() {
        let options = options();
        let mut registry = Registry::new();
        registry.plugins.insert("A".into(), managed("A"));
        registry.plugins.insert("D".into(), managed("D"));

        let listing = Listing(vec![
            ("A", EntryKind::Directory),
            ("B", EntryKind::Directory),
            ("C", EntryKind::Symlink),
            ("readme", EntryKind::Directory),
            ("lock.json", EntryKind::Other),
        ]);
        let result = reconcile(&mut registry, &options, &listing);

        assert!(registry.plugins["A"].installed);
        assert!(!registry.plugins["D"].installed);

        let clean: Vec<_> = result.clean.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(clean, vec!["B", "C"]);
        assert!(result.clean.iter().all(|p| p.kind == PluginKind::Clean && p.installed));
        assert!(!result.clean[0].is_local);
        assert!(result.clean[1].is_symlink && result.clean[1].is_local);
        assert_eq!(result.clean[0].dir, Path::new("/data/plugins/B"));

        let missing: Vec<_> = missing(&registry).map(|p| p.name.as_str()).collect();
        assert_eq!(missing, vec!["D"]);
    }

    #[test]
    fn local_plugins_are_assumed_present() {
        let options = options();
        let mut registry = Registry::new();
        registry
            .plugins
            .insert("mine".into(), Plugin::new("mine", "/home/me/src/mine"));

        let listing = Listing(vec![("mine", EntryKind::Directory)]);
        let result = reconcile(&mut registry, &options, &listing);

        let mine = &registry.plugins["mine"];
        assert!(mine.is_local && mine.installed);
        // the same-named root directory is not consumed by a local plugin
        assert_eq!(result.clean.len(), 1);
    }

    #[test]
    fn lazy_defaults() {
        let options = options();
        let mut registry = Registry::new();
        let mut dep = managed("dep");
        dep.is_dependency = true;
        let mut triggered = managed("triggered");
        triggered
            .triggers
            .insert("ft".into(), smallvec::smallvec!["rust".to_string()]);
        let mut explicit = managed("explicit");
        explicit.lazy = Some(false);
        explicit.is_dependency = true;

        for plugin in [dep, triggered, explicit, managed("eager")] {
            registry.plugins.insert(plugin.name.clone(), plugin);
        }
        reconcile(&mut registry, &options, &Listing(Vec::new()));

        assert!(registry.plugins["dep"].is_lazy());
        assert!(registry.plugins["triggered"].is_lazy());
        assert!(!registry.plugins["explicit"].is_lazy());
        assert!(!registry.plugins["eager"].is_lazy());
    }
}
