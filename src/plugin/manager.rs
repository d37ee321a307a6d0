use std::collections::{HashMap, HashSet};
use std::collections::btree_map::Entry;
use std::path::PathBuf;
use std::rc::Rc;

use crate::model::config::{Options, expand_tilde};
use crate::plugin::descriptor::{Plugin, PluginKind, derive_name};
use crate::plugin::error::SpecError;
use crate::plugin::loader::ModuleSource;
use crate::plugin::merge::merge;
use crate::plugin::registry::{Registry, Severity};
use crate::plugin::spec::{ImportSpec, RawSpec, SpecTable};
use crate::plugin::trigger::{self, Taxonomy, Triggers};

/// Module namespace owned by this crate; specs may not import from it.
pub const RESERVED_NAMESPACE: &str = "plugspec";

/// One resolution pass: raw spec tree in, registry out.
pub struct Resolver<'a> {
    options: &'a Options,
    taxonomy: Taxonomy,
    modules: &'a mut dyn ModuleSource,
    registry: Registry,
    // Keyed by table address. Holding the `Rc` keeps the address from being
    // reused by another table while the pass runs.
    seen: HashMap<usize, (Rc<SpecTable>, String)>,
    importing: Option<String>,
}

impl<'a> Resolver<'a> {
    pub fn new(options: &'a Options, modules: &'a mut dyn ModuleSource) -> Self {
        Self {
            options,
            taxonomy: Taxonomy::new(options.triggers.iter().cloned()),
            modules,
            registry: Registry::new(),
            seen: HashMap::new(),
            importing: None,
        }
    }

    /// Resolve `spec` into a fresh registry.
    pub fn resolve(mut self, spec: &RawSpec) -> Registry {
        self.normalize(spec, &mut Vec::new(), false);
        self.finish()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run the post-pass fixups and hand the registry over.
    pub fn finish(mut self) -> Registry {
        self.fix_disabled();
        tracing::info!(
            plugins = self.registry.plugins.len(),
            disabled = self.registry.disabled.len(),
            modules = self.registry.modules.len(),
            "resolved plugin specs"
        );
        self.registry
    }

    /// Expand any spec shape into registry entries, appending resolved names to `names`.
    pub fn normalize(&mut self, spec: &RawSpec, names: &mut Vec<String>, is_dependency: bool) {
        match spec {
            RawSpec::Name(name) if is_dependency && !name.contains('/') => {
                names.push(name.clone());
            }
            RawSpec::Name(name) => {
                self.add(&Rc::new(SpecTable::short(name.clone())), names, is_dependency);
            }
            RawSpec::List(items) => {
                for item in items {
                    self.normalize(item, names, is_dependency);
                }
            }
            RawSpec::Import(import) => self.import(import),
            RawSpec::Table(table) => {
                self.add(table, names, is_dependency);
            }
        }
    }

    /// Default, gate and register one descriptor table. Returns the plugin
    /// name, or `None` when the table is not a valid spec.
    pub fn add(
        &mut self,
        table: &Rc<SpecTable>,
        names: &mut Vec<String>,
        is_dependency: bool,
    ) -> Option<String> {
        let key = Rc::as_ptr(table) as usize;
        if let Some((_, name)) = self.seen.get(&key) {
            names.push(name.clone());
            return Some(name.clone());
        }

        let mut plugin = match self.shape(table) {
            Ok(plugin) => plugin,
            Err(err) => {
                self.notify(Severity::Error, err.to_string());
                return None;
            }
        };
        plugin.is_dependency = is_dependency;
        let name = plugin.name.clone();
        self.seen.insert(key, (Rc::clone(table), name.clone()));

        let enabled = match table.enabled.as_ref() {
            None => !self.registry.disabled.contains_key(&name),
            Some(enabled) => enabled.evaluate().unwrap_or_else(|err| {
                self.notify(
                    Severity::Error,
                    format!("failed to evaluate `enabled` for `{name}`: {err:#}"),
                );
                false
            }),
        };

        if !enabled {
            tracing::debug!(plugin = %name, "disabled");
            plugin.kind = PluginKind::Disabled;
            self.registry.plugins.remove(&name);
            self.registry.disabled.insert(name, plugin);
            return None;
        }

        if let Some(dependencies) = table.dependencies.as_ref() {
            let mut resolved = Vec::new();
            self.normalize(dependencies, &mut resolved, true);
            for dependency in resolved {
                if !plugin.dependencies.contains(&dependency) {
                    plugin.dependencies.push(dependency);
                }
            }
        }

        self.registry.disabled.remove(&name);
        let conflicts = match self.registry.plugins.entry(name.clone()) {
            Entry::Occupied(mut entry) => {
                let existing = entry.get().to_string();
                let incoming = plugin.to_string();
                merge(entry.get_mut(), plugin)
                    .into_iter()
                    .map(|key| {
                        format!("merging `{name}`: overwriting `{key}` of {existing} with {incoming}")
                    })
                    .collect()
            }
            Entry::Vacant(entry) => {
                tracing::debug!(plugin = %name, dependency = is_dependency, "added");
                entry.insert(plugin);
                Vec::new()
            }
        };
        for conflict in conflicts {
            self.notify(Severity::Warn, conflict);
        }

        names.push(name.clone());
        Some(name)
    }

    /// Load and normalize every module under `import.module`.
    pub fn import(&mut self, import: &ImportSpec) {
        let module = import.module.as_str();
        let reserved = module
            .strip_prefix(RESERVED_NAMESPACE)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'));
        if reserved {
            self.notify(
                Severity::Error,
                SpecError::ReservedImport(module.to_string()).to_string(),
            );
            return;
        }

        if let Some(enabled) = import.enabled.as_ref() {
            match enabled.evaluate() {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(module, "import disabled");
                    return;
                }
                Err(err) => {
                    self.notify(
                        Severity::Error,
                        format!("failed to evaluate `enabled` for import `{module}`: {err:#}"),
                    );
                    return;
                }
            }
        }

        self.modules.invalidate_index();

        let mut found = Vec::new();
        self.modules
            .for_each_submodule(module, &mut |name| found.push(name.to_string()));

        if found.is_empty() {
            self.notify(
                Severity::Error,
                SpecError::NoSpecsFound(module.to_string()).to_string(),
            );
            return;
        }

        for name in found {
            self.modules.unload(&name);
            let outer = self.importing.replace(name.clone());

            match self.modules.load(&name) {
                Ok(spec) => {
                    tracing::debug!(module = %name, "importing");
                    self.registry.modules.push(name);
                    self.normalize(&spec, &mut Vec::new(), false);
                }
                Err(err) => {
                    self.notify(Severity::Error, format!("failed to load `{name}`: {err:#}"));
                }
            }

            self.importing = outer;
        }
    }

    fn notify(&mut self, severity: Severity, message: String) {
        self.registry
            .notify(severity, message, self.importing.as_deref());
    }

    /// Fill in url, name, dir and triggers from a table.
    fn shape(&self, table: &SpecTable) -> Result<Plugin, SpecError> {
        let mut url = table.url.clone();
        let mut dir = table.dir.clone();

        match table.short.as_deref() {
            Some(short) if url.is_none() => {
                if short.starts_with("http") || short.starts_with("git@") {
                    url = Some(short.to_string());
                } else if short.starts_with('/') || short.starts_with('~') {
                    dir = dir.or_else(|| Some(PathBuf::from(short)));
                } else {
                    url = Some(self.options.format_url(short));
                }
            }
            _ => {}
        }

        let (name, dir, dev) = if let Some(dir) = dir {
            let dir = expand_tilde(&dir).unwrap_or(dir);
            let name = table
                .name
                .clone()
                .unwrap_or_else(|| derive_name(&dir.to_string_lossy()));
            (name, dir, table.dev)
        } else if let Some(url) = url.as_deref() {
            let name = table.name.clone().unwrap_or_else(|| derive_name(url));
            let dev = table
                .dev
                .or_else(|| self.options.is_dev_url(url).then_some(true));
            let base = if dev == Some(true) {
                &self.options.dev.path
            } else {
                &self.options.root
            };
            let dir = base.join(&name);
            (name, dir, dev)
        } else {
            let described = table
                .name
                .clone()
                .unwrap_or_else(|| "an unnamed spec".to_string());
            return Err(SpecError::MissingSource(described));
        };

        let mut triggers = Triggers::new();
        let mut fields = toml::Table::new();
        for (key, value) in &table.fields {
            if !self.taxonomy.is_trigger(key) {
                fields.insert(key.clone(), value.clone());
                continue;
            }

            let values = trigger::coerce(value)
                .ok_or_else(|| SpecError::invalid(key.clone(), "a string or a list of strings"))?;
            triggers.insert(key.clone(), values);
        }

        let mut plugin = Plugin::new(name, dir);
        plugin.url = url;
        plugin.dev = dev;
        plugin.lazy = table.lazy;
        plugin.priority = table.priority;
        plugin.config = table.config.clone();
        plugin.triggers = triggers;
        plugin.fields = fields;
        Ok(plugin)
    }

    /// Names reachable through `dependencies` from an enabled, directly declared plugin.
    fn reachable(&self) -> HashSet<&str> {
        let plugins = &self.registry.plugins;
        let mut stack: Vec<&str> = plugins
            .values()
            .filter(|plugin| !plugin.is_dependency)
            .map(|plugin| plugin.name.as_str())
            .collect();

        let mut reachable = HashSet::new();
        while let Some(name) = stack.pop() {
            if !reachable.insert(name) {
                continue;
            }
            if let Some(plugin) = plugins.get(name) {
                stack.extend(plugin.dependencies.iter().map(String::as_str));
            }
        }
        reachable
    }

    /// Disable plugins left dangling by disabled plugins, until nothing changes.
    fn fix_disabled(&mut self) {
        loop {
            let reachable = self.reachable();
            let mut changes = Vec::new();

            for plugin in self.registry.plugins.values() {
                let disabled_dependency = plugin
                    .dependencies
                    .iter()
                    .find(|dependency| self.registry.disabled.contains_key(*dependency));
                if let Some(dependency) = disabled_dependency {
                    changes.push((
                        plugin.name.clone(),
                        format!(
                            "disabling `{}`: its dependency `{dependency}` is disabled",
                            plugin.name
                        ),
                    ));
                    continue;
                }

                let needed = !plugin.is_dependency || reachable.contains(plugin.name.as_str());
                if !needed {
                    changes.push((
                        plugin.name.clone(),
                        format!(
                            "disabling `{}`: no enabled plugin depends on it",
                            plugin.name
                        ),
                    ));
                }
            }

            if changes.is_empty() {
                break;
            }

            for (name, message) in changes {
                self.registry.disable(&name);
                self.notify(Severity::Info, message);
            }
        }

        let mut unknown = Vec::new();
        for plugin in self.registry.plugins.values() {
            for dependency in &plugin.dependencies {
                if self.registry.get(dependency).is_none() {
                    unknown.push(format!(
                        "`{}` depends on `{dependency}`, which is not declared",
                        plugin.name
                    ));
                }
            }
        }
        for message in unknown {
            self.notify(Severity::Warn, message);
        }
    }
}
