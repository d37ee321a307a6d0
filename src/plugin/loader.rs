use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::plugin::error::SpecError;
use crate::plugin::lister::{DirLister, EntryKind, FsLister};
use crate::plugin::spec::RawSpec;

/// Enumerates and loads spec modules.
pub trait ModuleSource {
    /// Call `visit` once per module found under `module`, the module itself included.
    fn for_each_submodule(&mut self, module: &str, visit: &mut dyn FnMut(&str));

    /// Forget anything remembered about `module` before it is loaded again.
    fn unload(&mut self, module: &str);

    fn load(&mut self, module: &str) -> anyhow::Result<RawSpec>;

    /// Forget any module index built by earlier listings.
    fn invalidate_index(&mut self);
}

/// Dotted module paths over a directory of TOML files.
///
/// `plugins.lang` is `plugins/lang.toml` or `plugins/lang/init.toml`. Each file
/// holds its spec under a top-level `spec` key.
#[derive(Debug)]
pub struct FsModules {
    root: PathBuf,
    index: BTreeMap<String, PathBuf>,
}

impl FsModules {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index: BTreeMap::new(),
        }
    }

    /// Whether a listing has populated the index since it was last invalidated.
    pub fn is_indexed(&self) -> bool {
        !self.index.is_empty()
    }

    fn module_file(&self, module: &str) -> Option<PathBuf> {
        let base = self.root.join(module.replace('.', "/"));
        let mut flat = base.clone().into_os_string();
        flat.push(".toml");

        [PathBuf::from(flat), base.join("init.toml")]
            .into_iter()
            .find(|path| path.is_file())
    }

    fn index_module(&mut self, module: &str, visit: &mut dyn FnMut(&str)) -> bool {
        let Some(file) = self.module_file(module) else {
            return false;
        };

        self.index.insert(module.to_string(), file);
        visit(module);
        true
    }

    fn read_spec(path: &Path) -> Result<RawSpec, SpecError> {
        let raw = fs::read_to_string(path).map_err(|source| SpecError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut doc: toml::Table = toml::from_str(&raw).map_err(|source| SpecError::Toml {
            path: path.to_path_buf(),
            source,
        })?;

        let spec = doc
            .remove("spec")
            .ok_or_else(|| SpecError::invalid("spec", "a top-level spec value"))?;
        RawSpec::from_value(spec)
    }
}

impl ModuleSource for FsModules {
    fn for_each_submodule(&mut self, module: &str, visit: &mut dyn FnMut(&str)) {
        self.index_module(module, visit);

        let dir = self.root.join(module.replace('.', "/"));
        let mut children = FsLister.list(&dir);
        children.sort_by(|a, b| a.name.cmp(&b.name));

        for child in children {
            // A symlink may point at a module file or at a module directory.
            let stem = match (child.kind, child.name.strip_suffix(".toml")) {
                (EntryKind::Directory, _) => child.name.clone(),
                (_, Some("init")) => continue,
                (_, Some(stem)) => stem.to_string(),
                (EntryKind::Symlink, None) => child.name.clone(),
                (EntryKind::Other, None) => continue,
            };

            self.index_module(&format!("{module}.{stem}"), visit);
        }
    }

    /// Forget where `module` was found, so the next load locates its file again.
    fn unload(&mut self, module: &str) {
        self.index.remove(module);
    }

    fn load(&mut self, module: &str) -> anyhow::Result<RawSpec> {
        let path = match self.index.get(module) {
            Some(path) => path.clone(),
            None => self
                .module_file(module)
                .ok_or_else(|| SpecError::ModuleNotFound(module.to_string()))?,
        };

        let spec = Self::read_spec(&path)?;
        tracing::debug!(module, path = %path.display(), "loaded spec module");
        Ok(spec)
    }

    fn invalidate_index(&mut self) {
        self.index.clear();
    }
}
