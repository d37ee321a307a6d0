pub mod descriptor;
pub mod error;
pub mod installer;
pub mod lister;
pub mod loader;
pub mod manager;
pub mod merge;
pub mod registry;
pub mod spec;
pub mod trigger;

pub use descriptor::{Plugin, PluginKind};
pub use installer::{Reconciliation, reconcile};
pub use loader::{FsModules, ModuleSource};
pub use manager::Resolver;
pub use registry::{Notification, Registry, Severity};
pub use spec::{Enabled, ImportSpec, RawSpec, SpecTable};
