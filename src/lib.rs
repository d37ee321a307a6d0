//! Resolves nested, declarative plugin specs into a flat registry and
//! reconciles that registry against the plugins present on disk.

pub mod model;
pub mod plugin;

pub use model::config::Options;
pub use plugin::{Plugin, RawSpec, Registry, Resolver, reconcile};
