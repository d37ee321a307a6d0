use std::collections::BTreeMap;
use std::fmt;

use crate::plugin::descriptor::{Plugin, PluginKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
    /// Module being imported when the notification was queued.
    pub module: Option<String>,
}

/// The result of one resolution pass.
///
/// `plugins` and `disabled` never share a key.
#[derive(Debug, Default)]
pub struct Registry {
    pub plugins: BTreeMap<String, Plugin>,
    pub disabled: BTreeMap<String, Plugin>,
    /// Imported module names, in import order.
    pub modules: Vec<String>,
    pub notifications: Vec<Notification>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&mut self, severity: Severity, message: impl Into<String>, module: Option<&str>) {
        let message = message.into();
        match severity {
            Severity::Debug => tracing::debug!(module, "{message}"),
            Severity::Info => tracing::info!(module, "{message}"),
            Severity::Warn => tracing::warn!(module, "{message}"),
            Severity::Error => tracing::error!(module, "{message}"),
        }

        self.notifications.push(Notification {
            message,
            severity,
            module: module.map(str::to_string),
        });
    }

    pub fn notifications_at(&self, min: Severity) -> impl Iterator<Item = &Notification> {
        self.notifications
            .iter()
            .filter(move |notification| notification.severity >= min)
    }

    pub fn has_errors(&self) -> bool {
        self.notifications_at(Severity::Error).next().is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Plugin> {
        self.plugins.get(name).or_else(|| self.disabled.get(name))
    }

    /// Move an enabled plugin into `disabled`. Returns false if it was not enabled.
    pub fn disable(&mut self, name: &str) -> bool {
        let Some(mut plugin) = self.plugins.remove(name) else {
            return false;
        };

        plugin.kind = PluginKind::Disabled;
        self.disabled.insert(plugin.name.clone(), plugin);
        true
    }

    /// Copy bookkeeping from a previous registry onto same-named plugins.
    pub fn carry_over(&mut self, previous: &Registry) {
        for (name, plugin) in self.plugins.iter_mut().chain(self.disabled.iter_mut()) {
            if let Some(old) = previous.get(name) {
                plugin.bookkeeping = old.bookkeeping.clone();
            }
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        };

        match self.module.as_ref() {
            Some(module) => write!(f, "[{level}] {module}: {}", self.message),
            None => write!(f, "[{level}] {}", self.message),
        }
    }
}
