use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use plugspec::model::config::Options;
use plugspec::plugin::installer::{self, Reconciliation};
use plugspec::plugin::lister::FsLister;
use plugspec::plugin::{FsModules, ImportSpec, RawSpec, Registry, Resolver, Severity};

const DEBOUNCE: Duration = Duration::from_millis(100);

fn main() -> Result<()> {
    // Initialize logging to file (never stdout)
    let log_dir = directories::ProjectDirs::from("", "", "plugspec")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("/tmp"));
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "plugspec.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter("plugspec=info")
        .init();

    tracing::info!("plugspec starting");

    let watch = std::env::args().skip(1).any(|arg| arg == "--watch");
    let options = Options::load()?;
    let spec_dir =
        Options::spec_dir().ok_or_else(|| anyhow!("cannot determine config directory"))?;

    let mut registry = run(&options, &spec_dir, None);
    if !watch {
        return Ok(());
    }

    let (tx, rx) = mpsc::channel();
    let _watcher = watch_specs(&spec_dir, tx)?;

    // A burst of saves settles into one rebuild; bookkeeping is carried over by name.
    while rx.recv().is_ok() {
        while rx.recv_timeout(DEBOUNCE).is_ok() {}

        tracing::info!("spec changed, rebuilding");
        registry = run(&options, &spec_dir, Some(&registry));
    }

    Ok(())
}

fn run(options: &Options, spec_dir: &Path, previous: Option<&Registry>) -> Registry {
    let mut modules = FsModules::new(spec_dir);
    let spec = RawSpec::Import(ImportSpec::new(options.spec.clone()));
    let mut registry = Resolver::new(options, &mut modules).resolve(&spec);

    if let Some(previous) = previous {
        registry.carry_over(previous);
    }

    let plan = installer::reconcile(&mut registry, options, &FsLister);
    print_plan(&registry, &plan);
    registry
}

fn print_plan(registry: &Registry, plan: &Reconciliation) {
    for plugin in installer::missing(registry) {
        println!("install   {plugin}");
    }

    for plugin in registry.plugins.values() {
        if plugin.is_local {
            println!("local     {}", plugin.dir.display());
        } else if plugin.installed {
            println!("keep      {}", plugin.name);
        }
    }

    for plugin in &plan.clean {
        let marker = if plugin.is_symlink { " (symlink, kept)" } else { "" };
        println!("clean     {}{marker}", plugin.dir.display());
    }

    for name in registry.disabled.keys() {
        println!("disabled  {name}");
    }

    for notification in registry.notifications_at(Severity::Warn) {
        eprintln!("{notification}");
    }
}

/// Signals `tx` whenever a spec file under `spec_dir` is created, changed or removed.
fn watch_specs(spec_dir: &Path, tx: mpsc::Sender<()>) -> Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let event = match res {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!("spec watcher error: {err}");
                return;
            }
        };

        let touches_spec = event
            .paths
            .iter()
            .any(|path| path.extension().is_some_and(|ext| ext == "toml"));
        if touches_spec && !matches!(event.kind, EventKind::Access(_)) {
            let _ = tx.send(());
        }
    })?;

    watcher.watch(spec_dir, RecursiveMode::Recursive)?;
    tracing::info!("watching {}", spec_dir.display());
    Ok(watcher)
}
