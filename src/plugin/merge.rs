//! Field-level merge of two declarations of the same plugin.

use crate::plugin::descriptor::Plugin;

/// Merge `incoming` into `existing` and return the keys whose differing value
/// was silently overwritten.
///
/// Trigger fields are unioned, `dependencies` grow additively, `config` and
/// `priority` are last-writer-wins without complaint. Any other field set on
/// both sides with different values is overwritten by `incoming` and reported.
/// Bookkeeping is never touched.
pub fn merge(existing: &mut Plugin, incoming: Plugin) -> Vec<String> {
    let mut conflicts = Vec::new();

    for (field, values) in incoming.triggers {
        let current = existing.triggers.entry(field).or_default();
        for value in values {
            if !current.contains(&value) {
                current.push(value);
            }
        }
    }

    if incoming.config.is_some() {
        existing.config = incoming.config;
    }
    if incoming.priority.is_some() {
        existing.priority = incoming.priority;
    }

    for dependency in incoming.dependencies {
        if !existing.dependencies.contains(&dependency) {
            existing.dependencies.push(dependency);
        }
    }

    overwrite("url", &mut existing.url, incoming.url, &mut conflicts);
    overwrite("dev", &mut existing.dev, incoming.dev, &mut conflicts);
    overwrite("lazy", &mut existing.lazy, incoming.lazy, &mut conflicts);

    if existing.dir != incoming.dir {
        conflicts.push("dir".to_string());
        existing.dir = incoming.dir;
    }

    for (key, value) in incoming.fields {
        if existing.fields.get(&key).is_some_and(|current| *current != value) {
            conflicts.push(key.clone());
        }
        existing.fields.insert(key, value);
    }

    // A plugin declared directly anywhere is never dependency-only.
    existing.is_dependency = existing.is_dependency && incoming.is_dependency;

    conflicts
}

fn overwrite<T: PartialEq>(
    key: &str,
    slot: &mut Option<T>,
    value: Option<T>,
    conflicts: &mut Vec<String>,
) {
    let Some(value) = value else {
        return;
    };

    if slot.as_ref().is_some_and(|current| *current != value) {
        conflicts.push(key.to_string());
    }
    *slot = Some(value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::spec::Hook;
    use smallvec::smallvec;

    fn plugin() -> Plugin {
        Plugin::new("telescope", "/root/telescope")
    }

    #[test]
    fn triggers_are_unioned() {
        let mut a = plugin();
        a.triggers.insert("event".into(), smallvec!["BufRead".to_string()]);
        let mut b = plugin();
        b.triggers.insert("event".into(), smallvec!["InsertEnter".to_string()]);

        let conflicts = merge(&mut a, b);

        let mut events = a.triggers["event"].to_vec();
        events.sort();
        assert_eq!(events, vec!["BufRead", "InsertEnter"]);
        assert!(conflicts.is_empty());
    }

    #[test]
    fn dependencies_are_additive() {
        let mut a = plugin();
        a.dependencies = vec!["a".into(), "b".into()];
        let mut b = plugin();
        b.dependencies = vec!["b".into(), "c".into()];

        merge(&mut a, b);
        assert_eq!(a.dependencies, vec!["a", "b", "c"]);
    }

    #[test]
    fn config_and_priority_take_incoming_silently() {
        let mut a = plugin();
        a.config = Some(Hook::Value(toml::Value::Boolean(true)));
        a.priority = Some(50);
        let mut b = plugin();
        b.config = Some(Hook::Value(toml::Value::String("setup".into())));
        b.priority = Some(1000);

        let conflicts = merge(&mut a, b);
        assert_eq!(
            a.config,
            Some(Hook::Value(toml::Value::String("setup".into())))
        );
        assert_eq!(a.priority, Some(1000));
        assert!(conflicts.is_empty());
    }

    #[test]
    fn differing_plain_field_is_reported() {
        let mut a = plugin();
        a.fields.insert("branch".into(), "main".into());
        a.fields.insert("tag".into(), "v1".into());
        let mut b = plugin();
        b.fields.insert("branch".into(), "dev".into());
        b.fields.insert("tag".into(), "v1".into());

        let conflicts = merge(&mut a, b);
        assert_eq!(conflicts, vec!["branch"]);
        assert_eq!(a.fields["branch"].as_str(), Some("dev"));
    }

    #[test]
    fn equal_or_one_sided_fields_are_silent() {
        let mut a = plugin();
        a.lazy = Some(true);
        let mut b = plugin();
        b.lazy = Some(true);
        b.url = Some("https://github.com/org/telescope.git".into());

        assert!(merge(&mut a, b).is_empty());
        assert!(a.url.is_some());
    }

    #[test]
    fn dependency_flag_needs_both_sides() {
        let mut a = plugin();
        a.is_dependency = true;
        let mut b = plugin();
        b.is_dependency = true;
        merge(&mut a, b);
        assert!(a.is_dependency);

        let c = plugin();
        merge(&mut a, c);
        assert!(!a.is_dependency);
    }

    #[test]
    fn bookkeeping_is_not_merged() {
        let mut a = plugin();
        a.bookkeeping.insert("loaded", true);
        let mut b = plugin();
        b.bookkeeping.insert("loaded", false);

        merge(&mut a, b);
        assert_eq!(
            a.bookkeeping.get("loaded"),
            Some(&toml::Value::Boolean(true))
        );
    }
}
