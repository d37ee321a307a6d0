use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Values of one trigger field. Most plugins declare one or two.
pub type TriggerValues = SmallVec<[String; 2]>;

/// Trigger field → values, for every taxonomy field a plugin populates.
pub type Triggers = BTreeMap<String, TriggerValues>;

/// The set of descriptor fields that represent deferred-activation conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxonomy {
    fields: Vec<String>,
}

impl Taxonomy {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_trigger(&self, field: &str) -> bool {
        self.fields.iter().any(|name| name == field)
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::new(["event", "keys", "cmd", "ft"])
    }
}

/// Coerce a raw trigger value into a sequence. Scalars become one-element sequences.
pub(crate) fn coerce(value: &toml::Value) -> Option<TriggerValues> {
    match value {
        toml::Value::String(text) => Some(SmallVec::from_iter([text.clone()])),
        toml::Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_taxonomy() {
        let taxonomy = Taxonomy::default();
        assert!(taxonomy.is_trigger("event"));
        assert!(taxonomy.is_trigger("ft"));
        assert!(!taxonomy.is_trigger("branch"));
    }

    #[test]
    fn scalar_is_wrapped() {
        let values = coerce(&toml::Value::String("BufRead".into())).unwrap();
        assert_eq!(values.as_slice(), ["BufRead".to_string()]);
    }

    #[test]
    fn non_string_items_are_rejected() {
        let value = toml::Value::Array(vec![toml::Value::Integer(1)]);
        assert!(coerce(&value).is_none());
    }
}
