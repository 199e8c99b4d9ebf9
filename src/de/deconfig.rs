use crate::api::{ConfigItem, ConfigValue};

/// This looks just like `ConfigValue` except it adds the `Object` association. The host
/// differentiates between values and children; for deserialization we don't. It's kinda like
/// JSON this way.
#[derive(Debug, PartialEq, Clone)]
pub enum DeConfig<'a> {
    Number(f64),
    Boolean(bool),
    String(&'a str),
    Object(Vec<(&'a str, Vec<DeConfig<'a>>)>),
}

/// A configuration commonly repeats a key (one `Server` block per target), so every instance of
/// a key is gathered under a single entry, keeping the order in which keys were first seen.
pub fn from_config(s: &[ConfigItem]) -> Vec<(&str, Vec<DeConfig<'_>>)> {
    let mut props: Vec<(&str, Vec<DeConfig<'_>>)> = Vec::new();
    for item in s {
        let pos = match props.iter().position(|&(key, _)| key == item.key) {
            Some(pos) => pos,
            None => {
                props.push((item.key.as_str(), Vec::new()));
                props.len() - 1
            }
        };

        let entry = &mut props[pos].1;
        entry.extend(item.values.iter().map(value_to_config));
        if !item.children.is_empty() {
            entry.push(DeConfig::Object(from_config(&item.children)));
        }
    }

    props
}

fn value_to_config(v: &ConfigValue) -> DeConfig<'_> {
    match *v {
        ConfigValue::Number(x) => DeConfig::Number(x),
        ConfigValue::Boolean(x) => DeConfig::Boolean(x),
        ConfigValue::String(ref x) => DeConfig::String(x.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groups_repeated_keys_in_order() {
        let items = vec![
            ConfigItem::with_value("b", 1.0),
            ConfigItem::new("a").child(ConfigItem::with_value("Name", "x")),
            ConfigItem::with_value("b", 2.0),
        ];

        let props = from_config(&items);
        assert_eq!(
            props,
            vec![
                ("b", vec![DeConfig::Number(1.0), DeConfig::Number(2.0)]),
                (
                    "a",
                    vec![DeConfig::Object(vec![("Name", vec![DeConfig::String("x")])])]
                ),
            ]
        );
    }

    #[test]
    fn test_key_without_values() {
        let items = vec![ConfigItem::new("empty")];
        assert_eq!(from_config(&items), vec![("empty", vec![])]);
    }
}
