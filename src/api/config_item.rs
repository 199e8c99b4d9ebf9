/// A single value attached to a configuration key, as the host agent parsed it
#[derive(Debug, PartialEq, Clone)]
pub enum ConfigValue {
    Number(f64),
    Boolean(bool),
    String(String),
}

impl From<f64> for ConfigValue {
    fn from(x: f64) -> Self {
        ConfigValue::Number(x)
    }
}

impl From<bool> for ConfigValue {
    fn from(x: bool) -> Self {
        ConfigValue::Boolean(x)
    }
}

impl From<&str> for ConfigValue {
    fn from(x: &str) -> Self {
        ConfigValue::String(x.to_owned())
    }
}

impl From<String> for ConfigValue {
    fn from(x: String) -> Self {
        ConfigValue::String(x)
    }
}

/// A node of the configuration tree the host hands to an extension. A key may carry values,
/// children, or both:
///
/// ```text
/// MetricPrefix "Custom Metrics|Extension Starter"
/// <Server>
///     Name "node1"
/// </Server>
/// ```
#[derive(Debug, PartialEq, Clone)]
pub struct ConfigItem {
    pub key: String,
    pub values: Vec<ConfigValue>,
    pub children: Vec<ConfigItem>,
}

impl ConfigItem {
    pub fn new<T: Into<String>>(key: T) -> ConfigItem {
        ConfigItem {
            key: key.into(),
            values: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Shorthand for a key with a single value
    pub fn with_value<T: Into<String>, V: Into<ConfigValue>>(key: T, value: V) -> ConfigItem {
        ConfigItem::new(key).value(value)
    }

    pub fn value<V: Into<ConfigValue>>(mut self, value: V) -> ConfigItem {
        self.values.push(value.into());
        self
    }

    pub fn child(mut self, child: ConfigItem) -> ConfigItem {
        self.children.push(child);
        self
    }
}
