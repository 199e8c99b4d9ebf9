//! Deserializes the host's configuration tree into plain serde structs.
//!
//! A key that carries a single value deserializes as a scalar, a key that repeats (or carries
//! several values) as a sequence, and a key with children as a struct or map. Numbers and
//! booleans are accepted where a string is expected, since hosts rarely quote port numbers.
mod deconfig;
mod errors;
pub use self::errors::*;

use self::deconfig::DeConfig;
use crate::api::{ConfigItem, LogLevel};
use serde::de::value::BorrowedStrDeserializer;
use serde::de::{self, Deserialize, DeserializeSeed, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::forward_to_deserialize_any;
use std::borrow::Cow;
use std::slice;

/// Serde documentation shadows the std's Result type which can be really confusing for Rust
/// newcomers, so we compromise by creating an alias but prefixing with "De" to make it standout.
pub type DeResult<T> = Result<T, Error>;

/// Deserializes `T` from the children of the extension's configuration section
pub fn from_config<'a, T>(items: &'a [ConfigItem]) -> DeResult<T>
where
    T: Deserialize<'a>,
{
    let root = DeConfig::Object(deconfig::from_config(items));
    T::deserialize(ValueDeserializer {
        value: &root,
        key: "<root>",
    })
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<LogLevel, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Cow::<'de, str>::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Renders whole numbers without a trailing `.0` so `Port 8080` becomes `"8080"`
fn number_to_string(x: f64) -> String {
    if x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{}", x as i64)
    } else {
        x.to_string()
    }
}

/// Deserializes exactly one value
struct ValueDeserializer<'b, 'de> {
    value: &'b DeConfig<'de>,
    key: &'de str,
}

impl<'b, 'de> ValueDeserializer<'b, 'de> {
    fn integer(&self) -> DeResult<i64> {
        match *self.value {
            DeConfig::Number(x)
                if x.fract() == 0.0 && x >= i64::MIN as f64 && x < i64::MAX as f64 =>
            {
                Ok(x as i64)
            }
            DeConfig::Number(x) => Err(Error(DeError::ExpectInteger(x))),
            _ => Err(Error(DeError::ExpectNumber)),
        }
    }

    fn number(&self) -> DeResult<f64> {
        if let DeConfig::Number(x) = *self.value {
            Ok(x)
        } else {
            Err(Error(DeError::ExpectNumber))
        }
    }
}

macro_rules! deserialize_integer {
    ($($method:ident)*) => {
        $(
            fn $method<V>(self, visitor: V) -> DeResult<V::Value>
            where
                V: Visitor<'de>,
            {
                self.integer().and_then(|x| visitor.visit_i64(x))
            }
        )*
    };
}

impl<'b, 'de> Deserializer<'de> for ValueDeserializer<'b, 'de> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        match *self.value {
            DeConfig::Number(x) => visitor.visit_f64(x),
            DeConfig::Boolean(x) => visitor.visit_bool(x),
            DeConfig::String(x) => visitor.visit_borrowed_str(x),
            DeConfig::Object(ref entries) => visitor.visit_map(ObjectAccess::new(entries)),
        }
    }

    fn deserialize_bool<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        if let DeConfig::Boolean(x) = *self.value {
            visitor.visit_bool(x)
        } else {
            Err(Error(DeError::ExpectBoolean))
        }
    }

    deserialize_integer! {
        deserialize_i8 deserialize_i16 deserialize_i32 deserialize_i64
        deserialize_u8 deserialize_u16 deserialize_u32 deserialize_u64
    }

    fn deserialize_f32<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        self.number().and_then(|x| visitor.visit_f64(x))
    }

    fn deserialize_f64<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        self.number().and_then(|x| visitor.visit_f64(x))
    }

    fn deserialize_str<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_string(visitor)
    }

    fn deserialize_string<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        match *self.value {
            DeConfig::String(x) => visitor.visit_borrowed_str(x),
            DeConfig::Number(x) => visitor.visit_string(number_to_string(x)),
            DeConfig::Boolean(x) => visitor.visit_string(x.to_string()),
            DeConfig::Object(_) => Err(Error(DeError::ExpectString)),
        }
    }

    fn deserialize_option<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_some(self)
    }

    fn deserialize_seq<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_seq(ItemSeq {
            key: self.key,
            values: slice::from_ref(self.value).iter(),
        })
    }

    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        if let DeConfig::Object(ref entries) = *self.value {
            visitor.visit_map(ObjectAccess::new(entries))
        } else {
            Err(Error(DeError::ExpectObject))
        }
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        if let DeConfig::String(x) = *self.value {
            visitor.visit_enum(BorrowedStrDeserializer::new(x))
        } else {
            Err(Error(DeError::ExpectString))
        }
    }

    fn deserialize_newtype_struct<V>(self, _name: &'static str, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }

    forward_to_deserialize_any! {
        char bytes byte_buf unit unit_struct tuple
        tuple_struct map identifier
    }
}

/// Deserializes every value gathered under one key
struct ItemDeserializer<'b, 'de> {
    key: &'de str,
    values: &'b [DeConfig<'de>],
}

impl<'b, 'de> ItemDeserializer<'b, 'de> {
    fn single(&self) -> DeResult<ValueDeserializer<'b, 'de>> {
        if self.values.len() == 1 {
            Ok(ValueDeserializer {
                value: &self.values[0],
                key: self.key,
            })
        } else {
            Err(Error(DeError::ExpectSingleValue(self.key.to_owned())))
        }
    }

    fn seq(&self) -> ItemSeq<'b, 'de> {
        ItemSeq {
            key: self.key,
            values: self.values.iter(),
        }
    }
}

macro_rules! forward_to_single {
    ($($method:ident)*) => {
        $(
            fn $method<V>(self, visitor: V) -> DeResult<V::Value>
            where
                V: Visitor<'de>,
            {
                self.single()?.$method(visitor)
            }
        )*
    };
}

impl<'b, 'de> Deserializer<'de> for ItemDeserializer<'b, 'de> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        if self.values.len() == 1 {
            self.single()?.deserialize_any(visitor)
        } else {
            visitor.visit_seq(self.seq())
        }
    }

    fn deserialize_option<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        if self.values.is_empty() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_seq<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_seq(self.seq())
    }

    fn deserialize_tuple<V>(self, _len: usize, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_seq(self.seq())
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_seq(self.seq())
    }

    fn deserialize_unit_struct<V>(self, name: &'static str, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        self.single()?.deserialize_unit_struct(name, visitor)
    }

    fn deserialize_newtype_struct<V>(self, _name: &'static str, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_struct<V>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        self.single()?.deserialize_struct(name, fields, visitor)
    }

    fn deserialize_enum<V>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        self.single()?.deserialize_enum(name, variants, visitor)
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }

    forward_to_single! {
        deserialize_bool
        deserialize_i8 deserialize_i16 deserialize_i32 deserialize_i64
        deserialize_u8 deserialize_u16 deserialize_u32 deserialize_u64
        deserialize_f32 deserialize_f64
        deserialize_char deserialize_str deserialize_string
        deserialize_bytes deserialize_byte_buf deserialize_unit
        deserialize_map deserialize_identifier
    }
}

struct ItemSeq<'b, 'de> {
    key: &'de str,
    values: slice::Iter<'b, DeConfig<'de>>,
}

impl<'b, 'de> SeqAccess<'de> for ItemSeq<'b, 'de> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> DeResult<Option<T::Value>>
    where
        T: DeserializeSeed<'de>,
    {
        match self.values.next() {
            Some(value) => seed
                .deserialize(ValueDeserializer {
                    value,
                    key: self.key,
                })
                .map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.values.len())
    }
}

type Entry<'de> = (&'de str, Vec<DeConfig<'de>>);

struct ObjectAccess<'b, 'de> {
    entries: slice::Iter<'b, Entry<'de>>,
    current: Option<&'b Entry<'de>>,
}

impl<'b, 'de> ObjectAccess<'b, 'de> {
    fn new(entries: &'b [Entry<'de>]) -> Self {
        ObjectAccess {
            entries: entries.iter(),
            current: None,
        }
    }
}

impl<'b, 'de> MapAccess<'de> for ObjectAccess<'b, 'de> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> DeResult<Option<K::Value>>
    where
        K: DeserializeSeed<'de>,
    {
        match self.entries.next() {
            Some(entry) => {
                self.current = Some(entry);
                seed.deserialize(BorrowedStrDeserializer::new(entry.0))
                    .map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> DeResult<V::Value>
    where
        V: DeserializeSeed<'de>,
    {
        let &(key, ref values) = self
            .current
            .take()
            .ok_or_else(|| Error(DeError::SerdeError(String::from("value requested before key"))))?;

        seed.deserialize(ItemDeserializer { key, values })
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ConfigItem;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[test]
    fn test_serde_simple_bool() {
        #[derive(Deserialize, PartialEq, Eq, Debug)]
        struct MyStruct {
            my_bool: bool,
        }

        let items = vec![ConfigItem::with_value("my_bool", true)];
        let actual: MyStruct = from_config(&items).unwrap();
        assert_eq!(MyStruct { my_bool: true }, actual);
    }

    #[test]
    fn test_serde_empty_bool() {
        #[derive(Deserialize, PartialEq, Eq, Debug)]
        struct MyStruct {
            my_bool: Option<bool>,
        }

        let actual: MyStruct = from_config(&[]).unwrap();
        assert_eq!(MyStruct { my_bool: None }, actual);
    }

    #[test]
    fn test_serde_simple_number() {
        #[derive(Deserialize, PartialEq, Eq, Debug)]
        struct MyStruct {
            my_int: i8,
            my_usize: usize,
        }

        let items = vec![
            ConfigItem::with_value("my_int", -1.0),
            ConfigItem::with_value("my_usize", 4.0),
        ];
        let actual: MyStruct = from_config(&items).unwrap();
        assert_eq!(
            MyStruct {
                my_int: -1,
                my_usize: 4
            },
            actual
        );
    }

    #[test]
    fn test_serde_fractional_integer() {
        #[derive(Deserialize, Debug)]
        struct MyStruct {
            #[allow(dead_code)]
            my_int: u32,
        }

        let items = vec![ConfigItem::with_value("my_int", 1.5)];
        let err = from_config::<MyStruct>(&items).unwrap_err();
        assert_eq!(err, Error(DeError::ExpectInteger(1.5)));
    }

    #[test]
    fn test_serde_negative_unsigned() {
        #[derive(Deserialize, Debug)]
        struct MyStruct {
            #[allow(dead_code)]
            my_int: u32,
        }

        let items = vec![ConfigItem::with_value("my_int", -1.0)];
        assert!(from_config::<MyStruct>(&items).is_err());
    }

    #[test]
    fn test_serde_simple_string() {
        #[derive(Deserialize, PartialEq, Eq, Debug)]
        struct MyStruct {
            my_string: String,
        }

        let items = vec![ConfigItem::with_value("my_string", "HEY")];
        let actual: MyStruct = from_config(&items).unwrap();
        assert_eq!(
            MyStruct {
                my_string: String::from("HEY"),
            },
            actual
        );
    }

    #[test]
    fn test_serde_simple_str() {
        #[derive(Deserialize, PartialEq, Eq, Debug)]
        struct MyStruct<'a> {
            my_string: &'a str,
        }

        let items = vec![ConfigItem::with_value("my_string", "HEY")];
        let actual: MyStruct<'_> = from_config(&items).unwrap();
        assert_eq!(MyStruct { my_string: "HEY" }, actual);
    }

    #[test]
    fn test_serde_number_as_string() {
        #[derive(Deserialize, PartialEq, Eq, Debug)]
        struct MyStruct {
            port: String,
            ratio: String,
            flag: String,
        }

        let items = vec![
            ConfigItem::with_value("port", 8080.0),
            ConfigItem::with_value("ratio", 0.5),
            ConfigItem::with_value("flag", true),
        ];
        let actual: MyStruct = from_config(&items).unwrap();
        assert_eq!(
            MyStruct {
                port: String::from("8080"),
                ratio: String::from("0.5"),
                flag: String::from("true"),
            },
            actual
        );
    }

    #[test]
    fn test_serde_char() {
        #[derive(Deserialize, PartialEq, Eq, Debug)]
        struct MyStruct {
            sep: char,
        }

        let items = vec![ConfigItem::with_value("sep", "/")];
        let actual: MyStruct = from_config(&items).unwrap();
        assert_eq!(MyStruct { sep: '/' }, actual);

        let items = vec![ConfigItem::with_value("sep", "//")];
        assert!(from_config::<MyStruct>(&items).is_err());
    }

    #[test]
    fn test_serde_vec_of_values() {
        #[derive(Deserialize, PartialEq, Eq, Debug)]
        struct MyStruct {
            ports: Vec<u16>,
        }

        let items = vec![
            ConfigItem::new("ports").value(80.0).value(443.0),
            ConfigItem::with_value("ports", 8080.0),
        ];
        let actual: MyStruct = from_config(&items).unwrap();
        assert_eq!(
            MyStruct {
                ports: vec![80, 443, 8080]
            },
            actual
        );
    }

    #[test]
    fn test_serde_single_value_vec() {
        #[derive(Deserialize, PartialEq, Eq, Debug)]
        struct MyStruct {
            names: Vec<String>,
        }

        let items = vec![ConfigItem::with_value("names", "a")];
        let actual: MyStruct = from_config(&items).unwrap();
        assert_eq!(
            MyStruct {
                names: vec![String::from("a")]
            },
            actual
        );
    }

    #[test]
    fn test_serde_expect_single_value() {
        #[derive(Deserialize, Debug)]
        struct MyStruct {
            #[allow(dead_code)]
            name: String,
        }

        let items = vec![ConfigItem::new("name").value("a").value("b")];
        let err = from_config::<MyStruct>(&items).unwrap_err();
        assert_eq!(err, Error(DeError::ExpectSingleValue(String::from("name"))));
    }

    #[test]
    fn test_serde_nested_structs() {
        #[derive(Deserialize, PartialEq, Eq, Debug)]
        #[serde(rename_all = "PascalCase")]
        struct Node {
            name: String,
            port: Option<u16>,
        }

        #[derive(Deserialize, PartialEq, Eq, Debug)]
        struct MyStruct {
            #[serde(rename = "Node")]
            nodes: Vec<Node>,
        }

        let items = vec![
            ConfigItem::new("Node").child(ConfigItem::with_value("Name", "a")),
            ConfigItem::new("Node")
                .child(ConfigItem::with_value("Name", "b"))
                .child(ConfigItem::with_value("Port", 2003.0)),
        ];
        let actual: MyStruct = from_config(&items).unwrap();
        assert_eq!(
            MyStruct {
                nodes: vec![
                    Node {
                        name: String::from("a"),
                        port: None,
                    },
                    Node {
                        name: String::from("b"),
                        port: Some(2003),
                    },
                ]
            },
            actual
        );
    }

    #[test]
    fn test_serde_map() {
        #[derive(Deserialize, PartialEq, Eq, Debug)]
        struct MyStruct {
            connection: BTreeMap<String, String>,
        }

        let items = vec![ConfigItem::new("connection")
            .child(ConfigItem::with_value("Host", "localhost"))
            .child(ConfigItem::with_value("Port", 9090.0))];
        let actual: MyStruct = from_config(&items).unwrap();

        let mut expected = BTreeMap::new();
        expected.insert(String::from("Host"), String::from("localhost"));
        expected.insert(String::from("Port"), String::from("9090"));
        assert_eq!(MyStruct { connection: expected }, actual);
    }

    #[test]
    fn test_serde_struct_needs_object() {
        #[derive(Deserialize, Debug)]
        struct Inner {
            #[allow(dead_code)]
            a: bool,
        }

        #[derive(Deserialize, Debug)]
        struct MyStruct {
            #[allow(dead_code)]
            inner: Inner,
        }

        let items = vec![ConfigItem::with_value("inner", "nope")];
        let err = from_config::<MyStruct>(&items).unwrap_err();
        assert_eq!(err, Error(DeError::ExpectObject));
    }

    #[test]
    fn test_serde_unit_enum() {
        #[derive(Deserialize, PartialEq, Eq, Debug)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        enum Rollup {
            Average,
            Sum,
        }

        #[derive(Deserialize, PartialEq, Eq, Debug)]
        struct MyStruct {
            rollup: Rollup,
            other: Option<Rollup>,
        }

        let items = vec![ConfigItem::with_value("rollup", "SUM")];
        let actual: MyStruct = from_config(&items).unwrap();
        assert_eq!(
            MyStruct {
                rollup: Rollup::Sum,
                other: None
            },
            actual
        );

        let items = vec![ConfigItem::with_value("rollup", "MEDIAN")];
        assert!(from_config::<MyStruct>(&items).is_err());
    }

    #[test]
    fn test_serde_log_level() {
        #[derive(Deserialize, PartialEq, Eq, Debug)]
        struct MyStruct {
            level: LogLevel,
        }

        let items = vec![ConfigItem::with_value("level", "warning")];
        let actual: MyStruct = from_config(&items).unwrap();
        assert_eq!(
            MyStruct {
                level: LogLevel::Warning
            },
            actual
        );

        let items = vec![ConfigItem::with_value("level", "TRACE")];
        assert!(from_config::<MyStruct>(&items).is_err());
    }

    #[test]
    fn test_serde_deny_unknown() {
        #[derive(Deserialize, PartialEq, Eq, Debug)]
        #[serde(deny_unknown_fields)]
        struct MyStruct {
            a: Option<bool>,
        }

        let items = vec![ConfigItem::with_value("b", true)];
        assert!(from_config::<MyStruct>(&items).is_err());
    }

    #[test]
    fn test_serde_ignore_unknown() {
        #[derive(Deserialize, PartialEq, Eq, Debug)]
        struct MyStruct {
            a: bool,
        }

        let items = vec![
            ConfigItem::new("b").child(ConfigItem::with_value("c", 1.0)),
            ConfigItem::with_value("a", false),
        ];
        let actual: MyStruct = from_config(&items).unwrap();
        assert_eq!(MyStruct { a: false }, actual);
    }
}
