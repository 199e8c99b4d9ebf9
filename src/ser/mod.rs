use crate::api::{Metric, MetricPath, MetricValue};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

impl Serialize for MetricValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match *self {
            MetricValue::Integer(x) => serializer.serialize_i64(x),
            MetricValue::Float(x) => serializer.serialize_f64(x),
            MetricValue::Text(ref s) => serializer.serialize_str(s),
        }
    }
}

/// Paths serialize to their rendered form
impl Serialize for MetricPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl Serialize for Metric {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Metric", 4)?;
        state.serialize_field("name", self.name())?;
        state.serialize_field("path", self.path())?;
        state.serialize_field("value", self.value())?;
        state.serialize_field("properties", self.properties())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use serde_test;

    use self::serde_test::{assert_ser_tokens, Token};
    use crate::api::{AggregationType, MetricBuilder, MetricPath, MetricProperties, MetricValue};

    #[test]
    fn test_ser_value_integer() {
        assert_ser_tokens(&MetricValue::Integer(10), &[Token::I64(10)]);
    }

    #[test]
    fn test_ser_value_float() {
        assert_ser_tokens(&MetricValue::Float(1.5), &[Token::F64(1.5)]);
    }

    #[test]
    fn test_ser_value_text() {
        assert_ser_tokens(&MetricValue::from("up"), &[Token::Str("up")]);
    }

    #[test]
    fn test_ser_path() {
        let path = MetricPath::new(vec!["App", "Requests"]).unwrap();
        assert_ser_tokens(&path, &[Token::Str("App|Requests")]);
    }

    #[test]
    fn test_ser_metric() {
        let prefix = MetricPath::new(vec!["App"]).unwrap();
        let props = MetricProperties {
            aggregation_type: Some(AggregationType::Observation),
            ..Default::default()
        };
        let metric = MetricBuilder::new("Requests", 10)
            .prefix(&prefix)
            .properties(&props)
            .build()
            .unwrap();

        assert_ser_tokens(
            &metric,
            &[
                Token::Struct {
                    name: "Metric",
                    len: 4,
                },
                Token::Str("name"),
                Token::Str("Requests"),
                Token::Str("path"),
                Token::Str("App|Requests"),
                Token::Str("value"),
                Token::I64(10),
                Token::Str("properties"),
                Token::Map { len: Some(1) },
                Token::Str("AggregationType"),
                Token::Str("OBSERVATION"),
                Token::MapEnd,
                Token::StructEnd,
            ],
        );
    }
}
