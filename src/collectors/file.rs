use super::MetricNamer;
use crate::api::{Metric, MetricValue};
use crate::collector::{Collector, MetricSpec, Target};
use async_trait::async_trait;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::error::Error;

/// Connection parameter naming the file to read
pub const PATH_PARAM: &str = "Path";

/// Collects from a plain text file that some other process keeps up to date. Each line holds a
/// metric name followed by its value:
///
/// ```text
/// # written by the exporter
/// CPU 50
/// Memory Used 0.75
/// ```
///
/// Blank lines and lines starting with `#` are skipped.
#[derive(Debug, Clone)]
pub struct FileCollector {
    namer: MetricNamer,
}

impl FileCollector {
    pub fn new(namer: MetricNamer) -> FileCollector {
        FileCollector { namer }
    }
}

/// Splits each line on its last run of whitespace, so names may contain spaces
fn parse_values(contents: &str) -> BTreeMap<&str, &str> {
    let mut values = BTreeMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match line.rfind(char::is_whitespace) {
            Some(idx) => {
                values.insert(line[..idx].trim_end(), line[idx..].trim_start());
            }
            None => warn!("skipping line without a value: {}", line),
        }
    }

    values
}

#[async_trait]
impl Collector for FileCollector {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch(
        &self,
        target: &Target,
        specs: &[MetricSpec],
    ) -> Result<Vec<Metric>, Box<dyn Error + Send + Sync>> {
        let path = target.param(PATH_PARAM).ok_or_else(|| {
            format!(
                "target '{}' has no '{}' connection parameter",
                target.name(),
                PATH_PARAM
            )
        })?;

        debug!("reading {} for {}", path, target.name());
        let contents = tokio::fs::read_to_string(path).await?;
        let values = parse_values(&contents);

        let mut metrics = Vec::with_capacity(specs.len());
        for spec in specs {
            match values.get(spec.name.as_str()) {
                Some(raw) => {
                    let value = MetricValue::parse(raw);
                    metrics.push(self.namer.build(target, spec, value)?);
                }
                None => warn!("{} not found in {} for {}", spec.name, path, target.name()),
            }
        }

        Ok(metrics)
    }
}
