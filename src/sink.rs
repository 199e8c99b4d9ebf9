use crate::api::{Metric, AGGREGATION_TYPE, CLUSTER_ROLLUP_TYPE, TIME_ROLLUP_TYPE};
use crate::errors::ReportError;
use log::info;
use std::io::Write;
use std::slice;
use std::sync::Mutex;

/// Everything a cycle reports: the metrics of successful targets followed by derived metrics
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Batch {
    collected: Vec<Metric>,
    derived: Vec<Metric>,
}

impl Batch {
    pub fn new(collected: Vec<Metric>, derived: Vec<Metric>) -> Batch {
        Batch { collected, derived }
    }

    pub fn collected(&self) -> &[Metric] {
        &self.collected
    }

    pub fn derived(&self) -> &[Metric] {
        &self.derived
    }

    pub fn len(&self) -> usize {
        self.collected.len() + self.derived.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> std::iter::Chain<slice::Iter<'_, Metric>, slice::Iter<'_, Metric>> {
        self.collected.iter().chain(self.derived.iter())
    }
}

/// Hands a finished batch to the reporting transport. Called exactly once per cycle and never
/// retried within it; the next cycle is the retry.
pub trait ReportSink: Send + Sync {
    fn report(&self, batch: &Batch) -> Result<(), ReportError>;
}

/// Writes metrics in the agent's line format, one per line:
///
/// ```text
/// name=Custom Metrics|Extension Starter|Node1|CPU,value=20,aggregator=AVERAGE
/// ```
pub struct WriterSink<W: Write + Send> {
    // writers aren't thread safe
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> WriterSink<W> {
        WriterSink {
            writer: Mutex::new(writer),
        }
    }

    /// Returns the underlying writer, e.g. to inspect a buffer
    pub fn into_inner(self) -> Result<W, ReportError> {
        self.writer.into_inner().map_err(|_| ReportError::Poisoned)
    }
}

/// Formats a metric as a single line without the trailing newline
pub fn format_line(metric: &Metric) -> String {
    let mut line = format!("name={},value={}", metric.path(), metric.value());
    let optional = [
        ("aggregator", AGGREGATION_TYPE),
        ("time-rollup", TIME_ROLLUP_TYPE),
        ("cluster-rollup", CLUSTER_ROLLUP_TYPE),
    ];

    for &(field, key) in &optional {
        if let Some(value) = metric.property(key) {
            line.push(',');
            line.push_str(field);
            line.push('=');
            line.push_str(value);
        }
    }

    line
}

impl<W: Write + Send> ReportSink for WriterSink<W> {
    fn report(&self, batch: &Batch) -> Result<(), ReportError> {
        let mut buf = String::new();
        for metric in batch.iter() {
            buf.push_str(&format_line(metric));
            buf.push('\n');
        }

        let mut w = self.writer.lock().map_err(|_| ReportError::Poisoned)?;
        w.write_all(buf.as_bytes())?;
        w.flush()?;
        Ok(())
    }
}

/// Logs every metric at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn report(&self, batch: &Batch) -> Result<(), ReportError> {
        for metric in batch.iter() {
            info!("{}", format_line(metric));
        }
        Ok(())
    }
}

/// Keeps every reported batch in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    batches: Mutex<Vec<Batch>>,
}

impl MemorySink {
    pub fn new() -> MemorySink {
        Default::default()
    }

    pub fn batches(&self) -> Vec<Batch> {
        match self.batches.lock() {
            Ok(batches) => batches.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ReportSink for MemorySink {
    fn report(&self, batch: &Batch) -> Result<(), ReportError> {
        let mut batches = self.batches.lock().map_err(|_| ReportError::Poisoned)?;
        batches.push(batch.clone());
        Ok(())
    }
}

impl<T: ReportSink + ?Sized> ReportSink for std::sync::Arc<T> {
    fn report(&self, batch: &Batch) -> Result<(), ReportError> {
        (**self).report(batch)
    }
}

impl<T: ReportSink + ?Sized> ReportSink for Box<T> {
    fn report(&self, batch: &Batch) -> Result<(), ReportError> {
        (**self).report(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{
        AggregationType, ClusterRollup, MetricBuilder, MetricPath, MetricProperties, TimeRollup,
    };
    use std::io;

    fn metric(name: &str, value: i64, properties: &MetricProperties) -> Metric {
        let prefix = MetricPath::parse("Custom Metrics|Extension Starter", '|').unwrap();
        MetricBuilder::new(name, value)
            .prefix(&prefix)
            .properties(properties)
            .build()
            .unwrap()
    }

    #[test]
    fn test_format_line() {
        let plain = metric("Heart Beat", 1, &MetricProperties::default());
        assert_eq!(
            format_line(&plain),
            "name=Custom Metrics|Extension Starter|Heart Beat,value=1"
        );

        let props = MetricProperties {
            aggregation_type: Some(AggregationType::Average),
            time_rollup: Some(TimeRollup::Average),
            cluster_rollup: Some(ClusterRollup::Individual),
            ..Default::default()
        };
        assert_eq!(
            format_line(&metric("CPU", 20, &props)),
            "name=Custom Metrics|Extension Starter|CPU,value=20,aggregator=AVERAGE,\
             time-rollup=AVERAGE,cluster-rollup=INDIVIDUAL"
        );
    }

    #[test]
    fn test_writer_sink() {
        let props = MetricProperties::default();
        let batch = Batch::new(
            vec![metric("CPU", 20, &props)],
            vec![metric("Heart Beat", 1, &props)],
        );
        assert_eq!(batch.len(), 2);

        let sink = WriterSink::new(Vec::new());
        sink.report(&batch).unwrap();
        let written = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        assert_eq!(
            written,
            "name=Custom Metrics|Extension Starter|CPU,value=20\n\
             name=Custom Metrics|Extension Starter|Heart Beat,value=1\n"
        );
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_writer_sink_io_error() {
        let batch = Batch::new(vec![metric("CPU", 20, &MetricProperties::default())], vec![]);
        match WriterSink::new(Broken).report(&batch) {
            Err(ReportError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_memory_sink() {
        let sink = MemorySink::new();
        sink.report(&Batch::default()).unwrap();
        sink.report(&Batch::default()).unwrap();
        assert_eq!(sink.batches().len(), 2);
        assert!(sink.batches()[0].is_empty());
    }
}
