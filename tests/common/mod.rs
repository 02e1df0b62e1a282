use std::sync::Arc;

use context_redact_logger::{ContextLogger, MemorySink, Severity};
use serde_json::Value;

pub trait RecordExt {
    fn get_record(&self, key: &str) -> Option<Value>;

    fn message(&self) -> &str;
}

impl RecordExt for Value {
    fn get_record(&self, key: &str) -> Option<Value> {
        self.as_object()?.get(key).cloned()
    }

    fn message(&self) -> &str {
        self["message"].as_str().unwrap_or_default()
    }
}

pub fn memory_logger(level: Severity) -> (Arc<ContextLogger>, Arc<MemorySink>) {
    let sink = MemorySink::shared();
    let logger = ContextLogger::builder()
        .level(level)
        .sink(sink.clone())
        .build();
    (Arc::new(logger), sink)
}

pub fn take_records(sink: &MemorySink) -> Vec<Value> {
    sink.take()
        .iter()
        .map(|line| serde_json::from_str(line).expect("every line should be a JSON record"))
        .collect()
}
