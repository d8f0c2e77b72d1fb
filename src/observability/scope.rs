//! Begin/complete logging around a unit of work
//!
//! - `{name}_BEGIN` on creation
//! - `{name}_COMPLETE` with `elapsed_ms` on `complete()`
//! - `{name}_FAILED` with a reason on `fail()`
//! - `{name}_INCOMPLETE` if dropped without either

use std::time::Instant;

#[cfg(test)]
use std::sync::{Arc, Mutex};

use super::logger::{Logger, Severity};

/// Where scope lines go.
enum Sink {
    Logger,
    #[cfg(test)]
    Buffer(Arc<Mutex<Vec<u8>>>),
}

pub struct ObservationScope {
    name: &'static str,
    fields: Vec<(&'static str, String)>,
    started: Instant,
    finished: bool,
    sink: Sink,
}

impl ObservationScope {
    pub fn new(name: &'static str, fields: &[(&'static str, &str)]) -> Self {
        Self::with_sink(name, fields, Sink::Logger)
    }

    /// Scope writing its lines into `buffer` instead of the process logger.
    #[cfg(test)]
    fn capturing(
        name: &'static str,
        fields: &[(&'static str, &str)],
        buffer: Arc<Mutex<Vec<u8>>>,
    ) -> Self {
        Self::with_sink(name, fields, Sink::Buffer(buffer))
    }

    fn with_sink(name: &'static str, fields: &[(&'static str, &str)], sink: Sink) -> Self {
        let scope = Self {
            name,
            fields: fields.iter().map(|(k, v)| (*k, v.to_string())).collect(),
            started: Instant::now(),
            finished: false,
            sink,
        };
        scope.emit(Severity::Info, "BEGIN", &[]);
        scope
    }

    pub fn elapsed_ms(&self) -> String {
        self.started.elapsed().as_millis().to_string()
    }

    pub fn complete(mut self, extra: &[(&str, &str)]) {
        self.finished = true;
        let elapsed = self.elapsed_ms();
        let mut fields = extra.to_vec();
        fields.push(("elapsed_ms", &elapsed));
        self.emit(Severity::Info, "COMPLETE", &fields);
    }

    pub fn fail(mut self, reason: &str) {
        self.finished = true;
        let elapsed = self.elapsed_ms();
        self.emit(Severity::Error, "FAILED", &[("reason", reason), ("elapsed_ms", &elapsed)]);
    }

    fn emit(&self, severity: Severity, suffix: &str, extra: &[(&str, &str)]) {
        let event = format!("{}_{}", self.name, suffix);
        let fields = self.all_fields(extra);
        match &self.sink {
            Sink::Logger => Logger::log(severity, &event, &fields),
            #[cfg(test)]
            Sink::Buffer(buffer) => {
                let mut buffer = buffer.lock().unwrap();
                Logger::log_to_writer(severity, &event, &fields, &mut *buffer);
            }
        }
    }

    fn all_fields<'a>(&'a self, extra: &[(&'a str, &'a str)]) -> Vec<(&'a str, &'a str)> {
        self.fields
            .iter()
            .map(|(k, v)| (*k, v.as_str()))
            .chain(extra.iter().copied())
            .collect()
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.finished {
            self.emit(
                Severity::Warn,
                "INCOMPLETE",
                &[("reason", "scope dropped without completion")],
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(buffer: &Arc<Mutex<Vec<u8>>>) -> Vec<serde_json::Value> {
        let bytes = buffer.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_scope_complete() {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let scope = ObservationScope::capturing("TEST", &[("index", "trades")], buffer.clone());
        scope.complete(&[("accepted", "2")]);

        let lines = lines(&buffer);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "TEST_BEGIN");
        assert_eq!(lines[0]["severity"], "INFO");
        assert_eq!(lines[0]["index"], "trades");

        assert_eq!(lines[1]["event"], "TEST_COMPLETE");
        assert_eq!(lines[1]["index"], "trades");
        assert_eq!(lines[1]["accepted"], "2");
        assert!(lines[1]["elapsed_ms"].as_str().unwrap().parse::<u128>().is_ok());
    }

    #[test]
    fn test_scope_fail() {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let scope = ObservationScope::capturing("TEST", &[], buffer.clone());
        scope.fail("boom");

        let lines = lines(&buffer);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["event"], "TEST_FAILED");
        assert_eq!(lines[1]["severity"], "ERROR");
        assert_eq!(lines[1]["reason"], "boom");
        assert!(lines[1].get("elapsed_ms").is_some());
    }

    #[test]
    fn test_scope_drop_without_complete() {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let scope = ObservationScope::capturing("TEST", &[("records", "3")], buffer.clone());
        assert!(!scope.finished);
        drop(scope);

        let lines = lines(&buffer);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["event"], "TEST_INCOMPLETE");
        assert_eq!(lines[1]["severity"], "WARN");
        assert_eq!(lines[1]["records"], "3");
        assert_eq!(lines[1]["reason"], "scope dropped without completion");
    }
}
