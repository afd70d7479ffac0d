//! Hierarchical, timed phase logging.
//!
//! Timing is a feature of the driver, not an afterthought: every loop phase
//! runs under [`PerfLog::run`], which records entry and exit with elapsed
//! milliseconds. Phases nest; nesting is rendered as indentation. Output goes
//! to `tracing` at debug level and, when the log was built with a sink, to
//! the caller-supplied writer as well.

use std::io::Write;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Instant;

/// A nested, timed log of analysis phases. Has no effect on correctness.
#[derive(Default)]
pub struct PerfLog {
    depth: AtomicUsize,
    sink: Option<Mutex<Box<dyn Write + Send>>>,
}

impl PerfLog {
    /// A log that reports through `tracing` only.
    pub fn new() -> Self {
        Self { depth: AtomicUsize::new(0), sink: None }
    }

    /// A log that additionally writes each line to `sink`.
    pub fn with_sink(sink: impl Write + Send + 'static) -> Self {
        Self { depth: AtomicUsize::new(0), sink: Some(Mutex::new(Box::new(sink))) }
    }

    /// Runs `work` as a named phase, logging entry and timed exit.
    pub fn run<T>(&self, label: &str, work: impl FnOnce() -> T) -> T {
        self.emit(&format!("+{label}"));
        let depth = self.depth.fetch_add(1, Ordering::Relaxed);

        let started = Instant::now();
        let result = work();
        let elapsed_ms = started.elapsed().as_millis();

        self.depth.store(depth, Ordering::Relaxed);
        self.emit(&format!("-{label}: {elapsed_ms} ms"));

        result
    }

    fn emit(&self, message: &str) {
        let indent = "  ".repeat(self.depth.load(Ordering::Relaxed));
        tracing::debug!("{indent}{message}");

        if let Some(sink) = &self.sink {
            let mut sink = sink.lock().expect("perf sink lock poisoned");
            let _ = writeln!(sink, "{indent}{message}");
        }
    }
}

impl std::fmt::Debug for PerfLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerfLog").field("depth", &self.depth.load(Ordering::Relaxed)).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("buffer lock poisoned").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn phases_nest_with_indentation() {
        let buffer = SharedBuffer::default();
        let log = PerfLog::with_sink(buffer.clone());

        let value = log.run("outer", || {
            log.run("inner", || 7);
            42
        });
        assert_eq!(value, 42);

        let text = String::from_utf8(buffer.0.lock().expect("buffer lock poisoned").clone())
            .expect("sink output was not UTF-8");
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "+outer");
        assert!(lines[1].starts_with("  +inner"));
        assert!(lines[2].starts_with("  -inner: "));
        assert!(lines[3].starts_with("-outer: "));
    }

    #[test]
    fn depth_recovers_after_each_phase() {
        let buffer = SharedBuffer::default();
        let log = PerfLog::with_sink(buffer.clone());

        log.run("first", || ());
        log.run("second", || ());

        let text = String::from_utf8(buffer.0.lock().expect("buffer lock poisoned").clone())
            .expect("sink output was not UTF-8");
        assert!(text.lines().all(|line| !line.starts_with(' ')), "sibling phases must not be indented:\n{text}");
    }
}
