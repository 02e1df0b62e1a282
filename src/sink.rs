//! Destinations for formatted log lines.

use std::{
    io::Write,
    sync::{Arc, Mutex, PoisonError},
};

/// Accepts fully formatted, already redacted log lines.
pub trait Sink: Send + Sync {
    fn write(&self, line: &str);

    fn flush(&self) {}
}

impl<S> Sink for Arc<S>
where
    S: Sink + ?Sized,
{
    fn write(&self, line: &str) {
        (**self).write(line);
    }

    fn flush(&self) {
        (**self).flush();
    }
}

/// Writes lines to any [`Write`] implementation, e.g. stdout or a file.
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W> WriterSink<W>
where
    W: Write + Send,
{
    pub const fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W> Sink for WriterSink<W>
where
    W: Write + Send,
{
    fn write(&self, line: &str) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = writer.write_all(line.as_bytes()) {
            // We can't report this through the logger itself.
            eprintln!("Error writing log line: {err}");
        }
    }

    fn flush(&self) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = writer.flush() {
            eprintln!("Error flushing log sink: {err}");
        }
    }
}

/// Keeps every written line in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that can be handed to a logger while the caller keeps reading it.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Removes and returns everything written so far.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Sink for MemorySink {
    fn write(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_owned());
    }
}
