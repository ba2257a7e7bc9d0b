//! Where streamed process output and progress lines go.

use std::sync::Arc;

/// Origin of a streamed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Receives output line by line as it arrives.
pub trait OutputSink: Send + Sync {
    fn line(&self, stream: Stream, line: &str);

    /// Orchestrator progress message.
    fn status(&self, message: &str) {
        self.line(Stream::Stdout, message);
    }
}

/// Writes stdout lines to stdout and stderr lines to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn line(&self, stream: Stream, line: &str) {
        match stream {
            Stream::Stdout => println!("{line}"),
            Stream::Stderr => eprintln!("{line}"),
        }
    }
}

/// Prefixes every line with `[label] `, so concurrent runs stay readable.
pub struct PrefixedSink {
    prefix: String,
    inner: Arc<dyn OutputSink>,
}

impl PrefixedSink {
    /// Wrap `inner`, prefixing lines with `[label] `.
    pub fn new(label: &str, inner: Arc<dyn OutputSink>) -> Self {
        Self {
            prefix: format!("[{label}] "),
            inner,
        }
    }
}

impl OutputSink for PrefixedSink {
    fn line(&self, stream: Stream, line: &str) {
        self.inner.line(stream, &format!("{}{}", self.prefix, line));
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn line(&self, _stream: Stream, _line: &str) {}
}
