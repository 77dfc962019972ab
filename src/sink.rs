//! Line-oriented build log sinks.
use std::io::Write;

/// Section delimiter in the build log.
pub const BANNER: &str =
    "--------------------------------------------------------------------------";
pub const DEBUG_PREFIX: &str = "[DEBUG] ";
pub const WARNING_PREFIX: &str = "[WARNING] ";

/// Receives progress text one line at a time.
pub trait LineSink {
    fn line(&mut self, text: &str);

    fn banner(&mut self) {
        self.line(BANNER);
    }

    fn warn(&mut self, text: &str) {
        self.line(&format!("{WARNING_PREFIX}{text}"));
    }
}

/// Writes to the process stdout, flushing after every line so output
/// interleaves correctly with the child's.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl LineSink for StdoutSink {
    fn line(&mut self, text: &str) {
        let mut out = std::io::stdout().lock();
        // A closed stdout must not abort the run; the exit status still matters.
        let _ = writeln!(out, "{text}");
        let _ = out.flush();
    }
}

/// Collects lines in memory.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub lines: Vec<String>,
}

#[cfg(test)]
impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|line| line.contains(needle))
    }
}

#[cfg(test)]
impl LineSink for MemorySink {
    fn line(&mut self, text: &str) {
        self.lines.push(text.to_string());
    }
}

/// Wraps a sink and prefixes debug lines, emitting them only when enabled.
pub(crate) struct DebugLog {
    enabled: bool,
}

impl DebugLog {
    pub(crate) fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub(crate) fn line(&self, sink: &mut dyn LineSink, text: &str) {
        tracing::debug!("{text}");
        if self.enabled {
            sink.line(&format!("{DEBUG_PREFIX}{text}"));
        }
    }
}
