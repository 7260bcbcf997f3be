//! Injectable diagnostic channel
//!
//! Soft contract violations (scheduling on a disabled source, scheduling
//! in the past, no-op reschedules) are reported as warnings, never errors.
//! The engine writes them through a [`DiagnosticSink`] trait object so the
//! channel is injectable: the default forwards to `tracing`, and tests
//! swap in a [`MemorySink`] to assert on the emitted text.

use std::cell::RefCell;
use std::rc::Rc;

/// Destination for engine warnings. Message text is advisory, not part of
/// the engine contract.
pub trait DiagnosticSink {
    fn warn(&mut self, message: &str);
}

/// Default sink: forwards warnings to [`tracing::warn!`].
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn warn(&mut self, message: &str) {
        tracing::warn!("{message}");
    }
}

/// Sink that collects warnings into a shared buffer for inspection.
pub struct MemorySink {
    buffer: Rc<RefCell<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            buffer: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// A handle to the buffer that stays readable after the sink is moved
    /// into the engine.
    pub fn buffer(&self) -> Rc<RefCell<Vec<String>>> {
        Rc::clone(&self.buffer)
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticSink for MemorySink {
    fn warn(&mut self, message: &str) {
        self.buffer.borrow_mut().push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_records_messages() {
        let mut sink = MemorySink::new();
        let buffer = sink.buffer();

        sink.warn("first");
        sink.warn("second");

        let messages = buffer.borrow();
        assert_eq!(messages.as_slice(), ["first", "second"]);
    }
}
