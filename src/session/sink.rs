use std::io::Write;

/// Receives the human-readable lag lines of a session, in keystroke order.
pub trait ResultSink: Send {
    fn publish(&mut self, line: &str);
}

/// Sends lines to the log at info level.
pub struct LogSink;

impl ResultSink for LogSink {
    fn publish(&mut self, line: &str) {
        log::info!("{line}");
    }
}

/// Writes one line per result to any writer, typically stdout.
pub struct WriterSink<W> {
    writer: W,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write + Send> ResultSink for WriterSink<W> {
    fn publish(&mut self, line: &str) {
        if let Err(err) = writeln!(self.writer, "{line}").and_then(|_| self.writer.flush()) {
            log::warn!("Failed to publish result line: {err}");
        }
    }
}

impl ResultSink for Vec<String> {
    fn publish(&mut self, line: &str) {
        self.push(line.to_string());
    }
}
