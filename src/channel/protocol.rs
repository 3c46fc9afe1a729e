//! Line protocol spoken between the analyzer and the host.
//!
//! Analyzer -> host: a command string followed by a literal `*`, no newline.
//! Host -> analyzer: one decimal millisecond timestamp per line, then EOF.

pub const COMMAND_TERMINATOR: u8 = b'*';
pub const CAPTURE_STARTED: &str = "started capture";
pub const SEND_TIMESTAMPS: &str = "send timestamps";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    CaptureStarted,
    SendTimestamps,
    Unknown(String),
}

impl HostCommand {
    pub fn as_str(&self) -> &str {
        match self {
            HostCommand::CaptureStarted => CAPTURE_STARTED,
            HostCommand::SendTimestamps => SEND_TIMESTAMPS,
            HostCommand::Unknown(raw) => raw,
        }
    }

    /// Wire form, terminator included.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = self.as_str().as_bytes().to_vec();
        bytes.push(COMMAND_TERMINATOR);
        bytes
    }

    /// Parses one message as read up to and including its terminator.
    pub fn decode(raw: &[u8]) -> Self {
        let body = raw.strip_suffix(&[COMMAND_TERMINATOR]).unwrap_or(raw);
        let text = String::from_utf8_lossy(body);
        match text.trim() {
            CAPTURE_STARTED => HostCommand::CaptureStarted,
            SEND_TIMESTAMPS => HostCommand::SendTimestamps,
            other => HostCommand::Unknown(other.to_string()),
        }
    }
}

pub fn encode_timestamp(timestamp_ms: i64) -> String {
    format!("{timestamp_ms}\n")
}
