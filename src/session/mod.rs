pub mod controller;
pub mod sink;

pub use controller::{replay, AnalysisSession, SessionConfig, SessionOutcome};
pub use sink::{LogSink, ResultSink, WriterSink};
