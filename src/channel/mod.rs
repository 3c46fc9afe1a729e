pub mod connection;
pub mod protocol;

pub use connection::{RemoteChannel, TimestampDownload};
pub use protocol::HostCommand;
