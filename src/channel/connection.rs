use std::sync::Arc;

use chrono::Utc;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
    sync::Mutex,
    task::JoinHandle,
};

use crate::{
    error::{LagError, Result},
    models::ServerEvents,
};

use super::protocol::HostCommand;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

enum ConnectionSlot {
    Connecting(JoinHandle<std::io::Result<TcpStream>>),
    Ready(BufReader<TcpStream>),
    Failed(String),
    Closed,
}

/// Timestamps received before the host closed the stream.
///
/// `truncated` holds the read error that cut the sequence short, if any. The
/// entries read before it are kept.
#[derive(Debug)]
pub struct TimestampDownload {
    pub events: ServerEvents,
    pub truncated: Option<LagError>,
}

/// The analyzer's single connection to the host process.
///
/// Cloning shares the connection. Every exchange takes the connection lock for
/// its full duration, so only one exchange is ever in flight.
#[derive(Clone)]
pub struct RemoteChannel {
    addr: Arc<str>,
    slot: Arc<Mutex<ConnectionSlot>>,
}

impl RemoteChannel {
    /// Starts connecting in the background and returns immediately. Must be
    /// called from within a tokio runtime.
    pub fn connect(addr: impl Into<String>) -> Self {
        let addr: Arc<str> = Arc::from(addr.into());
        let target = Arc::clone(&addr);
        let handle = tokio::spawn(async move { TcpStream::connect(target.as_ref()).await });

        Self {
            addr,
            slot: Arc::new(Mutex::new(ConnectionSlot::Connecting(handle))),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Tells the host that capture has started and returns the local send
    /// time in epoch milliseconds.
    pub async fn signal_capture_start(&self) -> Result<i64> {
        let mut slot = self.slot.lock().await;
        let stream = ready(&mut slot, &self.addr).await?;

        let sent_at = Utc::now().timestamp_millis();
        send(stream, &HostCommand::CaptureStarted).await?;

        log_info!("Capture start signalled at {}", sent_at);
        Ok(sent_at)
    }

    /// Requests the keypress timestamps and reads them until the host closes
    /// the stream. The connection is unusable afterwards.
    pub async fn download_timestamps(&self) -> Result<TimestampDownload> {
        let mut slot = self.slot.lock().await;
        let stream = ready(&mut slot, &self.addr).await?;

        send(stream, &HostCommand::SendTimestamps).await?;

        let mut timestamps = Vec::new();
        let mut truncated = None;
        let mut line = String::new();
        loop {
            line.clear();
            match stream.read_line(&mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    match trimmed.parse::<i64>() {
                        Ok(ts) => timestamps.push(ts),
                        Err(err) => {
                            truncated = Some(LagError::StreamRead {
                                read: timestamps.len(),
                                reason: format!("invalid timestamp {trimmed:?}: {err}"),
                            });
                            break;
                        }
                    }
                }
                Err(err) => {
                    truncated = Some(LagError::StreamRead {
                        read: timestamps.len(),
                        reason: err.to_string(),
                    });
                    break;
                }
            }
        }

        *slot = ConnectionSlot::Closed;

        if let Some(err) = &truncated {
            log_warn!("{err}; keeping {} timestamps", timestamps.len());
        }
        log_debug!("Downloaded timestamps: {:?}", timestamps);
        log_info!("Downloaded {} server timestamps", timestamps.len());

        Ok(TimestampDownload {
            events: ServerEvents::new(timestamps),
            truncated,
        })
    }
}

async fn ready<'a>(
    slot: &'a mut ConnectionSlot,
    addr: &str,
) -> Result<&'a mut BufReader<TcpStream>> {
    if let ConnectionSlot::Connecting(handle) = &mut *slot {
        let next = match handle.await {
            Ok(Ok(stream)) => {
                log_info!("Connection established to {}", addr);
                ConnectionSlot::Ready(BufReader::new(stream))
            }
            Ok(Err(err)) => ConnectionSlot::Failed(format!("{addr}: {err}")),
            Err(err) => ConnectionSlot::Failed(format!("{addr}: connect task failed: {err}")),
        };
        *slot = next;
    }

    match slot {
        ConnectionSlot::Ready(stream) => Ok(stream),
        ConnectionSlot::Failed(reason) => Err(LagError::Connection(reason.clone())),
        ConnectionSlot::Closed => Err(LagError::Connection(format!("{addr}: connection closed"))),
        ConnectionSlot::Connecting(_) => Err(LagError::Connection(format!("{addr}: still connecting"))),
    }
}

async fn send(stream: &mut BufReader<TcpStream>, command: &HostCommand) -> Result<()> {
    let writer = stream.get_mut();
    writer
        .write_all(&command.encode())
        .await
        .map_err(|err| LagError::Connection(format!("failed to send {:?}: {err}", command.as_str())))?;
    writer
        .flush()
        .await
        .map_err(|err| LagError::Connection(format!("failed to flush {:?}: {err}", command.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn read_command(socket: &mut BufReader<TcpStream>) -> HostCommand {
        let mut buf = Vec::new();
        socket.read_until(b'*', &mut buf).await.unwrap();
        HostCommand::decode(&buf)
    }

    #[tokio::test]
    async fn capture_start_records_local_send_time() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let host = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut socket = BufReader::new(socket);
            read_command(&mut socket).await
        });

        let before = Utc::now().timestamp_millis();
        let channel = RemoteChannel::connect(addr);
        let sent_at = channel.signal_capture_start().await.unwrap();
        let after = Utc::now().timestamp_millis();

        assert!(before <= sent_at && sent_at <= after);
        assert_eq!(host.await.unwrap(), HostCommand::CaptureStarted);
    }

    #[tokio::test]
    async fn download_reads_lines_until_eof() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let host = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut socket = BufReader::new(socket);
            let command = read_command(&mut socket).await;
            socket
                .get_mut()
                .write_all(b"1000\n1050\r\n\n1130\n")
                .await
                .unwrap();
            command
        });

        let channel = RemoteChannel::connect(addr);
        let download = channel.download_timestamps().await.unwrap();

        assert_eq!(host.await.unwrap(), HostCommand::SendTimestamps);
        assert_eq!(download.events.as_slice(), &[1000, 1050, 1130]);
        assert!(download.truncated.is_none());
    }

    #[tokio::test]
    async fn empty_sequence_is_not_a_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut socket = BufReader::new(socket);
            read_command(&mut socket).await;
        });

        let download = RemoteChannel::connect(addr).download_timestamps().await.unwrap();
        assert!(download.events.is_empty());
        assert!(download.truncated.is_none());
    }

    #[tokio::test]
    async fn unparsable_line_truncates_but_keeps_earlier_entries() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut socket = BufReader::new(socket);
            read_command(&mut socket).await;
            socket
                .get_mut()
                .write_all(b"1000\n1050\nmm\n1130\n")
                .await
                .unwrap();
        });

        let download = RemoteChannel::connect(addr).download_timestamps().await.unwrap();
        assert_eq!(download.events.as_slice(), &[1000, 1050]);
        assert!(matches!(download.truncated, Some(LagError::StreamRead { read: 2, .. })));
    }

    #[tokio::test]
    async fn refused_connection_is_a_connection_error() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().to_string()
        };

        let channel = RemoteChannel::connect(addr);
        assert!(matches!(
            channel.signal_capture_start().await,
            Err(LagError::Connection(_))
        ));
        // the failure sticks; no reconnect attempt
        assert!(matches!(
            channel.download_timestamps().await,
            Err(LagError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_exchanges_never_interleave() {
        for _ in 0..20 {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap().to_string();

            let host = tokio::spawn(async move {
                let (socket, _) = listener.accept().await.unwrap();
                let mut socket = BufReader::new(socket);
                let mut raw = Vec::new();
                loop {
                    let mut message = Vec::new();
                    if socket.read_until(b'*', &mut message).await.unwrap() == 0 {
                        break;
                    }
                    raw.extend_from_slice(&message);
                    if HostCommand::decode(&message) == HostCommand::SendTimestamps {
                        socket.get_mut().write_all(b"10\n20\n").await.unwrap();
                        socket.get_mut().shutdown().await.unwrap();
                        break;
                    }
                }
                raw
            });

            let channel = RemoteChannel::connect(addr);
            let other = channel.clone();
            let (capture, download) =
                tokio::join!(channel.signal_capture_start(), other.download_timestamps());

            let download = download.unwrap();
            assert_eq!(download.events.as_slice(), &[10, 20]);
            assert!(download.truncated.is_none());

            let raw = host.await.unwrap();
            if capture.is_ok() {
                assert_eq!(raw, b"started capture*send timestamps*");
            } else {
                // the download won the lock and closed the connection
                assert!(matches!(capture, Err(LagError::Connection(_))));
                assert_eq!(raw, b"send timestamps*");
            }
        }
    }

    #[tokio::test]
    async fn channel_is_closed_after_download() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut socket = BufReader::new(socket);
            read_command(&mut socket).await;
            socket.get_mut().write_all(b"1\n2\n").await.unwrap();
        });

        let channel = RemoteChannel::connect(addr);
        channel.download_timestamps().await.unwrap();
        assert!(matches!(
            channel.signal_capture_start().await,
            Err(LagError::Connection(_))
        ));
    }
}
