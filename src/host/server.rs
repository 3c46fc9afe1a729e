use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
};
use tokio_util::sync::CancellationToken;

use crate::{
    channel::{protocol::encode_timestamp, HostCommand},
    settings::HostSettings,
};

use super::injector::KeyInjector;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Timing of the synthetic typing run started by the capture-start signal.
#[derive(Debug, Clone)]
pub struct KeyPressPlan {
    pub key: char,
    pub count: usize,
    pub settle: Duration,
    pub interval: Duration,
}

impl From<&HostSettings> for KeyPressPlan {
    fn from(settings: &HostSettings) -> Self {
        Self {
            key: settings.key,
            count: settings.key_press_count,
            settle: Duration::from_millis(settings.settle_ms),
            interval: Duration::from_millis(settings.press_interval_ms),
        }
    }
}

/// Host end of the timestamp protocol: serves one analyzer connection.
pub struct TimestampHost {
    listener: TcpListener,
    plan: KeyPressPlan,
    injector: Arc<dyn KeyInjector>,
}

impl TimestampHost {
    pub async fn bind(addr: &str, plan: KeyPressPlan, injector: Arc<dyn KeyInjector>) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;

        Ok(Self {
            listener,
            plan,
            injector,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().context("listener has no local address")
    }

    /// Accepts one connection and answers it until the timestamps are sent
    /// or the peer hangs up. Returns the timestamps recorded during the run.
    pub async fn serve(self, cancel: CancellationToken) -> Result<Vec<i64>> {
        let (stream, peer) = tokio::select! {
            accepted = self.listener.accept() => accepted.context("accept failed")?,
            _ = cancel.cancelled() => {
                log_info!("host shutting down before a connection arrived");
                return Ok(Vec::new());
            }
        };
        log_info!("Got connection from {}", peer);

        handle_connection(stream, &self.plan, Arc::clone(&self.injector), &cancel).await
    }
}

async fn handle_connection(
    stream: TcpStream,
    plan: &KeyPressPlan,
    injector: Arc<dyn KeyInjector>,
    cancel: &CancellationToken,
) -> Result<Vec<i64>> {
    let mut stream = BufReader::new(stream);
    let mut timestamps: Vec<i64> = Vec::new();
    let mut captured = false;

    loop {
        let mut message = Vec::new();
        let read = tokio::select! {
            read = stream.read_until(b'*', &mut message) => read.context("failed to read command")?,
            _ = cancel.cancelled() => {
                log_info!("host shutting down mid-session");
                return Ok(timestamps);
            }
        };
        if read == 0 {
            log_warn!("analyzer closed the connection before requesting timestamps");
            return Ok(timestamps);
        }

        match HostCommand::decode(&message) {
            HostCommand::CaptureStarted if captured => {
                log_warn!("ignoring repeated capture start");
            }
            HostCommand::CaptureStarted => {
                captured = true;
                timestamps = simulate_key_presses(plan, Arc::clone(&injector), cancel).await;
                log_info!("Key simulation ended after {} presses", timestamps.len().saturating_sub(1));
            }
            HostCommand::SendTimestamps => {
                send_timestamps(stream.get_mut(), &timestamps).await?;
                return Ok(timestamps);
            }
            HostCommand::Unknown(raw) => {
                log_warn!("ignoring unknown command {:?}", raw);
            }
        }
    }
}

/// Records the reference time, waits for the device to settle, then types
/// the key `plan.count` times, stamping each press.
///
/// An injection failure ends the run early; presses already made keep their
/// timestamps so marker lengths stay aligned with indices.
async fn simulate_key_presses(
    plan: &KeyPressPlan,
    injector: Arc<dyn KeyInjector>,
    cancel: &CancellationToken,
) -> Vec<i64> {
    let mut timestamps = Vec::with_capacity(plan.count + 1);
    timestamps.push(Utc::now().timestamp_millis());

    if !pause(plan.settle, cancel).await {
        return timestamps;
    }

    for press in 1..=plan.count {
        let key = plan.key;
        let injector = Arc::clone(&injector);
        let injected = tokio::task::spawn_blocking(move || injector.inject(key)).await;

        match injected {
            Ok(Ok(())) => timestamps.push(Utc::now().timestamp_millis()),
            Ok(Err(err)) => {
                log_error!("key injection {} failed: {err:#}", press);
                break;
            }
            Err(err) => {
                log_error!("key injection worker join failed: {err}");
                break;
            }
        }

        if !pause(plan.interval, cancel).await {
            break;
        }
    }

    timestamps
}

/// Sleeps for `duration`; false if cancelled first.
async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = cancel.cancelled() => false,
    }
}

async fn send_timestamps(stream: &mut TcpStream, timestamps: &[i64]) -> Result<()> {
    for ts in timestamps {
        stream
            .write_all(encode_timestamp(*ts).as_bytes())
            .await
            .context("failed to send timestamp")?;
    }
    stream.flush().await?;
    stream.shutdown().await.context("failed to close timestamp stream")?;
    log_info!("Sent {} timestamps", timestamps.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::injector::DryRunInjector;
    use std::sync::Mutex;

    struct FailingAfter {
        allowed: usize,
        calls: Mutex<usize>,
    }

    impl KeyInjector for FailingAfter {
        fn inject(&self, _key: char) -> Result<()> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls > self.allowed {
                anyhow::bail!("keyboard unplugged");
            }
            Ok(())
        }
    }

    fn fast_plan(count: usize) -> KeyPressPlan {
        KeyPressPlan {
            key: 'm',
            count,
            settle: Duration::from_millis(5),
            interval: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn records_reference_plus_one_timestamp_per_press() {
        let timestamps =
            simulate_key_presses(&fast_plan(4), Arc::new(DryRunInjector), &CancellationToken::new()).await;

        assert_eq!(timestamps.len(), 5);
        assert!(timestamps.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(timestamps[1] - timestamps[0] >= 5);
    }

    #[tokio::test]
    async fn injection_failure_keeps_earlier_presses() {
        let injector = Arc::new(FailingAfter {
            allowed: 2,
            calls: Mutex::new(0),
        });

        let timestamps = simulate_key_presses(&fast_plan(5), injector, &CancellationToken::new()).await;
        assert_eq!(timestamps.len(), 3);
    }

    #[tokio::test]
    async fn cancellation_stops_the_typing_run() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let plan = KeyPressPlan {
            settle: Duration::from_secs(60),
            ..fast_plan(3)
        };
        let timestamps = simulate_key_presses(&plan, Arc::new(DryRunInjector), &cancel).await;
        assert_eq!(timestamps.len(), 1);
    }

    #[tokio::test]
    async fn serve_returns_when_cancelled_before_any_connection() {
        let host = TimestampHost::bind("127.0.0.1:0", fast_plan(1), Arc::new(DryRunInjector))
            .await
            .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(host.serve(cancel).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn timestamps_requested_before_capture_are_empty() {
        let host = TimestampHost::bind("127.0.0.1:0", fast_plan(1), Arc::new(DryRunInjector))
            .await
            .unwrap();
        let addr = host.local_addr().unwrap();
        let server = tokio::spawn(host.serve(CancellationToken::new()));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"send timestamps*").await.unwrap();
        let mut reply = String::new();
        tokio::io::AsyncReadExt::read_to_string(&mut client, &mut reply).await.unwrap();

        assert!(reply.is_empty());
        assert!(server.await.unwrap().unwrap().is_empty());
    }
}
