use std::future::Future;

use tokio::sync::OnceCell;

use crate::{
    error::{LagError, Result},
    models::SyncOffset,
};

/// Reconciles the host and device clocks from the one event both observed:
/// the capture-start signal.
///
/// The offset is computed once; later calls return the stored value.
#[derive(Debug, Default)]
pub struct ClockSynchronizer {
    offset: OnceCell<SyncOffset>,
}

impl ClockSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset(&self) -> Option<SyncOffset> {
        self.offset.get().copied()
    }

    /// Waits for both the local reference time and the host's reference
    /// timestamp, then fixes the offset. Either operand missing is an error;
    /// the offset is never assumed to be zero.
    pub async fn synchronize<L, S>(&self, local_reference: L, server_reference: S) -> Result<SyncOffset>
    where
        L: Future<Output = Option<i64>>,
        S: Future<Output = Option<i64>>,
    {
        self.offset
            .get_or_try_init(|| async move {
                let (local, server) = tokio::join!(local_reference, server_reference);
                compute_offset(local, server)
            })
            .await
            .copied()
    }
}

pub fn compute_offset(local_reference: Option<i64>, server_reference: Option<i64>) -> Result<SyncOffset> {
    let local = local_reference.ok_or(LagError::MissingSyncData("local capture-start time"))?;
    let server = server_reference.ok_or(LagError::MissingSyncData("host reference timestamp"))?;

    let offset = server
        .checked_sub(local)
        .ok_or(LagError::MissingSyncData("reference timestamps out of range"))?;

    log::info!("Server-host sync offset: {}ms", offset);
    Ok(SyncOffset::from_millis(offset))
}
