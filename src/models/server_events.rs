use serde::{Deserialize, Serialize};

/// Host-side timestamps in epoch milliseconds.
///
/// Index 0 is the synchronization reference recorded when the host saw the
/// capture-start signal; index `j >= 1` is the moment the `j`-th key was
/// injected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerEvents(Vec<i64>);

impl ServerEvents {
    pub fn new(timestamps: Vec<i64>) -> Self {
        Self(timestamps)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    /// Host time of the shared reference event, if any was received.
    pub fn reference(&self) -> Option<i64> {
        self.0.first().copied()
    }

    /// Number of injected keystrokes, i.e. every entry after the reference.
    pub fn keystroke_count(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    pub fn is_non_decreasing(&self) -> bool {
        self.0.windows(2).all(|pair| pair[0] <= pair[1])
    }
}

impl From<Vec<i64>> for ServerEvents {
    fn from(timestamps: Vec<i64>) -> Self {
        Self(timestamps)
    }
}
