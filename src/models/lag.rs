use serde::{Deserialize, Serialize};

/// Host clock minus device clock, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncOffset(i64);

impl SyncOffset {
    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub fn millis(self) -> i64 {
        self.0
    }
}

/// One keystroke paired with the first frame that echoed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LagMatch {
    /// Server event index `j` (1-based keystroke number).
    pub key_index: usize,
    pub frame_index: usize,
    pub lag_ms: i64,
}

impl LagMatch {
    /// Line shown to the operator for this keystroke.
    pub fn display_line(&self) -> String {
        format!("Char = {}\tLag = {}ms", self.key_index, self.lag_ms)
    }
}

/// Per-keystroke lag values in keystroke order. Unmatched keystrokes leave a
/// gap, so positions do not line up with server event indices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LagResults(Vec<i64>);

impl LagResults {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<i64> {
        self.0
    }
}

impl From<&[LagMatch]> for LagResults {
    fn from(matches: &[LagMatch]) -> Self {
        Self(matches.iter().map(|m| m.lag_ms).collect())
    }
}
