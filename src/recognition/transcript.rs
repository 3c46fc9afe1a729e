use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result};

use super::{Frame, RecognitionError, TextRecognizer};

/// Replays text recognized in an earlier run, keyed by frame index.
///
/// The transcript file is a JSON object such as `{"0": "", "1": "m"}`.
#[derive(Debug, Clone, Default)]
pub struct TranscriptRecognizer {
    texts: HashMap<usize, String>,
}

impl TranscriptRecognizer {
    pub fn new(texts: HashMap<usize, String>) -> Self {
        Self { texts }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read transcript from {}", path.display()))?;
        let texts = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse transcript {}", path.display()))?;
        Ok(Self { texts })
    }
}

impl TextRecognizer for TranscriptRecognizer {
    fn recognize(&self, frame: &Frame) -> std::result::Result<String, RecognitionError> {
        self.texts
            .get(&frame.index)
            .cloned()
            .ok_or(RecognitionError::MissingTranscript(frame.index))
    }
}
