use serde::{Deserialize, Serialize};

/// How recognized frame text is compared against the expected marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum MatchMode {
    /// Text must equal the marker.
    Exact,
    /// Text must start with the marker.
    #[default]
    Prefix,
}

/// The on-screen echo expected for keystroke `j`: the unit character repeated
/// `j` times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MarkerConfig {
    pub unit: char,
    pub match_mode: MatchMode,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            unit: 'm',
            match_mode: MatchMode::Prefix,
        }
    }
}

impl MarkerConfig {
    pub fn marker(&self, key_index: usize) -> String {
        self.unit.to_string().repeat(key_index)
    }

    pub fn matches(&self, text: &str, marker: &str) -> bool {
        match self.match_mode {
            MatchMode::Exact => text == marker,
            MatchMode::Prefix => text.starts_with(marker),
        }
    }
}
