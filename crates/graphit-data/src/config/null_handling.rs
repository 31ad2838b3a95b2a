//! Null markers recognised in text sources

use serde::{Deserialize, Serialize};

/// Markers read as missing in delimited text, matched exactly
pub const DEFAULT_NULL_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Null value configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NullConfig {
    /// Cell contents treated as missing
    pub patterns: Vec<String>,

    /// Trim surrounding whitespace before matching and parsing
    pub trim_whitespace: bool,

    /// Case sensitive matching
    pub case_sensitive: bool,
}

impl Default for NullConfig {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_NULL_MARKERS.iter().map(|p| p.to_string()).collect(),
            trim_whitespace: true,
            case_sensitive: true,
        }
    }
}

impl NullConfig {
    /// Only the empty cell is null; used for spreadsheet cells
    pub fn empty_only() -> Self {
        Self {
            patterns: vec![String::new()],
            ..Self::default()
        }
    }

    pub fn is_null(&self, value: &str) -> bool {
        let value = if self.trim_whitespace { value.trim() } else { value };
        self.patterns.iter().any(|pattern| {
            if self.case_sensitive {
                value == pattern
            } else {
                value.eq_ignore_ascii_case(pattern)
            }
        })
    }

    /// The cell as it should be parsed, or `None` when it is a null marker
    pub fn clean<'a>(&self, value: &'a str) -> Option<&'a str> {
        if self.is_null(value) {
            return None;
        }
        Some(if self.trim_whitespace { value.trim() } else { value })
    }

    pub fn add_pattern(&mut self, pattern: impl Into<String>) {
        let pattern = pattern.into();
        if !self.patterns.contains(&pattern) {
            self.patterns.push(pattern);
        }
    }
}
