//! Progress events emitted by a source update run
//!
//! The string form is the wire format consumed by front ends:
//! a bare integer increment, `invalid [...]`, `failed [...]` and `done`.

use std::fmt;
use std::str::FromStr;

/// One discrete step of update progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Advance the progress counter by this many units
    Advance(u32),

    /// Sources whose origin path could not be reached
    Invalid(Vec<String>),

    /// Sources whose content could not be turned into a table
    Failed(Vec<String>),

    /// Terminal event, emitted exactly once per run
    Done,
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Done)
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::Advance(n) => write!(f, "{}", n),
            ProgressEvent::Invalid(names) => write!(f, "invalid {}", format_name_list(names)),
            ProgressEvent::Failed(names) => write!(f, "failed {}", format_name_list(names)),
            ProgressEvent::Done => write!(f, "done"),
        }
    }
}

/// Error returned when a progress string is not recognised
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseProgressError(pub String);

impl fmt::Display for ParseProgressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognised progress event: {}", self.0)
    }
}

impl std::error::Error for ParseProgressError {}

impl FromStr for ProgressEvent {
    type Err = ParseProgressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "done" {
            return Ok(ProgressEvent::Done);
        }
        if let Some(list) = s.strip_prefix("invalid ") {
            return parse_name_list(list)
                .map(ProgressEvent::Invalid)
                .ok_or_else(|| ParseProgressError(s.to_string()));
        }
        if let Some(list) = s.strip_prefix("failed ") {
            return parse_name_list(list)
                .map(ProgressEvent::Failed)
                .ok_or_else(|| ParseProgressError(s.to_string()));
        }
        s.parse::<u32>()
            .map(ProgressEvent::Advance)
            .map_err(|_| ParseProgressError(s.to_string()))
    }
}

/// Bracketed list of single-quoted names: `['a', 'b']`
pub fn format_name_list(names: &[String]) -> String {
    let quoted: Vec<String> = names
        .iter()
        .map(|n| format!("'{}'", n.replace('\\', "\\\\").replace('\'', "\\'")))
        .collect();
    format!("[{}]", quoted.join(", "))
}

fn parse_name_list(list: &str) -> Option<Vec<String>> {
    let inner = list.trim().strip_prefix('[')?.strip_suffix(']')?;
    let mut names = Vec::new();
    let mut chars = inner.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(' ') | Some(',')) {
            chars.next();
        }
        let quote = match chars.next() {
            None => break,
            Some(q @ ('\'' | '"')) => q,
            Some(_) => return None,
        };
        let mut name = String::new();
        loop {
            match chars.next()? {
                '\\' => name.push(chars.next()?),
                c if c == quote => break,
                c => name.push(c),
            }
        }
        names.push(name);
    }

    Some(names)
}
