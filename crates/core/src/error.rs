use std::fmt;

/// Malformed range or unit-descriptor text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeParseError {
    pub input: String,
    pub reason: String,
}

impl RangeParseError {
    pub fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RangeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot parse range '{}': {}", self.input, self.reason)
    }
}

impl std::error::Error for RangeParseError {}
