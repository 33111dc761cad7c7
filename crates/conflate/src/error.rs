use std::fmt;

use crate::model::LocalityId;

#[derive(Debug)]
pub enum ConflateError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (zero workers, bad radius, etc.).
    ConfigValidation(String),
    /// Registry document could not be parsed.
    DocumentParse(String),
    /// The registry failed to deliver a locality's entities.
    Registry { locality: LocalityId, message: String },
    /// No boundary / name entry for the locality.
    MissingLocality(LocalityId),
    /// Pass stages called out of order.
    InvalidTransition { from: &'static str, to: &'static str },
    /// IO error (file read, etc.).
    Io(String),
}

impl fmt::Display for ConflateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::DocumentParse(msg) => write!(f, "registry document error: {msg}"),
            Self::Registry { locality, message } => {
                write!(f, "{locality}: registry error: {message}")
            }
            Self::MissingLocality(locality) => write!(f, "{locality}: boundary missing"),
            Self::InvalidTransition { from, to } => {
                write!(f, "invalid pass transition: {from} -> {to}")
            }
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ConflateError {}
