//! Error types for the pidfind-core library.
//!
//! Codec failures are ordinary outcomes while matching: most candidate
//! definitions will not fit a given packet. They still share one error type
//! with the loading and filter errors so callers can use `?` throughout.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pidfind operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all pidfind operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to read a definition or map file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to walk the definitions directory
    #[error("failed to walk definitions directory '{path}': {source}")]
    DirectoryWalk {
        /// Root of the walk
        path: PathBuf,
        /// Underlying walkdir error
        #[source]
        source: walkdir::Error,
    },

    /// Malformed line in a definition or map file
    #[error("{path}:{line}: {details}")]
    DefinitionParse {
        /// File containing the bad line
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// What was wrong with it
        details: String,
    },

    /// Field type name not understood by the codec
    #[error("unknown field type '{0}'")]
    UnknownFieldType(String),

    /// The operator's name filter is not a valid regular expression
    #[error("invalid name filter /{pattern}/: {source}")]
    InvalidFilter {
        /// The pattern as typed
        pattern: String,
        /// Compilation error from the regex engine
        #[source]
        source: regex::Error,
    },

    /// A numeric command argument does not fit a 16-bit opcode
    #[error("invalid opcode '{0}': must be between 0 and 65535")]
    InvalidOpcode(String),

    /// No definition registered under this name (and version)
    #[error("no definition for '{0}'")]
    UnknownDefinition(String),

    /// Raw bytes could not be decoded under a definition
    #[error("cannot decode as {name} at offset {offset}: {details}")]
    Decode {
        /// Definition name
        name: String,
        /// Byte offset where decoding stopped
        offset: usize,
        /// Detailed description of the issue
        details: String,
    },

    /// A record could not be encoded under a definition
    #[error("cannot encode as {name}: {details}")]
    Encode {
        /// Definition name
        name: String,
        /// Detailed description of the issue
        details: String,
    },

    /// Failed to render a decoded record
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl Error {
    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new definition parse error
    pub fn definition_parse(
        path: impl Into<PathBuf>,
        line: usize,
        details: impl Into<String>,
    ) -> Self {
        Self::DefinitionParse {
            path: path.into(),
            line,
            details: details.into(),
        }
    }

    /// Creates a new invalid filter error
    pub fn invalid_filter(pattern: impl Into<String>, source: regex::Error) -> Self {
        Self::InvalidFilter {
            pattern: pattern.into(),
            source,
        }
    }

    /// Creates a new decode error
    pub fn decode(name: impl Into<String>, offset: usize, details: impl Into<String>) -> Self {
        Self::Decode {
            name: name.into(),
            offset,
            details: details.into(),
        }
    }

    /// Creates a new encode error
    pub fn encode(name: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Encode {
            name: name.into(),
            details: details.into(),
        }
    }

    /// Returns true if this is a per-candidate codec failure that matching
    /// should swallow
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Decode { .. } | Self::Encode { .. } | Self::UnknownDefinition(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::definition_parse("defs/C_LOGIN.1.def", 3, "missing field name");
        assert_eq!(err.to_string(), "defs/C_LOGIN.1.def:3: missing field name");

        let err = Error::decode("S_CHAT", 12, "buffer underflow");
        assert!(err.to_string().contains("S_CHAT"));
        assert!(err.to_string().contains("offset 12"));
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::decode("C_MOVE", 4, "test").is_recoverable());
        assert!(Error::encode("C_MOVE", "test").is_recoverable());
        assert!(!Error::InvalidOpcode("70000".into()).is_recoverable());
        assert!(!Error::UnknownFieldType("quux".into()).is_recoverable());
    }
}
