use std::fmt;

use crate::descriptor::Kind;

/// Error classification, stable across context wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnsupportedType,
    TruncatedBuffer,
    InvalidEncoding,
    /// Negative length prefix or leftover bytes after the top-level value.
    Malformed,
    TypeMismatch,
    LimitExceeded,
    Config,
}

/// Returned by every encode, decode and resolve operation.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    #[error("truncated buffer: need {needed} bytes at offset {offset}, {remaining} remaining")]
    TruncatedBuffer {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    #[error("invalid utf-8 string at offset {offset}: {source}")]
    InvalidEncoding {
        offset: usize,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("negative {kind} length {len} at offset {offset}")]
    NegativeLength { kind: Kind, len: i32, offset: usize },

    #[error("{remaining} trailing bytes after value")]
    TrailingBytes { remaining: usize },

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("{kind} length {len} exceeds limit {limit}")]
    LimitExceeded { kind: Kind, len: usize, limit: usize },

    #[error("config error: {0}")]
    Config(String),

    #[error("{path}: {source}")]
    Context {
        path: String,
        #[source]
        source: Box<CodecError>,
    },
}

impl CodecError {
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedType(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn mismatch(expected: impl fmt::Display, found: impl fmt::Display) -> Self {
        Self::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Kind of the innermost error; context wrappers are transparent.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedType(_) => ErrorKind::UnsupportedType,
            Self::TruncatedBuffer { .. } => ErrorKind::TruncatedBuffer,
            Self::InvalidEncoding { .. } => ErrorKind::InvalidEncoding,
            Self::NegativeLength { .. } | Self::TrailingBytes { .. } => ErrorKind::Malformed,
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Self::LimitExceeded { .. } => ErrorKind::LimitExceeded,
            Self::Config(_) => ErrorKind::Config,
            Self::Context { source, .. } => source.kind(),
        }
    }

    /// Innermost error with all context stripped.
    pub fn root(&self) -> &CodecError {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Path accumulated by [`with_context`](Self::with_context), if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Context { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Whether a map decode turns this failure into an absent map instead of
    /// raising it. Only damage to the bytes of an entry qualifies.
    pub fn is_absorbable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::TruncatedBuffer | ErrorKind::InvalidEncoding | ErrorKind::Malformed
        )
    }

    /// Prepend a path segment, preserving the error kind.
    ///
    /// Segments starting with `[` are joined without a dot, so wrapping
    /// `[2]` then `bids` then `Quote` yields `Quote.bids[2]`.
    pub fn with_context(self, segment: impl fmt::Display) -> Self {
        let segment = segment.to_string();
        match self {
            Self::Context { path, source } => {
                let path = if path.starts_with('[') {
                    format!("{segment}{path}")
                } else {
                    format!("{segment}.{path}")
                };
                Self::Context { path, source }
            }
            other => Self::Context {
                path: segment,
                source: Box::new(other),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// From impls: config parse errors → CodecError::Config
// ---------------------------------------------------------------------------

impl From<toml::de::Error> for CodecError {
    fn from(e: toml::de::Error) -> Self {
        Self::config(e.to_string())
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(e: serde_json::Error) -> Self {
        Self::config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_keeps_kind_and_builds_path() {
        let err = CodecError::TruncatedBuffer {
            offset: 4,
            needed: 8,
            remaining: 2,
        }
        .with_context("[2]")
        .with_context("bids")
        .with_context("Quote");

        assert_eq!(err.kind(), ErrorKind::TruncatedBuffer);
        assert_eq!(err.path(), Some("Quote.bids[2]"));
        assert!(matches!(err.root(), CodecError::TruncatedBuffer { needed: 8, .. }));
        assert_eq!(
            err.to_string(),
            "Quote.bids[2]: truncated buffer: need 8 bytes at offset 4, 2 remaining"
        );
    }

    #[test]
    fn absorbable_only_for_data_damage() {
        assert!(CodecError::TruncatedBuffer { offset: 0, needed: 1, remaining: 0 }.is_absorbable());
        assert!(
            CodecError::NegativeLength { kind: Kind::String, len: -1, offset: 0 }
                .with_context("k")
                .is_absorbable()
        );
        assert!(!CodecError::unsupported("Foo").is_absorbable());
        assert!(!CodecError::mismatch("Int32", "String").is_absorbable());
        assert!(
            !CodecError::LimitExceeded { kind: Kind::List, len: 10, limit: 5 }.is_absorbable()
        );
    }
}
