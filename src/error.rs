//! Error types for archive cataloguing and entry streaming.

use std::io;

use thiserror::Error;

/// All errors the catalog, the archive primitive and entry streams can produce.
#[derive(Debug, Error)]
pub enum ZipError {
    /// An error originating from the underlying byte source.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A ZIP structure failed a signature or bounds check.
    #[error("Invalid ZIP structure: {0}")]
    InvalidArchive(&'static str),

    /// The archive could not be opened or is not a ZIP container.
    #[error("Cannot open archive {path}: {reason}")]
    ArchiveOpen { path: String, reason: String },

    /// Navigation was lost before every declared entry was seen.
    #[error("Entry enumeration failed: archive declares {expected} entries, but only {found} were found")]
    Enumeration { expected: u64, found: u64 },

    /// The entry record does not belong to this catalog.
    #[error("Entry #{index} ({name}) does not belong to this catalog")]
    EntryMismatch { index: usize, name: String },

    /// Positioning or decompression setup failed for one entry.
    #[error("Cannot open entry #{index} ({name}): {reason}")]
    EntryOpen {
        index: usize,
        name: String,
        reason: String,
    },

    /// The entry uses a compression method this reader cannot decode.
    #[error("Unsupported compression method {method} for {name}")]
    UnsupportedMethod { name: String, method: u16 },

    /// The entry is encrypted.
    #[error("Entry {0} is encrypted")]
    Encrypted(String),

    /// The number of decompressed bytes differs from the declared size.
    #[error("Truncated entry {name}: expected {expected} bytes, but got {actual} bytes")]
    TruncatedEntry {
        name: String,
        expected: u64,
        actual: u64,
    },

    /// The decompressed data does not match the recorded checksum.
    #[error("CRC mismatch for {name}: expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },

    /// A seek target lies outside the resident buffer window.
    #[error("Cannot seek to {position}: outside the buffered window")]
    BadSeek { position: u64 },
}

impl ZipError {
    /// Recover the `ZipError` carried by an `io::Error` returned from an entry stream.
    pub fn from_io(err: &io::Error) -> Option<&ZipError> {
        err.get_ref().and_then(|inner| inner.downcast_ref::<ZipError>())
    }

    /// Take back the `ZipError` carried by an entry stream's `io::Error`,
    /// wrapping any other I/O error as [`ZipError::Io`].
    pub fn from_io_error(err: io::Error) -> ZipError {
        if err.get_ref().is_none_or(|inner| !inner.is::<ZipError>()) {
            return ZipError::Io(err);
        }
        let kind = err.kind();
        match err.into_inner().map(|inner| inner.downcast::<ZipError>()) {
            Some(Ok(zip)) => *zip,
            Some(Err(other)) => ZipError::Io(io::Error::new(kind, other)),
            None => ZipError::Io(io::Error::from(kind)),
        }
    }

    pub(crate) fn into_io(self) -> io::Error {
        match self {
            ZipError::Io(e) => e,
            e @ ZipError::BadSeek { .. } => io::Error::new(io::ErrorKind::InvalidInput, e),
            e => io::Error::new(io::ErrorKind::InvalidData, e),
        }
    }
}

/// A convenience `Result` type alias using the crate's `ZipError` type.
pub type Result<T> = std::result::Result<T, ZipError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_round_trip_keeps_variant() {
        let err = ZipError::CrcMismatch {
            name: "a.txt".to_string(),
            expected: 1,
            actual: 2,
        }
        .into_io();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(matches!(
            ZipError::from_io(&err),
            Some(ZipError::CrcMismatch { expected: 1, actual: 2, .. })
        ));
    }

    #[test]
    fn plain_io_error_is_unwrapped() {
        let err = ZipError::Io(io::Error::from(io::ErrorKind::UnexpectedEof)).into_io();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(ZipError::from_io(&err).is_none());
    }

    #[test]
    fn from_io_error_recovers_variant() {
        let err = ZipError::TruncatedEntry {
            name: "t".to_string(),
            expected: 10,
            actual: 4,
        }
        .into_io();
        assert!(matches!(
            ZipError::from_io_error(err),
            ZipError::TruncatedEntry { expected: 10, actual: 4, .. }
        ));

        let plain = io::Error::other("disk on fire");
        match ZipError::from_io_error(plain) {
            ZipError::Io(e) => assert_eq!(e.to_string(), "disk on fire"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bad_seek_is_invalid_input() {
        let err = ZipError::BadSeek { position: 9 }.into_io();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(
            err.to_string(),
            "Cannot seek to 9: outside the buffered window"
        );
    }
}
