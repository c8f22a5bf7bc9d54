//! Error types for AVI container I/O.

use thiserror::Error;

/// Result type for AVI operations.
pub type Result<T> = std::result::Result<T, AviError>;

/// Errors surfaced to callers of the container API.
///
/// Structural problems found while walking a RIFF tree are not errors in
/// this sense: the demuxer reports them through [`log`] and keeps whatever
/// frames it managed to index. An `AviError` means the operation itself
/// could not produce a result.
#[derive(Error, Debug)]
pub enum AviError {
    /// I/O error while opening or positioning a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input ended (or went bad) in the middle of a read.
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// A buffered output block failed to reach the file; the output is
    /// truncated at the last position that was successfully written.
    #[error("output truncated: a buffered block failed to reach the file")]
    Truncated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            AviError::UnexpectedEof.to_string(),
            "unexpected end of stream"
        );
        assert!(AviError::Truncated.to_string().contains("truncated"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: AviError = io.into();
        assert!(matches!(err, AviError::Io(_)));
    }
}
