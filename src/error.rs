//! Definition of the crate's error and result.

use std::fmt;
use std::io;

use thiserror::Error;

/// Describes a payload that could not be decoded.
pub struct DataCorruption {
    spy: Option<String>,
    comment: String,
}

impl DataCorruption {
    /// Corruption found while decoding the payload of a given spy type.
    pub fn new(spy: impl ToString, comment: String) -> DataCorruption {
        DataCorruption {
            spy: Some(spy.to_string()),
            comment,
        }
    }

    /// Corruption without any spy attached to it.
    pub fn comment_only(comment: impl ToString) -> DataCorruption {
        DataCorruption {
            spy: None,
            comment: comment.to_string(),
        }
    }

    /// Free-form explanation of what went wrong.
    pub fn comment(&self) -> &str {
        &self.comment
    }
}

impl fmt::Debug for DataCorruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "Data corruption")?;
        if let Some(spy) = &self.spy {
            write!(f, " (in payload of `{}`)", spy)?;
        }
        write!(f, ": {}.", self.comment)?;
        Ok(())
    }
}

/// The library's error enum
#[derive(Debug, Error)]
pub enum SpyError {
    /// The spy only supports local use.
    #[error("MatchSpy not suitable for use with remote searches - {operation}() method unimplemented")]
    Unsupported {
        /// Name of the operation that was called.
        operation: &'static str,
    },
    /// A serialized configuration or result payload is truncated or malformed.
    #[error("{:?}", _0)]
    DataCorruption(DataCorruption),
    /// A composite payload refers to a spy type the registry does not know.
    #[error("Match spy type ({0}) was not known by the registry")]
    UnknownSpyType(String),
    /// Invalid argument was passed by the user.
    #[error("An invalid argument was passed: '{0}'")]
    InvalidArgument(String),
}

impl SpyError {
    pub(crate) fn unsupported(operation: &'static str) -> SpyError {
        SpyError::Unsupported { operation }
    }
}

impl From<DataCorruption> for SpyError {
    fn from(data_corruption: DataCorruption) -> SpyError {
        SpyError::DataCorruption(data_corruption)
    }
}

/// Decoders only ever read in-memory payloads, so an io error always
/// means the payload itself is broken.
impl From<io::Error> for SpyError {
    fn from(io_error: io::Error) -> SpyError {
        SpyError::DataCorruption(DataCorruption::comment_only(io_error))
    }
}

impl From<serde_json::Error> for SpyError {
    fn from(error: serde_json::Error) -> SpyError {
        SpyError::InvalidArgument(format!("Invalid spy configuration: {}", error))
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::{DataCorruption, SpyError};

    #[test]
    fn test_unsupported_message() {
        let err = SpyError::unsupported("merge_results");
        assert_eq!(
            err.to_string(),
            "MatchSpy not suitable for use with remote searches - merge_results() method \
             unimplemented"
        );
    }

    #[test]
    fn test_io_error_is_data_corruption() {
        let err: SpyError = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(matches!(err, SpyError::DataCorruption(_)));
    }

    #[test]
    fn test_data_corruption_debug() {
        let corruption = DataCorruption::new("ValueCountSpy", "missing flag".to_string());
        assert_eq!(
            format!("{:?}", corruption),
            "Data corruption (in payload of `ValueCountSpy`): missing flag."
        );
    }
}
