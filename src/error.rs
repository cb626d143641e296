use std::io;

use crate::text::TextDecodeError;

/// Error types shared by the PMD/VMD decoders and the mesh converter.
///
/// Every failure is fatal to the whole load: no partial model or motion is
/// ever returned.
#[derive(Debug)]
pub enum MmdError {
    /// IO error occurred (stream truncated or closed)
    Io(io::Error),

    /// Invalid file format (bad magic, bad section framing, out-of-range
    /// reference found by post-parse validation)
    Format(String),

    /// Malformed Shift-JIS bytes in a fixed-width text field
    Encoding(String),
}

impl std::fmt::Display for MmdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MmdError::Io(e) => write!(f, "IO error: {}", e),
            MmdError::Format(msg) => write!(f, "Invalid file format: {}", msg),
            MmdError::Encoding(msg) => write!(f, "Text encoding error: {}", msg),
        }
    }
}

impl std::error::Error for MmdError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MmdError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for MmdError {
    fn from(err: io::Error) -> Self {
        MmdError::Io(err)
    }
}

impl From<binrw::Error> for MmdError {
    fn from(err: binrw::Error) -> Self {
        if err.custom_err::<TextDecodeError>().is_some() {
            return MmdError::Encoding(err.to_string());
        }
        match err {
            binrw::Error::Io(e) => MmdError::Io(e),
            binrw::Error::BadMagic { pos, .. } => {
                MmdError::Format(format!("bad magic at offset {:#x}", pos))
            }
            binrw::Error::Backtrace(bt) => MmdError::from(*bt.error),
            other => MmdError::Format(other.to_string()),
        }
    }
}

/// Result type for all load and conversion operations
pub type Result<T> = std::result::Result<T, MmdError>;
