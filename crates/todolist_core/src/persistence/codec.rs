//! Textual encoding of the persisted blob: a JSON array of strings.

use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Encoding/decoding failure for the persisted blob.
#[derive(Debug)]
pub enum CodecError {
    Encode(serde_json::Error),
    /// Blob text is not a JSON array of strings.
    Decode(serde_json::Error),
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encode(err) => write!(f, "failed to encode todo list: {err}"),
            Self::Decode(err) => write!(f, "persisted todo list is malformed: {err}"),
        }
    }
}

impl Error for CodecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Encode(err) | Self::Decode(err) => Some(err),
        }
    }
}

#[derive(Serialize)]
#[serde(transparent)]
struct BlobRef<'a>(&'a [String]);

/// Encodes `items` in order.
pub fn encode_items(items: &[String]) -> Result<String, CodecError> {
    serde_json::to_string(&BlobRef(items)).map_err(CodecError::Encode)
}

/// Decodes a blob produced by [`encode_items`].
pub fn decode_items(blob: &str) -> Result<Vec<String>, CodecError> {
    serde_json::from_str::<Vec<String>>(blob).map_err(CodecError::Decode)
}
