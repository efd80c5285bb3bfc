//! Encoding and decoding of wire messages.
//!
//! # Wire Format
//!
//! Messages are SBOR-encoded. Messages carried in HTTP headers are further
//! base64-encoded (standard alphabet, padded):
//!
//! ```text
//! base64( SBOR payload )
//! ```

use base64::{engine::general_purpose, Engine as _};
use thiserror::Error;

/// Errors that can occur during message encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("SBOR decode error: {0}")]
    SborDecode(String),

    #[error("SBOR encode error: {0}")]
    SborEncode(String),

    #[error("Invalid base64: {0}")]
    Base64(String),

    #[error("Invalid {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },
}

impl CodecError {
    pub(crate) fn invalid(field: &'static str, reason: impl ToString) -> Self {
        CodecError::InvalidField {
            field,
            reason: reason.to_string(),
        }
    }
}

/// Base64-encode bytes for header transport.
pub fn encode_header(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

/// Decode a base64 header value.
pub fn decode_header(header: &str) -> Result<Vec<u8>, CodecError> {
    general_purpose::STANDARD
        .decode(header.trim())
        .map_err(|e| CodecError::Base64(e.to_string()))
}

/// Implements `encode`/`decode` (SBOR) and `to_header`/`from_header`
/// (SBOR + base64) for wire message types.
macro_rules! wire_codec {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $ty {
                /// SBOR-encode this message.
                pub fn encode(&self) -> Result<Vec<u8>, $crate::CodecError> {
                    sbor::basic_encode(self)
                        .map_err(|e| $crate::CodecError::SborEncode(format!("{:?}", e)))
                }

                /// SBOR-decode a message.
                pub fn decode(bytes: &[u8]) -> Result<Self, $crate::CodecError> {
                    sbor::basic_decode(bytes)
                        .map_err(|e| $crate::CodecError::SborDecode(format!("{:?}", e)))
                }

                /// Encode for transport in a header.
                pub fn to_header(&self) -> Result<String, $crate::CodecError> {
                    Ok($crate::codec::encode_header(&self.encode()?))
                }

                /// Decode from a header value.
                pub fn from_header(header: &str) -> Result<Self, $crate::CodecError> {
                    Self::decode(&$crate::codec::decode_header(header)?)
                }
            }
        )*
    };
}

pub(crate) use wire_codec;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let bytes = vec![0u8, 1, 2, 250, 255];
        let header = encode_header(&bytes);
        assert_eq!(decode_header(&header).unwrap(), bytes);
    }

    #[test]
    fn test_decode_header_rejects_garbage() {
        let err = decode_header("not base64!!").unwrap_err();
        assert!(matches!(err, CodecError::Base64(_)));
        assert!(err.to_string().contains("base64"));
    }
}
