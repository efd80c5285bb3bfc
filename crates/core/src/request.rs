//! Segment exchange request and response envelopes.
//!
//! These are transport-neutral: an HTTP transport maps the header fields
//! onto HTTP headers, an in-process transport hands them straight to the
//! responder.

/// Header carrying base64 segment credentials.
pub const SEGMENT_HEADER: &str = "Livepeer-Segment";

/// Header carrying the base64 payment.
pub const PAYMENT_HEADER: &str = "Livepeer-Payment";

/// Path segments are posted to on the orchestrator.
pub const SEGMENT_PATH: &str = "/segment";

/// An outbound segment submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRequest {
    /// Base URI of the orchestrator's transcoder.
    pub uri: String,
    pub seg_creds: String,
    pub payment: String,
    pub data: Vec<u8>,
    /// Segment duration in seconds.
    pub duration: f64,
}

/// A status code and raw body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl SegmentResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    /// Body as text with surrounding whitespace removed.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_text_trims() {
        let resp = SegmentResponse::new(400, "Insufficient balance\n");
        assert_eq!(resp.text(), "Insufficient balance");
        assert!(!resp.is_success());
    }
}
