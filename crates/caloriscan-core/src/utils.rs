//! Utility functions for caloriscan-core

use base64::Engine;
use sha2::{Digest, Sha256};

/// Short sha256 digest of a payload, for log lines that must not carry
/// the payload itself.
///
/// # Example
/// ```ignore
/// use caloriscan_core::utils::image_fingerprint;
///
/// log::info!("[detect] Received image {}", image_fingerprint(&bytes));
/// // -> "[detect] Received image 48213 bytes sha256:9f86d081884c"
/// ```
pub fn image_fingerprint(bytes: &[u8]) -> String {
    format!("{} bytes sha256:{}", bytes.len(), short_digest(bytes))
}

/// First 12 hex characters of the payload's sha256
pub fn short_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest
        .iter()
        .take(6)
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Decode a base64 image body.
///
/// Surrounding whitespace and a `data:<mime>;base64,` prefix are tolerated.
/// Returns `None` for anything that is not valid standard base64 or that
/// decodes to zero bytes.
pub fn decode_base64_image(encoded: &str) -> Option<Vec<u8>> {
    let trimmed = encoded.trim();
    let payload = match trimmed.strip_prefix("data:") {
        Some(rest) => rest.split_once(";base64,").map(|(_, data)| data)?,
        None => trimmed,
    };

    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .ok()
        .filter(|bytes| !bytes.is_empty())
}

/// Standard base64 without a data-URI prefix
pub fn encode_base64_image(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_digest_is_stable() {
        // sha256("test") = 9f86d081884c7d65...
        assert_eq!(short_digest(b"test"), "9f86d081884c");
        assert_eq!(image_fingerprint(b"test"), "4 bytes sha256:9f86d081884c");
    }

    #[test]
    fn test_decode_plain_and_data_uri() {
        assert_eq!(decode_base64_image("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(
            decode_base64_image("data:image/png;base64,aGVsbG8=").unwrap(),
            b"hello"
        );
        assert_eq!(decode_base64_image("  aGVsbG8=\n").unwrap(), b"hello");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_base64_image("not base64!!").is_none());
        assert!(decode_base64_image("").is_none());
        assert!(decode_base64_image("data:image/png,abc").is_none());
    }

    #[test]
    fn test_encode_has_no_prefix() {
        assert_eq!(encode_base64_image(b"hello"), "aGVsbG8=");
    }
}
