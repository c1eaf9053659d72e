//! Payload digest computation for WARC records.

use sha1::{Digest, Sha1};

/// Computes the `WARC-Payload-Digest` value for a record payload.
///
/// Always `sha1:<lowercase hex>` over the exact bytes given, including the
/// empty sequence. The algorithm is a deployment-wide policy: downstream
/// verification tooling assumes every record in an archive uses the same one.
pub fn payload_digest(payload: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(payload);
    format!("sha1:{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_and_prefixed() {
        let d = payload_digest(b"hello");
        assert_eq!(d, "sha1:aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d");
        assert_eq!(d, payload_digest(b"hello"));
    }

    #[test]
    fn empty_payload_digests_cleanly() {
        assert_eq!(
            payload_digest(b""),
            "sha1:da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
    }
}
