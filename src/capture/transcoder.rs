//! Turns a completed exchange into its pair of WARC records.

use crate::error_handling::types::CaptureError;
use crate::warc::types::{RecordBatch, WarcRecord};

use super::types::Exchange;

/// Produces the record batch for one exchange: a `response` record followed
/// by its `request` record, both pointing at the same target URI.
///
/// The response leads because capture happens once the response is known;
/// within a batch the pairing, not the order, is what replay relies on.
///
/// Fails only for exchanges whose wire bytes could not be fully materialized
/// (empty request or response). Such a failure is scoped to this exchange and
/// never affects the writer or other in-flight captures.
pub fn transcode(exchange: &Exchange) -> Result<RecordBatch, CaptureError> {
    if exchange.request.is_empty() {
        return Err(CaptureError::TruncatedExchange(format!(
            "no request bytes for {}",
            exchange.target_uri
        )));
    }
    if exchange.response.is_empty() {
        return Err(CaptureError::TruncatedExchange(format!(
            "no response bytes for {}",
            exchange.target_uri
        )));
    }

    let mut batch = RecordBatch::new();
    batch
        .records
        .push(WarcRecord::response(&exchange.target_uri, exchange.response.clone()));
    batch.records.push(WarcRecord::request(
        &exchange.target_uri,
        &exchange.host,
        exchange.request.clone(),
    ));
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warc::digest::payload_digest;

    fn exchange() -> Exchange {
        Exchange {
            target_uri: "http://example.com/".to_string(),
            host: "example.com".to_string(),
            request: b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n".to_vec(),
            response: b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello".to_vec(),
        }
    }

    #[test]
    fn produces_paired_records_with_matching_target_uri() {
        let batch = transcode(&exchange()).unwrap();
        assert_eq!(batch.len(), 2);
        let response = &batch.records[0];
        let request = &batch.records[1];
        assert_eq!(response.header("WARC-Type"), Some("response"));
        assert_eq!(request.header("WARC-Type"), Some("request"));
        assert_eq!(
            response.header("WARC-Target-URI"),
            request.header("WARC-Target-URI")
        );
        assert_eq!(request.header("Host"), Some("example.com"));
    }

    #[test]
    fn digests_cover_the_exact_stored_payload() {
        let batch = transcode(&exchange()).unwrap();
        for record in &batch.records {
            assert_eq!(
                record.header("WARC-Payload-Digest").unwrap(),
                payload_digest(&record.payload)
            );
        }
        // The known scenario: response body "hello" digests over the full
        // serialized response bytes, not just the body.
        assert_eq!(
            batch.records[0].header("WARC-Payload-Digest").unwrap(),
            payload_digest(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello")
        );
    }

    #[test]
    fn truncated_exchange_is_rejected_per_exchange() {
        let mut e = exchange();
        e.response.clear();
        assert!(matches!(
            transcode(&e),
            Err(CaptureError::TruncatedExchange(_))
        ));
    }
}
