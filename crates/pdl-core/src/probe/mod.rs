//! Capability probe.
//!
//! One HEAD request through the [`HttpClient`] (redirects followed by the
//! client) to learn the size, whether byte ranges are accepted, the resolved
//! URL, and filename/validator hints. Idempotent; nothing touches the disk.

mod parse;

pub use parse::remote_info_from_head;

use crate::control::AbortToken;
use crate::error::DownloadError;
use crate::http::{DiscardBody, HttpClient, HttpRequest, TransportError};

/// What the server told us about the resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteInfo {
    /// Total size, if `Content-Length` was present and parseable.
    pub content_length: Option<u64>,
    /// True only for `Accept-Ranges: bytes`.
    pub accept_ranges: bool,
    /// URL after redirects; chunk requests go here.
    pub resolved_url: String,
    /// Raw `Content-Disposition` (filename hint).
    pub content_disposition: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

/// Performs the HEAD request and parses the final response.
///
/// Blocking; call from `spawn_blocking` in async code.
pub fn probe(
    client: &dyn HttpClient,
    url: &str,
    abort: &AbortToken,
) -> Result<RemoteInfo, DownloadError> {
    let head = client
        .execute(&HttpRequest::head(url), &mut DiscardBody, abort)
        .map_err(|e| match e {
            TransportError::Aborted => DownloadError::Cancelled,
            TransportError::TooManyRedirects => DownloadError::TooManyRedirects {
                url: url.to_string(),
            },
            other => DownloadError::Probe(other),
        })?;
    if !head.is_success() {
        return Err(DownloadError::ProbeStatus {
            url: url.to_string(),
            status: head.status,
        });
    }
    let info = remote_info_from_head(&head, url);
    tracing::debug!(
        url = %info.resolved_url,
        size = ?info.content_length,
        ranges = info.accept_ranges,
        "probe complete"
    );
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeServer;

    #[test]
    fn probe_reports_size_ranges_and_resolved_url() {
        let server = FakeServer::new(vec![7u8; 300]).redirected_to("http://mirror/file.bin");
        let info = probe(&server, "http://origin/file.bin", &AbortToken::new()).unwrap();
        assert_eq!(info.content_length, Some(300));
        assert!(info.accept_ranges);
        assert_eq!(info.resolved_url, "http://mirror/file.bin");
    }

    #[test]
    fn non_success_status_fails_the_job() {
        let server = FakeServer::new(vec![1; 10]).head_status(404);
        match probe(&server, "http://h/f", &AbortToken::new()) {
            Err(DownloadError::ProbeStatus { status, .. }) => assert_eq!(status, 404),
            other => panic!("expected ProbeStatus, got {:?}", other),
        }
    }

    #[test]
    fn redirect_overflow_is_its_own_error() {
        let server = FakeServer::new(vec![1; 10]).redirect_loop();
        assert!(matches!(
            probe(&server, "http://h/f", &AbortToken::new()),
            Err(DownloadError::TooManyRedirects { .. })
        ));
    }

    #[test]
    fn cancelled_probe() {
        let abort = AbortToken::new();
        abort.abort();
        let server = FakeServer::new(vec![1; 10]);
        assert!(matches!(
            probe(&server, "http://h/f", &abort),
            Err(DownloadError::Cancelled)
        ));
    }
}
