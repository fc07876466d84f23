//! Turn the probe's response head into a [`RemoteInfo`].

use super::RemoteInfo;
use crate::http::ResponseHead;

/// `request_url` is used when the client could not report an effective URL.
pub fn remote_info_from_head(head: &ResponseHead, request_url: &str) -> RemoteInfo {
    let mut info = RemoteInfo {
        resolved_url: if head.effective_url.is_empty() {
            request_url.to_string()
        } else {
            head.effective_url.clone()
        },
        ..RemoteInfo::default()
    };

    for (name, value) in &head.headers {
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            info.content_length = value.parse::<u64>().ok();
        } else if name.eq_ignore_ascii_case("accept-ranges") {
            info.accept_ranges = value.eq_ignore_ascii_case("bytes");
        } else if name.eq_ignore_ascii_case("etag") {
            info.etag = Some(value.trim_matches('"').to_string());
        } else if name.eq_ignore_ascii_case("last-modified") {
            info.last_modified = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("content-disposition") {
            info.content_disposition = Some(value.to_string());
        }
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head(headers: &[(&str, &str)]) -> ResponseHead {
        ResponseHead {
            status: 200,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            effective_url: String::new(),
        }
    }

    #[test]
    fn content_length_and_ranges() {
        let r = remote_info_from_head(
            &head(&[("Content-Length", "12345"), ("Accept-Ranges", "Bytes")]),
            "http://h/f",
        );
        assert_eq!(r.content_length, Some(12345));
        assert!(r.accept_ranges);
        assert_eq!(r.resolved_url, "http://h/f");
    }

    #[test]
    fn unparsable_length_is_unknown() {
        let r = remote_info_from_head(&head(&[("Content-Length", "lots")]), "http://h/f");
        assert_eq!(r.content_length, None);
    }

    #[test]
    fn accept_ranges_none() {
        let r = remote_info_from_head(
            &head(&[("Content-Length", "999"), ("Accept-Ranges", "none")]),
            "http://h/f",
        );
        assert_eq!(r.content_length, Some(999));
        assert!(!r.accept_ranges);
    }

    #[test]
    fn validators_and_disposition() {
        let r = remote_info_from_head(
            &head(&[
                ("ETag", "\"abc-123\""),
                ("Last-Modified", "Wed, 21 Oct 2015 07:28:00 GMT"),
                ("Content-Disposition", "attachment; filename=\"report.pdf\""),
            ]),
            "http://h/f",
        );
        assert_eq!(r.etag.as_deref(), Some("abc-123"));
        assert_eq!(r.last_modified.as_deref(), Some("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert!(r.content_disposition.unwrap().contains("report.pdf"));
    }
}
