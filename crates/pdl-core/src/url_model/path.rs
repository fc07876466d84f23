//! Filename hint from the URL path.

use super::content_disposition::percent_decode;

/// Last non-empty path segment, percent-decoded. `None` for the root path or
/// an unparsable URL.
pub fn filename_from_url_path(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let decoded = percent_decode(segment);
    if decoded == "." || decoded == ".." {
        return None;
    }
    Some(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_segment() {
        assert_eq!(
            filename_from_url_path("https://example.com/a/b/file.deb").as_deref(),
            Some("file.deb")
        );
        assert_eq!(
            filename_from_url_path("https://example.com/dir/").as_deref(),
            Some("dir")
        );
    }

    #[test]
    fn root_or_unparsable() {
        assert_eq!(filename_from_url_path("https://example.com/"), None);
        assert_eq!(filename_from_url_path("https://example.com"), None);
        assert_eq!(filename_from_url_path("not a url"), None);
    }

    #[test]
    fn query_ignored_and_escapes_decoded() {
        assert_eq!(
            filename_from_url_path("https://example.com/my%20file.zip?token=abc").as_deref(),
            Some("my file.zip")
        );
        assert_eq!(
            filename_from_url_path("https://example.com/c++.tar").as_deref(),
            Some("c++.tar")
        );
    }
}
