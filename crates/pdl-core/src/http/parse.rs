//! Raw response header line parsing (status line, name/value pairs, Content-Range).

/// Status code from an `HTTP/x.y NNN reason` line.
pub fn parse_http_status(line: &str) -> Option<u32> {
    let line = line.trim();
    if !line.starts_with("HTTP/") {
        return None;
    }
    line.split_whitespace().nth(1)?.parse::<u32>().ok()
}

/// Split a `Name: value` line. Returns `None` for blank lines and status lines.
pub fn parse_header_line(line: &str) -> Option<(String, String)> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() || line.starts_with("HTTP/") {
        return None;
    }
    let (name, value) = line.split_once(':')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

/// Parse `bytes start-end/total` (total may be `*`) into an inclusive range.
pub fn parse_content_range(value: &str) -> Option<(u64, u64)> {
    let value = value.trim();
    let rest = value
        .strip_prefix("bytes ")
        .or_else(|| value.strip_prefix("bytes="))?;
    let (range, _total) = rest.split_once('/')?;
    let (start, end) = range.trim().split_once('-')?;
    let start = start.trim().parse::<u64>().ok()?;
    let end = end.trim().parse::<u64>().ok()?;
    if end < start {
        return None;
    }
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_lines() {
        assert_eq!(parse_http_status("HTTP/1.1 206 Partial Content\r\n"), Some(206));
        assert_eq!(parse_http_status("HTTP/2 200"), Some(200));
        assert_eq!(parse_http_status("Content-Length: 5"), None);
    }

    #[test]
    fn header_lines() {
        assert_eq!(
            parse_header_line("Content-Length: 12345\r\n"),
            Some(("Content-Length".to_string(), "12345".to_string()))
        );
        assert_eq!(parse_header_line("\r\n"), None);
        assert_eq!(parse_header_line("HTTP/1.1 200 OK\r\n"), None);
    }

    #[test]
    fn content_range_variants() {
        assert_eq!(parse_content_range("bytes 250-499/1000"), Some((250, 499)));
        assert_eq!(parse_content_range("bytes 0-0/*"), Some((0, 0)));
        assert_eq!(parse_content_range("bytes */1000"), None);
        assert_eq!(parse_content_range("bytes 9-3/10"), None);
        assert_eq!(parse_content_range("items 0-1/2"), None);
    }
}
