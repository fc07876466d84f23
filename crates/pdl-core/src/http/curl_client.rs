//! libcurl-backed [`HttpClient`].
//!
//! One `Easy` handle per request, driven on the calling thread. Header lines
//! are collected per response (cleared on every new status line so redirects
//! leave only the final response); the sink sees the head on the first body
//! write, and abort is polled from both the write and progress callbacks.

use std::cell::RefCell;
use std::str;
use std::time::Duration;

use curl::easy::{Easy, List};

use super::parse::{parse_header_line, parse_http_status};
use super::{BodySink, HttpClient, HttpRequest, Method, ResponseHead, TransportError, MAX_REDIRECTS};
use crate::control::AbortToken;

/// Blocking HTTP client built on the `curl` crate.
#[derive(Debug, Clone, Copy)]
pub struct CurlClient {
    pub connect_timeout: Duration,
    /// Abort when throughput stays below `low_speed_limit` bytes/s for `low_speed_time`.
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
    /// Hard cap on one request so a stuck transfer eventually fails.
    pub timeout: Duration,
}

impl Default for CurlClient {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            low_speed_limit: 1024,
            low_speed_time: Duration::from_secs(60),
            timeout: Duration::from_secs(3600),
        }
    }
}

impl CurlClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn configure(&self, easy: &mut Easy, request: &HttpRequest) -> Result<(), curl::Error> {
        easy.url(&request.url)?;
        match request.method {
            Method::Head => easy.nobody(true)?,
            Method::Get => easy.get(true)?,
        }
        easy.follow_location(true)?;
        easy.max_redirections(MAX_REDIRECTS)?;
        easy.connect_timeout(self.connect_timeout)?;
        easy.low_speed_limit(self.low_speed_limit)?;
        easy.low_speed_time(self.low_speed_time)?;
        easy.timeout(self.timeout)?;
        easy.progress(true)?;
        if !request.headers.is_empty() {
            let mut list = List::new();
            for (k, v) in &request.headers {
                list.append(&format!("{}: {}", k.trim(), v.trim()))?;
            }
            easy.http_headers(list)?;
        }
        Ok(())
    }
}

/// Per-request state shared by the header and write callbacks.
struct Exchange<'a> {
    sink: &'a mut dyn BodySink,
    lines: Vec<String>,
    head: Option<ResponseHead>,
    accepted: Option<bool>,
    sink_error: Option<std::io::Error>,
}

impl<'a> Exchange<'a> {
    fn new(sink: &'a mut dyn BodySink) -> Self {
        Self {
            sink,
            lines: Vec::new(),
            head: None,
            accepted: None,
            sink_error: None,
        }
    }

    fn on_header(&mut self, data: &[u8]) {
        if let Ok(s) = str::from_utf8(data) {
            let line = s.trim_end();
            if line.starts_with("HTTP/") {
                self.lines.clear();
            }
            if !line.is_empty() {
                self.lines.push(line.to_string());
            }
        }
    }

    fn build_head(&self, url: &str) -> ResponseHead {
        let status = self
            .lines
            .first()
            .and_then(|l| parse_http_status(l))
            .unwrap_or(0);
        let headers = self.lines.iter().filter_map(|l| parse_header_line(l)).collect();
        ResponseHead {
            status,
            headers,
            effective_url: url.to_string(),
        }
    }

    /// Hand the head to the sink once; later calls return the cached verdict.
    fn ensure_accepted(&mut self, url: &str) -> bool {
        if let Some(ok) = self.accepted {
            return ok;
        }
        let head = self.build_head(url);
        let ok = self.sink.accept(&head);
        self.head = Some(head);
        self.accepted = Some(ok);
        ok
    }
}

fn transport_error(e: curl::Error) -> TransportError {
    if e.is_too_many_redirects() {
        return TransportError::TooManyRedirects;
    }
    if e.is_operation_timedout() {
        return TransportError::Timeout(e.to_string());
    }
    if e.is_aborted_by_callback() {
        return TransportError::Aborted;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        return TransportError::Connection(e.to_string());
    }
    TransportError::Other(e.to_string())
}

impl HttpClient for CurlClient {
    fn execute(
        &self,
        request: &HttpRequest,
        sink: &mut dyn BodySink,
        abort: &AbortToken,
    ) -> Result<ResponseHead, TransportError> {
        if abort.is_aborted() {
            return Err(TransportError::Aborted);
        }
        let mut easy = Easy::new();
        self.configure(&mut easy, request).map_err(transport_error)?;

        let exchange = RefCell::new(Exchange::new(sink));
        let performed = {
            let mut transfer = easy.transfer();
            transfer
                .header_function(|data| {
                    exchange.borrow_mut().on_header(data);
                    true
                })
                .map_err(transport_error)?;
            transfer
                .write_function(|data| {
                    let mut ex = exchange.borrow_mut();
                    // Returning a short count makes libcurl fail with a write error.
                    if abort.is_aborted() || !ex.ensure_accepted(&request.url) {
                        return Ok(0);
                    }
                    match ex.sink.write(data) {
                        Ok(()) => Ok(data.len()),
                        Err(e) => {
                            ex.sink_error = Some(e);
                            Ok(0)
                        }
                    }
                })
                .map_err(transport_error)?;
            transfer
                .progress_function(|_, _, _, _| !abort.is_aborted())
                .map_err(transport_error)?;
            transfer.perform()
        };

        let mut ex = exchange.into_inner();
        if let Err(e) = performed {
            if abort.is_aborted() {
                return Err(TransportError::Aborted);
            }
            if e.is_write_error() {
                if let Some(io_err) = ex.sink_error.take() {
                    return Err(TransportError::Sink(io_err));
                }
                if ex.accepted == Some(false) {
                    return Err(TransportError::Rejected);
                }
            }
            return Err(transport_error(e));
        }

        let effective_url = easy
            .effective_url()
            .ok()
            .flatten()
            .unwrap_or(request.url.as_str())
            .to_string();
        if !ex.ensure_accepted(&effective_url) {
            return Err(TransportError::Rejected);
        }
        let mut head = ex.head.take().unwrap_or_default();
        head.effective_url = effective_url;
        if head.status == 0 {
            head.status = easy.response_code().unwrap_or(0);
        }
        Ok(head)
    }
}
