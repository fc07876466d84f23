//! In-memory [`HttpClient`] for unit tests.
//!
//! Serves one body. HEAD advertises its length and (by default) byte ranges;
//! ranged GETs answer 206 with the slice. Per-range scripts inject failures,
//! and every request is recorded.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::control::AbortToken;
use crate::http::{BodySink, HttpClient, HttpRequest, Method, ResponseHead, TransportError};

const PIECE: usize = 1024;

/// Scripted answer for one request to a given range.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Reply {
    /// Bare status, no body.
    Status(u32),
    /// 200 with the whole body, ignoring the range.
    Full,
    /// Correct 206 head, body cut after this many bytes.
    Truncate(usize),
    /// Hang until aborted.
    Stall,
}

#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub method: Method,
    pub range: Option<String>,
}

pub(crate) struct FakeServer {
    body: Vec<u8>,
    ranges: bool,
    ignore_ranges: bool,
    shift: u64,
    truncate: Option<usize>,
    head_status: u32,
    get_status: Option<u32>,
    effective_url: Option<String>,
    disposition: Option<String>,
    etag: Option<String>,
    redirect_loop: bool,
    stall_all: bool,
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    log: Mutex<Vec<Recorded>>,
}

impl FakeServer {
    pub(crate) fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            ranges: true,
            ignore_ranges: false,
            shift: 0,
            truncate: None,
            head_status: 200,
            get_status: None,
            effective_url: None,
            disposition: None,
            etag: None,
            redirect_loop: false,
            stall_all: false,
            scripts: Mutex::new(HashMap::new()),
            log: Mutex::new(Vec::new()),
        }
    }

    /// HEAD omits `Accept-Ranges`; ranged GETs get a plain 200.
    pub(crate) fn without_ranges(mut self) -> Self {
        self.ranges = false;
        self
    }

    /// HEAD advertises ranges but GETs always answer 200 with the whole body.
    pub(crate) fn ignore_ranges(mut self) -> Self {
        self.ignore_ranges = true;
        self
    }

    /// 206 responses report a Content-Range shifted by `by` bytes.
    pub(crate) fn shift_ranges(mut self, by: u64) -> Self {
        self.shift = by;
        self
    }

    /// Every GET body stops after `n` bytes.
    pub(crate) fn truncate_bodies(mut self, n: usize) -> Self {
        self.truncate = Some(n);
        self
    }

    pub(crate) fn head_status(mut self, status: u32) -> Self {
        self.head_status = status;
        self
    }

    pub(crate) fn get_status(mut self, status: u32) -> Self {
        self.get_status = Some(status);
        self
    }

    pub(crate) fn redirected_to(mut self, url: &str) -> Self {
        self.effective_url = Some(url.to_string());
        self
    }

    pub(crate) fn with_disposition(mut self, value: &str) -> Self {
        self.disposition = Some(value.to_string());
        self
    }

    pub(crate) fn with_etag(mut self, value: &str) -> Self {
        self.etag = Some(value.to_string());
        self
    }

    pub(crate) fn redirect_loop(mut self) -> Self {
        self.redirect_loop = true;
        self
    }

    /// Every GET hangs until the abort token fires.
    pub(crate) fn stall_all(mut self) -> Self {
        self.stall_all = true;
        self
    }

    /// Queue replies for GETs with `Range: <range>`; once used up the range
    /// is served normally.
    pub(crate) fn script(self, range: &str, replies: &[Reply]) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(range.to_string())
            .or_default()
            .extend(replies.iter().copied());
        self
    }

    pub(crate) fn requests(&self) -> Vec<Recorded> {
        self.log.lock().unwrap().clone()
    }

    /// `Range` values of all ranged GETs, in request order.
    pub(crate) fn requested_ranges(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == Method::Get)
            .filter_map(|r| r.range)
            .collect()
    }

    fn head(&self, status: u32, url: &str) -> ResponseHead {
        ResponseHead {
            status,
            headers: Vec::new(),
            effective_url: self.effective_url.clone().unwrap_or_else(|| url.to_string()),
        }
    }

    fn parse_range(&self, value: &str) -> Option<(u64, u64)> {
        let (a, b) = value.strip_prefix("bytes=")?.split_once('-')?;
        let start: u64 = a.parse().ok()?;
        let last = (self.body.len() as u64).checked_sub(1)?;
        let end = b.parse::<u64>().ok()?.min(last);
        (start <= end).then_some((start, end))
    }

    fn send(
        &self,
        mut head: ResponseHead,
        body: &[u8],
        sink: &mut dyn BodySink,
        abort: &AbortToken,
    ) -> Result<ResponseHead, TransportError> {
        head.headers.push(("Content-Length".into(), body.len().to_string()));
        if !sink.accept(&head) {
            return Err(TransportError::Rejected);
        }
        let body = match self.truncate {
            Some(n) => &body[..n.min(body.len())],
            None => body,
        };
        for piece in body.chunks(PIECE) {
            if abort.is_aborted() {
                return Err(TransportError::Aborted);
            }
            sink.write(piece).map_err(TransportError::Sink)?;
        }
        Ok(head)
    }
}

impl HttpClient for FakeServer {
    fn execute(
        &self,
        request: &HttpRequest,
        sink: &mut dyn BodySink,
        abort: &AbortToken,
    ) -> Result<ResponseHead, TransportError> {
        if abort.is_aborted() {
            return Err(TransportError::Aborted);
        }
        self.log.lock().unwrap().push(Recorded {
            method: request.method,
            range: request.range().map(str::to_string),
        });
        if self.redirect_loop {
            return Err(TransportError::TooManyRedirects);
        }

        if request.method == Method::Head {
            let mut head = self.head(self.head_status, &request.url);
            head.headers.push(("Content-Length".into(), self.body.len().to_string()));
            if self.ranges {
                head.headers.push(("Accept-Ranges".into(), "bytes".into()));
            }
            if let Some(d) = &self.disposition {
                head.headers.push(("Content-Disposition".into(), d.clone()));
            }
            if let Some(tag) = &self.etag {
                head.headers.push(("ETag".into(), tag.clone()));
            }
            if !sink.accept(&head) {
                return Err(TransportError::Rejected);
            }
            return Ok(head);
        }

        let scripted = request.range().and_then(|r| {
            self.scripts
                .lock()
                .unwrap()
                .get_mut(r)
                .and_then(|q| q.pop_front())
        });
        if self.stall_all || matches!(scripted, Some(Reply::Stall)) {
            while abort.sleep(Duration::from_millis(50)) {}
            return Err(TransportError::Aborted);
        }
        if let Some(status) = self.get_status {
            return self.send(self.head(status, &request.url), &[], sink, abort);
        }

        let range = match request.range() {
            Some(r) if self.ranges && !self.ignore_ranges && !matches!(scripted, Some(Reply::Full)) => {
                self.parse_range(r)
            }
            _ => None,
        };
        match (scripted, range) {
            (Some(Reply::Status(code)), _) => self.send(self.head(code, &request.url), &[], sink, abort),
            (_, Some((start, end))) => {
                let mut head = self.head(206, &request.url);
                head.headers.push((
                    "Content-Range".into(),
                    format!(
                        "bytes {}-{}/{}",
                        start + self.shift,
                        end + self.shift,
                        self.body.len()
                    ),
                ));
                let slice = &self.body[start as usize..=end as usize];
                let slice = match scripted {
                    Some(Reply::Truncate(n)) => &slice[..n.min(slice.len())],
                    _ => slice,
                };
                self.send(head, slice, sink, abort)
            }
            _ => self.send(self.head(200, &request.url), &self.body, sink, abort),
        }
    }
}
