//! Map HTTP statuses, transport failures and fetch errors to [`ErrorKind`].

use super::error::FetchError;
use super::policy::ErrorKind;
use crate::http::TransportError;

pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Http5xx(code as u16),
        _ => ErrorKind::Http(code.min(u16::MAX as u32) as u16),
    }
}

pub fn classify_transport(e: &TransportError) -> ErrorKind {
    match e {
        TransportError::Aborted => ErrorKind::Aborted,
        TransportError::Timeout(_) => ErrorKind::Timeout,
        TransportError::Connection(_) | TransportError::Other(_) => ErrorKind::Connection,
        TransportError::TooManyRedirects | TransportError::Rejected => ErrorKind::Protocol,
        TransportError::Sink(_) => ErrorKind::Storage,
    }
}

pub fn classify(e: &FetchError) -> ErrorKind {
    match e {
        FetchError::Transport(t) => classify_transport(t),
        FetchError::Http(code) => classify_http_status(*code),
        FetchError::RangeMismatch { .. }
        | FetchError::Overflow { .. }
        | FetchError::PartialTransfer { .. } => ErrorKind::Protocol,
        FetchError::Storage(_) | FetchError::Manifest(_) => ErrorKind::Storage,
        FetchError::Aborted => ErrorKind::Aborted,
    }
}
