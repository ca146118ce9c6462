//! CSRF token check for state-changing requests
//!
//! Tokens are bound to the session: `hex(HMAC-SHA256(secret, session_id))`.
//! Clients send them in the `x-csrf-token` header or, for classic HTML
//! forms, in a `_csrf` field of a urlencoded body.

use axum::{
    body::{Body, Bytes},
    http::{header::CONTENT_TYPE, Method, Request},
};
use futures_util::{stream, StreamExt};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub const CSRF_HEADER: &str = "x-csrf-token";
pub const CSRF_FORM_FIELD: &str = "_csrf";

/// Largest form body buffered to look for a token
const MAX_FORM_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrfVerdict {
    /// GET, HEAD and OPTIONS are never checked
    Exempt,
    Valid,
    Missing,
    Invalid,
}

impl CsrfVerdict {
    pub fn is_violation(&self) -> bool {
        matches!(self, CsrfVerdict::Missing | CsrfVerdict::Invalid)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CsrfVerdict::Exempt => "exempt",
            CsrfVerdict::Valid => "valid",
            CsrfVerdict::Missing => "missing",
            CsrfVerdict::Invalid => "invalid",
        }
    }
}

#[derive(Clone)]
pub struct CsrfGuard {
    secret: String,
    enforce: bool,
}

impl CsrfGuard {
    pub fn new(secret: impl Into<String>, enforce: bool) -> Self {
        Self {
            secret: secret.into(),
            enforce,
        }
    }

    /// When false, violations are reported but not blocked
    pub fn enforce(&self) -> bool {
        self.enforce
    }

    pub fn token_for(&self, session_id: Uuid) -> String {
        let mut mac = match HmacSha256::new_from_slice(self.secret.as_bytes()) {
            Ok(m) => m,
            Err(_) => return String::new(),
        };
        mac.update(session_id.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    pub fn verify(&self, session_id: Uuid, token: &str) -> bool {
        let expected = self.token_for(session_id);
        !expected.is_empty() && constant_time_eq(expected.as_bytes(), token.trim().as_bytes())
    }

    /// Check a request's token. Form bodies are buffered to read the token
    /// and handed back intact in the returned request.
    pub async fn inspect(
        &self,
        session_id: Uuid,
        request: Request<Body>,
    ) -> (Request<Body>, CsrfVerdict) {
        if is_safe_method(request.method()) {
            return (request, CsrfVerdict::Exempt);
        }

        if let Some(token) = request
            .headers()
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            let verdict = self.verdict(session_id, Some(token));
            return (request, verdict);
        }

        if !is_form(&request) {
            return (request, CsrfVerdict::Missing);
        }

        let (parts, body) = request.into_parts();
        let mut data = body.into_data_stream();
        let mut chunks: Vec<Result<Bytes, axum::Error>> = Vec::new();
        let mut buffered = 0usize;

        while let Some(chunk) = data.next().await {
            match chunk {
                Ok(bytes) => {
                    buffered += bytes.len();
                    chunks.push(Ok(bytes));
                    if buffered > MAX_FORM_BYTES {
                        break;
                    }
                }
                Err(e) => {
                    chunks.push(Err(e));
                    break;
                }
            }
        }

        let complete = buffered <= MAX_FORM_BYTES && chunks.iter().all(Result::is_ok);
        if !complete {
            // Too large or unreadable: skip the form search, forward the body untouched
            warn!(buffered_bytes = buffered, "Form body not searched for CSRF token");
            let body = Body::from_stream(stream::iter(chunks).chain(data));
            return (Request::from_parts(parts, body), CsrfVerdict::Missing);
        }

        let bytes: Vec<u8> = chunks
            .into_iter()
            .flatten()
            .flat_map(|chunk| chunk.to_vec())
            .collect();
        let token = url::form_urlencoded::parse(&bytes)
            .find(|(key, _)| key == CSRF_FORM_FIELD)
            .map(|(_, value)| value.into_owned());
        let verdict = self.verdict(session_id, token.as_deref());

        (Request::from_parts(parts, Body::from(bytes)), verdict)
    }

    fn verdict(&self, session_id: Uuid, token: Option<&str>) -> CsrfVerdict {
        match token.map(str::trim).filter(|t| !t.is_empty()) {
            None => CsrfVerdict::Missing,
            Some(token) if self.verify(session_id, token) => CsrfVerdict::Valid,
            Some(_) => CsrfVerdict::Invalid,
        }
    }
}

fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

fn is_form(request: &Request<Body>) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

/// Constant-time byte comparison
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
