//! Request middleware for the dashboard route: HTTPS redirect, basic auth and
//! the reference timestamp.

use crate::error::DashboardError;
use axum::extract::{Request, State};
use axum::http::header::{InvalidHeaderValue, AUTHORIZATION, LOCATION, WWW_AUTHENTICATE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};

/// Request header carrying the reference time of a request, in RFC 3339.
pub const TIMESTAMP_HEADER: &str = "x-timestamp";

const FORWARDED_PROTO_HEADER: &str = "x-forwarded-proto";

/// Stamps the request with the current time.
///
/// Everything downstream reads the time from this header instead of the
/// clock. Any client-supplied value is replaced.
pub async fn timestamp(mut request: Request, next: Next) -> Response {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    if let Ok(value) = HeaderValue::from_str(&now) {
        request.headers_mut().insert(TIMESTAMP_HEADER, value);
    }
    next.run(request).await
}

/// Reads the reference time that [`timestamp`] attached.
pub fn reference_time(headers: &HeaderMap) -> Result<DateTime<Utc>, DashboardError> {
    let value = headers
        .get(TIMESTAMP_HEADER)
        .ok_or(DashboardError::MissingTimestamp)?;

    let text = value
        .to_str()
        .map_err(|e| DashboardError::InvalidTimestamp {
            value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
            reason: e.to_string(),
        })?;

    DateTime::parse_from_rfc3339(text.trim())
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| DashboardError::InvalidTimestamp {
            value: text.to_string(),
            reason: e.to_string(),
        })
}

/// Expected `Authorization` header for the dashboard credentials.
#[derive(Clone)]
pub struct BasicAuth {
    expected: HeaderValue,
}

impl BasicAuth {
    pub fn new(user: &str, password: &str) -> Result<Self, InvalidHeaderValue> {
        let encoded = STANDARD.encode(format!("{user}:{password}"));
        let mut expected = HeaderValue::from_str(&format!("Basic {encoded}"))?;
        expected.set_sensitive(true);
        Ok(Self { expected })
    }
}

/// Rejects requests without the configured credentials, prompting the
/// browser to ask for them.
pub async fn require_basic_auth(
    State(auth): State<BasicAuth>,
    request: Request,
    next: Next,
) -> Response {
    if request.headers().get(AUTHORIZATION) != Some(&auth.expected) {
        return (
            StatusCode::UNAUTHORIZED,
            [(WWW_AUTHENTICATE, HeaderValue::from_static("Basic"))],
        )
            .into_response();
    }
    next.run(request).await
}

/// Where plain-HTTP requests are sent.
#[derive(Clone)]
pub struct HttpsRedirect {
    location: HeaderValue,
}

impl HttpsRedirect {
    pub fn new(ssl_host: &str) -> Result<Self, InvalidHeaderValue> {
        Ok(Self {
            location: HeaderValue::from_str(ssl_host)?,
        })
    }
}

/// Redirects requests that did not reach the proxy over HTTPS.
pub async fn require_https(
    State(redirect): State<HttpsRedirect>,
    request: Request,
    next: Next,
) -> Response {
    let forwarded_https = request
        .headers()
        .get(FORWARDED_PROTO_HEADER)
        .is_some_and(|proto| proto.as_bytes() == b"https");

    if !forwarded_https {
        return (
            StatusCode::MOVED_PERMANENTLY,
            [(LOCATION, redirect.location.clone())],
        )
            .into_response();
    }
    next.run(request).await
}
