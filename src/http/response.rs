//! Response construction for the plain-HTTP surface.
//!
//! # Responsibilities
//! - Render non-200 statuses with their status line as the body
//! - Mark non-200 responses `Connection: close`
//! - Serve the portal page with explicit content type and length

use axum::body::Body;
use axum::http::{header, HeaderValue, Response, StatusCode};

/// Build a status-only response whose body is the status line, e.g. `403 Forbidden`.
///
/// The connection is not kept alive after an error.
pub fn status_response(status: StatusCode) -> Response<Body> {
    let body = match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    };

    let length = body.len();
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=UTF-8"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    if status != StatusCode::OK {
        headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
    }
    response
}

/// Build a `200 OK` HTML response.
pub fn html_response(body: String) -> Response<Body> {
    let length = body.len();
    let mut response = Response::new(Body::from(body));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=UTF-8"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    response
}
