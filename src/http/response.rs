//! HTTP response building module
//!
//! Turns dispatch outcomes and error conditions into hyper responses.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, ALLOW, CONTENT_LENGTH, CONTENT_TYPE, LOCATION, SERVER};
use hyper::{Method, Response, StatusCode};

use crate::routing::{RouteResponse, JSON_CONTENT_TYPE, TEXT_CONTENT_TYPE};

const BAD_REQUEST_BODY: &str = r#"{"detail":"Bad Request"}"#;
const NOT_FOUND_BODY: &str = r#"{"detail":"Not Found"}"#;
const METHOD_NOT_ALLOWED_BODY: &str = r#"{"detail":"Method Not Allowed"}"#;
const PAYLOAD_TOO_LARGE_BODY: &str = r#"{"detail":"Payload Too Large"}"#;
const INTERNAL_ERROR_BODY: &str = "Internal Server Error";

/// Build the response for a successfully dispatched route
///
/// For `HEAD` the headers (including `Content-Length`) are kept and the body
/// is dropped.
pub fn build_route_response(route_resp: RouteResponse, is_head: bool) -> Response<Full<Bytes>> {
    let content_length = route_resp.body.len();
    let body = if is_head { Bytes::new() } else { route_resp.body };

    Response::builder()
        .status(route_resp.status)
        .header(CONTENT_TYPE, route_resp.content_type)
        .header(CONTENT_LENGTH, content_length)
        .body(Full::new(body))
        .unwrap_or_else(|e| {
            log_build_error(route_resp.status.as_str(), &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build 307 Temporary Redirect response pointing at `location`
///
/// `location` must already be a valid header value (percent-encoded).
pub fn build_307_response(location: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::TEMPORARY_REDIRECT)
        .header(LOCATION, location)
        .header(CONTENT_LENGTH, 0)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| {
            log_build_error(StatusCode::TEMPORARY_REDIRECT.as_str(), &e);
            build_404_response()
        })
}

/// Build 400 Bad Request response
pub fn build_400_response() -> Response<Full<Bytes>> {
    build_fixed_response(StatusCode::BAD_REQUEST, JSON_CONTENT_TYPE, BAD_REQUEST_BODY)
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<Full<Bytes>> {
    build_fixed_response(StatusCode::NOT_FOUND, JSON_CONTENT_TYPE, NOT_FOUND_BODY)
}

/// Build 405 Method Not Allowed response listing the methods the path accepts
pub fn build_405_response(allowed: &[Method]) -> Response<Full<Bytes>> {
    let mut resp = build_fixed_response(
        StatusCode::METHOD_NOT_ALLOWED,
        JSON_CONTENT_TYPE,
        METHOD_NOT_ALLOWED_BODY,
    );
    if let Ok(value) = HeaderValue::from_str(&allow_header(allowed)) {
        resp.headers_mut().insert(ALLOW, value);
    }
    resp
}

/// Build 413 Payload Too Large response
pub fn build_413_response() -> Response<Full<Bytes>> {
    build_fixed_response(
        StatusCode::PAYLOAD_TOO_LARGE,
        JSON_CONTENT_TYPE,
        PAYLOAD_TOO_LARGE_BODY,
    )
}

/// Build 500 Internal Server Error response
pub fn build_500_response() -> Response<Full<Bytes>> {
    build_fixed_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        TEXT_CONTENT_TYPE,
        INTERNAL_ERROR_BODY,
    )
}

/// Stamp the `Server` header on an outgoing response
pub fn set_server_header(resp: &mut Response<Full<Bytes>>, server_name: &str) {
    match HeaderValue::from_str(server_name) {
        Ok(value) => {
            resp.headers_mut().insert(SERVER, value);
        }
        Err(e) => crate::logger::log_warning(&format!(
            "Invalid server_name '{server_name}' for Server header: {e}"
        )),
    }
}

/// `Allow` header value; `HEAD` is implied wherever `GET` is served
fn allow_header(allowed: &[Method]) -> String {
    let mut names: Vec<&str> = Vec::with_capacity(allowed.len() + 1);
    for method in allowed {
        names.push(method.as_str());
        if *method == Method::GET && !allowed.contains(&Method::HEAD) {
            names.push(Method::HEAD.as_str());
        }
    }
    names.join(", ")
}

fn build_fixed_response(
    status: StatusCode,
    content_type: &'static str,
    body: &'static str,
) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, content_type)
        .body(Full::new(Bytes::from_static(body.as_bytes())))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(Full::new(Bytes::from_static(body.as_bytes())))
        })
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
