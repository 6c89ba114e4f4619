//! Request dispatch module
//!
//! Entry point for HTTP request processing: body size check, path decoding,
//! route dispatch, error mapping and access logging.

use crate::config::AppState;
use crate::http;
use crate::logger::{self, AccessLogEntry};
use crate::routing::{DispatchError, Router};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderName, CONTENT_LENGTH, REFERER, USER_AGENT};
use hyper::{Method, Request, Response, Uri};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::borrow::Cow;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Bytes escaped when a decoded path is written back into a `Location` header
const PATH_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Main entry point for HTTP request handling
///
/// The request body is never read, so any body type is accepted.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    remote_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();

    let mut response = match check_body_size(&req, state.config.http.max_body_size) {
        Some(resp) => resp,
        None => match decode_path(req.uri().path()) {
            Some(path) => route_request(req.method(), &path, req.uri(), &state),
            None => http::build_400_response(),
        },
    };
    http::set_server_header(&mut response, &state.config.http.server_name);

    if state.access_log_enabled() {
        log_access(&req, &response, remote_addr, started, &state);
    }

    Ok(response)
}

/// Percent-decode the request path; `None` when the result is not UTF-8
fn decode_path(raw: &str) -> Option<Cow<'_, str>> {
    match percent_decode_str(raw).decode_utf8() {
        Ok(path) => Some(path),
        Err(e) => {
            logger::log_warning(&format!("Rejecting path '{raw}': {e}"));
            None
        }
    }
}

/// Dispatch to the router and map failures to HTTP responses
fn route_request(
    method: &Method,
    path: &str,
    uri: &Uri,
    state: &AppState,
) -> Response<Full<Bytes>> {
    let is_head = *method == Method::HEAD;
    let mut outcome = state.router.dispatch(method, path);
    // HEAD without its own route is served by the GET route of the same path
    if is_head && matches!(outcome, Err(DispatchError::NotFound { .. })) {
        outcome = state.router.dispatch(&Method::GET, path);
    }

    match outcome {
        Ok(route_resp) => http::build_route_response(route_resp, is_head),
        Err(DispatchError::NotFound { .. }) => {
            let allowed = state.router.allowed_methods(path);
            if !allowed.is_empty() {
                logger::log_warning(&format!("Method not allowed: {method} {path}"));
                http::build_405_response(&allowed)
            } else if let Some(location) = slash_redirect(path, uri.query(), &state.router) {
                http::build_307_response(&location)
            } else {
                http::build_404_response()
            }
        }
        Err(e) => {
            logger::log_error(&format!("{method} {path}: {e}"));
            http::build_500_response()
        }
    }
}

/// Redirect target for a path that only matches once its trailing slashes go
///
/// The decoded path is re-encoded, and the query string is carried over.
fn slash_redirect(path: &str, query: Option<&str>, router: &Router) -> Option<String> {
    if path == "/" || !path.ends_with('/') {
        return None;
    }
    let trimmed = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };
    if router.allowed_methods(trimmed).is_empty() {
        return None;
    }

    let mut location = utf8_percent_encode(trimmed, PATH_ESCAPE).to_string();
    if let Some(query) = query {
        location.push('?');
        location.push_str(query);
    }
    Some(location)
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size<B>(req: &Request<B>, max_body_size: u64) -> Option<Response<Full<Bytes>>> {
    let content_length = req.headers().get(CONTENT_LENGTH)?;
    let Ok(size_str) = content_length.to_str() else {
        logger::log_warning("Content-Length header contains non-ASCII characters");
        return None;
    };
    match size_str.parse::<u64>() {
        Ok(size) if size > max_body_size => {
            logger::log_error(&format!(
                "Request body too large: {size} bytes (max: {max_body_size})"
            ));
            Some(http::build_413_response())
        }
        Ok(_) => None,
        Err(_) => {
            logger::log_warning(&format!(
                "Invalid Content-Length value: '{size_str}', skipping size check"
            ));
            None
        }
    }
}

fn log_access<B>(
    req: &Request<B>,
    response: &Response<Full<Bytes>>,
    remote_addr: SocketAddr,
    started: Instant,
    state: &AppState,
) {
    let header = |name: HeaderName| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        remote_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = http_version(req.version()).to_string();
    entry.status = response.status().as_u16();
    entry.body_bytes = usize::try_from(hyper::body::Body::size_hint(response.body()).lower())
        .unwrap_or(usize::MAX);
    entry.referer = header(REFERER);
    entry.user_agent = header(USER_AGENT);
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

    logger::log_access(&entry, &state.config.logging.access_log_format);
}

fn http_version(version: hyper::Version) -> &'static str {
    match version {
        hyper::Version::HTTP_09 => "0.9",
        hyper::Version::HTTP_10 => "1.0",
        hyper::Version::HTTP_2 => "2",
        hyper::Version::HTTP_3 => "3",
        _ => "1.1",
    }
}
