//! Greeting endpoints
//!
//! | Method | Path           | Body                   |
//! |--------|----------------|------------------------|
//! | GET    | `/`            | `Hello World!`         |
//! | GET    | `/name`        | `{"name":"Roman"}`     |
//! | GET    | `/name/{name}` | `{"name":"<captured>"}`|

use crate::routing::{HandlerError, PathParams, Reply, RouteError, Router};

const GREETING: &str = "Hello World!";
const DEFAULT_NAME: &str = "Roman";

/// Build the router with all greeting routes registered
pub fn build_router() -> Result<Router, RouteError> {
    let mut router = Router::new();
    router.get("/", hello_world)?;
    router.get("/name", default_name)?;
    router.get("/name/{name}", echo_name)?;
    Ok(router)
}

#[allow(clippy::unnecessary_wraps)]
fn hello_world(_params: &PathParams) -> Result<Reply, HandlerError> {
    Ok(Reply::Text(GREETING.to_string()))
}

#[allow(clippy::unnecessary_wraps)]
fn default_name(_params: &PathParams) -> Result<Reply, HandlerError> {
    Ok(Reply::json([("name", DEFAULT_NAME)]))
}

fn echo_name(params: &PathParams) -> Result<Reply, HandlerError> {
    let name = params
        .get("name")
        .ok_or_else(|| HandlerError::new("missing path parameter 'name'"))?;
    Ok(Reply::json([("name", name)]))
}
