//! Route table and dispatch
//!
//! Routes are registered once at startup and matched in registration order.
//! Once built, the router is shared read-only (`Arc<Router>`) between
//! connections, so dispatch needs no locking.

use std::collections::BTreeMap;

use hyper::body::Bytes;
use hyper::{Method, StatusCode};

use super::error::{DispatchError, HandlerError, RouteError};
use super::pattern::{PathParams, PathPattern};

pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Value returned by a route handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Sent as a plain text body
    Text(String),
    /// Sent as a JSON object; keys are serialized in sorted order
    Json(BTreeMap<String, String>),
}

impl Reply {
    /// Build a JSON reply from key/value pairs
    pub fn json<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Json(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    fn into_response(self) -> Result<RouteResponse, serde_json::Error> {
        match self {
            Self::Text(text) => Ok(RouteResponse {
                status: StatusCode::OK,
                content_type: TEXT_CONTENT_TYPE,
                body: Bytes::from(text),
            }),
            Self::Json(map) => Ok(RouteResponse {
                status: StatusCode::OK,
                content_type: JSON_CONTENT_TYPE,
                body: Bytes::from(serde_json::to_vec(&map)?),
            }),
        }
    }
}

/// Serialized outcome of a successful dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteResponse {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: Bytes,
}

type BoxedHandler = Box<dyn Fn(&PathParams) -> Result<Reply, HandlerError> + Send + Sync>;

struct Route {
    method: Method,
    pattern: PathPattern,
    handler: BoxedHandler,
}

/// Method + path pattern router
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a method and path pattern
    ///
    /// Fails if the pattern is malformed or if a route with the same method
    /// and an identically shaped pattern already exists. Patterns that only
    /// partially overlap are accepted; the earlier registration wins.
    pub fn register<H>(&mut self, method: Method, pattern: &str, handler: H) -> Result<(), RouteError>
    where
        H: Fn(&PathParams) -> Result<Reply, HandlerError> + Send + Sync + 'static,
    {
        let pattern = PathPattern::parse(pattern)?;

        if self
            .routes
            .iter()
            .any(|route| route.method == method && route.pattern.same_shape(&pattern))
        {
            return Err(RouteError::Conflict {
                method,
                pattern: pattern.as_str().to_string(),
            });
        }

        self.routes.push(Route {
            method,
            pattern,
            handler: Box::new(handler),
        });
        Ok(())
    }

    /// Register a `GET` handler
    pub fn get<H>(&mut self, pattern: &str, handler: H) -> Result<(), RouteError>
    where
        H: Fn(&PathParams) -> Result<Reply, HandlerError> + Send + Sync + 'static,
    {
        self.register(Method::GET, pattern, handler)
    }

    /// Resolve a request to the first matching route and run its handler
    pub fn dispatch(&self, method: &Method, path: &str) -> Result<RouteResponse, DispatchError> {
        let (route, params) = self
            .routes
            .iter()
            .filter(|route| route.method == *method)
            .find_map(|route| route.pattern.match_path(path).map(|params| (route, params)))
            .ok_or_else(|| DispatchError::NotFound {
                method: method.clone(),
                path: path.to_string(),
            })?;

        let reply = (route.handler)(&params)?;
        Ok(reply.into_response()?)
    }

    /// Methods of every route whose pattern matches `path`, without duplicates
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        let mut methods: Vec<Method> = Vec::new();
        for route in &self.routes {
            if !methods.contains(&route.method) && route.pattern.match_path(path).is_some() {
                methods.push(route.method.clone());
            }
        }
        methods
    }

    /// Registered `(method, pattern)` pairs in registration order
    pub fn routes(&self) -> impl Iterator<Item = (&Method, &str)> {
        self.routes
            .iter()
            .map(|route| (&route.method, route.pattern.as_str()))
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(body: &'static str) -> impl Fn(&PathParams) -> Result<Reply, HandlerError> {
        move |_| Ok(Reply::Text(body.to_string()))
    }

    #[test]
    fn test_dispatch_text_and_json() {
        let mut router = Router::new();
        router.get("/", text("root")).unwrap();
        router
            .get("/item/{id}", |params| {
                Ok(Reply::json([("id", params.get("id").unwrap_or_default())]))
            })
            .unwrap();

        let resp = router.dispatch(&Method::GET, "/").unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.content_type, TEXT_CONTENT_TYPE);
        assert_eq!(resp.body, Bytes::from("root"));

        let resp = router.dispatch(&Method::GET, "/item/42").unwrap();
        assert_eq!(resp.content_type, JSON_CONTENT_TYPE);
        assert_eq!(resp.body, Bytes::from(r#"{"id":"42"}"#));
    }

    #[test]
    fn test_dispatch_not_found() {
        let mut router = Router::new();
        router.get("/", text("root")).unwrap();

        let err = router.dispatch(&Method::GET, "/missing").unwrap_err();
        assert!(matches!(err, DispatchError::NotFound { ref path, .. } if path == "/missing"));

        // method is part of the match
        let err = router.dispatch(&Method::POST, "/").unwrap_err();
        assert!(matches!(err, DispatchError::NotFound { .. }));
    }

    #[test]
    fn test_registration_order_breaks_ties() {
        let mut router = Router::new();
        router.get("/name/{name}", text("capture")).unwrap();
        router.get("/name/fixed", text("literal")).unwrap();

        let resp = router.dispatch(&Method::GET, "/name/fixed").unwrap();
        assert_eq!(resp.body, Bytes::from("capture"));
    }

    #[test]
    fn test_register_rejects_same_shape() {
        let mut router = Router::new();
        router.get("/name/{name}", text("a")).unwrap();

        let err = router.get("/name/{other}", text("b")).unwrap_err();
        assert_eq!(
            err,
            RouteError::Conflict {
                method: Method::GET,
                pattern: "/name/{other}".to_string(),
            }
        );

        // same pattern under another method is fine
        router
            .register(Method::POST, "/name/{name}", text("c"))
            .unwrap();
        assert_eq!(router.route_count(), 2);
    }

    #[test]
    fn test_register_rejects_invalid_pattern() {
        let mut router = Router::new();
        let err = router.get("name", text("a")).unwrap_err();
        assert!(matches!(err, RouteError::InvalidPattern { .. }));
        assert_eq!(router.route_count(), 0);
    }

    #[test]
    fn test_handler_error_propagates() {
        let mut router = Router::new();
        router
            .get("/boom", |_| Err(HandlerError::new("exploded")))
            .unwrap();

        let err = router.dispatch(&Method::GET, "/boom").unwrap_err();
        assert!(matches!(err, DispatchError::Handler(ref e) if *e == HandlerError::new("exploded")));
    }

    #[test]
    fn test_allowed_methods() {
        let mut router = Router::new();
        router.get("/name", text("a")).unwrap();
        router.register(Method::DELETE, "/name", text("b")).unwrap();
        router.get("/name/{name}", text("c")).unwrap();

        assert_eq!(
            router.allowed_methods("/name"),
            vec![Method::GET, Method::DELETE]
        );
        assert_eq!(router.allowed_methods("/name/x"), vec![Method::GET]);
        assert!(router.allowed_methods("/other").is_empty());
    }

    #[test]
    fn test_routes_listing() {
        let mut router = Router::new();
        router.get("/", text("a")).unwrap();
        router.get("/name", text("b")).unwrap();

        let listed: Vec<_> = router.routes().collect();
        assert_eq!(listed, vec![(&Method::GET, "/"), (&Method::GET, "/name")]);
    }
}
