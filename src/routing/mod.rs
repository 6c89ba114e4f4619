//! Routing module
//!
//! Maps `(method, path)` pairs to handlers:
//! - Path patterns with literal and `{capture}` segments
//! - First match in registration order
//! - Handler replies serialized as text or JSON

mod error;
mod pattern;
mod router;

pub use error::{DispatchError, HandlerError, RouteError};
pub use pattern::PathParams;
pub use router::{Reply, RouteResponse, Router, JSON_CONTENT_TYPE, TEXT_CONTENT_TYPE};
