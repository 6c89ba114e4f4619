//! Request handler module
//!
//! Bridges hyper requests to the route table.

pub mod dispatch;

// Re-export main entry point
pub use dispatch::handle_request;
