//! HTTP protocol layer module
//!
//! Response builders shared by the request handler, decoupled from routing.

pub mod response;

pub use response::{
    build_307_response, build_400_response, build_404_response, build_405_response,
    build_413_response, build_500_response, build_route_response, set_server_header,
};
