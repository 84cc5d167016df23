//! Ready-made [`Server`](crate::Server) implementations.

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::HttpServer;
