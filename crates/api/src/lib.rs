//! HTTP API: routing, access gate, and request/response mapping.

pub mod app;
pub mod context;
pub mod middleware;
