//! HTTP API: configuration, server wiring, and request/response mapping.

pub mod app;
pub mod authz;
pub mod config;
pub mod context;
pub mod jwt;
pub mod middleware;
