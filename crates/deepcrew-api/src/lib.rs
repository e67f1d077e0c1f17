//! HTTP façade over the research query service.
//!
//! `POST /query` runs one query; `GET /status` is a liveness check.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
