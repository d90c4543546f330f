//! # poolgate-api
//!
//! HTTP and MQTT composition layer for the poolgate admission-control
//! service.
//!
//! This crate is a **thin composition layer** with no domain policy. All
//! decision logic lives in `poolgate-core`; this crate wires it to the
//! outside world:
//!
//! - **HTTP**: health/readiness probes and the synchronous access check
//! - **MQTT**: telemetry ingestion and per-pool command dispatch
//! - **Configuration**: process-wide settings read once from the environment
//!
//! ## Endpoints
//!
//! ```text
//! GET /health                - Liveness check
//! GET /ready                 - Readiness check (store probe)
//! GET /open?idu=&idswp=      - Access check
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod mqtt;
pub mod routes;
pub mod server;
