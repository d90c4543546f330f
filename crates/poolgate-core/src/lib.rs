//! # poolgate-core
//!
//! Occupancy state engine and access-decision pipeline for the poolgate
//! admission-control service.
//!
//! This crate provides the domain types and logic shared across all poolgate
//! components:
//!
//! - **Telemetry Normalizer**: Tolerant parsing of device occupancy reports
//! - **Occupancy State**: Process-local cache with durable-store read-through
//! - **Decision Engine**: Identity-known ∧ pool-free admission verdicts
//! - **Command Model**: Outbound actuator commands and dispatch outcomes
//! - **Store Traits**: Abstract interfaces for the durable document stores
//! - **Error Types**: Shared error definitions and result types
//!
//! ## Crate Boundary
//!
//! `poolgate-core` knows nothing about HTTP or MQTT. Transports live in
//! `poolgate-api` and talk to this crate through the `CommandPublisher` and
//! store traits.
//!
//! ## Example
//!
//! ```rust
//! use poolgate_core::telemetry::normalize;
//!
//! let body = br#"{"info":{"ident":"P1"},"status":{"occupied":false}}"#;
//! let fact = normalize(body).expect("well-formed telemetry");
//! assert!(!fact.occupied);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]

pub mod audit;
pub mod command;
pub mod decision;
pub mod error;
pub mod observability;
pub mod occupancy;
pub mod store;
pub mod telemetry;

pub use error::{Error, Result};
