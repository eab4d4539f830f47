// ============================================
// File: crates/amqptun-node/src/services/mod.rs
// ============================================
//! # Node Services
//!
//! ## Main Functionality
//! - [`routes`]: subscribes the node's queue to networks via routing keys
//!
//! ## Last Modified
//! v0.1.0 - Initial services structure

pub mod routes;

pub use routes::RouteManager;
