//! core
//!
//! Domain types and configuration shared by all layers.

pub mod config;
pub mod types;
