//! # grouper-core
//!
//! Core types, traits, configuration, and error handling for the Grouper agent.

pub mod config;
pub mod context;
pub mod error;
pub mod message;
pub mod traits;

pub use config::shellexpand;
