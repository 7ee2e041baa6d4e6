//! # grouper-memory
//!
//! SQLite-backed handle cache and audit log for Grouper.

pub mod audit;
pub mod store;

pub use audit::AuditLogger;
pub use store::Store;
