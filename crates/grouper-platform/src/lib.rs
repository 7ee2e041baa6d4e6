//! # grouper-platform
//!
//! Messaging platform bridge client and directory (name service) resolvers.

pub mod bridge;
pub mod directory;

pub use bridge::BridgePlatform;
pub use directory::HttpNameService;
