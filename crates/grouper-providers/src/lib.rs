//! # grouper-providers
//!
//! Text generation providers for Grouper.

pub mod openai;
