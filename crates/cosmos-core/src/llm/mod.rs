//! Chat-completion API client and wire types
//!
//! Speaks the OpenAI-compatible `/chat/completions` protocol used by CosmosRP.

mod client;
mod types;

pub use client::ChatClient;
pub use types::*;
