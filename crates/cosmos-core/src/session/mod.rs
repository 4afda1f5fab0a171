//! Session management module
//!
//! File-backed conversation history and the request window.

mod manager;
mod store;
mod types;

pub use manager::ChatSession;
pub use store::SessionStore;
pub use types::{Message, Role, TIMESTAMP_FORMAT, recent_messages, timestamp_now};
