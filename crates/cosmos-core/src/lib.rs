//! cosmos-core: CosmosRP chat client core library
//!
//! Chat-completion API access, file-backed sessions, identity handling
//! and customization overrides for the `cosmos-chat` binary.

pub mod config;
pub mod customization;
pub mod error;
pub mod identity;
pub mod llm;
pub mod session;

pub use config::{ChatConfig, Config, LlmConfig, SessionConfig};
pub use customization::{Customization, CustomizationLoader};
pub use error::{Error, Result};
pub use identity::{IdentityFile, default_identity};
pub use llm::{ChatClient, ChatCompletionRequest, ChatCompletionResponse, WireMessage};
pub use session::{ChatSession, Message, Role, SessionStore, recent_messages};
