//! Customization overrides
//!
//! The customization folder holds two optional JSON files that replace the
//! default identity and seed history when a new session is created:
//!
//! - `custom_identity.json`: `{"bot_name": "...", "user_name": "...", "identity_text": "..."}`
//! - `custom_history.json`: `[{"role": "...", "content": "...", "timestamp": "..."}, ...]`
//!
//! Overrides apply only when both files exist. A syntax error in either one
//! discards both.

use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::session::{Message, Role, timestamp_now};
use crate::{Error, Result};

pub const IDENTITY_FILE: &str = "custom_identity.json";
pub const HISTORY_FILE: &str = "custom_history.json";
pub const README_FILE: &str = "README.txt";

const README: &str = "Customization Folder Instructions:\n\
1. Add your own identity in the custom_identity.json file.\n\
   Format: {\"bot_name\": \"...\", \"user_name\": \"...\", \"identity_text\": \"...\"}\n\
2. Add custom conversation history in the custom_history.json file.\n\
   Format: [{\"role\": \"system/user/assistant\", \"content\": \"...\", \"timestamp\": \"...\"}, ...]\n\
3. If these files are populated, they will override the default identity and conversation history.\n";

/// Overrides read from the customization folder
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Customization {
    pub bot_name: Option<String>,
    pub user_name: Option<String>,
    pub identity_text: Option<String>,
    pub history: Vec<Message>,
}

impl Customization {
    /// True when nothing would be overridden
    pub fn is_empty(&self) -> bool {
        self.bot_name.is_none()
            && self.user_name.is_none()
            && self.identity_text.is_none()
            && self.history.is_empty()
    }
}

#[derive(Debug, Default, Deserialize)]
struct CustomIdentity {
    #[serde(default)]
    bot_name: Option<String>,
    #[serde(default)]
    user_name: Option<String>,
    #[serde(default)]
    identity_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CustomMessage {
    role: Role,
    content: String,
    #[serde(default)]
    timestamp: Option<String>,
}

/// Reads and bootstraps the customization folder
#[derive(Debug, Clone)]
pub struct CustomizationLoader {
    dir: PathBuf,
}

impl CustomizationLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the folder with empty override files and a README.
    ///
    /// An existing folder is left untouched. Returns whether it was created.
    pub fn bootstrap(&self) -> Result<bool> {
        if self.dir.exists() {
            return Ok(false);
        }

        fs::create_dir_all(&self.dir)?;
        fs::write(self.dir.join(IDENTITY_FILE), "{}")?;
        fs::write(self.dir.join(HISTORY_FILE), "{}")?;
        fs::write(self.dir.join(README_FILE), README)?;

        info!(dir = %self.dir.display(), "Created customization folder");
        Ok(true)
    }

    /// Read the overrides.
    ///
    /// `Ok(None)` when either file is missing or neither carries an override.
    /// `Err` when a file cannot be read or is not valid JSON of the expected
    /// shape.
    pub fn try_load(&self) -> Result<Option<Customization>> {
        let identity_path = self.dir.join(IDENTITY_FILE);
        let history_path = self.dir.join(HISTORY_FILE);

        if !identity_path.is_file() || !history_path.is_file() {
            debug!(dir = %self.dir.display(), "Customization files not present");
            return Ok(None);
        }

        let identity: JsonValue = serde_json::from_str(&fs::read_to_string(&identity_path)?)?;
        if !identity.is_object() {
            return Err(Error::Customization(format!(
                "{} must contain a JSON object",
                IDENTITY_FILE
            )));
        }
        let identity: CustomIdentity = serde_json::from_value(identity)?;
        let history: JsonValue = serde_json::from_str(&fs::read_to_string(&history_path)?)?;

        // Anything but an array (the bootstrap `{}` included) means no seed.
        let history = match history {
            JsonValue::Array(items) => items
                .into_iter()
                .map(|item| -> Result<Message> {
                    let msg: CustomMessage = serde_json::from_value(item)?;
                    Ok(Message::with_timestamp(
                        msg.role,
                        msg.content,
                        msg.timestamp.unwrap_or_else(timestamp_now),
                    ))
                })
                .collect::<Result<Vec<_>>>()?,
            _ => Vec::new(),
        };

        let customization = Customization {
            bot_name: non_empty(identity.bot_name),
            user_name: non_empty(identity.user_name),
            identity_text: non_empty(identity.identity_text),
            history,
        };

        if customization.is_empty() {
            return Ok(None);
        }
        Ok(Some(customization))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
