//! Assistant identity (persona) handling
//!
//! An identity file starts with a two-line header naming the user and the
//! bot, then a blank line, then the persona text:
//!
//! ```text
//! User: Ana
//! Bot: Nova
//!
//! I am an artificial intelligence ...
//! ```
//!
//! The bot name is read back positionally from the second line when a
//! session is resumed.

use std::path::Path;

use crate::{Error, Result};

/// Bot name used when an identity file carries no readable header
pub const FALLBACK_BOT_NAME: &str = "Assistant";

const USER_KEY: &str = "User";
const BOT_KEY: &str = "Bot";
const SEPARATOR: &str = ": ";

/// Default persona for a bot living on the user's machine
pub fn default_identity(bot_name: &str, user_name: &str) -> String {
    format!(
        "I am an artificial intelligence trained by Kaktarua Studio to help people. My name is {bot_name}. \
         I strive to answer questions thoughtfully, succinctly, and factually. \
         If I don't know something or make a mistake, I will admit it. \
         I am not a human and do not have a physical form—I live on {user_name}'s PC. \
         I love my job of helping humans! I am powered by CosmosRP's self-developed large language model API."
    )
}

/// Parsed contents of a session identity file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityFile {
    pub user_name: String,
    pub bot_name: String,
    pub identity: String,
}

impl IdentityFile {
    pub fn new(
        user_name: impl Into<String>,
        bot_name: impl Into<String>,
        identity: impl Into<String>,
    ) -> Self {
        Self {
            user_name: user_name.into(),
            bot_name: bot_name.into(),
            identity: identity.into(),
        }
    }

    /// File contents: header, blank line, persona text
    pub fn render(&self) -> String {
        format!(
            "{USER_KEY}{SEPARATOR}{}\n{BOT_KEY}{SEPARATOR}{}\n\n{}\n",
            self.user_name, self.bot_name, self.identity
        )
    }

    /// Parse identity file contents. `path` is only used for error messages.
    pub fn parse(path: &Path, raw: &str) -> Result<Self> {
        let parse_error = |reason: &str| Error::IdentityParse {
            path: path.display().to_string(),
            reason: reason.to_string(),
        };

        let mut lines = raw.lines();
        let user_line = lines.next().unwrap_or_default();
        let bot_line = lines
            .next()
            .ok_or_else(|| parse_error("missing bot name line"))?;

        let (key, bot_name) = bot_line
            .split_once(SEPARATOR)
            .ok_or_else(|| parse_error("bot name line has no separator"))?;
        if key.trim() != BOT_KEY {
            return Err(parse_error("second line is not a bot name header"));
        }
        let bot_name = bot_name.trim();
        if bot_name.is_empty() {
            return Err(parse_error("bot name is empty"));
        }

        let user_name = match user_line.split_once(SEPARATOR) {
            Some((key, name)) if key.trim() == USER_KEY => name.trim(),
            _ => "",
        };

        // Persona text follows the first blank line after the header.
        let identity = lines
            .skip_while(|line| !line.trim().is_empty())
            .skip(1)
            .collect::<Vec<_>>()
            .join("\n");

        Ok(Self::new(user_name, bot_name, identity.trim()))
    }
}
