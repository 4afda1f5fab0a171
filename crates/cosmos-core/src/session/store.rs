//! File-backed session persistence
//!
//! Each session is a pair of files in the data directory:
//! `<id>_chat_history.json` and `<id>_identity.txt`, where `<id>` is the
//! local creation time.

use chrono::Local;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::identity::IdentityFile;
use crate::session::Message;
use crate::{Error, Result};

const HISTORY_SUFFIX: &str = "_chat_history.json";
const BACKUP_EXTENSION: &str = "bak";
const IDENTITY_SUFFIX: &str = "_identity.txt";
const SESSION_ID_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Directory-based session store
#[derive(Debug, Clone)]
pub struct SessionStore {
    data_dir: PathBuf,
}

impl SessionStore {
    /// Create a store rooted at `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Create the data directory if it does not exist
    pub fn bootstrap(&self) -> Result<()> {
        if !self.data_dir.exists() {
            fs::create_dir_all(&self.data_dir)?;
            info!(dir = %self.data_dir.display(), "Created data directory");
        }
        Ok(())
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn history_path(&self, id: &str) -> PathBuf {
        self.data_dir.join(format!("{id}{HISTORY_SUFFIX}"))
    }

    /// Where an undecodable history file is moved aside
    pub fn history_backup_path(&self, id: &str) -> PathBuf {
        self.data_dir
            .join(format!("{id}{HISTORY_SUFFIX}.{BACKUP_EXTENSION}"))
    }

    pub fn identity_path(&self, id: &str) -> PathBuf {
        self.data_dir.join(format!("{id}{IDENTITY_SUFFIX}"))
    }

    /// Session id for a session created now
    pub fn new_session_id() -> String {
        Local::now().format(SESSION_ID_FORMAT).to_string()
    }

    /// Ids of all sessions with a history file, oldest first
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.data_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if let Some(id) = name.to_str().and_then(|n| n.strip_suffix(HISTORY_SUFFIX)) {
                if !id.is_empty() {
                    ids.push(id.to_string());
                }
            }
        }

        ids.sort();
        debug!("Found {} sessions in {}", ids.len(), self.data_dir.display());
        Ok(ids)
    }

    /// Whether a history file exists for `id`
    pub fn exists(&self, id: &str) -> bool {
        self.history_path(id).is_file()
    }

    /// Create a session stamped with the current time
    pub fn create(&self, identity: &IdentityFile, seed: &[Message]) -> Result<String> {
        let id = Self::new_session_id();
        self.create_with_id(&id, identity, seed)?;
        Ok(id)
    }

    /// Create a session under an explicit id, writing both files
    pub fn create_with_id(&self, id: &str, identity: &IdentityFile, seed: &[Message]) -> Result<()> {
        if self.history_path(id).exists() || self.identity_path(id).exists() {
            return Err(Error::SessionExists(id.to_string()));
        }

        self.bootstrap()?;
        self.save_identity(id, identity)?;
        self.save_history(id, seed)?;

        info!(session = %id, messages = seed.len(), "Created session");
        Ok(())
    }

    /// Load the message history of a session.
    ///
    /// A missing or empty file yields an empty history. A file that cannot
    /// be decoded is moved to [`history_backup_path`](Self::history_backup_path)
    /// before an empty history is returned, so the next save cannot
    /// overwrite it.
    pub fn load_history(&self, id: &str) -> Result<Vec<Message>> {
        let path = self.history_path(id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let content = content.trim();
        if content.is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str(content) {
            Ok(messages) => Ok(messages),
            Err(e) => {
                let backup = self.history_backup_path(id);
                fs::rename(&path, &backup)?;
                warn!(
                    path = %path.display(),
                    backup = %backup.display(),
                    error = %e,
                    "Could not decode chat history, moved it aside and starting with empty history"
                );
                Ok(Vec::new())
            }
        }
    }

    /// Overwrite the history file with the full message list
    pub fn save_history(&self, id: &str, messages: &[Message]) -> Result<()> {
        let path = self.history_path(id);
        fs::write(&path, to_pretty_json(messages)?)?;
        debug!(path = %path.display(), messages = messages.len(), "Saved chat history");
        Ok(())
    }

    /// Raw identity file contents
    pub fn read_identity(&self, id: &str) -> Result<String> {
        let path = self.identity_path(id);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::SessionNotFound(format!(
                "identity file '{}' not found",
                path.display()
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Read and parse the identity file of a session
    pub fn load_identity(&self, id: &str) -> Result<IdentityFile> {
        let raw = self.read_identity(id)?;
        IdentityFile::parse(&self.identity_path(id), &raw)
    }

    pub fn save_identity(&self, id: &str, identity: &IdentityFile) -> Result<()> {
        fs::write(self.identity_path(id), identity.render())?;
        Ok(())
    }
}

/// JSON with 4-space indentation
fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    Ok(buf)
}
