//! File-backed conversation persistence.
//!
//! A session lives at `<storage_dir>/session_<id>/session.json`. Restarting
//! the agent with the same id picks the conversation back up.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SessionError;
use crate::llm::ModelMessage;

const SESSION_FILE: &str = "session.json";

#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    session_id: String,
    messages: Vec<ModelMessage>,
}

#[derive(Debug, Clone)]
pub struct FileSession {
    session_id: String,
    dir: PathBuf,
}

impl FileSession {
    pub fn new(
        session_id: impl Into<String>,
        storage_dir: impl AsRef<Path>,
    ) -> Result<Self, SessionError> {
        let session_id = session_id.into();
        let valid = !session_id.is_empty()
            && session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(SessionError::InvalidId(session_id));
        }

        let dir = storage_dir
            .as_ref()
            .join(format!("session_{session_id}"));
        Ok(Self { session_id, dir })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    /// Returns the stored history, or an empty one for a new session.
    pub fn load(&self) -> Result<Vec<ModelMessage>, SessionError> {
        let path = self.path();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(SessionError::Io { path, source }),
        };

        let file: SessionFile = serde_json::from_str(&raw)
            .map_err(|source| SessionError::Corrupt {
                path: path.clone(),
                source,
            })?;

        debug!(session = %self.session_id, messages = file.messages.len(), "session loaded");
        Ok(file.messages)
    }

    /// Writes the whole history, replacing the previous file atomically.
    pub fn save(&self, messages: &[ModelMessage]) -> Result<(), SessionError> {
        fs::create_dir_all(&self.dir).map_err(|source| SessionError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let body = serde_json::to_vec_pretty(&SessionFile {
            session_id: self.session_id.clone(),
            messages: messages.to_vec(),
        })
        .map_err(|source| SessionError::Corrupt {
            path: self.path(),
            source,
        })?;

        let tmp = self.dir.join(format!("{SESSION_FILE}.tmp"));
        fs::write(&tmp, body).map_err(|source| SessionError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, self.path()).map_err(|source| SessionError::Io {
            path: self.path(),
            source,
        })?;

        debug!(session = %self.session_id, messages = messages.len(), "session saved");
        Ok(())
    }
}
