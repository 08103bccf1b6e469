use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

pub const SESSION_FILE_NAME: &str = ".quickvision_activation.json";

/// Activation record kept between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub activation_code: Option<String>,
    pub user_id: Option<i64>,
    /// Stored either as a JSON string or number.
    pub chat_id: Option<Value>,
    pub username: Option<String>,
}

impl Session {
    pub fn chat_id(&self) -> Option<String> {
        match self.chat_id.as_ref()? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.quickvision_activation.json`, or the working directory when no home
    /// directory is known.
    pub fn default_path() -> PathBuf {
        dirs_next::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(SESSION_FILE_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored session. Missing or unreadable files yield `None`.
    pub fn load(&self) -> Option<Session> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("failed to read session {}: {e}", self.path.display());
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!("ignoring corrupt session {}: {e}", self.path.display());
                None
            }
        }
    }

    pub fn save(&self, session: &Session) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, json)?;
        tracing::info!("session saved to {}", self.path.display());
        Ok(())
    }
}
