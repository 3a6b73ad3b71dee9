//! Per-conversation message log persisted as one JSON file per key.

use chrono::{DateTime, Utc};
use miniclaw_core::{Message, MiniclawError, Result, Role};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex as TokioMutex, RwLock};
use tracing::{debug, warn};

/// A single stored turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMessage {
    pub role: Role,
    pub content: String,
    /// Names of the tools invoked while producing this turn.
    #[serde(
        default,
        rename = "toolsUsed",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tools_used: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Persisted conversation state for one session key.
///
/// Invariant: `last_consolidated <= messages.len()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub key: String,
    #[serde(default)]
    pub messages: Vec<SessionMessage>,
    /// Index up to which messages have been folded into long-term memory.
    #[serde(default, rename = "lastConsolidated")]
    pub last_consolidated: usize,
}

impl Session {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            messages: vec![],
            last_consolidated: 0,
        }
    }

    /// Append a turn stamped with the current time.
    pub fn add(&mut self, role: Role, content: impl Into<String>, tools_used: Vec<String>) {
        self.messages.push(SessionMessage {
            role,
            content: content.into(),
            tools_used,
            timestamp: Utc::now(),
        });
    }

    /// Up to `n` most recent turns as chat messages. Leading assistant turns
    /// are dropped so the slice always opens with the user, and blank turns
    /// are never replayed.
    pub fn recent_messages(&self, n: usize) -> Vec<Message> {
        let start = self.messages.len().saturating_sub(n);
        self.messages[start..]
            .iter()
            .skip_while(|m| m.role != Role::User)
            .filter(|m| !m.content.trim().is_empty())
            .map(|m| Message::text(m.role, m.content.clone()))
            .collect()
    }

    /// Messages not yet folded into long-term memory.
    pub fn unconsolidated(&self) -> usize {
        self.messages.len().saturating_sub(self.last_consolidated)
    }

    /// Move the watermark forward to `end`, never backwards and never past
    /// the end of the log.
    pub fn advance_watermark(&mut self, end: usize) {
        self.last_consolidated = self.last_consolidated.max(end).min(self.messages.len());
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.last_consolidated = 0;
    }

    fn repair(&mut self) {
        if self.last_consolidated > self.messages.len() {
            self.last_consolidated = self.messages.len();
        }
    }
}

/// Loads and persists sessions under a directory, serializing every
/// read-modify-write of the same key.
pub struct SessionStore {
    dir: PathBuf,
    locks: Arc<RwLock<HashMap<String, Arc<TokioMutex<()>>>>>,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing a key. `:`, `/` and `\` are replaced by `_`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| match c {
                ':' | '/' | '\\' => '_',
                c => c,
            })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }

    async fn key_lock(&self, key: &str) -> Arc<TokioMutex<()>> {
        // Fast path: lock already exists
        {
            let locks = self.locks.read().await;
            if let Some(lock) = locks.get(key) {
                return Arc::clone(lock);
            }
        }
        // Slow path: create a new lock
        let mut locks = self.locks.write().await;
        Arc::clone(
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(TokioMutex::new(()))),
        )
    }

    /// Load a session, creating an empty one when the file is missing or
    /// unreadable.
    pub async fn load(&self, key: &str) -> Session {
        let lock = self.key_lock(key).await;
        let _guard = lock.lock().await;
        self.read(key).await
    }

    /// Persist a session, replacing whatever is on disk for its key.
    pub async fn save(&self, session: &Session) -> Result<()> {
        let lock = self.key_lock(&session.key).await;
        let _guard = lock.lock().await;
        self.write(session).await
    }

    /// Atomically load, modify and persist one session.
    pub async fn update<T>(&self, key: &str, f: impl FnOnce(&mut Session) -> T) -> Result<T> {
        let lock = self.key_lock(key).await;
        let _guard = lock.lock().await;
        let mut session = self.read(key).await;
        let out = f(&mut session);
        session.repair();
        self.write(&session).await?;
        Ok(out)
    }

    async fn read(&self, key: &str) -> Session {
        let path = self.path_for(key);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Session::new(key),
            Err(e) => {
                warn!(session = %key, error = %e, "failed to read session, starting fresh");
                return Session::new(key);
            }
        };
        match serde_json::from_str::<Session>(&raw) {
            Ok(mut session) => {
                session.key = key.to_string();
                session.repair();
                session
            }
            Err(e) => {
                warn!(session = %key, error = %e, "corrupt session file, starting fresh");
                Session::new(key)
            }
        }
    }

    async fn write(&self, session: &Session) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.dir, std::fs::Permissions::from_mode(0o700)).await?;
        }

        let path = self.path_for(&session.key);
        let data = serde_json::to_string_pretty(session)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }
        tokio::fs::rename(&tmp, &path).await.map_err(|e| {
            MiniclawError::Session {
                key: session.key.clone(),
                reason: e.to_string(),
            }
        })?;
        debug!(session = %session.key, messages = session.messages.len(), "session saved");
        Ok(())
    }
}
