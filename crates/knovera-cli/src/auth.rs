//! Stored login session
//!
//! Keeps the bearer token and user identity in ~/.config/knovera/session.json
//! with restricted permissions (0o600).

use knovera_ai::{SessionContext, UserIdentity, UserRole};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// What survives between runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: String,
    pub user_id: Option<String>,
    pub role: Option<UserRole>,
}

impl StoredSession {
    pub fn identity(&self) -> Option<UserIdentity> {
        self.user_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(|id| UserIdentity::new(id, self.role.unwrap_or(UserRole::Teacher)))
    }
}

fn session_file() -> PathBuf {
    crate::config::Config::config_dir().join("session.json")
}

fn load_from(path: &Path) -> Option<StoredSession> {
    let content = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(session) => Some(session),
        Err(e) => {
            tracing::warn!("Ignoring unreadable session file {}: {}", path.display(), e);
            None
        }
    }
}

fn save_to(path: &Path, session: &StoredSession) -> io::Result<()> {
    if let Some(dir) = path.parent().filter(|dir| !dir.exists()) {
        fs::create_dir_all(dir)?;
        #[cfg(unix)]
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    }

    let content = serde_json::to_string_pretty(session)?;
    fs::write(path, content)?;

    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

    Ok(())
}

fn remove_at(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Load the stored session, if any
pub fn load_session() -> Option<StoredSession> {
    load_from(&session_file())
}

/// Persist a session
pub fn save_session(session: &StoredSession) -> io::Result<PathBuf> {
    let path = session_file();
    save_to(&path, session)?;
    Ok(path)
}

/// Remove the stored session and clear the live context.
/// Returns whether a file was removed.
pub fn logout(context: &SessionContext) -> io::Result<bool> {
    context.clear();
    remove_at(&session_file())
}

/// Build the live session context on boot
pub fn boot_context(stored: Option<&StoredSession>) -> SessionContext {
    match stored {
        Some(session) => SessionContext::load(Some(session.token.clone()), session.identity()),
        None => SessionContext::new(),
    }
}
