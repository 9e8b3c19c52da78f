//! Local persistence of the cached session list.
//!
//! A plain JSON file under the platform data directory, so the session
//! picker has something to show before the first refresh and when offline.

use std::fs;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;

use crate::models::Session;

const SESSIONS_FILE: &str = "sessions.json";

/// Get the application data directory, creating it if needed.
pub fn data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().ok_or_else(|| eyre!("No data directory available"))?;
    let dir = base.join("parley");
    if !dir.exists() {
        fs::create_dir_all(&dir).wrap_err("Failed to create data directory")?;
    }
    Ok(dir)
}

/// Save the session list to the default location.
pub fn save_sessions(sessions: &[Session]) -> Result<()> {
    save_sessions_to(&data_dir()?.join(SESSIONS_FILE), sessions)
}

/// Load the session list from the default location.
///
/// A missing file is an empty list, not an error.
pub fn load_sessions() -> Result<Vec<Session>> {
    load_sessions_from(&data_dir()?.join(SESSIONS_FILE))
}

/// Save the session list to a specific file.
pub fn save_sessions_to(path: &Path, sessions: &[Session]) -> Result<()> {
    let json =
        serde_json::to_string_pretty(sessions).wrap_err("Failed to serialize sessions")?;
    fs::write(path, json).wrap_err("Failed to write sessions file")?;
    Ok(())
}

/// Load the session list from a specific file.
pub fn load_sessions_from(path: &Path) -> Result<Vec<Session>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let json = fs::read_to_string(path).wrap_err("Failed to read sessions file")?;
    let sessions = serde_json::from_str(&json).wrap_err("Failed to parse sessions file")?;
    Ok(sessions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str) -> Session {
        Session {
            id: id.to_string(),
            app_name: "sample_agent".to_string(),
            user_id: "u-1".to_string(),
            last_update_time: 1_741_746_967,
            title: "Weather".to_string(),
        }
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");

        let sessions = vec![session("a"), session("b")];
        save_sessions_to(&path, &sessions).unwrap();

        let loaded = load_sessions_from(&path).unwrap();
        assert_eq!(loaded, sessions);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_sessions_from(&dir.path().join("nope.json")).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_load_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        fs::write(&path, "not json").unwrap();
        assert!(load_sessions_from(&path).is_err());
    }
}
