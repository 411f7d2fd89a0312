//! Local persistence of the conversation log
//!
//! The message log is written after every settled turn so a restarted
//! process can rehydrate the conversation. Quota and UI state are not
//! persisted; the controller recomputes the count from the restored log
//! and prompts re-derive from the next response.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use sana_chat::Message;

/// On-disk snapshot format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub saved_at: i64,
    pub messages: Vec<Message>,
}

/// Get the data directory
pub fn data_dir() -> PathBuf {
    // Check for SANA_DATA_DIR env var first
    if let Ok(path) = std::env::var("SANA_DATA_DIR") {
        return PathBuf::from(path);
    }
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sana")
}

/// Persist the current message log.
pub fn save(messages: &[Message]) -> std::io::Result<()> {
    save_to(&data_dir(), messages)
}

/// Load the persisted log, if any. A corrupt snapshot is treated as
/// absent rather than failing startup.
pub fn load() -> Option<Vec<Message>> {
    load_from(&data_dir())
}

/// Delete the persisted log. Missing file is fine.
pub fn clear() -> std::io::Result<()> {
    clear_in(&data_dir())
}

fn snapshot_path(dir: &Path) -> PathBuf {
    dir.join("snapshot.json")
}

fn save_to(dir: &Path, messages: &[Message]) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;

    let snapshot = Snapshot {
        saved_at: chrono::Utc::now().timestamp_millis(),
        messages: messages.to_vec(),
    };
    let content = serde_json::to_string(&snapshot)?;
    fs::write(snapshot_path(dir), content)
}

fn load_from(dir: &Path) -> Option<Vec<Message>> {
    let content = fs::read_to_string(snapshot_path(dir)).ok()?;
    match serde_json::from_str::<Snapshot>(&content) {
        Ok(snapshot) => Some(snapshot.messages),
        Err(e) => {
            eprintln!("Warning: Ignoring corrupt snapshot: {}", e);
            None
        }
    }
}

fn clear_in(dir: &Path) -> std::io::Result<()> {
    match fs::remove_file(snapshot_path(dir)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_store(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .subsec_nanos();
        std::env::temp_dir().join(format!("sana-snap-{}-{}-{}", tag, std::process::id(), nanos))
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let dir = temp_store("roundtrip");
        let messages = vec![
            Message::bot("Hi, describe your symptoms."),
            Message::user("my head hurts"),
        ];

        save_to(&dir, &messages).unwrap();
        let restored = load_from(&dir).unwrap();

        assert_eq!(restored.len(), 2);
        assert_eq!(restored[0].text, "Hi, describe your symptoms.");
        assert_eq!(restored[1].text, "my head hurts");
        assert!(restored[1].is_user());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_missing_snapshot_returns_none() {
        let dir = temp_store("missing");
        assert!(load_from(&dir).is_none());
    }

    #[test]
    fn test_corrupt_snapshot_treated_as_absent() {
        let dir = temp_store("corrupt");
        fs::create_dir_all(&dir).unwrap();
        fs::write(snapshot_path(&dir), "{not json").unwrap();

        assert!(load_from(&dir).is_none());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_clear_tolerates_missing_file() {
        let dir = temp_store("clear");
        clear_in(&dir).unwrap();

        fs::create_dir_all(&dir).unwrap();
        fs::write(snapshot_path(&dir), "{}").unwrap();
        clear_in(&dir).unwrap();
        assert!(!snapshot_path(&dir).exists());

        fs::remove_dir_all(&dir).unwrap();
    }
}
