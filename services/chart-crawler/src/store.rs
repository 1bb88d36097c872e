//!
//! src/store.rs  Andrew Belles  Oct 3rd, 2025
//!
//! Durable home of the snapshot: one pretty-printed json file that is
//! rewritten whole every cycle. Writes go to a sibling temp file which is
//! then renamed over the target, so readers only ever see a complete file.
//!

use std::{fs, io::{ErrorKind, Write}, path::{Path, PathBuf}};

use serde::Serialize;
use serde_json::{ser::PrettyFormatter, Value};
use tracing::{info, warn};

use crate::errors::CrawlerError;
use crate::types::Snapshot;

/// What a reader finds at the store location
#[derive(Debug, Clone, PartialEq)]
pub enum StoreView {
    Missing,
    Unreadable(String),
    Ready(Value),
}

#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path { &self.path }

    /// Missing or corrupt state both mean "start fresh"
    pub fn load(&self) -> Snapshot {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "store.load.missing");
                return Snapshot::empty();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "store.load.unreadable");
                return Snapshot::empty();
            }
        };

        match serde_json::from_slice::<Snapshot>(&bytes) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "store.load.corrupt");
                Snapshot::empty()
            }
        }
    }

    pub fn save(&self, snapshot: &Snapshot) -> Result<(), CrawlerError> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|e|
            CrawlerError::Store(format!("create dir {}: {e}", parent.display()))
        )?;

        let mut temp = tempfile::NamedTempFile::new_in(&parent)
            .map_err(|e| CrawlerError::Store(
                format!("tempfile in {}: {e}", parent.display())
            ))?;

        {
            let formatter = PrettyFormatter::with_indent(b"    ");
            let mut ser = serde_json::Serializer::with_formatter(temp.as_file_mut(), formatter);
            snapshot.serialize(&mut ser).map_err(|e| CrawlerError::Store(
                format!("serialize snapshot: {e}")
            ))?;
        }
        temp.as_file_mut().write_all(b"\n")?;
        temp.as_file().sync_all()?;

        temp.persist(&self.path)?;
        Ok(())
    }

    /// Raw read for the viewer; never interprets the snapshot beyond json
    pub fn read_view(&self) -> StoreView {
        match fs::read(&self.path) {
            Ok(bytes) => match serde_json::from_slice::<Value>(&bytes) {
                Ok(v) => StoreView::Ready(v),
                Err(e) => StoreView::Unreadable(e.to_string()),
            },
            Err(e) if e.kind() == ErrorKind::NotFound => StoreView::Missing,
            Err(e) => StoreView::Unreadable(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Release;
    use tempfile::TempDir;

    fn sample() -> Snapshot {
        Snapshot {
            updated_at: "2025-10-03 14:05:31".to_string(),
            tracked_artist_names: vec!["IU".to_string()],
            releases: vec![Release {
                artist_display: "아이유".to_string(),
                title: "Love wins all".to_string(),
                image_url: "https://image.example/cover.jpg".to_string(),
                identity_key: "https://www.genie.co.kr/detail/songInfo?xgnm=1".to_string(),
                discovered_at: "2025-10-03 14:05".to_string(),
                is_tracked: true,
                artist_raw: Some("IU".to_string()),
            }],
        }
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::new(dir.path().join("songs_data.json"));
        assert_eq!(store.load(), Snapshot::empty());
        assert_eq!(store.read_view(), StoreView::Missing);
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("songs_data.json");
        fs::write(&path, b"{\"updated_at\": \"2025-10-0").unwrap();

        let store = RecordStore::new(&path);
        assert_eq!(store.load(), Snapshot::empty());
        assert!(matches!(store.read_view(), StoreView::Unreadable(_)));
    }

    #[test]
    fn wrong_shape_loads_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("songs_data.json");
        fs::write(&path, b"[1, 2, 3]").unwrap();
        assert_eq!(RecordStore::new(&path).load(), Snapshot::empty());
    }

    #[test]
    fn directory_in_place_of_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        assert_eq!(RecordStore::new(dir.path()).load(), Snapshot::empty());
    }

    #[test]
    fn save_then_load() -> Result<(), CrawlerError> {
        let dir = TempDir::new()?;
        let store = RecordStore::new(dir.path().join("nested/songs_data.json"));
        store.save(&sample())?;
        assert_eq!(store.load(), sample());

        let text = fs::read_to_string(store.path())?;
        // utf-8 is written as-is, not \u escaped
        assert!(text.contains("아이유"));
        assert!(text.contains("\n    \"songs\""));
        Ok(())
    }

    #[test]
    fn save_overwrites_and_leaves_no_temp_files() -> Result<(), CrawlerError> {
        let dir = TempDir::new()?;
        let store = RecordStore::new(dir.path().join("songs_data.json"));
        store.save(&sample())?;
        store.save(&Snapshot::empty())?;

        assert_eq!(store.load(), Snapshot::empty());
        let entries = fs::read_dir(dir.path())?.count();
        assert_eq!(entries, 1);
        Ok(())
    }

    #[test]
    fn failed_save_keeps_previous_content() -> Result<(), CrawlerError> {
        let dir = TempDir::new()?;
        let path = dir.path().join("songs_data.json");
        let store = RecordStore::new(&path);
        store.save(&sample())?;

        // parent that is a regular file: the temp file cannot be created
        let blocked = RecordStore::new(path.join("child.json"));
        assert!(blocked.save(&Snapshot::empty()).is_err());
        assert_eq!(store.load(), sample());
        Ok(())
    }

    #[test]
    fn null_fields_do_not_discard_history() -> Result<(), CrawlerError> {
        use crate::retention::{AgingPolicy, RetentionPolicy};

        let dir = TempDir::new()?;
        let path = dir.path().join("songs_data.json");
        fs::write(&path, r#"{
            "updated_at": "2025-10-03 14:05:31",
            "songs": [
                { "artist": "IU", "title": "a", "image": "https://image.example/1.jpg",
                  "link": "k1", "found_at": "2025-10-03 14:05", "is_tracked": true },
                { "artist": "aespa", "title": "b", "image": null,
                  "link": "k2", "found_at": null, "is_tracked": true }
            ]
        }"#)?;

        let store = RecordStore::new(&path);
        let snap = store.load();
        assert_eq!(snap.releases.len(), 2);
        assert_eq!(snap.releases[1].image_url, "");
        assert!(matches!(store.read_view(), StoreView::Ready(_)));

        // a record with no usable date is kept, not aged out
        let now = snap.releases[0].discovered_at().unwrap();
        let kept = AgingPolicy::default().apply(snap.releases, &now);
        assert_eq!(kept.len(), 2);
        Ok(())
    }
}
