use crate::{latest_index, RoundStore, StoreError};
use async_trait::async_trait;
use gm_core::RoundDocument;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

type Timelines = BTreeMap<String, Vec<RoundDocument>>;

/// JSON file holding every game's timeline: `{ gameId: [doc, ...] }`.
///
/// Writes go to a sibling temp file that is renamed over the original, so a
/// crash mid-write leaves the previous file intact.
pub struct LocalFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Timelines, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Timelines::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Timelines::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, data: &Timelines) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(data)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl RoundStore for LocalFileStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn pull_latest(&self, game_id: &str) -> Result<Option<RoundDocument>, StoreError> {
        let mut data = self.load().await?;
        let Some(mut timeline) = data.remove(game_id) else {
            debug!(game_id, "no saved rounds");
            return Ok(None);
        };
        let latest = latest_index(&timeline).map(|idx| timeline.swap_remove(idx));
        if let Some(doc) = &latest {
            debug!(game_id, round_id = doc.round_id, "pulled latest round");
        }
        Ok(latest)
    }

    async fn push_new(&self, doc: &RoundDocument) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut data = self.load().await?;
        data.entry(doc.game_id.clone()).or_default().push(doc.clone());
        self.save(&data).await?;
        info!(game_id = %doc.game_id, round_id = doc.round_id, path = %self.path.display(), "saved round");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::doc;

    #[tokio::test]
    async fn missing_file_means_no_game() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path().join("none.json"));
        assert!(store.pull_latest("default_room").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn push_then_pull_returns_highest_round() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path().join("saves").join("games.json"));
        for round in [1, 3, 2] {
            store.push_new(&doc("default_room", round)).await.unwrap();
        }
        store.push_new(&doc("other_room", 9)).await.unwrap();
        let latest = store.pull_latest("default_room").await.unwrap().unwrap();
        assert_eq!(latest.round_id, 3);
        assert_eq!(latest.history.entries()[0].text, "round 3");
        assert_eq!(latest.passive_rules, doc("default_room", 3).passive_rules);
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();
        let store = LocalFileStore::new(&path);
        assert!(matches!(
            store.pull_latest("default_room").await,
            Err(StoreError::Serde(_))
        ));
    }
}
