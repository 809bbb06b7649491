use crate::{latest_index, RoundStore, StoreError};
use async_trait::async_trait;
use gm_core::RoundDocument;
use std::collections::HashMap;
use std::sync::Mutex;

/// Process-local store, mainly for tests and offline play.
#[derive(Default)]
pub struct MemoryStore {
    timelines: Mutex<HashMap<String, Vec<RoundDocument>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every document stored for `game_id`, in insertion order.
    pub fn timeline(&self, game_id: &str) -> Vec<RoundDocument> {
        self.timelines
            .lock()
            .map(|t| t.get(game_id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RoundStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn pull_latest(&self, game_id: &str) -> Result<Option<RoundDocument>, StoreError> {
        let timelines = self
            .timelines
            .lock()
            .map_err(|_| std::io::Error::other("memory store lock poisoned"))?;
        Ok(timelines
            .get(game_id)
            .and_then(|docs| latest_index(docs).map(|idx| docs[idx].clone())))
    }

    async fn push_new(&self, doc: &RoundDocument) -> Result<(), StoreError> {
        let mut timelines = self
            .timelines
            .lock()
            .map_err(|_| std::io::Error::other("memory store lock poisoned"))?;
        timelines
            .entry(doc.game_id.clone())
            .or_default()
            .push(doc.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::doc;

    #[tokio::test]
    async fn latest_is_max_round_id() {
        let store = MemoryStore::new();
        for round in [2, 5, 4] {
            store.push_new(&doc("room", round)).await.unwrap();
        }
        assert_eq!(store.pull_latest("room").await.unwrap().unwrap().round_id, 5);
        assert_eq!(store.timeline("room").len(), 3);
        assert!(store.pull_latest("elsewhere").await.unwrap().is_none());
    }
}
