use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::dao::{
    match_store::MatchStore,
    models::MatchRecordEntity,
    storage::{StorageError, StorageResult},
};

#[derive(Debug, Error)]
#[error("in-memory match store marked unavailable")]
struct Unavailable;

/// Match store keeping records in process memory.
///
/// Used when no database is configured and by tests. Availability can be
/// toggled to exercise degraded-mode handling.
#[derive(Clone, Default)]
pub struct MemoryMatchStore {
    records: Arc<RwLock<Vec<MatchRecordEntity>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryMatchStore {
    /// Snapshot of every record written so far, oldest first.
    pub async fn records(&self) -> Vec<MatchRecordEntity> {
        self.records.read().await.clone()
    }

    /// Make every call fail (`false`) or succeed again (`true`).
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    fn check(&self) -> StorageResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(
                "memory store unavailable".into(),
                Unavailable,
            ));
        }
        Ok(())
    }
}

impl MatchStore for MemoryMatchStore {
    fn record_match(&self, record: MatchRecordEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.check()?;
            store.records.write().await.push(record);
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.check() })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.check() })
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::dao::models::GameType;

    fn record() -> MatchRecordEntity {
        let started_at = SystemTime::UNIX_EPOCH;
        MatchRecordEntity {
            player1_id: Some(1),
            player1_nickname: "ada".into(),
            player2_id: Some(2),
            player2_nickname: "bob".into(),
            winner_id: Some(1),
            winner_nickname: "ada".into(),
            player1_score: 11,
            player2_score: 4,
            game_type: GameType::Casual,
            tournament_id: None,
            match_id: None,
            started_at,
            ended_at: started_at + Duration::from_secs(60),
            duration_seconds: 60,
        }
    }

    #[tokio::test]
    async fn records_are_appended_in_order() {
        let store = MemoryMatchStore::default();
        store.record_match(record()).await.unwrap();
        let mut second = record();
        second.player2_score = 9;
        store.record_match(second.clone()).await.unwrap();

        let records = store.records().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], second);
    }

    #[tokio::test]
    async fn unavailable_store_rejects_writes_and_health_checks() {
        let store = MemoryMatchStore::default();
        store.set_available(false);

        assert!(store.health_check().await.is_err());
        assert!(store.try_reconnect().await.is_err());
        assert!(store.record_match(record()).await.is_err());
        assert!(store.records().await.is_empty());

        store.set_available(true);
        assert!(store.health_check().await.is_ok());
    }
}
