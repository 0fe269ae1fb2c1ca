use std::collections::HashMap;

use chrono::NaiveDate;
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::backend::{
    CheckpointCorroboration, CheckpointSubmission, CursorProgress, LoadedPool, ReconcileRequest,
    ReconcileResponse, StreakSnapshot, StudyBackend,
};
use crate::error::BackendError;
use crate::item::StudyItem;

use super::DB;

/// Serves decks loaded from disk and keeps progress and points in the local database.
pub struct LocalBackend {
    db: DB,
    daily_goal: u32,
    sets: HashMap<String, Vec<StudyItem>>,
}

impl LocalBackend {
    pub fn new(db: DB, daily_goal: u32) -> Self {
        LocalBackend {
            db,
            daily_goal,
            sets: HashMap::new(),
        }
    }

    pub fn register(&mut self, set_id: impl Into<String>, items: Vec<StudyItem>) {
        self.sets.insert(set_id.into(), items);
    }

    pub fn db(&self) -> &DB {
        &self.db
    }

    fn today() -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

impl StudyBackend for LocalBackend {
    fn load_pool<'a>(&'a self, set_id: &'a str) -> BoxFuture<'a, Result<LoadedPool, BackendError>> {
        async move {
            let items = self
                .sets
                .get(set_id)
                .cloned()
                .ok_or_else(|| BackendError::UnknownSet(set_id.to_string()))?;
            let saved_index = self.db.saved_index(set_id).await?;
            Ok(LoadedPool { items, saved_index })
        }
        .boxed()
    }

    fn save_cursor_progress(
        &self,
        progress: CursorProgress,
    ) -> BoxFuture<'_, Result<(), BackendError>> {
        async move { self.db.save_progress(&progress).await }.boxed()
    }

    fn fetch_streak_snapshot(&self) -> BoxFuture<'_, Result<StreakSnapshot, BackendError>> {
        async move { self.db.snapshot_on(Self::today(), self.daily_goal).await }.boxed()
    }

    fn reconcile_action(
        &self,
        request: ReconcileRequest,
    ) -> BoxFuture<'_, Result<ReconcileResponse, BackendError>> {
        async move {
            self.db
                .add_points_on(Self::today(), request.points, self.daily_goal)
                .await
        }
        .boxed()
    }

    fn submit_checkpoint_answers(
        &self,
        _submission: CheckpointSubmission,
    ) -> BoxFuture<'_, Result<Option<CheckpointCorroboration>, BackendError>> {
        async { Ok(None) }.boxed()
    }
}
