//! In-process backend used by session tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;

use super::{
    CheckpointCorroboration, CheckpointSubmission, CursorProgress, LoadedPool, ReconcileRequest,
    ReconcileResponse, StreakSnapshot, StudyBackend,
};
use crate::error::BackendError;
use crate::item::StudyItem;

#[derive(Default)]
pub(crate) struct FakeBackend {
    pub pool: Vec<StudyItem>,
    pub saved_index: Option<usize>,
    pub snapshot: StreakSnapshot,
    pub fail_reconcile: AtomicBool,
    pub fail_snapshot: bool,
    pub corroboration: Mutex<Option<Vec<bool>>>,
    pub today_points: Mutex<u32>,
    pub reconciled: Mutex<Vec<ReconcileRequest>>,
    pub saved: Mutex<Vec<CursorProgress>>,
    pub submissions: Mutex<Vec<CheckpointSubmission>>,
}

impl FakeBackend {
    pub fn with_items(pool: Vec<StudyItem>) -> Self {
        FakeBackend {
            pool,
            snapshot: StreakSnapshot {
                today_points: 0,
                daily_goal: 10,
                current_streak: 2,
                daily_goal_met: false,
            },
            ..FakeBackend::default()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_reconcile.store(failing, Ordering::SeqCst);
    }

    pub fn reconciled_points(&self) -> Vec<u32> {
        self.reconciled
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.points)
            .collect()
    }

    pub fn saved_progress(&self) -> Vec<CursorProgress> {
        self.saved.lock().unwrap().clone()
    }
}

fn unavailable() -> BackendError {
    BackendError::Rejected {
        status: 503,
        message: "unavailable".into(),
    }
}

impl StudyBackend for FakeBackend {
    fn load_pool<'a>(&'a self, _set_id: &'a str) -> BoxFuture<'a, Result<LoadedPool, BackendError>> {
        let pool = LoadedPool {
            items: self.pool.clone(),
            saved_index: self.saved_index,
        };
        async move { Ok(pool) }.boxed()
    }

    fn save_cursor_progress(
        &self,
        progress: CursorProgress,
    ) -> BoxFuture<'_, Result<(), BackendError>> {
        self.saved.lock().unwrap().push(progress);
        async { Ok(()) }.boxed()
    }

    fn fetch_streak_snapshot(&self) -> BoxFuture<'_, Result<StreakSnapshot, BackendError>> {
        let result = if self.fail_snapshot {
            Err(unavailable())
        } else {
            Ok(self.snapshot.clone())
        };
        async move { result }.boxed()
    }

    fn reconcile_action(
        &self,
        request: ReconcileRequest,
    ) -> BoxFuture<'_, Result<ReconcileResponse, BackendError>> {
        self.reconciled.lock().unwrap().push(request);
        let result = if self.fail_reconcile.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            let mut today = self.today_points.lock().unwrap();
            let before = self.snapshot.today_points + *today;
            *today += request.points;
            let after = before + request.points;
            let goal = self.snapshot.daily_goal;
            Ok(ReconcileResponse {
                streak_updated: before < goal && after >= goal,
                today_points: Some(after),
                daily_goal: Some(goal),
                current_streak: Some(self.snapshot.current_streak + u32::from(after >= goal)),
            })
        };
        async move { result }.boxed()
    }

    fn submit_checkpoint_answers(
        &self,
        submission: CheckpointSubmission,
    ) -> BoxFuture<'_, Result<Option<CheckpointCorroboration>, BackendError>> {
        self.submissions.lock().unwrap().push(submission);
        let result = self
            .corroboration
            .lock()
            .unwrap()
            .clone()
            .map(|per_question_correctness| CheckpointCorroboration {
                per_question_correctness,
            });
        async move { Ok(result) }.boxed()
    }
}
