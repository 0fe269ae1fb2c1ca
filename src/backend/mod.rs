//! Contracts with the remote study service.

pub mod http;

#[cfg(test)]
pub(crate) mod fake;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::grading::{Answer, QuestionVariant};
use crate::item::StudyItem;

pub use http::HttpBackend;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedPool {
    pub items: Vec<StudyItem>,
    #[serde(default)]
    pub saved_index: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorProgress {
    pub set_id: String,
    pub index: usize,
    pub is_completed: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakSnapshot {
    pub today_points: u32,
    pub daily_goal: u32,
    pub current_streak: u32,
    pub daily_goal_met: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileRequest {
    pub points: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResponse {
    /// The daily goal was met by this call.
    #[serde(default)]
    pub streak_updated: bool,
    #[serde(default)]
    pub today_points: Option<u32>,
    #[serde(default)]
    pub daily_goal: Option<u32>,
    #[serde(default)]
    pub current_streak: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointSubmission {
    pub set_id: String,
    /// [`StudyItem::key`] of every item the quiz was drawn from.
    pub item_ids: Vec<String>,
    pub questions: Vec<QuestionVariant>,
    pub answers: Vec<Answer>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointCorroboration {
    pub per_question_correctness: Vec<bool>,
}

/// The remote side of a study session.
pub trait StudyBackend: Send + Sync {
    fn load_pool<'a>(&'a self, set_id: &'a str) -> BoxFuture<'a, Result<LoadedPool, BackendError>>;

    fn save_cursor_progress(
        &self,
        progress: CursorProgress,
    ) -> BoxFuture<'_, Result<(), BackendError>>;

    fn fetch_streak_snapshot(&self) -> BoxFuture<'_, Result<StreakSnapshot, BackendError>>;

    fn reconcile_action(
        &self,
        request: ReconcileRequest,
    ) -> BoxFuture<'_, Result<ReconcileResponse, BackendError>>;

    /// `Ok(None)` when the backend does not grade on its side.
    fn submit_checkpoint_answers(
        &self,
        submission: CheckpointSubmission,
    ) -> BoxFuture<'_, Result<Option<CheckpointCorroboration>, BackendError>>;
}
