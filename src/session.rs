//! The study session: the only piece a view layer talks to.
//!
//! Intents (reveal, drag, next/previous, quiz submission) run synchronously
//! against the cursor, scheduler and ledger. Remote calls are spawned on the
//! tokio runtime and their results come back over a channel, to be applied by
//! [`StudySession::poll_updates`] or [`StudySession::next_events`]. Intent
//! methods must therefore be called from within a tokio runtime.

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::backend::{
    CheckpointCorroboration, CheckpointSubmission, CursorProgress, LoadedPool, ReconcileRequest,
    ReconcileResponse, StudyBackend,
};
use crate::celebration::{CelebrationHandle, CelebrationPlan, CelebrationStage};
use crate::checkpoint::{Checkpoint, CheckpointPlan, CheckpointScheduler, PassCache};
use crate::config::EngineConfig;
use crate::cursor::{AdvanceOutcome, CursorState, DeckCursor, Direction, RevealOutcome};
use crate::error::{BackendError, EngineError};
use crate::grading::{self, Answer, QuizScore};
use crate::item::StudyItem;
use crate::ledger::{
    ActionKind, LedgerEvent, PendingAction, ProgressLedger, QUIZ_POINTS_PER_ANSWER,
    RECORDING_POINTS, REVEAL_POINTS, StreakState,
};
use crate::quiz::QuestionSet;

/// Something the view should react to, produced when remote results are applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    PointsConfirmed { kind: ActionKind, points: u32 },
    PointsRolledBack { kind: ActionKind, points: u32 },
    GoalMet { streak_days: u32 },
    Celebration(CelebrationStage),
    /// The server graded these questions differently. The local grade stands.
    GradingMismatch { quiz_id: u64, questions: Vec<usize> },
}

enum SessionUpdate {
    Reconciled {
        pending: PendingAction,
        result: Result<ReconcileResponse, BackendError>,
    },
    Corroborated {
        quiz_id: u64,
        local: Vec<bool>,
        result: Result<Option<CheckpointCorroboration>, BackendError>,
    },
    Celebration(CelebrationStage),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Navigation {
    Moved {
        from: usize,
        to: usize,
        direction: Direction,
    },
    /// Nothing moved; the cursor's reason is attached.
    Stayed(AdvanceOutcome),
    CheckpointStarted {
        boundary: usize,
        is_final: bool,
        questions: usize,
    },
    /// A boundary cleared earlier in the session was crossed again.
    Reviewed { boundary: usize, score: QuizScore },
    Finished,
}

#[derive(Clone, Debug)]
pub struct ActiveCheckpoint {
    pub checkpoint: Checkpoint,
    /// `None` after a failed submission until a retry, or when no quiz could be built.
    pub quiz: Option<QuestionSet>,
    pub quiz_id: u64,
    pub attempts: u32,
    pub last_score: Option<QuizScore>,
}

#[derive(Clone, Debug)]
pub enum SessionMode {
    Studying,
    Checkpoint(ActiveCheckpoint),
    Completed,
}

#[derive(Clone, Debug, PartialEq)]
pub struct QuizOutcome {
    pub score: QuizScore,
    /// Where the cursor went after a pass; `None` when the quiz was failed.
    pub navigation: Option<Navigation>,
}

pub struct StudySession {
    set_id: String,
    items: Vec<StudyItem>,
    loaded_order: Vec<StudyItem>,
    config: EngineConfig,
    cursor: DeckCursor,
    scheduler: CheckpointScheduler,
    ledger: ProgressLedger,
    mode: SessionMode,
    backend: Arc<dyn StudyBackend>,
    rng: StdRng,
    updates_tx: mpsc::UnboundedSender<SessionUpdate>,
    updates_rx: mpsc::UnboundedReceiver<SessionUpdate>,
    in_flight: usize,
    /// Celebration stages scheduled but not yet applied.
    pending_stages: usize,
    celebrations: Vec<CelebrationHandle>,
    saves: Vec<JoinHandle<()>>,
    next_quiz_id: u64,
}

impl StudySession {
    /// Loads the pool and seeds the streak. A missing snapshot is not fatal.
    pub async fn start(
        backend: Arc<dyn StudyBackend>,
        set_id: impl Into<String>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let set_id = set_id.into();
        let pool = backend.load_pool(&set_id).await?;
        let streak = match backend.fetch_streak_snapshot().await {
            Ok(snapshot) => StreakState::from_snapshot(&snapshot),
            Err(err) => {
                log::warn!("streak snapshot unavailable, starting from zero: {err}");
                StreakState::offline(config.daily_goal)
            }
        };
        Self::new(set_id, pool, streak, backend, config, StdRng::from_os_rng())
    }

    pub fn new(
        set_id: String,
        pool: LoadedPool,
        streak: StreakState,
        backend: Arc<dyn StudyBackend>,
        config: EngineConfig,
        rng: StdRng,
    ) -> Result<Self, EngineError> {
        let items: Vec<StudyItem> = pool.items.into_iter().filter(StudyItem::is_usable).collect();
        if items.is_empty() {
            return Err(EngineError::EmptyDeck);
        }

        let cursor = DeckCursor::resume(
            items.len(),
            pool.saved_index.unwrap_or(0),
            config.drag_commit_threshold,
        );
        let scheduler = CheckpointScheduler::new(items.len(), &config);
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        log::debug!(
            "session for {set_id} with {} items, starting at {}",
            items.len(),
            cursor.index()
        );

        Ok(StudySession {
            set_id,
            loaded_order: items.clone(),
            items,
            config,
            cursor,
            scheduler,
            ledger: ProgressLedger::new(streak),
            mode: SessionMode::Studying,
            backend,
            rng,
            updates_tx,
            updates_rx,
            in_flight: 0,
            pending_stages: 0,
            celebrations: Vec::new(),
            saves: Vec::new(),
            next_quiz_id: 1,
        })
    }

    pub fn set_id(&self) -> &str {
        &self.set_id
    }

    pub fn items(&self) -> &[StudyItem] {
        &self.items
    }

    pub fn current_item(&self) -> Option<&StudyItem> {
        self.items.get(self.cursor.index())
    }

    pub fn cursor_state(&self) -> &CursorState {
        self.cursor.state()
    }

    pub fn streak(&self) -> &StreakState {
        self.ledger.streak()
    }

    pub fn ledger(&self) -> &ProgressLedger {
        &self.ledger
    }

    pub fn pass_cache(&self) -> &PassCache {
        self.scheduler.pass_cache()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn mode(&self) -> &SessionMode {
        &self.mode
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.mode, SessionMode::Completed)
    }

    pub fn active_checkpoint(&self) -> Option<&ActiveCheckpoint> {
        match &self.mode {
            SessionMode::Checkpoint(active) => Some(active),
            _ => None,
        }
    }

    pub fn quiz(&self) -> Option<&QuestionSet> {
        self.active_checkpoint().and_then(|active| active.quiz.as_ref())
    }

    fn is_studying(&self) -> bool {
        matches!(self.mode, SessionMode::Studying)
    }

    /// Ends the visual transition after a move.
    pub fn settle(&mut self) {
        self.cursor.settle();
    }

    pub fn reveal(&mut self) -> RevealOutcome {
        if !self.is_studying() {
            return RevealOutcome::Ignored;
        }
        let outcome = self.cursor.reveal();
        if outcome == RevealOutcome::Revealed {
            let key = self.cursor.index() as u64;
            self.earn(ActionKind::FirstReveal, key, REVEAL_POINTS);
        }
        outcome
    }

    /// Returns whether the recording earned points.
    pub fn record_recording(&mut self) -> bool {
        if !self.is_studying() {
            return false;
        }
        let key = self.cursor.index() as u64;
        self.earn(ActionKind::FirstRecording, key, RECORDING_POINTS)
    }

    pub fn begin_drag(&mut self, x: f64) -> bool {
        self.is_studying() && self.cursor.begin_drag(x)
    }

    pub fn update_drag(&mut self, x: f64) {
        self.cursor.update_drag(x);
    }

    pub fn end_drag(&mut self) -> Result<Navigation, EngineError> {
        let outcome = self.cursor.end_drag(&self.scheduler);
        self.follow(outcome)
    }

    pub fn next(&mut self) -> Result<Navigation, EngineError> {
        self.advance(Direction::Forward)
    }

    pub fn previous(&mut self) -> Result<Navigation, EngineError> {
        self.advance(Direction::Backward)
    }

    fn advance(&mut self, direction: Direction) -> Result<Navigation, EngineError> {
        if !self.is_studying() {
            return Ok(Navigation::Stayed(AdvanceOutcome::Ignored));
        }
        let outcome = self.cursor.request_advance(direction, &self.scheduler);
        self.follow(outcome)
    }

    fn follow(&mut self, outcome: AdvanceOutcome) -> Result<Navigation, EngineError> {
        match outcome {
            AdvanceOutcome::Moved {
                from,
                to,
                direction,
            } => {
                self.save_progress(false);
                Ok(Navigation::Moved {
                    from,
                    to,
                    direction,
                })
            }
            AdvanceOutcome::Intercepted { candidate } => self.enter_checkpoint(candidate),
            AdvanceOutcome::Finished => {
                log::info!("deck {} completed", self.set_id);
                self.mode = SessionMode::Completed;
                self.save_progress(true);
                Ok(Navigation::Finished)
            }
            other => Ok(Navigation::Stayed(other)),
        }
    }

    /// An `Err` leaves the checkpoint active without a quiz: skip it if it is
    /// not final, or cancel it.
    fn enter_checkpoint(&mut self, candidate: usize) -> Result<Navigation, EngineError> {
        let checkpoint = match self.scheduler.plan(candidate, &mut self.rng) {
            CheckpointPlan::Review { boundary, score } => {
                log::debug!("checkpoint {boundary} already passed, reviewing");
                let outcome = self.cursor.complete_checkpoint();
                self.follow(outcome)?;
                return Ok(Navigation::Reviewed { boundary, score });
            }
            CheckpointPlan::Quiz(checkpoint) => checkpoint,
        };

        let quiz_id = self.take_quiz_id();
        let (boundary, is_final) = (checkpoint.boundary, checkpoint.is_final);
        let built = self
            .scheduler
            .build_quiz(&checkpoint, &self.items, &mut self.rng);
        let (quiz, result) = match built {
            Ok(quiz) => {
                let questions = quiz.len();
                log::debug!("checkpoint {boundary} quiz with {questions} questions");
                (
                    Some(quiz),
                    Ok(Navigation::CheckpointStarted {
                        boundary,
                        is_final,
                        questions,
                    }),
                )
            }
            Err(err) => {
                log::warn!("no quiz for checkpoint {boundary}: {err}");
                (None, Err(err))
            }
        };

        self.mode = SessionMode::Checkpoint(ActiveCheckpoint {
            checkpoint,
            quiz,
            quiz_id,
            attempts: 0,
            last_score: None,
        });
        result
    }

    /// Grades the active quiz. A pass records the boundary and moves on; a
    /// failure keeps the cursor where it is until a retry or skip.
    pub fn submit_quiz(&mut self, answers: &[Answer]) -> Result<QuizOutcome, EngineError> {
        let SessionMode::Checkpoint(active) = &mut self.mode else {
            return Err(EngineError::NoActiveCheckpoint);
        };
        let Some(quiz) = active.quiz.take() else {
            return Err(EngineError::QuizUnavailable);
        };

        let score = grading::score(quiz.questions(), answers, self.config.normalize);
        active.attempts += 1;
        active.last_score = Some(score.clone());
        let quiz_id = active.quiz_id;
        let boundary = active.checkpoint.boundary;
        let item_ids = active
            .checkpoint
            .item_indices
            .iter()
            .filter_map(|&idx| self.items.get(idx).map(StudyItem::key))
            .collect();

        let answered = u32::try_from(answers.len().min(quiz.len())).unwrap_or(u32::MAX);
        if answered > 0 {
            self.earn(
                ActionKind::QuizAnswers,
                quiz_id,
                answered.saturating_mul(QUIZ_POINTS_PER_ANSWER),
            );
        }
        self.corroborate(quiz_id, item_ids, &quiz, answers, &score);

        if !score.passed {
            log::info!(
                "checkpoint {boundary} failed: {}/{} correct, {} required",
                score.correct,
                score.total,
                score.required
            );
            return Ok(QuizOutcome {
                score,
                navigation: None,
            });
        }

        self.scheduler.record_pass(boundary);
        self.mode = SessionMode::Studying;
        let outcome = self.cursor.complete_checkpoint();
        let navigation = self.follow(outcome)?;
        Ok(QuizOutcome {
            score,
            navigation: Some(navigation),
        })
    }

    /// Builds a fresh quiz from the same items.
    pub fn retry_checkpoint(&mut self) -> Result<&QuestionSet, EngineError> {
        let SessionMode::Checkpoint(active) = &mut self.mode else {
            return Err(EngineError::NoActiveCheckpoint);
        };
        let quiz = self
            .scheduler
            .build_quiz(&active.checkpoint, &self.items, &mut self.rng)?;
        active.quiz_id = self.next_quiz_id;
        self.next_quiz_id += 1;
        log::debug!(
            "retrying checkpoint {} (attempt {})",
            active.checkpoint.boundary,
            active.attempts + 1
        );
        Ok(active.quiz.insert(quiz))
    }

    /// Moves past a non-final checkpoint without recording a pass.
    pub fn skip_checkpoint(&mut self) -> Result<Navigation, EngineError> {
        let SessionMode::Checkpoint(active) = &self.mode else {
            return Err(EngineError::NoActiveCheckpoint);
        };
        if active.checkpoint.is_final {
            return Err(EngineError::CannotSkipFinal);
        }
        log::info!("checkpoint {} skipped", active.checkpoint.boundary);
        self.mode = SessionMode::Studying;
        let outcome = self.cursor.complete_checkpoint();
        self.follow(outcome)
    }

    /// Leaves the checkpoint without moving the cursor.
    pub fn cancel_checkpoint(&mut self) -> Result<(), EngineError> {
        if !matches!(self.mode, SessionMode::Checkpoint(_)) {
            return Err(EngineError::NoActiveCheckpoint);
        }
        self.cursor.abandon_checkpoint();
        self.mode = SessionMode::Studying;
        Ok(())
    }

    pub fn reshuffle(&mut self) {
        self.items.shuffle(&mut self.rng);
        log::debug!("deck {} reshuffled", self.set_id);
        self.restart();
    }

    /// Restores the loaded order and starts over.
    pub fn reset(&mut self) {
        self.items = self.loaded_order.clone();
        log::debug!("deck {} reset", self.set_id);
        self.restart();
    }

    fn restart(&mut self) {
        self.cursor.reset();
        self.scheduler.reset();
        self.ledger.clear_kind(ActionKind::FirstReveal);
        self.mode = SessionMode::Studying;
        self.save_progress(false);
    }

    /// Applies every remote result that has already arrived.
    pub fn poll_updates(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(update) = self.updates_rx.try_recv() {
            self.apply(update, &mut events);
        }
        events
    }

    /// Remote calls or celebration stages are still outstanding.
    pub fn has_pending_updates(&self) -> bool {
        self.in_flight > 0 || self.pending_stages > 0
    }

    /// Waits for the next remote result when one is outstanding, then drains
    /// whatever else has arrived.
    pub async fn next_events(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if self.has_pending_updates()
            && let Some(update) = self.updates_rx.recv().await
        {
            self.apply(update, &mut events);
        }
        events.extend(self.poll_updates());
        events
    }

    /// Cancels celebrations and waits for pending progress saves. Results of
    /// reconciliations still in flight are discarded.
    pub async fn teardown(mut self) {
        for handle in self.celebrations.drain(..) {
            handle.cancel();
        }
        if self.in_flight > 0 {
            log::debug!("discarding {} in-flight result(s)", self.in_flight);
        }
        for save in self.saves.drain(..) {
            if let Err(err) = save.await {
                log::warn!("progress save task failed: {err}");
            }
        }
    }

    fn take_quiz_id(&mut self) -> u64 {
        let id = self.next_quiz_id;
        self.next_quiz_id += 1;
        id
    }

    fn earn(&mut self, kind: ActionKind, item_key: u64, points: u32) -> bool {
        let Some(pending) = self.ledger.begin(kind, item_key, points) else {
            return false;
        };
        let backend = Arc::clone(&self.backend);
        let tx = self.updates_tx.clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            let result = backend
                .reconcile_action(ReconcileRequest {
                    points: pending.points,
                })
                .await;
            let _ = tx.send(SessionUpdate::Reconciled { pending, result });
        });
        true
    }

    fn corroborate(
        &mut self,
        quiz_id: u64,
        item_ids: Vec<String>,
        quiz: &QuestionSet,
        answers: &[Answer],
        score: &QuizScore,
    ) {
        let submission = CheckpointSubmission {
            set_id: self.set_id.clone(),
            item_ids,
            questions: quiz.questions().to_vec(),
            answers: answers.to_vec(),
        };
        let local = score.per_question.clone();
        let backend = Arc::clone(&self.backend);
        let tx = self.updates_tx.clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            let result = backend.submit_checkpoint_answers(submission).await;
            let _ = tx.send(SessionUpdate::Corroborated {
                quiz_id,
                local,
                result,
            });
        });
    }

    fn save_progress(&mut self, is_completed: bool) {
        let progress = CursorProgress {
            set_id: self.set_id.clone(),
            index: self.cursor.index(),
            is_completed,
        };
        let backend = Arc::clone(&self.backend);
        self.saves.retain(|save| !save.is_finished());
        self.saves.push(tokio::spawn(async move {
            if let Err(err) = backend.save_cursor_progress(progress).await {
                log::warn!("failed to save progress: {err}");
            }
        }));
    }

    fn celebrate(&mut self, points: u32, goal_streak: Option<u32>) {
        self.celebrations.retain(|handle| !handle.is_finished());
        let tx = self.updates_tx.clone();
        let plan = CelebrationPlan::new(points, goal_streak, &self.config.celebration);
        self.pending_stages += plan.stages().count();
        let handle = plan.spawn(move |stage| tx.send(SessionUpdate::Celebration(stage)).is_ok());
        self.celebrations.push(handle);
    }

    fn apply(&mut self, update: SessionUpdate, events: &mut Vec<SessionEvent>) {
        match update {
            SessionUpdate::Reconciled { pending, result } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                match self.ledger.settle(pending, result) {
                    LedgerEvent::Confirmed {
                        key,
                        points,
                        goal_newly_met,
                    } => {
                        events.push(SessionEvent::PointsConfirmed {
                            kind: key.kind,
                            points,
                        });
                        let goal_streak =
                            goal_newly_met.then(|| self.ledger.streak().server_streak_days);
                        if let Some(streak_days) = goal_streak {
                            events.push(SessionEvent::GoalMet { streak_days });
                        }
                        self.celebrate(points, goal_streak);
                    }
                    LedgerEvent::RolledBack { key, points } => {
                        events.push(SessionEvent::PointsRolledBack {
                            kind: key.kind,
                            points,
                        });
                    }
                }
            }
            SessionUpdate::Corroborated {
                quiz_id,
                local,
                result,
            } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                match result {
                    Ok(Some(remote)) => {
                        let questions = disagreements(&local, &remote.per_question_correctness);
                        if !questions.is_empty() {
                            log::warn!(
                                "server grading of quiz {quiz_id} disagrees on question(s) {questions:?}; keeping local grade"
                            );
                            events.push(SessionEvent::GradingMismatch { quiz_id, questions });
                        }
                    }
                    Ok(None) => {}
                    Err(err) => log::warn!("could not corroborate quiz {quiz_id}: {err}"),
                }
            }
            SessionUpdate::Celebration(stage) => {
                self.pending_stages = self.pending_stages.saturating_sub(1);
                events.push(SessionEvent::Celebration(stage));
            }
        }
    }
}

fn disagreements(local: &[bool], remote: &[bool]) -> Vec<usize> {
    (0..local.len().max(remote.len()))
        .filter(|&idx| local.get(idx) != remote.get(idx))
        .collect()
}
