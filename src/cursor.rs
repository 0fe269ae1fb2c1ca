//! Position of the learner in the deck, driven by reveal, drag and
//! next/previous intents.
//!
//! All navigation funnels through [`DeckCursor::request_advance`], which asks
//! the checkpoint scheduler before moving forward. A visual transition is left
//! to the caller: the cursor moves immediately and reports `Transitioning`
//! until [`DeckCursor::settle`] is called or the next intent arrives.

use serde::{Deserialize, Serialize};

use crate::checkpoint::CheckpointScheduler;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Backward,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CursorState {
    pub index: usize,
    pub revealed: bool,
    pub pending_direction: Option<Direction>,
    /// Horizontal drag offset; non-zero only while a drag is in progress.
    pub input_delta: f64,
}

impl CursorState {
    fn at(index: usize) -> Self {
        CursorState {
            index,
            revealed: false,
            pending_direction: None,
            input_delta: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CursorPhase {
    Browsing,
    Dragging { origin: f64 },
    Transitioning(Direction),
    /// Forward progress is suspended until the checkpoint at `candidate` resolves.
    AwaitingCheckpoint { candidate: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RevealOutcome {
    Revealed,
    Hidden,
    Ignored,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Moved {
        from: usize,
        to: usize,
        direction: Direction,
    },
    /// The scheduler took over; the cursor did not move.
    Intercepted { candidate: usize },
    /// The terminal checkpoint resolved; the deck is done.
    Finished,
    AtStart,
    /// A drag ended below the commit threshold.
    Cancelled,
    /// The intent is not valid in the current phase.
    Ignored,
}

#[derive(Clone, Debug)]
pub struct DeckCursor {
    state: CursorState,
    phase: CursorPhase,
    deck_len: usize,
    commit_threshold: f64,
}

impl DeckCursor {
    pub fn new(deck_len: usize, commit_threshold: f64) -> Self {
        Self::resume(deck_len, 0, commit_threshold)
    }

    /// Starts at `saved_index`, clamped into the deck.
    pub fn resume(deck_len: usize, saved_index: usize, commit_threshold: f64) -> Self {
        let index = saved_index.min(deck_len.saturating_sub(1));
        DeckCursor {
            state: CursorState::at(index),
            phase: CursorPhase::Browsing,
            deck_len,
            commit_threshold,
        }
    }

    pub fn state(&self) -> &CursorState {
        &self.state
    }

    pub fn phase(&self) -> CursorPhase {
        self.phase
    }

    pub fn index(&self) -> usize {
        self.state.index
    }

    pub fn is_revealed(&self) -> bool {
        self.state.revealed
    }

    pub fn is_awaiting_checkpoint(&self) -> bool {
        matches!(self.phase, CursorPhase::AwaitingCheckpoint { .. })
    }

    /// Ends a pending visual transition.
    pub fn settle(&mut self) {
        if let CursorPhase::Transitioning(_) = self.phase {
            self.phase = CursorPhase::Browsing;
            self.state.pending_direction = None;
        }
    }

    pub fn reveal(&mut self) -> RevealOutcome {
        self.settle();
        if self.phase != CursorPhase::Browsing {
            return RevealOutcome::Ignored;
        }
        self.state.revealed = !self.state.revealed;
        if self.state.revealed {
            RevealOutcome::Revealed
        } else {
            RevealOutcome::Hidden
        }
    }

    pub fn begin_drag(&mut self, x: f64) -> bool {
        self.settle();
        if self.phase != CursorPhase::Browsing {
            return false;
        }
        self.phase = CursorPhase::Dragging { origin: x };
        self.state.input_delta = 0.0;
        true
    }

    pub fn update_drag(&mut self, x: f64) {
        if let CursorPhase::Dragging { origin } = self.phase {
            self.state.input_delta = x - origin;
        }
    }

    pub fn cancel_drag(&mut self) {
        if let CursorPhase::Dragging { .. } = self.phase {
            self.phase = CursorPhase::Browsing;
            self.state.input_delta = 0.0;
        }
    }

    /// Commits or cancels the current drag. A rightward drag goes back, a
    /// leftward drag goes forward.
    pub fn end_drag(&mut self, scheduler: &CheckpointScheduler) -> AdvanceOutcome {
        let CursorPhase::Dragging { .. } = self.phase else {
            return AdvanceOutcome::Ignored;
        };
        let delta = self.state.input_delta;
        self.state.input_delta = 0.0;
        self.phase = CursorPhase::Browsing;

        if delta.abs() < self.commit_threshold {
            return AdvanceOutcome::Cancelled;
        }
        let direction = if delta > 0.0 {
            Direction::Backward
        } else {
            Direction::Forward
        };
        self.request_advance(direction, scheduler)
    }

    pub fn request_advance(
        &mut self,
        direction: Direction,
        scheduler: &CheckpointScheduler,
    ) -> AdvanceOutcome {
        self.settle();
        if self.phase != CursorPhase::Browsing {
            return AdvanceOutcome::Ignored;
        }

        let from = self.state.index;
        let candidate = match direction {
            Direction::Forward => from + 1,
            Direction::Backward => match from.checked_sub(1) {
                Some(previous) => previous,
                None => return AdvanceOutcome::AtStart,
            },
        };

        if direction == Direction::Forward && scheduler.should_intercept(candidate) {
            log::debug!("advance to {candidate} intercepted by checkpoint");
            self.phase = CursorPhase::AwaitingCheckpoint { candidate };
            return AdvanceOutcome::Intercepted { candidate };
        }
        if candidate >= self.deck_len {
            return AdvanceOutcome::Ignored;
        }

        self.move_to(candidate, direction);
        AdvanceOutcome::Moved {
            from,
            to: candidate,
            direction,
        }
    }

    /// Resumes after the awaited checkpoint was passed or skipped, stepping
    /// onto the boundary.
    pub fn complete_checkpoint(&mut self) -> AdvanceOutcome {
        let CursorPhase::AwaitingCheckpoint { candidate } = self.phase else {
            return AdvanceOutcome::Ignored;
        };
        if candidate >= self.deck_len {
            self.phase = CursorPhase::Browsing;
            self.state.revealed = false;
            return AdvanceOutcome::Finished;
        }
        let from = self.state.index;
        self.move_to(candidate, Direction::Forward);
        AdvanceOutcome::Moved {
            from,
            to: candidate,
            direction: Direction::Forward,
        }
    }

    /// Leaves the awaited checkpoint without moving.
    pub fn abandon_checkpoint(&mut self) {
        if self.is_awaiting_checkpoint() {
            self.phase = CursorPhase::Browsing;
        }
    }

    pub fn reset(&mut self) {
        self.state = CursorState::at(0);
        self.phase = CursorPhase::Browsing;
    }

    fn move_to(&mut self, index: usize, direction: Direction) {
        self.state.index = index;
        self.state.revealed = false;
        self.state.pending_direction = Some(direction);
        self.phase = CursorPhase::Transitioning(direction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    const THRESHOLD: f64 = 80.0;

    fn setup(deck_len: usize) -> (DeckCursor, CheckpointScheduler) {
        (
            DeckCursor::new(deck_len, THRESHOLD),
            CheckpointScheduler::new(deck_len, &EngineConfig::default()),
        )
    }

    fn drag(cursor: &mut DeckCursor, scheduler: &CheckpointScheduler, delta: f64) -> AdvanceOutcome {
        assert!(cursor.begin_drag(200.0));
        cursor.update_drag(200.0 + delta);
        cursor.end_drag(scheduler)
    }

    #[test]
    fn reveal_toggles_back_on_second_call() {
        let (mut cursor, _) = setup(5);
        assert_eq!(cursor.reveal(), RevealOutcome::Revealed);
        assert!(cursor.is_revealed());
        assert_eq!(cursor.reveal(), RevealOutcome::Hidden);
        assert!(!cursor.is_revealed());
    }

    #[test]
    fn reveal_ignored_while_dragging() {
        let (mut cursor, _) = setup(5);
        cursor.begin_drag(0.0);
        assert_eq!(cursor.reveal(), RevealOutcome::Ignored);
    }

    #[test]
    fn drag_below_threshold_cancels() {
        let (mut cursor, scheduler) = setup(5);
        assert_eq!(drag(&mut cursor, &scheduler, -79.0), AdvanceOutcome::Cancelled);
        assert_eq!(cursor.index(), 0);
        assert_eq!(cursor.state().input_delta, 0.0);
        assert_eq!(cursor.phase(), CursorPhase::Browsing);
    }

    #[test]
    fn drag_at_threshold_commits() {
        let (mut cursor, scheduler) = setup(5);
        assert_eq!(
            drag(&mut cursor, &scheduler, -80.0),
            AdvanceOutcome::Moved {
                from: 0,
                to: 1,
                direction: Direction::Forward
            }
        );
        assert_eq!(cursor.state().input_delta, 0.0);
        assert_eq!(cursor.phase(), CursorPhase::Transitioning(Direction::Forward));

        assert_eq!(
            drag(&mut cursor, &scheduler, 80.0),
            AdvanceOutcome::Moved {
                from: 1,
                to: 0,
                direction: Direction::Backward
            }
        );
    }

    #[test]
    fn update_drag_only_tracks_delta() {
        let (mut cursor, _) = setup(5);
        cursor.begin_drag(100.0);
        cursor.update_drag(40.0);
        assert_eq!(cursor.state().input_delta, -60.0);
        assert_eq!(cursor.index(), 0);
        cursor.cancel_drag();
        assert_eq!(cursor.state().input_delta, 0.0);
    }

    #[test]
    fn cannot_go_before_first_item() {
        let (mut cursor, scheduler) = setup(5);
        assert_eq!(
            cursor.request_advance(Direction::Backward, &scheduler),
            AdvanceOutcome::AtStart
        );
        assert_eq!(cursor.index(), 0);
    }

    #[test]
    fn moving_hides_the_answer_and_settles() {
        let (mut cursor, scheduler) = setup(5);
        cursor.reveal();
        cursor.request_advance(Direction::Forward, &scheduler);
        assert!(!cursor.is_revealed());
        assert_eq!(cursor.state().pending_direction, Some(Direction::Forward));
        cursor.settle();
        assert_eq!(cursor.phase(), CursorPhase::Browsing);
        assert_eq!(cursor.state().pending_direction, None);
    }

    #[test]
    fn advancing_past_last_item_routes_to_final_checkpoint() {
        let (mut cursor, scheduler) = setup(3);
        cursor.request_advance(Direction::Forward, &scheduler);
        cursor.request_advance(Direction::Forward, &scheduler);
        assert_eq!(cursor.index(), 2);
        assert_eq!(
            cursor.request_advance(Direction::Forward, &scheduler),
            AdvanceOutcome::Intercepted { candidate: 3 }
        );
        assert_eq!(cursor.index(), 2);
        assert_eq!(cursor.complete_checkpoint(), AdvanceOutcome::Finished);
        assert_eq!(cursor.index(), 2);
    }

    #[test]
    fn checkpoint_suspends_navigation_until_completed() {
        let (_, scheduler) = setup(30);
        let mut cursor_at_19 = DeckCursor::resume(30, 19, THRESHOLD);
        assert_eq!(
            cursor_at_19.request_advance(Direction::Forward, &scheduler),
            AdvanceOutcome::Intercepted { candidate: 20 }
        );
        assert!(cursor_at_19.is_awaiting_checkpoint());
        assert_eq!(
            cursor_at_19.request_advance(Direction::Backward, &scheduler),
            AdvanceOutcome::Ignored
        );
        assert_eq!(cursor_at_19.reveal(), RevealOutcome::Ignored);

        assert_eq!(
            cursor_at_19.complete_checkpoint(),
            AdvanceOutcome::Moved {
                from: 19,
                to: 20,
                direction: Direction::Forward
            }
        );
        assert_eq!(cursor_at_19.index(), 20);

        // going back across a boundary is never gated
        cursor_at_19.request_advance(Direction::Backward, &scheduler);
        assert_eq!(cursor_at_19.index(), 19);
    }

    #[test]
    fn abandoning_checkpoint_keeps_position() {
        let (_, scheduler) = setup(30);
        let mut cursor = DeckCursor::resume(30, 19, THRESHOLD);
        cursor.request_advance(Direction::Forward, &scheduler);
        cursor.abandon_checkpoint();
        assert_eq!(cursor.phase(), CursorPhase::Browsing);
        assert_eq!(cursor.index(), 19);
    }

    #[test]
    fn resume_clamps_into_deck() {
        let cursor = DeckCursor::resume(10, 57, THRESHOLD);
        assert_eq!(cursor.index(), 9);
        assert!(!cursor.is_revealed());
    }

    #[test]
    fn reset_returns_to_start_hidden() {
        let (mut cursor, scheduler) = setup(10);
        cursor.request_advance(Direction::Forward, &scheduler);
        cursor.reveal();
        cursor.reset();
        assert_eq!(cursor.index(), 0);
        assert!(!cursor.is_revealed());
        assert_eq!(cursor.phase(), CursorPhase::Browsing);
    }
}
