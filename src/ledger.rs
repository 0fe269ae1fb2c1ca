//! Daily points and streak, updated optimistically and reconciled against the
//! remote ledger.
//!
//! Every qualifying action goes through the same two steps: [`ProgressLedger::begin`]
//! applies the points locally and returns a [`PendingAction`]; once the remote
//! call resolves, [`ProgressLedger::settle`] either keeps them or takes exactly
//! those points back out.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::backend::{ReconcileResponse, StreakSnapshot};
use crate::error::BackendError;

pub const REVEAL_POINTS: u32 = 1;
pub const RECORDING_POINTS: u32 = 1;
/// Earned per answered question of a submitted quiz.
pub const QUIZ_POINTS_PER_ANSWER: u32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    FirstReveal,
    FirstRecording,
    QuizAnswers,
}

impl ActionKind {
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::FirstReveal => "reveal",
            ActionKind::FirstRecording => "recording",
            ActionKind::QuizAnswers => "quiz answers",
        }
    }
}

/// Identifies one qualifying action: the item index for reveals and
/// recordings, the quiz id for quiz credit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ActionKey {
    pub kind: ActionKind,
    pub item_key: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakState {
    pub local_count: u32,
    pub daily_goal: u32,
    pub server_streak_days: u32,
    pub goal_met_today: bool,
}

impl StreakState {
    pub fn from_snapshot(snapshot: &StreakSnapshot) -> Self {
        StreakState {
            local_count: snapshot.today_points,
            daily_goal: snapshot.daily_goal,
            server_streak_days: snapshot.current_streak,
            goal_met_today: snapshot.daily_goal_met,
        }
    }

    /// Used when the remote snapshot cannot be fetched.
    pub fn offline(daily_goal: u32) -> Self {
        StreakState {
            daily_goal,
            ..StreakState::default()
        }
    }
}

/// Points applied locally and awaiting remote confirmation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use = "a pending action must be settled or its points stay unconfirmed"]
pub struct PendingAction {
    pub key: ActionKey,
    pub points: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerEvent {
    Confirmed {
        key: ActionKey,
        points: u32,
        /// True only the first time the daily goal is reported met.
        goal_newly_met: bool,
    },
    RolledBack {
        key: ActionKey,
        points: u32,
    },
}

#[derive(Clone, Debug, Default)]
pub struct ProgressLedger {
    streak: StreakState,
    counted: HashSet<ActionKey>,
}

impl ProgressLedger {
    pub fn new(streak: StreakState) -> Self {
        ProgressLedger {
            streak,
            counted: HashSet::new(),
        }
    }

    pub fn streak(&self) -> &StreakState {
        &self.streak
    }

    pub fn is_counted(&self, kind: ActionKind, item_key: u64) -> bool {
        self.counted.contains(&ActionKey { kind, item_key })
    }

    /// Counts the action and applies its points immediately. Returns `None`
    /// when the action was already counted this session.
    pub fn begin(&mut self, kind: ActionKind, item_key: u64, points: u32) -> Option<PendingAction> {
        let key = ActionKey { kind, item_key };
        if !self.counted.insert(key) {
            return None;
        }
        self.streak.local_count = self.streak.local_count.saturating_add(points);
        log::debug!(
            "{} on {item_key}: +{points} (now {})",
            kind.label(),
            self.streak.local_count
        );
        Some(PendingAction { key, points })
    }

    pub fn settle(
        &mut self,
        pending: PendingAction,
        result: Result<ReconcileResponse, BackendError>,
    ) -> LedgerEvent {
        match result {
            Ok(response) => self.confirm(pending, &response),
            Err(err) => self.roll_back(pending, &err),
        }
    }

    /// Keeps the points; the server wins on streak length and daily goal.
    pub fn confirm(&mut self, pending: PendingAction, response: &ReconcileResponse) -> LedgerEvent {
        if let Some(days) = response.current_streak {
            self.streak.server_streak_days = days;
        }
        if let Some(goal) = response.daily_goal {
            self.streak.daily_goal = goal;
        }

        let goal_newly_met = response.streak_updated && !self.streak.goal_met_today;
        if goal_newly_met {
            self.streak.goal_met_today = true;
            log::info!(
                "daily goal of {} met, streak is {} days",
                self.streak.daily_goal,
                self.streak.server_streak_days
            );
        }

        LedgerEvent::Confirmed {
            key: pending.key,
            points: pending.points,
            goal_newly_met,
        }
    }

    /// Takes back exactly the points `pending` added and lets the action be earned again.
    pub fn roll_back(&mut self, pending: PendingAction, err: &BackendError) -> LedgerEvent {
        log::warn!(
            "rolling back {} point(s) for {} on {}: {err}",
            pending.points,
            pending.key.kind.label(),
            pending.key.item_key
        );
        self.counted.remove(&pending.key);
        self.streak.local_count = self.streak.local_count.saturating_sub(pending.points);
        LedgerEvent::RolledBack {
            key: pending.key,
            points: pending.points,
        }
    }

    /// Forgets counted actions of one kind, e.g. reveals after a reshuffle.
    pub fn clear_kind(&mut self, kind: ActionKind) {
        self.counted.retain(|key| key.kind != kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_with(count: u32) -> ProgressLedger {
        ProgressLedger::new(StreakState {
            local_count: count,
            daily_goal: 10,
            server_streak_days: 3,
            goal_met_today: false,
        })
    }

    fn response(streak_updated: bool) -> ReconcileResponse {
        ReconcileResponse {
            streak_updated,
            today_points: Some(10),
            daily_goal: Some(12),
            current_streak: Some(4),
        }
    }

    fn failure() -> BackendError {
        BackendError::Rejected {
            status: 503,
            message: "unavailable".into(),
        }
    }

    #[test]
    fn begin_applies_points_synchronously() {
        let mut ledger = ledger_with(5);
        let pending = ledger.begin(ActionKind::FirstReveal, 7, 1).unwrap();
        assert_eq!(pending.points, 1);
        assert_eq!(ledger.streak().local_count, 6);
        assert!(ledger.is_counted(ActionKind::FirstReveal, 7));
    }

    #[test]
    fn same_action_counts_once() {
        let mut ledger = ledger_with(0);
        assert!(ledger.begin(ActionKind::FirstReveal, 1, 1).is_some());
        assert!(ledger.begin(ActionKind::FirstReveal, 1, 1).is_none());
        assert!(ledger.begin(ActionKind::FirstRecording, 1, 1).is_some());
        assert_eq!(ledger.streak().local_count, 2);
    }

    #[test]
    fn failed_reconciliation_rolls_back_exactly() {
        let mut ledger = ledger_with(5);
        let pending = ledger.begin(ActionKind::FirstReveal, 2, 1).unwrap();
        assert_eq!(ledger.streak().local_count, 6);

        let event = ledger.settle(pending, Err(failure()));
        assert!(matches!(event, LedgerEvent::RolledBack { points: 1, .. }));
        assert_eq!(ledger.streak().local_count, 5);
        assert!(!ledger.is_counted(ActionKind::FirstReveal, 2));

        // can be earned again afterwards
        assert!(ledger.begin(ActionKind::FirstReveal, 2, 1).is_some());
        assert_eq!(ledger.streak().local_count, 6);
    }

    #[test]
    fn rollback_only_removes_its_own_points() {
        let mut ledger = ledger_with(0);
        let first = ledger.begin(ActionKind::QuizAnswers, 1, 10).unwrap();
        let second = ledger.begin(ActionKind::FirstReveal, 3, 1).unwrap();
        ledger.settle(first, Err(failure()));
        assert_eq!(ledger.streak().local_count, 1);
        ledger.settle(second, Ok(response(false)));
        assert_eq!(ledger.streak().local_count, 1);
    }

    #[test]
    fn rollback_clamps_at_zero() {
        let mut ledger = ledger_with(0);
        let pending = PendingAction {
            key: ActionKey {
                kind: ActionKind::QuizAnswers,
                item_key: 9,
            },
            points: 4,
        };
        ledger.roll_back(pending, &failure());
        assert_eq!(ledger.streak().local_count, 0);
    }

    #[test]
    fn confirmation_adopts_server_streak_and_goal() {
        let mut ledger = ledger_with(9);
        let pending = ledger.begin(ActionKind::FirstReveal, 0, 1).unwrap();
        let event = ledger.settle(pending, Ok(response(true)));

        assert!(matches!(
            event,
            LedgerEvent::Confirmed {
                goal_newly_met: true,
                ..
            }
        ));
        let streak = ledger.streak();
        assert!(streak.goal_met_today);
        assert_eq!(streak.server_streak_days, 4);
        assert_eq!(streak.daily_goal, 12);
        assert_eq!(streak.local_count, 10);
    }

    #[test]
    fn goal_is_only_celebrated_once() {
        let mut ledger = ledger_with(9);
        let first = ledger.begin(ActionKind::FirstReveal, 0, 1).unwrap();
        let second = ledger.begin(ActionKind::FirstReveal, 1, 1).unwrap();
        ledger.settle(first, Ok(response(true)));
        let event = ledger.settle(second, Ok(response(true)));
        assert!(matches!(
            event,
            LedgerEvent::Confirmed {
                goal_newly_met: false,
                ..
            }
        ));
    }

    #[test]
    fn missing_fields_keep_local_values() {
        let mut ledger = ledger_with(0);
        let pending = ledger.begin(ActionKind::FirstRecording, 0, 1).unwrap();
        ledger.settle(
            pending,
            Ok(ReconcileResponse {
                streak_updated: false,
                today_points: None,
                daily_goal: None,
                current_streak: None,
            }),
        );
        assert_eq!(ledger.streak().daily_goal, 10);
        assert_eq!(ledger.streak().server_streak_days, 3);
    }

    #[test]
    fn clear_kind_only_forgets_that_kind() {
        let mut ledger = ledger_with(0);
        let _ = ledger.begin(ActionKind::FirstReveal, 0, 1);
        let _ = ledger.begin(ActionKind::FirstRecording, 0, 1);
        ledger.clear_kind(ActionKind::FirstReveal);
        assert!(!ledger.is_counted(ActionKind::FirstReveal, 0));
        assert!(ledger.is_counted(ActionKind::FirstRecording, 0));
        assert_eq!(ledger.streak().local_count, 2);
    }

    #[test]
    fn seeds_from_snapshot() {
        let streak = StreakState::from_snapshot(&StreakSnapshot {
            today_points: 4,
            daily_goal: 20,
            current_streak: 8,
            daily_goal_met: false,
        });
        assert_eq!(streak.local_count, 4);
        assert_eq!(streak.daily_goal, 20);
        assert_eq!(streak.server_streak_days, 8);
    }
}
