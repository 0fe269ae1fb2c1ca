//! Timed feedback shown after points are confirmed.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

use crate::config::CelebrationTiming;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CelebrationStage {
    Pulse,
    DeltaBadge { points: u32 },
    Glow,
    GoalModal { streak_days: u32 },
}

/// Stages with their offsets from the start of the celebration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CelebrationPlan {
    steps: Vec<(Duration, CelebrationStage)>,
}

impl CelebrationPlan {
    /// The modal only appears when `goal_streak` carries the streak of a goal
    /// that was just met.
    pub fn new(points: u32, goal_streak: Option<u32>, timing: &CelebrationTiming) -> Self {
        let mut steps = vec![
            (timing.pulse(), CelebrationStage::Pulse),
            (timing.badge(), CelebrationStage::DeltaBadge { points }),
            (timing.glow(), CelebrationStage::Glow),
        ];
        if let Some(streak_days) = goal_streak {
            steps.push((timing.modal(), CelebrationStage::GoalModal { streak_days }));
        }
        steps.sort_by_key(|(offset, _)| *offset);
        CelebrationPlan { steps }
    }

    pub fn stages(&self) -> impl Iterator<Item = &CelebrationStage> {
        self.steps.iter().map(|(_, stage)| stage)
    }

    /// Runs the plan on the tokio timer. `emit` returning `false` stops the
    /// remaining stages.
    pub fn spawn<F>(self, mut emit: F) -> CelebrationHandle
    where
        F: FnMut(CelebrationStage) -> bool + Send + 'static,
    {
        let start = Instant::now();
        let task = tokio::spawn(async move {
            for (offset, stage) in self.steps {
                sleep_until(start + offset).await;
                if !emit(stage) {
                    log::debug!("celebration receiver gone, stopping");
                    break;
                }
            }
        });
        CelebrationHandle { task }
    }
}

/// Aborts the pending stages when cancelled or dropped.
#[derive(Debug)]
pub struct CelebrationHandle {
    task: JoinHandle<()>,
}

impl CelebrationHandle {
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for CelebrationHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
