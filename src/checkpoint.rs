//! Checkpoint scheduling: decides when forward progress must stop for a quiz
//! and which items that quiz covers.

use std::collections::BTreeSet;

use rand::Rng;
use rand::seq::index;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::grading::QuizScore;
use crate::item::StudyItem;
use crate::quiz::{self, QuestionSet};

/// Boundaries already cleared in the current session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PassCache {
    boundaries: BTreeSet<usize>,
}

impl PassCache {
    pub fn contains(&self, boundary: usize) -> bool {
        self.boundaries.contains(&boundary)
    }

    /// Returns `false` if the boundary was already recorded.
    pub fn insert(&mut self, boundary: usize) -> bool {
        self.boundaries.insert(boundary)
    }

    pub fn clear(&mut self) {
        self.boundaries.clear();
    }

    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Checkpoint {
    pub boundary: usize,
    pub is_final: bool,
    /// Deck positions the quiz draws from.
    pub item_indices: Vec<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckpointPlan {
    /// The boundary was cleared before; progress continues with a canned score.
    Review { boundary: usize, score: QuizScore },
    Quiz(Checkpoint),
}

#[derive(Clone, Debug)]
pub struct CheckpointScheduler {
    deck_len: usize,
    checkpoint_size: usize,
    quiz_size: usize,
    final_quiz_size: usize,
    final_sample_size: usize,
    passed: PassCache,
}

impl CheckpointScheduler {
    pub fn new(deck_len: usize, config: &EngineConfig) -> Self {
        CheckpointScheduler {
            deck_len,
            checkpoint_size: config.checkpoint_size.max(1),
            quiz_size: config.quiz_size,
            final_quiz_size: config.final_quiz_size,
            final_sample_size: config.final_sample_size,
            passed: PassCache::default(),
        }
    }

    pub fn deck_len(&self) -> usize {
        self.deck_len
    }

    pub fn should_intercept(&self, candidate: usize) -> bool {
        candidate == self.deck_len || (candidate > 0 && candidate % self.checkpoint_size == 0)
    }

    pub fn is_final(&self, boundary: usize) -> bool {
        boundary == self.deck_len
    }

    pub fn resolve_checkpoint<R: Rng + ?Sized>(&self, candidate: usize, rng: &mut R) -> Checkpoint {
        let boundary = candidate.min(self.deck_len);
        if self.is_final(boundary) {
            let amount = self.final_sample_size.min(self.deck_len);
            let item_indices = index::sample(rng, self.deck_len, amount).into_vec();
            return Checkpoint {
                boundary,
                is_final: true,
                item_indices,
            };
        }

        let span = self.checkpoint_size.min(boundary);
        Checkpoint {
            boundary,
            is_final: false,
            item_indices: (boundary - span..boundary).collect(),
        }
    }

    /// Like `resolve_checkpoint`, but a cleared non-final boundary yields a
    /// review result instead of a new quiz.
    pub fn plan<R: Rng + ?Sized>(&self, candidate: usize, rng: &mut R) -> CheckpointPlan {
        let boundary = candidate.min(self.deck_len);
        if !self.is_final(boundary) && self.already_passed(boundary) {
            return CheckpointPlan::Review {
                boundary,
                score: QuizScore::full(self.quiz_size),
            };
        }
        CheckpointPlan::Quiz(self.resolve_checkpoint(candidate, rng))
    }

    pub fn quiz_size_for(&self, checkpoint: &Checkpoint) -> usize {
        if checkpoint.is_final {
            self.final_quiz_size
        } else {
            self.quiz_size
        }
    }

    /// Generates a fresh quiz over the checkpoint's items of `deck`.
    pub fn build_quiz<R: Rng + ?Sized>(
        &self,
        checkpoint: &Checkpoint,
        deck: &[StudyItem],
        rng: &mut R,
    ) -> Result<QuestionSet, EngineError> {
        let pool: Vec<StudyItem> = checkpoint
            .item_indices
            .iter()
            .filter_map(|&idx| deck.get(idx).cloned())
            .collect();
        quiz::generate(&pool, checkpoint.is_final, self.quiz_size_for(checkpoint), rng)
    }

    pub fn already_passed(&self, boundary: usize) -> bool {
        self.passed.contains(boundary)
    }

    pub fn record_pass(&mut self, boundary: usize) {
        if self.passed.insert(boundary) {
            log::info!("checkpoint {boundary} passed");
        }
    }

    pub fn pass_cache(&self) -> &PassCache {
        &self.passed
    }

    pub fn reset(&mut self) {
        self.passed.clear();
    }
}
