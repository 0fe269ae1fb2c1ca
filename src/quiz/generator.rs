use std::collections::{BTreeSet, HashSet};

use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};

use super::{QuestionSet, TYPE_CYCLE};
use crate::error::EngineError;
use crate::grading::{QuestionKind, QuestionVariant};
use crate::item::StudyItem;

/// Smallest pool distractor and matching questions can be built from.
pub const MIN_POOL_SIZE: usize = 4;
/// Appended to the first word of a sentence to make it wrong.
pub const CORRUPTION_MARKER: &str = "xx";

const DISTRACTOR_COUNT: usize = 3;
const MATCHING_PAIRS: usize = 4;

/// Builds a quiz of at most `size` questions from `items`.
///
/// Slots whose shape cannot be built from the pool are skipped instead of
/// failing the whole quiz.
pub fn generate<R: Rng + ?Sized>(
    items: &[StudyItem],
    is_final: bool,
    size: usize,
    rng: &mut R,
) -> Result<QuestionSet, EngineError> {
    if items.len() < MIN_POOL_SIZE {
        return Err(EngineError::InsufficientPool {
            available: items.len(),
            required: MIN_POOL_SIZE,
        });
    }

    let mut shuffled = items.to_vec();
    shuffled.shuffle(rng);

    let mut matched = HashSet::new();
    let mut questions = Vec::new();
    for slot in 0..size.min(shuffled.len()) {
        let kind = TYPE_CYCLE[slot % TYPE_CYCLE.len()];
        match build_question(kind, &shuffled, slot, &mut matched, rng) {
            Some(question) => questions.push(question),
            None => log::debug!("skipping {} slot {slot}: pool cannot support it", kind.label()),
        }
    }

    if questions.is_empty() {
        return Err(EngineError::NoGenerableQuestions);
    }

    questions.shuffle(rng);
    Ok(QuestionSet::new(questions, is_final))
}

fn build_question<R: Rng + ?Sized>(
    kind: QuestionKind,
    shuffled: &[StudyItem],
    slot: usize,
    matched: &mut HashSet<usize>,
    rng: &mut R,
) -> Option<QuestionVariant> {
    let item = &shuffled[slot];
    let question = match kind {
        QuestionKind::SingleChoice => {
            let options = choice_options(shuffled, slot, rng)?;
            QuestionVariant::SingleChoice {
                prompt: item.target.clone(),
                options,
                correct_option: item.meaning.clone(),
            }
        }
        QuestionKind::ChoiceRecall => {
            let options = choice_options(shuffled, slot, rng)?;
            let prompt = if item.front.trim().is_empty() {
                item.target.clone()
            } else {
                item.front.clone()
            };
            QuestionVariant::ChoiceRecall {
                prompt,
                options,
                correct_option: item.meaning.clone(),
            }
        }
        QuestionKind::MultiSelect => {
            let options = choice_options(shuffled, slot, rng)?;
            QuestionVariant::MultiSelect {
                prompt: item.target.clone(),
                options,
                correct_set: BTreeSet::from([item.meaning.clone()]),
            }
        }
        QuestionKind::TrueFalse => {
            let displayed_claim = if rng.random_bool(0.5) {
                item.meaning.clone()
            } else {
                shuffled[(slot + 1) % shuffled.len()].meaning.clone()
            };
            QuestionVariant::TrueFalse {
                prompt: item.target.clone(),
                correct: displayed_claim == item.meaning,
                displayed_claim,
            }
        }
        QuestionKind::TypedRecall => QuestionVariant::TypedRecall {
            prompt: item.meaning.clone(),
            expected: item.target.clone(),
        },
        QuestionKind::SequenceReorder => {
            let tokens = item.target_tokens();
            if tokens.len() < 2 {
                return None;
            }
            let mut shuffled_tokens = tokens.clone();
            shuffled_tokens.shuffle(rng);
            if shuffled_tokens == tokens {
                shuffled_tokens.rotate_left(1);
            }
            QuestionVariant::SequenceReorder {
                hint: item.meaning.clone(),
                shuffled_tokens,
                correct_sequence: tokens,
            }
        }
        QuestionKind::TextCorrection => {
            let mut tokens = item.target_tokens();
            let first = tokens.first_mut()?;
            first.push_str(CORRUPTION_MARKER);
            QuestionVariant::TextCorrection {
                incorrect_text: tokens.join(" "),
                hint: item.meaning.clone(),
                expected: item.target.clone(),
            }
        }
        QuestionKind::PairMatching => matching_question(shuffled, slot, matched, rng)?,
    };
    Some(question)
}

/// The correct meaning plus three distinct distractors, shuffled.
fn choice_options<R: Rng + ?Sized>(
    shuffled: &[StudyItem],
    slot: usize,
    rng: &mut R,
) -> Option<Vec<String>> {
    let correct = &shuffled[slot].meaning;
    let mut seen = HashSet::new();
    let candidates: Vec<&String> = shuffled
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != slot)
        .map(|(_, other)| &other.meaning)
        .filter(|meaning| *meaning != correct && seen.insert(*meaning))
        .collect();
    if candidates.len() < DISTRACTOR_COUNT {
        return None;
    }

    let mut options: Vec<String> = candidates
        .choose_multiple(rng, DISTRACTOR_COUNT)
        .map(|meaning| (*meaning).clone())
        .collect();
    options.push(correct.clone());
    options.shuffle(rng);
    Some(options)
}

fn matching_question<R: Rng + ?Sized>(
    shuffled: &[StudyItem],
    slot: usize,
    matched: &mut HashSet<usize>,
    rng: &mut R,
) -> Option<QuestionVariant> {
    let picked: Vec<usize> = (slot..shuffled.len())
        .filter(|idx| !matched.contains(idx))
        .take(MATCHING_PAIRS)
        .collect();
    if picked.len() < MATCHING_PAIRS {
        return None;
    }
    matched.extend(picked.iter().copied());

    let left_items: Vec<String> = picked.iter().map(|&idx| shuffled[idx].target.clone()).collect();
    let correct_right_for_left: Vec<String> =
        picked.iter().map(|&idx| shuffled[idx].meaning.clone()).collect();
    let mut right_items_shuffled = correct_right_for_left.clone();
    right_items_shuffled.shuffle(rng);

    Some(QuestionVariant::PairMatching {
        left_items,
        right_items_shuffled,
        correct_right_for_left,
    })
}
