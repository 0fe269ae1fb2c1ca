//! Answer grading.
//!
//! Every question shape has its own equivalence rule: free text is compared
//! after normalisation, multi-selects and pairings as sets, reorderings as
//! ordered sequences, and choices by direct equality.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static EDGE_PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\p{P}+|\p{P}+$").expect("valid regex"));

/// Share of questions that must be correct to pass, as `NUM / DEN`.
pub const PASS_RATIO_NUM: usize = 3;
pub const PASS_RATIO_DEN: usize = 5;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionVariant {
    SingleChoice {
        prompt: String,
        options: Vec<String>,
        correct_option: String,
    },
    TrueFalse {
        prompt: String,
        displayed_claim: String,
        correct: bool,
    },
    TypedRecall {
        prompt: String,
        expected: String,
    },
    ChoiceRecall {
        prompt: String,
        options: Vec<String>,
        correct_option: String,
    },
    MultiSelect {
        prompt: String,
        options: Vec<String>,
        correct_set: BTreeSet<String>,
    },
    SequenceReorder {
        hint: String,
        shuffled_tokens: Vec<String>,
        correct_sequence: Vec<String>,
    },
    TextCorrection {
        incorrect_text: String,
        hint: String,
        expected: String,
    },
    PairMatching {
        left_items: Vec<String>,
        right_items_shuffled: Vec<String>,
        correct_right_for_left: Vec<String>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    SingleChoice,
    TrueFalse,
    TypedRecall,
    ChoiceRecall,
    MultiSelect,
    SequenceReorder,
    TextCorrection,
    PairMatching,
}

impl QuestionKind {
    pub fn label(&self) -> &'static str {
        match self {
            QuestionKind::SingleChoice => "single choice",
            QuestionKind::TrueFalse => "true/false",
            QuestionKind::TypedRecall => "typed recall",
            QuestionKind::ChoiceRecall => "choice recall",
            QuestionKind::MultiSelect => "multi select",
            QuestionKind::SequenceReorder => "sequence reorder",
            QuestionKind::TextCorrection => "text correction",
            QuestionKind::PairMatching => "pair matching",
        }
    }
}

impl QuestionVariant {
    pub fn kind(&self) -> QuestionKind {
        match self {
            QuestionVariant::SingleChoice { .. } => QuestionKind::SingleChoice,
            QuestionVariant::TrueFalse { .. } => QuestionKind::TrueFalse,
            QuestionVariant::TypedRecall { .. } => QuestionKind::TypedRecall,
            QuestionVariant::ChoiceRecall { .. } => QuestionKind::ChoiceRecall,
            QuestionVariant::MultiSelect { .. } => QuestionKind::MultiSelect,
            QuestionVariant::SequenceReorder { .. } => QuestionKind::SequenceReorder,
            QuestionVariant::TextCorrection { .. } => QuestionKind::TextCorrection,
            QuestionVariant::PairMatching { .. } => QuestionKind::PairMatching,
        }
    }

    /// The answer that grades as correct.
    pub fn answer_key(&self) -> Answer {
        match self {
            QuestionVariant::SingleChoice { correct_option, .. }
            | QuestionVariant::ChoiceRecall { correct_option, .. } => {
                Answer::Choice(correct_option.clone())
            }
            QuestionVariant::TrueFalse { correct, .. } => Answer::Boolean(*correct),
            QuestionVariant::TypedRecall { expected, .. }
            | QuestionVariant::TextCorrection { expected, .. } => Answer::Text(expected.clone()),
            QuestionVariant::MultiSelect { correct_set, .. } => {
                Answer::Selection(correct_set.iter().cloned().collect())
            }
            QuestionVariant::SequenceReorder { correct_sequence, .. } => {
                Answer::Sequence(correct_sequence.clone())
            }
            QuestionVariant::PairMatching {
                left_items,
                correct_right_for_left,
                ..
            } => Answer::Pairs(
                left_items
                    .iter()
                    .cloned()
                    .zip(correct_right_for_left.iter().cloned())
                    .collect(),
            ),
        }
    }
}

/// A learner's response to a single question.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Answer {
    Choice(String),
    Boolean(bool),
    Text(String),
    Selection(Vec<String>),
    Sequence(Vec<String>),
    /// `(left, right)` pairings.
    Pairs(Vec<(String, String)>),
}

/// How free-text answers are normalised before comparison.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizePolicy {
    /// Also trim punctuation from both ends of every word, as listening
    /// exercises do. Punctuation inside a word (`e-mail`, `geht's`) is kept.
    #[serde(default)]
    pub strip_punctuation: bool,
}

impl NormalizePolicy {
    pub fn listening() -> Self {
        NormalizePolicy {
            strip_punctuation: true,
        }
    }
}

pub fn normalize(text: &str, policy: NormalizePolicy) -> String {
    let lower = text.to_lowercase();
    if !policy.strip_punctuation {
        return WHITESPACE_RUN.replace_all(lower.trim(), " ").into_owned();
    }
    lower
        .split_whitespace()
        .map(|word| EDGE_PUNCTUATION.replace_all(word, ""))
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Grades one answer. An answer of the wrong shape is simply incorrect.
pub fn grade(question: &QuestionVariant, answer: &Answer, policy: NormalizePolicy) -> bool {
    match (question, answer) {
        (QuestionVariant::TypedRecall { expected, .. }, Answer::Text(given))
        | (QuestionVariant::TextCorrection { expected, .. }, Answer::Text(given)) => {
            normalize(given, policy) == normalize(expected, policy)
        }
        (QuestionVariant::MultiSelect { correct_set, .. }, Answer::Selection(given)) => {
            let given: BTreeSet<&String> = given.iter().collect();
            let expected: BTreeSet<&String> = correct_set.iter().collect();
            given == expected
        }
        (
            QuestionVariant::PairMatching {
                left_items,
                correct_right_for_left,
                ..
            },
            Answer::Pairs(given),
        ) => {
            let expected: BTreeSet<(&String, &String)> =
                left_items.iter().zip(correct_right_for_left).collect();
            let given: BTreeSet<(&String, &String)> = given.iter().map(|(l, r)| (l, r)).collect();
            given == expected
        }
        (QuestionVariant::SequenceReorder { correct_sequence, .. }, Answer::Sequence(given)) => {
            given == correct_sequence
        }
        (QuestionVariant::SingleChoice { correct_option, .. }, Answer::Choice(given))
        | (QuestionVariant::ChoiceRecall { correct_option, .. }, Answer::Choice(given)) => {
            given == correct_option
        }
        (QuestionVariant::TrueFalse { correct, .. }, Answer::Boolean(given)) => given == correct,
        _ => false,
    }
}

pub fn required_correct(question_count: usize) -> usize {
    (question_count * PASS_RATIO_NUM).div_ceil(PASS_RATIO_DEN)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizScore {
    pub correct: usize,
    pub total: usize,
    pub required: usize,
    pub passed: bool,
    /// Per-question correctness, in question order.
    pub per_question: Vec<bool>,
}

impl QuizScore {
    /// Full marks on `total` questions, used when a cleared checkpoint is revisited.
    pub fn full(total: usize) -> Self {
        QuizScore {
            correct: total,
            total,
            required: required_correct(total),
            passed: true,
            per_question: vec![true; total],
        }
    }
}

/// Grades a whole quiz. Missing answers count as incorrect.
pub fn score(questions: &[QuestionVariant], answers: &[Answer], policy: NormalizePolicy) -> QuizScore {
    let per_question: Vec<bool> = questions
        .iter()
        .enumerate()
        .map(|(idx, question)| {
            answers
                .get(idx)
                .map(|answer| grade(question, answer, policy))
                .unwrap_or(false)
        })
        .collect();
    let correct = per_question.iter().filter(|ok| **ok).count();
    let total = questions.len();
    let required = required_correct(total);

    QuizScore {
        correct,
        total,
        required,
        passed: correct >= required,
        per_question,
    }
}
