pub mod generator;

use serde::{Deserialize, Serialize};

use crate::grading::{QuestionKind, QuestionVariant, required_correct};

pub use generator::{CORRUPTION_MARKER, generate};

/// Order in which question shapes are assigned to generation slots.
pub const TYPE_CYCLE: [QuestionKind; 8] = [
    QuestionKind::SingleChoice,
    QuestionKind::TrueFalse,
    QuestionKind::TypedRecall,
    QuestionKind::ChoiceRecall,
    QuestionKind::MultiSelect,
    QuestionKind::SequenceReorder,
    QuestionKind::TextCorrection,
    QuestionKind::PairMatching,
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSet {
    questions: Vec<QuestionVariant>,
    required_count: usize,
    is_final: bool,
}

impl QuestionSet {
    pub fn new(questions: Vec<QuestionVariant>, is_final: bool) -> Self {
        let required_count = required_correct(questions.len());
        QuestionSet {
            questions,
            required_count,
            is_final,
        }
    }

    pub fn questions(&self) -> &[QuestionVariant] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn required_count(&self) -> usize {
        self.required_count
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }
}
