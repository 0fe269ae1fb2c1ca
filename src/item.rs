use blake3::Hasher;
use serde::{Deserialize, Serialize};

/// One unit of study content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyItem {
    /// Prompt shown on the front of the card.
    pub front: String,
    /// Target-language string the learner is studying.
    pub target: String,
    /// Meaning or translation of `target`.
    pub meaning: String,
}

impl StudyItem {
    pub fn new(
        front: impl Into<String>,
        target: impl Into<String>,
        meaning: impl Into<String>,
    ) -> Self {
        StudyItem {
            front: front.into(),
            target: target.into(),
            meaning: meaning.into(),
        }
    }

    pub fn target_tokens(&self) -> Vec<String> {
        self.target.split_whitespace().map(str::to_string).collect()
    }

    pub fn is_usable(&self) -> bool {
        !self.target.trim().is_empty() && !self.meaning.trim().is_empty()
    }

    /// Content key that survives reordering. Case and whitespace differences
    /// don't change it.
    pub fn key(&self) -> String {
        let mut hasher = Hasher::new();
        self.hash_into(&mut hasher);
        hasher.finalize().to_string()
    }

    pub(crate) fn hash_into(&self, hasher: &mut Hasher) {
        for field in [&self.front, &self.target, &self.meaning] {
            hasher.update(collapse(field).as_bytes());
            hasher.update(&[0x1f]);
        }
    }
}

fn collapse(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
