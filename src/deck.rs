use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use blake3::Hasher;
use serde::Deserialize;

use crate::item::StudyItem;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeckFile {
    #[serde(default)]
    set_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    items: Vec<DeckEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DeckEntry {
    front: String,
    target: String,
    meaning: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Deck {
    pub set_id: String,
    pub title: String,
    pub items: Vec<StudyItem>,
    /// Entries skipped for a blank target or meaning.
    pub dropped: usize,
}

pub fn load_deck(path: &Path) -> Result<Deck> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read deck at {}", path.display()))?;
    let fallback_title = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "deck".to_string());
    parse_deck(&contents, &fallback_title)
        .with_context(|| format!("Invalid deck file at {}", path.display()))
}

pub fn parse_deck(contents: &str, fallback_title: &str) -> Result<Deck> {
    let file: DeckFile = serde_json::from_str(contents)?;

    let total = file.items.len();
    let items: Vec<StudyItem> = file
        .items
        .into_iter()
        .map(|entry| StudyItem::new(entry.front, entry.target, entry.meaning))
        .filter(StudyItem::is_usable)
        .collect();
    let dropped = total - items.len();
    if dropped > 0 {
        log::warn!("dropped {dropped} deck item(s) without a target or meaning");
    }

    let set_id = match file.set_id.filter(|id| !id.trim().is_empty()) {
        Some(id) => id,
        None => match content_hash(&items) {
            Some(hash) => hash,
            None => bail!("deck has no usable items"),
        },
    };

    Ok(Deck {
        set_id,
        title: file.title.unwrap_or_else(|| fallback_title.to_string()),
        items,
        dropped,
    })
}

/// Stable id for a deck without an explicit one. Case and whitespace
/// differences don't change it, item order does.
pub fn content_hash(items: &[StudyItem]) -> Option<String> {
    if items.is_empty() {
        return None;
    }
    let mut hasher = Hasher::new();
    for item in items {
        item.hash_into(&mut hasher);
        hasher.update(&[0x1e]);
    }
    Some(hasher.finalize().to_string())
}
