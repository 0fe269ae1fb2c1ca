use crate::{
    checkpoint::CheckpointScheduler,
    config::EngineConfig,
    deck::Deck,
    grading::QuestionKind,
    palette::Palette,
    utils::pluralize,
};

use std::collections::BTreeSet;

use rand::SeedableRng;
use rand::rngs::StdRng;

/// What a checkpoint quiz would look like when the deck is studied in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckpointReport {
    pub boundary: usize,
    pub is_final: bool,
    pub pool_size: usize,
    pub outcome: Result<BTreeSet<QuestionKind>, String>,
}

pub fn run(deck: &Deck, config: &EngineConfig) {
    let reports = inspect(deck, config);
    render_plain_summary(deck, &reports);
}

/// Builds one sample quiz per boundary with a fixed seed.
pub fn inspect(deck: &Deck, config: &EngineConfig) -> Vec<CheckpointReport> {
    let scheduler = CheckpointScheduler::new(deck.items.len(), config);
    let mut rng = StdRng::seed_from_u64(0);

    (1..=deck.items.len())
        .filter(|&candidate| scheduler.should_intercept(candidate))
        .map(|candidate| {
            let checkpoint = scheduler.resolve_checkpoint(candidate, &mut rng);
            let outcome = scheduler
                .build_quiz(&checkpoint, &deck.items, &mut rng)
                .map(|quiz| quiz.questions().iter().map(|q| q.kind()).collect())
                .map_err(|err| err.to_string());
            CheckpointReport {
                boundary: checkpoint.boundary,
                is_final: checkpoint.is_final,
                pool_size: checkpoint.item_indices.len(),
                outcome,
            }
        })
        .collect()
}

fn render_plain_summary(deck: &Deck, reports: &[CheckpointReport]) {
    println!("{}", Palette::paint(Palette::ACCENT, &deck.title));
    println!(
        "{} {}",
        Palette::dim("Set id:"),
        Palette::paint(Palette::INFO, &deck.set_id)
    );
    println!(
        "{} {}",
        Palette::dim("Usable items:"),
        Palette::paint(Palette::INFO, deck.items.len())
    );
    if deck.dropped > 0 {
        println!(
            "{} {}",
            Palette::dim("Skipped entries:"),
            Palette::paint(Palette::WARNING, deck.dropped)
        );
    }

    println!();
    println!("{}", Palette::paint(Palette::ACCENT, "Checkpoints"));
    for report in reports {
        let label = if report.is_final {
            "final".to_string()
        } else {
            format!("after item {}", report.boundary)
        };
        let detail = match &report.outcome {
            Ok(kinds) => Palette::paint(
                Palette::SUCCESS,
                kinds
                    .iter()
                    .map(QuestionKind::label)
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            Err(reason) => Palette::paint(Palette::DANGER, reason),
        };
        println!(
            "{} {} {}",
            Palette::dim(format!("{label:>16}")),
            Palette::dim(format!("({})", pluralize("item", report.pool_size))),
            detail
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::StudyItem;

    fn deck(count: usize) -> Deck {
        Deck {
            set_id: "s".into(),
            title: "Test".into(),
            items: (0..count)
                .map(|i| StudyItem::new(format!("f{i}"), format!("ziel {i}"), format!("meaning {i}")))
                .collect(),
            dropped: 0,
        }
    }

    fn config(checkpoint_size: usize) -> EngineConfig {
        EngineConfig {
            checkpoint_size,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn reports_every_boundary_and_final() {
        let reports = inspect(&deck(10), &config(4));
        let boundaries: Vec<(usize, bool)> =
            reports.iter().map(|r| (r.boundary, r.is_final)).collect();
        assert_eq!(boundaries, vec![(4, false), (8, false), (10, true)]);
        assert!(reports.iter().take(2).all(|r| r.outcome.is_ok()));
    }

    #[test]
    fn pools_below_minimum_are_reported_as_errors() {
        let reports = inspect(&deck(6), &config(5));
        assert_eq!(reports[0].pool_size, 5);
        assert!(reports[0].outcome.is_ok());
        // the final checkpoint samples the whole deck, so it still generates
        assert!(reports[1].outcome.is_ok());

        let reports = inspect(&deck(3), &config(20));
        assert_eq!(reports.len(), 1);
        assert!(reports[0].outcome.is_err());
    }
}
