use crate::{
    backend::{StreakSnapshot, StudyBackend},
    palette::Palette,
    utils::pluralize,
};

use anyhow::{Context, Result};

const METER_WIDTH: usize = 20;

pub async fn run(backend: &dyn StudyBackend) -> Result<()> {
    let snapshot = backend
        .fetch_streak_snapshot()
        .await
        .context("Failed to fetch the streak")?;
    for line in render(&snapshot) {
        println!("{line}");
    }
    Ok(())
}

fn render(snapshot: &StreakSnapshot) -> Vec<String> {
    let goal = snapshot.daily_goal.max(1) as usize;
    let filled = snapshot.today_points as usize * METER_WIDTH / goal;
    let status = if snapshot.daily_goal_met {
        Palette::paint(Palette::SUCCESS, "goal met")
    } else {
        let left = snapshot.daily_goal.saturating_sub(snapshot.today_points);
        Palette::paint(Palette::WARNING, format!("{} to go", pluralize("point", left as usize)))
    };

    vec![
        format!(
            "{} {}",
            Palette::dim("Streak:"),
            Palette::paint(
                Palette::ACCENT,
                pluralize("day", snapshot.current_streak as usize)
            )
        ),
        format!(
            "{} {} {}/{} {}",
            Palette::dim("Today:"),
            Palette::meter(filled, METER_WIDTH),
            snapshot.today_points,
            snapshot.daily_goal,
            status
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::strip_controls_and_escapes;

    #[test]
    fn renders_progress_toward_goal() {
        let lines = render(&StreakSnapshot {
            today_points: 5,
            daily_goal: 10,
            current_streak: 1,
            daily_goal_met: false,
        });
        let plain: Vec<String> = lines.iter().map(|l| strip_controls_and_escapes(l)).collect();
        assert_eq!(plain[0], "Streak: 1 day");
        assert_eq!(plain[1], "Today: ##########---------- 5/10 5 points to go");
    }

    #[test]
    fn zero_goal_does_not_divide_by_zero() {
        let lines = render(&StreakSnapshot {
            today_points: 3,
            daily_goal: 0,
            current_streak: 4,
            daily_goal_met: true,
        });
        let plain = strip_controls_and_escapes(&lines[1]);
        assert!(plain.contains("####################"));
        assert!(plain.ends_with("goal met"));
    }
}
