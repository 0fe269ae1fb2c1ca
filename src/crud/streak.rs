use std::collections::HashSet;

use chrono::NaiveDate;

use crate::backend::{ReconcileResponse, StreakSnapshot};
use crate::error::BackendError;

use super::DB;

/// Consecutive goal-met days ending today, or yesterday while today's goal is still open.
pub fn count_streak(today: NaiveDate, met_days: &[NaiveDate]) -> u32 {
    let met: HashSet<NaiveDate> = met_days.iter().copied().collect();
    let mut day = if met.contains(&today) {
        Some(today)
    } else {
        today.pred_opt()
    };

    let mut streak = 0;
    while let Some(current) = day {
        if !met.contains(&current) {
            break;
        }
        streak += 1;
        day = current.pred_opt();
    }
    streak
}

impl DB {
    pub async fn points_on(&self, day: NaiveDate) -> Result<u32, BackendError> {
        let points: Option<i64> = sqlx::query_scalar("SELECT points FROM daily_points WHERE day = ?")
            .bind(day)
            .fetch_optional(&self.pool)
            .await?;
        Ok(points.map_or(0, |p| u32::try_from(p).unwrap_or(0)))
    }

    pub async fn streak_on(&self, today: NaiveDate, daily_goal: u32) -> Result<u32, BackendError> {
        let met_days: Vec<NaiveDate> = sqlx::query_scalar(
            r#"
            SELECT day
            FROM daily_points
            WHERE points >= ? AND day <= ?
            ORDER BY day DESC
            "#,
        )
        .bind(i64::from(daily_goal))
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        Ok(count_streak(today, &met_days))
    }

    pub async fn snapshot_on(
        &self,
        today: NaiveDate,
        daily_goal: u32,
    ) -> Result<StreakSnapshot, BackendError> {
        let today_points = self.points_on(today).await?;
        Ok(StreakSnapshot {
            today_points,
            daily_goal,
            current_streak: self.streak_on(today, daily_goal).await?,
            daily_goal_met: today_points >= daily_goal,
        })
    }

    /// Adds `points` to `day` with a single upsert.
    /// `streak_updated` is set only by the call that crosses the goal.
    pub async fn add_points_on(
        &self,
        day: NaiveDate,
        points: u32,
        daily_goal: u32,
    ) -> Result<ReconcileResponse, BackendError> {
        let after: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO daily_points (day, points)
            VALUES (?, ?)
            ON CONFLICT (day)
            DO UPDATE SET points = points + EXCLUDED.points
            RETURNING points
            "#,
        )
        .bind(day)
        .bind(i64::from(points))
        .fetch_one(&self.pool)
        .await?;
        let after = u32::try_from(after).unwrap_or(u32::MAX);
        let before = after.saturating_sub(points);

        Ok(ReconcileResponse {
            streak_updated: before < daily_goal && after >= daily_goal,
            today_points: Some(after),
            daily_goal: Some(daily_goal),
            current_streak: Some(self.streak_on(day, daily_goal).await?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn streak_counts_back_from_today() {
        let days = [date("2026-03-10"), date("2026-03-09"), date("2026-03-08")];
        assert_eq!(count_streak(date("2026-03-10"), &days), 3);
    }

    #[test]
    fn open_today_continues_from_yesterday() {
        let days = [date("2026-03-09"), date("2026-03-08")];
        assert_eq!(count_streak(date("2026-03-10"), &days), 2);
    }

    #[test]
    fn gap_breaks_streak() {
        let days = [date("2026-03-10"), date("2026-03-08"), date("2026-03-07")];
        assert_eq!(count_streak(date("2026-03-10"), &days), 1);
        assert_eq!(count_streak(date("2026-03-12"), &days), 0);
    }

    #[tokio::test]
    async fn crossing_the_goal_is_reported_once() {
        let db = DB::new_in_memory().await.unwrap();
        let today = date("2026-03-10");

        let first = db.add_points_on(today, 8, 10).await.unwrap();
        assert!(!first.streak_updated);
        assert_eq!(first.today_points, Some(8));

        let second = db.add_points_on(today, 3, 10).await.unwrap();
        assert!(second.streak_updated);
        assert_eq!(second.today_points, Some(11));
        assert_eq!(second.current_streak, Some(1));

        let third = db.add_points_on(today, 1, 10).await.unwrap();
        assert!(!third.streak_updated);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_additions_all_land() {
        let dir = tempfile::tempdir().unwrap();
        let db = DB::open(&dir.path().join("points.db")).await.unwrap();
        let today = date("2026-03-10");

        let calls: Vec<_> = (0..20)
            .map(|_| {
                let db = db.clone();
                tokio::spawn(async move { db.add_points_on(today, 1, 10).await })
            })
            .collect();

        let mut crossed = 0;
        for call in calls {
            let response = call.await.unwrap().unwrap();
            if response.streak_updated {
                crossed += 1;
            }
        }

        assert_eq!(db.points_on(today).await.unwrap(), 20);
        assert_eq!(crossed, 1);
    }

    #[tokio::test]
    async fn snapshot_reflects_previous_days() {
        let db = DB::new_in_memory().await.unwrap();
        db.add_points_on(date("2026-03-08"), 10, 10).await.unwrap();
        db.add_points_on(date("2026-03-09"), 12, 10).await.unwrap();
        db.add_points_on(date("2026-03-10"), 4, 10).await.unwrap();

        let snapshot = db.snapshot_on(date("2026-03-10"), 10).await.unwrap();
        assert_eq!(snapshot.today_points, 4);
        assert_eq!(snapshot.current_streak, 2);
        assert!(!snapshot.daily_goal_met);
    }
}
