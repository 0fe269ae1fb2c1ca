use crate::backend::CursorProgress;
use crate::error::BackendError;

use super::DB;

impl DB {
    /// Where to resume `set_id`, if a session left it unfinished.
    pub async fn saved_index(&self, set_id: &str) -> Result<Option<usize>, BackendError> {
        let row: Option<(i64, bool)> = sqlx::query_as(
            r#"
            SELECT cursor_index, is_completed
            FROM cursor_progress
            WHERE set_id = ?
            "#,
        )
        .bind(set_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|(index, completed)| {
            (!completed).then(|| usize::try_from(index).unwrap_or(0))
        }))
    }

    pub async fn save_progress(&self, progress: &CursorProgress) -> Result<(), BackendError> {
        let now = chrono::Utc::now().to_rfc3339();
        let index = i64::try_from(progress.index).unwrap_or(i64::MAX);
        sqlx::query(
            r#"
            INSERT INTO cursor_progress (set_id, cursor_index, is_completed, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (set_id)
            DO UPDATE SET
                cursor_index = EXCLUDED.cursor_index,
                is_completed = EXCLUDED.is_completed,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&progress.set_id)
        .bind(index)
        .bind(progress.is_completed)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
