use crate::db::connection::DbPool;
use crate::db::models::Answer;
use crate::db::store::AnswerStore;
use crate::error::StoreError;
use async_trait::async_trait;

pub struct PgAnswerRepository {
    pool: DbPool,
}

impl PgAnswerRepository {
    pub fn new(pool: DbPool) -> Self {
        PgAnswerRepository { pool }
    }
}

#[async_trait]
impl AnswerStore for PgAnswerRepository {
    async fn save(&self, answer: &Answer) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO answers (id, user_id, poll_id, vote) VALUES ($1, $2, $3, $4)
             ON CONFLICT (user_id, poll_id) DO NOTHING",
        )
        .bind(&answer.id)
        .bind(&answer.user_id)
        .bind(&answer.poll_id)
        .bind(answer.vote)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => {
                Err(StoreError::DuplicateKey(answer.id.clone()))
            }
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::DuplicateKey(answer.id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_by_user_and_poll(
        &self,
        user_id: &str,
        poll_id: &str,
    ) -> Result<Option<Answer>, StoreError> {
        let row = sqlx::query_as::<_, (String, String, String, i64)>(
            "SELECT id, user_id, poll_id, vote FROM answers WHERE user_id = $1 AND poll_id = $2",
        )
        .bind(user_id)
        .bind(poll_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, user_id, poll_id, vote)| Answer {
            id,
            user_id,
            poll_id,
            vote,
        }))
    }

    async fn list_by_poll(&self, poll_id: &str) -> Result<Vec<Answer>, StoreError> {
        let rows = sqlx::query_as::<_, (String, String, String, i64)>(
            "SELECT id, user_id, poll_id, vote FROM answers WHERE poll_id = $1",
        )
        .bind(poll_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, user_id, poll_id, vote)| Answer {
                id,
                user_id,
                poll_id,
                vote,
            })
            .collect())
    }

    async fn delete_by_poll(&self, poll_id: &str) -> Result<u64, StoreError> {
        let done = sqlx::query("DELETE FROM answers WHERE poll_id = $1")
            .bind(poll_id)
            .execute(&self.pool)
            .await?;

        Ok(done.rows_affected())
    }
}
