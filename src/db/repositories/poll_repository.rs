use crate::db::connection::DbPool;
use crate::db::locks::PollLocks;
use crate::db::models::{Poll, PollOption};
use crate::db::store::{PollMutation, PollStore};
use crate::error::{StoreError, UpdateError};
use async_trait::async_trait;
use sqlx::types::Json;

#[derive(Debug, sqlx::FromRow)]
struct PollRow {
    id: String,
    question: String,
    options: Json<Vec<PollOption>>,
    is_active: bool,
    author: String,
}

impl From<PollRow> for Poll {
    fn from(row: PollRow) -> Self {
        Poll {
            id: row.id,
            question: row.question,
            options: row.options.0,
            is_active: row.is_active,
            author: row.author,
        }
    }
}

pub struct PgPollRepository {
    pool: DbPool,
    locks: PollLocks,
}

impl PgPollRepository {
    pub fn new(pool: DbPool) -> Self {
        PgPollRepository {
            pool,
            locks: PollLocks::new(),
        }
    }
}

#[async_trait]
impl PollStore for PgPollRepository {
    async fn save(&self, poll: &Poll) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO polls (id, question, options, is_active, author) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&poll.id)
        .bind(&poll.question)
        .bind(Json(&poll.options))
        .bind(poll.is_active)
        .bind(&poll.author)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::DuplicateKey(poll.id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Poll>, StoreError> {
        let row = sqlx::query_as::<_, PollRow>(
            "SELECT id, question, options, is_active, author FROM polls WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Poll::from))
    }

    async fn update_by_id(&self, id: &str, mutate: PollMutation) -> Result<Poll, UpdateError> {
        let _guard = self.locks.lock(id).await;
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, PollRow>(
            "SELECT id, question, options, is_active, author FROM polls WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Err(UpdateError::NotFound(id.to_owned()));
        };

        let mut poll = Poll::from(row);
        if let Err(e) = mutate(&mut poll) {
            tx.rollback().await?;
            return Err(UpdateError::Rejected(e));
        }

        sqlx::query("UPDATE polls SET options = $2, is_active = $3 WHERE id = $1")
            .bind(id)
            .bind(Json(&poll.options))
            .bind(poll.is_active)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(poll)
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM polls WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
