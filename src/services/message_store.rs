use async_trait::async_trait;
use sqlx::Row;

use crate::database::DbPool;
use crate::models::message::{ConversationSummary, Message, MessageStatus, NewMessage};
use crate::models::page::{Page, Paginated};
use crate::services::conversation::load_summaries;
use crate::utils::error::{AppError, AppResult};
use crate::utils::helpers::MonotonicClock;
use crate::utils::validation::validate_message_content;

/// Durable CRUD and query surface over message records. Soft-deleted rows are invisible to
/// every method.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn create(&self, new_message: NewMessage) -> AppResult<Message>;

    async fn get(&self, id: &str) -> AppResult<Message>;

    /// Both directions between the pair; the page is selected newest-first and returned
    /// oldest-first.
    async fn list_conversation(
        &self,
        user_id: &str,
        other_user_id: &str,
        page: Page,
    ) -> AppResult<Paginated<Message>>;

    async fn list_by_recipient(&self, recipient_id: &str, page: Page)
    -> AppResult<Paginated<Message>>;

    async fn list_by_sender(&self, sender_id: &str, page: Page) -> AppResult<Paginated<Message>>;

    /// Moves an unread message to `read`. Returns the updated row only for the call that made
    /// the transition; `None` means the message was already read.
    async fn mark_read(&self, id: &str) -> AppResult<Option<Message>>;

    async fn soft_delete(&self, id: &str) -> AppResult<()>;

    async fn conversation_list(&self, user_id: &str) -> AppResult<Vec<ConversationSummary>>;
}

pub struct SqliteMessageStore {
    pool: DbPool,
    clock: MonotonicClock,
}

impl SqliteMessageStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            clock: MonotonicClock::new(),
        }
    }

    async fn paginate(
        &self,
        filter: &str,
        params: &[&str],
        page: Page,
    ) -> AppResult<Paginated<Message>> {
        let mut tx = self.pool.begin().await?;

        let count_sql = format!(
            "SELECT COUNT(*) as count FROM messages WHERE ({}) AND deleted_at IS NULL",
            filter
        );
        let mut count_query = sqlx::query(&count_sql);
        for param in params {
            count_query = count_query.bind(*param);
        }
        let total = count_query.fetch_one(&mut *tx).await?.get::<i64, _>("count");

        let page_sql = format!(
            "SELECT * FROM messages WHERE ({}) AND deleted_at IS NULL
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            filter
        );
        let mut page_query = sqlx::query_as::<_, Message>(&page_sql);
        for param in params {
            page_query = page_query.bind(*param);
        }
        let messages = page_query
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Paginated::new(messages, total, page))
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn create(&self, new_message: NewMessage) -> AppResult<Message> {
        if new_message.sender_id == new_message.recipient_id {
            return Err(AppError::Validation(
                "Sender and recipient must differ".to_string(),
            ));
        }
        validate_message_content(&new_message.content)?;

        let message = Message::new(
            new_message.sender_id,
            new_message.recipient_id,
            new_message.content,
            new_message.application_id,
            self.clock.now_string(),
        );

        sqlx::query(
            "INSERT INTO messages (id, sender_id, recipient_id, content, status, application_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.sender_id)
        .bind(&message.recipient_id)
        .bind(&message.content)
        .bind(message.status)
        .bind(&message.application_id)
        .bind(&message.created_at)
        .bind(&message.updated_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(message)
    }

    async fn get(&self, id: &str) -> AppResult<Message> {
        sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = ? AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Message with ID {} not found", id)))
    }

    async fn list_conversation(
        &self,
        user_id: &str,
        other_user_id: &str,
        page: Page,
    ) -> AppResult<Paginated<Message>> {
        let mut result = self
            .paginate(
                "(sender_id = ? AND recipient_id = ?) OR (sender_id = ? AND recipient_id = ?)",
                &[user_id, other_user_id, other_user_id, user_id],
                page,
            )
            .await?;
        result.data.reverse();
        Ok(result)
    }

    async fn list_by_recipient(
        &self,
        recipient_id: &str,
        page: Page,
    ) -> AppResult<Paginated<Message>> {
        self.paginate("recipient_id = ?", &[recipient_id], page).await
    }

    async fn list_by_sender(&self, sender_id: &str, page: Page) -> AppResult<Paginated<Message>> {
        self.paginate("sender_id = ?", &[sender_id], page).await
    }

    async fn mark_read(&self, id: &str) -> AppResult<Option<Message>> {
        let mut message = self.get(id).await?;
        if message.status == MessageStatus::Read {
            return Ok(None);
        }
        let updated_at = self.clock.after(&message.updated_at);

        let result = sqlx::query(
            "UPDATE messages SET status = ?, updated_at = ? \
             WHERE id = ? AND status = ? AND deleted_at IS NULL",
        )
        .bind(MessageStatus::Read)
        .bind(&updated_at)
        .bind(id)
        .bind(MessageStatus::Unread)
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            // Another caller got there first, or the row was deleted in between.
            return self.get(id).await.map(|_| None);
        }

        message.status = MessageStatus::Read;
        message.updated_at = updated_at;
        Ok(Some(message))
    }

    async fn soft_delete(&self, id: &str) -> AppResult<()> {
        let now = self.clock.now_string();
        let result = sqlx::query(
            "UPDATE messages SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Message with ID {} not found",
                id
            )));
        }

        Ok(())
    }

    async fn conversation_list(&self, user_id: &str) -> AppResult<Vec<ConversationSummary>> {
        load_summaries(&self.pool, user_id).await
    }
}
