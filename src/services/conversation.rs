use crate::database::DbPool;
use crate::models::message::{ConversationSummary, MessageStatus};
use crate::utils::error::AppResult;

/// Room key shared by both participants. Identifiers are canonical UUIDs, which never contain `_`.
pub fn room_key(user_a: &str, user_b: &str) -> String {
    let (low, high) = if user_a <= user_b {
        (user_a, user_b)
    } else {
        (user_b, user_a)
    };
    format!("conversation_{}_{}", low, high)
}

/// One row per counterpart: latest message, its time, and how many of theirs are still unread.
pub async fn load_summaries(pool: &DbPool, user_id: &str) -> AppResult<Vec<ConversationSummary>> {
    let summaries = sqlx::query_as::<_, ConversationSummary>(
        "WITH scoped AS (
             SELECT m.id, m.content, m.created_at, m.status, m.recipient_id,
                    CASE WHEN m.sender_id = ? THEN m.recipient_id ELSE m.sender_id END AS other_user_id
             FROM messages m
             WHERE (m.sender_id = ? OR m.recipient_id = ?) AND m.deleted_at IS NULL
         ),
         ranked AS (
             SELECT s.*,
                    ROW_NUMBER() OVER (
                        PARTITION BY s.other_user_id ORDER BY s.created_at DESC, s.id DESC
                    ) AS rn,
                    SUM(CASE WHEN s.recipient_id = ? AND s.status = ? THEN 1 ELSE 0 END) OVER (
                        PARTITION BY s.other_user_id
                    ) AS unread_count
             FROM scoped s
         )
         SELECT r.other_user_id,
                COALESCE(
                    NULLIF(TRIM(COALESCE(u.first_name, '') || ' ' || COALESCE(u.last_name, '')), ''),
                    u.email,
                    'Unknown'
                ) AS other_user_name,
                r.content AS last_message,
                r.created_at AS last_message_time,
                r.unread_count
         FROM ranked r
         LEFT JOIN users u ON u.id = r.other_user_id
         WHERE r.rn = 1
         ORDER BY r.created_at DESC, r.id DESC",
    )
    .bind(user_id)
    .bind(user_id)
    .bind(user_id)
    .bind(user_id)
    .bind(MessageStatus::Unread.as_str())
    .fetch_all(pool.as_ref())
    .await?;

    Ok(summaries)
}
