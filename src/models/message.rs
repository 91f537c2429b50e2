use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MessageStatus {
    Unread,
    Read,
}

impl MessageStatus {
    pub fn as_str(&self) -> &str {
        match self {
            MessageStatus::Unread => "unread",
            MessageStatus::Read => "read",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub content: String,
    pub status: MessageStatus,
    pub application_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<String>,
}

impl Message {
    pub fn new(
        sender_id: String,
        recipient_id: String,
        content: String,
        application_id: Option<String>,
        created_at: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender_id,
            recipient_id,
            content,
            status: MessageStatus::Unread,
            application_id,
            updated_at: created_at.clone(),
            created_at,
            deleted_at: None,
        }
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.sender_id == user_id || self.recipient_id == user_id
    }
}

/// Input to the store; identifiers are already canonical.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: String,
    pub recipient_id: String,
    pub content: String,
    pub application_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub recipient_id: String,
    pub content: String,
    #[serde(default)]
    pub application_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: MessageStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ConversationSummary {
    pub other_user_id: String,
    pub other_user_name: String,
    pub last_message: String,
    pub last_message_time: String,
    pub unread_count: i64,
}
