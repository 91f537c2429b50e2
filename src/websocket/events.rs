use serde::{Deserialize, Serialize};

use crate::models::message::Message;
use crate::utils::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    SendMessage {
        recipient_id: String,
        content: String,
        #[serde(default)]
        application_id: Option<String>,
    },
    JoinConversation {
        other_user_id: String,
    },
    LeaveConversation {
        other_user_id: String,
    },
    Typing {
        other_user_id: String,
        is_typing: bool,
    },
    MarkAsRead {
        message_id: String,
    },
    GetOnlineStatus {
        user_ids: Vec<String>,
    },
    Heartbeat,
}

impl ClientMessage {
    /// Parses one inbound text frame. Unknown event names and malformed payloads are
    /// validation errors.
    pub fn parse(text: &str) -> AppResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| AppError::Validation(format!("Malformed event: {}", e)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected {
        user_id: String,
    },
    UserOnline {
        user_id: String,
    },
    UserOffline {
        user_id: String,
    },
    MessageReceived {
        message: Message,
    },
    MessageSent {
        message: Message,
    },
    NewMessage {
        message: Message,
    },
    JoinedConversation {
        conversation_room: String,
    },
    LeftConversation {
        conversation_room: String,
    },
    UserTyping {
        user_id: String,
        is_typing: bool,
    },
    MessageRead {
        message_id: String,
    },
    MessageMarkedRead {
        message_id: String,
    },
    OnlineStatus {
        online_users: Vec<String>,
    },
    Error {
        error: String,
        message: String,
    },
    Pong,
}

impl From<&AppError> for ServerMessage {
    fn from(err: &AppError) -> Self {
        let body = err.to_response_body();
        ServerMessage::Error {
            error: body.error,
            message: body.message,
        }
    }
}
