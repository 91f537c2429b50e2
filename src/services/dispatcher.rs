use std::sync::Arc;

use crate::models::message::{
    ConversationSummary, Message, MessageStatus, NewMessage, SendMessageRequest,
};
use crate::models::page::{Page, Paginated};
use crate::services::conversation::room_key;
use crate::services::message_store::MessageStore;
use crate::utils::error::{AppError, AppResult};
use crate::utils::validation::{
    parse_application_id, parse_message_id, parse_user_id, validate_message_content,
};
use crate::websocket::events::ServerMessage;
use crate::websocket::registry::{ConnectionId, ConnectionRegistry};

/// Orchestrates persist-then-broadcast for sends and read receipts, and serves the read side.
///
/// Live delivery is best effort and never retried; the store is the source of truth. A
/// recipient subscribed to the conversation room gets both `message_received` and
/// `new_message` for the same message and is expected to de-duplicate by id.
pub struct MessageDispatcher {
    store: Arc<dyn MessageStore>,
    registry: Arc<ConnectionRegistry>,
}

impl MessageDispatcher {
    pub fn new(store: Arc<dyn MessageStore>, registry: Arc<ConnectionRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// `origin` is the connection the send came in on; HTTP sends pass `None` and the
    /// acknowledgement goes to the sender's current connection, if any.
    pub async fn send(
        &self,
        sender_id: &str,
        request: SendMessageRequest,
        origin: Option<ConnectionId>,
    ) -> AppResult<Message> {
        let recipient_id = parse_user_id(&request.recipient_id)?;
        if recipient_id == sender_id {
            return Err(AppError::InvalidRecipient(
                "Cannot send message to yourself".to_string(),
            ));
        }
        validate_message_content(&request.content)?;
        let application_id = parse_application_id(request.application_id.as_deref())?;

        let message = self
            .store
            .create(NewMessage {
                sender_id: sender_id.to_string(),
                recipient_id,
                content: request.content,
                application_id,
            })
            .await?;

        tracing::info!(
            "Message {} persisted from {} to {}",
            message.id,
            message.sender_id,
            message.recipient_id
        );

        self.fan_out(&message, origin).await;
        Ok(message)
    }

    async fn fan_out(&self, message: &Message, origin: Option<ConnectionId>) {
        let delivered = self
            .registry
            .send_to_user(
                &message.recipient_id,
                ServerMessage::MessageReceived {
                    message: message.clone(),
                },
            )
            .await;

        let room = room_key(&message.sender_id, &message.recipient_id);
        let room_deliveries = self
            .registry
            .broadcast_room(
                &room,
                ServerMessage::NewMessage {
                    message: message.clone(),
                },
            )
            .await;

        let ack = ServerMessage::MessageSent {
            message: message.clone(),
        };
        let acknowledged = match origin {
            Some(connection_id) => self.registry.send_to_connection(connection_id, ack).await,
            None => self.registry.send_to_user(&message.sender_id, ack).await,
        };

        tracing::debug!(
            "Fan-out for {}: recipient_live={}, room={} ({} connections), acked={}",
            message.id,
            delivered,
            room,
            room_deliveries,
            acknowledged
        );
    }

    /// Recipient-only transition to `read`; the sender gets a receipt if online.
    pub async fn mark_read(&self, message_id: &str, caller_id: &str) -> AppResult<Message> {
        let message_id = parse_message_id(message_id)?;
        let message = self.store.get(&message_id).await?;

        if message.recipient_id != caller_id {
            return Err(AppError::Forbidden(
                "Only recipient can mark message as read".to_string(),
            ));
        }

        let Some(updated) = self.store.mark_read(&message_id).await? else {
            return self.store.get(&message_id).await;
        };

        let notified = self
            .registry
            .send_to_user(
                &updated.sender_id,
                ServerMessage::MessageRead {
                    message_id: updated.id.clone(),
                },
            )
            .await;
        tracing::debug!("Message {} read, sender notified={}", updated.id, notified);

        Ok(updated)
    }

    pub async fn update_status(
        &self,
        message_id: &str,
        status: MessageStatus,
        caller_id: &str,
    ) -> AppResult<Message> {
        match status {
            MessageStatus::Read => self.mark_read(message_id, caller_id).await,
            MessageStatus::Unread => {
                let message_id = parse_message_id(message_id)?;
                let message = self.store.get(&message_id).await?;
                if message.recipient_id != caller_id {
                    return Err(AppError::Forbidden(
                        "Only recipient can update message status".to_string(),
                    ));
                }
                if message.status == MessageStatus::Read {
                    return Err(AppError::Validation(
                        "A read message cannot be marked unread".to_string(),
                    ));
                }
                Ok(message)
            }
        }
    }

    /// Soft delete by either participant. Deleting an already deleted message is `NotFound`.
    pub async fn delete(&self, message_id: &str, caller_id: &str) -> AppResult<()> {
        let message_id = parse_message_id(message_id)?;
        let message = self.store.get(&message_id).await?;

        if !message.is_participant(caller_id) {
            return Err(AppError::Forbidden(
                "Only sender or recipient can delete message".to_string(),
            ));
        }

        self.store.soft_delete(&message_id).await?;
        tracing::info!("Message {} deleted by {}", message_id, caller_id);
        Ok(())
    }

    pub async fn get_one(&self, message_id: &str, caller_id: &str) -> AppResult<Message> {
        let message_id = parse_message_id(message_id)?;
        let message = self.store.get(&message_id).await?;

        if !message.is_participant(caller_id) {
            return Err(AppError::Forbidden(
                "You are not part of this conversation".to_string(),
            ));
        }

        Ok(message)
    }

    pub async fn get_conversation(
        &self,
        caller_id: &str,
        other_user_id: &str,
        page: Page,
    ) -> AppResult<Paginated<Message>> {
        let other_user_id = parse_user_id(other_user_id)?;
        self.store
            .list_conversation(caller_id, &other_user_id, page)
            .await
    }

    pub async fn get_received(&self, caller_id: &str, page: Page) -> AppResult<Paginated<Message>> {
        self.store.list_by_recipient(caller_id, page).await
    }

    pub async fn get_sent(&self, caller_id: &str, page: Page) -> AppResult<Paginated<Message>> {
        self.store.list_by_sender(caller_id, page).await
    }

    pub async fn get_conversation_list(
        &self,
        caller_id: &str,
    ) -> AppResult<Vec<ConversationSummary>> {
        self.store.conversation_list(caller_id).await
    }
}
