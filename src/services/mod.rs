pub mod conversation;
pub mod dispatcher;
pub mod identity;
pub mod message_store;
pub mod presence;
