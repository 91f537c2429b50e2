use crate::utils::validation::parse_user_id;
use crate::websocket::registry::ConnectionRegistry;

/// Which of `user_ids` are connected right now. Unknown or malformed ids are simply offline.
pub async fn bulk_online_status(registry: &ConnectionRegistry, user_ids: &[String]) -> Vec<String> {
    let canonical: Vec<String> = user_ids
        .iter()
        .filter_map(|id| parse_user_id(id).ok())
        .collect();
    registry.is_online(&canonical).await
}
