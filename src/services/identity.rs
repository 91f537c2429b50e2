use async_trait::async_trait;
use sqlx::Row;

use crate::database::DbPool;
use crate::utils::error::{AppError, AppResult};
use crate::utils::jwt::JwtService;
use crate::utils::validation::parse_user_id;

/// Turns a handshake or bearer credential into a stable user id.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate(&self, credential: &str) -> AppResult<String>;
}

pub struct JwtIdentityProvider {
    jwt_service: JwtService,
    pool: DbPool,
}

impl JwtIdentityProvider {
    pub fn new(jwt_service: JwtService, pool: DbPool) -> Self {
        Self { jwt_service, pool }
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn authenticate(&self, credential: &str) -> AppResult<String> {
        let subject = self.jwt_service.extract_user_id(credential)?;
        let user_id = parse_user_id(&subject)
            .map_err(|_| AppError::Unauthenticated("Token subject is not a user id".to_string()))?;

        // Check if user still exists
        let user_exists = sqlx::query("SELECT COUNT(*) as count FROM users WHERE id = ?")
            .bind(&user_id)
            .fetch_one(self.pool.as_ref())
            .await
            .map_err(|e| AppError::Internal(format!("Identity lookup failed: {}", e)))?
            .get::<i64, _>("count");

        if user_exists == 0 {
            return Err(AppError::Unauthenticated(
                "User no longer exists".to_string(),
            ));
        }

        Ok(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::{insert_user, memory_pool};
    use chrono::Duration;
    use uuid::Uuid;

    #[tokio::test]
    async fn authenticates_known_users_only() {
        let pool = memory_pool().await;
        let alice = insert_user(&pool, "alice@example.com", Some("Alice"), Some("Smith")).await;
        let ghost = Uuid::new_v4().to_string();

        let jwt = JwtService::new("secret");
        let alice_token = jwt.generate_token(&alice, Duration::hours(1)).unwrap();
        let ghost_token = jwt.generate_token(&ghost, Duration::hours(1)).unwrap();

        let provider = JwtIdentityProvider::new(jwt, pool);
        assert_eq!(provider.authenticate(&alice_token).await.unwrap(), alice);
        assert!(matches!(
            provider.authenticate(&ghost_token).await,
            Err(AppError::Unauthenticated(_))
        ));
        assert!(matches!(
            provider.authenticate("garbage").await,
            Err(AppError::Unauthenticated(_))
        ));
    }
}
