use async_trait::async_trait;

use crate::banking::UserId;
use crate::errors::Result;

/// Read access to application users. Authentication lives elsewhere.
#[async_trait]
pub trait UserRepositoryTrait: Send + Sync {
    /// E-mail of the user, or `None` for unknown users.
    async fn get_email(&self, user_id: UserId) -> Result<Option<String>>;
}
