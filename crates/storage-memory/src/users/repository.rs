use async_trait::async_trait;
use dashmap::DashMap;

use elly_core::banking::UserId;
use elly_core::errors::Result;
use elly_core::users::UserRepositoryTrait;

/// User e-mails, seeded at startup.
#[derive(Default)]
pub struct UserRepository {
    emails: DashMap<UserId, String>,
}

impl UserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = (UserId, String)>) -> Self {
        let repo = Self::new();
        for (user_id, email) in users {
            repo.insert(user_id, email);
        }
        repo
    }

    pub fn insert(&self, user_id: UserId, email: impl Into<String>) {
        self.emails.insert(user_id, email.into());
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

#[async_trait]
impl UserRepositoryTrait for UserRepository {
    async fn get_email(&self, user_id: UserId) -> Result<Option<String>> {
        Ok(self.emails.get(&user_id).map(|email| email.clone()))
    }
}
