//! Obligation repository trait.

use async_trait::async_trait;

use super::obligations_model::Obligation;
use crate::banking::UserId;
use crate::errors::Result;

/// Storage contract for detected obligations.
#[async_trait]
pub trait ObligationRepositoryTrait: Send + Sync {
    /// Inserts or replaces obligations by id.
    ///
    /// Returns the number of records written.
    async fn upsert_all(&self, obligations: Vec<Obligation>) -> Result<usize>;

    /// Lists a user's obligations ordered by next due date.
    async fn list_active(&self, user_id: UserId) -> Result<Vec<Obligation>>;
}
