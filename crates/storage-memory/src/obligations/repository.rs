use async_trait::async_trait;
use dashmap::DashMap;
use log::debug;

use elly_core::banking::UserId;
use elly_core::errors::Result;
use elly_core::obligations::{Obligation, ObligationRepositoryTrait};

/// Detected obligations keyed by obligation id.
///
/// Re-detecting an obligation replaces the stored record with the latest one.
#[derive(Default)]
pub struct ObligationRepository {
    obligations: DashMap<String, Obligation>,
}

impl ObligationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObligationRepositoryTrait for ObligationRepository {
    async fn upsert_all(&self, obligations: Vec<Obligation>) -> Result<usize> {
        let mut written = 0;
        for obligation in obligations {
            self.obligations.insert(obligation.id.clone(), obligation);
            written += 1;
        }
        debug!("Obligations[upsert]: written={}", written);
        Ok(written)
    }

    async fn list_active(&self, user_id: UserId) -> Result<Vec<Obligation>> {
        let mut active: Vec<Obligation> = self
            .obligations
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        active.sort_by(|a, b| {
            a.next_due_date
                .cmp(&b.next_due_date)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(active)
    }
}
