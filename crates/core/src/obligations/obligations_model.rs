//! Obligation domain models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::banking::UserId;

/// Detected recurrence cadence of a transaction group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Periodicity {
    Monthly,
    Weekly,
}

impl Periodicity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Periodicity::Monthly => "MONTHLY",
            Periodicity::Weekly => "WEEKLY",
        }
    }
}

impl std::fmt::Display for Periodicity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a recurring payment.
///
/// `Other` is produced by the classifier but never reported as an obligation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObligationCategory {
    Loan,
    Utility,
    Telecom,
    Subscription,
    Rent,
    Other,
}

impl ObligationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObligationCategory::Loan => "loan",
            ObligationCategory::Utility => "utility",
            ObligationCategory::Telecom => "telecom",
            ObligationCategory::Subscription => "subscription",
            ObligationCategory::Rent => "rent",
            ObligationCategory::Other => "other",
        }
    }

    /// Whether obligations of this category are reported to the user.
    pub fn is_actionable(&self) -> bool {
        !matches!(self, ObligationCategory::Other)
    }
}

impl std::fmt::Display for ObligationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected recurring outgoing payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Obligation {
    /// Stable hash of `(user_id, merchant_key, category)`.
    pub id: String,
    pub user_id: UserId,
    /// Where the underlying transactions came from (`agg` for aggregated feeds).
    pub source: String,
    pub merchant_key: String,
    pub title: String,
    pub category: ObligationCategory,
    pub currency: String,
    /// Average amount in minor units. Always negative.
    pub avg_amount_minor: i64,
    pub periodicity: Periodicity,
    /// Day of month the payment usually happens on (monthly only).
    pub typical_day: Option<u32>,
    pub next_due_date: NaiveDate,
    pub repeats: u32,
    /// Detection confidence in `(0, 1]`.
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}
