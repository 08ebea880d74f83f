//! Accounts-consent domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::banking::{BankCode, ClientId, ConsentId, UserId};

/// Status string a bank reports for a usable consent.
pub const CONSENT_STATUS_APPROVED: &str = "approved";

/// Bank-granted permission to read a user's accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountsConsent {
    pub user_id: UserId,
    pub bank: BankCode,
    pub client_id: ClientId,
    pub consent_id: ConsentId,
    /// Raw status as reported by the bank. Only `"approved"` is usable.
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl AccountsConsent {
    pub fn is_approved(&self) -> bool {
        self.status == CONSENT_STATUS_APPROVED
    }
}

/// Per-bank consent outcome recorded on an onboarding job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentState {
    Approved,
    Pending,
}

impl ConsentState {
    pub fn from_consent(consent: &AccountsConsent) -> Self {
        if consent.is_approved() {
            ConsentState::Approved
        } else {
            ConsentState::Pending
        }
    }

    pub fn is_approved(self) -> bool {
        matches!(self, ConsentState::Approved)
    }
}

impl std::fmt::Display for ConsentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsentState::Approved => write!(f, "approved"),
            ConsentState::Pending => write!(f, "pending"),
        }
    }
}
