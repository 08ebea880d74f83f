//! Consents module - bank consent models and repository trait.

mod consents_model;
mod consents_traits;

pub use consents_model::{AccountsConsent, ConsentState, CONSENT_STATUS_APPROVED};
pub use consents_traits::ConsentRepositoryTrait;
