//! Obligations module - recurring payment detection, models and repository trait.

mod category;
mod demo;
mod detector;
mod merchant_key;
mod obligation_id;
mod obligations_constants;
mod obligations_model;
mod obligations_traits;


pub use category::classify_category;
pub use demo::with_demo_transactions;
pub use detector::{detect_obligations, DetectionInput};
pub use merchant_key::{merchant_key_for, normalize_merchant_key};
pub use obligation_id::compute_obligation_id;
pub use obligations_constants::{DEFAULT_CURRENCY, DEFAULT_SOURCE};
pub use obligations_model::{Obligation, ObligationCategory, Periodicity};
pub use obligations_traits::ObligationRepositoryTrait;
