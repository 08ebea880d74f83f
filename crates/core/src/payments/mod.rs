//! Payments module - user-facing view of detected obligations.

mod payments_model;

pub use payments_model::{payment_views, PaymentStatus, PaymentView};
