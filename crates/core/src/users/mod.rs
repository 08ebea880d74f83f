//! Users module - user lookup trait and bank client identifier derivation.

mod client_id;
mod users_traits;

pub use client_id::derive_client_id;
pub use users_traits::UserRepositoryTrait;
