//! Banking module - identifiers, account references and transactions.

mod banking_model;

pub use banking_model::*;
