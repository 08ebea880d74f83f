mod token_cache;
mod traits;

pub use token_cache::{BankTokenCache, EpochClock, DEFAULT_TOKEN_TTL_SECS, MIN_REMAINING_TTL_SECS};
pub use traits::*;
