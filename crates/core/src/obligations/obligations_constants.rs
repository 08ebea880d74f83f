/// Merchant key used when a transaction has neither counterparty nor description.
pub const UNKNOWN_MERCHANT_KEY: &str = "unknown";

/// Groups smaller than this are never tested for recurrence.
pub const MIN_GROUP_SIZE: usize = 3;

/// Inclusive day-gap range counted as a monthly hit.
pub const MONTHLY_GAP_DAYS: std::ops::RangeInclusive<i64> = 25..=35;
/// Inclusive day-gap range counted as a weekly hit.
pub const WEEKLY_GAP_DAYS: std::ops::RangeInclusive<i64> = 5..=9;

/// Monthly hits needed to classify a group as monthly.
pub const MIN_MONTHLY_HITS: usize = 2;
/// Weekly hits needed to classify a group as weekly.
pub const MIN_WEEKLY_HITS: usize = 3;

pub const MIN_MONTHLY_REPEATS: usize = 3;
pub const MIN_WEEKLY_REPEATS: usize = 4;

/// Number of most recent transactions averaged into the obligation amount.
pub const AMOUNT_AVERAGE_WINDOW: usize = 3;

/// Latest day-of-month a monthly obligation is scheduled on.
pub const MAX_TYPICAL_DAY: u32 = 28;

pub const MONTHLY_CONFIDENCE_BASE: f64 = 0.6;
pub const MONTHLY_CONFIDENCE_CAP: f64 = 0.9;
pub const WEEKLY_CONFIDENCE_BASE: f64 = 0.5;
pub const WEEKLY_CONFIDENCE_CAP: f64 = 0.85;
pub const CONFIDENCE_PER_REPEAT: f64 = 0.05;

/// Titles must be longer than this (in characters) to be considered.
pub const MIN_TITLE_CHARS: usize = 3;

pub const OBLIGATION_ID_PREFIX: &str = "oblg_";
/// Number of SHA-256 bytes kept in an obligation id.
pub const OBLIGATION_ID_BYTES: usize = 10;

pub const DEFAULT_SOURCE: &str = "agg";
pub const DEFAULT_CURRENCY: &str = "RUB";
