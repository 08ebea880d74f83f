//! Merchant key normalization.
//!
//! Free-text counterparty names and descriptions differ between bookings of
//! the same payee (card masks, order numbers, payment-rail words). The key
//! produced here is what transactions are grouped by.

use std::sync::LazyLock;

use regex::Regex;

use super::obligations_constants::UNKNOWN_MERCHANT_KEY;
use crate::banking::TxRecord;

static CARD_MASK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*+\d+").expect("Invalid regex pattern"));

static DIGIT_RUN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{2,}").expect("Invalid regex pattern"));

static NOISE_WORDS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"оплата|списание|покупка|платеж|payment|debit|purchase|visa|mir|mastercard")
        .expect("Invalid regex pattern")
});

static WHITESPACE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid regex pattern"));

/// Canonicalizes a counterparty/description into a grouping key.
///
/// Lower-cases, strips card masks (`*1234`), runs of two or more digits and
/// payment-rail noise words, then collapses whitespace. Empty input yields an
/// empty key.
pub fn normalize_merchant_key(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let without_masks = CARD_MASK_REGEX.replace_all(&lowered, " ");
    let without_digits = DIGIT_RUN_REGEX.replace_all(&without_masks, " ");
    let without_noise = NOISE_WORDS_REGEX.replace_all(&without_digits, " ");
    WHITESPACE_REGEX
        .replace_all(&without_noise, " ")
        .trim()
        .to_string()
}

/// Grouping key of a transaction: counterparty, then description, then `"unknown"`.
pub fn merchant_key_for(tx: &TxRecord) -> String {
    let raw = tx
        .counterparty
        .as_deref()
        .or(tx.description.as_deref())
        .unwrap_or(UNKNOWN_MERCHANT_KEY);
    normalize_merchant_key(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::banking::{AccountRef, BankCode};
    use proptest::prelude::*;

    fn tx(counterparty: Option<&str>, description: Option<&str>) -> TxRecord {
        TxRecord {
            account: AccountRef::new(BankCode::new("vbank"), "acc-1"),
            booking_at: chrono::NaiveDate::from_ymd_opt(2025, 3, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            amount_minor: -100,
            description: description.map(str::to_string),
            counterparty: counterparty.map(str::to_string),
        }
    }

    #[test]
    fn test_strips_card_masks_and_digit_runs() {
        assert_eq!(normalize_merchant_key("NETFLIX *4421"), "netflix");
        assert_eq!(normalize_merchant_key("Заказ 123456 Яндекс"), "заказ яндекс");
        assert_eq!(normalize_merchant_key("Store 7"), "store 7");
    }

    #[test]
    fn test_strips_payment_rail_noise() {
        assert_eq!(normalize_merchant_key("Оплата ЖКХ VISA"), "жкх");
        assert_eq!(
            normalize_merchant_key("  Mastercard   PURCHASE Spotify  "),
            "spotify"
        );
        assert_eq!(normalize_merchant_key("Списание по кредиту"), "по кредиту");
    }

    #[test]
    fn test_empty_input_yields_empty_key() {
        assert_eq!(normalize_merchant_key(""), "");
        assert_eq!(normalize_merchant_key("   "), "");
        assert_eq!(normalize_merchant_key("1234 5678"), "");
    }

    #[test]
    fn test_key_falls_back_from_counterparty_to_description_to_unknown() {
        assert_eq!(merchant_key_for(&tx(Some("Ростелеком"), Some("Интернет"))), "ростелеком");
        assert_eq!(merchant_key_for(&tx(None, Some("Аренда ЖК"))), "аренда жк");
        assert_eq!(merchant_key_for(&tx(None, None)), "unknown");
    }

    proptest! {
        #[test]
        fn prop_normalization_is_idempotent(input in "[a-zA-Zа-яА-Я0-9* ]{0,40}") {
            let once = normalize_merchant_key(&input);
            prop_assert_eq!(normalize_merchant_key(&once), once.clone());
            prop_assert_eq!(once.trim(), once.as_str());
            prop_assert!(!once.contains("  "));
        }
    }
}
