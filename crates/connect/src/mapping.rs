//! Tolerant parsing of bank API payloads.
//!
//! Sandbox banks disagree on envelope shapes and field names. Everything here
//! works on `serde_json::Value` and skips records it cannot understand rather
//! than failing the whole response.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::debug;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;

use elly_core::banking::{AccountRef, BankCode, ConsentId, TxRecord};
use elly_core::consents::CONSENT_STATUS_APPROVED;
use elly_core::errors::{ExternalServiceError, Result};

const TX_ID_KEYS: &[&str] = &["transactionId", "transaction_id", "id"];
const BOOKING_TIME_KEYS: &[&str] = &[
    "bookingDateTime",
    "valueDateTime",
    "bookingDate",
    "valueDate",
];
const DESCRIPTION_KEYS: &[&str] = &[
    "transactionInformation",
    "description",
    "narrative",
    "details",
];
const COUNTERPARTY_KEYS: &[&str] = &["counterpartyAccount", "counterparty_account"];
const ALT_AMOUNT_KEYS: &[&str] = &["transactionAmount", "value"];

// ─────────────────────────────────────────────────────────────────────────────
// Accounts
// ─────────────────────────────────────────────────────────────────────────────

/// Parses `{"data":{"account":[...]}}` or `{"accounts":[...]}`.
pub fn parse_accounts(raw: &Value, bank: &BankCode) -> Vec<AccountRef> {
    if let Some(items) = raw.pointer("/data/account").and_then(Value::as_array) {
        return items
            .iter()
            .filter_map(|item| account_ref(item, bank, "accountId"))
            .collect();
    }
    if let Some(items) = raw.get("accounts").and_then(Value::as_array) {
        return items
            .iter()
            .filter_map(|item| account_ref(item, bank, "account_id"))
            .collect();
    }
    Vec::new()
}

fn account_ref(item: &Value, bank: &BankCode, id_key: &str) -> Option<AccountRef> {
    let account_id = first_text(item, &[id_key])?;
    Some(AccountRef::new(bank.clone(), account_id).with_nickname(first_text(item, &["nickname"])))
}

// ─────────────────────────────────────────────────────────────────────────────
// Transactions
// ─────────────────────────────────────────────────────────────────────────────

/// Parses a transaction list found under `data.transactions`, `data.transaction`,
/// root `transactions`/`transaction`, or a root array.
pub fn parse_transactions(raw: &Value, account: &AccountRef) -> Vec<TxRecord> {
    let items = raw
        .get("data")
        .and_then(transaction_array)
        .or_else(|| transaction_array(raw))
        .or_else(|| raw.as_array());

    let Some(items) = items else {
        return Vec::new();
    };

    let records: Vec<TxRecord> = items
        .iter()
        .filter_map(|item| transaction_record(item, account))
        .collect();
    if records.len() < items.len() {
        debug!(
            "Tx[parse]: account={} skipped {} of {} records",
            account.account_id,
            items.len() - records.len(),
            items.len()
        );
    }
    records
}

fn transaction_array(node: &Value) -> Option<&Vec<Value>> {
    node.get("transactions")
        .and_then(Value::as_array)
        .or_else(|| node.get("transaction").and_then(Value::as_array))
}

fn transaction_record(item: &Value, account: &AccountRef) -> Option<TxRecord> {
    first_text(item, TX_ID_KEYS)?;
    let amount_minor = amount_minor(item)?;
    let booking_at = first_text(item, BOOKING_TIME_KEYS).and_then(|s| parse_booking_time(&s))?;

    let description = first_text(item, DESCRIPTION_KEYS)
        .or_else(|| item.pointer("/merchant/name").and_then(text));
    let counterparty = first_text(item, COUNTERPARTY_KEYS)
        .or_else(|| item.pointer("/counterparty/accountId").and_then(text))
        .or_else(|| item.pointer("/counterparty/name").and_then(text));

    Some(TxRecord {
        account: account.clone(),
        booking_at,
        amount_minor,
        description,
        counterparty,
    })
}

/// Signed amount in minor units. `creditDebitIndicator: Debit` negates unsigned amounts.
fn amount_minor(item: &Value) -> Option<i64> {
    let raw_amount = match item.get("amount") {
        Some(Value::Object(inner)) => inner.get("amount").and_then(text),
        Some(value) => text(value),
        None => first_text(item, ALT_AMOUNT_KEYS),
    }?;

    let minor = to_minor_units(&raw_amount)?;
    let is_debit = item
        .get("creditDebitIndicator")
        .and_then(Value::as_str)
        .is_some_and(|s| s.eq_ignore_ascii_case("debit"));

    Some(if is_debit && minor >= 0 { -minor } else { minor })
}

/// Decimal string to minor units, rounding half away from zero.
pub(crate) fn to_minor_units(amount: &str) -> Option<i64> {
    let trimmed = amount.trim();
    let value = Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()?;
    value
        .checked_mul(Decimal::ONE_HUNDRED)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

/// RFC 3339 instants (normalized to UTC), zone-less date-times, or plain dates.
pub(crate) fn parse_booking_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.naive_utc());
    }
    if let Ok(local) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(local);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

// ─────────────────────────────────────────────────────────────────────────────
// Consents
// ─────────────────────────────────────────────────────────────────────────────

/// Parses `{"data":{"consentId","status"}}` or a flat `{"consent_id"|"consentId","status"}`.
/// A missing status means approved.
pub fn parse_consent(raw: &Value) -> Result<(ConsentId, String)> {
    if let Some(data) = raw.get("data") {
        if let Some(consent_id) = first_text(data, &["consentId"]) {
            let status = first_text(data, &["status"])
                .unwrap_or_else(|| CONSENT_STATUS_APPROVED.to_string());
            return Ok((ConsentId(consent_id), status));
        }
    }

    let consent_id = first_text(raw, &["consent_id", "consentId"]).ok_or_else(|| {
        ExternalServiceError::new("account-consents", "No consentId/consent_id in response")
    })?;
    let status =
        first_text(raw, &["status"]).unwrap_or_else(|| CONSENT_STATUS_APPROVED.to_string());
    Ok((ConsentId(consent_id), status))
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Text of the first key holding a non-blank scalar.
fn first_text(node: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| node.get(*key).and_then(text))
}

fn text(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!s.trim().is_empty()).then_some(s)
}
