//! Recurring-obligation detection.
//!
//! Turns an unordered list of a user's transactions into dated, categorized,
//! confidence-scored obligations:
//!
//! 1. keep debits, group them by merchant key
//! 2. test each group's booking gaps for monthly or weekly recurrence
//! 3. derive amount, next due date, title and category
//! 4. drop groups whose category is not actionable
//!
//! The detector is a pure function of its input. Date arithmetic that could
//! overflow drops the affected group instead of panicking.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use log::debug;

use super::category::classify_category;
use super::merchant_key::merchant_key_for;
use super::obligation_id::compute_obligation_id;
use super::obligations_constants::*;
use super::obligations_model::{Obligation, Periodicity};
use crate::banking::{TxRecord, UserId};

/// Everything the detector needs for one run.
#[derive(Debug, Clone)]
pub struct DetectionInput<'a> {
    pub user_id: UserId,
    pub transactions: &'a [TxRecord],
    /// Reference date used to roll due dates forward.
    pub today: NaiveDate,
    pub source: &'a str,
    pub currency: &'a str,
    pub created_at: DateTime<Utc>,
}

impl<'a> DetectionInput<'a> {
    pub fn new(user_id: UserId, transactions: &'a [TxRecord], today: NaiveDate) -> Self {
        Self {
            user_id,
            transactions,
            today,
            source: DEFAULT_SOURCE,
            currency: DEFAULT_CURRENCY,
            created_at: Utc::now(),
        }
    }

    pub fn with_source(mut self, source: &'a str) -> Self {
        self.source = source;
        self
    }

    pub fn with_currency(mut self, currency: &'a str) -> Self {
        self.currency = currency;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

/// Detects recurring obligations. Output is ordered by merchant key.
pub fn detect_obligations(input: &DetectionInput<'_>) -> Vec<Obligation> {
    let mut groups: BTreeMap<String, Vec<&TxRecord>> = BTreeMap::new();
    for tx in input.transactions.iter().filter(|tx| tx.is_debit()) {
        groups.entry(merchant_key_for(tx)).or_default().push(tx);
    }

    if groups.is_empty() {
        return Vec::new();
    }

    groups
        .into_iter()
        .filter_map(|(merchant_key, group)| detect_group(input, merchant_key, group))
        .collect()
}

fn detect_group(
    input: &DetectionInput<'_>,
    merchant_key: String,
    mut group: Vec<&TxRecord>,
) -> Option<Obligation> {
    if group.len() < MIN_GROUP_SIZE {
        return None;
    }
    group.sort_by_key(|tx| tx.booking_at);

    let dates: Vec<NaiveDate> = group.iter().map(|tx| tx.booking_at.date()).collect();
    let gaps = day_gaps(&dates);
    let periodicity = classify_periodicity(&gaps)?;

    let min_repeats = match periodicity {
        Periodicity::Monthly => MIN_MONTHLY_REPEATS,
        Periodicity::Weekly => MIN_WEEKLY_REPEATS,
    };
    if group.len() < min_repeats {
        return None;
    }

    let last = *dates.last()?;
    let (next_due_date, typical_day) = match next_due(periodicity, last, input.today) {
        Some(due) => due,
        None => {
            debug!(
                "Skipping group '{}': due date out of range after {}",
                merchant_key, last
            );
            return None;
        }
    };

    let title = infer_title(&group, &merchant_key);
    let first_description = group.first().and_then(|tx| tx.description.as_deref());
    let category = classify_category(&title, first_description);
    if !category.is_actionable() {
        debug!("Skipping group '{}': not an actionable category", merchant_key);
        return None;
    }

    let repeats = group.len() as u32;
    Some(Obligation {
        id: compute_obligation_id(input.user_id, &merchant_key, category),
        user_id: input.user_id,
        source: input.source.to_string(),
        title,
        category,
        currency: input.currency.to_string(),
        avg_amount_minor: average_amount_minor(&group),
        periodicity,
        typical_day,
        next_due_date,
        repeats,
        confidence: confidence(periodicity, repeats),
        created_at: input.created_at,
        merchant_key,
    })
}

/// Day gaps between consecutive (sorted) booking dates.
pub(crate) fn day_gaps(dates: &[NaiveDate]) -> Vec<i64> {
    dates
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).num_days())
        .collect()
}

/// Monthly is tested first and wins when both would match.
pub(crate) fn classify_periodicity(gaps: &[i64]) -> Option<Periodicity> {
    let monthly_hits = gaps.iter().filter(|g| MONTHLY_GAP_DAYS.contains(g)).count();
    if monthly_hits >= MIN_MONTHLY_HITS {
        return Some(Periodicity::Monthly);
    }
    let weekly_hits = gaps.iter().filter(|g| WEEKLY_GAP_DAYS.contains(g)).count();
    if weekly_hits >= MIN_WEEKLY_HITS {
        return Some(Periodicity::Weekly);
    }
    None
}

/// Mean absolute amount of the last transactions, floored at one minor unit, negated.
fn average_amount_minor(sorted_group: &[&TxRecord]) -> i64 {
    let window = &sorted_group[sorted_group.len().saturating_sub(AMOUNT_AVERAGE_WINDOW)..];
    if window.is_empty() {
        return -1;
    }
    let sum: i128 = window
        .iter()
        .map(|tx| i128::from(tx.amount_minor).abs())
        .sum();
    let avg = (sum / window.len() as i128).clamp(1, i128::from(i64::MAX));
    -(avg as i64)
}

/// Next due date and, for monthly obligations, the typical day of month.
pub(crate) fn next_due(
    periodicity: Periodicity,
    last: NaiveDate,
    today: NaiveDate,
) -> Option<(NaiveDate, Option<u32>)> {
    match periodicity {
        Periodicity::Monthly => {
            let typical_day = last.day().clamp(1, MAX_TYPICAL_DAY);
            let (year, month) = if last.month() == 12 {
                (last.year().checked_add(1)?, 1)
            } else {
                (last.year(), last.month() + 1)
            };
            let candidate = NaiveDate::from_ymd_opt(year, month, typical_day)?;
            let due = if candidate < today {
                candidate.checked_add_months(Months::new(1))?
            } else {
                candidate
            };
            Some((due, Some(typical_day)))
        }
        Periodicity::Weekly => {
            let candidate = last.checked_add_days(Days::new(7))?;
            let due = if candidate < today {
                candidate.checked_add_days(Days::new(7))?
            } else {
                candidate
            };
            Some((due, None))
        }
    }
}

/// Most frequent non-trivial counterparty/description, ties going to the first seen.
fn infer_title(group: &[&TxRecord], merchant_key: &str) -> String {
    let is_candidate = |s: &&str| s.chars().count() > MIN_TITLE_CHARS;

    let candidates = group
        .iter()
        .filter_map(|tx| tx.counterparty.as_deref().filter(is_candidate))
        .chain(
            group
                .iter()
                .filter_map(|tx| tx.description.as_deref().filter(is_candidate)),
        )
        .chain(std::iter::once(merchant_key))
        .map(str::trim);

    let mut counts: Vec<(&str, usize)> = Vec::new();
    for candidate in candidates {
        match counts.iter_mut().find(|(seen, _)| *seen == candidate) {
            Some((_, count)) => *count += 1,
            None => counts.push((candidate, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (candidate, count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((candidate, count));
        }
    }
    best.map(|(title, _)| title.to_string())
        .unwrap_or_else(|| merchant_key.to_string())
}

/// Linear in repeat count, capped, rounded to two decimals.
pub(crate) fn confidence(periodicity: Periodicity, repeats: u32) -> f64 {
    let (base, cap) = match periodicity {
        Periodicity::Monthly => (MONTHLY_CONFIDENCE_BASE, MONTHLY_CONFIDENCE_CAP),
        Periodicity::Weekly => (WEEKLY_CONFIDENCE_BASE, WEEKLY_CONFIDENCE_CAP),
    };
    let raw = (base + CONFIDENCE_PER_REPEAT * f64::from(repeats)).min(cap);
    (raw * 100.0).round() / 100.0
}
