//! Synthetic recurring bookings for sandbox banks.
//!
//! Sandbox feeds rarely contain enough history to show anything recurring.
//! When enabled, a few well-known monthly series are appended unless a real
//! series for the same merchant is already present. The result is sorted by
//! booking time.

use std::collections::HashSet;

use chrono::{Datelike, Months, NaiveDate};
use log::debug;

use super::merchant_key::{merchant_key_for, normalize_merchant_key};
use crate::banking::{AccountRef, BankCode, TxRecord};

const DEMO_BANK: &str = "demo";
const DEMO_ACCOUNT: &str = "demo-recurring";
const DEMO_LOOKBACK_MONTHS: u32 = 4;
const DEMO_MAX_DAY: u32 = 28;
const DEMO_BOOKING_HOUR: u32 = 12;

struct DemoSeries {
    counterparty: &'static str,
    description: &'static str,
    day: u32,
    months: u32,
    amount_minor: i64,
}

const DEMO_SERIES: &[DemoSeries] = &[
    DemoSeries {
        counterparty: "МосЭнергоСбыт",
        description: "Оплата электроэнергии",
        day: 5,
        months: 4,
        amount_minor: -250_000,
    },
    DemoSeries {
        counterparty: "Ростелеком",
        description: "Интернет и ТВ",
        day: 12,
        months: 4,
        amount_minor: -79_000,
    },
    DemoSeries {
        counterparty: "Аренда ЖК",
        description: "Оплата аренды",
        day: 3,
        months: 4,
        amount_minor: -3_500_000,
    },
    DemoSeries {
        counterparty: "ФНС Россия",
        description: "Налог на имущество",
        day: 20,
        months: 3,
        amount_minor: -120_000,
    },
];

/// Returns `transactions` extended with demo series whose merchant key is not yet present.
pub fn with_demo_transactions(mut transactions: Vec<TxRecord>, today: NaiveDate) -> Vec<TxRecord> {
    let existing: HashSet<String> = transactions.iter().map(merchant_key_for).collect();
    let Some(start) = today.checked_sub_months(Months::new(DEMO_LOOKBACK_MONTHS)) else {
        return transactions;
    };

    let account = AccountRef::new(BankCode::new(DEMO_BANK), DEMO_ACCOUNT);
    for series in DEMO_SERIES {
        if existing.contains(&normalize_merchant_key(series.counterparty)) {
            debug!("Demo series '{}' skipped: already present", series.counterparty);
            continue;
        }
        for offset in 0..series.months {
            let Some(booking_at) = start
                .checked_add_months(Months::new(offset))
                .and_then(|month| month.with_day(series.day.min(DEMO_MAX_DAY)))
                .and_then(|date| date.and_hms_opt(DEMO_BOOKING_HOUR, 0, 0))
            else {
                continue;
            };
            transactions.push(TxRecord {
                account: account.clone(),
                booking_at,
                amount_minor: series.amount_minor,
                description: Some(series.description.to_string()),
                counterparty: Some(series.counterparty.to_string()),
            });
        }
    }
    transactions.sort_by_key(|tx| tx.booking_at);
    transactions
}
