//! Display records for the payments calendar.

use chrono::{Datelike, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::obligations::{Obligation, ObligationCategory};

const TAX_TITLE_MARKER: &str = "налог";

/// Whether a payment's due date has already passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Overdue,
    Pending,
}

/// One row of the payments calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    pub id: String,
    /// Localized category label.
    pub category: String,
    /// Absolute amount in roubles, two decimals.
    pub amount_rub: f64,
    pub day: u32,
    pub status: PaymentStatus,
}

impl PaymentView {
    pub fn from_obligation(obligation: &Obligation, today: NaiveDate) -> Self {
        let status = if obligation.next_due_date < today {
            PaymentStatus::Overdue
        } else {
            PaymentStatus::Pending
        };
        Self {
            id: obligation.id.clone(),
            category: category_label(obligation.category, &obligation.title).to_string(),
            amount_rub: minor_to_rub(obligation.avg_amount_minor),
            day: obligation
                .typical_day
                .unwrap_or_else(|| obligation.next_due_date.day()),
            status,
        }
    }
}

/// Maps obligations to payment rows sorted by day of month.
pub fn payment_views(obligations: &[Obligation], today: NaiveDate) -> Vec<PaymentView> {
    let mut views: Vec<PaymentView> = obligations
        .iter()
        .map(|o| PaymentView::from_obligation(o, today))
        .collect();
    views.sort_by_key(|v| v.day);
    views
}

fn category_label(category: ObligationCategory, title: &str) -> &'static str {
    match category {
        ObligationCategory::Utility => "ЖКХ",
        ObligationCategory::Loan => "Кредит",
        ObligationCategory::Rent => "Аренда",
        ObligationCategory::Telecom => "Связь",
        ObligationCategory::Subscription => "Подписка",
        ObligationCategory::Other if title.to_lowercase().contains(TAX_TITLE_MARKER) => "Налоги",
        ObligationCategory::Other => "Другое",
    }
}

fn minor_to_rub(amount_minor: i64) -> f64 {
    Decimal::new(amount_minor, 2)
        .abs()
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or_default()
}
