//! Keyword classification of recurring payment groups.

use std::sync::LazyLock;

use regex::Regex;

use super::obligations_model::ObligationCategory;

/// Rules are tried in order; the first match wins.
static CATEGORY_RULES: LazyLock<Vec<(Regex, ObligationCategory)>> = LazyLock::new(|| {
    [
        (r"кредит|loan|ипотек", ObligationCategory::Loan),
        (r"жкх|коммун|квартир|водоканал|электр", ObligationCategory::Utility),
        (r"интернет|телек|связь|мобил", ObligationCategory::Telecom),
        (
            r"подписк|subscription|netflix|spotify|icloud|youtube",
            ObligationCategory::Subscription,
        ),
        (r"аренд|rent", ObligationCategory::Rent),
    ]
    .into_iter()
    .map(|(pattern, category)| (Regex::new(pattern).expect("Invalid regex pattern"), category))
    .collect()
});

/// Classifies a group from its title and the description of its first booking.
pub fn classify_category(title: &str, first_description: Option<&str>) -> ObligationCategory {
    let text = format!("{} {}", title, first_description.unwrap_or_default()).to_lowercase();
    CATEGORY_RULES
        .iter()
        .find(|(regex, _)| regex.is_match(&text))
        .map(|(_, category)| *category)
        .unwrap_or(ObligationCategory::Other)
}
