//! Bank, account and transaction domain models.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Identifier of an application user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Code of a connected bank (`vbank`, `abank`, ...).
///
/// Always stored lower-cased so it can be used directly as a map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct BankCode(String);

impl BankCode {
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for BankCode {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for BankCode {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<BankCode> for String {
    fn from(value: BankCode) -> Self {
        value.0
    }
}

impl fmt::Display for BankCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Client identifier the bank knows the user by (e.g. `team200-1`).
    ClientId
);
string_id!(
    /// Bank-side account number.
    AccountId
);
string_id!(
    /// Identifier of a consent granted by a bank.
    ConsentId
);
string_id!(
    /// Identifier of an executed payment.
    PaymentId
);

/// Reference to one account held at one bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRef {
    pub bank: BankCode,
    pub account_id: AccountId,
    pub nickname: Option<String>,
    #[serde(default)]
    pub is_reserve: bool,
}

impl AccountRef {
    pub fn new(bank: BankCode, account_id: impl Into<String>) -> Self {
        Self {
            bank,
            account_id: AccountId(account_id.into()),
            nickname: None,
            is_reserve: false,
        }
    }

    pub fn with_nickname(mut self, nickname: Option<String>) -> Self {
        self.nickname = nickname;
        self
    }
}

/// One booked bank transaction.
///
/// `amount_minor` is signed: negative values are debits (outflows),
/// positive values are credits (inflows).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxRecord {
    pub account: AccountRef,
    pub booking_at: NaiveDateTime,
    pub amount_minor: i64,
    pub description: Option<String>,
    pub counterparty: Option<String>,
}

impl TxRecord {
    pub fn is_debit(&self) -> bool {
        self.amount_minor < 0
    }
}
