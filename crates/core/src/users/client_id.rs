//! Bank client identifier derivation.

use std::sync::LazyLock;

use regex::Regex;

use crate::banking::ClientId;
use crate::errors::{Result, ValidationError};

static CLIENT_ID_INVALID_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9_-]").expect("Invalid regex pattern"));

/// Derives the bank client id from the local part of an e-mail address.
///
/// `Team200-1@Example.com` becomes `team200-1`; characters outside
/// `[a-z0-9_-]` are replaced with `-`.
pub fn derive_client_id(email: &str) -> Result<ClientId> {
    let local = email.split('@').next().unwrap_or_default().trim();
    if local.is_empty() {
        return Err(ValidationError::InvalidInput(format!(
            "Cannot derive client id from email '{}'",
            email
        ))
        .into());
    }
    let lowered = local.to_lowercase();
    Ok(ClientId(
        CLIENT_ID_INVALID_CHARS.replace_all(&lowered, "-").into_owned(),
    ))
}
