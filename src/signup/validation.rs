//! Local checks run before the details step may advance.

use crate::error::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};

/// International number: optional leading `+`, then 7 to 15 digits.
static PHONE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^\+?[0-9]{7,15}$").ok());

pub fn valid_phone(phone: &str) -> bool {
    PHONE
        .as_ref()
        .is_some_and(|re| re.is_match(phone.trim()))
}

/// Phone first, then password confirmation.
///
/// # Errors
/// `InvalidPhone` or `PasswordMismatch`.
pub fn validate_details(
    phone: &str,
    password: &SecretString,
    confirm_password: &SecretString,
) -> Result<(), ValidationError> {
    if !valid_phone(phone) {
        return Err(ValidationError::InvalidPhone);
    }

    if password.expose_secret() != confirm_password.expose_secret() {
        return Err(ValidationError::PasswordMismatch);
    }

    Ok(())
}
