//! Normalization rules shared by group and participant names and emails.

use crate::error::DomainError;

/// Maximum length of a group or participant name, in characters.
pub const MAX_NAME_LEN: usize = 60;

/// Normalizes a display name: trims, collapses internal whitespace runs to a
/// single space, and enforces the 1..=60 character bound.
///
/// The normalized form is what gets stored; uniqueness comparisons fold case
/// on top of it (see [`fold_name`]).
pub fn normalize_name(raw: &str) -> Result<String, DomainError> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let len = collapsed.chars().count();
    if len == 0 {
        return Err(DomainError::validation("Name must not be empty"));
    }
    if len > MAX_NAME_LEN {
        return Err(DomainError::validation(format!(
            "Name must be at most {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(collapsed)
}

/// Case-folded form of a normalized name, used for uniqueness checks.
pub fn fold_name(name: &str) -> String {
    name.to_lowercase()
}

/// Normalizes an email: trims and lowercases. Requires a plausible
/// `local@domain` shape; full verification belongs to the identity provider.
pub fn normalize_email(raw: &str) -> Result<String, DomainError> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(DomainError::validation("Invalid email address"));
    }
    Ok(email)
}
