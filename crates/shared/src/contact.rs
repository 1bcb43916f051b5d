//! Contact field normalization

use crate::error::SternError;

const MAX_EMAIL_LEN: usize = 254;

/// Trim and lower-case an email address, rejecting obviously malformed input.
///
/// This is a shape check only (one `@`, non-empty local part, dotted domain).
/// Deliverability is the mail provider's problem.
pub fn normalize_email(raw: &str) -> Result<String, SternError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() || email.len() > MAX_EMAIL_LEN {
        return Err(SternError::Validation("Ungültige E-Mail-Adresse".into()));
    }

    let mut parts = email.split('@');
    let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => (local, domain),
        _ => return Err(SternError::Validation("Ungültige E-Mail-Adresse".into())),
    };

    let domain_ok = domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..");
    if local.is_empty() || !domain_ok || email.chars().any(char::is_whitespace) {
        return Err(SternError::Validation("Ungültige E-Mail-Adresse".into()));
    }

    Ok(email)
}

/// Returns `None` for blank optional fields so they persist as NULL.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
