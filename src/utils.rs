//utils.rs
use std::sync::LazyLock;

use regex::Regex;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"));

// 0 / 62 / +62 followed by 9-13 digits
static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\+62|62|0)[0-9]{9,13}$").expect("phone pattern"));

/// Shape check only, no DNS or mailbox verification.
pub fn validate_email(email: &str) -> bool {
    let email = email.trim();
    !email.is_empty() && EMAIL_PATTERN.is_match(email)
}

fn strip_phone(phone: &str) -> String {
    phone
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

pub fn validate_phone(phone: &str) -> bool {
    PHONE_PATTERN.is_match(&strip_phone(phone))
}

/// Rewrites an accepted Indonesian number into `+62...`; anything else comes
/// back untouched.
pub fn format_phone(phone: &str) -> String {
    if !validate_phone(phone) {
        return phone.to_string();
    }

    let clean = strip_phone(phone);
    if let Some(rest) = clean.strip_prefix("+62") {
        format!("+62{}", rest)
    } else if let Some(rest) = clean.strip_prefix("62") {
        format!("+62{}", rest)
    } else if let Some(rest) = clean.strip_prefix('0') {
        format!("+62{}", rest)
    } else {
        phone.to_string()
    }
}

/// Trimmed value, `None` when empty.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Lower-cased, trimmed search query; `None` when there is nothing to match.
pub fn normalize_query(q: Option<&str>) -> Option<String> {
    q.map(|q| q.trim().to_lowercase()).filter(|q| !q.is_empty())
}

/// True when any field contains `needle` (already lower-cased).
pub fn any_contains<'a, I>(fields: I, needle: &str) -> bool
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    fields
        .into_iter()
        .flatten()
        .any(|f| f.to_lowercase().contains(needle))
}

/// Checks optional email / phone fields, returning the canonical phone.
pub fn check_contact(
    email: Option<&str>,
    phone: Option<&str>,
) -> Result<Option<String>, &'static str> {
    if let Some(email) = email {
        if !validate_email(email) {
            return Err("Format email tidak valid");
        }
    }
    match phone {
        Some(phone) if !validate_phone(phone) => Err("Format nomor telepon tidak valid"),
        Some(phone) => Ok(Some(format_phone(phone))),
        None => Ok(None),
    }
}
