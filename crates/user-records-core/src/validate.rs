//! Field-level checks for operator input.
//!
//! Every check takes the raw text exactly as typed and has no side effects.

use thiserror::Error;
use time::OffsetDateTime;

use crate::Gender;

/// Minimum age, in years, implied by a birth year.
pub const MINIMUM_AGE_YEARS: i64 = 18;

#[derive(Debug, Clone, Copy, Error, Eq, PartialEq)]
pub enum IdRejection {
    #[error("Only AlphaNumeric Characters are allowed.")]
    NotAlphanumeric,
    #[error("ID already exists, please use a UNIQUE ID.")]
    Duplicate,
}

/// Check a candidate user id against the alphanumeric rule and the set of ids
/// already present in the store.
///
/// # Errors
/// Returns the reason the id cannot be used.
pub fn check_user_id<'a, I>(id: &str, existing: I) -> Result<(), IdRejection>
where
    I: IntoIterator<Item = &'a String>,
{
    if id.is_empty() || !id.chars().all(char::is_alphanumeric) {
        return Err(IdRejection::NotAlphanumeric);
    }
    if existing.into_iter().any(|known| known == id) {
        return Err(IdRejection::Duplicate);
    }
    Ok(())
}

#[must_use]
pub fn is_valid_id<'a, I>(id: &str, existing: I) -> bool
where
    I: IntoIterator<Item = &'a String>,
{
    check_user_id(id, existing).is_ok()
}

#[must_use]
pub fn is_valid_name(value: &str) -> bool {
    !value.is_empty() && value.chars().all(char::is_alphabetic)
}

#[must_use]
pub fn is_valid_age(value: &str) -> bool {
    parse_digits::<u32>(value).is_some_and(|age| age > 0)
}

#[must_use]
pub fn is_valid_gender(value: &str) -> bool {
    Gender::parse(value).is_some()
}

#[must_use]
pub fn is_valid_birth_year(value: &str) -> bool {
    is_valid_birth_year_at(value, current_year())
}

/// Birth-year check against an explicit reference year.
#[must_use]
pub fn is_valid_birth_year_at(value: &str, reference_year: i32) -> bool {
    parse_digits::<i64>(value)
        .is_some_and(|year| i64::from(reference_year) - year >= MINIMUM_AGE_YEARS)
}

#[must_use]
pub fn current_year() -> i32 {
    OffsetDateTime::now_utc().year()
}

// Plain ASCII digits only: `str::parse` alone would also take a leading `+`.
fn parse_digits<T: std::str::FromStr>(value: &str) -> Option<T> {
    if value.is_empty() || !value.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}
