//! Syntactic domain name check applied before anything is sent to the scan service.

use std::sync::LazyLock;

use regex::Regex;

use super::error::TrackerError;

pub const INVALID_DOMAIN_MESSAGE: &str =
    "Invalid domain format. Please enter a valid domain like example.com";

// Labels of 1-63 letters/digits/hyphens, each followed by a dot, then an
// alphabetic TLD of at least two characters. No label starts with a hyphen.
static DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9][A-Za-z0-9-]{0,62}\.)+[A-Za-z]{2,}$")
        .expect("domain regex is valid")
});

/// Returns true when `candidate` looks like `example.com`.
pub fn is_valid_domain(candidate: &str) -> bool {
    DOMAIN_RE.is_match(candidate)
}

/// Trims the input and checks it, returning the cleaned domain.
pub fn validate_domain(candidate: &str) -> Result<&str, TrackerError> {
    let trimmed = candidate.trim();
    if is_valid_domain(trimmed) {
        Ok(trimmed)
    } else {
        Err(TrackerError::Validation(INVALID_DOMAIN_MESSAGE.to_string()))
    }
}
