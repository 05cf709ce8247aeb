//! Handle format rules.
//!
//! A candidate handle is trimmed, then checked in order (first failure wins):
//! - Length must be between [`MIN_HANDLE_LEN`] and [`MAX_HANDLE_LEN`] characters
//! - Only ASCII letters, digits and `_` are allowed
//! - The first character must be a letter or digit, not `_`
//!
//! Validation is pure and synchronous. It never touches the store, so
//! malformed input is rejected before any network round-trip.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Shortest accepted handle, in characters.
pub const MIN_HANDLE_LEN: usize = 3;

/// Longest accepted handle, in characters.
pub const MAX_HANDLE_LEN: usize = 20;

/// Why a candidate failed the format rules.
///
/// The variants are stable reason codes consumed by localization; see
/// [`FormatViolation::code`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FormatViolation {
    TooShort,
    TooLong,
    InvalidChars,
    MustStartWithAlphanumeric,
}

impl FormatViolation {
    /// The localization key for this violation.
    pub fn code(&self) -> &'static str {
        match self {
            Self::TooShort => "tooShort",
            Self::TooLong => "tooLong",
            Self::InvalidChars => "invalidChars",
            Self::MustStartWithAlphanumeric => "mustStartWithAlphanumeric",
        }
    }
}

impl fmt::Display for FormatViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Check `candidate` against the handle format rules.
///
/// # Examples
///
/// ```
/// use hreg_types::{validate_format, FormatViolation};
///
/// assert!(validate_format("alice_01").is_ok());
/// assert_eq!(validate_format("ab"), Err(FormatViolation::TooShort));
/// assert_eq!(validate_format("_abc"), Err(FormatViolation::MustStartWithAlphanumeric));
/// ```
pub fn validate_format(candidate: &str) -> Result<(), FormatViolation> {
    let trimmed = candidate.trim();

    let len = trimmed.chars().count();
    if len < MIN_HANDLE_LEN {
        return Err(FormatViolation::TooShort);
    }
    if len > MAX_HANDLE_LEN {
        return Err(FormatViolation::TooLong);
    }

    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(FormatViolation::InvalidChars);
    }

    if trimmed.starts_with('_') {
        return Err(FormatViolation::MustStartWithAlphanumeric);
    }

    Ok(())
}

/// A handle that satisfies the format rules.
///
/// Holds the trimmed string. The only way to build one is [`Handle::parse`]
/// (or deserialization, which runs the same check).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Handle(String);

impl Handle {
    /// Trim and validate `candidate`.
    pub fn parse(candidate: &str) -> Result<Self, FormatViolation> {
        validate_format(candidate)?;
        Ok(Self(candidate.trim().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for Handle {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Handle::parse(&value).map_err(TypeError::InvalidHandle)
    }
}

impl From<Handle> for String {
    fn from(handle: Handle) -> Self {
        handle.0
    }
}

impl AsRef<str> for Handle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Handle {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Handle {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({:?})", self.0)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
