//! International phone number validation.

use crate::{AuthError, AuthResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// A leading `+` followed by 10 to 14 ASCII digits.
static INTERNATIONAL_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+[0-9]{10,14}$").expect("static phone pattern"));

/// A validated international phone number (`+` and 10 to 14 digits).
///
/// The only way to obtain one is through [`PhoneNumber::parse`], so
/// holding a `PhoneNumber` means the number passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Validate a complete candidate such as `+15551234567`.
    pub fn parse(candidate: &str) -> AuthResult<Self> {
        if INTERNATIONAL_NUMBER.is_match(candidate) {
            Ok(Self(candidate.to_string()))
        } else {
            Err(AuthError::InvalidPhoneNumber(candidate.to_string()))
        }
    }

    /// Concatenate a dial code with the number the user typed.
    ///
    /// Surrounding whitespace of the local part is ignored; nothing else is
    /// normalized, so `555 123 4567` is rejected.
    pub fn candidate(dial_code: &str, local: &str) -> String {
        format!("{}{}", dial_code, local.trim())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = AuthError;

    fn try_from(value: String) -> AuthResult<Self> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(number: PhoneNumber) -> Self {
        number.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_valid_numbers() {
        assert!(PhoneNumber::parse("+15551234567").is_ok());
        assert!(PhoneNumber::parse("+1234567890").is_ok());
        assert!(PhoneNumber::parse("+12345678901234").is_ok());
    }

    #[test]
    fn test_rejects_invalid_numbers() {
        for candidate in [
            "15551234567",      // missing leading +
            "+123456789",       // 9 digits
            "+123456789012345", // 15 digits
            "+1555123456a",
            "+1 5551234567",
            "",
            "+",
        ] {
            assert!(PhoneNumber::parse(candidate).is_err(), "{candidate}");
        }
    }

    #[test]
    fn test_rejects_non_ascii_digits() {
        // Arabic-Indic digits would match a Unicode \d
        assert!(PhoneNumber::parse("+١٢٣٤٥٦٧٨٩٠").is_err());
    }

    #[test]
    fn test_candidate_trims_local_number() {
        let number = PhoneNumber::parse(&PhoneNumber::candidate("+44", "  7911123456 ")).unwrap();
        assert_eq!(number.as_str(), "+447911123456");
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: PhoneNumber = serde_json::from_str("\"+15551234567\"").unwrap();
        assert_eq!(ok.to_string(), "+15551234567");
        assert!(serde_json::from_str::<PhoneNumber>("\"12345\"").is_err());
    }
}
