//! Five-digit US ZIP codes.

use crate::TypeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A validated five-digit ZIP code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ZipCode(String);

impl ZipCode {
    /// Parses exactly five ASCII digits, ignoring surrounding whitespace.
    pub fn parse(input: &str) -> Result<Self, TypeError> {
        let trimmed = input.trim();
        if trimmed.len() == 5 && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(TypeError::InvalidZip(input.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` when the leading `prefix_digits` digits agree.
    ///
    /// ZIP codes sharing a three-digit prefix belong to the same sectional
    /// center, which is what "near" means for scheduling. The prefix length
    /// is clamped to `1..=5`.
    pub fn is_near(&self, other: &ZipCode, prefix_digits: usize) -> bool {
        let n = prefix_digits.clamp(1, 5);
        self.0[..n] == other.0[..n]
    }

    /// Absolute numeric difference, used to rank nearby codes.
    pub fn distance(&self, other: &ZipCode) -> u32 {
        self.numeric().abs_diff(other.numeric())
    }

    fn numeric(&self) -> u32 {
        // Validated on construction.
        self.0.parse().unwrap_or(0)
    }
}

impl fmt::Display for ZipCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ZipCode {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ZipCode {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ZipCode> for String {
    fn from(zip: ZipCode) -> Self {
        zip.0
    }
}
