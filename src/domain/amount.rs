use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Resource quantities are whole units. Balances may transiently go negative
/// during a debit, so the type is signed.
pub type Amount = i64;

/// Amount used by credit/debit commands that don't carry a trailing number.
pub const DEFAULT_AMOUNT: Amount = 5;

static TRAILING_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)$").expect("trailing digits pattern is valid"));

/// Extract the final run of digits at the very end of a command's raw text.
/// Example: "!a <@42> 12" -> Some(12), "!a <@42>" -> None, "!d <@42> -3" -> Some(3)
///
/// A leading minus sign is never part of the match, so the result is always
/// the absolute value.
pub fn trailing_number(input: &str) -> Result<Option<Amount>, ParseAmountError> {
    let Some(captures) = TRAILING_DIGITS.captures(input.trim_end()) else {
        return Ok(None);
    };
    let digits = &captures[1];
    digits
        .parse::<Amount>()
        .map(Some)
        .map_err(|_| ParseAmountError::OutOfRange(digits.to_string()))
}

/// Like [`trailing_number`], falling back to `default` when no number is present.
pub fn trailing_number_or(input: &str, default: Amount) -> Result<Amount, ParseAmountError> {
    Ok(trailing_number(input)?.unwrap_or(default))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAmountError {
    OutOfRange(String),
}

impl fmt::Display for ParseAmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseAmountError::OutOfRange(digits) => write!(f, "number out of range: {}", digits),
        }
    }
}

impl std::error::Error for ParseAmountError {}
