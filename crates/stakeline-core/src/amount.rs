//! Fixed-point token amounts
//!
//! Every balance and bonus is an integer count of 10^-8 token units. Parsing
//! accepts decimal strings and JSON numbers; output is a canonical decimal
//! string, so nothing passes through floating point on the way in or out.

use crate::constants::*;
use crate::error::{CoreError, Result};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Non-negative token amount with 8 decimal places
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenAmount(u128);

impl TokenAmount {
    pub const ZERO: TokenAmount = TokenAmount(0);

    /// Amount from raw units
    pub const fn from_units(units: u128) -> Self {
        Self(units)
    }

    /// Amount from whole tokens
    pub fn from_tokens(tokens: u64) -> Self {
        Self(tokens as u128 * ONE_TOKEN)
    }

    /// Reward paid to a referrer for each referred signup
    pub const fn signup_reward() -> Self {
        Self(SIGNUP_REWARD_UNITS)
    }

    /// Raw units
    pub fn units(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: TokenAmount) -> Result<TokenAmount> {
        self.0
            .checked_add(other.0)
            .map(TokenAmount)
            .ok_or(CoreError::Overflow)
    }

    pub fn checked_sub(self, other: TokenAmount) -> Result<TokenAmount> {
        self.0
            .checked_sub(other.0)
            .map(TokenAmount)
            .ok_or_else(|| CoreError::Underflow {
                have: self.to_string(),
                need: other.to_string(),
            })
    }

    /// `percent`% of this amount, truncated to whole units
    pub fn percent(self, percent: u128) -> Result<TokenAmount> {
        self.0
            .checked_mul(percent)
            .map(|v| TokenAmount(v / 100))
            .ok_or(CoreError::Overflow)
    }

    /// Parse from a JSON float. The shortest round-trip representation is
    /// parsed as decimal text, so `0.1` becomes exactly 10_000_000 units.
    pub fn from_f64(value: f64) -> Result<TokenAmount> {
        if !value.is_finite() {
            return Err(CoreError::InvalidAmount(value.to_string()));
        }
        format!("{}", value).parse()
    }
}

impl FromStr for TokenAmount {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.trim();
        let invalid = || CoreError::InvalidAmount(s.to_string());

        let raw = raw.strip_prefix('+').unwrap_or(raw);
        if raw.is_empty() {
            return Err(invalid());
        }

        let (whole, frac) = match raw.split_once('.') {
            Some((w, f)) => (w, f),
            None => (raw, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let frac = frac.trim_end_matches('0');
        if frac.len() > DECIMALS as usize {
            return Err(CoreError::InvalidAmount(format!(
                "{} has more than {} decimal places",
                s, DECIMALS
            )));
        }

        let whole_units = if whole.is_empty() {
            0u128
        } else {
            whole
                .parse::<u128>()
                .map_err(|_| invalid())?
                .checked_mul(ONE_TOKEN)
                .ok_or(CoreError::Overflow)?
        };

        let frac_units = if frac.is_empty() {
            0u128
        } else {
            let padded = format!("{:0<width$}", frac, width = DECIMALS as usize);
            padded.parse::<u128>().map_err(|_| invalid())?
        };

        whole_units
            .checked_add(frac_units)
            .map(TokenAmount)
            .ok_or(CoreError::Overflow)
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / ONE_TOKEN;
        let frac = self.0 % ONE_TOKEN;
        if frac == 0 {
            return write!(f, "{}", whole);
        }
        let digits = format!("{:0width$}", frac, width = DECIMALS as usize);
        write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
    }
}

// Text formats get a decimal string; binary formats get raw units.
impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            serializer.serialize_u128(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_any(AmountVisitor)
        } else {
            u128::deserialize(deserializer).map(TokenAmount)
        }
    }
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = TokenAmount;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a non-negative decimal amount as a string or number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<TokenAmount, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<TokenAmount, E> {
        (v as u128)
            .checked_mul(ONE_TOKEN)
            .map(TokenAmount)
            .ok_or_else(|| E::custom(CoreError::Overflow))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<TokenAmount, E> {
        if v < 0 {
            return Err(E::custom(CoreError::InvalidAmount(v.to_string())));
        }
        self.visit_u64(v as u64)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<TokenAmount, E> {
        TokenAmount::from_f64(v).map_err(E::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_and_display() {
        assert_eq!("1".parse::<TokenAmount>().unwrap().units(), ONE_TOKEN);
        assert_eq!("1.0".parse::<TokenAmount>().unwrap().units(), ONE_TOKEN);
        assert_eq!(".5".parse::<TokenAmount>().unwrap().units(), 50_000_000);
        assert_eq!("0.00000001".parse::<TokenAmount>().unwrap().units(), 1);
        assert_eq!("2.50".parse::<TokenAmount>().unwrap().to_string(), "2.5");
        assert_eq!(TokenAmount::ZERO.to_string(), "0");
    }

    #[test]
    fn test_rejects_bad_input() {
        for bad in ["", " ", "-1", "abc", "1.2.3", "1e5", "0.000000001", "."] {
            assert!(bad.parse::<TokenAmount>().is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_trailing_zeros_beyond_precision_are_fine() {
        let amount: TokenAmount = "0.1000000000".parse().unwrap();
        assert_eq!(amount.units(), 10_000_000);
    }

    #[test]
    fn test_five_percent_of_one_token() {
        let one = TokenAmount::from_tokens(1);
        assert_eq!(one.percent(5).unwrap().to_string(), "0.05");
        assert_eq!(one.checked_sub(one.percent(5).unwrap()).unwrap().to_string(), "0.95");
    }

    #[test]
    fn test_underflow_is_error() {
        let err = TokenAmount::ZERO.checked_sub(TokenAmount::from_units(1)).unwrap_err();
        assert!(matches!(err, CoreError::Underflow { .. }));
    }

    #[test]
    fn test_json_number_and_string() {
        let a: TokenAmount = serde_json::from_str("0.1").unwrap();
        let b: TokenAmount = serde_json::from_str("\"0.1\"").unwrap();
        let c: TokenAmount = serde_json::from_str("3").unwrap();
        assert_eq!(a, b);
        assert_eq!(c, TokenAmount::signup_reward());
        assert!(serde_json::from_str::<TokenAmount>("-2").is_err());
        assert_eq!(serde_json::to_string(&a).unwrap(), "\"0.1\"");
    }

    proptest! {
        #[test]
        fn prop_display_parse_identity(units in 0u128..1_000_000_000_000_000u128) {
            let amount = TokenAmount::from_units(units);
            let parsed: TokenAmount = amount.to_string().parse().unwrap();
            prop_assert_eq!(parsed, amount);
        }

        #[test]
        fn prop_percent_never_exceeds_whole(units in 1u128..u64::MAX as u128) {
            let amount = TokenAmount::from_units(units);
            let part = amount.percent(STAKE_BONUS_PERCENT).unwrap();
            prop_assert!(part <= amount);
            prop_assert_eq!(
                part.checked_add(amount.checked_sub(part).unwrap()).unwrap(),
                amount
            );
        }
    }
}
