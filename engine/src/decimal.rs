use rust_decimal::Decimal;
use sha3::{Digest, Keccak256};

use crate::error::{ProviderError, Result};

/// Parses a decimal string, truncating (never rounding) fractional digits
/// beyond the 18 that `Decimal` can hold exactly.
///
/// Upstream venues occasionally emit prices with more precision than a
/// `Decimal` scale can represent; silently rounding would move the value,
/// so excess digits are dropped instead.
pub fn parse_decimal(raw: &str, what: &str) -> Result<Decimal> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ProviderError::Parse {
            what: what.to_owned(),
            reason: "empty string".to_owned(),
        });
    }

    let truncated = truncate_fractional(raw);

    truncated
        .parse::<Decimal>()
        .map_err(|e| ProviderError::Parse {
            what: what.to_owned(),
            reason: e.to_string(),
        })
}

fn truncate_fractional(raw: &str) -> String {
    const MAX_SCALE: usize = 18;

    match raw.split_once('.') {
        Some((int_part, frac_part)) if frac_part.len() > MAX_SCALE => {
            format!("{int_part}.{}", &frac_part[..MAX_SCALE])
        }
        _ => raw.to_owned(),
    }
}

/// `1 / price`, or `0` if `price` is zero — the degenerate inverse-pair
/// case the ticker store's zero-price guard should already prevent from
/// reaching here, but this stays defined rather than panicking.
#[must_use]
pub fn invert(price: Decimal) -> Decimal {
    if price.is_zero() {
        return Decimal::ZERO;
    }
    Decimal::ONE / price
}

/// A decimal that distinguishes "no value" from `0`, since `Decimal` itself
/// has no nil state. Connectors that read an optional on-chain field (one
/// that may legitimately be absent rather than zero, e.g. an unset oracle
/// round) parse into this instead of propagating a [`ProviderError::Parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaybeDecimal {
    Null,
    Value(Decimal),
}

impl MaybeDecimal {
    /// Parses `raw` the same way [`parse_decimal`] does, but turns a parse
    /// failure into `Null` instead of an error.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match parse_decimal(raw, "maybe_decimal") {
            Ok(value) => Self::Value(value),
            Err(_) => Self::Null,
        }
    }

    #[must_use]
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        matches!(self, Self::Value(d) if d.is_zero())
    }

    /// `Null` and negative/zero values both collapse to `Decimal::ZERO`,
    /// mirroring the ticker store's rejection of non-positive prices.
    #[must_use]
    pub fn unwrap_or_zero(&self) -> Decimal {
        match self {
            Self::Null => Decimal::ZERO,
            Self::Value(d) => *d,
        }
    }
}

/// `10^decimals` as a `Decimal`, used to convert raw on-chain integer
/// amounts (token smallest-unit balances, oracle fixed-point feeds) into
/// human-scaled prices.
#[must_use]
pub fn decimals_factor(decimals: u32) -> Decimal {
    let mut factor = Decimal::ONE;
    let ten = Decimal::from(10u8);
    for _ in 0..decimals {
        factor *= ten;
    }
    factor
}

/// Keccak-256 (the original Keccak padding, not NIST SHA3-256) of `data`,
/// used to derive EVM event-topic and function-selector hashes.
#[must_use]
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Splits a Cosmos SDK denom string of the shape `factory/<addr>/<subdenom>`
/// or a plain native denom into its constituent parts. Returns `None` for a
/// bare native denom (e.g. `uosmo`), in which case the whole string is
/// itself the denom.
#[must_use]
pub fn parse_denom(denom: &str) -> Option<(&str, &str)> {
    let rest = denom.strip_prefix("factory/")?;
    rest.split_once('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_excess_fractional_digits() {
        let raw = "1.1234567890123456789012345";
        let parsed = parse_decimal(raw, "price").unwrap();
        assert_eq!(parsed.scale(), 18);
        assert_eq!(parsed.to_string(), "1.123456789012345678");
    }

    #[test]
    fn parses_exact_precision_unchanged() {
        let parsed = parse_decimal("42.5", "price").unwrap();
        assert_eq!(parsed, Decimal::new(425, 1));
    }

    #[test]
    fn rejects_empty_string() {
        assert!(parse_decimal("", "price").is_err());
        assert!(parse_decimal("   ", "price").is_err());
    }

    #[test]
    fn invert_round_trips() {
        let price = Decimal::new(2, 0);
        assert_eq!(invert(price), Decimal::new(5, 1));
    }

    #[test]
    fn invert_of_zero_is_zero() {
        assert_eq!(invert(Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn maybe_decimal_null_on_invalid_input() {
        assert!(MaybeDecimal::parse("not-a-number").is_nil());
        assert_eq!(MaybeDecimal::parse("not-a-number").unwrap_or_zero(), Decimal::ZERO);
    }

    #[test]
    fn maybe_decimal_value_on_valid_input() {
        let parsed = MaybeDecimal::parse("42.5");
        assert!(!parsed.is_nil());
        assert_eq!(parsed.unwrap_or_zero(), Decimal::new(425, 1));
    }

    #[test]
    fn decimals_factor_matches_power_of_ten() {
        assert_eq!(decimals_factor(0), Decimal::ONE);
        assert_eq!(decimals_factor(6), Decimal::from(1_000_000u32));
    }

    #[test]
    fn keccak256_matches_known_vector() {
        // keccak256("") per the EVM's Keccak (not NIST SHA3) variant.
        let digest = keccak256(b"");
        let expected = hex_literal(
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a47",
        );
        assert_eq!(digest, expected);
    }

    #[test]
    fn parse_denom_splits_factory_denom() {
        let (addr, sub) = parse_denom("factory/osmo1abc/uusdc").unwrap();
        assert_eq!(addr, "osmo1abc");
        assert_eq!(sub, "uusdc");
    }

    #[test]
    fn parse_denom_none_for_native_denom() {
        assert!(parse_denom("uosmo").is_none());
    }

    fn hex_literal(s: &str) -> [u8; 32] {
        let mut out = [0u8; 32];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).unwrap();
        }
        out
    }
}
