use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::error::ReadError;
use crate::token::Address;

/// Swap direction. Selling spends the selected token for stablecoin;
/// buying spends stablecoin for the selected token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sell,
    Buy,
}

impl Direction {
    pub fn toggled(self) -> Self {
        match self {
            Self::Sell => Self::Buy,
            Self::Buy => Self::Sell,
        }
    }
}

/// Scale factor for spot prices: 1 token unit priced in stablecoin base
/// units times 10^18.
fn price_scale() -> BigUint {
    BigUint::from(10u32).pow(18)
}

/// Expected counter-amount for a swap, in base units of the received asset.
///
/// - sell: `amount * price / 10^18` (stablecoin received)
/// - buy: `amount * 10^18 / price` (token units received)
///
/// Pure integer math, rounding toward zero. A zero price means the
/// marketplace has no quote for the token.
pub fn expected_output(
    direction: Direction,
    token: &Address,
    amount: &BigUint,
    price: &BigUint,
) -> Result<BigUint, ReadError> {
    if price.is_zero() {
        return Err(ReadError::NoQuote {
            token: token.to_string(),
        });
    }
    let output = match direction {
        Direction::Sell => amount * price / price_scale(),
        Direction::Buy => amount * price_scale() / price,
    };
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::{format_fixed, parse_units};

    fn wei(s: &str) -> BigUint {
        parse_units(s, 18).unwrap()
    }

    fn tok() -> Address {
        Address::new("0xsrc")
    }

    #[test]
    fn test_sell_output_is_amount_times_price() {
        // 100 tokens at 2 stablecoin each -> 200 stablecoin
        let out = expected_output(Direction::Sell, &tok(), &wei("100"), &wei("2")).unwrap();
        assert_eq!(out, wei("200"));

        // fractional price
        let out = expected_output(Direction::Sell, &tok(), &wei("3"), &wei("0.5")).unwrap();
        assert_eq!(out, wei("1.5"));
    }

    #[test]
    fn test_buy_output_is_amount_over_price() {
        // 50 stablecoin at 2 stablecoin per token -> 25 tokens
        let out = expected_output(Direction::Buy, &tok(), &wei("50"), &wei("2")).unwrap();
        assert_eq!(out, wei("25"));
        assert_eq!(format_fixed(&out, 18, 6), "25.000000");
    }

    #[test]
    fn test_buy_rounds_toward_zero() {
        // 1 / 3 = 0.333... truncated at 18 decimals
        let out = expected_output(Direction::Buy, &tok(), &wei("1"), &wei("3")).unwrap();
        assert_eq!(out.to_string(), "333333333333333333");
        assert_eq!(format_fixed(&out, 18, 6), "0.333333");
    }

    #[test]
    fn test_zero_price_has_no_quote() {
        assert!(matches!(
            expected_output(Direction::Buy, &tok(), &wei("1"), &BigUint::zero()),
            Err(ReadError::NoQuote { .. })
        ));
        assert!(matches!(
            expected_output(Direction::Sell, &tok(), &wei("1"), &BigUint::zero()),
            Err(ReadError::NoQuote { .. })
        ));
    }

    #[test]
    fn test_zero_amount_yields_zero() {
        let out = expected_output(Direction::Sell, &tok(), &BigUint::zero(), &wei("2")).unwrap();
        assert!(out.is_zero());
    }

    #[test]
    fn test_toggled() {
        assert_eq!(Direction::Sell.toggled(), Direction::Buy);
        assert_eq!(Direction::Buy.toggled(), Direction::Sell);
    }
}
