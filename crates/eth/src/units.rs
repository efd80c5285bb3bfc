//! Human-readable token amounts for logs.

use num_traits::Zero;
use probpay_types::BigUint;

const DECIMALS: u32 = 18;

/// Format a base-unit amount of ether.
///
/// Amounts below 0.01 ETH are shown in wei; larger ones in ETH with
/// trailing zeros trimmed.
pub fn format_eth(wei: &BigUint) -> String {
    let one = BigUint::from(10u32).pow(DECIMALS);
    let cent = &one / BigUint::from(100u32);
    if *wei < cent {
        return format!("{} WEI", wei);
    }

    let whole = wei / &one;
    let frac = wei % &one;
    if frac.is_zero() {
        return format!("{} ETH", whole);
    }
    let frac = format!("{:0>width$}", frac.to_string(), width = DECIMALS as usize);
    format!("{}.{} ETH", whole, frac.trim_end_matches('0'))
}

/// Convert whole ether into wei.
pub fn to_wei(eth: u64) -> BigUint {
    BigUint::from(eth) * BigUint::from(10u32).pow(DECIMALS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_eth() {
        assert_eq!(format_eth(&BigUint::zero()), "0 WEI");
        assert_eq!(format_eth(&BigUint::from(1_000u32)), "1000 WEI");
        assert_eq!(format_eth(&to_wei(2)), "2 ETH");
        assert_eq!(
            format_eth(&(to_wei(1) + BigUint::from(250_000_000_000_000_000u64))),
            "1.25 ETH"
        );
        assert_eq!(format_eth(&BigUint::from(10_000_000_000_000_000u64)), "0.01 ETH");
    }
}
