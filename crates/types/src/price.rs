//! Price terms advertised by an orchestrator.

use num_bigint::BigInt;
use num_rational::BigRational;
use sbor::prelude::*;
use std::fmt;

/// Price expressed as `price_per_unit` wei for every `pixels_per_unit` pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, BasicSbor)]
pub struct PriceInfo {
    pub price_per_unit: i64,
    pub pixels_per_unit: i64,
}

impl PriceInfo {
    pub fn new(price_per_unit: i64, pixels_per_unit: i64) -> Self {
        Self {
            price_per_unit,
            pixels_per_unit,
        }
    }

    /// Price per pixel as an exact rational, or `None` when the denominator
    /// is zero.
    pub fn per_pixel(&self) -> Option<BigRational> {
        if self.pixels_per_unit == 0 {
            return None;
        }
        Some(BigRational::new(
            BigInt::from(self.price_per_unit),
            BigInt::from(self.pixels_per_unit),
        ))
    }
}

impl fmt::Display for PriceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} wei per {} pixels", self.price_per_unit, self.pixels_per_unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_pixel_reduces() {
        let p = PriceInfo::new(10, 4).per_pixel().unwrap();
        assert_eq!(p, BigRational::new(BigInt::from(5), BigInt::from(2)));
    }

    #[test]
    fn test_per_pixel_zero_denominator() {
        assert!(PriceInfo::new(1, 0).per_pixel().is_none());
    }
}
