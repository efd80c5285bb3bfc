//! Fee estimation and price validation.
//!
//! Fees are computed in exact rationals. The estimate for a segment is
//!
//! ```text
//! fee = Σ(width × height × fps × ⌈duration⌉) × 1.02 × price_per_pixel
//! ```
//!
//! summed over every requested rendition. The multiplier hedges against the
//! real output being slightly larger than the nominal duration suggests.

use num_traits::{ToPrimitive, Zero};
use probpay_core::PriceError;
use probpay_types::{BigInt, BigRational, PriceInfo, ProfileError, Segment, VideoProfile};
use tracing::trace;

/// Numerator of the pixel estimate multiplier.
pub const PIXEL_ESTIMATE_MULTIPLIER_NUMER: i64 = 102;
/// Denominator of the pixel estimate multiplier.
pub const PIXEL_ESTIMATE_MULTIPLIER_DENOM: i64 = 100;

/// The pixel estimate multiplier, exactly `102/100`.
pub fn pixel_estimate_multiplier() -> BigRational {
    BigRational::new(
        BigInt::from(PIXEL_ESTIMATE_MULTIPLIER_NUMER),
        BigInt::from(PIXEL_ESTIMATE_MULTIPLIER_DENOM),
    )
}

/// Pixels a segment produces across `profiles`.
///
/// Any profile with an unparseable resolution fails the whole count.
pub fn estimate_pixels(
    segment: &Segment,
    profiles: &[VideoProfile],
) -> Result<BigInt, ProfileError> {
    let seconds = BigInt::from(segment.whole_seconds());
    profiles.iter().try_fold(BigInt::zero(), |total, profile| {
        let (width, height) = profile.dimensions()?;
        let pixels =
            BigInt::from(width) * BigInt::from(height) * BigInt::from(profile.framerate) * &seconds;
        Ok(total + pixels)
    })
}

/// Expected cost of transcoding `segment` into `profiles` at `price` per
/// pixel.
///
/// A missing price means the work is free and yields `None`. No profiles
/// yield a zero fee.
pub fn estimate_fee(
    segment: &Segment,
    profiles: &[VideoProfile],
    price: Option<&BigRational>,
) -> Result<Option<BigRational>, ProfileError> {
    let Some(price) = price else {
        return Ok(None);
    };
    let pixels = estimate_pixels(segment, profiles)?;
    let fee = BigRational::from_integer(pixels.clone()) * pixel_estimate_multiplier() * price;
    trace!(seq_no = segment.seq_no, pixels = %pixels, fee = %fee, "Estimated segment fee");
    Ok(Some(fee))
}

/// Price per pixel of `info`, or `None` when no price is known.
pub fn rat_price_info(info: Option<&PriceInfo>) -> Result<Option<BigRational>, PriceError> {
    let Some(info) = info else {
        return Ok(None);
    };
    info.per_pixel().map(Some).ok_or(PriceError::ZeroPixelsPerUnit)
}

/// Check an orchestrator's price against the local maximum.
///
/// Without a maximum any well-formed price is accepted.
pub fn validate_price(
    info: Option<&PriceInfo>,
    max_price: Option<&BigRational>,
) -> Result<(), PriceError> {
    let info = info.ok_or(PriceError::Missing)?;
    let price = rat_price_info(Some(info))?.ok_or(PriceError::Missing)?;
    if let Some(max) = max_price {
        if price > *max {
            return Err(PriceError::TooHigh {
                max: PriceInfo::new(
                    max.numer().to_i64().unwrap_or(i64::MAX),
                    max.denom().to_i64().unwrap_or(i64::MAX),
                ),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use probpay_test_helpers::{rat, ratio, test_segment};
    use probpay_types::profile::{p144p30fps16x9, p240p30fps16x9};
    use tracing_test::traced_test;

    #[test]
    fn test_estimate_pixels() {
        let two_secs = test_segment(0, 2.0);
        assert_eq!(
            estimate_pixels(&two_secs, &[p144p30fps16x9()]).unwrap(),
            BigInt::from(2_211_840)
        );
        assert_eq!(
            estimate_pixels(&two_secs, &[p144p30fps16x9(), p240p30fps16x9()]).unwrap(),
            BigInt::from(8_346_240)
        );

        // Fractional durations round up to whole seconds.
        let partial = test_segment(0, 2.2);
        assert_eq!(
            estimate_pixels(&partial, &[p144p30fps16x9(), p240p30fps16x9()]).unwrap(),
            BigInt::from(12_519_360)
        );
    }

    #[traced_test]
    #[test]
    fn test_estimate_fee_no_price_is_free() {
        let fee = estimate_fee(&test_segment(0, 2.0), &[p144p30fps16x9()], None).unwrap();
        assert_eq!(fee, None);
    }

    #[traced_test]
    #[test]
    fn test_estimate_fee_no_profiles_is_zero() {
        let fee = estimate_fee(&test_segment(0, 2.0), &[], Some(&rat(3))).unwrap();
        assert_eq!(fee, Some(rat(0)));
    }

    #[traced_test]
    #[test]
    fn test_estimate_fee_applies_multiplier_and_price() {
        let fee = estimate_fee(&test_segment(0, 2.0), &[p144p30fps16x9()], Some(&rat(3)))
            .unwrap()
            .unwrap();
        let expected = rat(2_211_840) * ratio(102, 100) * rat(3);
        assert_eq!(fee, expected);
    }

    #[traced_test]
    #[test]
    fn test_estimate_fee_invalid_resolution_anywhere() {
        let bad = VideoProfile::new("bad", "100k", 30, "foo");
        let seg = test_segment(0, 2.0);

        for profiles in [
            vec![bad.clone(), p144p30fps16x9()],
            vec![p144p30fps16x9(), bad.clone()],
        ] {
            assert!(matches!(
                estimate_fee(&seg, &profiles, Some(&rat(1))),
                Err(ProfileError::InvalidResolution(_))
            ));
        }
    }

    #[test]
    fn test_rat_price_info() {
        assert_eq!(rat_price_info(None), Ok(None));
        assert_eq!(
            rat_price_info(Some(&PriceInfo::new(1, 0))),
            Err(PriceError::ZeroPixelsPerUnit)
        );
        assert_eq!(
            rat_price_info(Some(&PriceInfo::new(3, 6))),
            Ok(Some(ratio(1, 2)))
        );
    }

    #[test]
    fn test_validate_price_order() {
        assert_eq!(validate_price(None, Some(&rat(1))), Err(PriceError::Missing));
        assert_eq!(
            validate_price(Some(&PriceInfo::new(1, 0)), Some(&rat(1))),
            Err(PriceError::ZeroPixelsPerUnit)
        );
        assert_eq!(
            validate_price(Some(&PriceInfo::new(5, 2)), Some(&ratio(4, 2))),
            Err(PriceError::TooHigh {
                max: PriceInfo::new(2, 1)
            })
        );
    }

    #[test]
    fn test_validate_price_accepts() {
        assert_eq!(validate_price(Some(&PriceInfo::new(5, 2)), None), Ok(()));
        assert_eq!(
            validate_price(Some(&PriceInfo::new(5, 2)), Some(&ratio(5, 2))),
            Ok(())
        );
    }
}
