//! Price Walk Policy
//!
//! Decides, for one stock at a time, whether its price moves this cycle and by
//! how much. The walk is illustrative randomness, not a market model: roughly
//! one stock in ten moves per cycle, by at most `range_percent` of its price.

use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Fractional digits kept on every price change.
pub const PRICE_SCALE: u32 = 2;

/// Tunable parameters of the price walk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkParams {
    /// Probability that a given stock changes in a given cycle.
    pub pick_probability: f64,
    /// Maximum change as a fraction of the current price.
    pub range_percent: f64,
    /// A sign draw above this threshold moves the price up.
    pub rise_threshold: f64,
}

impl Default for WalkParams {
    fn default() -> Self {
        Self {
            pick_probability: 0.10,
            range_percent: 0.002,
            rise_threshold: 0.51,
        }
    }
}

/// Bounded random walk over stock prices.
///
/// The walk never touches a random source of its own; callers pass the
/// generator in, so whoever owns the generator controls its synchronization.
///
/// # Example
///
/// ```rust
/// use rand::SeedableRng;
/// use rand::rngs::StdRng;
/// use rust_decimal::Decimal;
/// use stock_ticker::domain::pricing::{PriceWalk, WalkParams};
///
/// let walk = PriceWalk::new(WalkParams { pick_probability: 1.0, ..WalkParams::default() });
/// let mut rng = StdRng::seed_from_u64(7);
///
/// let price = Decimal::new(10_000, 2);
/// let change = walk.decide(&mut rng, price).unwrap();
/// assert!(change.abs() <= walk.max_change(price));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PriceWalk {
    params: WalkParams,
}

impl PriceWalk {
    /// Create a walk with the given parameters.
    #[must_use]
    pub const fn new(params: WalkParams) -> Self {
        Self { params }
    }

    /// The walk parameters.
    #[must_use]
    pub const fn params(&self) -> &WalkParams {
        &self.params
    }

    /// Decide the change for a stock currently priced at `price`.
    ///
    /// Returns `None` when the stock is left alone this cycle. An accepted
    /// change is rounded to [`PRICE_SCALE`] digits and may round to zero.
    pub fn decide<R: Rng + ?Sized>(&self, rng: &mut R, price: Decimal) -> Option<Decimal> {
        if rng.random::<f64>() > self.params.pick_probability {
            return None;
        }

        let fraction = rng.random::<f64>() * self.params.range_percent;
        let rising = rng.random::<f64>() > self.params.rise_threshold;

        let change = price
            .checked_mul(Decimal::from_f64(fraction)?)?
            .round_dp(PRICE_SCALE);

        if rising || change.is_zero() {
            Some(change)
        } else {
            Some(-change)
        }
    }

    /// Upper bound on the magnitude of any change `decide` can return for
    /// `price`, rounded up to whole cents.
    #[must_use]
    pub fn max_change(&self, price: Decimal) -> Decimal {
        Decimal::from_f64(self.params.range_percent)
            .and_then(|range| price.abs().checked_mul(range))
            .map_or(Decimal::MAX, |bound| {
                bound.round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::AwayFromZero)
            })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn always_pick() -> PriceWalk {
        PriceWalk::new(WalkParams {
            pick_probability: 1.0,
            ..WalkParams::default()
        })
    }

    #[test]
    fn default_params() {
        let params = WalkParams::default();
        assert!((params.pick_probability - 0.10).abs() < f64::EPSILON);
        assert!((params.range_percent - 0.002).abs() < f64::EPSILON);
        assert!((params.rise_threshold - 0.51).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_probability_never_changes() {
        let walk = PriceWalk::new(WalkParams {
            pick_probability: 0.0,
            ..WalkParams::default()
        });
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..1_000 {
            assert!(walk.decide(&mut rng, Decimal::new(10_000, 2)).is_none());
        }
    }

    #[test]
    fn changes_are_rounded_to_cents() {
        let walk = always_pick();
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..1_000 {
            let change = walk.decide(&mut rng, Decimal::new(57_818, 2)).unwrap();
            assert!(change.scale() <= PRICE_SCALE);
        }
    }

    #[test]
    fn about_one_in_ten_stocks_change() {
        let walk = PriceWalk::default();
        let mut rng = StdRng::seed_from_u64(3);
        let draws = 100_000;
        let changed = (0..draws)
            .filter(|_| walk.decide(&mut rng, Decimal::new(10_000, 2)).is_some())
            .count();

        #[allow(clippy::cast_precision_loss)]
        let ratio = changed as f64 / f64::from(draws);
        assert!((0.095..=0.105).contains(&ratio), "ratio was {ratio}");
    }

    #[test]
    fn moves_are_slightly_biased_down() {
        let walk = always_pick();
        let mut rng = StdRng::seed_from_u64(4);
        let draws = 100_000;
        let mut rises = 0_u32;
        let mut falls = 0_u32;
        for _ in 0..draws {
            let change = walk.decide(&mut rng, Decimal::new(100_000, 2)).unwrap();
            if change.is_sign_positive() && !change.is_zero() {
                rises += 1;
            } else if change.is_sign_negative() {
                falls += 1;
            }
        }
        let rise_ratio = f64::from(rises) / f64::from(rises + falls);
        assert!((0.47..=0.51).contains(&rise_ratio), "rise ratio was {rise_ratio}");
    }

    #[test]
    fn max_change_rounds_up() {
        let walk = PriceWalk::default();
        // 102.60 * 0.002 = 0.2052, rounded away from zero
        assert_eq!(walk.max_change(Decimal::new(10_260, 2)), Decimal::new(21, 2));
        assert_eq!(walk.max_change(Decimal::new(10_000, 2)), Decimal::new(20, 2));
    }

    proptest! {
        #[test]
        fn change_never_exceeds_range(cents in 1_i64..100_000_000, seed: u64) {
            let walk = always_pick();
            let price = Decimal::new(cents, 2);
            let mut rng = StdRng::seed_from_u64(seed);
            let change = walk.decide(&mut rng, price).unwrap();
            prop_assert!(change.abs() <= walk.max_change(price));
        }
    }
}
