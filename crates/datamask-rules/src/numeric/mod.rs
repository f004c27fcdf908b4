//! Rules over integers, decimals and doubles.

use std::str::FromStr;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::errors::RuleError;
use crate::rule::{MaskRule, RuleValue, SeededRule};
use crate::seed::{SeedProvider, rng_for};

/// Resolution of decimal noise factors.
const DECIMAL_NOISE_STEPS: i64 = 1_000_000;

/// Arithmetic the numeric rules need from a value kind.
pub trait Numeric: RuleValue + Copy + PartialOrd {
    fn zero() -> Self;

    /// `false` for NaN and infinities; always `true` for exact kinds.
    fn is_finite(self) -> bool;

    fn parse_param(text: &str) -> Option<Self>;

    /// `self + delta` with `|delta| <= max`; `None` on overflow.
    fn add_absolute_noise(self, max: Self, rng: &mut ChaCha8Rng) -> Option<Self>;

    /// `self * (1 + f)` with `|f| <= fraction`; `None` on overflow.
    fn add_relative_noise(self, fraction: f64, rng: &mut ChaCha8Rng) -> Option<Self>;

    /// Nearest multiple of `step`, halves away from zero.
    fn round_to(self, step: Self) -> Option<Self>;
}

impl Numeric for i64 {
    fn zero() -> Self {
        0
    }

    fn is_finite(self) -> bool {
        true
    }

    fn parse_param(text: &str) -> Option<Self> {
        text.parse().ok()
    }

    fn add_absolute_noise(self, max: Self, rng: &mut ChaCha8Rng) -> Option<Self> {
        let delta = rng.random_range(-max..=max);
        self.checked_add(delta)
    }

    fn add_relative_noise(self, fraction: f64, rng: &mut ChaCha8Rng) -> Option<Self> {
        let factor = fraction * unit_noise(rng);
        let delta = (self as f64 * factor).round();
        if !delta.is_finite() || delta.abs() >= i64::MAX as f64 {
            return None;
        }
        self.checked_add(delta as i64)
    }

    fn round_to(self, step: Self) -> Option<Self> {
        let quotient = self.div_euclid(step);
        let remainder = self.rem_euclid(step);
        let up = if self >= 0 {
            remainder.checked_mul(2)? >= step
        } else {
            remainder.checked_mul(2)? > step
        };
        let quotient = if up { quotient.checked_add(1)? } else { quotient };
        quotient.checked_mul(step)
    }
}

impl Numeric for f64 {
    fn zero() -> Self {
        0.0
    }

    fn is_finite(self) -> bool {
        f64::is_finite(self)
    }

    fn parse_param(text: &str) -> Option<Self> {
        text.parse().ok().filter(|value: &f64| value.is_finite())
    }

    fn add_absolute_noise(self, max: Self, rng: &mut ChaCha8Rng) -> Option<Self> {
        let delta = max * unit_noise(rng);
        Some(self + delta).filter(|value| value.is_finite())
    }

    fn add_relative_noise(self, fraction: f64, rng: &mut ChaCha8Rng) -> Option<Self> {
        let factor = fraction * unit_noise(rng);
        Some(self + self * factor).filter(|value| value.is_finite())
    }

    fn round_to(self, step: Self) -> Option<Self> {
        Some((self / step).round() * step).filter(|value| value.is_finite())
    }
}

impl Numeric for Decimal {
    fn zero() -> Self {
        Decimal::ZERO
    }

    fn is_finite(self) -> bool {
        true
    }

    fn parse_param(text: &str) -> Option<Self> {
        Decimal::from_str(text)
            .or_else(|_| Decimal::from_scientific(text))
            .ok()
    }

    fn add_absolute_noise(self, max: Self, rng: &mut ChaCha8Rng) -> Option<Self> {
        let factor = Decimal::new(
            rng.random_range(-DECIMAL_NOISE_STEPS..=DECIMAL_NOISE_STEPS),
            6,
        );
        let delta = max.checked_mul(factor)?;
        let scale = self.scale().max(max.scale());
        Some(self.checked_add(delta)?.round_dp(scale))
    }

    fn add_relative_noise(self, fraction: f64, rng: &mut ChaCha8Rng) -> Option<Self> {
        let factor = Decimal::try_from(fraction * unit_noise(rng)).ok()?;
        let delta = self.checked_mul(factor)?;
        Some(self.checked_add(delta)?.round_dp(self.scale()))
    }

    fn round_to(self, step: Self) -> Option<Self> {
        let units = self
            .checked_div(step)?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        units.checked_mul(step)
    }
}

/// Uniform factor in `[-1, 1]`. Scaling it keeps wide bounds like
/// `f64::MAX` away from the sampler, which rejects infinite spans.
fn unit_noise(rng: &mut ChaCha8Rng) -> f64 {
    rng.random_range(-1.0..=1.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoiseAmount<T> {
    /// Uniform delta in `[-max, max]`.
    Absolute(T),
    /// Uniform factor in `[-fraction, fraction]` of the value.
    Relative(f64),
}

/// Adds bounded random noise. Results that overflow the kind are rejected.
#[derive(Debug, Clone)]
pub struct NumericNoise<T> {
    amount: NoiseAmount<T>,
    seed: Option<SeedProvider<T>>,
}

impl<T: Numeric> NumericNoise<T> {
    pub fn absolute(max: T) -> Result<Self, RuleError> {
        if !max.is_finite() || !(max >= T::zero()) {
            return Err(RuleError::InvalidArgument(
                "noise bound must be a finite non-negative number".to_string(),
            ));
        }
        Ok(Self {
            amount: NoiseAmount::Absolute(max),
            seed: None,
        })
    }

    pub fn relative(fraction: f64) -> Result<Self, RuleError> {
        if !fraction.is_finite() || fraction < 0.0 {
            return Err(RuleError::InvalidArgument(
                "noise fraction must be a non-negative number".to_string(),
            ));
        }
        Ok(Self {
            amount: NoiseAmount::Relative(fraction),
            seed: None,
        })
    }

    pub fn with_seed(mut self, provider: SeedProvider<T>) -> Self {
        self.seed = Some(provider);
        self
    }

    pub fn amount(&self) -> NoiseAmount<T> {
        self.amount
    }
}

impl<T: Numeric> MaskRule<T> for NumericNoise<T> {
    fn id(&self) -> &'static str {
        "numeric.noise"
    }

    fn apply(&self, input: T) -> Result<T, RuleError> {
        let mut rng = rng_for(self.seed.as_ref(), &input);
        let noisy = match self.amount {
            NoiseAmount::Absolute(max) => input.add_absolute_noise(max, &mut rng),
            NoiseAmount::Relative(fraction) => input.add_relative_noise(fraction, &mut rng),
        };
        noisy.ok_or_else(|| RuleError::rejected(self.id(), "noise overflows the value range"))
    }

    fn as_seeded(&self) -> Option<&dyn SeededRule<T>> {
        Some(self)
    }

    fn as_seeded_mut(&mut self) -> Option<&mut dyn SeededRule<T>> {
        Some(self)
    }
}

impl<T: Numeric> SeededRule<T> for NumericNoise<T> {
    fn seed_provider(&self) -> Option<&SeedProvider<T>> {
        self.seed.as_ref()
    }

    fn set_seed_provider(&mut self, provider: Option<SeedProvider<T>>) {
        self.seed = provider;
    }
}

/// Rounds to the nearest multiple of a positive step.
#[derive(Debug, Clone)]
pub struct RoundTo<T> {
    step: T,
}

impl<T: Numeric> RoundTo<T> {
    pub fn new(step: T) -> Result<Self, RuleError> {
        if !step.is_finite() || !(step > T::zero()) {
            return Err(RuleError::InvalidArgument(
                "rounding step must be a finite positive number".to_string(),
            ));
        }
        Ok(Self { step })
    }
}

impl<T: Numeric> MaskRule<T> for RoundTo<T> {
    fn id(&self) -> &'static str {
        "numeric.round"
    }

    fn apply(&self, input: T) -> Result<T, RuleError> {
        input
            .round_to(self.step)
            .ok_or_else(|| RuleError::rejected(self.id(), "rounded value overflows"))
    }
}

/// Limits values to `[min, max]`; either bound may be open.
#[derive(Debug, Clone)]
pub struct Clamp<T> {
    min: Option<T>,
    max: Option<T>,
}

impl<T: Numeric> Clamp<T> {
    pub fn new(min: Option<T>, max: Option<T>) -> Result<Self, RuleError> {
        if let (Some(min), Some(max)) = (min, max)
            && !(min <= max)
        {
            return Err(RuleError::InvalidArgument(
                "clamp min must be <= max".to_string(),
            ));
        }
        Ok(Self { min, max })
    }
}

impl<T: Numeric> MaskRule<T> for Clamp<T> {
    fn id(&self) -> &'static str {
        "numeric.clamp"
    }

    fn apply(&self, input: T) -> Result<T, RuleError> {
        let mut value = input;
        if let Some(min) = self.min
            && value < min
        {
            value = min;
        }
        if let Some(max) = self.max
            && value > max
        {
            value = max;
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_noise_stays_in_bounds() {
        let rule = NumericNoise::absolute(5_i64)
            .expect("rule")
            .with_seed(SeedProvider::fixed(11));
        for value in [-100_i64, 0, 42, 1_000] {
            let out = rule.apply(value).expect("noise");
            assert!((out - value).abs() <= 5, "{value} -> {out}");
        }
    }

    #[test]
    fn noise_overflow_is_rejected() {
        let rejected = (0..32).find_map(|seed| {
            NumericNoise::absolute(i64::MAX)
                .expect("rule")
                .with_seed(SeedProvider::fixed(seed))
                .apply(i64::MAX)
                .err()
        });
        assert!(matches!(rejected, Some(RuleError::Rejected { .. })));
    }

    #[test]
    fn relative_noise_on_decimal_keeps_scale() {
        let rule = NumericNoise::relative(0.1)
            .expect("rule")
            .with_seed(SeedProvider::fixed(5));
        let value = Decimal::new(12_345, 2);
        let out = rule.apply(value).expect("noise");
        assert_eq!(out.scale(), 2);
        assert!((out - value).abs() <= Decimal::new(1_235, 2));
    }

    #[test]
    fn negative_bounds_are_invalid() {
        assert!(NumericNoise::absolute(-1_i64).is_err());
        assert!(NumericNoise::<f64>::relative(f64::NAN).is_err());
        assert!(RoundTo::new(0_i64).is_err());
        assert!(Clamp::new(Some(5.0), Some(1.0)).is_err());
    }

    #[test]
    fn non_finite_bounds_are_invalid() {
        for bound in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            assert!(matches!(
                NumericNoise::absolute(bound),
                Err(RuleError::InvalidArgument(_))
            ));
            assert!(matches!(RoundTo::new(bound), Err(RuleError::InvalidArgument(_))));
        }
        assert!(NumericNoise::<f64>::relative(f64::INFINITY).is_err());
    }

    #[test]
    fn widest_finite_bounds_do_not_panic() {
        let absolute = NumericNoise::absolute(f64::MAX)
            .expect("rule")
            .with_seed(SeedProvider::fixed(3));
        let relative = NumericNoise::<f64>::relative(f64::MAX)
            .expect("rule")
            .with_seed(SeedProvider::fixed(3));
        for value in [0.0, 1.0, -250.5] {
            if let Ok(out) = absolute.apply(value) {
                assert!(out.is_finite());
            }
            if let Ok(out) = relative.apply(value) {
                assert!(out.is_finite());
            }
        }
        let relative_int = NumericNoise::<i64>::relative(f64::MAX)
            .expect("rule")
            .with_seed(SeedProvider::fixed(3));
        assert!(relative_int.apply(0).is_ok());
    }

    #[test]
    fn rounding_goes_half_away_from_zero() {
        let rule = RoundTo::new(10_i64).expect("rule");
        assert_eq!(rule.apply(44), Ok(40));
        assert_eq!(rule.apply(45), Ok(50));
        assert_eq!(rule.apply(-45), Ok(-50));
        assert_eq!(rule.apply(-44), Ok(-40));

        let rule = RoundTo::new(Decimal::new(5, 2)).expect("rule");
        assert_eq!(rule.apply(Decimal::new(1_237, 2)), Ok(Decimal::new(1_235, 2)));

        let rule = RoundTo::new(0.5_f64).expect("rule");
        assert_eq!(rule.apply(2.3), Ok(2.5));
    }

    #[test]
    fn clamp_with_open_bounds() {
        let rule = Clamp::new(Some(0_i64), None).expect("rule");
        assert_eq!(rule.apply(-3), Ok(0));
        assert_eq!(rule.apply(300), Ok(300));
    }
}
