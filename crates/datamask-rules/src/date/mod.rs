//! Date and timestamp rules.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeDelta};
use rand::Rng;

use crate::errors::RuleError;
use crate::rule::{MaskRule, SeededRule};
use crate::seed::{SeedProvider, rng_for};

/// Upper bound for shift windows, roughly ten thousand years.
pub const MAX_SHIFT_DAYS: i64 = 3_650_000;

/// Moves a date by a random number of days in `[-max_days, max_days]`.
#[derive(Debug, Clone)]
pub struct DateShift {
    max_days: i64,
    seed: Option<SeedProvider<NaiveDate>>,
}

impl DateShift {
    pub fn new(max_days: i64) -> Result<Self, RuleError> {
        if !(0..=MAX_SHIFT_DAYS).contains(&max_days) {
            return Err(RuleError::InvalidArgument(format!(
                "max_days must be within 0..={MAX_SHIFT_DAYS}"
            )));
        }
        Ok(Self {
            max_days,
            seed: None,
        })
    }

    pub fn with_seed(mut self, provider: SeedProvider<NaiveDate>) -> Self {
        self.seed = Some(provider);
        self
    }
}

impl MaskRule<NaiveDate> for DateShift {
    fn id(&self) -> &'static str {
        "date.shift"
    }

    fn apply(&self, input: NaiveDate) -> Result<NaiveDate, RuleError> {
        let mut rng = rng_for(self.seed.as_ref(), &input);
        let days = rng.random_range(-self.max_days..=self.max_days);
        TimeDelta::try_days(days)
            .and_then(|delta| input.checked_add_signed(delta))
            .ok_or_else(|| RuleError::rejected(self.id(), "shifted date out of range"))
    }

    fn as_seeded(&self) -> Option<&dyn SeededRule<NaiveDate>> {
        Some(self)
    }

    fn as_seeded_mut(&mut self) -> Option<&mut dyn SeededRule<NaiveDate>> {
        Some(self)
    }
}

impl SeededRule<NaiveDate> for DateShift {
    fn seed_provider(&self) -> Option<&SeedProvider<NaiveDate>> {
        self.seed.as_ref()
    }

    fn set_seed_provider(&mut self, provider: Option<SeedProvider<NaiveDate>>) {
        self.seed = provider;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePrecision {
    Year,
    Month,
}

impl DatePrecision {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "year" => Some(DatePrecision::Year),
            "month" => Some(DatePrecision::Month),
            _ => None,
        }
    }
}

/// Drops the day (and for `Year`, the month) of a date.
#[derive(Debug, Clone)]
pub struct DateTruncate {
    precision: DatePrecision,
}

impl DateTruncate {
    pub fn new(precision: DatePrecision) -> Self {
        Self { precision }
    }
}

impl MaskRule<NaiveDate> for DateTruncate {
    fn id(&self) -> &'static str {
        "date.truncate"
    }

    fn apply(&self, input: NaiveDate) -> Result<NaiveDate, RuleError> {
        let month = match self.precision {
            DatePrecision::Year => 1,
            DatePrecision::Month => input.month(),
        };
        NaiveDate::from_ymd_opt(input.year(), month, 1)
            .ok_or_else(|| RuleError::rejected(self.id(), "date out of range"))
    }
}

/// Moves a timestamp by a random number of seconds in
/// `[-max_seconds, max_seconds]`, keeping its offset.
#[derive(Debug, Clone)]
pub struct DateTimeShift {
    max_seconds: i64,
    seed: Option<SeedProvider<DateTime<FixedOffset>>>,
}

impl DateTimeShift {
    pub fn new(max_seconds: i64) -> Result<Self, RuleError> {
        let limit = MAX_SHIFT_DAYS * 86_400;
        if !(0..=limit).contains(&max_seconds) {
            return Err(RuleError::InvalidArgument(format!(
                "max_seconds must be within 0..={limit}"
            )));
        }
        Ok(Self {
            max_seconds,
            seed: None,
        })
    }

    pub fn with_seed(mut self, provider: SeedProvider<DateTime<FixedOffset>>) -> Self {
        self.seed = Some(provider);
        self
    }
}

impl MaskRule<DateTime<FixedOffset>> for DateTimeShift {
    fn id(&self) -> &'static str {
        "datetime.shift"
    }

    fn apply(&self, input: DateTime<FixedOffset>) -> Result<DateTime<FixedOffset>, RuleError> {
        let mut rng = rng_for(self.seed.as_ref(), &input);
        let seconds = rng.random_range(-self.max_seconds..=self.max_seconds);
        TimeDelta::try_seconds(seconds)
            .and_then(|delta| input.checked_add_signed(delta))
            .ok_or_else(|| RuleError::rejected(self.id(), "shifted timestamp out of range"))
    }

    fn as_seeded(&self) -> Option<&dyn SeededRule<DateTime<FixedOffset>>> {
        Some(self)
    }

    fn as_seeded_mut(&mut self) -> Option<&mut dyn SeededRule<DateTime<FixedOffset>>> {
        Some(self)
    }
}

impl SeededRule<DateTime<FixedOffset>> for DateTimeShift {
    fn seed_provider(&self) -> Option<&SeedProvider<DateTime<FixedOffset>>> {
        self.seed.as_ref()
    }

    fn set_seed_provider(&mut self, provider: Option<SeedProvider<DateTime<FixedOffset>>>) {
        self.seed = provider;
    }
}
