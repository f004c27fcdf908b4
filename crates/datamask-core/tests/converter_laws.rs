//! Round-trip law for the built-in converters: for every value `s` in the
//! converter's domain, `convert_back(convert(s)) == s`.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use datamask_core::{FieldType, FieldValue, TypeConverterRegistry, ValueKind};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn assert_round_trip<S: FieldType + PartialEq + std::fmt::Debug>(value: S) {
    let registry = TypeConverterRegistry::global();
    let converter = registry.get::<S, String>().expect("builtin converter");
    let text = converter.convert(&value).expect("convert");
    let back = converter.convert_back(&text).expect("convert back");
    assert_eq!(back, value, "round trip through {text:?}");

    let dynamic = registry
        .convert(value.clone().into_field(), ValueKind::Text)
        .expect("dynamic convert");
    assert_eq!(
        registry.convert(dynamic, S::KIND).expect("dynamic back"),
        value.into_field()
    );
}

fn date_in(years: std::ops::RangeInclusive<i32>) -> impl Strategy<Value = NaiveDate> {
    (years, 1u32..=12, 1u32..=28)
        .prop_map(|(year, month, day)| NaiveDate::from_ymd_opt(year, month, day).unwrap())
}

fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    date_in(NaiveDate::MIN.year()..=NaiveDate::MAX.year())
}

// One year of margin at each end so every offset stays representable in UTC.
fn date_time_strategy() -> impl Strategy<Value = DateTime<FixedOffset>> {
    (
        date_in(NaiveDate::MIN.year() + 1..=NaiveDate::MAX.year() - 1),
        0u32..86_400,
        0u32..1_000_000_000,
        -14i32 * 60..=14 * 60,
    )
        .prop_map(|(date, seconds, nanos, offset_minutes)| {
            let time = chrono::NaiveTime::from_num_seconds_from_midnight_opt(seconds, nanos).unwrap();
            let naive = NaiveDateTime::new(date, time);
            let offset = FixedOffset::east_opt(offset_minutes * 60).unwrap();
            offset.from_local_datetime(&naive).single().unwrap()
        })
}

proptest! {
    #[test]
    fn int_round_trips(value in any::<i64>()) {
        assert_round_trip(value);
    }

    #[test]
    fn decimal_round_trips_with_scale(mantissa in any::<i64>(), scale in 0u32..=28) {
        assert_round_trip(Decimal::new(mantissa, scale));
    }

    #[test]
    fn decimal_text_keeps_trailing_zeros(mantissa in any::<i32>(), scale in 1u32..=6) {
        let value = Decimal::new(i64::from(mantissa) * 10, scale);
        let registry = TypeConverterRegistry::global();
        let converter = registry.get::<Decimal, String>().expect("builtin converter");
        let back = converter.convert_back(&converter.convert(&value).unwrap()).unwrap();
        prop_assert_eq!(back.scale(), value.scale());
    }

    #[test]
    fn finite_double_round_trips(value in any::<f64>().prop_filter("finite", |v| v.is_finite())) {
        assert_round_trip(value);
    }

    #[test]
    fn date_round_trips(value in date_strategy()) {
        assert_round_trip(value);
    }

    #[test]
    fn date_time_offset_round_trips(value in date_time_strategy()) {
        let registry = TypeConverterRegistry::global();
        let converter = registry.get::<DateTime<FixedOffset>, String>().unwrap();
        let back = converter.convert_back(&converter.convert(&value).unwrap()).unwrap();
        prop_assert_eq!(back, value);
        prop_assert_eq!(back.offset(), value.offset());
    }
}

#[test]
fn signed_years_round_trip() {
    let offset = FixedOffset::east_opt(-3 * 3600).unwrap();
    for year in [-1, 0, 10_000, NaiveDate::MIN.year() + 1, NaiveDate::MAX.year() - 1] {
        let naive = NaiveDate::from_ymd_opt(year, 6, 15)
            .unwrap()
            .and_hms_nano_opt(8, 30, 5, 120_000_000)
            .unwrap();
        assert_round_trip(offset.from_local_datetime(&naive).single().unwrap());
        assert_round_trip(naive.date());
    }
    assert_round_trip(NaiveDate::MIN);
    assert_round_trip(NaiveDate::MAX);
}

#[test]
fn null_passes_through_any_conversion() {
    let registry = TypeConverterRegistry::global();
    assert_eq!(
        registry.convert(FieldValue::Null, ValueKind::Int),
        Ok(FieldValue::Null)
    );
}
