use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, FixedOffset, NaiveDate};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::ConvertError;
use crate::value::{
    DATE_FORMAT, FieldType, FieldValue, ValueKind, format_date_time, parse_date_time,
};

/// Bidirectional bridge between two value kinds.
///
/// Implementations must be deterministic and round-trip exact over their
/// declared domain: `convert_back(&convert(&s)?)? == s`.
pub trait TypeConverter<S, T>: Send + Sync {
    fn convert(&self, value: &S) -> Result<T, ConvertError>;

    fn convert_back(&self, value: &T) -> Result<S, ConvertError>;
}

/// Converter assembled from a pair of functions.
pub struct FnConverter<S, T> {
    forward: Box<dyn Fn(&S) -> Result<T, ConvertError> + Send + Sync>,
    backward: Box<dyn Fn(&T) -> Result<S, ConvertError> + Send + Sync>,
}

impl<S, T> FnConverter<S, T> {
    pub fn new(
        forward: impl Fn(&S) -> Result<T, ConvertError> + Send + Sync + 'static,
        backward: impl Fn(&T) -> Result<S, ConvertError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            forward: Box::new(forward),
            backward: Box::new(backward),
        }
    }
}

impl<S, T> TypeConverter<S, T> for FnConverter<S, T> {
    fn convert(&self, value: &S) -> Result<T, ConvertError> {
        (self.forward)(value)
    }

    fn convert_back(&self, value: &T) -> Result<S, ConvertError> {
        (self.backward)(value)
    }
}

trait ErasedConverter: Send + Sync {
    fn forward(&self, value: FieldValue) -> Result<FieldValue, ConvertError>;

    fn backward(&self, value: FieldValue) -> Result<FieldValue, ConvertError>;
}

struct Erased<S, T> {
    inner: Arc<dyn TypeConverter<S, T>>,
    _kinds: PhantomData<fn(S) -> T>,
}

impl<S: FieldType, T: FieldType> ErasedConverter for Erased<S, T> {
    fn forward(&self, value: FieldValue) -> Result<FieldValue, ConvertError> {
        let source = extract::<S>(value)?;
        self.inner.convert(&source).map(FieldType::into_field)
    }

    fn backward(&self, value: FieldValue) -> Result<FieldValue, ConvertError> {
        let target = extract::<T>(value)?;
        self.inner.convert_back(&target).map(FieldType::into_field)
    }
}

fn extract<V: FieldType>(value: FieldValue) -> Result<V, ConvertError> {
    V::from_field(value).map_err(|other| ConvertError::KindMismatch {
        expected: V::KIND,
        found: other.kind_name().to_string(),
    })
}

/// A bridge between two kinds resolved once from a registry.
///
/// Holds the converter itself, so applying it never touches the registry
/// lock. Converters registered after resolution are not seen.
#[derive(Clone)]
pub struct Conversion {
    from: ValueKind,
    to: ValueKind,
    route: Route,
}

#[derive(Clone)]
enum Route {
    Identity,
    Forward(Arc<dyn ErasedConverter>),
    Backward(Arc<dyn ErasedConverter>),
}

impl Conversion {
    pub fn from_kind(&self) -> ValueKind {
        self.from
    }

    pub fn to_kind(&self) -> ValueKind {
        self.to
    }

    /// Convert `value`; `Null` passes through untouched.
    pub fn apply(&self, value: FieldValue) -> Result<FieldValue, ConvertError> {
        if value.is_null() {
            return Ok(value);
        }
        match &self.route {
            Route::Identity => Ok(value),
            Route::Forward(converter) => converter.forward(value),
            Route::Backward(converter) => converter.backward(value),
        }
    }
}

impl std::fmt::Debug for Conversion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let route = match self.route {
            Route::Identity => "identity",
            Route::Forward(_) => "forward",
            Route::Backward(_) => "backward",
        };
        f.debug_struct("Conversion")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("route", &route)
            .finish()
    }
}

#[derive(Clone)]
struct Entry {
    erased: Arc<dyn ErasedConverter>,
    typed: Arc<dyn Any + Send + Sync>,
}

static GLOBAL: Lazy<Arc<TypeConverterRegistry>> =
    Lazy::new(|| Arc::new(TypeConverterRegistry::with_builtins()));

/// Converters keyed by ordered `(source, target)` kind pairs.
///
/// Reads share a lock; registration takes the write lock, so concurrent
/// registrations of the same pair are serialized and the last one wins.
/// Hot paths call [`resolve`](Self::resolve) once and keep the
/// [`Conversion`].
#[derive(Default)]
pub struct TypeConverterRegistry {
    converters: RwLock<HashMap<(ValueKind, ValueKind), Entry>>,
}

impl std::fmt::Debug for TypeConverterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let converters = self.converters.read().unwrap_or_else(PoisonError::into_inner);
        let mut pairs: Vec<_> = converters.keys().copied().collect();
        pairs.sort();
        f.debug_struct("TypeConverterRegistry")
            .field("pairs", &pairs)
            .finish()
    }
}

impl TypeConverterRegistry {
    /// Registry without any converter.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in `<kind> <-> text` bridges.
    pub fn with_builtins() -> Self {
        let registry = Self::empty();
        register_builtins(&registry);
        registry
    }

    /// Process-wide registry, built with the built-ins on first use.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    /// Register a converter, replacing any converter for the same ordered pair.
    pub fn register<S, T>(&self, converter: impl TypeConverter<S, T> + 'static)
    where
        S: FieldType,
        T: FieldType,
    {
        let typed: Arc<dyn TypeConverter<S, T>> = Arc::new(converter);
        let entry = Entry {
            erased: Arc::new(Erased {
                inner: Arc::clone(&typed),
                _kinds: PhantomData,
            }),
            typed: Arc::new(typed),
        };
        let mut converters = self.converters.write().unwrap_or_else(PoisonError::into_inner);
        if converters.insert((S::KIND, T::KIND), entry).is_some() {
            debug!(from = %S::KIND, to = %T::KIND, "replaced type converter");
        }
    }

    pub fn get<S, T>(&self) -> Option<Arc<dyn TypeConverter<S, T>>>
    where
        S: FieldType,
        T: FieldType,
    {
        let entry = self.entry(S::KIND, T::KIND)?;
        entry
            .typed
            .downcast_ref::<Arc<dyn TypeConverter<S, T>>>()
            .cloned()
    }

    pub fn has_converter<S, T>(&self) -> bool
    where
        S: FieldType,
        T: FieldType,
    {
        self.get::<S, T>().is_some()
    }

    /// Whether a value of kind `from` can be bridged to kind `to`, either
    /// directly or through the reverse pair's `convert_back`.
    pub fn supports(&self, from: ValueKind, to: ValueKind) -> bool {
        from == to || self.entry(from, to).is_some() || self.entry(to, from).is_some()
    }

    /// Bridge from `from` to `to`: identity for equal kinds, then the direct
    /// pair, then the reverse pair's `convert_back`.
    pub fn resolve(&self, from: ValueKind, to: ValueKind) -> Option<Conversion> {
        let route = if from == to {
            Route::Identity
        } else if let Some(entry) = self.entry(from, to) {
            Route::Forward(entry.erased)
        } else {
            Route::Backward(self.entry(to, from)?.erased)
        };
        Some(Conversion { from, to, route })
    }

    /// Convert a dynamic value to `target`. `Null` and same-kind values pass
    /// through untouched.
    pub fn convert(&self, value: FieldValue, target: ValueKind) -> Result<FieldValue, ConvertError> {
        let Some(source) = value.kind() else {
            return Ok(value);
        };
        self.resolve(source, target)
            .ok_or(ConvertError::NoConverter {
                from: source,
                to: target,
            })?
            .apply(value)
    }

    fn entry(&self, from: ValueKind, to: ValueKind) -> Option<Entry> {
        let converters = self.converters.read().unwrap_or_else(PoisonError::into_inner);
        converters.get(&(from, to)).cloned()
    }
}

fn parse_error(kind: ValueKind, value: &str) -> ConvertError {
    ConvertError::Parse {
        kind,
        value: value.to_string(),
    }
}

fn register_builtins(registry: &TypeConverterRegistry) {
    registry.register(FnConverter::<i64, String>::new(
        |value| Ok(value.to_string()),
        |text| {
            text.trim()
                .parse::<i64>()
                .map_err(|_| parse_error(ValueKind::Int, text))
        },
    ));
    // Decimal keeps its scale through to_string/parse, so "1.50" stays "1.50".
    registry.register(FnConverter::<Decimal, String>::new(
        |value| Ok(value.to_string()),
        |text| {
            text.trim()
                .parse::<Decimal>()
                .map_err(|_| parse_error(ValueKind::Decimal, text))
        },
    ));
    // f64 Display is the shortest representation that parses back to the same bits.
    registry.register(FnConverter::<f64, String>::new(
        |value| Ok(value.to_string()),
        |text| {
            text.trim()
                .parse::<f64>()
                .map_err(|_| parse_error(ValueKind::Double, text))
        },
    ));
    registry.register(FnConverter::<NaiveDate, String>::new(
        |value| Ok(value.format(DATE_FORMAT).to_string()),
        |text| {
            NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
                .map_err(|_| parse_error(ValueKind::Date, text))
        },
    ));
    registry.register(FnConverter::<DateTime<FixedOffset>, String>::new(
        |value| Ok(format_date_time(value)),
        |text| {
            parse_date_time(text.trim())
                .ok_or_else(|| parse_error(ValueKind::DateTimeOffset, text))
        },
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_cover_every_kind_except_bool() {
        let registry = TypeConverterRegistry::with_builtins();
        assert!(registry.has_converter::<i64, String>());
        assert!(registry.has_converter::<Decimal, String>());
        assert!(registry.has_converter::<f64, String>());
        assert!(registry.has_converter::<NaiveDate, String>());
        assert!(registry.has_converter::<DateTime<FixedOffset>, String>());
        assert!(!registry.supports(ValueKind::Bool, ValueKind::Text));
    }

    #[test]
    fn convert_uses_reverse_pair_for_text_to_kind() {
        let registry = TypeConverterRegistry::with_builtins();
        let text = registry
            .convert(FieldValue::Int(31), ValueKind::Text)
            .expect("int to text");
        assert_eq!(text, FieldValue::Text("31".to_string()));
        let back = registry.convert(text, ValueKind::Int).expect("text to int");
        assert_eq!(back, FieldValue::Int(31));
    }

    #[test]
    fn missing_pair_reports_no_converter() {
        let registry = TypeConverterRegistry::with_builtins();
        let err = registry
            .convert(FieldValue::Bool(true), ValueKind::Text)
            .expect_err("no bool converter");
        assert_eq!(
            err,
            ConvertError::NoConverter {
                from: ValueKind::Bool,
                to: ValueKind::Text,
            }
        );
    }

    #[test]
    fn unparsable_text_is_an_error_not_a_truncation() {
        let registry = TypeConverterRegistry::with_builtins();
        let err = registry
            .convert(FieldValue::Text("4x2".to_string()), ValueKind::Int)
            .expect_err("not an int");
        assert!(matches!(err, ConvertError::Parse { kind: ValueKind::Int, .. }));
    }

    #[test]
    fn register_overwrites_existing_pair() {
        let registry = TypeConverterRegistry::with_builtins();
        registry.register(FnConverter::<bool, String>::new(
            |value| Ok(if *value { "yes" } else { "no" }.to_string()),
            |text| Ok(text == "yes"),
        ));
        registry.register(FnConverter::<bool, String>::new(
            |value| Ok(if *value { "Y" } else { "N" }.to_string()),
            |text| Ok(text == "Y"),
        ));
        let converter = registry.get::<bool, String>().expect("registered");
        assert_eq!(converter.convert(&true).expect("convert"), "Y");
        assert_eq!(
            registry.convert(FieldValue::Text("Y".into()), ValueKind::Bool),
            Ok(FieldValue::Bool(true))
        );
    }

    #[test]
    fn resolved_conversion_outlives_registry_changes() {
        let registry = TypeConverterRegistry::with_builtins();
        let to_text = registry.resolve(ValueKind::Int, ValueKind::Text).expect("forward");
        let to_int = registry.resolve(ValueKind::Text, ValueKind::Int).expect("reverse");
        assert!(registry.resolve(ValueKind::Bool, ValueKind::Text).is_none());
        let identity = registry.resolve(ValueKind::Bool, ValueKind::Bool).expect("identity");
        assert_eq!(identity.apply(FieldValue::Bool(true)), Ok(FieldValue::Bool(true)));

        registry.register(FnConverter::<i64, String>::new(
            |_| Ok("replaced".to_string()),
            |_| Ok(0),
        ));
        assert_eq!(to_text.apply(FieldValue::Int(7)), Ok(FieldValue::Text("7".to_string())));
        assert_eq!(to_int.apply(FieldValue::Text("12".to_string())), Ok(FieldValue::Int(12)));
        assert_eq!(to_int.apply(FieldValue::Null), Ok(FieldValue::Null));
        assert_eq!(
            registry.convert(FieldValue::Int(7), ValueKind::Text),
            Ok(FieldValue::Text("replaced".to_string()))
        );
    }

    #[test]
    fn global_registry_is_shared() {
        let first = TypeConverterRegistry::global();
        let second = TypeConverterRegistry::global();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
