use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::AccessError;
use crate::value::{FieldValue, PropertyValue, ValueKind};

pub type Getter<R> = Box<dyn Fn(&R) -> Result<FieldValue, AccessError> + Send + Sync>;
pub type Setter<R> = Box<dyn Fn(&mut R, FieldValue) -> Result<(), AccessError> + Send + Sync>;

/// Declared shape of one property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyInfo {
    pub name: String,
    pub kind: ValueKind,
    pub nullable: bool,
    pub writable: bool,
}

impl PropertyInfo {
    /// Value staged for this property when it is excluded from the output.
    pub fn absence_value(&self) -> FieldValue {
        if self.nullable {
            FieldValue::Null
        } else {
            self.kind.default_value()
        }
    }
}

/// Getter and optional setter for one property of `R`.
pub struct PropertyDescriptor<R> {
    info: PropertyInfo,
    getter: Getter<R>,
    setter: Option<Setter<R>>,
}

impl<R> PropertyDescriptor<R> {
    /// Writable property backed by a struct field.
    pub fn field<V>(name: &str, get: fn(&R) -> &V, get_mut: fn(&mut R) -> &mut V) -> Self
    where
        R: 'static,
        V: PropertyValue + 'static,
    {
        let property = name.to_string();
        Self {
            info: PropertyInfo {
                name: name.to_string(),
                kind: V::KIND,
                nullable: V::NULLABLE,
                writable: true,
            },
            getter: Box::new(move |record| Ok(get(record).to_field())),
            setter: Some(Box::new(move |record, value| {
                let decoded = V::from_field(value).map_err(|found| AccessError::TypeMismatch {
                    property: property.clone(),
                    expected: V::KIND,
                    found: found.kind_name().to_string(),
                })?;
                *get_mut(record) = decoded;
                Ok(())
            })),
        }
    }

    /// Read-only property backed by a struct field.
    pub fn read_only_field<V>(name: &str, get: fn(&R) -> &V) -> Self
    where
        R: 'static,
        V: PropertyValue + 'static,
    {
        Self {
            info: PropertyInfo {
                name: name.to_string(),
                kind: V::KIND,
                nullable: V::NULLABLE,
                writable: false,
            },
            getter: Box::new(move |record| Ok(get(record).to_field())),
            setter: None,
        }
    }

    /// Property with arbitrary accessors, used for dynamic records.
    pub fn custom(
        info: PropertyInfo,
        getter: impl Fn(&R) -> Result<FieldValue, AccessError> + Send + Sync + 'static,
        setter: Option<Setter<R>>,
    ) -> Self {
        let info = PropertyInfo {
            writable: setter.is_some(),
            ..info
        };
        Self {
            info,
            getter: Box::new(getter),
            setter,
        }
    }

    pub fn info(&self) -> &PropertyInfo {
        &self.info
    }
}

/// A type whose properties can be enumerated, read and written by name.
///
/// Implement with [`impl_record!`](crate::impl_record) rather than by hand.
pub trait Record: Send + Sync + 'static {
    fn describe() -> Vec<PropertyDescriptor<Self>>
    where
        Self: Sized;
}

static ACCESSORS: Lazy<RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Compiled property table for one record type.
pub struct PropertyAccessor<R> {
    properties: Vec<PropertyDescriptor<R>>,
    index: HashMap<String, usize>,
}

impl<R> std::fmt::Debug for PropertyAccessor<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyAccessor")
            .field("properties", &self.properties.iter().map(|p| &p.info).collect::<Vec<_>>())
            .finish()
    }
}

impl<R> PropertyAccessor<R> {
    /// Build an accessor from descriptors. A repeated name replaces the
    /// earlier descriptor in place.
    pub fn from_descriptors(descriptors: Vec<PropertyDescriptor<R>>) -> Self {
        let mut properties: Vec<PropertyDescriptor<R>> = Vec::with_capacity(descriptors.len());
        let mut index = HashMap::with_capacity(descriptors.len());
        for descriptor in descriptors {
            match index.get(&descriptor.info.name).copied() {
                Some(position) => {
                    warn!(property = %descriptor.info.name, "duplicate property descriptor replaced");
                    properties[position] = descriptor;
                }
                None => {
                    index.insert(descriptor.info.name.clone(), properties.len());
                    properties.push(descriptor);
                }
            }
        }
        Self { properties, index }
    }

    pub fn get_value(&self, instance: &R, name: &str) -> Result<FieldValue, AccessError> {
        (self.descriptor(name)?.getter)(instance)
    }

    /// Write a property. Fails without touching the instance when the
    /// property is unknown, read-only or the value has the wrong kind.
    pub fn set_value(
        &self,
        instance: &mut R,
        name: &str,
        value: FieldValue,
    ) -> Result<(), AccessError> {
        let descriptor = self.descriptor(name)?;
        let setter = descriptor
            .setter
            .as_ref()
            .ok_or_else(|| AccessError::ReadOnly(name.to_string()))?;
        setter(instance, value)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Distinct property names in declaration order.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|property| property.info.name.as_str())
    }

    pub fn property_info(&self, name: &str) -> Result<&PropertyInfo, AccessError> {
        self.descriptor(name).map(PropertyDescriptor::info)
    }

    pub fn properties(&self) -> impl Iterator<Item = &PropertyInfo> {
        self.properties.iter().map(PropertyDescriptor::info)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    fn descriptor(&self, name: &str) -> Result<&PropertyDescriptor<R>, AccessError> {
        self.index
            .get(name)
            .map(|&position| &self.properties[position])
            .ok_or_else(|| AccessError::NotFound(name.to_string()))
    }
}

impl<R: Record> PropertyAccessor<R> {
    /// Accessor for `R`, compiled on first use and cached for the process
    /// lifetime. Concurrent first calls compile once.
    pub fn shared() -> Arc<Self> {
        let id = TypeId::of::<R>();
        {
            let cache = ACCESSORS.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(accessor) = cache.get(&id).and_then(|entry| downcast::<R>(entry)) {
                return accessor;
            }
        }

        let mut cache = ACCESSORS.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(accessor) = cache.get(&id).and_then(|entry| downcast::<R>(entry)) {
            return accessor;
        }
        let accessor = Arc::new(Self::from_descriptors(R::describe()));
        debug!(
            record = std::any::type_name::<R>(),
            properties = accessor.len(),
            "compiled property accessor"
        );
        let erased: Arc<dyn Any + Send + Sync> = accessor.clone();
        cache.insert(id, erased);
        accessor
    }
}

fn downcast<R: Record>(entry: &Arc<dyn Any + Send + Sync>) -> Option<Arc<PropertyAccessor<R>>> {
    Arc::clone(entry).downcast::<PropertyAccessor<R>>().ok()
}

/// Implement [`Record`] for a struct by listing its fields.
///
/// Each field is tagged `rw` (getter and setter) or `ro` (getter only).
/// Field types must implement [`PropertyValue`](crate::PropertyValue).
///
/// ```
/// use datamask_core::{impl_record, PropertyAccessor};
///
/// struct Patient {
///     name: String,
///     age: Option<i64>,
///     id: String,
/// }
///
/// impl_record!(Patient { name: rw, age: rw, id: ro });
///
/// let accessor = PropertyAccessor::<Patient>::shared();
/// assert!(accessor.has_property("age"));
/// ```
#[macro_export]
macro_rules! impl_record {
    ($record:ty { $($field:ident : $mode:ident),* $(,)? }) => {
        impl $crate::Record for $record {
            fn describe() -> ::std::vec::Vec<$crate::PropertyDescriptor<Self>> {
                ::std::vec![$($crate::impl_record!(@property $record, $field, $mode)),*]
            }
        }
    };
    (@property $record:ty, $field:ident, rw) => {
        $crate::PropertyDescriptor::field(
            stringify!($field),
            |record: &$record| &record.$field,
            |record: &mut $record| &mut record.$field,
        )
    };
    (@property $record:ty, $field:ident, ro) => {
        $crate::PropertyDescriptor::read_only_field(stringify!($field), |record: &$record| {
            &record.$field
        })
    };
}
