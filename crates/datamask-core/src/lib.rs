//! Core contracts for datamask.
//!
//! This crate defines the dynamic value model, the type-conversion bridge
//! between value kinds, and the compiled property-access layer that the
//! masking engine uses to read and write record properties by name.

pub mod accessor;
pub mod convert;
pub mod error;
pub mod json;
pub mod value;

pub use accessor::{PropertyAccessor, PropertyDescriptor, PropertyInfo, Record};
pub use convert::{Conversion, FnConverter, TypeConverter, TypeConverterRegistry};
pub use error::{AccessError, ConvertError};
pub use json::{JsonRecord, PropertySchema};
pub use value::{FieldType, FieldValue, PropertyValue, ValueKind};
