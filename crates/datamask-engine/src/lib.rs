//! Masking engine: binds rules to record properties, applies them through the
//! converter registry and applies the coverage policy to unbound properties.
//!
//! ```
//! use datamask_core::impl_record;
//! use datamask_engine::{CoverageMode, Masker};
//! use datamask_rules::text::Redact;
//!
//! struct Customer {
//!     name: String,
//!     age: i64,
//! }
//!
//! impl_record!(Customer { name: rw, age: rw });
//!
//! let masker = Masker::<Customer>::builder()
//!     .bind_rule("name", Redact::default())
//!     .coverage(CoverageMode::Include)
//!     .build()
//!     .unwrap();
//! let result = masker.mask(&Customer { name: "Ana".into(), age: 41 }).unwrap();
//! assert_eq!(result.masked_data(), r#"{"name":"***","age":41}"#);
//! ```

pub mod errors;
pub mod masker;
pub mod model;

pub use errors::{FieldError, MaskError};
pub use masker::{JsonMasker, Masker, MaskerBuilder, resolve_selector};
pub use model::{CoverageMode, MaskResult};
