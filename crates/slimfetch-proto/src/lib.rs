//! Boundary types shared between slimfetch and the query-language layer.
//!
//! # Modules
//!
//! - [`value`] - Runtime values used for keys and scalar columns
//! - [`selection`] - Field-selection trees describing what a caller asked for
//! - [`result`] - Projected records carrying exactly the selected shape
//!
//! `Value` derives `rkyv::Archive` alongside serde so it can be stored
//! directly; projected records serialize through serde only.

pub mod result;
pub mod selection;
pub mod value;

pub use result::{FieldValue, ProjectedRecord};
pub use selection::{SelectedField, SelectionSet};
pub use value::Value;
