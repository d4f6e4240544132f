//! Built-in backend: one JSON document per resource.
//!
//! Objects are collections and every other JSON value is a leaf, so a file
//! containing `{"a": 1, "g": {"b": [1, 2]}}` has a leaf `/a`, a collection
//! `/g` and a leaf `/g/b`. Files are locked while open: exclusive for modes
//! that (re)create the file, shared otherwise.

mod json;
mod mode;

pub use json::{JsonDriver, JsonStore};
pub use mode::Mode;
