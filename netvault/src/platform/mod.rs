//! Model profiles for multi-vendor support.
//!
//! A model carries the prompt patterns, phase flags, command list and
//! timeouts the dialog engine needs for one kind of device.

mod definition;
mod registry;
pub mod vendors;

pub use definition::{Attributes, Model};
pub use registry::ModelRegistry;
