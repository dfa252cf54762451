//! Core types for Sundrop.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod caller;
pub mod id;
pub mod options;
pub mod price;
pub mod status;

pub use caller::Caller;
pub use id::*;
pub use options::{Color, Size};
pub use price::{CurrencyCode, Price};
pub use status::*;
