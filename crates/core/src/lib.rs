//! Sundrop Core - Domain library for the cart and order engine.
//!
//! This crate provides the types and pure domain logic used by the
//! storefront service:
//! - The cart aggregate: line merging, quantity updates, and the
//!   server-side total invariant
//! - The order snapshot: immutable copies of cart lines frozen at
//!   purchase time
//! - The order lifecycle state machine over `OrderStatus` and
//!   `PaymentStatus`
//!
//! # Architecture
//!
//! The core crate contains only types and domain logic - no I/O, no
//! storage access, no HTTP clients. Every operation here is a pure
//! state transformation; persistence and gateway calls live in the
//! storefront crate.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, statuses, and variant options
//! - [`cart`] - The cart aggregate and its total invariant
//! - [`order`] - Order snapshots and lifecycle transitions

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod order;
pub mod types;

pub use cart::*;
pub use order::*;
pub use types::*;
