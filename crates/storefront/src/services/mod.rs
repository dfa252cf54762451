//! Application services.
//!
//! - [`cart`] - the cart aggregate service (read-modify-write with
//!   optimistic version checks)
//! - [`orders`] - order snapshot creation and the lifecycle state machine
//! - [`catalog`] - the product price oracle consulted on `add_line`
//! - [`payments`] - the payment gateway adapter used on cancellation

pub mod cart;
pub mod catalog;
pub mod orders;
pub mod payments;
