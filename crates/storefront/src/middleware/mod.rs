//! Request middleware and extractors.

pub mod auth;

pub use auth::{AuthRejection, CUSTOMER_ID_HEADER, ROLE_HEADER, RequireAdmin, RequireCustomer};
