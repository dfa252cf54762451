//! Explicit caller identity.
//!
//! Every service operation takes the caller as a parameter; there is no
//! ambient "current user" anywhere in the system.

use serde::{Deserialize, Serialize};

use super::id::CustomerId;
use super::status::Role;

/// The authenticated identity behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// The customer this caller acts as (admins also carry one).
    pub customer_id: CustomerId,
    /// Permission level.
    pub role: Role,
}

impl Caller {
    /// A customer caller.
    #[must_use]
    pub const fn customer(customer_id: CustomerId) -> Self {
        Self {
            customer_id,
            role: Role::Customer,
        }
    }

    /// An admin caller.
    #[must_use]
    pub const fn admin(customer_id: CustomerId) -> Self {
        Self {
            customer_id,
            role: Role::Admin,
        }
    }

    /// Whether this caller may act on an entity owned by `owner_id`.
    ///
    /// Admins bypass the ownership check.
    #[must_use]
    pub fn may_act_on(&self, owner_id: CustomerId) -> bool {
        self.role.is_admin() || self.customer_id == owner_id
    }
}
