//! Authenticated caller identity.
//!
//! Authentication happens upstream; the services only need the verified
//! user ID and email of whoever is acting.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The authenticated user performing an operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    /// User ID from the identity provider
    pub user_id: Uuid,
    /// Verified email
    pub email: String,
}

impl Actor {
    /// Create an actor.
    pub fn new(user_id: Uuid, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
        }
    }
}
