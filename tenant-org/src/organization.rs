//! Organization domain models
//!
//! Organizations are the tenant boundary: every membership, invitation and
//! seat count is scoped to exactly one organization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An organization represents a tenant in the multi-tenant system.
///
/// # Examples
///
/// ```
/// use uuid::Uuid;
/// use tenant_org::Organization;
///
/// let owner_id = Uuid::now_v7();
/// let org = Organization::new("Acme Corp", "acme-corp", owner_id);
/// assert_eq!(org.name, "Acme Corp");
/// assert_eq!(org.owner_id, owner_id);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    /// Unique identifier for the organization
    pub id: Uuid,

    /// Human-readable name
    pub name: String,

    /// URL-friendly slug (unique across platform)
    pub slug: String,

    /// Owner user ID
    pub owner_id: Uuid,

    /// When the organization was created
    pub created_at: DateTime<Utc>,

    /// When the organization was last updated
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    /// Creates a new organization owned by `owner_id`.
    pub fn new(name: impl Into<String>, slug: impl Into<String>, owner_id: Uuid) -> Self {
        Self::created_at(name, slug, owner_id, Utc::now())
    }

    /// Creates a new organization with an explicit creation timestamp.
    pub fn created_at(
        name: impl Into<String>,
        slug: impl Into<String>,
        owner_id: Uuid,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            slug: slug.into(),
            owner_id,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_organization_creation() {
        let owner_id = Uuid::now_v7();
        let org = Organization::new("Acme Corp", "acme-corp", owner_id);

        assert_eq!(org.name, "Acme Corp");
        assert_eq!(org.slug, "acme-corp");
        assert_eq!(org.owner_id, owner_id);
        assert_eq!(org.created_at, org.updated_at);
    }
}
