//! Membership domain models
//!
//! A membership links one person (or one invited email address) to an
//! organization. Who the membership refers to is carried by
//! [`MembershipSubject`], so a pending row can never be mistaken for a real
//! user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{TeamError, TeamResult};
use crate::roles::OrganizationRole;

/// Lifecycle status of a membership.
///
/// `Pending` → `Active` | `Suspended` on acceptance; `Active` ↔ `Suspended`
/// only through seat reconciliation; anything → `Removed`, which is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    /// Invited, not yet accepted
    Pending,

    /// Joined and occupying a seat
    Active,

    /// Joined but not entitled to a seat
    Suspended,

    /// Removed or revoked
    Removed,
}

impl MembershipStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Removed => "removed",
        }
    }

    /// Whether a membership in this status counts as belonging to the organization.
    pub fn is_joined(&self) -> bool {
        matches!(self, Self::Active | Self::Suspended)
    }
}

/// Who a membership refers to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MembershipSubject {
    /// An invitation that has not been accepted yet
    Invited {
        /// Normalized invited email
        email: String,
    },

    /// A user who accepted
    Joined {
        /// The user's ID
        user_id: Uuid,
        /// Normalized email of the user at acceptance time
        email: String,
    },
}

impl MembershipSubject {
    /// Email the membership is bound to.
    pub fn email(&self) -> &str {
        match self {
            Self::Invited { email } | Self::Joined { email, .. } => email,
        }
    }

    /// User ID, only present once the invitation was accepted.
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Self::Invited { .. } => None,
            Self::Joined { user_id, .. } => Some(*user_id),
        }
    }
}

/// Sort direction for membership listings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ListOrder {
    /// Oldest first
    Ascending,
    /// Newest first
    Descending,
}

/// Organization membership record.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use uuid::Uuid;
/// use tenant_org::{Membership, MembershipStatus, OrganizationRole};
///
/// let org_id = Uuid::now_v7();
/// let inviter = Uuid::now_v7();
/// let membership = Membership::pending(org_id, inviter, "dev@example.com", OrganizationRole::Member, Utc::now());
/// assert_eq!(membership.status, MembershipStatus::Pending);
/// assert!(membership.user_id().is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Membership {
    /// Unique membership ID
    pub id: Uuid,

    /// Organization ID
    pub organization_id: Uuid,

    /// Invited email or joined user
    pub subject: MembershipSubject,

    /// Who issued the invitation (absent for the owner's own membership)
    pub invited_by: Option<Uuid>,

    /// Role within the organization
    pub role: OrganizationRole,

    /// Current lifecycle status
    pub status: MembershipStatus,

    /// When the invitation was issued
    pub invited_at: DateTime<Utc>,

    /// When the invitation was accepted
    pub joined_at: Option<DateTime<Utc>>,
}

impl Membership {
    /// Creates a pending membership for an invited email.
    pub fn pending(
        organization_id: Uuid,
        invited_by: Uuid,
        email: impl Into<String>,
        role: OrganizationRole,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            organization_id,
            subject: MembershipSubject::Invited {
                email: email.into(),
            },
            invited_by: Some(invited_by),
            role,
            status: MembershipStatus::Pending,
            invited_at: now,
            joined_at: None,
        }
    }

    /// Creates the active owner membership of a new organization.
    pub fn owner(organization_id: Uuid, user_id: Uuid, email: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            organization_id,
            subject: MembershipSubject::Joined {
                user_id,
                email: email.into(),
            },
            invited_by: None,
            role: OrganizationRole::Owner,
            status: MembershipStatus::Active,
            invited_at: now,
            joined_at: Some(now),
        }
    }

    /// User ID, if the membership has been accepted.
    pub fn user_id(&self) -> Option<Uuid> {
        self.subject.user_id()
    }

    /// Email the membership is bound to.
    pub fn email(&self) -> &str {
        self.subject.email()
    }

    /// Whether this is the organization owner's membership.
    pub fn is_owner(&self) -> bool {
        self.role == OrganizationRole::Owner
    }

    /// Whether this membership currently occupies a non-owner seat.
    pub fn holds_seat(&self) -> bool {
        self.status == MembershipStatus::Active && !self.is_owner()
    }

    /// Timestamp used to order listings: `invited_at` while pending, `joined_at` otherwise.
    pub fn ordering_timestamp(&self) -> DateTime<Utc> {
        match self.status {
            MembershipStatus::Pending => self.invited_at,
            _ => self.joined_at.unwrap_or(self.invited_at),
        }
    }
}

/// Normalize an email for storage and comparison (trimmed, lowercased).
///
/// Fails with a validation error when the result is not a plausible address.
///
/// # Examples
///
/// ```
/// use tenant_org::membership::normalize_email;
///
/// assert_eq!(normalize_email("  Dev@Example.COM ").unwrap(), "dev@example.com");
/// assert!(normalize_email("not-an-email").is_err());
/// ```
pub fn normalize_email(raw: &str) -> TeamResult<String> {
    let email = raw.trim().to_lowercase();
    let mut parts = email.split('@');
    let valid = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty() && !domain.is_empty() && !email.chars().any(char::is_whitespace)
        }
        _ => false,
    };
    if !valid {
        return Err(TeamError::Validation(format!("malformed email '{}'", raw.trim())));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_membership_creation() {
        let org_id = Uuid::now_v7();
        let inviter = Uuid::now_v7();
        let now = Utc::now();
        let membership = Membership::pending(org_id, inviter, "a@x.com", OrganizationRole::Viewer, now);

        assert_eq!(membership.organization_id, org_id);
        assert_eq!(membership.invited_by, Some(inviter));
        assert_eq!(membership.email(), "a@x.com");
        assert!(membership.user_id().is_none());
        assert!(membership.joined_at.is_none());
        assert_eq!(membership.ordering_timestamp(), now);
        assert!(!membership.holds_seat());
    }

    #[test]
    fn test_owner_membership() {
        let org_id = Uuid::now_v7();
        let user_id = Uuid::now_v7();
        let membership = Membership::owner(org_id, user_id, "boss@x.com", Utc::now());

        assert!(membership.is_owner());
        assert_eq!(membership.status, MembershipStatus::Active);
        assert_eq!(membership.user_id(), Some(user_id));
        // The owner never counts against the plan
        assert!(!membership.holds_seat());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("A@X.com").unwrap(), "a@x.com");
        assert!(normalize_email("@x.com").is_err());
        assert!(normalize_email("a@").is_err());
        assert!(normalize_email("a@b@c").is_err());
        assert!(normalize_email("a b@x.com").is_err());
    }

    #[test]
    fn test_subject_serde_tag() {
        let subject = MembershipSubject::Invited {
            email: "a@x.com".to_string(),
        };
        let json = serde_json::to_value(&subject).unwrap();
        assert_eq!(json["kind"], "invited");
    }

    #[test]
    fn test_status_is_joined() {
        assert!(MembershipStatus::Active.is_joined());
        assert!(MembershipStatus::Suspended.is_joined());
        assert!(!MembershipStatus::Pending.is_joined());
        assert!(!MembershipStatus::Removed.is_joined());
    }
}
