//! Invitation domain models
//!
//! An invitation is the single-use credential bound to one pending membership.
//! Only a digest of the token is kept; the raw token is handed out once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::roles::OrganizationRole;

/// Invitation bound 1:1 to a pending membership.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Invitation {
    /// Unique invitation ID
    pub id: Uuid,

    /// Organization ID
    pub organization_id: Uuid,

    /// The pending membership this invitation activates
    pub membership_id: Uuid,

    /// Normalized invited email
    pub email: String,

    /// Role granted on acceptance
    pub role: OrganizationRole,

    /// Digest of the opaque token
    #[serde(skip_serializing, default)]
    pub token_hash: String,

    /// Who sent the invitation
    pub invited_by: Uuid,

    /// Inviter's email, used for the acceptance notice
    pub inviter_email: String,

    /// When the invitation (or its latest resend) was issued
    pub created_at: DateTime<Utc>,

    /// When the token stops being accepted
    pub expires_at: DateTime<Utc>,
}

impl Invitation {
    /// Check whether the invitation is expired at `now`.
    ///
    /// An invitation is still accepted at exactly `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Check whether the invitation is live at `now`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired_at(now)
    }

    /// Summary suitable for API responses; never includes the token.
    pub fn summary(&self, now: DateTime<Utc>) -> InvitationSummary {
        InvitationSummary {
            id: self.id,
            organization_id: self.organization_id,
            membership_id: self.membership_id,
            email: self.email.clone(),
            role: self.role,
            invited_by: self.invited_by,
            created_at: self.created_at,
            expires_at: self.expires_at,
            is_expired: self.is_expired_at(now),
        }
    }
}

/// Invitation view for list displays and invite responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvitationSummary {
    /// Invitation ID
    pub id: Uuid,
    /// Organization ID
    pub organization_id: Uuid,
    /// Pending membership ID
    pub membership_id: Uuid,
    /// Invited email
    pub email: String,
    /// Role granted on acceptance
    pub role: OrganizationRole,
    /// Inviter user ID
    pub invited_by: Uuid,
    /// Issue time
    pub created_at: DateTime<Utc>,
    /// Expiry time
    pub expires_at: DateTime<Utc>,
    /// Whether the invitation had expired when the summary was built
    pub is_expired: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn invitation(expires_at: DateTime<Utc>) -> Invitation {
        Invitation {
            id: Uuid::now_v7(),
            organization_id: Uuid::now_v7(),
            membership_id: Uuid::now_v7(),
            email: "a@x.com".to_string(),
            role: OrganizationRole::Member,
            token_hash: "digest".to_string(),
            invited_by: Uuid::now_v7(),
            inviter_email: "owner@x.com".to_string(),
            created_at: expires_at - Duration::days(7),
            expires_at,
        }
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let inv = invitation(now);
        assert!(inv.is_live_at(now));
        assert!(inv.is_expired_at(now + Duration::seconds(1)));
    }

    #[test]
    fn test_summary_hides_token() {
        let now = Utc::now();
        let inv = invitation(now + Duration::days(1));
        let json = serde_json::to_value(&inv).unwrap();
        assert!(json.get("token_hash").is_none());

        let summary = inv.summary(now);
        assert!(!summary.is_expired);
        assert_eq!(summary.membership_id, inv.membership_id);
    }
}
