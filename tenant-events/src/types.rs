//! Membership event types
//!
//! Every committed change to an organization's roster is described by a typed
//! [`TeamEvent`] and travels on the bus inside the generic [`Event`] envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tenant_org::{MembershipStatus, OrganizationRole, SeatLimit};
use uuid::Uuid;

use crate::bus::{EventBusError, EventBusResult};

/// Topic namespace shared by all membership events.
pub const TOPIC_PREFIX: &str = "team";

/// Event envelope.
///
/// Carries routing context around a JSON payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event ID
    pub id: Uuid,

    /// Event type (e.g., "member.joined", "seats.reconciled")
    pub event_type: String,

    /// Timestamp when event was created
    pub timestamp: DateTime<Utc>,

    /// Organization context
    pub org_id: Option<Uuid>,

    /// User who triggered the event
    pub user_id: Option<Uuid>,

    /// Event version for schema evolution
    pub version: u32,

    /// Event payload
    pub payload: serde_json::Value,
}

impl Event {
    /// Create a new event.
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::now_v7(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            org_id: None,
            user_id: None,
            version: 1,
            payload,
        }
    }

    /// Set organization context.
    pub fn with_org(mut self, org_id: Uuid) -> Self {
        self.org_id = Some(org_id);
        self
    }

    /// Set user context.
    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Get the topic for this event: `team.{event_type}`.
    pub fn topic(&self) -> String {
        format!("{}.{}", TOPIC_PREFIX, self.event_type)
    }
}

/// Membership and seat events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TeamEvent {
    /// An invitation was issued
    MemberInvited {
        membership_id: Uuid,
        email: String,
        role: OrganizationRole,
        invited_by: Uuid,
        organization_name: String,
        accept_url: String,
        expires_at: DateTime<Utc>,
    },
    /// An invitation was re-issued with a new token
    InvitationResent {
        membership_id: Uuid,
        email: String,
        accept_url: String,
        expires_at: DateTime<Utc>,
    },
    /// An invitation and its pending membership were revoked
    InvitationRevoked {
        membership_id: Uuid,
        email: String,
        revoked_by: Uuid,
    },
    /// An invitation was accepted
    MemberJoined {
        membership_id: Uuid,
        user_id: Uuid,
        email: String,
        inviter_email: String,
        role: OrganizationRole,
        status: MembershipStatus,
    },
    /// A member's role changed
    RoleChanged {
        membership_id: Uuid,
        from: OrganizationRole,
        to: OrganizationRole,
        changed_by: Uuid,
    },
    /// A member was removed
    MemberRemoved { membership_id: Uuid, removed_by: Uuid },
    /// A suspended member was manually given a seat back
    MemberReactivated {
        membership_id: Uuid,
        reactivated_by: Uuid,
    },
    /// Seat statuses were adjusted to the plan limit
    SeatsReconciled {
        limit: SeatLimit,
        suspended: Vec<Uuid>,
        reinstated: Vec<Uuid>,
        active_seats: u32,
    },
}

impl TeamEvent {
    /// Event type string used in the topic.
    pub fn event_type(&self) -> &'static str {
        match self {
            TeamEvent::MemberInvited { .. } => "member.invited",
            TeamEvent::InvitationResent { .. } => "member.invitation_resent",
            TeamEvent::InvitationRevoked { .. } => "member.invitation_revoked",
            TeamEvent::MemberJoined { .. } => "member.joined",
            TeamEvent::RoleChanged { .. } => "member.role_changed",
            TeamEvent::MemberRemoved { .. } => "member.removed",
            TeamEvent::MemberReactivated { .. } => "member.reactivated",
            TeamEvent::SeatsReconciled { .. } => "seats.reconciled",
        }
    }

    /// Wrap into a generic event scoped to `organization_id`.
    pub fn to_event(&self, organization_id: Uuid) -> EventBusResult<Event> {
        let payload = serde_json::to_value(self)
            .map_err(|e| EventBusError::SerializationError(e.to_string()))?;
        Ok(Event::new(self.event_type(), payload).with_org(organization_id))
    }
}
