//! Outbound notifications and event publication.
//!
//! Both are best-effort: they run after the roster transaction has committed
//! and a failure is logged, never propagated.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tenant_events::{EventBus, TeamEvent};
use tenant_org::{Membership, MembershipStatus, OrganizationRole, SeatLimit};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Notification delivery errors.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The delivery channel rejected or dropped the message
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Request to email an invitation (or a resent one).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvitationNotice {
    /// Organization ID
    pub organization_id: Uuid,
    /// Pending membership ID
    pub membership_id: Uuid,
    /// Recipient
    pub email: String,
    /// Inviter user ID
    pub inviter_id: Uuid,
    /// Inviter email, shown to the recipient
    pub inviter_email: String,
    /// Organization display name
    pub organization_name: String,
    /// Role offered
    pub role: OrganizationRole,
    /// Link carrying the raw token
    pub accept_url: String,
    /// Token expiry
    pub expires_at: DateTime<Utc>,
    /// Whether this replaces an earlier invitation
    pub is_resend: bool,
}

/// Request to tell the inviter their invitation was accepted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AcceptanceNotice {
    /// Organization ID
    pub organization_id: Uuid,
    /// Membership ID
    pub membership_id: Uuid,
    /// Recipient
    pub inviter_email: String,
    /// Who accepted
    pub accepter_email: String,
    /// Organization display name
    pub organization_name: String,
    /// Role held
    pub role: OrganizationRole,
    /// Whether the new member got a seat
    pub status: MembershipStatus,
}

/// Summary of a reconciliation that changed seat assignments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatChangeNotice {
    /// Organization ID
    pub organization_id: Uuid,
    /// Organization display name
    pub organization_name: String,
    /// Limit the roster was reconciled to
    pub limit: SeatLimit,
    /// Members who lost their seat
    pub suspended: Vec<Membership>,
    /// Members who got their seat back
    pub reinstated: Vec<Membership>,
}

/// Outbound notification channel (email, marketing platform, ...).
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver an invitation.
    async fn send_invitation(&self, notice: &InvitationNotice) -> Result<(), NotifyError>;

    /// Tell the inviter their invitation was accepted.
    async fn notify_accepted(&self, notice: &AcceptanceNotice) -> Result<(), NotifyError>;

    /// Tell the organization about suspended or reinstated members.
    async fn notify_seat_changes(&self, _notice: &SeatChangeNotice) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Notifier that only logs; the default when no delivery channel is wired.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send_invitation(&self, notice: &InvitationNotice) -> Result<(), NotifyError> {
        info!(
            organization_id = %notice.organization_id,
            membership_id = %notice.membership_id,
            email = %notice.email,
            resend = notice.is_resend,
            "Invitation ready for delivery"
        );
        Ok(())
    }

    async fn notify_accepted(&self, notice: &AcceptanceNotice) -> Result<(), NotifyError> {
        info!(
            organization_id = %notice.organization_id,
            membership_id = %notice.membership_id,
            status = notice.status.as_str(),
            "Invitation accepted"
        );
        Ok(())
    }

    async fn notify_seat_changes(&self, notice: &SeatChangeNotice) -> Result<(), NotifyError> {
        info!(
            organization_id = %notice.organization_id,
            limit = %notice.limit,
            suspended = notice.suspended.len(),
            reinstated = notice.reinstated.len(),
            "Seat assignments changed"
        );
        Ok(())
    }
}

/// Publishes membership events on an optional bus.
#[derive(Clone, Default)]
pub struct EventPublisher {
    bus: Option<Arc<dyn EventBus>>,
}

impl std::fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPublisher")
            .field("enabled", &self.bus.is_some())
            .finish()
    }
}

impl EventPublisher {
    /// Publish on `bus`.
    pub fn new(bus: Arc<dyn EventBus>) -> Self {
        Self { bus: Some(bus) }
    }

    /// Drop every event.
    pub fn disabled() -> Self {
        Self { bus: None }
    }

    /// Publish `event` for `organization_id`, attributing it to `actor` when known.
    pub async fn publish(&self, organization_id: Uuid, actor: Option<Uuid>, event: TeamEvent) {
        let Some(bus) = &self.bus else {
            return;
        };
        let envelope = match event.to_event(organization_id) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, event_type = event.event_type(), "Failed to encode team event");
                return;
            }
        };
        let envelope = match actor {
            Some(user_id) => envelope.with_user(user_id),
            None => envelope,
        };
        let topic = envelope.topic();
        match bus.publish(envelope).await {
            Ok(()) => debug!(topic = %topic, "Team event published"),
            Err(e) => warn!(error = %e, topic = %topic, "Failed to publish team event"),
        }
    }
}

/// Deliver through `notifier`, logging instead of failing.
pub(crate) async fn deliver<F, Fut>(what: &'static str, organization_id: Uuid, send: F)
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<(), NotifyError>>,
{
    if let Err(e) = send().await {
        warn!(error = %e, organization_id = %organization_id, notification = what, "Notification failed");
    }
}
