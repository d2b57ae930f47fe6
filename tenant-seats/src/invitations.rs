//! Invitation lifecycle.
//!
//! Issues single-use invitation tokens for pending memberships, accepts them
//! against the current seat limit, and re-issues or revokes them. Raw tokens
//! only ever leave the process inside the accept link handed to the
//! [`Notifier`]; the roster stores their SHA-256 digest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tenant_events::TeamEvent;
use tenant_org::roles::authorize_assignment;
use tenant_org::{
    normalize_email, Invitation, InvitationSummary, Membership, MembershipStatus, OrganizationRole, TeamError,
    TeamResult,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::TeamSeatConfig;
use crate::entitlement::EntitlementResolver;
use crate::identity::Actor;
use crate::notify::{deliver, AcceptanceNotice, EventPublisher, InvitationNotice, Notifier};
use crate::store::MembershipStore;
use crate::token::{generate_token, hash_token};

/// Result of an invite request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InviteOutcome {
    /// A new invitation was issued and sent
    Invited {
        /// The new invitation
        invitation: InvitationSummary,
    },
    /// A live invitation for the email already existed; nothing was sent
    AlreadyInvited {
        /// The existing invitation
        invitation: InvitationSummary,
    },
}

impl InviteOutcome {
    /// The invitation, new or existing.
    pub fn invitation(&self) -> &InvitationSummary {
        match self {
            InviteOutcome::Invited { invitation } | InviteOutcome::AlreadyInvited { invitation } => invitation,
        }
    }

    /// True when a new invitation was issued.
    pub fn is_new(&self) -> bool {
        matches!(self, InviteOutcome::Invited { .. })
    }
}

/// Manages invitations for every organization in a store.
#[derive(Clone)]
pub struct InvitationManager {
    store: Arc<MembershipStore>,
    entitlements: EntitlementResolver,
    notifier: Arc<dyn Notifier>,
    events: EventPublisher,
    clock: Arc<dyn Clock>,
    config: TeamSeatConfig,
}

impl std::fmt::Debug for InvitationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvitationManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl InvitationManager {
    /// Create a manager.
    pub fn new(
        store: Arc<MembershipStore>,
        entitlements: EntitlementResolver,
        notifier: Arc<dyn Notifier>,
        events: EventPublisher,
        clock: Arc<dyn Clock>,
        config: TeamSeatConfig,
    ) -> Self {
        Self {
            store,
            entitlements,
            notifier,
            events,
            clock,
            config,
        }
    }

    fn expiry(&self, now: DateTime<Utc>) -> TeamResult<DateTime<Utc>> {
        self.config.invitation_expiry(now).ok_or_else(|| {
            TeamError::Validation(format!(
                "invitation lifetime of {} days is out of range",
                self.config.invitation_ttl_days
            ))
        })
    }

    /// Invite `email` into `organization_id` with `role`.
    ///
    /// Re-inviting an email with a live invitation returns it unchanged as
    /// [`InviteOutcome::AlreadyInvited`]. Owners and admins may invite; an
    /// admin may not grant a role above admin and nobody may grant owner.
    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn invite(
        &self,
        organization_id: Uuid,
        email: &str,
        role: OrganizationRole,
        actor: &Actor,
    ) -> TeamResult<InviteOutcome> {
        let email = normalize_email(email)?;
        let now = self.clock.now();
        let mut tx = self.store.transaction(organization_id).await?;

        let (acting_role, acting_is_owner) = tx.roster().acting_role_of(actor.user_id)?;
        authorize_assignment(acting_role, acting_is_owner, role)?;

        if let Some(existing) = tx.roster().live_invitation_for(&email, now) {
            let summary = existing.summary(now);
            tx.rollback();
            return Ok(InviteOutcome::AlreadyInvited { invitation: summary });
        }

        let expires_at = self.expiry(now)?;
        let membership = tx
            .roster_mut()
            .create_pending_membership(actor.user_id, &email, role, now)?;
        let token = generate_token(self.config.token_bytes);
        let invitation = Invitation {
            id: Uuid::now_v7(),
            organization_id,
            membership_id: membership.id,
            email: email.clone(),
            role,
            token_hash: hash_token(&token),
            invited_by: actor.user_id,
            inviter_email: actor.email.clone(),
            created_at: now,
            expires_at,
        };
        tx.roster_mut().attach_invitation(invitation.clone())?;
        let organization_name = tx.roster().organization().name.clone();
        tx.commit().await?;

        info!(
            organization_id = %organization_id,
            membership_id = %membership.id,
            role = role.as_str(),
            "Invitation issued"
        );

        let accept_url = self.config.accept_url(&token);
        let notice = InvitationNotice {
            organization_id,
            membership_id: membership.id,
            email: email.clone(),
            inviter_id: actor.user_id,
            inviter_email: actor.email.clone(),
            organization_name: organization_name.clone(),
            role,
            accept_url: accept_url.clone(),
            expires_at: invitation.expires_at,
            is_resend: false,
        };
        deliver("invitation", organization_id, || self.notifier.send_invitation(&notice)).await;
        self.events
            .publish(
                organization_id,
                Some(actor.user_id),
                TeamEvent::MemberInvited {
                    membership_id: membership.id,
                    email,
                    role,
                    invited_by: actor.user_id,
                    organization_name,
                    accept_url,
                    expires_at: invitation.expires_at,
                },
            )
            .await;

        Ok(InviteOutcome::Invited {
            invitation: invitation.summary(now),
        })
    }

    /// Accept an invitation token on behalf of the authenticated `actor`.
    ///
    /// The actor's email must match the invited email. The new member gets a
    /// seat if one is free and is suspended otherwise. The token is consumed
    /// either way.
    #[instrument(skip(self, token, actor), fields(actor = %actor.user_id))]
    pub async fn accept(&self, token: &str, actor: &Actor) -> TeamResult<Membership> {
        let token_hash = hash_token(token.trim());
        let organization_id = self
            .store
            .organization_for_token(&token_hash)
            .await
            .ok_or(TeamError::InvalidToken)?;

        let now = self.clock.now();
        let mut tx = self.store.transaction(organization_id).await?;

        // Re-check under the lock; a concurrent accept may have consumed it.
        let invitation = tx
            .roster()
            .invitation_by_token_hash(&token_hash)
            .cloned()
            .ok_or(TeamError::InvalidToken)?;
        if invitation.is_expired_at(now) {
            return Err(TeamError::Expired);
        }
        if actor.email.trim().to_lowercase() != invitation.email {
            return Err(TeamError::EmailMismatch);
        }

        let limit = self.entitlements.current_limit(organization_id, now).await?;
        let granted = if limit.admits(tx.roster().count_active(true)) {
            MembershipStatus::Active
        } else {
            MembershipStatus::Suspended
        };

        let membership = tx.roster_mut().activate_membership(
            invitation.membership_id,
            actor.user_id,
            &invitation.email,
            granted,
            now,
        )?;
        tx.roster_mut().delete_invitation(invitation.id);
        let organization_name = tx.roster().organization().name.clone();
        tx.commit().await?;

        if granted == MembershipStatus::Suspended {
            warn!(
                organization_id = %organization_id,
                membership_id = %membership.id,
                limit = %limit,
                "Invitation accepted without a free seat; member suspended"
            );
        } else {
            info!(organization_id = %organization_id, membership_id = %membership.id, "Invitation accepted");
        }

        let notice = AcceptanceNotice {
            organization_id,
            membership_id: membership.id,
            inviter_email: invitation.inviter_email.clone(),
            accepter_email: invitation.email.clone(),
            organization_name,
            role: membership.role,
            status: membership.status,
        };
        deliver("acceptance", organization_id, || self.notifier.notify_accepted(&notice)).await;
        self.events
            .publish(
                organization_id,
                Some(actor.user_id),
                TeamEvent::MemberJoined {
                    membership_id: membership.id,
                    user_id: actor.user_id,
                    email: invitation.email,
                    inviter_email: invitation.inviter_email,
                    role: membership.role,
                    status: membership.status,
                },
            )
            .await;

        Ok(membership)
    }

    /// Re-issue the invitation of a pending membership with a fresh token and
    /// expiry. The previous token stops working.
    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn resend(&self, membership_id: Uuid, actor: &Actor) -> TeamResult<InvitationSummary> {
        let organization_id = self.store.require_organization_of_membership(membership_id).await?;
        let now = self.clock.now();
        let mut tx = self.store.transaction(organization_id).await?;

        let (acting_role, acting_is_owner) = tx.roster().acting_role_of(actor.user_id)?;
        if !(acting_is_owner || acting_role.can_manage_members()) {
            return Err(TeamError::PermissionDenied(
                "only owners and admins can resend invitations".to_string(),
            ));
        }
        if tx.roster().invitation_for_membership(membership_id).is_none() {
            return Err(TeamError::NotFound(format!(
                "pending invitation for membership {}",
                membership_id
            )));
        }

        let expires_at = self.expiry(now)?;
        let token = generate_token(self.config.token_bytes);
        let invitation = tx
            .roster_mut()
            .replace_invitation_token(membership_id, hash_token(&token), now, expires_at)?;
        let organization_name = tx.roster().organization().name.clone();
        tx.commit().await?;

        info!(organization_id = %organization_id, membership_id = %membership_id, "Invitation resent");

        let accept_url = self.config.accept_url(&token);
        let notice = InvitationNotice {
            organization_id,
            membership_id,
            email: invitation.email.clone(),
            inviter_id: invitation.invited_by,
            inviter_email: invitation.inviter_email.clone(),
            organization_name,
            role: invitation.role,
            accept_url: accept_url.clone(),
            expires_at: invitation.expires_at,
            is_resend: true,
        };
        deliver("invitation", organization_id, || self.notifier.send_invitation(&notice)).await;
        self.events
            .publish(
                organization_id,
                Some(actor.user_id),
                TeamEvent::InvitationResent {
                    membership_id,
                    email: invitation.email.clone(),
                    accept_url,
                    expires_at: invitation.expires_at,
                },
            )
            .await;

        Ok(invitation.summary(now))
    }

    /// Withdraw a pending invitation and delete its pending membership.
    ///
    /// Only the member who sent the invitation or the owner may revoke it, and
    /// only while they are still an active member.
    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn revoke(&self, membership_id: Uuid, actor: &Actor) -> TeamResult<()> {
        let organization_id = self.store.require_organization_of_membership(membership_id).await?;
        let mut tx = self.store.transaction(organization_id).await?;

        let membership = tx.roster().require_membership(membership_id)?;
        if membership.status != MembershipStatus::Pending {
            return Err(TeamError::NotFound(format!("pending membership {}", membership_id)));
        }
        let inviter = tx
            .roster()
            .invitation_for_membership(membership_id)
            .map(|i| i.invited_by)
            .or(membership.invited_by);
        let (_, is_owner) = tx.roster().acting_role_of(actor.user_id).map_err(|_| {
            TeamError::Unauthorized("only active members can revoke an invitation".to_string())
        })?;
        if !is_owner && inviter != Some(actor.user_id) {
            return Err(TeamError::Unauthorized(
                "only the inviter or the organization owner can revoke an invitation".to_string(),
            ));
        }

        let (membership, _) = tx.roster_mut().delete_pending_membership(membership_id)?;
        tx.commit().await?;

        info!(organization_id = %organization_id, membership_id = %membership_id, "Invitation revoked");
        self.events
            .publish(
                organization_id,
                Some(actor.user_id),
                TeamEvent::InvitationRevoked {
                    membership_id,
                    email: membership.email().to_string(),
                    revoked_by: actor.user_id,
                },
            )
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::entitlement::InMemorySubscriptions;
    use crate::notify::TracingNotifier;
    use chrono::Utc;
    use tenant_org::{Organization, Plan, SubscriptionSnapshot, SubscriptionStatus};

    struct Fixture {
        manager: InvitationManager,
        store: Arc<MembershipStore>,
        org: Organization,
        owner: Actor,
    }

    async fn fixture(max_seats: i32) -> Fixture {
        fixture_with_config(max_seats, TeamSeatConfig::default()).await
    }

    async fn fixture_with_config(max_seats: i32, config: TeamSeatConfig) -> Fixture {
        let store = Arc::new(MembershipStore::new());
        let owner = Actor::new(Uuid::now_v7(), "owner@acme.io");
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let org = store
            .create_organization("Acme", "acme", owner.user_id, &owner.email, clock.now())
            .await
            .unwrap();
        let subscriptions = Arc::new(InMemorySubscriptions::new());
        subscriptions
            .put(SubscriptionSnapshot::new(org.id, SubscriptionStatus::Active, Plan::new("team", max_seats)))
            .await;
        let manager = InvitationManager::new(
            store.clone(),
            EntitlementResolver::new(subscriptions),
            Arc::new(TracingNotifier),
            EventPublisher::disabled(),
            clock,
            config,
        );
        Fixture {
            manager,
            store,
            org,
            owner,
        }
    }

    #[tokio::test]
    async fn test_invite_is_idempotent_for_live_invitation() {
        let f = fixture(5).await;

        let first = f
            .manager
            .invite(f.org.id, "New@Acme.io", OrganizationRole::Member, &f.owner)
            .await
            .unwrap();
        let second = f
            .manager
            .invite(f.org.id, "new@acme.io", OrganizationRole::Admin, &f.owner)
            .await
            .unwrap();

        assert!(first.is_new());
        assert!(!second.is_new());
        assert_eq!(first.invitation().id, second.invitation().id);
        assert_eq!(second.invitation().role, OrganizationRole::Member);
        assert_eq!(f.store.pending_invitations(f.org.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invite_rejects_owner_role_and_bad_email() {
        let f = fixture(5).await;

        let err = f
            .manager
            .invite(f.org.id, "x@acme.io", OrganizationRole::Owner, &f.owner)
            .await
            .unwrap_err();
        assert!(matches!(err, TeamError::PermissionDenied(_)));

        let err = f
            .manager
            .invite(f.org.id, "not-an-email", OrganizationRole::Member, &f.owner)
            .await
            .unwrap_err();
        assert!(matches!(err, TeamError::Validation(_)));
    }

    #[tokio::test]
    async fn test_invite_by_outsider_denied() {
        let f = fixture(5).await;
        let outsider = Actor::new(Uuid::now_v7(), "out@side.io");

        let err = f
            .manager
            .invite(f.org.id, "x@acme.io", OrganizationRole::Viewer, &outsider)
            .await
            .unwrap_err();
        assert!(matches!(err, TeamError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_unknown_token_is_invalid() {
        let f = fixture(5).await;
        let err = f
            .manager
            .accept("nope", &Actor::new(Uuid::now_v7(), "a@b.io"))
            .await
            .unwrap_err();
        assert_eq!(err, TeamError::InvalidToken);
    }

    #[tokio::test]
    async fn test_revoke_unknown_membership_not_found() {
        let f = fixture(5).await;
        let err = f.manager.revoke(Uuid::now_v7(), &f.owner).await.unwrap_err();
        assert!(matches!(err, TeamError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_resend_requires_pending_invitation() {
        let f = fixture(5).await;
        let owner_membership = f.store.snapshot(f.org.id).await.unwrap().owner().unwrap().id;

        let err = f.manager.resend(owner_membership, &f.owner).await.unwrap_err();
        assert!(matches!(err, TeamError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_invite_with_out_of_range_lifetime_fails_cleanly() {
        let config = TeamSeatConfig {
            invitation_ttl_days: 10_000_000_000,
            ..TeamSeatConfig::default()
        };
        let f = fixture_with_config(5, config).await;

        let err = f
            .manager
            .invite(f.org.id, "x@acme.io", OrganizationRole::Member, &f.owner)
            .await
            .unwrap_err();
        assert!(matches!(err, TeamError::Validation(_)));
        assert!(f.store.pending_invitations(f.org.id).await.unwrap().is_empty());
        assert_eq!(f.store.snapshot(f.org.id).await.unwrap().memberships().len(), 1);
    }
}
