//! Team service facade.
//!
//! Wires the store, entitlement resolver, invitation manager and seat
//! reconciler together and exposes the operations an API layer calls.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tenant_events::{EventBus, TeamEvent};
use tenant_org::{
    InvitationSummary, Membership, MembershipStatus, Organization, OrganizationRole, SeatLimit, TeamResult,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, TeamSeatConfig};
use crate::entitlement::{EntitlementResolver, SubscriptionLookup};
use crate::identity::Actor;
use crate::invitations::{InvitationManager, InviteOutcome};
use crate::notify::{EventPublisher, Notifier, TracingNotifier};
use crate::reconciler::{ReconciliationReport, SeatReconciler};
use crate::store::MembershipStore;

/// Seat occupancy of an organization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatUsage {
    /// Current limit
    pub limit: SeatLimit,
    /// Active non-owner members
    pub active: usize,
    /// Members waiting for a seat
    pub suspended: usize,
    /// Outstanding invitations
    pub pending: usize,
    /// Free seats, `None` when unlimited
    pub available: Option<u32>,
}

/// Builder for [`TeamService`].
pub struct TeamServiceBuilder {
    config: TeamSeatConfig,
    subscriptions: Arc<dyn SubscriptionLookup>,
    notifier: Arc<dyn Notifier>,
    store: Option<Arc<MembershipStore>>,
    clock: Arc<dyn Clock>,
    event_bus: Option<Arc<dyn EventBus>>,
}

impl TeamServiceBuilder {
    /// Deliver notifications through `notifier` instead of the log.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Use an existing store.
    pub fn with_store(mut self, store: Arc<MembershipStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use `clock` instead of wall-clock time.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Publish membership events on `bus`.
    pub fn with_event_bus(mut self, bus: Arc<dyn EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Validate the configuration and build the service.
    pub fn build(self) -> Result<TeamService, ConfigError> {
        self.config.validate()?;

        let store = self.store.unwrap_or_default();
        let entitlements = EntitlementResolver::new(self.subscriptions);
        let events = match self.event_bus {
            Some(bus) => EventPublisher::new(bus),
            None => EventPublisher::disabled(),
        };
        let reconciler = SeatReconciler::new(
            store.clone(),
            entitlements.clone(),
            self.notifier.clone(),
            events.clone(),
            self.clock.clone(),
        );
        let invitations = InvitationManager::new(
            store.clone(),
            entitlements.clone(),
            self.notifier,
            events.clone(),
            self.clock.clone(),
            self.config,
        );

        Ok(TeamService {
            store,
            entitlements,
            invitations,
            reconciler,
            events,
            clock: self.clock,
        })
    }
}

/// Team membership and seat service.
#[derive(Clone)]
pub struct TeamService {
    store: Arc<MembershipStore>,
    entitlements: EntitlementResolver,
    invitations: InvitationManager,
    reconciler: SeatReconciler,
    events: EventPublisher,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TeamService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeamService")
            .field("invitations", &self.invitations)
            .field("reconciler", &self.reconciler)
            .finish_non_exhaustive()
    }
}

impl TeamService {
    /// Start building a service over a subscription source.
    pub fn builder(config: TeamSeatConfig, subscriptions: Arc<dyn SubscriptionLookup>) -> TeamServiceBuilder {
        TeamServiceBuilder {
            config,
            subscriptions,
            notifier: Arc::new(TracingNotifier),
            store: None,
            clock: Arc::new(SystemClock),
            event_bus: None,
        }
    }

    /// Service configured from the environment with default collaborators.
    pub fn from_env(subscriptions: Arc<dyn SubscriptionLookup>) -> Result<Self, ConfigError> {
        Self::builder(TeamSeatConfig::from_env(), subscriptions).build()
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<MembershipStore> {
        &self.store
    }

    /// The invitation manager.
    pub fn invitations(&self) -> &InvitationManager {
        &self.invitations
    }

    /// The seat reconciler.
    pub fn reconciler(&self) -> &SeatReconciler {
        &self.reconciler
    }

    /// Create an organization owned by `owner`.
    #[instrument(skip(self, owner), fields(owner = %owner.user_id))]
    pub async fn create_organization(&self, name: &str, slug: &str, owner: &Actor) -> TeamResult<Organization> {
        self.store
            .create_organization(name, slug, owner.user_id, &owner.email, self.clock.now())
            .await
    }

    /// Invite `email` with a role given by name.
    pub async fn invite(&self, organization_id: Uuid, email: &str, role: &str, actor: &Actor) -> TeamResult<InviteOutcome> {
        let role = OrganizationRole::parse_required(role)?;
        self.invitations.invite(organization_id, email, role, actor).await
    }

    /// Accept an invitation token.
    pub async fn accept(&self, token: &str, actor: &Actor) -> TeamResult<Membership> {
        self.invitations.accept(token, actor).await
    }

    /// Re-issue a pending invitation.
    pub async fn resend(&self, membership_id: Uuid, actor: &Actor) -> TeamResult<InvitationSummary> {
        self.invitations.resend(membership_id, actor).await
    }

    /// Revoke a pending invitation.
    pub async fn revoke(&self, membership_id: Uuid, actor: &Actor) -> TeamResult<()> {
        self.invitations.revoke(membership_id, actor).await
    }

    /// Change a member's role.
    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn update_role(&self, membership_id: Uuid, new_role: &str, actor: &Actor) -> TeamResult<Membership> {
        let new_role = OrganizationRole::parse_required(new_role)?;
        let organization_id = self.store.require_organization_of_membership(membership_id).await?;

        let (previous, updated) = self
            .store
            .with_organization_lock(organization_id, |roster| {
                let (acting_role, acting_is_owner) = roster.acting_role_of(actor.user_id)?;
                let previous = roster.require_membership(membership_id)?.role;
                let updated = roster.update_role(membership_id, new_role, acting_role, acting_is_owner)?;
                Ok((previous, updated))
            })
            .await?;

        if previous != updated.role {
            info!(
                organization_id = %organization_id,
                membership_id = %membership_id,
                from = previous.as_str(),
                to = updated.role.as_str(),
                "Member role changed"
            );
            self.events
                .publish(
                    organization_id,
                    Some(actor.user_id),
                    TeamEvent::RoleChanged {
                        membership_id,
                        from: previous,
                        to: updated.role,
                        changed_by: actor.user_id,
                    },
                )
                .await;
        }
        Ok(updated)
    }

    /// Remove a member. Owner only.
    ///
    /// Freeing an active seat reinstates the longest-waiting suspended member
    /// in the same transaction.
    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn remove_membership(&self, membership_id: Uuid, actor: &Actor) -> TeamResult<Membership> {
        let organization_id = self.store.require_organization_of_membership(membership_id).await?;
        let mut tx = self.store.transaction(organization_id).await?;

        let (_, acting_is_owner) = tx.roster().acting_role_of(actor.user_id)?;
        let was_removed = tx.roster().require_membership(membership_id)?.status == MembershipStatus::Removed;
        let removed = tx.roster_mut().remove_membership(membership_id, acting_is_owner)?;
        if was_removed {
            return Ok(removed);
        }
        let report = self.reconciler.reconcile_in(&mut tx).await?;
        let organization_name = tx.roster().organization().name.clone();
        tx.commit().await?;

        info!(organization_id = %organization_id, membership_id = %membership_id, "Member removed");
        self.events
            .publish(
                organization_id,
                Some(actor.user_id),
                TeamEvent::MemberRemoved {
                    membership_id,
                    removed_by: actor.user_id,
                },
            )
            .await;
        self.reconciler.announce(&report, organization_name).await;
        Ok(removed)
    }

    /// Give a suspended member their seat back.
    pub async fn reactivate_membership(&self, membership_id: Uuid, actor: &Actor) -> TeamResult<Membership> {
        self.reconciler.reactivate(membership_id, actor).await
    }

    /// Members that have not been removed: owner first, then by join time.
    pub async fn list_members(&self, organization_id: Uuid, actor: &Actor) -> TeamResult<Vec<Membership>> {
        let roster = self.store.snapshot(organization_id).await?;
        roster.acting_role_of(actor.user_id)?;

        let mut members: Vec<Membership> = roster
            .memberships()
            .iter()
            .filter(|m| m.status != MembershipStatus::Removed)
            .cloned()
            .collect();
        members.sort_by(|a, b| {
            b.is_owner()
                .cmp(&a.is_owner())
                .then_with(|| a.ordering_timestamp().cmp(&b.ordering_timestamp()))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(members)
    }

    /// Outstanding invitations, oldest first, with their expiry state.
    pub async fn list_pending_invitations(
        &self,
        organization_id: Uuid,
        actor: &Actor,
    ) -> TeamResult<Vec<InvitationSummary>> {
        let roster = self.store.snapshot(organization_id).await?;
        roster.acting_role_of(actor.user_id)?;

        let now = self.clock.now();
        Ok(roster
            .pending_invitations()
            .into_iter()
            .map(|i| i.summary(now))
            .collect())
    }

    /// Reconcile seats after a subscription change.
    pub async fn reconcile(&self, organization_id: Uuid) -> TeamResult<ReconciliationReport> {
        self.reconciler.reconcile(organization_id).await
    }

    /// Current seat limit and occupancy.
    pub async fn seat_usage(&self, organization_id: Uuid) -> TeamResult<SeatUsage> {
        let roster = self.store.snapshot(organization_id).await?;
        let limit = self
            .entitlements
            .current_limit(organization_id, self.clock.now())
            .await?;
        let active = roster.count_active(true);
        Ok(SeatUsage {
            limit,
            active,
            suspended: roster.count_with_status(MembershipStatus::Suspended),
            pending: roster.count_with_status(MembershipStatus::Pending),
            available: limit.available(active),
        })
    }

    /// Look up a membership.
    pub async fn membership(&self, membership_id: Uuid) -> TeamResult<Membership> {
        self.store.get_membership(membership_id).await
    }
}
