//! Seat reconciliation.
//!
//! Brings an organization's active seat count back within its plan limit
//! after a subscription change, member removal or pause. Over the limit the
//! most recently joined members are suspended first; under the limit the
//! longest-waiting suspended members are reinstated first. The owner never
//! occupies a seat and is never touched.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tenant_events::TeamEvent;
use tenant_org::roles::authorize_manage;
use tenant_org::{ListOrder, Membership, MembershipStatus, Roster, SeatLimit, TeamError, TeamResult};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::clock::Clock;
use crate::entitlement::EntitlementResolver;
use crate::identity::Actor;
use crate::notify::{deliver, EventPublisher, Notifier, SeatChangeNotice};
use crate::store::{MembershipStore, OrganizationTransaction};

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReconciliationReport {
    /// Organization ID
    pub organization_id: Uuid,
    /// Limit reconciled to
    pub limit: SeatLimit,
    /// Members suspended in this pass, newest first
    pub suspended: Vec<Membership>,
    /// Members reinstated in this pass, oldest first
    pub reinstated: Vec<Membership>,
    /// Active non-owner seats after the pass
    pub active_seats: usize,
}

impl ReconciliationReport {
    /// True when no membership changed status.
    pub fn is_noop(&self) -> bool {
        self.suspended.is_empty() && self.reinstated.is_empty()
    }
}

/// Adjust seat statuses in `roster` so the active count respects `limit`.
///
/// Running it twice with the same limit changes nothing the second time.
pub fn apply_seat_limit(roster: &mut Roster, limit: SeatLimit) -> TeamResult<ReconciliationReport> {
    let mut suspended = Vec::new();
    let mut reinstated = Vec::new();
    let active = roster.count_active(true);

    let (to_suspend, to_reinstate) = match limit {
        SeatLimit::Unlimited => (0, usize::MAX),
        SeatLimit::Limited(max) => {
            let max = max as usize;
            (active.saturating_sub(max), max.saturating_sub(active))
        }
    };

    if to_suspend > 0 {
        let victims: Vec<Uuid> = roster
            .list_by_status(MembershipStatus::Active, ListOrder::Descending)
            .into_iter()
            .filter(|m| !m.is_owner())
            .take(to_suspend)
            .map(|m| m.id)
            .collect();
        for id in victims {
            suspended.push(roster.set_seat_status(id, MembershipStatus::Suspended)?);
        }
    } else if to_reinstate > 0 {
        let waiting: Vec<Uuid> = roster
            .list_by_status(MembershipStatus::Suspended, ListOrder::Ascending)
            .into_iter()
            .take(to_reinstate)
            .map(|m| m.id)
            .collect();
        for id in waiting {
            reinstated.push(roster.set_seat_status(id, MembershipStatus::Active)?);
        }
    }

    Ok(ReconciliationReport {
        organization_id: roster.organization_id(),
        limit,
        suspended,
        reinstated,
        active_seats: roster.count_active(true),
    })
}

/// Reconciles seat assignments against the current entitlement.
#[derive(Clone)]
pub struct SeatReconciler {
    store: Arc<MembershipStore>,
    entitlements: EntitlementResolver,
    notifier: Arc<dyn Notifier>,
    events: EventPublisher,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SeatReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeatReconciler")
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl SeatReconciler {
    /// Create a reconciler.
    pub fn new(
        store: Arc<MembershipStore>,
        entitlements: EntitlementResolver,
        notifier: Arc<dyn Notifier>,
        events: EventPublisher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            entitlements,
            notifier,
            events,
            clock,
        }
    }

    /// Reconcile `organization_id` in its own transaction.
    ///
    /// Called when billing reports a subscription change, a pause starts or
    /// ends, or a scheduled sweep runs.
    #[instrument(skip(self))]
    pub async fn reconcile(&self, organization_id: Uuid) -> TeamResult<ReconciliationReport> {
        let mut tx = self.store.transaction(organization_id).await?;
        let report = self.reconcile_in(&mut tx).await?;
        let organization_name = tx.roster().organization().name.clone();
        tx.commit().await?;
        self.announce(&report, organization_name).await;
        Ok(report)
    }

    /// Reconcile inside a caller's transaction.
    ///
    /// The limit is resolved while the organization is locked. Nothing is
    /// announced; call [`announce`](Self::announce) after committing.
    pub async fn reconcile_in(&self, tx: &mut OrganizationTransaction<'_>) -> TeamResult<ReconciliationReport> {
        let limit = self
            .entitlements
            .current_limit(tx.organization_id(), self.clock.now())
            .await?;
        apply_seat_limit(tx.roster_mut(), limit)
    }

    /// Log, notify and publish a committed reconciliation that changed something.
    pub async fn announce(&self, report: &ReconciliationReport, organization_name: String) {
        if report.is_noop() {
            return;
        }
        info!(
            organization_id = %report.organization_id,
            limit = %report.limit,
            suspended = report.suspended.len(),
            reinstated = report.reinstated.len(),
            active_seats = report.active_seats,
            "Seats reconciled"
        );

        let notice = SeatChangeNotice {
            organization_id: report.organization_id,
            organization_name,
            limit: report.limit,
            suspended: report.suspended.clone(),
            reinstated: report.reinstated.clone(),
        };
        deliver("seat_changes", report.organization_id, || {
            self.notifier.notify_seat_changes(&notice)
        })
        .await;

        self.events
            .publish(
                report.organization_id,
                None,
                TeamEvent::SeatsReconciled {
                    limit: report.limit,
                    suspended: report.suspended.iter().map(|m| m.id).collect(),
                    reinstated: report.reinstated.iter().map(|m| m.id).collect(),
                    active_seats: report.active_seats as u32,
                },
            )
            .await;
    }

    /// Give a suspended member their seat back, if one is free.
    ///
    /// Fails with `SeatLimitReached` when every seat is taken. Reactivating an
    /// already active member returns it unchanged.
    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn reactivate(&self, membership_id: Uuid, actor: &Actor) -> TeamResult<Membership> {
        let organization_id = self.store.require_organization_of_membership(membership_id).await?;
        let mut tx = self.store.transaction(organization_id).await?;

        let (acting_role, acting_is_owner) = tx.roster().acting_role_of(actor.user_id)?;
        let target = tx.roster().require_membership(membership_id)?.clone();
        if target.is_owner() {
            return Err(TeamError::OwnerImmutable);
        }
        authorize_manage(acting_role, acting_is_owner, target.role)?;

        match target.status {
            MembershipStatus::Active => return Ok(target),
            MembershipStatus::Suspended => {}
            MembershipStatus::Pending | MembershipStatus::Removed => {
                return Err(TeamError::Validation(format!(
                    "membership {} is {} and cannot be reactivated",
                    membership_id,
                    target.status.as_str()
                )));
            }
        }

        let limit = self
            .entitlements
            .current_limit(organization_id, self.clock.now())
            .await?;
        if !limit.admits(tx.roster().count_active(true)) {
            return Err(TeamError::SeatLimitReached {
                limit: limit.as_limit().unwrap_or(0),
            });
        }

        let membership = tx
            .roster_mut()
            .set_seat_status(membership_id, MembershipStatus::Active)?;
        tx.commit().await?;

        info!(organization_id = %organization_id, membership_id = %membership_id, "Member reactivated");
        self.events
            .publish(
                organization_id,
                Some(actor.user_id),
                TeamEvent::MemberReactivated {
                    membership_id,
                    reactivated_by: actor.user_id,
                },
            )
            .await;
        Ok(membership)
    }
}
