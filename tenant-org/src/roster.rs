//! Organization roster
//!
//! The roster is the complete membership state of one organization: the
//! organization record, every membership and every outstanding invitation.
//! It is the unit a store locks, mutates and commits atomically, and it
//! enforces the per-record membership invariants:
//!
//! - exactly one active owner membership, never suspended or removed
//! - at most one live invitation per (organization, email)
//! - at most one joined (active or suspended) membership per user
//! - `removed` is terminal
//!
//! The global seat invariant (active non-owner count within the plan limit)
//! is restored by the seat reconciler on top of these operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{TeamError, TeamResult};
use crate::invitation::Invitation;
use crate::membership::{ListOrder, Membership, MembershipStatus, MembershipSubject};
use crate::organization::Organization;
use crate::roles::{authorize_assignment, authorize_manage, OrganizationRole};

/// Membership state of a single organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Roster {
    organization: Organization,
    memberships: Vec<Membership>,
    invitations: Vec<Invitation>,
}

impl Roster {
    /// Creates the roster of a new organization with its active owner membership.
    pub fn new(organization: Organization, owner_email: impl Into<String>) -> Self {
        let owner = Membership::owner(
            organization.id,
            organization.owner_id,
            owner_email,
            organization.created_at,
        );
        Self {
            organization,
            memberships: vec![owner],
            invitations: Vec::new(),
        }
    }

    /// The organization record.
    pub fn organization(&self) -> &Organization {
        &self.organization
    }

    /// The organization ID.
    pub fn organization_id(&self) -> Uuid {
        self.organization.id
    }

    /// All memberships, including removed ones.
    pub fn memberships(&self) -> &[Membership] {
        &self.memberships
    }

    /// All outstanding invitations, live or expired.
    pub fn invitations(&self) -> &[Invitation] {
        &self.invitations
    }

    /// The owner's membership.
    pub fn owner(&self) -> Option<&Membership> {
        self.memberships.iter().find(|m| m.is_owner())
    }

    /// Look up a membership by ID.
    pub fn membership(&self, membership_id: Uuid) -> Option<&Membership> {
        self.memberships.iter().find(|m| m.id == membership_id)
    }

    /// Look up a membership by ID, failing with `NotFound`.
    pub fn require_membership(&self, membership_id: Uuid) -> TeamResult<&Membership> {
        self.membership(membership_id)
            .ok_or_else(|| TeamError::membership_not_found(membership_id))
    }

    /// The active or suspended membership held by `user_id`, if any.
    pub fn joined_membership_of(&self, user_id: Uuid) -> Option<&Membership> {
        self.memberships
            .iter()
            .find(|m| m.status.is_joined() && m.user_id() == Some(user_id))
    }

    /// The active or suspended membership bound to `email`, if any.
    pub fn joined_membership_by_email(&self, email: &str) -> Option<&Membership> {
        self.memberships
            .iter()
            .find(|m| m.status.is_joined() && m.email() == email)
    }

    /// Role and ownership of `user_id`, as seen by permission checks.
    ///
    /// Suspended members keep their role but may not act on the roster.
    pub fn acting_role_of(&self, user_id: Uuid) -> TeamResult<(OrganizationRole, bool)> {
        let membership = self
            .memberships
            .iter()
            .find(|m| m.status == MembershipStatus::Active && m.user_id() == Some(user_id))
            .ok_or_else(|| {
                TeamError::PermissionDenied("actor is not an active member of this organization".to_string())
            })?;
        Ok((membership.role, membership.is_owner()))
    }

    // ------------------------------------------------------------------
    // Membership lifecycle
    // ------------------------------------------------------------------

    /// Insert a pending membership for `email`.
    ///
    /// Fails with `DuplicateInvite` if a live invitation exists for the email
    /// and `AlreadyMember` if the email belongs to a joined member. Pending
    /// memberships for the same email whose invitation has expired are
    /// discarded first.
    pub fn create_pending_membership(
        &mut self,
        invited_by: Uuid,
        email: &str,
        role: OrganizationRole,
        now: DateTime<Utc>,
    ) -> TeamResult<Membership> {
        if self.live_invitation_for(email, now).is_some() {
            return Err(TeamError::DuplicateInvite);
        }
        if self.joined_membership_by_email(email).is_some() {
            return Err(TeamError::AlreadyMember);
        }
        self.discard_stale_pending(email, now);

        let membership = Membership::pending(self.organization.id, invited_by, email, role, now);
        self.memberships.push(membership.clone());
        Ok(membership)
    }

    /// Attach the invitation for a pending membership.
    pub fn attach_invitation(&mut self, invitation: Invitation) -> TeamResult<()> {
        let membership = self.require_membership(invitation.membership_id)?;
        if membership.status != MembershipStatus::Pending {
            return Err(TeamError::Validation(
                "invitations can only be attached to pending memberships".to_string(),
            ));
        }
        self.invitations.retain(|i| i.membership_id != invitation.membership_id);
        self.invitations.push(invitation);
        Ok(())
    }

    /// Turn a pending membership into a joined one.
    ///
    /// `granted_status` must be `Active` or `Suspended`; the caller decides it
    /// from the current seat limit and active count. Fails with
    /// `AlreadyMember` if the user already holds a joined membership here.
    pub fn activate_membership(
        &mut self,
        membership_id: Uuid,
        user_id: Uuid,
        email: &str,
        granted_status: MembershipStatus,
        now: DateTime<Utc>,
    ) -> TeamResult<Membership> {
        if !granted_status.is_joined() {
            return Err(TeamError::Validation(format!(
                "cannot activate a membership as '{}'",
                granted_status.as_str()
            )));
        }
        if self.joined_membership_of(user_id).is_some() {
            return Err(TeamError::AlreadyMember);
        }

        let membership = self.membership_mut(membership_id)?;
        if membership.status != MembershipStatus::Pending {
            return Err(TeamError::NotFound(format!("pending membership {}", membership_id)));
        }
        membership.subject = MembershipSubject::Joined {
            user_id,
            email: email.to_string(),
        };
        membership.joined_at = Some(now);
        membership.status = granted_status;
        Ok(membership.clone())
    }

    /// Change the role of a membership after the role-authority check.
    pub fn update_role(
        &mut self,
        membership_id: Uuid,
        new_role: OrganizationRole,
        acting_role: OrganizationRole,
        acting_is_owner: bool,
    ) -> TeamResult<Membership> {
        let target = self.require_membership(membership_id)?;
        if target.is_owner() {
            return Err(TeamError::OwnerImmutable);
        }
        if target.status == MembershipStatus::Removed {
            return Err(TeamError::membership_not_found(membership_id));
        }
        authorize_manage(acting_role, acting_is_owner, target.role)?;
        authorize_assignment(acting_role, acting_is_owner, new_role)?;

        for invitation in self.invitations.iter_mut().filter(|i| i.membership_id == membership_id) {
            invitation.role = new_role;
        }
        let membership = self.membership_mut(membership_id)?;
        membership.role = new_role;
        Ok(membership.clone())
    }

    /// Mark a membership removed. Only the owner may remove.
    ///
    /// A pending membership also loses its invitation. Removing an already
    /// removed membership is a no-op.
    pub fn remove_membership(&mut self, membership_id: Uuid, acting_is_owner: bool) -> TeamResult<Membership> {
        let target = self.require_membership(membership_id)?;
        if target.is_owner() {
            return Err(TeamError::OwnerImmutable);
        }
        if !acting_is_owner {
            return Err(TeamError::PermissionDenied(
                "only the organization owner can remove members".to_string(),
            ));
        }
        if target.status == MembershipStatus::Removed {
            return Ok(target.clone());
        }
        if target.status == MembershipStatus::Pending {
            self.invitations.retain(|i| i.membership_id != membership_id);
        }
        let membership = self.membership_mut(membership_id)?;
        membership.status = MembershipStatus::Removed;
        Ok(membership.clone())
    }

    /// Move a joined membership between `Active` and `Suspended`.
    ///
    /// Reserved for seat reconciliation; the owner is never touched.
    pub fn set_seat_status(&mut self, membership_id: Uuid, status: MembershipStatus) -> TeamResult<Membership> {
        if !status.is_joined() {
            return Err(TeamError::Validation(format!(
                "seat status must be active or suspended, got '{}'",
                status.as_str()
            )));
        }
        let membership = self.membership_mut(membership_id)?;
        if membership.is_owner() {
            return Err(TeamError::OwnerImmutable);
        }
        if !membership.status.is_joined() {
            return Err(TeamError::Validation(format!(
                "membership {} is {} and holds no seat",
                membership_id,
                membership.status.as_str()
            )));
        }
        membership.status = status;
        Ok(membership.clone())
    }

    /// Count active memberships, optionally excluding the owner.
    pub fn count_active(&self, exclude_owner: bool) -> usize {
        self.memberships
            .iter()
            .filter(|m| m.status == MembershipStatus::Active && !(exclude_owner && m.is_owner()))
            .count()
    }

    /// Count memberships in `status`.
    pub fn count_with_status(&self, status: MembershipStatus) -> usize {
        self.memberships.iter().filter(|m| m.status == status).count()
    }

    /// Memberships in `status`, ordered by `joined_at` (`invited_at` for pending).
    ///
    /// Ties are broken by ID so the order is fully deterministic.
    pub fn list_by_status(&self, status: MembershipStatus, order: ListOrder) -> Vec<Membership> {
        let mut selected: Vec<Membership> = self
            .memberships
            .iter()
            .filter(|m| m.status == status)
            .cloned()
            .collect();
        selected.sort_by(|a, b| {
            a.ordering_timestamp()
                .cmp(&b.ordering_timestamp())
                .then_with(|| a.id.cmp(&b.id))
        });
        if order == ListOrder::Descending {
            selected.reverse();
        }
        selected
    }

    // ------------------------------------------------------------------
    // Invitations
    // ------------------------------------------------------------------

    /// The live invitation for `email` at `now`, if any.
    pub fn live_invitation_for(&self, email: &str, now: DateTime<Utc>) -> Option<&Invitation> {
        self.invitations
            .iter()
            .find(|i| i.email == email && i.is_live_at(now))
    }

    /// Find an invitation by token digest.
    pub fn invitation_by_token_hash(&self, token_hash: &str) -> Option<&Invitation> {
        self.invitations.iter().find(|i| i.token_hash == token_hash)
    }

    /// Find the invitation of a pending membership.
    pub fn invitation_for_membership(&self, membership_id: Uuid) -> Option<&Invitation> {
        self.invitations.iter().find(|i| i.membership_id == membership_id)
    }

    /// Issue a fresh token and expiry for an existing invitation.
    pub fn replace_invitation_token(
        &mut self,
        membership_id: Uuid,
        token_hash: String,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> TeamResult<Invitation> {
        let invitation = self
            .invitations
            .iter_mut()
            .find(|i| i.membership_id == membership_id)
            .ok_or_else(|| TeamError::NotFound(format!("pending invitation for membership {}", membership_id)))?;
        invitation.token_hash = token_hash;
        invitation.created_at = now;
        invitation.expires_at = expires_at;
        Ok(invitation.clone())
    }

    /// Delete an invitation, returning it.
    pub fn delete_invitation(&mut self, invitation_id: Uuid) -> Option<Invitation> {
        let index = self.invitations.iter().position(|i| i.id == invitation_id)?;
        Some(self.invitations.remove(index))
    }

    /// Delete a pending membership together with its invitation.
    pub fn delete_pending_membership(&mut self, membership_id: Uuid) -> TeamResult<(Membership, Option<Invitation>)> {
        let index = self
            .memberships
            .iter()
            .position(|m| m.id == membership_id && m.status == MembershipStatus::Pending)
            .ok_or_else(|| TeamError::NotFound(format!("pending membership {}", membership_id)))?;
        let membership = self.memberships.remove(index);
        let invitation = self
            .invitations
            .iter()
            .position(|i| i.membership_id == membership_id)
            .map(|i| self.invitations.remove(i));
        Ok((membership, invitation))
    }

    /// Outstanding invitations, oldest first.
    pub fn pending_invitations(&self) -> Vec<&Invitation> {
        let mut pending: Vec<&Invitation> = self.invitations.iter().collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        pending
    }

    fn membership_mut(&mut self, membership_id: Uuid) -> TeamResult<&mut Membership> {
        self.memberships
            .iter_mut()
            .find(|m| m.id == membership_id)
            .ok_or_else(|| TeamError::membership_not_found(membership_id))
    }

    fn discard_stale_pending(&mut self, email: &str, now: DateTime<Utc>) {
        let stale: Vec<Uuid> = self
            .memberships
            .iter()
            .filter(|m| m.status == MembershipStatus::Pending && m.email() == email)
            .filter(|m| {
                self.invitation_for_membership(m.id)
                    .map_or(true, |i| i.is_expired_at(now))
            })
            .map(|m| m.id)
            .collect();
        self.memberships.retain(|m| !stale.contains(&m.id));
        self.invitations.retain(|i| !stale.contains(&i.membership_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    struct Fixture {
        roster: Roster,
        owner_id: Uuid,
        now: DateTime<Utc>,
    }

    fn fixture() -> Fixture {
        let owner_id = Uuid::now_v7();
        let now = Utc::now();
        let org = Organization::created_at("Acme", "acme", owner_id, now);
        Fixture {
            roster: Roster::new(org, "owner@acme.io"),
            owner_id,
            now,
        }
    }

    fn invitation_for(roster: &Roster, membership: &Membership, inviter: Uuid, expires_at: DateTime<Utc>) -> Invitation {
        Invitation {
            id: Uuid::now_v7(),
            organization_id: roster.organization_id(),
            membership_id: membership.id,
            email: membership.email().to_string(),
            role: membership.role,
            token_hash: format!("hash-{}", membership.id),
            invited_by: inviter,
            inviter_email: "owner@acme.io".to_string(),
            created_at: membership.invited_at,
            expires_at,
        }
    }

    fn join(f: &mut Fixture, email: &str, status: MembershipStatus, joined_at: DateTime<Utc>) -> Membership {
        let pending = f
            .roster
            .create_pending_membership(f.owner_id, email, OrganizationRole::Member, f.now)
            .unwrap();
        f.roster
            .activate_membership(pending.id, Uuid::now_v7(), email, status, joined_at)
            .unwrap()
    }

    #[test]
    fn test_new_roster_has_single_active_owner() {
        let f = fixture();
        let owner = f.roster.owner().unwrap();
        assert_eq!(owner.user_id(), Some(f.owner_id));
        assert_eq!(owner.status, MembershipStatus::Active);
        assert_eq!(f.roster.count_active(true), 0);
        assert_eq!(f.roster.count_active(false), 1);
    }

    #[test]
    fn test_duplicate_live_invite_rejected() {
        let mut f = fixture();
        let pending = f
            .roster
            .create_pending_membership(f.owner_id, "a@x.com", OrganizationRole::Member, f.now)
            .unwrap();
        let invitation = invitation_for(&f.roster, &pending, f.owner_id, f.now + Duration::days(7));
        f.roster.attach_invitation(invitation).unwrap();

        let err = f
            .roster
            .create_pending_membership(f.owner_id, "a@x.com", OrganizationRole::Viewer, f.now)
            .unwrap_err();
        assert_eq!(err, TeamError::DuplicateInvite);
    }

    #[test]
    fn test_expired_invite_is_replaced() {
        let mut f = fixture();
        let pending = f
            .roster
            .create_pending_membership(f.owner_id, "a@x.com", OrganizationRole::Member, f.now)
            .unwrap();
        let invitation = invitation_for(&f.roster, &pending, f.owner_id, f.now + Duration::days(7));
        f.roster.attach_invitation(invitation).unwrap();

        let later = f.now + Duration::days(8);
        let fresh = f
            .roster
            .create_pending_membership(f.owner_id, "a@x.com", OrganizationRole::Member, later)
            .unwrap();

        assert!(f.roster.membership(pending.id).is_none());
        assert!(f.roster.invitation_for_membership(pending.id).is_none());
        assert_eq!(f.roster.count_with_status(MembershipStatus::Pending), 1);
        assert_eq!(fresh.invited_at, later);
    }

    #[test]
    fn test_invite_existing_member_rejected() {
        let mut f = fixture();
        let now = f.now;
        join(&mut f, "a@x.com", MembershipStatus::Active, now);
        let err = f
            .roster
            .create_pending_membership(f.owner_id, "a@x.com", OrganizationRole::Member, now)
            .unwrap_err();
        assert_eq!(err, TeamError::AlreadyMember);

        let err = f
            .roster
            .create_pending_membership(f.owner_id, "owner@acme.io", OrganizationRole::Member, now)
            .unwrap_err();
        assert_eq!(err, TeamError::AlreadyMember);
    }

    #[test]
    fn test_activate_sets_subject_and_joined_at() {
        let mut f = fixture();
        let pending = f
            .roster
            .create_pending_membership(f.owner_id, "a@x.com", OrganizationRole::Member, f.now)
            .unwrap();
        let user_id = Uuid::now_v7();
        let joined_at = f.now + Duration::hours(1);
        let joined = f
            .roster
            .activate_membership(pending.id, user_id, "a@x.com", MembershipStatus::Suspended, joined_at)
            .unwrap();

        assert_eq!(joined.user_id(), Some(user_id));
        assert_eq!(joined.joined_at, Some(joined_at));
        assert_eq!(joined.status, MembershipStatus::Suspended);
    }

    #[test]
    fn test_activate_rejects_second_membership_for_user() {
        let mut f = fixture();
        let first = f
            .roster
            .create_pending_membership(f.owner_id, "a@x.com", OrganizationRole::Member, f.now)
            .unwrap();
        let second = f
            .roster
            .create_pending_membership(f.owner_id, "alias@x.com", OrganizationRole::Member, f.now)
            .unwrap();
        let user_id = Uuid::now_v7();
        f.roster
            .activate_membership(first.id, user_id, "a@x.com", MembershipStatus::Active, f.now)
            .unwrap();

        let err = f
            .roster
            .activate_membership(second.id, user_id, "alias@x.com", MembershipStatus::Active, f.now)
            .unwrap_err();
        assert_eq!(err, TeamError::AlreadyMember);
    }

    #[test]
    fn test_activate_rejects_pending_status() {
        let mut f = fixture();
        let pending = f
            .roster
            .create_pending_membership(f.owner_id, "a@x.com", OrganizationRole::Member, f.now)
            .unwrap();
        let err = f
            .roster
            .activate_membership(pending.id, Uuid::now_v7(), "a@x.com", MembershipStatus::Pending, f.now)
            .unwrap_err();
        assert!(matches!(err, TeamError::Validation(_)));
    }

    #[test]
    fn test_update_role_rules() {
        let mut f = fixture();
        let now = f.now;
        let member = join(&mut f, "a@x.com", MembershipStatus::Active, now);
        let owner_membership_id = f.roster.owner().unwrap().id;

        let err = f
            .roster
            .update_role(owner_membership_id, OrganizationRole::Admin, OrganizationRole::Owner, true)
            .unwrap_err();
        assert_eq!(err, TeamError::OwnerImmutable);

        let err = f
            .roster
            .update_role(member.id, OrganizationRole::Owner, OrganizationRole::Admin, false)
            .unwrap_err();
        assert!(matches!(err, TeamError::PermissionDenied(_)));

        let updated = f
            .roster
            .update_role(member.id, OrganizationRole::Admin, OrganizationRole::Admin, false)
            .unwrap();
        assert_eq!(updated.role, OrganizationRole::Admin);
    }

    #[test]
    fn test_update_role_of_pending_updates_invitation() {
        let mut f = fixture();
        let pending = f
            .roster
            .create_pending_membership(f.owner_id, "a@x.com", OrganizationRole::Member, f.now)
            .unwrap();
        let invitation = invitation_for(&f.roster, &pending, f.owner_id, f.now + Duration::days(7));
        f.roster.attach_invitation(invitation).unwrap();

        f.roster
            .update_role(pending.id, OrganizationRole::Viewer, OrganizationRole::Owner, true)
            .unwrap();
        assert_eq!(
            f.roster.invitation_for_membership(pending.id).unwrap().role,
            OrganizationRole::Viewer
        );
    }

    #[test]
    fn test_remove_membership_rules() {
        let mut f = fixture();
        let now = f.now;
        let member = join(&mut f, "a@x.com", MembershipStatus::Active, now);
        let owner_membership_id = f.roster.owner().unwrap().id;

        assert!(matches!(
            f.roster.remove_membership(member.id, false),
            Err(TeamError::PermissionDenied(_))
        ));
        assert_eq!(
            f.roster.remove_membership(owner_membership_id, true).unwrap_err(),
            TeamError::OwnerImmutable
        );

        let removed = f.roster.remove_membership(member.id, true).unwrap();
        assert_eq!(removed.status, MembershipStatus::Removed);
        // Terminal and idempotent
        let again = f.roster.remove_membership(member.id, true).unwrap();
        assert_eq!(again.status, MembershipStatus::Removed);
        assert!(f.roster.set_seat_status(member.id, MembershipStatus::Active).is_err());
    }

    #[test]
    fn test_remove_pending_deletes_invitation() {
        let mut f = fixture();
        let pending = f
            .roster
            .create_pending_membership(f.owner_id, "a@x.com", OrganizationRole::Member, f.now)
            .unwrap();
        let invitation = invitation_for(&f.roster, &pending, f.owner_id, f.now + Duration::days(7));
        f.roster.attach_invitation(invitation).unwrap();

        f.roster.remove_membership(pending.id, true).unwrap();
        assert!(f.roster.invitations().is_empty());
    }

    #[test]
    fn test_owner_seat_status_is_immutable() {
        let mut f = fixture();
        let owner_membership_id = f.roster.owner().unwrap().id;
        assert_eq!(
            f.roster
                .set_seat_status(owner_membership_id, MembershipStatus::Suspended)
                .unwrap_err(),
            TeamError::OwnerImmutable
        );
    }

    #[test]
    fn test_list_by_status_ordering() {
        let mut f = fixture();
        let t0 = f.now;
        let late = join(&mut f, "c@x.com", MembershipStatus::Active, t0 + Duration::minutes(3));
        let early = join(&mut f, "a@x.com", MembershipStatus::Active, t0 + Duration::minutes(1));
        let middle = join(&mut f, "b@x.com", MembershipStatus::Active, t0 + Duration::minutes(2));

        let ascending: Vec<Uuid> = f
            .roster
            .list_by_status(MembershipStatus::Active, ListOrder::Ascending)
            .iter()
            .map(|m| m.id)
            .collect();
        let owner_id = f.roster.owner().unwrap().id;
        assert_eq!(ascending, vec![owner_id, early.id, middle.id, late.id]);

        let descending: Vec<Uuid> = f
            .roster
            .list_by_status(MembershipStatus::Active, ListOrder::Descending)
            .iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(descending, vec![late.id, middle.id, early.id, owner_id]);
    }

    #[test]
    fn test_delete_pending_membership() {
        let mut f = fixture();
        let pending = f
            .roster
            .create_pending_membership(f.owner_id, "a@x.com", OrganizationRole::Member, f.now)
            .unwrap();
        let invitation = invitation_for(&f.roster, &pending, f.owner_id, f.now + Duration::days(7));
        f.roster.attach_invitation(invitation.clone()).unwrap();

        let (membership, deleted) = f.roster.delete_pending_membership(pending.id).unwrap();
        assert_eq!(membership.id, pending.id);
        assert_eq!(deleted.map(|i| i.id), Some(invitation.id));
        assert!(f.roster.delete_pending_membership(pending.id).is_err());
    }

    #[test]
    fn test_acting_role_of_suspended_member_denied() {
        let mut f = fixture();
        let now = f.now;
        let member = join(&mut f, "a@x.com", MembershipStatus::Suspended, now);
        let user_id = member.user_id().unwrap();
        assert!(matches!(
            f.roster.acting_role_of(user_id),
            Err(TeamError::PermissionDenied(_))
        ));
        assert_eq!(
            f.roster.acting_role_of(f.owner_id).unwrap(),
            (OrganizationRole::Owner, true)
        );
    }
}
