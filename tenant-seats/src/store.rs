//! Membership store.
//!
//! Holds one [`Roster`] per organization behind its own async mutex. Every
//! mutation goes through an [`OrganizationTransaction`]: it locks the
//! organization, works on a copy of the roster and swaps the copy in on
//! [`commit`](OrganizationTransaction::commit). Dropping a transaction without
//! committing discards every change.
//!
//! Two secondary indexes map invitation token digests and membership IDs to
//! their organization so token- and membership-addressed operations can find
//! the roster to lock. Lock order is always organization first, then indexes.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tenant_org::{
    normalize_email, Invitation, ListOrder, Membership, MembershipStatus, Organization, Roster, TeamError,
    TeamResult,
};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

/// In-memory, per-organization serialized membership store.
#[derive(Debug, Default)]
pub struct MembershipStore {
    rosters: RwLock<HashMap<Uuid, Arc<Mutex<Roster>>>>,
    slugs: RwLock<HashMap<String, Uuid>>,
    tokens: RwLock<HashMap<String, Uuid>>,
    memberships: RwLock<HashMap<Uuid, Uuid>>,
}

impl MembershipStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an organization together with its active owner membership.
    pub async fn create_organization(
        &self,
        name: &str,
        slug: &str,
        owner_id: Uuid,
        owner_email: &str,
        now: DateTime<Utc>,
    ) -> TeamResult<Organization> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TeamError::Validation("organization name must not be empty".to_string()));
        }
        let slug = slug.trim().to_lowercase();
        if slug.is_empty() || !slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(TeamError::Validation(format!("invalid organization slug '{}'", slug)));
        }
        let owner_email = normalize_email(owner_email)?;

        let organization = Organization::created_at(name, slug.clone(), owner_id, now);
        let roster = Roster::new(organization.clone(), owner_email);

        let mut rosters = self.rosters.write().await;
        let mut slugs = self.slugs.write().await;
        if slugs.contains_key(&slug) {
            return Err(TeamError::Validation(format!("organization slug '{}' is taken", slug)));
        }
        slugs.insert(slug, organization.id);
        {
            let mut memberships = self.memberships.write().await;
            for membership in roster.memberships() {
                memberships.insert(membership.id, organization.id);
            }
        }
        rosters.insert(organization.id, Arc::new(Mutex::new(roster)));

        info!(organization_id = %organization.id, owner_id = %owner_id, "Organization created");
        Ok(organization)
    }

    /// Lock `organization_id` and start a transaction on its roster.
    ///
    /// Concurrent transactions on the same organization queue behind the
    /// lock; different organizations never contend.
    pub async fn transaction(&self, organization_id: Uuid) -> TeamResult<OrganizationTransaction<'_>> {
        let roster = self.roster_handle(organization_id).await?;
        let guard = roster.lock_owned().await;
        let working = guard.clone();
        Ok(OrganizationTransaction {
            store: self,
            guard,
            working,
        })
    }

    /// Run `f` on the roster of `organization_id` and commit if it succeeds.
    pub async fn with_organization_lock<T, F>(&self, organization_id: Uuid, f: F) -> TeamResult<T>
    where
        F: FnOnce(&mut Roster) -> TeamResult<T>,
    {
        let mut tx = self.transaction(organization_id).await?;
        let value = f(tx.roster_mut())?;
        tx.commit().await?;
        Ok(value)
    }

    /// Organization holding the invitation with `token_hash`.
    pub async fn organization_for_token(&self, token_hash: &str) -> Option<Uuid> {
        self.tokens.read().await.get(token_hash).copied()
    }

    /// Organization holding `membership_id`.
    pub async fn organization_of_membership(&self, membership_id: Uuid) -> Option<Uuid> {
        self.memberships.read().await.get(&membership_id).copied()
    }

    /// Organization holding `membership_id`, failing with `NotFound`.
    pub async fn require_organization_of_membership(&self, membership_id: Uuid) -> TeamResult<Uuid> {
        self.organization_of_membership(membership_id)
            .await
            .ok_or_else(|| TeamError::NotFound(format!("membership {}", membership_id)))
    }

    /// Consistent copy of an organization's roster.
    pub async fn snapshot(&self, organization_id: Uuid) -> TeamResult<Roster> {
        let roster = self.roster_handle(organization_id).await?;
        let guard = roster.lock().await;
        Ok(guard.clone())
    }

    /// The organization record.
    pub async fn organization(&self, organization_id: Uuid) -> TeamResult<Organization> {
        Ok(self.snapshot(organization_id).await?.organization().clone())
    }

    /// Look up a membership by ID.
    pub async fn get_membership(&self, membership_id: Uuid) -> TeamResult<Membership> {
        let organization_id = self.require_organization_of_membership(membership_id).await?;
        let roster = self.roster_handle(organization_id).await?;
        let guard = roster.lock().await;
        guard.require_membership(membership_id).cloned()
    }

    /// Number of active memberships, optionally excluding the owner.
    pub async fn count_active(&self, organization_id: Uuid, exclude_owner: bool) -> TeamResult<usize> {
        let roster = self.roster_handle(organization_id).await?;
        let guard = roster.lock().await;
        Ok(guard.count_active(exclude_owner))
    }

    /// Memberships in `status`, ordered by join time (invite time for pending).
    pub async fn list_by_status(
        &self,
        organization_id: Uuid,
        status: MembershipStatus,
        order: ListOrder,
    ) -> TeamResult<Vec<Membership>> {
        let roster = self.roster_handle(organization_id).await?;
        let guard = roster.lock().await;
        Ok(guard.list_by_status(status, order))
    }

    /// Outstanding invitations, oldest first.
    pub async fn pending_invitations(&self, organization_id: Uuid) -> TeamResult<Vec<Invitation>> {
        let roster = self.roster_handle(organization_id).await?;
        let guard = roster.lock().await;
        Ok(guard.pending_invitations().into_iter().cloned().collect())
    }

    /// Number of organizations held.
    pub async fn organization_count(&self) -> usize {
        self.rosters.read().await.len()
    }

    async fn roster_handle(&self, organization_id: Uuid) -> TeamResult<Arc<Mutex<Roster>>> {
        self.rosters
            .read()
            .await
            .get(&organization_id)
            .cloned()
            .ok_or_else(|| TeamError::NotFound(format!("organization {}", organization_id)))
    }

    async fn reindex(&self, before: &Roster, after: &Roster) {
        let organization_id = after.organization_id();

        let old_tokens: HashSet<&str> = before.invitations().iter().map(|i| i.token_hash.as_str()).collect();
        let new_tokens: HashSet<&str> = after.invitations().iter().map(|i| i.token_hash.as_str()).collect();
        if old_tokens != new_tokens {
            let mut tokens = self.tokens.write().await;
            for stale in old_tokens.difference(&new_tokens) {
                tokens.remove(*stale);
            }
            for fresh in new_tokens.difference(&old_tokens) {
                tokens.insert((*fresh).to_string(), organization_id);
            }
        }

        let old_ids: HashSet<Uuid> = before.memberships().iter().map(|m| m.id).collect();
        let new_ids: HashSet<Uuid> = after.memberships().iter().map(|m| m.id).collect();
        if old_ids != new_ids {
            let mut memberships = self.memberships.write().await;
            for stale in old_ids.difference(&new_ids) {
                memberships.remove(stale);
            }
            for fresh in new_ids.difference(&old_ids) {
                memberships.insert(*fresh, organization_id);
            }
        }
    }
}

/// Exclusive, all-or-nothing unit of work on one organization.
pub struct OrganizationTransaction<'a> {
    store: &'a MembershipStore,
    guard: OwnedMutexGuard<Roster>,
    working: Roster,
}

impl std::fmt::Debug for OrganizationTransaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrganizationTransaction")
            .field("organization_id", &self.working.organization_id())
            .finish()
    }
}

impl OrganizationTransaction<'_> {
    /// The locked organization.
    pub fn organization_id(&self) -> Uuid {
        self.working.organization_id()
    }

    /// Roster as modified so far.
    pub fn roster(&self) -> &Roster {
        &self.working
    }

    /// Mutable access to the working roster.
    pub fn roster_mut(&mut self) -> &mut Roster {
        &mut self.working
    }

    /// Publish every change made in this transaction and release the lock.
    pub async fn commit(self) -> TeamResult<()> {
        let Self {
            store,
            mut guard,
            working,
        } = self;
        store.reindex(&guard, &working).await;
        *guard = working;
        Ok(())
    }

    /// Discard every change and release the lock.
    pub fn rollback(self) {
        debug!(organization_id = %self.working.organization_id(), "Transaction rolled back");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenant_org::OrganizationRole;

    async fn store_with_org() -> (MembershipStore, Organization) {
        let store = MembershipStore::new();
        let org = store
            .create_organization("Acme", "acme", Uuid::now_v7(), "Owner@Acme.io", Utc::now())
            .await
            .unwrap();
        (store, org)
    }

    #[tokio::test]
    async fn test_create_organization_indexes_owner() {
        let (store, org) = store_with_org().await;
        let roster = store.snapshot(org.id).await.unwrap();
        let owner = roster.owner().unwrap();

        assert_eq!(owner.email(), "owner@acme.io");
        assert_eq!(store.organization_of_membership(owner.id).await, Some(org.id));
        assert_eq!(store.count_active(org.id, true).await.unwrap(), 0);
        assert_eq!(store.count_active(org.id, false).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_slug_rejected() {
        let (store, _) = store_with_org().await;
        let err = store
            .create_organization("Other", "ACME", Uuid::now_v7(), "x@y.io", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, TeamError::Validation(_)));
        assert_eq!(store.organization_count().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_organization_not_found() {
        let store = MembershipStore::new();
        let err = store.transaction(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, TeamError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_commit_publishes_changes() {
        let (store, org) = store_with_org().await;
        let now = Utc::now();

        let mut tx = store.transaction(org.id).await.unwrap();
        let pending = tx
            .roster_mut()
            .create_pending_membership(org.owner_id, "a@x.com", OrganizationRole::Member, now)
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.organization_of_membership(pending.id).await, Some(org.id));
        let listed = store
            .list_by_status(org.id, MembershipStatus::Pending, ListOrder::Ascending)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_drop_rolls_back() {
        let (store, org) = store_with_org().await;
        let now = Utc::now();

        {
            let mut tx = store.transaction(org.id).await.unwrap();
            tx.roster_mut()
                .create_pending_membership(org.owner_id, "a@x.com", OrganizationRole::Member, now)
                .unwrap();
        }
        let tx = store.transaction(org.id).await.unwrap();
        assert_eq!(tx.roster().count_with_status(MembershipStatus::Pending), 0);
        tx.rollback();
    }

    #[tokio::test]
    async fn test_failed_closure_does_not_commit() {
        let (store, org) = store_with_org().await;
        let now = Utc::now();

        let result: TeamResult<()> = store
            .with_organization_lock(org.id, |roster| {
                roster.create_pending_membership(org.owner_id, "a@x.com", OrganizationRole::Member, now)?;
                Err(TeamError::Validation("abort".to_string()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(
            store.snapshot(org.id).await.unwrap().count_with_status(MembershipStatus::Pending),
            0
        );
    }

    #[tokio::test]
    async fn test_token_index_follows_invitations() {
        let (store, org) = store_with_org().await;
        let now = Utc::now();

        let mut tx = store.transaction(org.id).await.unwrap();
        let pending = tx
            .roster_mut()
            .create_pending_membership(org.owner_id, "a@x.com", OrganizationRole::Member, now)
            .unwrap();
        let invitation = Invitation {
            id: Uuid::now_v7(),
            organization_id: org.id,
            membership_id: pending.id,
            email: "a@x.com".to_string(),
            role: OrganizationRole::Member,
            token_hash: "digest-1".to_string(),
            invited_by: org.owner_id,
            inviter_email: "owner@acme.io".to_string(),
            created_at: now,
            expires_at: now + chrono::Duration::days(7),
        };
        tx.roster_mut().attach_invitation(invitation).unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.organization_for_token("digest-1").await, Some(org.id));

        store
            .with_organization_lock(org.id, |roster| {
                roster.replace_invitation_token(pending.id, "digest-2".to_string(), now, now + chrono::Duration::days(7))
            })
            .await
            .unwrap();
        assert_eq!(store.organization_for_token("digest-1").await, None);
        assert_eq!(store.organization_for_token("digest-2").await, Some(org.id));

        store
            .with_organization_lock(org.id, |roster| roster.delete_pending_membership(pending.id))
            .await
            .unwrap();
        assert_eq!(store.organization_for_token("digest-2").await, None);
        assert_eq!(store.organization_of_membership(pending.id).await, None);
    }

    #[tokio::test]
    async fn test_transactions_serialize_per_organization() {
        let (store, org) = store_with_org().await;
        let store = Arc::new(store);
        let now = Utc::now();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            let (org_id, owner_id) = (org.id, org.owner_id);
            handles.push(tokio::spawn(async move {
                let mut tx = store.transaction(org_id).await.unwrap();
                tx.roster_mut()
                    .create_pending_membership(owner_id, &format!("user{}@x.com", i), OrganizationRole::Member, now)
                    .unwrap();
                tokio::task::yield_now().await;
                tx.commit().await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(
            store.snapshot(org.id).await.unwrap().count_with_status(MembershipStatus::Pending),
            16
        );
    }
}
