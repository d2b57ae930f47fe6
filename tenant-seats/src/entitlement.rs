//! Subscription lookup and seat entitlement.
//!
//! The billing side is an external collaborator reached through
//! [`SubscriptionLookup`]. [`EntitlementResolver`] pairs it with the pure
//! resolution rules from `tenant_org::entitlement`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tenant_org::{seat_limit_for, SeatLimit, SubscriptionSnapshot, TeamError, TeamResult};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Read-only access to subscription state.
#[async_trait]
pub trait SubscriptionLookup: Send + Sync {
    /// Current subscription with its plan, `None` if the organization has none.
    ///
    /// Errors are infrastructure failures and abort the calling operation.
    async fn subscription_with_plan(&self, organization_id: Uuid) -> TeamResult<Option<SubscriptionSnapshot>>;
}

/// Subscription table held in memory.
///
/// Used by tests and by deployments that mirror billing webhooks locally.
#[derive(Debug, Default)]
pub struct InMemorySubscriptions {
    subscriptions: RwLock<HashMap<Uuid, SubscriptionSnapshot>>,
}

impl InMemorySubscriptions {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the snapshot for its organization.
    pub async fn put(&self, snapshot: SubscriptionSnapshot) {
        self.subscriptions
            .write()
            .await
            .insert(snapshot.organization_id, snapshot);
    }

    /// Drop the subscription of an organization.
    pub async fn remove(&self, organization_id: Uuid) -> Option<SubscriptionSnapshot> {
        self.subscriptions.write().await.remove(&organization_id)
    }
}

#[async_trait]
impl SubscriptionLookup for InMemorySubscriptions {
    async fn subscription_with_plan(&self, organization_id: Uuid) -> TeamResult<Option<SubscriptionSnapshot>> {
        Ok(self.subscriptions.read().await.get(&organization_id).cloned())
    }
}

/// Resolves the current seat limit of an organization.
#[derive(Clone)]
pub struct EntitlementResolver {
    subscriptions: Arc<dyn SubscriptionLookup>,
}

impl std::fmt::Debug for EntitlementResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitlementResolver").finish_non_exhaustive()
    }
}

impl EntitlementResolver {
    /// Create a resolver over a subscription source.
    pub fn new(subscriptions: Arc<dyn SubscriptionLookup>) -> Self {
        Self { subscriptions }
    }

    /// Effective seat limit of `organization_id` at `now`.
    pub async fn current_limit(&self, organization_id: Uuid, now: DateTime<Utc>) -> TeamResult<SeatLimit> {
        let snapshot = self
            .subscriptions
            .subscription_with_plan(organization_id)
            .await
            .map_err(|e| match e {
                TeamError::Infrastructure(_) => e,
                other => TeamError::Infrastructure(format!("subscription lookup failed: {}", other)),
            })?;
        Ok(seat_limit_for(snapshot.as_ref(), now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tenant_org::{Plan, SubscriptionStatus};

    struct FailingLookup;

    #[async_trait]
    impl SubscriptionLookup for FailingLookup {
        async fn subscription_with_plan(&self, _organization_id: Uuid) -> TeamResult<Option<SubscriptionSnapshot>> {
            Err(TeamError::Infrastructure("billing unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_resolver_reads_current_snapshot() {
        let table = Arc::new(InMemorySubscriptions::new());
        let org_id = Uuid::now_v7();
        let resolver = EntitlementResolver::new(table.clone());
        let now = Utc::now();

        assert_eq!(resolver.current_limit(org_id, now).await.unwrap(), SeatLimit::Limited(0));

        let snapshot = SubscriptionSnapshot::new(org_id, SubscriptionStatus::Trialing, Plan::new("team", 3));
        table.put(snapshot.clone()).await;
        assert_eq!(resolver.current_limit(org_id, now).await.unwrap(), SeatLimit::Limited(3));

        table
            .put(snapshot.paused(now, Some(now + Duration::days(30))))
            .await;
        assert_eq!(resolver.current_limit(org_id, now).await.unwrap(), SeatLimit::Limited(0));
    }

    #[tokio::test]
    async fn test_lookup_failure_is_infrastructure() {
        let resolver = EntitlementResolver::new(Arc::new(FailingLookup));
        let err = resolver.current_limit(Uuid::now_v7(), Utc::now()).await.unwrap_err();
        assert!(err.is_server_error());
    }
}
