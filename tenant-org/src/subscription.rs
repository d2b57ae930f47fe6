//! Subscription and plan snapshots
//!
//! The billing processor owns subscriptions; this crate only ever reads a
//! snapshot of one. The snapshot carries exactly what seat entitlement needs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Billing status of a subscription.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Free trial period
    Trialing,

    /// Paid and current
    Active,

    /// Payment failed, in grace period
    PastDue,

    /// Canceled by the customer
    Canceled,

    /// Payment failed past the grace period
    Unpaid,
}

impl SubscriptionStatus {
    /// Parse status from the billing processor's string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "trialing" => Some(Self::Trialing),
            "active" => Some(Self::Active),
            "past_due" => Some(Self::PastDue),
            "canceled" | "cancelled" => Some(Self::Canceled),
            "unpaid" => Some(Self::Unpaid),
            _ => None,
        }
    }

    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trialing => "trialing",
            Self::Active => "active",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
            Self::Unpaid => "unpaid",
        }
    }
}

/// Plan attached to a subscription.
///
/// # Examples
///
/// ```
/// use tenant_org::Plan;
///
/// let plan = Plan::new("team", 5);
/// assert!(!plan.is_unlimited());
/// assert!(Plan::new("enterprise", Plan::UNLIMITED_SEATS).is_unlimited());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Plan {
    /// Plan identifier (e.g. "team_starter")
    pub name: String,

    /// Maximum non-owner seats; `-1` means unlimited
    pub max_seats: i32,
}

impl Plan {
    /// Sentinel used by the billing processor for unlimited seats.
    pub const UNLIMITED_SEATS: i32 = -1;

    /// Creates a plan.
    pub fn new(name: impl Into<String>, max_seats: i32) -> Self {
        Self {
            name: name.into(),
            max_seats,
        }
    }

    /// Check if the plan grants unlimited seats.
    pub fn is_unlimited(&self) -> bool {
        self.max_seats == Self::UNLIMITED_SEATS
    }
}

/// Read-only snapshot of an organization's subscription and plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscriptionSnapshot {
    /// Organization the subscription belongs to
    pub organization_id: Uuid,

    /// Billing status
    pub status: SubscriptionStatus,

    /// When the subscription was paused, if it is
    pub paused_at: Option<DateTime<Utc>>,

    /// When the pause lifts; `None` with `paused_at` set means open-ended
    pub pause_ends_at: Option<DateTime<Utc>>,

    /// Attached plan
    pub plan: Plan,
}

impl SubscriptionSnapshot {
    /// Creates an unpaused snapshot.
    pub fn new(organization_id: Uuid, status: SubscriptionStatus, plan: Plan) -> Self {
        Self {
            organization_id,
            status,
            paused_at: None,
            pause_ends_at: None,
            plan,
        }
    }

    /// Mark the snapshot as paused.
    pub fn paused(mut self, paused_at: DateTime<Utc>, pause_ends_at: Option<DateTime<Utc>>) -> Self {
        self.paused_at = Some(paused_at);
        self.pause_ends_at = pause_ends_at;
        self
    }

    /// Check whether the subscription is paused at `now`.
    ///
    /// A pause whose end has elapsed is treated as lifted; the snapshot itself
    /// is not modified.
    pub fn is_paused_at(&self, now: DateTime<Utc>) -> bool {
        match (self.paused_at, self.pause_ends_at) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(_), Some(ends_at)) => ends_at > now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_status_parsing() {
        assert_eq!(SubscriptionStatus::parse("past_due"), Some(SubscriptionStatus::PastDue));
        assert_eq!(SubscriptionStatus::parse("Past-Due"), Some(SubscriptionStatus::PastDue));
        assert_eq!(SubscriptionStatus::parse("cancelled"), Some(SubscriptionStatus::Canceled));
        assert_eq!(SubscriptionStatus::parse("paused"), None);
    }

    #[test]
    fn test_pause_window() {
        let now = Utc::now();
        let base = SubscriptionSnapshot::new(Uuid::now_v7(), SubscriptionStatus::Active, Plan::new("team", 3));
        assert!(!base.is_paused_at(now));

        let open_ended = base.clone().paused(now - Duration::days(1), None);
        assert!(open_ended.is_paused_at(now));

        let running = base.clone().paused(now - Duration::days(1), Some(now + Duration::days(1)));
        assert!(running.is_paused_at(now));

        let elapsed = base.paused(now - Duration::days(2), Some(now - Duration::days(1)));
        assert!(!elapsed.is_paused_at(now));
    }
}
