//! Entitlement resolver
//!
//! Computes how many non-owner seats an organization is entitled to from its
//! subscription snapshot. Deterministic, side-effect free: callers apply the
//! result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::subscription::SubscriptionSnapshot;

/// Effective non-owner seat limit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "seats", rename_all = "snake_case")]
pub enum SeatLimit {
    /// At most this many active non-owner members
    Limited(u32),

    /// No cap
    Unlimited,
}

impl SeatLimit {
    /// Check whether one more member may be activated when `active` seats are taken.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenant_org::SeatLimit;
    ///
    /// assert!(SeatLimit::Limited(2).admits(1));
    /// assert!(!SeatLimit::Limited(2).admits(2));
    /// assert!(SeatLimit::Unlimited.admits(10_000));
    /// ```
    pub fn admits(&self, active: usize) -> bool {
        match self {
            SeatLimit::Unlimited => true,
            SeatLimit::Limited(limit) => active < *limit as usize,
        }
    }

    /// Free seats when `active` seats are taken; `None` when unlimited.
    pub fn available(&self, active: usize) -> Option<u32> {
        match self {
            SeatLimit::Unlimited => None,
            SeatLimit::Limited(limit) => Some(limit.saturating_sub(active as u32)),
        }
    }

    /// Numeric limit, `None` when unlimited.
    pub fn as_limit(&self) -> Option<u32> {
        match self {
            SeatLimit::Unlimited => None,
            SeatLimit::Limited(limit) => Some(*limit),
        }
    }
}

impl std::fmt::Display for SeatLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeatLimit::Unlimited => f.write_str("unlimited"),
            SeatLimit::Limited(limit) => write!(f, "{}", limit),
        }
    }
}

/// Resolve the seat limit granted by `subscription` at `now`.
///
/// - Paused (and the pause has not elapsed): 0
/// - `max_seats == -1`: unlimited
/// - Otherwise: `max_seats` (negative values other than -1 clamp to 0)
pub fn effective_seat_limit(subscription: &SubscriptionSnapshot, now: DateTime<Utc>) -> SeatLimit {
    if subscription.is_paused_at(now) {
        return SeatLimit::Limited(0);
    }
    if subscription.plan.is_unlimited() {
        return SeatLimit::Unlimited;
    }
    SeatLimit::Limited(subscription.plan.max_seats.max(0) as u32)
}

/// Resolve the seat limit for an organization that may have no subscription.
///
/// Without a subscription only the owner is entitled.
pub fn seat_limit_for(subscription: Option<&SubscriptionSnapshot>, now: DateTime<Utc>) -> SeatLimit {
    subscription
        .map(|s| effective_seat_limit(s, now))
        .unwrap_or(SeatLimit::Limited(0))
}
