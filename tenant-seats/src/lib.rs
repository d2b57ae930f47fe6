//! # Tenant Seats
//!
//! Membership, invitation and seat-reconciliation services for multi-tenant
//! organizations. Builds on the domain model in `tenant-org` and publishes
//! membership events through `tenant-events`.
//!
//! ## Overview
//!
//! - **Store**: Per-organization serialized roster transactions
//! - **Entitlement**: Seat limit from the current subscription
//! - **Invitations**: Issue, accept, resend and revoke single-use tokens
//! - **Reconciler**: Suspend or reinstate members to match the seat limit
//! - **Service**: Facade an API layer calls
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tenant_org::{Plan, SubscriptionSnapshot, SubscriptionStatus};
//! use tenant_seats::{Actor, InMemorySubscriptions, TeamSeatConfig, TeamService};
//! use uuid::Uuid;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let subscriptions = Arc::new(InMemorySubscriptions::new());
//! let service = TeamService::builder(TeamSeatConfig::default(), subscriptions.clone()).build()?;
//!
//! let owner = Actor::new(Uuid::now_v7(), "owner@acme.io");
//! let org = service.create_organization("Acme", "acme", &owner).await?;
//! subscriptions
//!     .put(SubscriptionSnapshot::new(org.id, SubscriptionStatus::Active, Plan::new("team", 5)))
//!     .await;
//!
//! let outcome = service.invite(org.id, "dev@acme.io", "member", &owner).await?;
//! println!("invited: {}", outcome.invitation().email);
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod entitlement;
pub mod identity;
pub mod invitations;
pub mod notify;
pub mod reconciler;
pub mod service;
pub mod store;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, TeamSeatConfig};
pub use entitlement::{EntitlementResolver, InMemorySubscriptions, SubscriptionLookup};
pub use identity::Actor;
pub use invitations::{InvitationManager, InviteOutcome};
pub use notify::{
    AcceptanceNotice, EventPublisher, InvitationNotice, Notifier, NotifyError, SeatChangeNotice, TracingNotifier,
};
pub use reconciler::{apply_seat_limit, ReconciliationReport, SeatReconciler};
pub use service::{SeatUsage, TeamService, TeamServiceBuilder};
pub use store::{MembershipStore, OrganizationTransaction};
pub use token::{generate_token, hash_token};
