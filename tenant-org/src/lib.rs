//! # Tenant Organization Membership
//!
//! This crate provides the domain model of the team membership and
//! seat-entitlement engine: who belongs to an organization, with which role,
//! and whether their membership currently occupies a seat.
//!
//! ## Overview
//!
//! The tenant-org crate handles:
//! - **Roles**: Ordered organization roles and the role-authority checks
//! - **Memberships**: Pending/active/suspended/removed membership records
//! - **Invitations**: Single-use credentials bound to pending memberships
//! - **Subscriptions**: Read-only billing snapshots
//! - **Entitlement**: Seat limit resolution from a subscription snapshot
//! - **Roster**: Per-organization aggregate enforcing membership invariants
//!
//! ## Architecture
//!
//! ```text
//! Organization
//!   └─ Roster
//!        ├─ Membership (Invited{email} | Joined{user_id})
//!        │     └─ Invitation (pending only)
//!        └─ owner membership (always active)
//!
//! SubscriptionSnapshot ─→ effective_seat_limit ─→ SeatLimit
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use chrono::Utc;
//! use tenant_org::{effective_seat_limit, Organization, OrganizationRole, Plan, Roster, SeatLimit};
//! use tenant_org::{SubscriptionSnapshot, SubscriptionStatus};
//! use uuid::Uuid;
//!
//! let owner_id = Uuid::now_v7();
//! let org = Organization::new("Acme Corp", "acme-corp", owner_id);
//! let mut roster = Roster::new(org, "owner@acme.io");
//!
//! let pending = roster
//!     .create_pending_membership(owner_id, "dev@acme.io", OrganizationRole::Member, Utc::now())
//!     .unwrap();
//! assert!(pending.user_id().is_none());
//!
//! let subscription = SubscriptionSnapshot::new(roster.organization_id(), SubscriptionStatus::Active, Plan::new("team", 5));
//! assert_eq!(effective_seat_limit(&subscription, Utc::now()), SeatLimit::Limited(5));
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Serialization support (enabled by default)

pub mod entitlement;
pub mod error;
pub mod invitation;
pub mod membership;
pub mod organization;
pub mod roles;
pub mod roster;
pub mod subscription;

// Re-export main types for convenience
pub use entitlement::{effective_seat_limit, seat_limit_for, SeatLimit};
pub use error::{TeamError, TeamResult};
pub use invitation::{Invitation, InvitationSummary};
pub use membership::{normalize_email, ListOrder, Membership, MembershipStatus, MembershipSubject};
pub use organization::Organization;
pub use roles::OrganizationRole;
pub use roster::Roster;
pub use subscription::{Plan, SubscriptionSnapshot, SubscriptionStatus};
