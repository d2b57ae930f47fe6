//! # Tenant Events
//!
//! This crate provides the membership event stream of the tenant team
//! crates: typed events for every committed roster change and an event bus
//! to publish them on.
//!
//! ## Overview
//!
//! The tenant-events crate handles:
//! - **Event Envelope**: `Event` with organization and user routing context
//! - **Team Events**: `TeamEvent` for invitations, joins, role changes,
//!   removals and seat reconciliation
//! - **Event Bus**: Publish/subscribe messaging with wildcard topics
//!
//! ## Features
//!
//! - `memory` (default): In-memory event bus for single-process apps
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tenant_events::{EventBus, MemoryEventBus, TeamEvent};
//! use uuid::Uuid;
//!
//! async fn example() {
//!     let bus = MemoryEventBus::new();
//!     let mut sub = bus.subscribe("team.member.*").await.unwrap();
//!
//!     let event = TeamEvent::MemberRemoved {
//!         membership_id: Uuid::now_v7(),
//!         removed_by: Uuid::now_v7(),
//!     };
//!     bus.publish(event.to_event(Uuid::now_v7()).unwrap()).await.unwrap();
//!
//!     let received = sub.recv().await.unwrap();
//!     assert_eq!(received.event_type, "member.removed");
//! }
//! ```
//!
//! ## Topic Patterns
//!
//! Topics are structured as `team.{event_type}`:
//! - `team.member.joined` - Specific event
//! - `team.member.*` - All member events
//! - `team.#` - All membership events
//!
//! Wildcards:
//! - `*` matches exactly one segment
//! - `#` matches zero or more segments

pub mod bus;
pub mod types;

// Re-export main types
pub use bus::{EventBus, EventBusError, EventBusResult, EventBusStats, MemoryEventBus, Subscription};
pub use types::{Event, TeamEvent, TOPIC_PREFIX};
