//! # huddle-core
//!
//! The in-process hub for the Huddle chat service.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **SessionRegistry** - username presence keyed by connection
//! - **RoomDirectory** - room membership and broadcast target resolution
//! - **TypingTracker** - the global typing indicator set
//! - **MessageRouter** - validates inbound events, mutates hub state, and
//!   fans outbound events out through the [`Outbound`] port
//! - **MessageStore** - the persistence collaborator interface
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌───────────────┐     ┌───────────────┐
//! │  Transport  │────▶│ MessageRouter │────▶│ RoomDirectory │
//! └─────────────┘     └───────────────┘     └───────────────┘
//!        ▲                   │  │
//!        │                   │  └─────▶ SessionRegistry / TypingTracker
//!        └── Outbound ◀──────┘
//!                            └─────▶ MessageStore (durable history)
//! ```
//!
//! All shared state is injected into the router at construction; there are
//! no ambient singletons.

pub mod outbound;
pub mod registry;
pub mod rooms;
pub mod router;
pub mod store;
pub mod typing;

pub use outbound::Outbound;
pub use registry::SessionRegistry;
pub use rooms::RoomDirectory;
pub use router::{MessageRouter, RouterConfig, RouterError};
pub use store::{MemoryStore, MessageId, MessageStore, StoreError};
pub use typing::TypingTracker;
