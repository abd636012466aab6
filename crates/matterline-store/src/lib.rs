//! # matterline-store
//!
//! The in-memory entity graph of the client: teams, channels, users, posts
//! and file references, plus the gap-reconciliation algorithm that merges
//! paginated post history into a channel's local sequence.
//!
//! [`Storage`] is the single shared mutable resource of the client. It holds
//! no network or UI knowledge, performs no I/O and emits no notifications;
//! the dispatcher and session controller mutate it and tell their observers
//! afterwards. All cross-entity references are identity keys resolved
//! through the store at the moment of use, so an erased team or channel can
//! never leave a dangling pointer behind.
//!
//! There is no durable persistence: the whole graph is rebuilt from the
//! server on every (re)connect.

pub mod channels;
pub mod models;
pub mod posts;
pub mod storage;
pub mod teams;
pub mod users;

pub use models::{Channel, FileRef, Post, Team, TeamMember, User};
pub use posts::{MissingPostSequence, MissingPosts};
pub use storage::Storage;
