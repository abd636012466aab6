//! # matterline-net
//!
//! The two I/O collaborators of the client: a thin HTTP connector with the
//! typed REST endpoints, and the persistent event-socket task delivering
//! decoded real-time events over an mpsc channel.
//!
//! Nothing in this crate touches the entity store; responses and events are
//! handed to the client crate, which applies them on its single mutation
//! task.

pub mod api;
pub mod http;
pub mod socket;

mod error;

pub use error::{NetError, Result};
pub use http::HttpClient;
pub use socket::{spawn_socket, SocketCommand, SocketNotification};
