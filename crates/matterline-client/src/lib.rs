//! # matterline-client
//!
//! Orchestration of the synchronization core: the backend task owning the
//! entity store, the event dispatcher, the outgoing post pipeline, the
//! session/login controller and the persisted login settings.
//!
//! A UI embeds this crate by spawning the backend and wiring the two
//! channels:
//!
//! ```no_run
//! use matterline_client::{Backend, BackendCommand, LoginSettings};
//!
//! # async fn run() {
//! let (commands, mut notifications) = Backend::spawn(LoginSettings::load());
//!
//! commands
//!     .send(BackendCommand::Login {
//!         domain: "chat.example.org".into(),
//!         username: "ana".into(),
//!         password: "secret".into(),
//!     })
//!     .await
//!     .unwrap();
//!
//! while let Some(notification) = notifications.recv().await {
//!     // render
//!     let _ = notification;
//! }
//! # }
//! ```

pub mod backend;
pub mod dispatcher;
pub mod notify;
pub mod outgoing;
pub mod session;
pub mod settings;

mod error;

pub use backend::{Backend, BackendCommand};
pub use error::{ClientError, Result};
pub use notify::ClientNotification;
pub use outgoing::{OutgoingPostCreator, SendAction};
pub use settings::LoginSettings;

/// Install the default tracing subscriber, honoring `RUST_LOG`. Binaries
/// call this once at startup; tests and embedding UIs may install their
/// own subscriber instead.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
