//! Application layer for termbase.
//!
//! [`ApplicationContext`] is what a front end holds: it owns the working
//! copy's [`Workspace`](termbase_workspace::Workspace), its repository
//! controller and the single-instance lock, exposes the query API
//! (`search`/`get`/`put`), and runs synchronization. UI-facing signals are
//! delivered as [`AppEvent`]s through a [`Notifier`].

pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod lock;

pub use config::AppConfig;
pub use context::{ApplicationContext, Status, SyncOutcome};
pub use error::{AppError, AppResult};
pub use events::{AppEvent, ChannelNotifier, Notifier, NullNotifier};
pub use lock::InstanceLock;
