//! livestyle-app - Session state and patch transactions for LiveStyle
//!
//! This crate holds the immutable state [`Store`] with its reducers and
//! subscribers, the session registry and auto-mapper, diff routing, the patch
//! transaction manager, configuration loading and page persistence. The
//! [`Engine`] ties them together behind one message channel.

pub mod action;
pub(crate) mod actions;
pub mod auto_map;
pub mod config;
pub mod diff_queue;
pub mod engine;
pub mod message;
pub mod persistence;
pub mod reducers;
pub mod registry;
pub mod router;
pub mod state;
pub mod store;
pub mod subscribers;
pub mod transaction;

// Re-export primary types
pub use action::Action;
pub use engine::Engine;
pub use message::{Message, Outgoing};
pub use persistence::{PersistedState, StateFile, StateSaver};
pub use state::{AppState, Session};
pub use store::{Context, Store, SubscriptionId};
pub use transaction::{TransactionManager, TxKey, TxPhase};
