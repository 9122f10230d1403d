//! # Boardsync Client
//!
//! The async half of boardsync: a path-addressed document store with live
//! queries and optimistic transactions, typed repositories, the access
//! layer guarding every mutation, and the subscription manager that feeds
//! an observable board view.
//!
//! ## Data Flow
//!
//! Callers invoke [`Access`] operations; the store applies the writes
//! (transactionally where ordering is at stake) and notifies its listeners;
//! the subscription manager forwards normalized snapshots into the
//! [`BoardHandle`]; view code observes the board through a watch channel
//! and renders. Failed operations never touch the board - the view stays
//! on the last successfully observed snapshot.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use boardsync_client::{subscribe, Access, BoardHandle, DocStore, IdentityProvider, NullSink};
//!
//! # #[tokio::main]
//! # async fn main() -> boardsync_client::Result<()> {
//! let store = DocStore::new();
//! let identity = Arc::new(IdentityProvider::new());
//! identity.sign_in("owner-1", "owner@example.com");
//!
//! // All mutations go through the access layer.
//! let access = Access::new(store.clone(), Arc::clone(&identity));
//! access.initialize_owner().await?;
//!
//! // The board mirrors the hierarchy while the subscription lives.
//! let board = BoardHandle::new();
//! let uid = identity.current().map(|s| s.uid).unwrap_or_default();
//! let subscription = subscribe(&store, &uid, &board, Arc::new(NullSink));
//!
//! access.create_list_appended_last("errands").await?;
//! subscription.cancel();
//! # Ok(())
//! # }
//! ```

pub mod access;
pub mod auth;
pub mod board;
pub mod config;
pub mod error;
pub mod notify;
pub mod repo;
pub mod schema;
pub mod store;
pub mod subscribe;

// Re-export main types at crate root
pub use access::Access;
pub use auth::{IdentityProvider, Session};
pub use board::BoardHandle;
pub use config::{Config, ConfigError, DEFAULT_TRANSACTION_ATTEMPTS};
pub use error::{AccessError, Result};
pub use notify::{ChannelSink, Notification, NotificationKind, NotificationSink, NullSink};
pub use store::{
    ChangeStream, CollectionPath, Direction, DocStore, Document, DocumentId, DocumentPath, Query,
    StoreError, Transaction,
};
pub use subscribe::{subscribe, SubscriptionHandle};

/// Re-export of the pure engine crate.
pub use boardsync_engine as engine;
