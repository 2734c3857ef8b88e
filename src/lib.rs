//! # pdfmerge
//!
//! A per-user PDF merge bot. Users send PDF documents one at a time, ask for a
//! merge with `/merge` and name the output; the bot concatenates the queued
//! documents, appends a generated trailer page and sends the result back.
//!
//! The crate is organised around a small number of components:
//!
//! - [`session`]: per-user state machine and the [`SessionManager`] routing
//!   inbound messages
//! - [`io`]: the storage area for queued documents, PDF loading and writing
//! - [`merge`]: the merge engine and trailer page generator
//! - [`worker`]: bounded pool running merges off the event loop
//! - [`output`]: message text and throttled progress reporting
//! - [`transport`]: the message carrier boundary and a JSON-lines driver
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pdfmerge::{Config, Dispatcher, DocumentStore, JsonLinesTransport, SessionManager, Transport};
//!
//! # async fn example() -> pdfmerge::Result<()> {
//! let config = Config::default();
//! let store = DocumentStore::prepare(&config.work_dir).await?;
//! let transport: Arc<dyn Transport> = Arc::new(JsonLinesTransport::stdio(&config.outbox_dir));
//! let manager = Arc::new(SessionManager::new(&config, store, Arc::clone(&transport)));
//!
//! let stats = Dispatcher::new(manager, transport).run().await?;
//! println!("handled {} messages", stats.received);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod io;
pub mod logging;
pub mod merge;
pub mod output;
pub mod session;
pub mod transport;
pub mod utils;
pub mod worker;

pub use config::Config;
pub use dispatcher::{DispatchStats, Dispatcher};
pub use error::{MergeBotError, Result};
pub use io::{DocumentHandle, DocumentStore};
pub use merge::{MergeJob, MergeOutcome, Merger, TrailerGenerator};
pub use session::{Outcome, Reply, SessionManager, SessionStatus, SessionStore, UserId};
pub use transport::{InboundMessage, JsonLinesTransport, Transport};
pub use worker::WorkerPool;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
