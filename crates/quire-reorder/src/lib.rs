//! # quire-reorder
//!
//! Releases versioned items (document deltas, typically) in version order,
//! buffering anything that arrives ahead of a gap and signaling when a gap
//! has stayed open too long.
//!
//! ```
//! use quire_reorder::{ManualTimerFactory, Reorderer};
//! use std::sync::{Arc, Mutex};
//! use std::time::Duration;
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = {
//!     let seen = seen.clone();
//!     move |item: char, _version: u64| seen.lock().unwrap().push(item)
//! };
//! let factory = ManualTimerFactory::new();
//! let mut reorderer: Reorderer<char> =
//!     Reorderer::new(3, sink, Duration::from_secs(1), |_| {}, &factory).unwrap();
//!
//! reorderer.accept_item('c', 5);
//! reorderer.accept_item('a', 3);
//! reorderer.accept_item('b', 4);
//! assert_eq!(*seen.lock().unwrap(), vec!['a', 'b', 'c']);
//! ```

pub mod config;
pub mod error;
pub mod reorderer;
pub mod timer;

/// Monotonic version number attached to each item.
pub type Version = u64;

pub use config::{ReordererConfig, ReordererConfigBuilder};
pub use error::{ReorderError, Result};
pub use reorderer::{ItemSink, Reorderer};
pub use timer::{ManualTimer, ManualTimerFactory, TimerCallback, Timer, TimerFactory, TokioTimerFactory};
