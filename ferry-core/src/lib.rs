//! # Ferry Core
//!
//! The in-memory message store behind the Ferry relay.
//!
//! ## Features
//!
//! - Thread-safe storage using `DashMap`
//! - Fixed, absolute TTL per entry (24 hours by default); reads never extend it
//! - Per-entry expiration tasks guarded by a write generation, so a stale task
//!   can never delete a newer entry stored under the same identifier
//! - Logical expiry on read, independent of when physical deletion happens
//! - Background sweep as a backstop
//!
//! ## Example
//!
//! ```rust,no_run
//! use ferry_core::{Store, StoreConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     // 24 hour TTL
//!     let store = Store::new();
//!
//!     // Or with a custom TTL
//!     let config = StoreConfig::default().with_ttl(Duration::from_secs(600));
//!     let store = Store::with_config(config);
//!
//!     store.put("bold-star-7", "hello");
//!
//!     match store.get("bold-star-7") {
//!         Some(content) => println!("found: {}", content),
//!         None => println!("not found"),
//!     }
//! }
//! ```

mod config;
mod entry;
mod store;

pub use config::{StoreConfig, DEFAULT_CLEANUP_INTERVAL, DEFAULT_TTL, MAX_TTL, MIN_CLEANUP_INTERVAL};
pub use entry::Entry;
pub use store::Store;
