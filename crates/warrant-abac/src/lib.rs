//! # warrant-abac: Attribute-Based Access Control
//!
//! Decides whether subjects may perform actions on objects, based on scoped
//! policies kept in a pluggable store. Granted decisions carry the matching
//! policies so callers can also check time windows and request locations and
//! project payloads down to the fields they may see.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Access Request                              │
//! │  (Subjects + Action + Object + Strictness)   │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  AccessControl                               │
//! │  ├─ Expand into exact and wildcard queries   │
//! │  ├─ Match canonical keys in the PolicyStore  │
//! │  └─ Merge matches into one Grant             │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Permission                                  │
//! │  - granted flag                              │
//! │  - time / location checks                    │
//! │  - field / filter projection                 │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Keys
//!
//! Every policy is indexed by a canonical key built by [`KeyCodec`]:
//!
//! ```text
//! user:null:read:own:article:all
//! ^^^^ ^^^^ ^^^^ ^^^ ^^^^^^^ ^^^
//! subject   action   object  (each followed by its scope)
//! ```
//!
//! A missing scope takes the axis default: `null` for subjects, `any` for
//! actions, `all` for objects. A strict query axis only matches the exact
//! scope; a loose one matches any scope.
//!
//! ## Examples
//!
//! ```
//! use warrant_abac::{AccessControl, CanOptions, Policy};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> warrant_abac::Result<()> {
//! let mut access = AccessControl::in_memory();
//! access
//!     .update(Policy::new("user", "read:shared", "article").with_filter(["*", "!owner"]))
//!     .await?;
//!
//! let permission = access
//!     .can(&["user"], "read", "article", CanOptions::new().with_strict(false))
//!     .await?;
//! assert!(permission.granted());
//!
//! let article = json!({"title": "hello", "owner": "someone"});
//! assert_eq!(permission.filter(&article, None)?, json!({"title": "hello"}));
//! # Ok(())
//! # }
//! ```

mod error;

pub mod access;
pub mod grant;
pub mod key;
pub mod location;
pub mod notation;
pub mod permission;
pub mod policy;
pub mod store;
pub mod time;
pub mod validate;


pub use access::{AccessControl, CanOptions, Predicate};
pub use error::{AccessError, Result, StoreError};
pub use grant::Grant;
pub use key::{Criterion, KeyCodec, Matcher, Query, ScopedValue, Strictness};
pub use permission::Permission;
pub use policy::{ALL, ANY, Axis, NULL, Policy};
pub use store::{MemoryDriver, PolicyStore};
pub use time::{TimeOptions, TimeWindow};
