//! # sd-cache
//!
//! Read-through cache for directory lookups.
//!
//! Directory searches are expensive, so frequently repeated lookups (group by
//! name, member info by uid, distinct-value listings) are served from memory
//! until a mutation invalidates them.
//!
//! ## Cache Providers
//!
//! - [`CacheProvider`] - The port the directory service talks to
//! - [`MemoryCache`] - Concurrent in-memory implementation with per-key
//!   single-flight computation and time-bounded negative entries
//!
//! ## Example
//!
//! ```ignore
//! use sd_cache::{CacheProvider, CacheSettings, MemoryCache};
//!
//! let groups = MemoryCache::<String, Group>::new("group_by_cn", CacheSettings::default());
//! let group = groups
//!     .get_or_try_insert_with(cn.clone(), || async { lookup(&cn).await })
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod memory;
pub mod provider;

pub use memory::{CacheSettings, MemoryCache, DAILY, DEFAULT_NEGATIVE_TTL};
pub use provider::CacheProvider;
