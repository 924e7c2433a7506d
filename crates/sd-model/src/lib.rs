//! # sd-model
//!
//! Domain models for the staff directory (users and groups).
//!
//! All entities are value objects without back-references. The directory is
//! the system of record; these types are what application code sees.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod group;
pub mod user;

pub use group::{Group, GroupClassification, GroupInfo, GroupType, PREFIX_SEPARATOR};
pub use user::{User, UserInfo, UserState, UNKNOWN};
