//! Directory service integration tests.
//!
//! These tests drive the complete account operations against the in-memory
//! directory, covering mapping, allocation, uniqueness, change sets and
//! cache invalidation together.

mod common;
mod allocation;
mod groups;
mod passwords;
mod users;
