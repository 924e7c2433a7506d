//! # sd-core
//!
//! Foundational types shared by the staff directory crates.
//!
//! This crate provides:
//! - The account error taxonomy with stable codes and positional arguments
//! - Audit events for committed directory mutations
//! - The mail-sending collaborator port

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod event;
pub mod mail;

pub use error::{AccountError, AccountResult, ErrorDetail};
pub use event::{AuditEvent, EventType};
pub use mail::{LogOnlyMailSender, MailSender};
