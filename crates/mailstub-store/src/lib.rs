//! Mailstub Store - captured message model and bounded storage
//!
//! This crate holds the `MailMessage` value type built up by the SMTP
//! engine and the fixed-capacity store shared between the SMTP and POP3
//! servers.

pub mod message;
pub mod store;

pub use message::MailMessage;
pub use store::{FixedSizeMailStore, SharedMailStore};
