//! Mailstub Core - SMTP capture and POP3 retrieval servers
//!
//! This crate provides the two protocol engines and the TCP servers
//! that drive them. An SMTP server and a POP3 server are bound to the
//! same shared mail store: whatever the SMTP side captures, the POP3
//! side serves back.

pub mod pop3;
pub mod smtp;

pub use pop3::{Pop3Server, Pop3ServerConfig};
pub use smtp::{SmtpServer, SmtpServerConfig};
