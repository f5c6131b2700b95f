//! POP3 retrieval server module
//!
//! Serves the captured messages back to mail clients. Authentication
//! is accepted unconditionally; there is exactly one maildrop, the
//! shared store.

mod command;
mod response;
mod server;
mod session;

pub use command::Pop3Command;
pub use response::Pop3Response;
pub use server::{Pop3Server, Pop3ServerConfig};
pub use session::{Pop3Session, Pop3State};
