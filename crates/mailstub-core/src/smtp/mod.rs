//! SMTP capture server module
//!
//! Accepts mail submissions and stores them in the shared mail store.
//! Nothing is ever relayed anywhere.

mod command;
mod response;
mod server;
mod session;

pub use command::SmtpCommand;
pub use response::SmtpReply;
pub use server::{SmtpServer, SmtpServerConfig};
pub use session::{SmtpSession, SmtpState};
