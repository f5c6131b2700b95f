//! SMTP reply representation
//!
//! During DATA collection the server stays silent, so the engine hands
//! an explicit `NoReply` back to the session driver instead of using a
//! sentinel reply code.

/// What the server should send back after processing one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpReply {
    /// A complete reply line (or lines), including the numeric code.
    Reply(String),
    /// Nothing is written; the line was message content.
    NoReply,
}

impl SmtpReply {
    /// Build a single-line reply from a code and text.
    pub fn code(code: u16, text: impl AsRef<str>) -> Self {
        SmtpReply::Reply(format!("{} {}", code, text.as_ref()))
    }

    /// The standard rejection for a command sent in the wrong state.
    pub fn bad_sequence(keyword: &str) -> Self {
        Self::code(503, format!("Bad sequence of commands: {}", keyword))
    }
}
