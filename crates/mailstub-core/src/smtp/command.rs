//! SMTP command parsing
//!
//! One input line maps to exactly one command. Parsing depends on the
//! session state: during a DATA transaction almost every line is
//! message content, not a command, so only the terminating dot and the
//! header/body separator are recognized there.

use super::session::SmtpState;

/// A parsed SMTP client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpCommand {
    /// HELO - greet and identify the client
    Helo { client: String },
    /// EHLO - extended greeting
    Ehlo { client: String },
    /// MAIL FROM: - begin a mail transaction
    MailFrom { params: String },
    /// RCPT TO: - name a recipient
    RcptTo { params: String },
    /// DATA - start message input
    Data,
    /// The lone dot terminating message input
    DataEnd,
    /// A blank line (header/body separator inside DATA)
    BlankLine,
    /// QUIT - end the session
    Quit,
    /// RSET - discard the working message
    Rset,
    /// NOOP - no operation
    Noop,
    /// EXPN - not supported
    Expn,
    /// VRFY - not supported
    Vrfy,
    /// HELP - informational only
    Help,
    /// LIST [n] - non-standard mail store inspection command
    List { index: Option<usize> },
    /// Anything else; inside DATA this is literal message content
    Unknown { line: String },
}

impl SmtpCommand {
    /// Parse one input line (CRLF already stripped) in the context of
    /// the current session state. Command keywords are matched
    /// case-insensitively by prefix; the remainder of the line is the
    /// parameter text.
    pub fn parse(state: SmtpState, line: &str) -> SmtpCommand {
        match state {
            SmtpState::DataHeader => Self::parse_data_header(line),
            SmtpState::DataBody => Self::parse_data_body(line),
            _ => Self::parse_command(line),
        }
    }

    fn parse_data_header(line: &str) -> SmtpCommand {
        if line == "." {
            SmtpCommand::DataEnd
        } else if line.is_empty() {
            SmtpCommand::BlankLine
        } else {
            SmtpCommand::Unknown {
                line: line.to_string(),
            }
        }
    }

    fn parse_data_body(line: &str) -> SmtpCommand {
        if line == "." {
            SmtpCommand::DataEnd
        } else if line.is_empty() {
            // a blank body line becomes a literal newline in the body
            SmtpCommand::Unknown {
                line: "\n".to_string(),
            }
        } else {
            SmtpCommand::Unknown {
                line: line.to_string(),
            }
        }
    }

    fn parse_command(line: &str) -> SmtpCommand {
        if let Some(client) = strip_keyword(line, "EHLO") {
            SmtpCommand::Ehlo {
                client: client.to_string(),
            }
        } else if let Some(client) = strip_keyword(line, "HELO") {
            SmtpCommand::Helo {
                client: client.to_string(),
            }
        } else if let Some(params) = strip_prefix_ignore_ascii_case(line, "MAIL FROM:") {
            SmtpCommand::MailFrom {
                params: params.to_string(),
            }
        } else if let Some(params) = strip_prefix_ignore_ascii_case(line, "RCPT TO:") {
            SmtpCommand::RcptTo {
                params: params.to_string(),
            }
        } else if strip_prefix_ignore_ascii_case(line, "DATA").is_some() {
            SmtpCommand::Data
        } else if strip_prefix_ignore_ascii_case(line, "QUIT").is_some() {
            SmtpCommand::Quit
        } else if strip_prefix_ignore_ascii_case(line, "RSET").is_some() {
            SmtpCommand::Rset
        } else if strip_prefix_ignore_ascii_case(line, "NOOP").is_some() {
            SmtpCommand::Noop
        } else if strip_prefix_ignore_ascii_case(line, "EXPN").is_some() {
            SmtpCommand::Expn
        } else if strip_prefix_ignore_ascii_case(line, "VRFY").is_some() {
            SmtpCommand::Vrfy
        } else if strip_prefix_ignore_ascii_case(line, "HELP").is_some() {
            SmtpCommand::Help
        } else if let Some(rest) = strip_keyword(line, "LIST") {
            SmtpCommand::List {
                index: rest.trim().parse().ok(),
            }
        } else {
            SmtpCommand::Unknown {
                line: line.to_string(),
            }
        }
    }

    /// Keyword used in "bad sequence" error replies.
    pub fn keyword(&self) -> &'static str {
        match self {
            SmtpCommand::Helo { .. } => "HELO",
            SmtpCommand::Ehlo { .. } => "EHLO",
            SmtpCommand::MailFrom { .. } => "MAIL",
            SmtpCommand::RcptTo { .. } => "RCPT",
            SmtpCommand::Data => "DATA",
            SmtpCommand::DataEnd => ".",
            SmtpCommand::BlankLine => "blank line",
            SmtpCommand::Quit => "QUIT",
            SmtpCommand::Rset => "RSET",
            SmtpCommand::Noop => "NOOP",
            SmtpCommand::Expn => "EXPN",
            SmtpCommand::Vrfy => "VRFY",
            SmtpCommand::Help => "HELP",
            SmtpCommand::List { .. } => "LIST",
            SmtpCommand::Unknown { .. } => "unrecognized command",
        }
    }
}

/// Strip an ASCII prefix from the line, ignoring case. Comparing on a
/// byte-sliced prefix keeps non-ASCII input (whose uppercasing could
/// collapse to ASCII) from ever matching or splitting a character.
fn strip_prefix_ignore_ascii_case<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let end = prefix.len();
    if line.len() < end || !line.is_char_boundary(end) {
        return None;
    }
    if line[..end].eq_ignore_ascii_case(prefix) {
        Some(&line[end..])
    } else {
        None
    }
}

/// Strip a command keyword plus the single space separating it from
/// its argument text. A bare keyword yields an empty argument.
fn strip_keyword<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = strip_prefix_ignore_ascii_case(line, keyword)?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}
