//! POP3 command parsing

/// A parsed POP3 client command.
///
/// Message numbers are kept exactly as the client sent them, 1-based;
/// the session translates to 0-based store indices. An argument that
/// fails to parse as a number comes through as `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pop3Command {
    // Authorization state commands
    /// USER name - identify the user
    User,
    /// PASS password - any password is accepted
    Pass,
    /// APOP name digest - accepted without checking the digest
    Apop,

    // Transaction state commands
    /// STAT - maildrop status
    Stat,
    /// LIST [msg] - scan listing
    List { msg: Option<usize> },
    /// RETR msg - retrieve a message
    Retr { msg: Option<usize> },
    /// DELE msg - delete a message
    Dele { msg: Option<usize> },
    /// NOOP - no operation
    Noop,
    /// RSET - acknowledged, but deletions here are permanent
    Rset,
    /// TOP - not implemented
    Top,
    /// UIDL [msg] - unique-id listing
    Uidl { msg: Option<usize> },

    // Any state commands
    /// QUIT - end the session
    Quit,
    /// CAPA - capability list
    Capa,

    /// Anything unrecognized
    Unknown { command: String },
}

impl Pop3Command {
    /// Parse one input line (CRLF already stripped). The keyword is
    /// matched case-insensitively; everything after the first space is
    /// argument text.
    pub fn parse(line: &str) -> Pop3Command {
        let line = line.trim();
        let (keyword, args) = match line.split_once(' ') {
            Some((keyword, args)) => (keyword, args.trim()),
            None => (line, ""),
        };

        match keyword.to_uppercase().as_str() {
            "USER" => Pop3Command::User,
            "PASS" => Pop3Command::Pass,
            "APOP" => Pop3Command::Apop,
            "STAT" => Pop3Command::Stat,
            "LIST" => Pop3Command::List {
                msg: args.parse().ok(),
            },
            "RETR" => Pop3Command::Retr {
                msg: args.parse().ok(),
            },
            "DELE" => Pop3Command::Dele {
                msg: args.parse().ok(),
            },
            "NOOP" => Pop3Command::Noop,
            "RSET" => Pop3Command::Rset,
            "TOP" => Pop3Command::Top,
            "UIDL" => Pop3Command::Uidl {
                msg: args.parse().ok(),
            },
            "QUIT" => Pop3Command::Quit,
            "CAPA" => Pop3Command::Capa,
            other => Pop3Command::Unknown {
                command: other.to_string(),
            },
        }
    }
}
