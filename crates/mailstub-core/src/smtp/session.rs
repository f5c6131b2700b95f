//! SMTP session state machine
//!
//! Every state transition is driven by exactly one input line. The
//! engine owns the working message being accumulated and decides, at
//! the data-termination line, whether it is committed to the shared
//! store or discarded.

use mailstub_store::{MailMessage, SharedMailStore};
use tracing::{debug, info};

use super::command::SmtpCommand;
use super::response::SmtpReply;

/// Protocol state of an SMTP session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpState {
    /// Connection opened, banner not yet sent
    Connect,
    /// Banner sent, waiting for HELO/EHLO
    Greet,
    /// Ready for MAIL FROM
    Mail,
    /// Ready for RCPT TO (or more of them) and DATA
    Rcpt,
    /// Collecting message headers
    DataHeader,
    /// Collecting message body
    DataBody,
    /// QUIT processed, session over
    Quit,
}

/// The state machine driving one SMTP connection.
pub struct SmtpSession {
    state: SmtpState,
    store: SharedMailStore,
    message: MailMessage,
    last_header: String,
    client: Option<String>,
    hostname: String,
    greeting: String,
}

impl SmtpSession {
    pub fn new(store: SharedMailStore, hostname: String, greeting: String) -> Self {
        Self {
            state: SmtpState::Connect,
            store,
            message: MailMessage::new(),
            last_header: String::new(),
            client: None,
            hostname,
            greeting,
        }
    }

    pub fn state(&self) -> SmtpState {
        self.state
    }

    /// The identity the client announced in HELO/EHLO, if any.
    pub fn client(&self) -> Option<&str> {
        self.client.as_deref()
    }

    /// True once QUIT has been processed; the driver closes the
    /// connection after writing the final reply.
    pub fn is_closed(&self) -> bool {
        self.state == SmtpState::Quit
    }

    /// The synthetic connect event: produce the banner and move to the
    /// greeting state.
    pub fn connect(&mut self) -> SmtpReply {
        self.state = SmtpState::Greet;
        SmtpReply::code(220, format!("{} SMTP service ready", self.greeting))
    }

    /// Process one input line (CRLF already stripped) and produce the
    /// reply, if any.
    pub async fn handle_line(&mut self, line: &str) -> SmtpReply {
        let command = SmtpCommand::parse(self.state, line);
        debug!(state = ?self.state, command = command.keyword(), "processing line");

        match command {
            SmtpCommand::Helo { client } => {
                if self.state == SmtpState::Greet {
                    self.state = SmtpState::Mail;
                    self.client = Some(client.clone());
                    SmtpReply::code(250, format!("Hello {}", client))
                } else {
                    SmtpReply::bad_sequence("HELO")
                }
            }

            SmtpCommand::Ehlo { client } => {
                if self.state == SmtpState::Greet {
                    self.state = SmtpState::Mail;
                    self.client = Some(client.clone());
                    SmtpReply::Reply(format!("250-{} Hello {}\r\n250 OK", self.hostname, client))
                } else {
                    SmtpReply::bad_sequence("EHLO")
                }
            }

            SmtpCommand::MailFrom { .. } => {
                if self.state == SmtpState::Mail {
                    self.state = SmtpState::Rcpt;
                    SmtpReply::code(250, "OK")
                } else {
                    SmtpReply::bad_sequence("MAIL")
                }
            }

            SmtpCommand::RcptTo { .. } => {
                if self.state == SmtpState::Rcpt {
                    SmtpReply::code(250, "OK")
                } else {
                    SmtpReply::bad_sequence("RCPT")
                }
            }

            SmtpCommand::Data => {
                if self.state == SmtpState::Rcpt {
                    self.state = SmtpState::DataHeader;
                    SmtpReply::code(354, "Start mail input; end with <CRLF>.<CRLF>")
                } else {
                    SmtpReply::bad_sequence("DATA")
                }
            }

            SmtpCommand::BlankLine => {
                if self.state == SmtpState::DataHeader {
                    self.state = SmtpState::DataBody;
                    SmtpReply::NoReply
                } else {
                    SmtpReply::bad_sequence("blank line")
                }
            }

            SmtpCommand::DataEnd => {
                if self.state == SmtpState::DataHeader || self.state == SmtpState::DataBody {
                    self.commit_working_message().await;
                    self.state = SmtpState::Mail;
                    SmtpReply::code(250, "OK")
                } else {
                    SmtpReply::bad_sequence(".")
                }
            }

            SmtpCommand::Quit => {
                self.state = SmtpState::Quit;
                SmtpReply::code(
                    221,
                    format!("{} SMTP service closing transmission channel", self.greeting),
                )
            }

            SmtpCommand::Rset => {
                self.message = MailMessage::new();
                self.last_header.clear();
                self.state = SmtpState::Greet;
                SmtpReply::code(250, "OK")
            }

            SmtpCommand::Noop => SmtpReply::code(250, "OK"),

            SmtpCommand::Expn | SmtpCommand::Vrfy => SmtpReply::code(252, "Not supported"),

            SmtpCommand::Help => SmtpReply::code(211, "No help available"),

            SmtpCommand::List { index } => self.inspect_store(index).await,

            SmtpCommand::Unknown { line } => self.handle_unknown(&line),
        }
    }

    /// Unrecognized input: inside a DATA phase it is literal message
    /// content, anywhere else it is an error.
    fn handle_unknown(&mut self, line: &str) -> SmtpReply {
        match self.state {
            SmtpState::DataHeader => {
                self.store_header_line(line);
                SmtpReply::NoReply
            }
            SmtpState::DataBody => {
                self.message.append_line(line);
                SmtpReply::NoReply
            }
            _ => SmtpReply::code(500, "Command not recognized"),
        }
    }

    /// A line in the header section either starts a new header (it
    /// contains a colon) or continues the previous one (folded header).
    fn store_header_line(&mut self, line: &str) {
        match line.find(':') {
            Some(at) => {
                let name = &line[..at];
                let value = line[at + 1..].trim_start();
                self.message.set(name, value);
                self.last_header = name.to_string();
            }
            None => {
                let header = self.last_header.clone();
                self.message.append_to_last(&header, line.trim());
            }
        }
    }

    /// The data-termination line was received. A message without any
    /// Message-Id header (in whatever capitalization the client chose)
    /// is quietly dropped instead of stored; a non-compliant client
    /// simply does not get its mail captured.
    async fn commit_working_message(&mut self) {
        let message = std::mem::take(&mut self.message);
        self.last_header.clear();

        if message.has_header_ignore_case("Message-Id") {
            info!(uid = message.uid(), "captured message");
            self.store.add(message).await;
        } else {
            info!("no Message-Id header, discarding working message");
        }
    }

    /// Non-standard LIST command: report what the store holds. With a
    /// valid 0-based index the rendered message text is included. The
    /// session state is left alone so an in-progress transaction can
    /// continue.
    async fn inspect_store(&self, index: Option<usize>) -> SmtpReply {
        let messages = self.store.list().await;
        let mut result = String::new();
        if let Some(i) = index {
            if i < messages.len() {
                result.push_str("\n-------------------------------------------\n");
                result.push_str(&messages[i].render());
            }
        }
        result.push_str(&format!("There are {} messages", messages.len()));
        SmtpReply::code(250, result)
    }
}
