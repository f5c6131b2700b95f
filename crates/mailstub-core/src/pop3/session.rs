//! POP3 session state machine
//!
//! The session reads and removes messages from the shared store but
//! never creates or mutates one. Credentials are accepted without
//! checking anything; clients see 1-based message numbers while the
//! store indexes from 0.

use chrono::Utc;
use mailstub_store::SharedMailStore;
use tracing::debug;
use uuid::Uuid;

use super::command::Pop3Command;
use super::response::Pop3Response;

/// Protocol state of a POP3 session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pop3State {
    /// Waiting for (pretend) authentication
    Authorization,
    /// Maildrop open, full command set available
    Transaction,
    /// QUIT processed, session over
    Quit,
}

/// The state machine driving one POP3 connection.
pub struct Pop3Session {
    id: String,
    state: Pop3State,
    store: SharedMailStore,
    greeting: String,
    hostname: String,
}

impl Pop3Session {
    pub fn new(store: SharedMailStore, greeting: String, hostname: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            state: Pop3State::Authorization,
            store,
            greeting,
            hostname,
        }
    }

    pub fn state(&self) -> Pop3State {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == Pop3State::Quit
    }

    /// The banner written on connect. The bracketed token varies per
    /// session and per moment, as APOP requires.
    pub fn banner(&self) -> String {
        Pop3Response::greeting(
            &self.greeting,
            &self.id,
            Utc::now().timestamp(),
            &self.hostname,
        )
    }

    /// Process one parsed command and produce the full response text.
    pub async fn handle(&mut self, command: Pop3Command) -> String {
        match command {
            Pop3Command::User => {
                if self.state == Pop3State::Authorization {
                    Pop3Response::ok("send PASS")
                } else {
                    self.wrong_state()
                }
            }

            Pop3Command::Pass => {
                if self.state == Pop3State::Authorization {
                    self.state = Pop3State::Transaction;
                    Pop3Response::ok("mailbox ready")
                } else {
                    self.wrong_state()
                }
            }

            Pop3Command::Apop => {
                // no digest check; this server has nothing to protect
                if self.state == Pop3State::Authorization {
                    self.state = Pop3State::Transaction;
                    Pop3Response::ok("mailbox ready")
                } else {
                    self.wrong_state()
                }
            }

            Pop3Command::Capa => Pop3Response::capabilities(),

            Pop3Command::Stat => {
                if self.state != Pop3State::Transaction {
                    return self.wrong_state();
                }
                let messages = self.store.list().await;
                let size: usize = messages.iter().map(|m| m.byte_stuff().len()).sum();
                Pop3Response::stat(messages.len(), size)
            }

            Pop3Command::List { msg } => {
                if self.state != Pop3State::Transaction {
                    return self.wrong_state();
                }
                self.scan_listing(msg).await
            }

            Pop3Command::Retr { msg } => {
                if self.state != Pop3State::Transaction {
                    return self.wrong_state();
                }
                self.retrieve(msg).await
            }

            Pop3Command::Dele { msg } => {
                if self.state != Pop3State::Transaction {
                    return self.wrong_state();
                }
                // An out-of-range number is tolerated silently; the
                // reply is +OK either way.
                if let Some(n) = msg {
                    if n >= 1 && self.store.delete(n - 1).await.is_err() {
                        debug!(msg = n, "DELE for a message that does not exist");
                    }
                }
                Pop3Response::ok("message deleted")
            }

            Pop3Command::Noop => {
                if self.state != Pop3State::Transaction {
                    return self.wrong_state();
                }
                Pop3Response::ok_simple()
            }

            Pop3Command::Rset => {
                if self.state != Pop3State::Transaction {
                    return self.wrong_state();
                }
                // deletions are immediate here, nothing to restore
                Pop3Response::ok("deletions are permanent")
            }

            Pop3Command::Uidl { msg } => {
                if self.state != Pop3State::Transaction {
                    return self.wrong_state();
                }
                self.uidl_listing(msg).await
            }

            // TOP is not implemented; it currently behaves like QUIT.
            Pop3Command::Top | Pop3Command::Quit => {
                self.state = Pop3State::Quit;
                Pop3Response::ok("Goodbye")
            }

            Pop3Command::Unknown { command } => {
                Pop3Response::err(&format!("Unknown command: {}", command))
            }
        }
    }

    fn wrong_state(&self) -> String {
        Pop3Response::err("Not allowed in this state")
    }

    async fn scan_listing(&self, msg: Option<usize>) -> String {
        match msg {
            Some(n) => match self.checked_get(n).await {
                Some(message) => Pop3Response::list_single(n, message.render().len()),
                None => Pop3Response::err("No such message"),
            },
            None => {
                let messages = self.store.list().await;
                let mut response = Pop3Response::list_header(messages.len());
                for (i, message) in messages.iter().enumerate() {
                    response.push_str(&Pop3Response::list_line(i + 1, message.render().len()));
                }
                response.push_str(&Pop3Response::terminator());
                response
            }
        }
    }

    async fn retrieve(&self, msg: Option<usize>) -> String {
        match msg {
            Some(n) => match self.checked_get(n).await {
                Some(message) => {
                    let text = message.byte_stuff();
                    let mut response = Pop3Response::retr_header(text.len());
                    response.push_str(&text);
                    response
                }
                None => Pop3Response::err("No such message"),
            },
            None => Pop3Response::err("No such message"),
        }
    }

    async fn uidl_listing(&self, msg: Option<usize>) -> String {
        match msg {
            Some(n) => match self.checked_get(n).await {
                Some(message) => Pop3Response::uidl_single(n, message.uid()),
                None => Pop3Response::err("No such message"),
            },
            None => {
                let messages = self.store.list().await;
                let mut response = Pop3Response::uidl_header();
                for (i, message) in messages.iter().enumerate() {
                    response.push_str(&Pop3Response::uidl_line(i + 1, message.uid()));
                }
                response.push_str(&Pop3Response::terminator());
                response
            }
        }
    }

    /// Fetch a message by its client-visible 1-based number.
    async fn checked_get(&self, n: usize) -> Option<std::sync::Arc<mailstub_store::MailMessage>> {
        if n < 1 {
            return None;
        }
        self.store.get(n - 1).await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailstub_store::{FixedSizeMailStore, MailMessage};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn message(body: &str) -> MailMessage {
        let mut msg = MailMessage::new();
        msg.set("Subject", "test");
        msg.set("Message-Id", &format!("<{}@localhost>", msg.uid()));
        msg.append_line(body);
        msg
    }

    async fn session_with_messages(count: usize) -> (Pop3Session, SharedMailStore) {
        let store: SharedMailStore = Arc::new(FixedSizeMailStore::new(10));
        for i in 0..count {
            store.add(message(&format!("body {}", i))).await;
        }
        let session = Pop3Session::new(
            store.clone(),
            "Mailstub".to_string(),
            "localhost".to_string(),
        );
        (session, store)
    }

    async fn authenticated(count: usize) -> (Pop3Session, SharedMailStore) {
        let (mut session, store) = session_with_messages(count).await;
        session.handle(Pop3Command::User).await;
        session.handle(Pop3Command::Pass).await;
        (session, store)
    }

    #[tokio::test]
    async fn test_banner_shape() {
        let (session, _) = session_with_messages(0).await;
        let banner = session.banner();
        assert!(banner.starts_with("+OK Mailstub POP3 server ready <"));
        assert!(banner.contains("@localhost>"));
        assert!(banner.ends_with("\r\n"));
    }

    #[tokio::test]
    async fn test_login_flow() {
        let (mut session, _) = session_with_messages(0).await;
        assert_eq!(session.state(), Pop3State::Authorization);

        let response = session.handle(Pop3Command::User).await;
        assert!(response.starts_with("+OK"));
        assert_eq!(session.state(), Pop3State::Authorization);

        let response = session.handle(Pop3Command::Pass).await;
        assert!(response.starts_with("+OK"));
        assert_eq!(session.state(), Pop3State::Transaction);
    }

    #[tokio::test]
    async fn test_apop_also_authenticates() {
        let (mut session, _) = session_with_messages(0).await;
        session.handle(Pop3Command::Apop).await;
        assert_eq!(session.state(), Pop3State::Transaction);
    }

    #[tokio::test]
    async fn test_transaction_commands_need_authentication() {
        let (mut session, _) = session_with_messages(1).await;
        for command in [
            Pop3Command::Stat,
            Pop3Command::List { msg: None },
            Pop3Command::Retr { msg: Some(1) },
            Pop3Command::Dele { msg: Some(1) },
            Pop3Command::Noop,
            Pop3Command::Rset,
            Pop3Command::Uidl { msg: None },
        ] {
            let response = session.handle(command).await;
            assert!(response.starts_with("-ERR"), "got {:?}", response);
            assert_eq!(session.state(), Pop3State::Authorization);
        }
    }

    #[tokio::test]
    async fn test_stat_counts_byte_stuffed_sizes() {
        let (mut session, store) = authenticated(2).await;
        let expected: usize = store
            .list()
            .await
            .iter()
            .map(|m| m.byte_stuff().len())
            .sum();

        let response = session.handle(Pop3Command::Stat).await;
        assert_eq!(response, format!("+OK 2 {}\r\n", expected));
    }

    #[tokio::test]
    async fn test_list_all() {
        let (mut session, store) = authenticated(3).await;
        let sizes: Vec<usize> = store.list().await.iter().map(|m| m.render().len()).collect();

        let response = session.handle(Pop3Command::List { msg: None }).await;
        let expected = format!(
            "+OK 3 messages\r\n1 {}\r\n2 {}\r\n3 {}\r\n.\r\n",
            sizes[0], sizes[1], sizes[2]
        );
        assert_eq!(response, expected);
    }

    #[tokio::test]
    async fn test_list_single_and_out_of_range() {
        let (mut session, _) = authenticated(3).await;

        let response = session.handle(Pop3Command::List { msg: Some(2) }).await;
        assert!(response.starts_with("+OK 2 "));

        let response = session.handle(Pop3Command::List { msg: Some(5) }).await;
        assert_eq!(response, "-ERR No such message\r\n");

        let response = session.handle(Pop3Command::List { msg: Some(0) }).await;
        assert_eq!(response, "-ERR No such message\r\n");
    }

    #[tokio::test]
    async fn test_retr_returns_byte_stuffed_text() {
        let (mut session, store) = authenticated(1).await;
        let text = store.get(0).await.unwrap().byte_stuff();

        let response = session.handle(Pop3Command::Retr { msg: Some(1) }).await;
        assert_eq!(response, format!("+OK {} octets\r\n{}", text.len(), text));
        assert!(response.ends_with("\r\n.\r\n"));
    }

    #[tokio::test]
    async fn test_retr_out_of_range() {
        let (mut session, _) = authenticated(1).await;
        let response = session.handle(Pop3Command::Retr { msg: Some(2) }).await;
        assert_eq!(response, "-ERR No such message\r\n");

        let response = session.handle(Pop3Command::Retr { msg: None }).await;
        assert_eq!(response, "-ERR No such message\r\n");
    }

    #[tokio::test]
    async fn test_dele_shifts_numbering() {
        let (mut session, store) = authenticated(3).await;
        let third_uid = store.get(2).await.unwrap().uid().to_string();

        let response = session.handle(Pop3Command::Dele { msg: Some(2) }).await;
        assert!(response.starts_with("+OK"));
        assert_eq!(store.count().await, 2);

        // what used to be message 3 is now message 2
        let response = session.handle(Pop3Command::Uidl { msg: Some(2) }).await;
        assert_eq!(response, format!("+OK 2 {}\r\n", third_uid));
    }

    #[tokio::test]
    async fn test_dele_out_of_range_is_tolerated() {
        let (mut session, store) = authenticated(1).await;

        let response = session.handle(Pop3Command::Dele { msg: Some(9) }).await;
        assert!(response.starts_with("+OK"));
        let response = session.handle(Pop3Command::Dele { msg: Some(0) }).await;
        assert!(response.starts_with("+OK"));
        let response = session.handle(Pop3Command::Dele { msg: None }).await;
        assert!(response.starts_with("+OK"));

        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_rset_does_not_undelete() {
        let (mut session, store) = authenticated(2).await;
        session.handle(Pop3Command::Dele { msg: Some(1) }).await;

        let response = session.handle(Pop3Command::Rset).await;
        assert!(response.starts_with("+OK"));
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_uidl_all() {
        let (mut session, store) = authenticated(2).await;
        let uids: Vec<String> = store
            .list()
            .await
            .iter()
            .map(|m| m.uid().to_string())
            .collect();

        let response = session.handle(Pop3Command::Uidl { msg: None }).await;
        assert_eq!(
            response,
            format!("+OK\r\n1 {}\r\n2 {}\r\n.\r\n", uids[0], uids[1])
        );
    }

    #[tokio::test]
    async fn test_top_behaves_like_quit() {
        let (mut session, _) = authenticated(1).await;
        let response = session.handle(Pop3Command::Top).await;
        assert_eq!(response, "+OK Goodbye\r\n");
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn test_quit_from_authorization() {
        let (mut session, _) = session_with_messages(0).await;
        let response = session.handle(Pop3Command::Quit).await;
        assert_eq!(response, "+OK Goodbye\r\n");
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn test_capa_in_both_states() {
        let (mut session, _) = session_with_messages(0).await;
        let response = session.handle(Pop3Command::Capa).await;
        assert!(response.starts_with("+OK List of capabilities"));
        assert!(response.ends_with(".\r\n"));

        session.handle(Pop3Command::Pass).await;
        let response = session.handle(Pop3Command::Capa).await;
        assert!(response.starts_with("+OK List of capabilities"));
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let (mut session, _) = authenticated(0).await;
        let response = session
            .handle(Pop3Command::Unknown {
                command: "XFROB".to_string(),
            })
            .await;
        assert_eq!(response, "-ERR Unknown command: XFROB\r\n");
    }
}
