//! Captured mail message
//!
//! A `MailMessage` is built up line by line during an SMTP DATA
//! transaction and becomes immutable once handed to the store. Headers
//! keep their insertion order and their capitalization exactly as the
//! client sent them.

use uuid::Uuid;

/// An email message captured in memory.
#[derive(Debug, Clone)]
pub struct MailMessage {
    uid: String,
    headers: Vec<(String, Vec<String>)>,
    body: String,
}

impl MailMessage {
    /// Create a new, empty message with a fresh unique identifier.
    pub fn new() -> Self {
        Self {
            uid: Uuid::new_v4().to_string(),
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Process-unique identifier, required by the POP3 UIDL command.
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// All headers in insertion order.
    pub fn headers(&self) -> &[(String, Vec<String>)] {
        &self.headers
    }

    /// The values stored under a header name (exact-case match).
    pub fn values(&self, header: &str) -> Option<&[String]> {
        self.headers
            .iter()
            .find(|(name, _)| name == header)
            .map(|(_, values)| values.as_slice())
    }

    /// True if a header with the given name exists, compared
    /// case-insensitively. Mail clients disagree on capitalization
    /// ("Message-Id" vs "Message-ID"), so lookups that gate behavior
    /// must not be exact-case.
    pub fn has_header_ignore_case(&self, header: &str) -> bool {
        self.headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(header))
    }

    /// The accumulated message body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Replace the header's values with the single value given,
    /// creating the header if it does not exist yet.
    pub fn set(&mut self, header: &str, value: &str) {
        match self.headers.iter_mut().find(|(name, _)| name == header) {
            Some((_, values)) => {
                values.clear();
                values.push(value.to_string());
            }
            None => self
                .headers
                .push((header.to_string(), vec![value.to_string()])),
        }
    }

    /// Add another value under the header, creating it if absent.
    pub fn add(&mut self, header: &str, value: &str) {
        match self.headers.iter_mut().find(|(name, _)| name == header) {
            Some((_, values)) => values.push(value.to_string()),
            None => self
                .headers
                .push((header.to_string(), vec![value.to_string()])),
        }
    }

    /// Append text to the last value of the header. Used for folded
    /// header continuation lines. Creates the header if absent.
    pub fn append_to_last(&mut self, header: &str, value: &str) {
        match self.headers.iter_mut().find(|(name, _)| name == header) {
            Some((_, values)) => match values.last_mut() {
                Some(last) => last.push_str(value),
                None => values.push(value.to_string()),
            },
            None => self
                .headers
                .push((header.to_string(), vec![value.to_string()])),
        }
    }

    /// Append a line of text to the body. Lines are joined with a
    /// newline, except when the body is still empty or the incoming
    /// line is itself empty or a bare newline, which would otherwise
    /// produce a spurious leading blank line.
    pub fn append_line(&mut self, line: &str) {
        if !self.body.is_empty() && !line.is_empty() && line != "\n" {
            self.body.push('\n');
        }
        self.body.push_str(line);
    }

    /// Render the message for inspection, with no escaping.
    pub fn render(&self) -> String {
        let mut msg = self
            .headers
            .iter()
            .map(|(name, values)| format!("{}: {}", name, values.join(", ")))
            .collect::<Vec<_>>()
            .join("\n");

        msg.push_str("\n\n");
        msg.push_str(&self.body);
        msg.push('\n');
        msg
    }

    /// Render the complete message for a POP3 RETR response.
    ///
    /// The termination sequence `\r\n.\r\n` appearing literally inside
    /// the body is byte-stuffed by doubling the dot, so the real
    /// terminator appended at the end stays unambiguous.
    pub fn byte_stuff(&self) -> String {
        let mut msg = self
            .headers
            .iter()
            .map(|(name, values)| format!("{}: {}", name, values.join(", ")))
            .collect::<Vec<_>>()
            .join("\r\n");

        msg.push_str("\r\n\r\n");
        msg.push_str(&self.body.replace("\r\n.\r\n", "\r\n..\r\n"));
        msg.push_str("\r\n.\r\n");
        msg
    }
}

impl Default for MailMessage {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MailMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_uids_are_unique() {
        let a = MailMessage::new();
        let b = MailMessage::new();
        assert_ne!(a.uid(), b.uid());
    }

    #[test]
    fn test_set_replaces_values() {
        let mut msg = MailMessage::new();
        msg.add("Subject", "first");
        msg.add("Subject", "second");
        msg.set("Subject", "only");
        assert_eq!(msg.values("Subject").unwrap(), &["only".to_string()]);
    }

    #[test]
    fn test_add_appends_values() {
        let mut msg = MailMessage::new();
        msg.add("Received", "by a");
        msg.add("Received", "by b");
        assert_eq!(
            msg.values("Received").unwrap(),
            &["by a".to_string(), "by b".to_string()]
        );
    }

    #[test]
    fn test_append_to_last_extends_last_value() {
        let mut msg = MailMessage::new();
        msg.add("Subject", "a long");
        msg.append_to_last("Subject", " subject line");
        assert_eq!(
            msg.values("Subject").unwrap(),
            &["a long subject line".to_string()]
        );
    }

    #[test]
    fn test_append_to_last_creates_missing_header() {
        let mut msg = MailMessage::new();
        msg.append_to_last("X-Continued", "value");
        assert_eq!(msg.values("X-Continued").unwrap(), &["value".to_string()]);
    }

    #[test]
    fn test_header_names_keep_case() {
        let mut msg = MailMessage::new();
        msg.set("Message-ID", "<1@x>");
        assert!(msg.values("message-id").is_none());
        assert!(msg.has_header_ignore_case("message-id"));
        assert!(msg.has_header_ignore_case("MESSAGE-ID"));
    }

    #[test]
    fn test_body_lines_joined_with_newline() {
        let mut msg = MailMessage::new();
        msg.append_line("first");
        msg.append_line("second");
        assert_eq!(msg.body(), "first\nsecond");
    }

    #[test]
    fn test_no_leading_blank_line() {
        let mut msg = MailMessage::new();
        msg.append_line("");
        msg.append_line("first");
        assert_eq!(msg.body(), "first");
    }

    #[test]
    fn test_blank_line_inside_body() {
        let mut msg = MailMessage::new();
        msg.append_line("first");
        msg.append_line("\n");
        msg.append_line("second");
        assert_eq!(msg.body(), "first\n\nsecond");
    }

    #[test]
    fn test_render_format() {
        let mut msg = MailMessage::new();
        msg.set("From", "a@example.com");
        msg.add("To", "b@example.com");
        msg.add("To", "c@example.com");
        msg.append_line("hello");

        assert_eq!(
            msg.render(),
            "From: a@example.com\nTo: b@example.com, c@example.com\n\nhello\n"
        );
    }

    #[test]
    fn test_byte_stuff_terminator() {
        let mut msg = MailMessage::new();
        msg.set("Subject", "test");
        msg.append_line("body");

        let stuffed = msg.byte_stuff();
        assert!(stuffed.ends_with("\r\n.\r\n"));
        assert_eq!(stuffed, "Subject: test\r\n\r\nbody\r\n.\r\n");
    }

    #[test]
    fn test_byte_stuff_escapes_embedded_terminator() {
        let mut msg = MailMessage::new();
        msg.set("Subject", "test");
        msg.append_line("before\r\n.\r\nafter");

        let stuffed = msg.byte_stuff();
        assert!(stuffed.contains("before\r\n..\r\nafter"));
        // The real terminator appears exactly once, at the very end.
        assert_eq!(stuffed.matches("\r\n.\r\n").count(), 1);
        assert!(stuffed.ends_with("\r\n.\r\n"));
    }
}
