//! POP3 response generation
//!
//! Builds the `+OK` / `-ERR` reply strings, CRLF included, so the
//! session driver can write them verbatim.

/// POP3 response builder
pub struct Pop3Response;

impl Pop3Response {
    /// Server greeting, including the APOP-style timestamp banner.
    /// The bracketed part must be unique per session.
    pub fn greeting(greeting: &str, session_id: &str, timestamp: i64, hostname: &str) -> String {
        format!(
            "+OK {} POP3 server ready <{}.{}@{}>\r\n",
            greeting, session_id, timestamp, hostname
        )
    }

    /// Positive response
    pub fn ok(message: &str) -> String {
        format!("+OK {}\r\n", message)
    }

    /// Positive response with no message
    pub fn ok_simple() -> String {
        "+OK\r\n".to_string()
    }

    /// Negative response
    pub fn err(message: &str) -> String {
        format!("-ERR {}\r\n", message)
    }

    /// STAT response: message count and total byte-stuffed size
    pub fn stat(count: usize, size: usize) -> String {
        format!("+OK {} {}\r\n", count, size)
    }

    /// First line of the multi-line LIST response
    pub fn list_header(count: usize) -> String {
        format!("+OK {} messages\r\n", count)
    }

    /// LIST response for a single message
    pub fn list_single(msg: usize, size: usize) -> String {
        format!("+OK {} {}\r\n", msg, size)
    }

    /// One line of the multi-line LIST response
    pub fn list_line(msg: usize, size: usize) -> String {
        format!("{} {}\r\n", msg, size)
    }

    /// First line of the multi-line UIDL response
    pub fn uidl_header() -> String {
        "+OK\r\n".to_string()
    }

    /// UIDL response for a single message
    pub fn uidl_single(msg: usize, uid: &str) -> String {
        format!("+OK {} {}\r\n", msg, uid)
    }

    /// One line of the multi-line UIDL response
    pub fn uidl_line(msg: usize, uid: &str) -> String {
        format!("{} {}\r\n", msg, uid)
    }

    /// RETR response header; the byte-stuffed text follows
    pub fn retr_header(octets: usize) -> String {
        format!("+OK {} octets\r\n", octets)
    }

    /// CAPA response
    pub fn capabilities() -> String {
        "+OK List of capabilities follows\r\n\
         USER PASS\r\n\
         UIDL\r\n\
         IMPLEMENTATION Mailstub POP3\r\n\
         .\r\n"
            .to_string()
    }

    /// Multi-line response terminator
    pub fn terminator() -> String {
        ".\r\n".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_format() {
        let greeting = Pop3Response::greeting("Mailstub", "abc", 12345, "localhost");
        assert_eq!(
            greeting,
            "+OK Mailstub POP3 server ready <abc.12345@localhost>\r\n"
        );
    }

    #[test]
    fn test_ok_and_err() {
        assert_eq!(Pop3Response::ok("ready"), "+OK ready\r\n");
        assert_eq!(Pop3Response::err("nope"), "-ERR nope\r\n");
    }

    #[test]
    fn test_stat() {
        assert_eq!(Pop3Response::stat(3, 1024), "+OK 3 1024\r\n");
    }

    #[test]
    fn test_list_lines() {
        assert_eq!(Pop3Response::list_header(2), "+OK 2 messages\r\n");
        assert_eq!(Pop3Response::list_line(1, 100), "1 100\r\n");
    }
}
