//! IRC wire protocol: the generic prefix/command/params grammar (RFC 1459/2812),
//! a CR-LF line framer, and outbound message formatters.
//!
//! This library does not know about channels, users, or ISUPPORT; it only
//! turns bytes into a generic parsed record and back. Interpreting a
//! specific command (JOIN, MODE, a numeric, ...) is the dispatcher's job.

pub mod ctcp;

use std::fmt;
use thiserror::Error;

/// A parsed wire line: `[':' prefix SP] command SP params`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Servername or nick, when the line carried a prefix.
    pub from: Option<String>,
    /// The `!user@host` (or bare `@host`) tail of the prefix, if present.
    pub host: Option<String>,
    pub command: Command,
    pub params: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// A 3-digit numeric reply, already range-checked to `0..=999`.
    Numeric(u16),
    /// An all-alphabetic keyword, upper-cased (JOIN, PRIVMSG, ...).
    Keyword(String),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Numeric(n) => write!(f, "{n:03}"),
            Command::Keyword(k) => write!(f, "{k}"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("no command in line")]
    NoCommand,
    #[error("command '{0}' is neither all-digits nor all-letters")]
    InvalidCommand(String),
    #[error("numeric command '{0}' out of range [0,999]")]
    NumericOutOfRange(String),
    #[error("more than 14 middle parameters without a trailing sigil")]
    TooManyMiddles,
    #[error("empty middle parameter")]
    EmptyMiddle,
    #[error("prefix '{0}' contains an invalid byte")]
    InvalidNick(String),
    #[error("missing prefix terminator (' ')")]
    MissingPrefixTerminator,
    #[error("missing command terminator (' ')")]
    MissingCommandTerminator,
}

/// Parses a single line with the trailing CR-LF already stripped.
pub fn parse_line(mut line: &str) -> Result<Message, ParseError> {
    let (from, host) = if let Some(rest) = line.strip_prefix(':') {
        let sp = rest.find(' ').ok_or(ParseError::MissingPrefixTerminator)?;
        let pfx = &rest[..sp];
        line = &rest[sp + 1..];
        parse_prefix(pfx)?
    } else {
        (None, None)
    };

    let sp = line.find(' ');
    let (cmd_str, rest) = match sp {
        Some(idx) => (&line[..idx], &line[idx + 1..]),
        None => (line, ""),
    };
    if cmd_str.is_empty() {
        return Err(ParseError::NoCommand);
    }
    let command = parse_command(cmd_str)?;

    let params = if sp.is_none() {
        Vec::new()
    } else {
        split_params(rest)?
    };

    Ok(Message {
        from,
        host,
        command,
        params,
    })
}

fn parse_command(s: &str) -> Result<Command, ParseError> {
    if s.bytes().all(|b| b.is_ascii_digit()) {
        if s.len() != 3 {
            return Err(ParseError::NumericOutOfRange(s.to_owned()));
        }
        let n: u16 = s.parse().map_err(|_| ParseError::NumericOutOfRange(s.to_owned()))?;
        if n > 999 {
            return Err(ParseError::NumericOutOfRange(s.to_owned()));
        }
        Ok(Command::Numeric(n))
    } else if s.bytes().all(|b| b.is_ascii_alphabetic()) {
        Ok(Command::Keyword(s.to_ascii_uppercase()))
    } else {
        Err(ParseError::InvalidCommand(s.to_owned()))
    }
}

fn is_invalid_prefix_byte(b: u8) -> bool {
    b == 0 || b == b'\r' || b == b'\n' || b == b' '
}

/// `prefix := servername | nick [ '!' user ] [ '@' host ]`.
///
/// We don't attempt to disambiguate servername from nick (the grammar alone
/// cannot); `from` is whatever precedes the first `!`/`@`, `host` is
/// everything after it, combined (matches the "`!user@host` tail" framing).
fn parse_prefix(pfx: &str) -> Result<(Option<String>, Option<String>), ParseError> {
    if pfx.bytes().any(is_invalid_prefix_byte) {
        return Err(ParseError::InvalidNick(pfx.to_owned()));
    }
    match pfx.find(['!', '@']) {
        Some(idx) => Ok((Some(pfx[..idx].to_owned()), Some(pfx[idx + 1..].to_owned()))),
        None => Ok((Some(pfx.to_owned()), None)),
    }
}

/// Splits `params` per the dual-dialect grammar in 4.3: up to 14 middle
/// parameters, then an optional trailing parameter (colon required unless
/// exactly 14 middles preceded it).
fn split_params(params: &str) -> Result<Vec<String>, ParseError> {
    let mut out = Vec::new();
    let mut rest = params;

    loop {
        if rest.is_empty() {
            break;
        }

        if out.len() == 14 {
            // dialect 2: remainder is trailing, colon optional.
            let trailing = rest.strip_prefix(':').unwrap_or(rest);
            out.push(trailing.to_owned());
            break;
        }

        if let Some(trailing) = rest.strip_prefix(':') {
            out.push(trailing.to_owned());
            break;
        }

        match rest.find(' ') {
            Some(0) => return Err(ParseError::EmptyMiddle),
            Some(idx) => {
                out.push(rest[..idx].to_owned());
                rest = &rest[idx + 1..];
            }
            None => {
                out.push(rest.to_owned());
                break;
            }
        }
    }

    if out.len() > 15 {
        // Structurally unreachable (dialect 2 always absorbs the remainder
        // into a single trailing parameter at position 15), kept so the
        // error kind named in 4.3 has a concrete variant.
        return Err(ParseError::TooManyMiddles);
    }

    Ok(out)
}

// --- outbound formatters -----------------------------------------------

pub fn pass(pass: &str) -> String {
    format!("PASS {pass}\r\n")
}

pub fn user(username: &str, realname: &str) -> String {
    format!("USER {username} 8 * :{realname}\r\n")
}

pub fn nick(nick: &str) -> String {
    format!("NICK {nick}\r\n")
}

pub fn ping(token: &str) -> String {
    format!("PING {token}\r\n")
}

pub fn pong(token: &str) -> String {
    format!("PONG {token}\r\n")
}

pub fn join(chan: &str) -> String {
    format!("JOIN {chan}\r\n")
}

pub fn part(chan: &str, msg: Option<&str>) -> String {
    match msg {
        None => format!("PART {chan}\r\n"),
        Some(msg) => format!("PART {chan} :{msg}\r\n"),
    }
}

pub fn quit(reason: Option<&str>) -> String {
    match reason {
        None => "QUIT\r\n".to_owned(),
        Some(reason) => format!("QUIT :{reason}\r\n"),
    }
}

pub fn privmsg(target: &str, msg: &str) -> String {
    assert!(target.len() + msg.len() + 12 <= 512);
    format!("PRIVMSG {target} :{msg}\r\n")
}

pub fn notice(target: &str, msg: &str) -> String {
    assert!(target.len() + msg.len() + 11 <= 512);
    format!("NOTICE {target} :{msg}\r\n")
}

pub fn topic(chan: &str, topic: &str) -> String {
    format!("TOPIC {chan} :{topic}\r\n")
}

pub fn mode(target: &str, flags: &str, args: &[String]) -> String {
    if args.is_empty() {
        format!("MODE {target} {flags}\r\n")
    } else {
        format!("MODE {target} {flags} {}\r\n", args.join(" "))
    }
}

pub fn kick(chan: &str, nick: &str, reason: Option<&str>) -> String {
    match reason {
        None => format!("KICK {chan} {nick}\r\n"),
        Some(reason) => format!("KICK {chan} {nick} :{reason}\r\n"),
    }
}

/// Accumulates bytes from the network layer and yields complete CR-LF
/// delimited lines. The core locates line boundaries itself, since the
/// network layer's contract is "supplies raw bytes", not "supplies lines".
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> LineFramer {
        LineFramer::default()
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pops the next complete line, decoding lossily as UTF-8 (peers are not
    /// always compliant and rejecting a whole line over one bad byte would
    /// be worse than substituting the replacement character).
    pub fn next_line(&mut self) -> Option<String> {
        let crlf = self.buf.windows(2).position(|w| w == [b'\r', b'\n'])?;
        let line = String::from_utf8_lossy(&self.buf[..crlf]).into_owned();
        self.buf.drain(..crlf + 2);
        Some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_with_prefix_and_trailing() {
        let msg = parse_line(":nick!u@h PRIVMSG #c :hi there").unwrap();
        assert_eq!(msg.from.as_deref(), Some("nick"));
        assert_eq!(msg.host.as_deref(), Some("u@h"));
        assert_eq!(msg.command, Command::Keyword("PRIVMSG".to_owned()));
        assert_eq!(msg.params, vec!["#c".to_owned(), "hi there".to_owned()]);
    }

    #[test]
    fn parse_numeric() {
        let msg = parse_line(":srv 001 nick :welcome").unwrap();
        assert_eq!(msg.command, Command::Numeric(1));
        assert_eq!(msg.params, vec!["nick".to_owned(), "welcome".to_owned()]);
    }

    #[test]
    fn parse_no_prefix() {
        let msg = parse_line("PING :abc123").unwrap();
        assert_eq!(msg.from, None);
        assert_eq!(msg.command, Command::Keyword("PING".to_owned()));
        assert_eq!(msg.params, vec!["abc123".to_owned()]);
    }

    #[test]
    fn reject_numeric_out_of_range_length() {
        assert_eq!(
            parse_command("12"),
            Err(ParseError::NumericOutOfRange("12".to_owned()))
        );
        assert_eq!(
            parse_command("1234"),
            Err(ParseError::NumericOutOfRange("1234".to_owned()))
        );
    }

    #[test]
    fn reject_mixed_command() {
        assert_eq!(
            parse_command("P1NG"),
            Err(ParseError::InvalidCommand("P1NG".to_owned()))
        );
    }

    #[test]
    fn fourteen_middles_then_trailing_without_colon() {
        let params = split_params("1 2 3 4 5 6 7 8 9 10 11 12 13 14 blah blah blah").unwrap();
        assert_eq!(params.len(), 15);
        assert_eq!(params[14], "blah blah blah");
    }

    #[test]
    fn empty_middle_is_invalid() {
        assert_eq!(split_params("a  b"), Err(ParseError::EmptyMiddle));
    }

    #[test]
    fn trailing_without_leading_params() {
        assert_eq!(split_params(":hello world"), Ok(vec!["hello world".to_owned()]));
    }

    #[test]
    fn line_framer_yields_lines_in_order() {
        let mut framer = LineFramer::new();
        framer.feed(b"PING :a\r\nPING :b\r\n");
        assert_eq!(framer.next_line().as_deref(), Some("PING :a"));
        assert_eq!(framer.next_line().as_deref(), Some("PING :b"));
        assert_eq!(framer.next_line(), None);
    }

    #[test]
    fn line_framer_holds_partial_lines() {
        let mut framer = LineFramer::new();
        framer.feed(b"PING :a");
        assert_eq!(framer.next_line(), None);
        framer.feed(b"bc\r\n");
        assert_eq!(framer.next_line().as_deref(), Some("PING :abc"));
    }

    #[test]
    fn format_ping_reply() {
        assert_eq!(pong("abc123"), "PONG abc123\r\n");
    }

    #[test]
    fn format_mode_with_args() {
        assert_eq!(
            mode("#c", "+ov", &["alice".to_owned(), "bob".to_owned()]),
            "MODE #c +ov alice bob\r\n"
        );
    }
}
