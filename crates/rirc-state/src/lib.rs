//! Protocol and state core for rirc: the in-memory model of servers,
//! channels, users and message buffers, and the dispatcher (C9) that
//! routes a parsed wire message to the per-command routine (C10) that
//! applies its effect.
//!
//! Numerics dispatch through a fixed-size array of 1000 direct-indexed
//! slots (codes are small dense integers); keywords dispatch through
//! a `HashMap` keyed by the parser's already upper-cased command
//! string. Both tables are built once behind a `OnceLock`.

pub mod buffer;
pub mod channel;
pub mod error;
pub mod handlers;
pub mod mode;
pub mod server;
pub mod user;

pub use buffer::{Buffer, BufferLine, BufferLineKind, BUFFER_LINES_MAX, FROM_LENGTH_MAX, TEXT_LENGTH_MAX};
pub use channel::{Activity, Channel};
pub use error::Error;
pub use mode::{ChanModes, ModeConfig, ModeVector, Prefix};
pub use rirc_wire::{Command, Message, ParseError};
pub use server::{IoSendError, Outbox, Server, ServerConfig};
pub use user::{ReplaceError, User, UserList};

use std::collections::HashMap;
use std::sync::OnceLock;

use handlers::Handler;

/// Numeric replies known to be inert: absorbed by the registration flow
/// elsewhere (`366`/`376` just mark the end of a burst already reflected
/// in state by the `353`s/`004`/`005` that preceded them) or otherwise
/// carrying nothing this crate models (`331`, "no topic is set").
const IGNORED_NUMERICS: &[u16] = &[331, 366, 376];

/// RFC 1459/2812's two well-known numeric bands: `001..=099` (link
/// setup/info) and `200..=599` (command replies and errors). A numeric
/// outside both is not one this dialect of the protocol defines, so it
/// dispatches as genuinely unknown rather than as an unhandled-but-known
/// reply (§4.8's distinction between the two).
fn is_well_known_numeric(code: u16) -> bool {
    (1..=99).contains(&code) || (200..=599).contains(&code)
}

/// Numeric table: a fixed-size array of 1000 direct-indexed slots,
/// ported from the source's own dense-integer table rather than hashed
/// (§4.7.1). `None` is a numeric this protocol dialect never assigns;
/// `Some` covers both bespoke routines and the shared ignore/generic
/// routines that fill out the rest of the well-known bands.
fn numeric_table() -> &'static [Option<Handler>; 1000] {
    static TABLE: OnceLock<[Option<Handler>; 1000]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table: [Option<Handler>; 1000] =
            std::array::from_fn(|i| is_well_known_numeric(i as u16).then_some(handlers::generic_numeric as Handler));
        for &code in IGNORED_NUMERICS {
            table[code as usize] = Some(handlers::ignore_numeric);
        }
        table[1] = Some(handlers::rpl_welcome);
        table[4] = Some(handlers::rpl_myinfo);
        table[5] = Some(handlers::rpl_isupport);
        table[332] = Some(handlers::rpl_topic);
        table[353] = Some(handlers::rpl_namreply);
        table[432] = Some(handlers::err_bad_nick);
        table[433] = Some(handlers::err_bad_nick);
        table
    })
}

fn numeric_handler(code: u16) -> Option<Handler> {
    numeric_table()[code as usize]
}

/// Keyword table: a build-once `HashMap` behind a `OnceLock` (§4.7.1),
/// keyed by the upper-cased command keyword the parser already produced.
fn keyword_table() -> &'static HashMap<&'static str, Handler> {
    static TABLE: OnceLock<HashMap<&'static str, Handler>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut m: HashMap<&'static str, Handler> = HashMap::new();
        m.insert("PING", handlers::handle_ping);
        m.insert("PONG", handlers::handle_pong);
        m.insert("JOIN", handlers::handle_join);
        m.insert("PART", handlers::handle_part);
        m.insert("KICK", handlers::handle_kick);
        m.insert("QUIT", handlers::handle_quit);
        m.insert("NICK", handlers::handle_nick);
        m.insert("MODE", handlers::handle_mode);
        m.insert("PRIVMSG", handlers::handle_privmsg);
        m.insert("NOTICE", handlers::handle_notice);
        m.insert("TOPIC", handlers::handle_topic);
        m.insert("ERROR", handlers::handle_error);
        m.insert("INVITE", handlers::handle_invite);
        m
    })
}

fn keyword_handler(kw: &str) -> Option<Handler> {
    keyword_table().get(kw).copied()
}

/// Validates a numeric's target parameter (§4.7): it must name the
/// server's current nick, or be `*` while the connection hasn't
/// registered yet, or the numeric must be `001` (which is itself what
/// latches the confirmed nick).
fn check_numeric_target(server: &Server, code: u16, msg: &Message) -> Result<(), Error> {
    if code == 1 {
        return Ok(());
    }
    let target = msg.params.first().map(String::as_str).unwrap_or("");
    if rirc_casemap::irc_eq(server.casemapping(), target, server.nick()) {
        return Ok(());
    }
    if !server.registered && target == "*" {
        return Ok(());
    }
    Err(Error::ProtocolTargetMismatch {
        nick: server.nick().to_owned(),
        received: target.to_owned(),
    })
}

/// Parses `line` and routes it to a handler, mutating `server` and
/// writing any outbound reply through `outbox`. This is the single
/// entry point the network I/O layer calls per inbound line (§5): the
/// core processes one line to completion before the next is dequeued.
///
/// Every recoverable error is posted as a line to the server's buffer
/// and swallowed here, matching §7's propagation rule: the dispatcher
/// continues regardless of outcome. A `protocol` error encountered
/// before registration completes additionally asks `outbox` to
/// disconnect.
pub fn dispatch(server: &mut Server, outbox: &mut dyn Outbox, line: &str) {
    if let Err(e) = dispatch_inner(server, outbox, line) {
        let was_preregistration = !server.registered;
        server.buffer.newline(BufferLineKind::Other, "--", &e.to_string());
        if e.is_protocol() && was_preregistration {
            outbox.disconnect();
        }
    }
}

fn dispatch_inner(server: &mut Server, outbox: &mut dyn Outbox, line: &str) -> Result<(), Error> {
    let msg = rirc_wire::parse_line(line)?;
    match &msg.command {
        Command::Numeric(code) => {
            check_numeric_target(server, *code, &msg)?;
            match numeric_handler(*code) {
                Some(handler) => handler(server, outbox, &msg),
                None => Err(Error::DispatchUnknownNumeric(*code)),
            }
        }
        Command::Keyword(kw) => match keyword_handler(kw) {
            Some(handler) => handler(server, outbox, &msg),
            None => Err(Error::DispatchUnknownKeyword(kw.clone())),
        },
    }
}
