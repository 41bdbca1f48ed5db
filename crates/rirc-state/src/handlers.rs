//! Per-command routines (C10): the semantic effect of each keyword and
//! numeric on server/channel/user state.

use rirc_wire::ctcp::{self, Ctcp};
use rirc_wire::{self, Message};

use crate::buffer::BufferLineKind;
use crate::channel::Activity;
use crate::error::Error;
use crate::mode::{apply_channel_modes, apply_user_modes, ModeReject};
use crate::server::{Outbox, Server};

pub type Handler = fn(&mut Server, &mut dyn Outbox, &Message) -> Result<(), Error>;

fn send(server: &Server, outbox: &mut dyn Outbox, line: String) -> Result<(), Error> {
    let _ = server;
    outbox.send_line(&line).map_err(|e| Error::IoSend(e.0))
}

fn param<'a>(msg: &'a Message, i: usize) -> Option<&'a str> {
    msg.params.get(i).map(String::as_str)
}

/// `true` if `nick` (case-mapped under `mapping`) appears in `text` at a
/// word boundary, per §4.8's PRIVMSG pinged rule.
fn mentions_nick(mapping: rirc_casemap::CaseMapping, text: &str, nick: &str) -> bool {
    if nick.is_empty() {
        return false;
    }
    let is_word_byte = |b: u8| b.is_ascii_alphanumeric() || b == b'_' || b == b'-';
    let bytes = text.as_bytes();
    let nlen = nick.len();
    let mut i = 0usize;
    while i + nlen <= bytes.len() {
        if text.is_char_boundary(i)
            && text.is_char_boundary(i + nlen)
            && rirc_casemap::irc_eq(mapping, &text[i..i + nlen], nick)
        {
            let before_ok = i == 0 || !is_word_byte(bytes[i - 1]);
            let after_ok = i + nlen == bytes.len() || !is_word_byte(bytes[i + nlen]);
            if before_ok && after_ok {
                return true;
            }
        }
        i += 1;
    }
    false
}

fn sender_of(msg: &Message) -> Option<&str> {
    msg.from.as_deref()
}

// --- keyword handlers ----------------------------------------------------

pub fn handle_ping(server: &mut Server, outbox: &mut dyn Outbox, msg: &Message) -> Result<(), Error> {
    let token = param(msg, 0).unwrap_or("");
    send(server, outbox, rirc_wire::pong(token))
}

pub fn handle_pong(server: &mut Server, _outbox: &mut dyn Outbox, msg: &Message) -> Result<(), Error> {
    let token = param(msg, 0).unwrap_or("");
    server.record_pong(token);
    Ok(())
}

pub fn handle_join(server: &mut Server, _outbox: &mut dyn Outbox, msg: &Message) -> Result<(), Error> {
    let chan_name = param(msg, 0).ok_or(Error::ProtocolMissingTarget)?;
    let from = sender_of(msg).unwrap_or("").to_owned();

    if rirc_casemap::irc_eq(server.casemapping(), &from, server.nick()) {
        let chan = server.get_or_create_channel(chan_name);
        chan.rejoin();
        chan.note(BufferLineKind::Other, "--", &format!("you have joined {chan_name}"));
        return Ok(());
    }

    let mapping = server.casemapping();
    let chan = server.get_or_create_channel(chan_name);
    match chan.users.add(mapping, &from, crate::mode::ModeVector::new()) {
        Ok(()) => {
            chan.bump_activity(Activity::Active);
            chan.note(BufferLineKind::Other, &from, &format!("{from} has joined {chan_name}"));
        }
        Err(_) => {
            log::debug!("JOIN from already-known member {from} in {chan_name}");
        }
    }
    Ok(())
}

pub fn handle_part(server: &mut Server, _outbox: &mut dyn Outbox, msg: &Message) -> Result<(), Error> {
    let chan_name = param(msg, 0).ok_or(Error::ProtocolMissingTarget)?;
    let from = sender_of(msg).unwrap_or("").to_owned();
    let reason = param(msg, 1);

    if rirc_casemap::irc_eq(server.casemapping(), &from, server.nick()) {
        if let Some(chan) = server.find_channel_mut(chan_name) {
            chan.part();
            chan.note(BufferLineKind::Other, "--", &format!("you have left {chan_name}"));
        }
        return Ok(());
    }

    let mapping = server.casemapping();
    if let Some(chan) = server.find_channel_mut(chan_name) {
        if chan.users.del(mapping, &from).is_ok() {
            let line = match reason {
                Some(r) => format!("{from} has left {chan_name} ({r})"),
                None => format!("{from} has left {chan_name}"),
            };
            chan.note(BufferLineKind::Other, &from, &line);
        }
    }
    Ok(())
}

pub fn handle_kick(server: &mut Server, _outbox: &mut dyn Outbox, msg: &Message) -> Result<(), Error> {
    let chan_name = param(msg, 0).ok_or(Error::ProtocolMissingTarget)?;
    let kicked = param(msg, 1).ok_or(Error::ProtocolMissingTarget)?.to_owned();
    let kicker = sender_of(msg).unwrap_or("").to_owned();
    let reason = param(msg, 2);
    let mapping = server.casemapping();
    let self_kicked = rirc_casemap::irc_eq(mapping, &kicked, server.nick());

    if let Some(chan) = server.find_channel_mut(chan_name) {
        let line = match reason {
            Some(r) => format!("{kicked} was kicked by {kicker} ({r})"),
            None => format!("{kicked} was kicked by {kicker}"),
        };
        chan.note(BufferLineKind::Other, &kicker, &line);
        if self_kicked {
            chan.part();
        } else {
            let _ = chan.users.del(mapping, &kicked);
        }
    }
    Ok(())
}

pub fn handle_quit(server: &mut Server, _outbox: &mut dyn Outbox, msg: &Message) -> Result<(), Error> {
    let from = sender_of(msg).unwrap_or("").to_owned();
    let reason = param(msg, 0);
    let affected = server.remove_member_everywhere(&from);
    for chan_name in affected {
        if let Some(chan) = server.find_channel_mut(&chan_name) {
            let line = match reason {
                Some(r) => format!("{from} has quit ({r})"),
                None => format!("{from} has quit"),
            };
            chan.note(BufferLineKind::Other, &from, &line);
        }
    }
    Ok(())
}

pub fn handle_nick(server: &mut Server, _outbox: &mut dyn Outbox, msg: &Message) -> Result<(), Error> {
    let old = sender_of(msg).unwrap_or("").to_owned();
    let new = param(msg, 0).ok_or(Error::ProtocolMissingTarget)?.to_owned();
    let is_self = rirc_casemap::irc_eq(server.casemapping(), &old, server.nick());
    let affected = server.rename_member_everywhere(&old, &new);
    for chan_name in &affected {
        if let Some(chan) = server.find_channel_mut(chan_name) {
            chan.note(BufferLineKind::Other, &old, &format!("{old} is now known as {new}"));
        }
    }
    // own nick change with no joined channel yet (e.g. during registration)
    // would otherwise leave no trace of the rename anywhere.
    if is_self && affected.is_empty() {
        server
            .buffer
            .newline(BufferLineKind::Other, "--", &format!("{old} is now known as {new}"));
    }
    Ok(())
}

pub fn handle_mode(server: &mut Server, _outbox: &mut dyn Outbox, msg: &Message) -> Result<(), Error> {
    let target = param(msg, 0).ok_or(Error::ProtocolMissingTarget)?.to_owned();
    let flags = param(msg, 1).unwrap_or("").to_owned();
    let rest: Vec<&str> = msg.params.iter().skip(2).map(String::as_str).collect();

    if server.is_channel_name(&target) {
        let config = server.mode_config.clone();
        let mapping = config.casemapping;
        let rejects: Vec<ModeReject> = {
            let chan = match server.find_channel_mut(&target) {
                Some(c) => c,
                None => return Err(Error::StateNoSuchChannel(target)),
            };
            let users = &mut chan.users;
            apply_channel_modes(&mut chan.modes, &config, &flags, &rest, |nick, letter, sign| {
                match users.get_mut(mapping, nick) {
                    Some(user) => {
                        if sign {
                            user.prefix_modes.set(letter);
                        } else {
                            user.prefix_modes.unset(letter);
                        }
                        true
                    }
                    None => false,
                }
            })
        };
        for reject in &rejects {
            log::debug!("MODE {target} rejected: {reject}");
            server.buffer.newline(BufferLineKind::Other, "--", &format!("{reject}"));
        }
        Ok(())
    } else {
        let rejects = apply_user_modes(&mut server.user_modes, &server.mode_config, &flags);
        for reject in &rejects {
            log::debug!("MODE {target} rejected: {reject}");
            server.buffer.newline(BufferLineKind::Other, "--", &format!("{reject}"));
        }
        Ok(())
    }
}

pub fn handle_privmsg(server: &mut Server, outbox: &mut dyn Outbox, msg: &Message) -> Result<(), Error> {
    privmsg_or_notice(server, outbox, msg, false)
}

pub fn handle_notice(server: &mut Server, outbox: &mut dyn Outbox, msg: &Message) -> Result<(), Error> {
    privmsg_or_notice(server, outbox, msg, true)
}

fn privmsg_or_notice(server: &mut Server, _outbox: &mut dyn Outbox, msg: &Message, is_notice: bool) -> Result<(), Error> {
    let target = param(msg, 0).ok_or(Error::ProtocolMissingTarget)?.to_owned();
    let text = param(msg, 1).unwrap_or("").to_owned();
    let from = sender_of(msg).unwrap_or("").to_owned();

    let (is_action, display_text) = match ctcp::parse(&text) {
        Some((Ctcp::Action, payload)) => (true, payload.to_owned()),
        Some((Ctcp::Version, _)) => {
            log::debug!("received CTCP VERSION request from {from}");
            return Ok(());
        }
        Some((Ctcp::Other(verb), _)) => {
            log::debug!("received inert CTCP {verb} from {from}");
            return Ok(());
        }
        None => (false, text.clone()),
    };

    let kind = if is_notice {
        BufferLineKind::Other
    } else {
        BufferLineKind::Chat
    };

    if server.is_channel_name(&target) {
        let mapping = server.casemapping();
        let nick = server.nick().to_owned();
        let pinged = !is_notice && mentions_nick(mapping, &display_text, &nick);
        let chan = match server.find_channel_mut(&target) {
            Some(c) => c,
            None => return Err(Error::StateNoSuchChannel(target)),
        };
        let line_kind = if pinged { BufferLineKind::Pinged } else { kind };
        if is_action {
            chan.note_action(line_kind, &from, &display_text);
        } else {
            chan.note(line_kind, &from, &display_text);
        }
        chan.bump_activity(if pinged { Activity::Pinged } else { Activity::Active });
        Ok(())
    } else {
        let chan = server.get_or_create_channel(&from);
        if is_action {
            chan.note_action(kind, &from, &display_text);
        } else {
            chan.note(kind, &from, &display_text);
        }
        Ok(())
    }
}

pub fn handle_topic(server: &mut Server, _outbox: &mut dyn Outbox, msg: &Message) -> Result<(), Error> {
    let chan_name = param(msg, 0).ok_or(Error::ProtocolMissingTarget)?;
    let topic = param(msg, 1).map(str::to_owned);
    let from = sender_of(msg).unwrap_or("").to_owned();
    if let Some(chan) = server.find_channel_mut(chan_name) {
        let line = match &topic {
            Some(t) => format!("{from} changed the topic to: {t}"),
            None => format!("{from} cleared the topic"),
        };
        chan.set_topic(topic);
        chan.note(BufferLineKind::Other, &from, &line);
    }
    Ok(())
}

pub fn handle_error(server: &mut Server, _outbox: &mut dyn Outbox, msg: &Message) -> Result<(), Error> {
    let reason = param(msg, 0).unwrap_or("");
    log::warn!("ERROR from server: {reason}");
    server.buffer.newline(BufferLineKind::Other, "--", &format!("error: {reason}"));
    Ok(())
}

pub fn handle_invite(server: &mut Server, _outbox: &mut dyn Outbox, msg: &Message) -> Result<(), Error> {
    let nick = param(msg, 0).unwrap_or("");
    let chan = param(msg, 1).unwrap_or("");
    server
        .buffer
        .newline(BufferLineKind::Other, "--", &format!("{nick} has invited you to {chan}"));
    Ok(())
}

// --- numeric handlers ------------------------------------------------------

/// `001 RPL_WELCOME`: latches the confirmed nick and marks registration
/// complete.
pub fn rpl_welcome(server: &mut Server, _outbox: &mut dyn Outbox, msg: &Message) -> Result<(), Error> {
    let nick = param(msg, 0).unwrap_or(server.nick()).to_owned();
    server.confirm_registration(&nick);
    Ok(())
}

/// `004 RPL_MYINFO <server> <version> <usermodes> <chanmodes>`.
pub fn rpl_myinfo(server: &mut Server, _outbox: &mut dyn Outbox, msg: &Message) -> Result<(), Error> {
    let usermodes = param(msg, 2).unwrap_or("");
    let chanmodes = param(msg, 3).unwrap_or("");
    server.mode_config.apply_004(usermodes, chanmodes);
    Ok(())
}

/// `005 RPL_ISUPPORT <nick> TOKEN[=value]... :are supported by this server`.
pub fn rpl_isupport(server: &mut Server, _outbox: &mut dyn Outbox, msg: &Message) -> Result<(), Error> {
    for tok in msg.params.iter().skip(1) {
        if tok.contains(' ') {
            continue;
        }
        if let Err(e) = server.mode_config.apply_isupport_token(tok) {
            return Err(Error::ProtocolUnknownCaseMapping(e.0));
        }
    }
    Ok(())
}

/// `332 RPL_TOPIC`.
pub fn rpl_topic(server: &mut Server, _outbox: &mut dyn Outbox, msg: &Message) -> Result<(), Error> {
    let n = msg.params.len();
    if n < 2 {
        return Ok(());
    }
    let chan_name = &msg.params[n - 2];
    let topic = msg.params[n - 1].clone();
    if let Some(chan) = server.find_channel_mut(chan_name) {
        chan.set_topic(Some(topic));
    }
    Ok(())
}

/// `353 RPL_NAMREPLY`: populates the channel's user list on join.
pub fn rpl_namreply(server: &mut Server, _outbox: &mut dyn Outbox, msg: &Message) -> Result<(), Error> {
    if msg.params.len() < 4 {
        return Ok(());
    }
    let chan_name = msg.params[2].clone();
    let names = msg.params[3].clone();
    let (prefix, mapping) = {
        let cfg = &server.mode_config;
        (cfg.prefix.clone(), cfg.casemapping)
    };
    let chan = server.get_or_create_channel(&chan_name);
    for entry in names.split_whitespace() {
        let (sigils, nick) = split_prefix_sigils(entry);
        let mut modes = crate::mode::ModeVector::new();
        for sigil in sigils.chars() {
            if let Some(letter) = prefix.letter_for_sigil(sigil) {
                modes.set(letter);
            }
        }
        if chan.users.get(mapping, nick).is_none() {
            let _ = chan.users.add(mapping, nick, modes);
        }
    }
    Ok(())
}

fn split_prefix_sigils(entry: &str) -> (&str, &str) {
    let cut = entry
        .find(|c: char| c.is_alphanumeric() || c == '_' || c == '[' || c == ']' || c == '\\' || c == '`')
        .unwrap_or(0);
    (&entry[..cut], &entry[cut..])
}

/// `432 ERR_ERRONEUSNICKNAME` / `433 ERR_NICKNAMEINUSE` during
/// registration: advance the rotation and resend NICK, per §4.8.1.
pub fn err_bad_nick(server: &mut Server, outbox: &mut dyn Outbox, _msg: &Message) -> Result<(), Error> {
    if server.registered {
        log::debug!("nick change rejected, not retrying during an active session");
        return Ok(());
    }
    let next = server.nick_rejected().to_owned();
    log::debug!("nick rejected, retrying with {next}");
    send(server, outbox, rirc_wire::nick(&next))
}

/// Shared routine for a numeric in a well-known RFC range with no
/// bespoke handler above: the connection state doesn't change, but the
/// reply is still worth a line (§4.8's "unhandled numerics... print a
/// generic server-buffer line").
pub fn generic_numeric(server: &mut Server, _outbox: &mut dyn Outbox, msg: &Message) -> Result<(), Error> {
    let code = match msg.command {
        rirc_wire::Command::Numeric(n) => n,
        rirc_wire::Command::Keyword(_) => unreachable!("numeric table only dispatches Command::Numeric"),
    };
    let text = msg.params.iter().skip(1).cloned().collect::<Vec<_>>().join(" ");
    server.buffer.newline(BufferLineKind::Other, "--", &format!("{code:03} {text}"));
    Ok(())
}

/// `331`/`366`/`376`: known-inert numerics (§6), dispatched but
/// producing no buffer line and no state change.
pub fn ignore_numeric(_server: &mut Server, _outbox: &mut dyn Outbox, _msg: &Message) -> Result<(), Error> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{IoSendError, ServerConfig};
    use rirc_wire::parse_line;

    fn server() -> Server {
        Server::new(ServerConfig::new(
            "irc.example.org",
            6667,
            "rirc",
            "rirc user",
            vec!["rirc".into(), "rirc2".into()],
        ))
    }

    #[derive(Default)]
    struct Sink(Vec<String>);
    impl Outbox for Sink {
        fn send_line(&mut self, line: &str) -> Result<(), IoSendError> {
            self.0.push(line.to_owned());
            Ok(())
        }
    }

    fn msg(line: &str) -> Message {
        parse_line(line).unwrap()
    }

    #[test]
    fn ping_replies_with_pong() {
        let mut s = server();
        let mut sink = Sink::default();
        handle_ping(&mut s, &mut sink, &msg("PING :abc123")).unwrap();
        assert_eq!(sink.0, vec!["PONG abc123\r\n".to_owned()]);
    }

    #[test]
    fn join_by_self_creates_channel() {
        let mut s = server();
        let mut sink = Sink::default();
        handle_join(&mut s, &mut sink, &msg(":rirc!u@h JOIN #rust")).unwrap();
        assert!(s.find_channel("#rust").is_some());
        assert!(!s.find_channel("#rust").unwrap().parted);
    }

    #[test]
    fn join_by_other_adds_member() {
        let mut s = server();
        let mut sink = Sink::default();
        handle_join(&mut s, &mut sink, &msg(":rirc!u@h JOIN #rust")).unwrap();
        handle_join(&mut s, &mut sink, &msg(":alice!u@h JOIN #rust")).unwrap();
        let chan = s.find_channel("#rust").unwrap();
        assert!(chan.users.contains(s.casemapping(), "alice"));
    }

    #[test]
    fn part_by_self_marks_parted() {
        let mut s = server();
        let mut sink = Sink::default();
        handle_join(&mut s, &mut sink, &msg(":rirc!u@h JOIN #rust")).unwrap();
        handle_part(&mut s, &mut sink, &msg(":rirc!u@h PART #rust :bye")).unwrap();
        assert!(s.find_channel("#rust").unwrap().parted);
    }

    #[test]
    fn quit_removes_member_from_every_channel() {
        let mut s = server();
        let mut sink = Sink::default();
        handle_join(&mut s, &mut sink, &msg(":rirc!u@h JOIN #a")).unwrap();
        handle_join(&mut s, &mut sink, &msg(":alice!u@h JOIN #a")).unwrap();
        handle_quit(&mut s, &mut sink, &msg(":alice!u@h QUIT :gone")).unwrap();
        assert!(!s.find_channel("#a").unwrap().users.contains(s.casemapping(), "alice"));
    }

    #[test]
    fn nick_own_change_before_joining_any_channel_notes_server_buffer() {
        let mut s = server();
        s.confirm_registration("rirc");
        let mut sink = Sink::default();
        handle_nick(&mut s, &mut sink, &msg(":rirc!u@h NICK :rirc-away")).unwrap();
        assert_eq!(s.nick(), "rirc-away");
        let line = s.buffer.head().unwrap();
        assert!(line.text.contains("rirc"));
        assert!(line.text.contains("rirc-away"));
    }

    #[test]
    fn nick_renames_member_and_own_nick() {
        let mut s = server();
        s.confirm_registration("rirc");
        let mut sink = Sink::default();
        handle_join(&mut s, &mut sink, &msg(":rirc!u@h JOIN #a")).unwrap();
        handle_nick(&mut s, &mut sink, &msg(":rirc!u@h NICK :rirc-away")).unwrap();
        assert_eq!(s.nick(), "rirc-away");
    }

    #[test]
    fn privmsg_to_channel_is_chat() {
        let mut s = server();
        let mut sink = Sink::default();
        handle_join(&mut s, &mut sink, &msg(":rirc!u@h JOIN #a")).unwrap();
        handle_privmsg(&mut s, &mut sink, &msg(":alice!u@h PRIVMSG #a :hello there")).unwrap();
        let chan = s.find_channel("#a").unwrap();
        assert_eq!(chan.buffer.head().unwrap().text, "hello there");
    }

    #[test]
    fn privmsg_mentioning_nick_is_pinged() {
        let mut s = server();
        s.confirm_registration("rirc");
        let mut sink = Sink::default();
        handle_join(&mut s, &mut sink, &msg(":rirc!u@h JOIN #a")).unwrap();
        handle_privmsg(&mut s, &mut sink, &msg(":alice!u@h PRIVMSG #a :hey rirc check this")).unwrap();
        let chan = s.find_channel("#a").unwrap();
        assert_eq!(chan.buffer.head().unwrap().kind, BufferLineKind::Pinged);
    }

    #[test]
    fn privmsg_substring_of_nick_is_not_pinged() {
        let mut s = server();
        s.confirm_registration("rirc");
        let mut sink = Sink::default();
        handle_join(&mut s, &mut sink, &msg(":rirc!u@h JOIN #a")).unwrap();
        handle_privmsg(&mut s, &mut sink, &msg(":alice!u@h PRIVMSG #a :rircbot says hi")).unwrap();
        let chan = s.find_channel("#a").unwrap();
        assert_eq!(chan.buffer.head().unwrap().kind, BufferLineKind::Chat);
    }

    #[test]
    fn privmsg_to_self_opens_private_buffer() {
        let mut s = server();
        s.confirm_registration("rirc");
        let mut sink = Sink::default();
        handle_privmsg(&mut s, &mut sink, &msg(":alice!u@h PRIVMSG rirc :hi")).unwrap();
        assert!(s.find_channel("alice").is_some());
    }

    #[test]
    fn ctcp_action_is_flagged() {
        let mut s = server();
        let mut sink = Sink::default();
        handle_join(&mut s, &mut sink, &msg(":rirc!u@h JOIN #a")).unwrap();
        handle_privmsg(&mut s, &mut sink, &msg(":alice!u@h PRIVMSG #a :\x01ACTION waves\x01")).unwrap();
        let chan = s.find_channel("#a").unwrap();
        let line = chan.buffer.head().unwrap();
        assert!(line.is_action);
        assert_eq!(line.text, "waves");
    }

    #[test]
    fn rpl_welcome_latches_nick_and_registers() {
        let mut s = server();
        let mut sink = Sink::default();
        handle_nick_rejected_then_welcome(&mut s, &mut sink);
        assert!(s.registered);
    }

    fn handle_nick_rejected_then_welcome(s: &mut Server, sink: &mut Sink) {
        err_bad_nick(s, sink, &msg(":srv 433 * rirc :Nickname is already in use")).unwrap();
        assert_eq!(s.nick(), "rirc2");
        rpl_welcome(s, sink, &msg(":srv 001 rirc2 :Welcome")).unwrap();
    }

    #[test]
    fn rpl_myinfo_absorbs_usermodes_and_chanmodes() {
        let mut s = server();
        let mut sink = Sink::default();
        rpl_myinfo(&mut s, &mut sink, &msg(":srv 004 rirc irc.example ov biklmnopstv")).unwrap();
        assert!(s.mode_config.user_modes.contains(&'o'));
    }

    #[test]
    fn rpl_isupport_parses_tokens() {
        let mut s = server();
        let mut sink = Sink::default();
        rpl_isupport(
            &mut s,
            &mut sink,
            &msg(":srv 005 rirc CASEMAPPING=ascii CHANTYPES=# :are supported"),
        )
        .unwrap();
        assert_eq!(s.mode_config.casemapping, rirc_casemap::CaseMapping::Ascii);
    }

    #[test]
    fn kick_removes_member_and_notes_reason() {
        let mut s = server();
        let mut sink = Sink::default();
        handle_join(&mut s, &mut sink, &msg(":rirc!u@h JOIN #a")).unwrap();
        handle_join(&mut s, &mut sink, &msg(":alice!u@h JOIN #a")).unwrap();
        handle_kick(&mut s, &mut sink, &msg(":rirc!u@h KICK #a alice :spamming")).unwrap();
        let chan = s.find_channel("#a").unwrap();
        assert!(!chan.users.contains(s.casemapping(), "alice"));
        assert!(chan.buffer.head().unwrap().text.contains("spamming"));
    }

    #[test]
    fn kick_of_self_marks_parted() {
        let mut s = server();
        s.confirm_registration("rirc");
        let mut sink = Sink::default();
        handle_join(&mut s, &mut sink, &msg(":rirc!u@h JOIN #a")).unwrap();
        handle_kick(&mut s, &mut sink, &msg(":alice!u@h KICK #a rirc :out")).unwrap();
        assert!(s.find_channel("#a").unwrap().parted);
    }

    #[test]
    fn topic_updates_channel_topic_line() {
        let mut s = server();
        let mut sink = Sink::default();
        handle_join(&mut s, &mut sink, &msg(":rirc!u@h JOIN #a")).unwrap();
        handle_topic(&mut s, &mut sink, &msg(":alice!u@h TOPIC #a :now talking about rust")).unwrap();
        let chan = s.find_channel("#a").unwrap();
        assert_eq!(chan.topic.as_deref(), Some("now talking about rust"));
    }

    #[test]
    fn error_writes_to_server_buffer() {
        let mut s = server();
        let mut sink = Sink::default();
        handle_error(&mut s, &mut sink, &msg("ERROR :Closing link")).unwrap();
        assert!(s.buffer.head().unwrap().text.contains("Closing link"));
    }

    #[test]
    fn invite_writes_server_buffer_notice() {
        let mut s = server();
        let mut sink = Sink::default();
        handle_invite(&mut s, &mut sink, &msg(":alice!u@h INVITE rirc #rust")).unwrap();
        let line = s.buffer.head().unwrap();
        assert!(line.text.contains("alice"));
        assert!(line.text.contains("#rust"));
    }

    #[test]
    fn mode_reject_on_channel_target_posts_to_server_buffer_not_channel_buffer() {
        let mut s = server();
        let mut sink = Sink::default();
        handle_join(&mut s, &mut sink, &msg(":rirc!u@h JOIN #a")).unwrap();
        handle_mode(&mut s, &mut sink, &msg(":srv MODE #a +z")).unwrap();
        let chan = s.find_channel("#a").unwrap();
        assert!(chan.buffer.is_empty());
        let line = s.buffer.head().unwrap();
        assert!(line.text.contains('z'));
    }

    #[test]
    fn mode_on_channel_grants_prefix_and_on_user_sets_own_modes() {
        let mut s = server();
        let mut sink = Sink::default();
        rpl_myinfo(&mut s, &mut sink, &msg(":srv 004 rirc irc.example iosw biklmnopstv")).unwrap();
        handle_join(&mut s, &mut sink, &msg(":rirc!u@h JOIN #a")).unwrap();
        handle_join(&mut s, &mut sink, &msg(":alice!u@h JOIN #a")).unwrap();
        handle_mode(&mut s, &mut sink, &msg(":srv MODE #a +o alice")).unwrap();
        let chan = s.find_channel("#a").unwrap();
        assert!(chan.users.get(s.casemapping(), "alice").unwrap().prefix_modes.is_set('o'));

        handle_mode(&mut s, &mut sink, &msg(":srv MODE rirc +i")).unwrap();
        assert!(s.user_modes.is_set('i'));
    }

    #[test]
    fn mode_reject_on_unknown_channel_target_is_an_error() {
        let mut s = server();
        let mut sink = Sink::default();
        assert!(matches!(
            handle_mode(&mut s, &mut sink, &msg(":srv MODE #ghost +n")),
            Err(Error::StateNoSuchChannel(_))
        ));
    }

    #[test]
    fn rpl_namreply_populates_user_list() {
        let mut s = server();
        let mut sink = Sink::default();
        handle_join(&mut s, &mut sink, &msg(":rirc!u@h JOIN #a")).unwrap();
        rpl_namreply(&mut s, &mut sink, &msg(":srv 353 rirc = #a :rirc @alice +bob")).unwrap();
        let chan = s.find_channel("#a").unwrap();
        assert!(chan.users.contains(s.casemapping(), "alice"));
        assert!(chan.users.get(s.casemapping(), "alice").unwrap().prefix_modes.is_set('o'));
    }
}
