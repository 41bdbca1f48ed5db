//! Connection-scoped state (C8): identity, nick rotation, the joined
//! channel list, and the boundary trait (C14) the core uses to hand
//! lines back to the network layer.
//!
//! The idle-timer latency sample is a synchronous `(nonce, sent_at)`
//! pair rather than a timeout state machine, since this crate drives
//! no async runtime of its own; the caller owns the timer and only
//! calls in with the nonce it sent and the token it got back.

use std::time::{Duration, Instant};

use rirc_casemap::CaseMapping;

use crate::buffer::Buffer;
use crate::channel::Channel;
use crate::error::Error;
use crate::mode::{ModeConfig, ModeVector};
use crate::user::UserList;

/// The core's half of the network egress boundary. A consumer supplies
/// a concrete `Outbox` (a socket writer, an in-memory queue for tests);
/// the core never sees a socket directly.
pub trait Outbox {
    fn send_line(&mut self, line: &str) -> Result<(), IoSendError>;

    /// Requests the transport tear down the connection. Called after a
    /// registration-time protocol error per §7's propagation rule.
    fn disconnect(&mut self) {}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct IoSendError(pub String);

/// Caller-supplied identity and connection parameters. Loading these
/// from a configuration file is a bootstrap concern (out of scope);
/// this crate only models the in-memory shape.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub pass: Option<String>,
    pub username: String,
    pub realname: String,
    pub nicks: Vec<String>,
}

impl ServerConfig {
    pub fn new(host: &str, port: u16, username: &str, realname: &str, nicks: Vec<String>) -> ServerConfig {
        ServerConfig {
            host: host.to_owned(),
            port,
            pass: None,
            username: username.to_owned(),
            realname: realname.to_owned(),
            nicks,
        }
    }
}

/// Tracks the preferred-nick cursor (invariant 4, §3): once the
/// preferred list is exhausted, keep appending `_` forever rather than
/// surfacing a fatal "out of nicks" condition, matching the source's
/// unconditional `server_nicks_next` loop.
#[derive(Debug)]
struct NickRotation {
    nicks: Vec<String>,
    cursor: usize,
    current: String,
}

impl NickRotation {
    fn new(nicks: Vec<String>) -> NickRotation {
        let current = nicks.first().cloned().unwrap_or_else(|| "rirc".to_owned());
        NickRotation {
            nicks,
            cursor: 0,
            current,
        }
    }

    fn next(&mut self) -> &str {
        self.cursor += 1;
        self.current = if self.cursor < self.nicks.len() {
            self.nicks[self.cursor].clone()
        } else {
            format!("{}_", self.current)
        };
        &self.current
    }

    fn reset(&mut self) {
        self.cursor = 0;
        self.current = self.nicks.first().cloned().unwrap_or_else(|| "rirc".to_owned());
    }
}

/// An outstanding idle-timer PING awaiting its matching PONG, per
/// §3.1's latency sample.
#[derive(Debug)]
struct PingSent {
    nonce: String,
    sent_at: Instant,
}

#[derive(Debug)]
pub struct Server {
    pub config: ServerConfig,
    rotation: NickRotation,
    /// Latched by `001`; `None` before registration completes.
    pub registered: bool,
    pub channels: Vec<Channel>,
    pub ignore: UserList,
    pub user_modes: ModeVector,
    pub mode_config: ModeConfig,
    ping_sent: Option<PingSent>,
    pub latency: Option<Duration>,
    /// The status-tab buffer: connection-level lines (errors, unhandled
    /// numerics, ERROR/INVITE notices) that don't belong to any one
    /// channel.
    pub buffer: Buffer,
}

impl Server {
    pub fn new(config: ServerConfig) -> Server {
        let rotation = NickRotation::new(config.nicks.clone());
        Server {
            config,
            rotation,
            registered: false,
            channels: Vec::new(),
            ignore: UserList::new(),
            user_modes: ModeVector::new(),
            mode_config: ModeConfig::default(),
            ping_sent: None,
            latency: None,
            buffer: Buffer::new(),
        }
    }

    pub fn casemapping(&self) -> CaseMapping {
        self.mode_config.casemapping
    }

    pub fn nick(&self) -> &str {
        &self.rotation.current
    }

    /// Advances the rotation cursor after a registration-time
    /// `432`/`433`, per §4.8.1.
    pub fn nick_rejected(&mut self) -> &str {
        self.rotation.next()
    }

    pub fn reset_nick_rotation(&mut self) {
        self.rotation.reset();
    }

    /// Latches the confirmed nick on `001`, per §6.
    pub fn confirm_registration(&mut self, confirmed_nick: &str) {
        self.rotation.current = confirmed_nick.to_owned();
        self.registered = true;
    }

    pub fn find_channel(&self, name: &str) -> Option<&Channel> {
        let mapping = self.casemapping();
        self.channels.iter().find(|c| c.is_named(mapping, name))
    }

    pub fn find_channel_mut(&mut self, name: &str) -> Option<&mut Channel> {
        let mapping = self.casemapping();
        self.channels.iter_mut().find(|c| c.is_named(mapping, name))
    }

    pub fn channel_index(&self, name: &str) -> Option<usize> {
        let mapping = self.casemapping();
        self.channels.iter().position(|c| c.is_named(mapping, name))
    }

    /// Returns the channel named `name`, creating it (appended to the
    /// navigation ring in join order, per §3) if absent.
    pub fn get_or_create_channel(&mut self, name: &str) -> &mut Channel {
        if self.channel_index(name).is_none() {
            self.channels.push(Channel::new(name));
        }
        self.find_channel_mut(name).expect("just inserted")
    }

    pub fn remove_channel(&mut self, name: &str) -> Option<Channel> {
        let idx = self.channel_index(name)?;
        Some(self.channels.remove(idx))
    }

    /// `true` when `target`'s first byte is a CHANTYPES sigil.
    pub fn is_channel_name(&self, target: &str) -> bool {
        target.as_bytes().first().is_some_and(|&b| self.mode_config.is_chantype(b))
    }

    /// Removes `nick` from every joined channel that contained them,
    /// e.g. on QUIT. Returns the names of channels it was removed from,
    /// in channel order, for one buffer line per channel (§4.8).
    pub fn remove_member_everywhere(&mut self, nick: &str) -> Vec<String> {
        let mapping = self.casemapping();
        let mut left = Vec::new();
        for chan in &mut self.channels {
            if chan.users.del(mapping, nick).is_ok() {
                left.push(chan.name.clone());
            }
        }
        left
    }

    /// Renames `old` to `new` in every channel that contains them. If
    /// `old` is the server's own nick, the rotation's current nick is
    /// also updated. Returns the names of channels where the rename
    /// took effect.
    pub fn rename_member_everywhere(&mut self, old: &str, new: &str) -> Vec<String> {
        let mapping = self.casemapping();
        let mut renamed = Vec::new();
        for chan in &mut self.channels {
            if chan.users.replace(mapping, old, new).is_ok() {
                renamed.push(chan.name.clone());
            }
        }
        if rirc_casemap::irc_eq(mapping, self.nick(), old) {
            self.rotation.current = new.to_owned();
        }
        renamed
    }

    /// Sends an idle-timer PING carrying `nonce`, recording it for
    /// later PONG matching.
    pub fn send_idle_ping(&mut self, outbox: &mut dyn Outbox, nonce: &str) -> Result<(), Error> {
        outbox
            .send_line(&rirc_wire::ping(nonce))
            .map_err(|e| Error::IoSend(e.0))?;
        self.ping_sent = Some(PingSent {
            nonce: nonce.to_owned(),
            sent_at: Instant::now(),
        });
        Ok(())
    }

    /// Matches an inbound PONG token against the outstanding ping.
    /// A mismatched or unsolicited token is inert, per §3.1, not an
    /// error; it simply yields no sample.
    pub fn record_pong(&mut self, token: &str) {
        if let Some(sent) = &self.ping_sent {
            if sent.nonce == token {
                self.latency = Some(sent.sent_at.elapsed());
                self.ping_sent = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ServerConfig {
        ServerConfig::new(
            "irc.example.org",
            6667,
            "rirc",
            "rirc user",
            vec!["rirc".into(), "rirc2".into()],
        )
    }

    struct RecordingOutbox(Vec<String>);
    impl Outbox for RecordingOutbox {
        fn send_line(&mut self, line: &str) -> Result<(), IoSendError> {
            self.0.push(line.to_owned());
            Ok(())
        }
    }

    #[test]
    fn nick_rotation_advances_then_appends_underscore_forever() {
        let mut server = Server::new(config());
        assert_eq!(server.nick(), "rirc");
        assert_eq!(server.nick_rejected(), "rirc2");
        assert_eq!(server.nick_rejected(), "rirc2_");
        assert_eq!(server.nick_rejected(), "rirc2__");
    }

    #[test]
    fn confirm_registration_latches_nick() {
        let mut server = Server::new(config());
        server.nick_rejected();
        server.confirm_registration("rirc2");
        assert!(server.registered);
        assert_eq!(server.nick(), "rirc2");
    }

    #[test]
    fn get_or_create_channel_is_idempotent() {
        let mut server = Server::new(config());
        server.get_or_create_channel("#rust");
        server.get_or_create_channel("#RUST");
        assert_eq!(server.channels.len(), 1);
    }

    #[test]
    fn remove_member_everywhere_reports_affected_channels() {
        let mut server = Server::new(config());
        server.get_or_create_channel("#a");
        server.get_or_create_channel("#b");
        server.channels[0].users.add(server.casemapping(), "alice", ModeVector::new()).unwrap();
        server.channels[1].users.add(server.casemapping(), "bob", ModeVector::new()).unwrap();
        let left = server.remove_member_everywhere("alice");
        assert_eq!(left, vec!["#a".to_owned()]);
    }

    #[test]
    fn rename_member_everywhere_updates_own_nick() {
        let mut server = Server::new(config());
        server.confirm_registration("rirc");
        server.get_or_create_channel("#a");
        let mapping = server.casemapping();
        server.channels[0].users.add(mapping, "rirc", ModeVector::new()).unwrap();
        server.rename_member_everywhere("rirc", "rirc-away");
        assert_eq!(server.nick(), "rirc-away");
    }

    #[test]
    fn ping_pong_round_trip_yields_latency() {
        let mut server = Server::new(config());
        let mut outbox = RecordingOutbox(Vec::new());
        server.send_idle_ping(&mut outbox, "abc123").unwrap();
        assert_eq!(outbox.0, vec!["PING abc123\r\n".to_owned()]);
        server.record_pong("abc123");
        assert!(server.latency.is_some());
    }

    #[test]
    fn mismatched_pong_is_inert() {
        let mut server = Server::new(config());
        let mut outbox = RecordingOutbox(Vec::new());
        server.send_idle_ping(&mut outbox, "abc123").unwrap();
        server.record_pong("other");
        assert!(server.latency.is_none());
    }
}
