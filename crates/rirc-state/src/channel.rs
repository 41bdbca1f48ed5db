//! A joined (or parted-but-remembered) channel (C7): its buffer, user
//! list, mode state and activity indicator.
//!
//! No back-reference to its owning `Server` and no intrusive
//! next/prev links: `Server::channels` owns these directly and looks
//! them up by name, so a handler that needs the server reaches it via
//! an explicit parameter instead.

use rirc_casemap::CaseMapping;

use crate::buffer::{Buffer, BufferLineKind};
use crate::mode::ModeVector;
use crate::user::UserList;

/// Named `Activity` rather than the source's `activity_t` since nothing
/// else in this crate is an "activity type".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Activity {
    Default,
    Active,
    Pinged,
}

impl Default for Activity {
    fn default() -> Activity {
        Activity::Default
    }
}

#[derive(Debug)]
pub struct Channel {
    pub name: String,
    pub topic: Option<String>,
    pub modes: ModeVector,
    pub users: UserList,
    pub buffer: Buffer,
    pub activity: Activity,
    /// Left by PART/KICK of self; the channel and its buffer are kept
    /// so history survives a rejoin, matching the source's `parted`
    /// flag rather than dropping the record.
    pub parted: bool,
}

impl Channel {
    pub fn new(name: &str) -> Channel {
        Channel {
            name: name.to_owned(),
            topic: None,
            modes: ModeVector::new(),
            users: UserList::new(),
            buffer: Buffer::new(),
            activity: Activity::Default,
            parted: false,
        }
    }

    /// `true` when `name`, case-mapped, names this channel.
    pub fn is_named(&self, mapping: CaseMapping, name: &str) -> bool {
        rirc_casemap::irc_eq(mapping, &self.name, name)
    }

    /// The CHANTYPES sigil this channel was created with, e.g. `#` or
    /// `&`. Derived from `name` rather than stored separately, since the
    /// two could otherwise drift out of sync.
    pub fn sigil(&self) -> u8 {
        self.name.as_bytes()[0]
    }

    pub fn rejoin(&mut self) {
        self.parted = false;
        self.activity = Activity::Default;
    }

    pub fn part(&mut self) {
        self.parted = true;
        self.users = UserList::new();
        self.activity = Activity::Default;
    }

    pub fn set_topic(&mut self, topic: Option<String>) {
        self.topic = topic;
    }

    pub fn bump_activity(&mut self, level: Activity) {
        if level > self.activity {
            self.activity = level;
        }
    }

    pub fn clear_activity(&mut self) {
        self.activity = Activity::Default;
    }

    pub fn note(&mut self, kind: BufferLineKind, from: &str, text: &str) {
        self.buffer.newline(kind, from, text);
    }

    pub fn note_action(&mut self, kind: BufferLineKind, from: &str, text: &str) {
        self.buffer.newline_action(kind, from, text);
    }

}
