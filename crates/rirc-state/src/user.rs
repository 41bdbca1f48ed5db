//! Per-channel user records and the user list (C5), wrapping the ordered
//! case-insensitive map (C1 / `rirc-avl`) keyed by mapped nick.
//!
//! Every operation here threads the server's [`CaseMapping`] through
//! instead of assuming ASCII comparison, since a network's ISUPPORT
//! `CASEMAPPING` token is only known at runtime.

use rirc_avl::{AvlMap, Duplicate, NotFound};
use rirc_casemap::CaseMapping;

use crate::mode::ModeVector;

/// A channel member: nick plus the status modes granted within that one
/// channel.
#[derive(Debug, Clone)]
pub struct User {
    pub nick: String,
    pub nick_len: usize,
    pub prefix_modes: ModeVector,
}

impl User {
    pub fn new(nick: &str, prefix_modes: ModeVector) -> User {
        User {
            nick: nick.to_owned(),
            nick_len: nick.len(),
            prefix_modes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceError {
    OldNotFound,
    NewDuplicate,
}

/// Wraps `AvlMap<User>` keyed by the server's mapped nick. The map's own
/// `len()` is the "count field kept in sync" named in §4.5.
#[derive(Debug, Default)]
pub struct UserList {
    map: AvlMap<User>,
}

impl UserList {
    pub fn new() -> UserList {
        UserList::default()
    }

    pub fn count(&self) -> usize {
        self.map.len()
    }

    pub fn add(&mut self, mapping: CaseMapping, nick: &str, prefix_modes: ModeVector) -> Result<(), Duplicate> {
        self.map.insert(mapping, nick, User::new(nick, prefix_modes))
    }

    pub fn del(&mut self, mapping: CaseMapping, nick: &str) -> Result<User, NotFound> {
        self.map.remove(mapping, nick)
    }

    /// `del`-then-`add`, atomic for the caller: if `new` collides with an
    /// existing member, `old` is reinserted and no state change is
    /// observed from the outside.
    pub fn replace(&mut self, mapping: CaseMapping, old: &str, new: &str) -> Result<(), ReplaceError> {
        let user = self.map.remove(mapping, old).map_err(|_| ReplaceError::OldNotFound)?;
        let prefix_modes = user.prefix_modes;
        match self.map.insert(mapping, new, User::new(new, prefix_modes)) {
            Ok(()) => Ok(()),
            Err(Duplicate) => {
                self.map
                    .insert(mapping, old, User::new(old, prefix_modes))
                    .expect("old nick's slot was just vacated by remove");
                Err(ReplaceError::NewDuplicate)
            }
        }
    }

    pub fn get(&self, mapping: CaseMapping, nick: &str) -> Option<&User> {
        self.map.get(mapping, nick)
    }

    pub fn get_mut(&mut self, mapping: CaseMapping, nick: &str) -> Option<&mut User> {
        self.map.get_mut(mapping, nick)
    }

    /// The unique member whose mapped nick starts with `prefix`'s first
    /// `len` mapped bytes, or `None`.
    pub fn get_prefix(&self, mapping: CaseMapping, prefix: &str, len: usize) -> Option<&User> {
        self.map.find_prefix(mapping, prefix, len)
    }

    pub fn contains(&self, mapping: CaseMapping, nick: &str) -> bool {
        self.get(mapping, nick).is_some()
    }

    pub fn iter(&self) -> rirc_avl::Iter<'_, User> {
        self.map.iter()
    }
}
