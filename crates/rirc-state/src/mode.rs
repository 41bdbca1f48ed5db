//! The mode engine (C4): ISUPPORT-derived configuration and the `+`/`-`
//! interpreter that applies a MODE command's flags to channel/user state.
//!
//! `ModeConfig` is fed incrementally as `004`/`005` arrive during
//! registration, so every field has a usable default before either
//! numeric is seen.

use rirc_casemap::CaseMapping;

/// 52 bits indexed by `a..z` then `A..Z`. Both channel modes, the local
/// user's own modes, and a channel member's prefix (status) modes use
/// this same representation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeVector(u64);

impl ModeVector {
    pub fn new() -> ModeVector {
        ModeVector::default()
    }

    fn bit_index(letter: char) -> Option<u32> {
        match letter {
            'a'..='z' => Some(letter as u32 - 'a' as u32),
            'A'..='Z' => Some(26 + (letter as u32 - 'A' as u32)),
            _ => None,
        }
    }

    /// Returns `false` (no-op) if `letter` isn't `[A-Za-z]`.
    pub fn set(&mut self, letter: char) -> bool {
        match Self::bit_index(letter) {
            Some(i) => {
                self.0 |= 1 << i;
                true
            }
            None => false,
        }
    }

    pub fn unset(&mut self, letter: char) -> bool {
        match Self::bit_index(letter) {
            Some(i) => {
                self.0 &= !(1 << i);
                true
            }
            None => false,
        }
    }

    pub fn is_set(&self, letter: char) -> bool {
        Self::bit_index(letter).is_some_and(|i| self.0 & (1 << i) != 0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Renders the set letters sorted and deduplicated, per §3's "Mode
    /// vector" shape. Used for channel modes and user modes.
    pub fn render_sorted(&self) -> String {
        let mut letters: Vec<char> = ('a'..='z').chain('A'..='Z').filter(|&c| self.is_set(c)).collect();
        letters.sort_unstable();
        letters.into_iter().collect()
    }

    /// Renders set letters in the PREFIX precedence order declared by
    /// `config` (leftmost letter is highest precedence), emitting the
    /// corresponding sigil rather than the letter. Used for a channel
    /// member's prefix-mode vector.
    pub fn render_prefix(&self, config: &ModeConfig) -> String {
        config
            .prefix
            .letters
            .iter()
            .zip(config.prefix.sigils.iter())
            .filter(|(letter, _)| self.is_set(**letter))
            .map(|(_, sigil)| *sigil)
            .collect()
    }
}

/// The four CHANMODES argument-arity classes (§4.4).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChanModes {
    /// List modes (e.g. `b`): always take a parameter, on set and unset.
    pub a: Vec<char>,
    /// Always take a parameter, on set and unset (e.g. `k`).
    pub b: Vec<char>,
    /// Take a parameter only when set (e.g. `l`).
    pub c: Vec<char>,
    /// Never take a parameter (e.g. `n`).
    pub d: Vec<char>,
}

/// `PREFIX=(letters)sigils`: a positional letter -> sigil mapping, in
/// precedence order (leftmost highest).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prefix {
    pub letters: Vec<char>,
    pub sigils: Vec<char>,
}

impl Prefix {
    pub fn letter_for_sigil(&self, sigil: char) -> Option<char> {
        self.sigils
            .iter()
            .position(|&s| s == sigil)
            .map(|i| self.letters[i])
    }

    pub fn contains_letter(&self, letter: char) -> bool {
        self.letters.contains(&letter)
    }
}

/// Incrementally constructed from `004`/`005` as they arrive; starts at
/// RFC 1459-era defaults so a server that never sends ISUPPORT is still
/// usable (§3.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeConfig {
    pub casemapping: CaseMapping,
    pub chantypes: Vec<u8>,
    pub chanmodes: ChanModes,
    pub prefix: Prefix,
    pub user_modes: Vec<char>,
    pub max_modes: usize,
}

impl Default for ModeConfig {
    fn default() -> ModeConfig {
        ModeConfig {
            casemapping: CaseMapping::default(),
            chantypes: vec![b'#', b'&'],
            chanmodes: ChanModes {
                a: vec!['b'],
                b: vec!['k'],
                c: vec!['l'],
                d: vec!['i', 'm', 'n', 'p', 's', 't'],
            },
            prefix: Prefix {
                letters: vec!['o', 'v'],
                sigils: vec!['@', '+'],
            },
            user_modes: vec!['i', 'w', 's', 'o'],
            max_modes: 3,
        }
    }
}

impl ModeConfig {
    pub fn is_chantype(&self, b: u8) -> bool {
        self.chantypes.contains(&b)
    }

    /// Parses one `TOKEN` or `TOKEN=value` pair from a `005` numeric.
    /// Unrecognised tokens are accepted silently (§6).
    pub fn apply_isupport_token(&mut self, token: &str) -> Result<(), UnknownCaseMapping> {
        let (name, value) = match token.split_once('=') {
            Some((n, v)) => (n, Some(v)),
            None => (token, None),
        };
        match (name, value) {
            ("CASEMAPPING", Some(v)) => match v.parse::<CaseMapping>() {
                Ok(m) => self.casemapping = m,
                Err(_) => return Err(UnknownCaseMapping(v.to_owned())),
            },
            ("CHANTYPES", Some(v)) => self.chantypes = v.bytes().collect(),
            ("CHANMODES", Some(v)) => {
                let mut parts = v.split(',');
                self.chanmodes = ChanModes {
                    a: parts.next().unwrap_or("").chars().collect(),
                    b: parts.next().unwrap_or("").chars().collect(),
                    c: parts.next().unwrap_or("").chars().collect(),
                    d: parts.next().unwrap_or("").chars().collect(),
                };
            }
            ("PREFIX", Some(v)) => {
                if let Some(rest) = v.strip_prefix('(') {
                    if let Some((letters, sigils)) = rest.split_once(')') {
                        self.prefix = Prefix {
                            letters: letters.chars().collect(),
                            sigils: sigils.chars().collect(),
                        };
                    }
                }
            }
            ("MODES", Some(v)) => {
                if let Ok(n) = v.parse::<usize>() {
                    self.max_modes = n;
                }
            }
            _ => {
                // unrecognised token, or a recognised token sent with no
                // value: accepted silently per §6.
            }
        }
        Ok(())
    }

    /// `004 <server> <version> <usermodes> <chanmodes>`.
    pub fn apply_004(&mut self, usermodes: &str, chanmodes: &str) {
        self.user_modes = usermodes.chars().collect();
        // 004's chanmodes lists every channel-mode letter the server supports
        // without the CHANMODES class split; fold any letter not already
        // classified by a prior 005 into class D (no-argument) so the mode
        // vector can still represent membership of it.
        for c in chanmodes.chars() {
            let known = self.chanmodes.a.contains(&c)
                || self.chanmodes.b.contains(&c)
                || self.chanmodes.c.contains(&c)
                || self.chanmodes.d.contains(&c);
            if !known {
                self.chanmodes.d.push(c);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCaseMapping(pub String);

/// What class (if any) a MODE letter belongs to under the active config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LetterClass {
    Prefix,
    A,
    B,
    C,
    D,
}

fn classify(config: &ModeConfig, letter: char) -> Option<LetterClass> {
    if config.prefix.contains_letter(letter) {
        Some(LetterClass::Prefix)
    } else if config.chanmodes.a.contains(&letter) {
        Some(LetterClass::A)
    } else if config.chanmodes.b.contains(&letter) {
        Some(LetterClass::B)
    } else if config.chanmodes.c.contains(&letter) {
        Some(LetterClass::C)
    } else if config.chanmodes.d.contains(&letter) {
        Some(LetterClass::D)
    } else {
        None
    }
}

/// A single rejected letter from a MODE command, per §4.4's silent-reject
/// list. The dispatcher turns each into a server-buffer diagnostic line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeReject {
    UnknownLetter(char),
    MissingArgument(char),
    UnknownTarget(char, String),
    CapExceeded(char),
}

impl std::fmt::Display for ModeReject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModeReject::UnknownLetter(c) => write!(f, "unknown mode letter '{c}'"),
            ModeReject::MissingArgument(c) => write!(f, "mode '{c}' is missing its argument"),
            ModeReject::UnknownTarget(c, nick) => {
                write!(f, "mode '{c}' target '{nick}' is not a channel member")
            }
            ModeReject::CapExceeded(c) => write!(f, "mode '{c}' exceeds the MODES cap for this command"),
        }
    }
}

/// Applies a channel MODE command (`+abc-de args...`) to `channel_modes`
/// and to member prefix-modes found via `lookup_user`/`grant_prefix`.
/// Class A (list-mode) letters participate in argument consumption and
/// cap accounting but are not persisted (§4.4.1: no component owns a
/// list-mode store).
pub fn apply_channel_modes<'a>(
    channel_modes: &mut ModeVector,
    config: &ModeConfig,
    flags: &str,
    args: &[&str],
    mut grant_prefix: impl FnMut(&str, char, bool) -> bool,
) -> Vec<ModeReject> {
    let mut rejects = Vec::new();
    let mut sign = true;
    let mut args = args.iter();
    let mut toggled = 0usize;

    for letter in flags.chars() {
        match letter {
            '+' => {
                sign = true;
                continue;
            }
            '-' => {
                sign = false;
                continue;
            }
            _ => {}
        }

        let class = match classify(config, letter) {
            Some(c) => c,
            None => {
                rejects.push(ModeReject::UnknownLetter(letter));
                continue;
            }
        };

        let needs_arg = match class {
            LetterClass::Prefix | LetterClass::A | LetterClass::B => true,
            LetterClass::C => sign,
            LetterClass::D => false,
        };

        let arg = if needs_arg {
            match args.next() {
                Some(a) => Some(*a),
                None => {
                    rejects.push(ModeReject::MissingArgument(letter));
                    continue;
                }
            }
        } else {
            None
        };

        toggled += 1;
        if toggled > config.max_modes {
            rejects.push(ModeReject::CapExceeded(letter));
            continue;
        }

        match class {
            LetterClass::Prefix => {
                let nick = arg.expect("prefix mode always has an argument");
                if !grant_prefix(nick, letter, sign) {
                    rejects.push(ModeReject::UnknownTarget(letter, nick.to_owned()));
                }
            }
            LetterClass::A => {
                // pass-through: argument consumed, no vector bit to flip.
            }
            LetterClass::B | LetterClass::D => {
                if sign {
                    channel_modes.set(letter);
                } else {
                    channel_modes.unset(letter);
                }
            }
            LetterClass::C => {
                if sign {
                    channel_modes.set(letter);
                } else {
                    channel_modes.unset(letter);
                }
            }
        }
    }

    rejects
}

/// Applies a user MODE command (modes targeting the local user) to
/// `user_modes`. User modes never take parameters (§4.4's `usermodes`).
pub fn apply_user_modes(user_modes: &mut ModeVector, config: &ModeConfig, flags: &str) -> Vec<ModeReject> {
    let mut rejects = Vec::new();
    let mut sign = true;

    for letter in flags.chars() {
        match letter {
            '+' => {
                sign = true;
                continue;
            }
            '-' => {
                sign = false;
                continue;
            }
            _ => {}
        }

        if !config.user_modes.contains(&letter) {
            rejects.push(ModeReject::UnknownLetter(letter));
            continue;
        }

        if sign {
            user_modes.set(letter);
        } else {
            user_modes.unset(letter);
        }
    }

    rejects
}
