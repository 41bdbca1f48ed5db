//! The recoverable error taxonomy (C11), mirroring §7 one-for-one.
//!
//! `Fatal` conditions are not a variant here: a core-invariant violation
//! (a bad buffer index, a corrupt mode letter) goes through [`fatal!`]
//! instead, which logs then panics, the same shape as the source's
//! `fatal()` macro (log, then `exit()`).

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(#[from] rirc_wire::ParseError),

    #[error("Message type '{0}' unknown")]
    DispatchUnknownKeyword(String),

    #[error("Numeric type '{0}' unknown")]
    DispatchUnknownNumeric(u16),

    #[error("NUMERIC: target is null")]
    ProtocolMissingTarget,

    #[error("NUMERIC: target mismatched, nick is '{nick}', received '{received}'")]
    ProtocolTargetMismatch { nick: String, received: String },

    #[error("unknown CASEMAPPING '{0}'")]
    ProtocolUnknownCaseMapping(String),

    #[error("no such channel '{0}'")]
    StateNoSuchChannel(String),

    #[error("no such user '{0}' in '{1}'")]
    StateNoSuchUser(String, String),

    #[error("Send fail: {0}")]
    IoSend(String),
}

impl Error {
    /// `protocol` errors additionally request a disconnect during
    /// registration, per §7's propagation rule.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Error::ProtocolMissingTarget
                | Error::ProtocolTargetMismatch { .. }
                | Error::ProtocolUnknownCaseMapping(_)
        )
    }
}

/// Logs at `error` level, then aborts. Reserved for programmer errors
/// (an invariant broken by the core itself), never for user/peer input,
/// matching the source's `fatal()`/`exit()` pair.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
        panic!($($arg)*);
    }};
}
