//! CTCP framing: a PRIVMSG/NOTICE trailing parameter bracketed by `\x01` bytes.
//!
//! File transfer and general CTCP reply content are out of scope; this only
//! recognises the framing so that `ACTION` (used for ordinary `/me` chat)
//! can be told apart from a plain message.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ctcp {
    Action,
    Version,
    Other(String),
}

/// If `text` is CTCP-framed, returns the verb and the remaining payload.
/// Accepts a missing closing `\x01` (some clients send `ACTION ...` without
/// it, notably when truncated by message splitting).
pub fn parse(text: &str) -> Option<(Ctcp, &str)> {
    let rest = text.strip_prefix('\x01')?;
    let rest = rest.strip_suffix('\x01').unwrap_or(rest);
    let (verb, payload) = match rest.find(' ') {
        Some(idx) => (&rest[..idx], &rest[idx + 1..]),
        None => (rest, ""),
    };
    let kind = match verb {
        "ACTION" => Ctcp::Action,
        "VERSION" => Ctcp::Version,
        other => Ctcp::Other(other.to_owned()),
    };
    Some((kind, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_action() {
        assert_eq!(
            parse("\x01ACTION writes some specs!\x01"),
            Some((Ctcp::Action, "writes some specs!"))
        );
    }

    #[test]
    fn parses_action_missing_trailing_delim() {
        assert_eq!(parse("\x01ACTION msg contents"), Some((Ctcp::Action, "msg contents")));
    }

    #[test]
    fn parses_bare_verb_with_no_payload() {
        assert_eq!(parse("\x01VERSION\x01"), Some((Ctcp::Version, "")));
    }

    #[test]
    fn non_ctcp_text_is_none() {
        assert_eq!(parse("hello there"), None);
    }

    #[test]
    fn unknown_verb_is_other() {
        assert_eq!(
            parse("\x01CLIENTINFO\x01"),
            Some((Ctcp::Other("CLIENTINFO".to_owned()), ""))
        );
    }
}
