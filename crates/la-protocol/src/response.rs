//! Response token classification
//!
//! Every response ends with exactly one terminal token: `OK` when the command
//! succeeded or `ERROR NN` when the device rejected it. All other tokens are
//! data belonging to the command currently at the head of the queue.

/// Literal acknowledgment token
pub const ACK_TOKEN: &str = "OK";

/// Prefix of the device error token (`ERROR 07`)
pub const ERROR_PREFIX: &str = "ERROR ";

/// Meaning of a single response token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `OK` - the head command completed
    Acknowledge,
    /// `ERROR NN` - the head command failed with code `NN`
    Error(u8),
    /// Ordinary data token
    Data,
}

impl TokenKind {
    /// True for tokens that complete a command
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TokenKind::Data)
    }
}

/// Meaning of a whole block, taken from its final token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Bare terminator with no tokens
    Empty,
    /// Block ends in `OK`
    Acknowledgment,
    /// Block ends in `ERROR NN`
    ErrorCode(u8),
    /// Block carries only data tokens
    DataTokens,
}

/// Classify one response token
pub fn classify_token(token: &str) -> TokenKind {
    if token == ACK_TOKEN {
        return TokenKind::Acknowledge;
    }
    match parse_error_code(token) {
        Some(code) => TokenKind::Error(code),
        None => TokenKind::Data,
    }
}

/// Parse the code out of an `ERROR NN` token
pub fn parse_error_code(token: &str) -> Option<u8> {
    let digits = token.strip_prefix(ERROR_PREFIX)?.as_bytes();
    match digits {
        [tens, ones] if tens.is_ascii_digit() && ones.is_ascii_digit() => {
            Some((tens - b'0') * 10 + (ones - b'0'))
        }
        _ => None,
    }
}

/// Build the wire token for a device error code
pub fn error_token(code: u8) -> String {
    format!("{}{:02}", ERROR_PREFIX, code % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_must_match_exactly() {
        assert_eq!(classify_token("OK"), TokenKind::Acknowledge);
        assert_eq!(classify_token("LOOK"), TokenKind::Data);
        assert_eq!(classify_token("OK "), TokenKind::Data);
        assert_eq!(classify_token("ok"), TokenKind::Data);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(classify_token("ERROR 07"), TokenKind::Error(7));
        assert_eq!(classify_token("ERROR 00"), TokenKind::Error(0));
        assert_eq!(classify_token("ERROR 99"), TokenKind::Error(99));
    }

    #[test]
    fn test_malformed_errors_are_data() {
        assert_eq!(classify_token("ERROR 7"), TokenKind::Data);
        assert_eq!(classify_token("ERROR 123"), TokenKind::Data);
        assert_eq!(classify_token("ERROR"), TokenKind::Data);
        assert_eq!(classify_token("ERROR AB"), TokenKind::Data);
        assert_eq!(classify_token("XERROR 07"), TokenKind::Data);
    }

    #[test]
    fn test_terminal_kinds() {
        assert!(TokenKind::Acknowledge.is_terminal());
        assert!(TokenKind::Error(1).is_terminal());
        assert!(!TokenKind::Data.is_terminal());
    }

    #[test]
    fn test_error_token_formatting() {
        assert_eq!(error_token(7), "ERROR 07");
        assert_eq!(error_token(42), "ERROR 42");
        assert_eq!(parse_error_code(&error_token(5)), Some(5));
    }
}
