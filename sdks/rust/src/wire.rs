//! Readiness line wire format.
//!
//! A managed process announces itself by printing `<role-code>:<token>` on
//! its standard output, once when it begins starting (registration) and once
//! more with the same token when it is ready to serve (confirmation).

use crate::types::{ReadinessToken, Role};
use std::fmt;
use thiserror::Error;

/// Errors produced when decoding a readiness line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// The line has no `:` separator.
    #[error("readiness line has no ':' separator")]
    MissingSeparator,

    /// The part before the separator is not an unsigned integer.
    #[error("invalid role code '{0}'")]
    InvalidCode(String),

    /// Nothing follows the separator.
    #[error("readiness line has an empty token")]
    EmptyToken,
}

/// One decoded readiness line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadinessLine {
    /// Role code of the reporting process.
    pub code: u32,
    /// Token chosen by the process for its current launch.
    pub token: String,
}

impl ReadinessLine {
    /// Build the line a process of `role` prints for `token`.
    #[must_use]
    pub fn new(role: Role, token: &ReadinessToken) -> Self {
        Self {
            code: role.code(),
            token: token.to_string(),
        }
    }

    /// Decode a line read from a process's output stream.
    ///
    /// Surrounding whitespace, including a trailing `\r`, is ignored. The
    /// token is everything after the first `:`.
    ///
    /// # Errors
    ///
    /// Returns a [`WireError`] when the line is not of the form
    /// `<integer>:<token>`.
    pub fn parse(line: &str) -> Result<Self, WireError> {
        let (code, token) = line
            .trim()
            .split_once(':')
            .ok_or(WireError::MissingSeparator)?;

        let code = code.trim();
        let code = code
            .parse::<u32>()
            .map_err(|_| WireError::InvalidCode(code.to_string()))?;

        let token = token.trim();
        if token.is_empty() {
            return Err(WireError::EmptyToken);
        }

        Ok(Self {
            code,
            token: token.to_string(),
        })
    }

    /// The role this line claims to come from, if the code is known.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        Role::from_code(self.code).ok()
    }
}

impl fmt::Display for ReadinessLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.code, self.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_well_formed_line() {
        let line = ReadinessLine::parse("5:rdy_01h455vb4pex5vsknk084sn02q\r\n");
        assert_eq!(
            line,
            Ok(ReadinessLine {
                code: 5,
                token: "rdy_01h455vb4pex5vsknk084sn02q".to_string(),
            })
        );
    }

    #[test]
    fn token_keeps_later_separators() {
        let Ok(line) = ReadinessLine::parse("1:a:b") else {
            panic!("expected line to parse");
        };
        assert_eq!(line.token, "a:b");
        assert_eq!(line.role(), Some(Role::Database));
    }

    #[test]
    fn malformed_lines_are_rejected() {
        assert_eq!(
            ReadinessLine::parse("server booting"),
            Err(WireError::MissingSeparator)
        );
        assert_eq!(
            ReadinessLine::parse("db:abc"),
            Err(WireError::InvalidCode("db".to_string()))
        );
        assert_eq!(
            ReadinessLine::parse("-1:abc"),
            Err(WireError::InvalidCode("-1".to_string()))
        );
        assert_eq!(ReadinessLine::parse("3:   "), Err(WireError::EmptyToken));
    }

    #[test]
    fn unknown_code_has_no_role() {
        let Ok(line) = ReadinessLine::parse("42:abc") else {
            panic!("expected line to parse");
        };
        assert_eq!(line.role(), None);
    }

    #[test]
    fn display_matches_wire_format() {
        let token = ReadinessToken::new();
        let line = ReadinessLine::new(Role::LoginGate, &token);
        assert_eq!(line.to_string(), format!("7:{token}"));
        assert_eq!(ReadinessLine::parse(&line.to_string()), Ok(line));
    }
}
