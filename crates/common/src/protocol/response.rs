// Server -> harness admin responses and notifications.
//
// Each shape is a token count plus literals at fixed positions plus
// integer fields. Any mismatch is a `DecodeError`; comparing decoded
// values against expectations is left to the caller.

use std::fmt;

use thiserror::Error;

use super::message::ProtocolMessage;

pub const NOT_AUTHENTICATED: &str = "NotAuthenticated";
pub const INVALID_AUTH_TOKEN: &str = "InvalidAuthToken";
pub const ADD_DOC: &str = "adddoc";
pub const RM_DOC: &str = "rmdoc";
pub const ACTIVE_USERS_COUNT: &str = "active_users_count";
pub const ACTIVE_DOCS_COUNT: &str = "active_docs_count";

/// Minimum number of tokens in an `adddoc` notification.
pub const ADD_DOC_MIN_TOKENS: usize = 5;

/// Required token count for a message shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub const fn accepts(self, count: usize) -> bool {
        match self {
            Self::Exactly(expected) => count == expected,
            Self::AtLeast(minimum) => count >= minimum,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exactly(expected) => write!(f, "{expected}"),
            Self::AtLeast(minimum) => write!(f, "at least {minimum}"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("`{kind}` message must have {expected} token(s), got {actual}: `{raw}`")]
    TokenCount { kind: &'static str, expected: Arity, actual: usize, raw: String },

    #[error("expected `{expected}` at token {position}, got `{actual}`")]
    Literal { position: usize, expected: String, actual: String },

    #[error("token {position} of `{kind}` message is not an integer: `{value}`")]
    NotInteger { kind: &'static str, position: usize, value: String },
}

/// Validate `message` against a kind literal and arity, returning its tokens.
fn check_shape<'a>(
    message: &'a ProtocolMessage,
    kind: &'static str,
    arity: Arity,
) -> Result<&'a [String], DecodeError> {
    let tokens = message.tokens();
    if !arity.accepts(tokens.len()) {
        return Err(DecodeError::TokenCount {
            kind,
            expected: arity,
            actual: tokens.len(),
            raw: message.raw().to_owned(),
        });
    }
    if tokens[0] != kind {
        return Err(DecodeError::Literal {
            position: 0,
            expected: kind.to_owned(),
            actual: tokens[0].clone(),
        });
    }
    Ok(tokens)
}

fn parse_int<T: std::str::FromStr>(
    tokens: &[String],
    kind: &'static str,
    position: usize,
) -> Result<T, DecodeError> {
    tokens[position].parse::<T>().map_err(|_| DecodeError::NotInteger {
        kind,
        position,
        value: tokens[position].clone(),
    })
}

/// Accept a single-token message consisting of exactly `literal`.
///
/// Used for the bare `NotAuthenticated` / `InvalidAuthToken` replies.
pub fn expect_literal(message: &ProtocolMessage, literal: &'static str) -> Result<(), DecodeError> {
    check_shape(message, literal, Arity::Exactly(1)).map(|_| ())
}

/// `adddoc <pid> <docName> <extra...>`: a document view was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddDoc {
    pub pid: u32,
    pub doc_name: String,
    /// Trailing fields (view id, memory use, ...), passed through unparsed.
    pub extra: Vec<String>,
}

impl AddDoc {
    pub fn decode(message: &ProtocolMessage) -> Result<Self, DecodeError> {
        let tokens = check_shape(message, ADD_DOC, Arity::AtLeast(ADD_DOC_MIN_TOKENS))?;
        Ok(Self {
            pid: parse_int(tokens, ADD_DOC, 1)?,
            doc_name: tokens[2].clone(),
            extra: tokens[3..].to_vec(),
        })
    }
}

/// `rmdoc <pid> <reasonCode>`: a document view was closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RmDoc {
    pub pid: u32,
    pub reason: String,
}

impl RmDoc {
    pub fn decode(message: &ProtocolMessage) -> Result<Self, DecodeError> {
        let tokens = check_shape(message, RM_DOC, Arity::Exactly(3))?;
        Ok(Self { pid: parse_int(tokens, RM_DOC, 1)?, reason: tokens[2].clone() })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountKind {
    ActiveUsers,
    ActiveDocs,
}

impl CountKind {
    pub const fn literal(self) -> &'static str {
        match self {
            Self::ActiveUsers => ACTIVE_USERS_COUNT,
            Self::ActiveDocs => ACTIVE_DOCS_COUNT,
        }
    }
}

/// `active_users_count <n>` / `active_docs_count <n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Count {
    pub kind: CountKind,
    pub value: i64,
}

impl Count {
    pub fn decode(message: &ProtocolMessage, kind: CountKind) -> Result<Self, DecodeError> {
        let literal = kind.literal();
        let tokens = check_shape(message, literal, Arity::Exactly(2))?;
        Ok(Self { kind, value: parse_int(tokens, literal, 1)? })
    }
}
