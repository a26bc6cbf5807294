// Tokenized view of one inbound admin text frame.

use std::fmt;

/// Split a raw message into whitespace-delimited tokens.
///
/// Empty fields are discarded and each token is trimmed; order is kept
/// because position carries meaning (token 0 is the message kind).
pub fn tokenize(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(|token| token.trim().to_owned()).collect()
}

/// A raw admin message together with its tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolMessage {
    raw: String,
    tokens: Vec<String>,
}

impl ProtocolMessage {
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let tokens = tokenize(&raw);
        Self { raw, tokens }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Message kind (first token), or `None` for a blank message.
    pub fn kind(&self) -> Option<&str> {
        self.tokens.first().map(String::as_str)
    }

    pub fn token(&self, position: usize) -> Option<&str> {
        self.tokens.get(position).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl fmt::Display for ProtocolMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
