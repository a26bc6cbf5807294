// Harness -> server admin commands.
//
// One command per text frame: a literal followed by space separated
// arguments.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Notification streams an admin channel can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    AddDoc,
    RmDoc,
}

impl Event {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AddDoc => "adddoc",
            Self::RmDoc => "rmdoc",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    /// `auth jwt=<token>`
    Auth { token: String },
    /// `subscribe <event>`
    Subscribe(Event),
    /// `load url=<documentURL>`, sent on a document channel.
    Load { url: String },
    /// `documents`: list open documents (requires an authenticated channel).
    Documents,
    ActiveUsersCount,
    ActiveDocsCount,
}

impl fmt::Display for AdminCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth { token } => write!(f, "auth jwt={token}"),
            Self::Subscribe(event) => write!(f, "subscribe {event}"),
            Self::Load { url } => write!(f, "load url={url}"),
            Self::Documents => f.write_str("documents"),
            Self::ActiveUsersCount => f.write_str("active_users_count"),
            Self::ActiveDocsCount => f.write_str("active_docs_count"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,

    #[error("unknown command `{0}`")]
    Unknown(String),

    #[error("`{command}` expects `{expected}`")]
    BadArgument { command: &'static str, expected: &'static str },
}

impl FromStr for AdminCommand {
    type Err = CommandParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut tokens = raw.split_whitespace();
        let name = tokens.next().ok_or(CommandParseError::Empty)?;
        let argument = tokens.next();

        match (name, argument) {
            ("auth", Some(arg)) => arg
                .strip_prefix("jwt=")
                .map(|token| Self::Auth { token: token.to_owned() })
                .ok_or(CommandParseError::BadArgument { command: "auth", expected: "jwt=<token>" }),
            ("subscribe", Some("adddoc")) => Ok(Self::Subscribe(Event::AddDoc)),
            ("subscribe", Some("rmdoc")) => Ok(Self::Subscribe(Event::RmDoc)),
            ("load", Some(arg)) => arg
                .strip_prefix("url=")
                .map(|url| Self::Load { url: url.to_owned() })
                .ok_or(CommandParseError::BadArgument { command: "load", expected: "url=<url>" }),
            ("documents", None) => Ok(Self::Documents),
            ("active_users_count", None) => Ok(Self::ActiveUsersCount),
            ("active_docs_count", None) => Ok(Self::ActiveDocsCount),
            ("auth", None) => {
                Err(CommandParseError::BadArgument { command: "auth", expected: "jwt=<token>" })
            }
            ("subscribe", _) => {
                Err(CommandParseError::BadArgument { command: "subscribe", expected: "adddoc|rmdoc" })
            }
            ("load", None) => {
                Err(CommandParseError::BadArgument { command: "load", expected: "url=<url>" })
            }
            (other, _) => Err(CommandParseError::Unknown(other.to_owned())),
        }
    }
}
