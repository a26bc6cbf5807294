// Text grammar of the document server's admin WebSocket.

pub mod command;
pub mod message;
pub mod response;

pub use command::{AdminCommand, CommandParseError, Event};
pub use message::{tokenize, ProtocolMessage};
pub use response::{AddDoc, Arity, Count, CountKind, DecodeError, RmDoc};
