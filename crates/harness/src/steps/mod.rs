// Admin console conformance steps.
//
// Each step body returns `Result<(), StepError>`; `run` collapses that to
// a verdict so the sequencer only ever sees pass, fail or timeout.

mod admin_ws;
mod context;
mod counts;
mod documents;
mod login;

use std::fmt;

use adminprobe_common::protocol::{CountKind, DecodeError};
use reqwest::StatusCode;
use thiserror::Error;
use tracing::warn;

use crate::auth::AuthError;
use crate::fixture::FixtureError;
use crate::registry::RegistryError;
use crate::sequencer::{TestStep, Verdict};
use crate::transport::TransportError;

pub use context::AdminContext;

/// Test documents opened by the notification steps.
pub const FIRST_DOCUMENT: &str = "hello.odt";
pub const SECOND_DOCUMENT: &str = "insert-delete.odp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminStep {
    IncorrectPassword,
    CorrectPassword,
    WsWithoutAuthToken,
    WsWithIncorrectAuthToken,
    AddDocNotify,
    UsersCount,
    DocsCount,
    RmDocNotify,
}

/// Every step in run order, including the ones that may be filtered out.
const FULL_SEQUENCE: [AdminStep; 10] = [
    AdminStep::IncorrectPassword,
    AdminStep::CorrectPassword,
    AdminStep::WsWithoutAuthToken,
    AdminStep::WsWithIncorrectAuthToken,
    AdminStep::AddDocNotify,
    AdminStep::UsersCount,
    AdminStep::DocsCount,
    AdminStep::RmDocNotify,
    AdminStep::UsersCount,
    AdminStep::DocsCount,
];

impl AdminStep {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IncorrectPassword => "incorrect_password",
            Self::CorrectPassword => "correct_password",
            Self::WsWithoutAuthToken => "ws_without_auth_token",
            Self::WsWithIncorrectAuthToken => "ws_with_incorrect_auth_token",
            Self::AddDocNotify => "add_doc_notify",
            Self::UsersCount => "users_count",
            Self::DocsCount => "docs_count",
            Self::RmDocNotify => "rm_doc_notify",
        }
    }

    /// Steps that need the session token, which the server only issues over TLS.
    pub const fn requires_secure_transport(self) -> bool {
        !matches!(self, Self::IncorrectPassword | Self::WsWithoutAuthToken)
    }
}

impl fmt::Display for AdminStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered step list for a server with or without secure transport.
pub fn admin_steps(secure_transport: bool, rmdoc_check: bool) -> Vec<AdminStep> {
    FULL_SEQUENCE
        .into_iter()
        .filter(|step| secure_transport || !step.requires_secure_transport())
        .filter(|step| rmdoc_check || *step != AdminStep::RmDocNotify)
        .collect()
}

#[derive(Debug, Error)]
pub enum StepError {
    #[error("no message within {timeout_ms}ms while awaiting `{awaiting}`")]
    TimedOut { awaiting: &'static str, timeout_ms: u64 },

    #[error("expected http status {expected}, got {actual}")]
    UnexpectedStatus { expected: StatusCode, actual: StatusCode },

    #[error("session cookie rejected: {0}")]
    Cookie(String),

    #[error("no session token; `correct_password` must pass first")]
    MissingAuthToken,

    #[error("no admin channel is open")]
    NoAdminChannel,

    #[error("no announced `{0}` view is open")]
    NoDocumentView(&'static str),

    #[error("`adddoc` names `{actual}`, expected `{expected}`")]
    DocumentMismatch { expected: String, actual: String },

    #[error("`rmdoc` names pid {actual}, expected {expected}")]
    PidMismatch { expected: u32, actual: u32 },

    #[error("server reports {kind} {actual}, expected {expected}")]
    CountMismatch { kind: &'static str, expected: i64, actual: i64 },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Fixture(#[from] FixtureError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl StepError {
    fn verdict(&self) -> Verdict {
        match self {
            Self::TimedOut { .. } => Verdict::TimedOut,
            _ => Verdict::Failed,
        }
    }
}

impl TestStep for AdminStep {
    type Context = AdminContext;

    fn name(&self) -> &str {
        self.as_str()
    }

    async fn run(&self, ctx: &mut AdminContext) -> Verdict {
        let outcome = match self {
            Self::IncorrectPassword => login::incorrect_password(ctx).await,
            Self::CorrectPassword => login::correct_password(ctx).await,
            Self::WsWithoutAuthToken => admin_ws::without_auth_token(ctx).await,
            Self::WsWithIncorrectAuthToken => admin_ws::with_incorrect_auth_token(ctx).await,
            Self::AddDocNotify => documents::add_doc_notify(ctx).await,
            Self::UsersCount => counts::check(ctx, CountKind::ActiveUsers).await,
            Self::DocsCount => counts::check(ctx, CountKind::ActiveDocs).await,
            Self::RmDocNotify => documents::rm_doc_notify(ctx).await,
        };

        match outcome {
            Ok(()) => Verdict::Passed,
            Err(error) => {
                let verdict = error.verdict();
                let error = anyhow::Error::new(error);
                warn!(step = self.as_str(), ?verdict, "{error:#}");
                verdict
            }
        }
    }
}
