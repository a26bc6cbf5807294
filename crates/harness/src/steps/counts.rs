use adminprobe_common::protocol::{AdminCommand, Count, CountKind};
use tracing::debug;

use super::{AdminContext, StepError};

/// The server's counter must match what the harness holds open.
pub(super) async fn check(ctx: &mut AdminContext, kind: CountKind) -> Result<(), StepError> {
    let (command, expected) = match kind {
        CountKind::ActiveUsers => (AdminCommand::ActiveUsersCount, ctx.registry.active_users()),
        CountKind::ActiveDocs => (AdminCommand::ActiveDocsCount, ctx.registry.active_docs()),
    };
    let expected = expected as i64;

    let reply = ctx.admin_exchange(&command, kind.literal()).await?;
    let count = Count::decode(&reply, kind)?;
    debug!(kind = kind.literal(), expected, actual = count.value, "count reported");

    if count.value != expected {
        return Err(StepError::CountMismatch { kind: kind.literal(), expected, actual: count.value });
    }
    Ok(())
}
