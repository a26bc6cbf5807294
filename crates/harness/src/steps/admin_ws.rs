use adminprobe_common::protocol::response::{expect_literal, INVALID_AUTH_TOKEN, NOT_AUTHENTICATED};
use adminprobe_common::protocol::AdminCommand;

use super::{AdminContext, StepError};

/// Token the server cannot have issued.
const BOGUS_TOKEN: &str = "incorrectJWT";

/// Commands on a channel that never authenticated are refused.
pub(super) async fn without_auth_token(ctx: &mut AdminContext) -> Result<(), StepError> {
    ctx.open_admin_channel().await?;
    let reply = ctx.admin_exchange(&AdminCommand::Documents, NOT_AUTHENTICATED).await?;
    expect_literal(&reply, NOT_AUTHENTICATED)?;
    Ok(())
}

/// A forged token is rejected.
pub(super) async fn with_incorrect_auth_token(ctx: &mut AdminContext) -> Result<(), StepError> {
    ctx.open_admin_channel().await?;
    let command = AdminCommand::Auth { token: BOGUS_TOKEN.into() };
    let reply = ctx.admin_exchange(&command, INVALID_AUTH_TOKEN).await?;
    expect_literal(&reply, INVALID_AUTH_TOKEN)?;
    Ok(())
}
