use reqwest::StatusCode;
use tracing::info;

use crate::auth::{parse_set_cookie, AuthToken, SESSION_COOKIE};

use super::{AdminContext, StepError};

/// The console must refuse a request without credentials.
pub(super) async fn incorrect_password(ctx: &mut AdminContext) -> Result<(), StepError> {
    let response = ctx.login.login(None).await?;
    if response.status != StatusCode::UNAUTHORIZED {
        return Err(StepError::UnexpectedStatus {
            expected: StatusCode::UNAUTHORIZED,
            actual: response.status,
        });
    }
    Ok(())
}

/// A valid login yields exactly one secure `jwt` cookie scoped to the console.
pub(super) async fn correct_password(ctx: &mut AdminContext) -> Result<(), StepError> {
    let response = ctx.login.login(Some(&ctx.credentials)).await?;

    let [raw] = response.set_cookies.as_slice() else {
        return Err(StepError::Cookie(format!(
            "expected exactly one Set-Cookie, got {}",
            response.set_cookies.len()
        )));
    };
    let cookie = parse_set_cookie(raw)
        .ok_or_else(|| StepError::Cookie("malformed Set-Cookie header".into()))?;

    if cookie.name != SESSION_COOKIE {
        return Err(StepError::Cookie(format!("expected `{SESSION_COOKIE}`, got `{}`", cookie.name)));
    }
    if cookie.value.is_empty() {
        return Err(StepError::Cookie("empty value".into()));
    }
    if !cookie.secure {
        return Err(StepError::Cookie("missing Secure attribute".into()));
    }
    let scope = ctx.endpoints.admin_cookie_path();
    match cookie.path.as_deref() {
        Some(path) if path.starts_with(scope) => {}
        other => {
            return Err(StepError::Cookie(format!(
                "path {other:?} is not under `{scope}`"
            )))
        }
    }

    let token = AuthToken::new(cookie.value);
    info!(token = %token, "session token acquired");
    ctx.auth_token = Some(token);
    Ok(())
}
