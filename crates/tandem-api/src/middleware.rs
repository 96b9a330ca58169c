use axum::{extract::{Request, State}, middleware::Next, response::Response};
use axum_extra::extract::cookie::CookieJar;

use tandem_types::models::Account;

use crate::auth::{AppState, SESSION_COOKIE, verify_session_token};
use crate::convert::account_from_row;
use crate::error::{ApiError, UNAUTHORIZED};

/// The authenticated account, attached to the request by `require_auth`.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub account: Account,
}

/// Extract the session cookie, verify the token, resolve the account and
/// attach it to the request. Missing cookie, invalid/expired token and
/// unknown account id short-circuit with the same rejection; nothing is
/// ever attached on failure.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(ApiError::Unauthorized(UNAUTHORIZED))?;

    let account_id = verify_session_token(&state.jwt_secret, &token)
        .ok_or(ApiError::Unauthorized(UNAUTHORIZED))?;

    let row = state
        .db
        .get_user_by_id(&account_id.to_string())?
        .ok_or(ApiError::Unauthorized(UNAUTHORIZED))?;

    req.extensions_mut().insert(CurrentUser {
        account: account_from_row(row),
    });
    Ok(next.run(req).await)
}
