use axum::{Extension, Json, extract::State, response::IntoResponse};

use tandem_types::api::ChatTokenResponse;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::CurrentUser;

/// Mint a scoped access token for the chat/video provider. No local state
/// is touched; a signing failure surfaces as a server error.
pub async fn get_chat_token(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let token = state.chat.mint_token(&user.account.id.to_string())?;
    Ok(Json(ChatTokenResponse { token }))
}
