use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;
use uuid::Uuid;

use tandem_types::api::{
    FriendRequestsResponse, FriendsResponse, OutgoingFriendRequestsResponse,
    RecommendedUsersResponse, SendFriendRequestResponse, StatusMessage,
};
use tandem_types::models::RequestStatus;

use crate::auth::AppState;
use crate::convert::{
    account_from_row, friend_request_from_row, incoming_from_row, outgoing_from_row,
    profile_from_row,
};
use crate::error::ApiError;
use crate::middleware::CurrentUser;

/// Run a closure of blocking DB work off the async runtime.
async fn run_blocking<T>(
    f: impl FnOnce() -> Result<T, ApiError> + Send + 'static,
) -> Result<T, ApiError>
where
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(e) => {
            error!("spawn_blocking join error: {}", e);
            Err(ApiError::Internal(anyhow::anyhow!("blocking task failed")))
        }
    }
}

/// Onboarded accounts that are neither the caller nor already friends.
/// No ranking beyond that filter.
pub async fn get_recommended_users(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let my_id = user.account.id.to_string();
    let rows = run_blocking(move || Ok(state.db.get_recommended_users(&my_id)?)).await?;

    Ok(Json(RecommendedUsersResponse {
        recommended_users: rows.into_iter().map(account_from_row).collect(),
    }))
}

pub async fn get_my_friends(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let my_id = user.account.id.to_string();
    let rows = run_blocking(move || Ok(state.db.get_friends(&my_id)?)).await?;

    Ok(Json(FriendsResponse {
        friends: rows.iter().map(profile_from_row).collect(),
    }))
}

pub async fn send_friend_request(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(recipient_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let my_id = user.account.id;

    if my_id == recipient_id {
        return Err(ApiError::Validation(
            "You cannot send a friend request to yourself".into(),
        ));
    }

    let row = run_blocking(move || {
        let me = my_id.to_string();
        let them = recipient_id.to_string();

        if state.db.get_user_by_id(&them)?.is_none() {
            return Err(ApiError::NotFound("Recipient not found".into()));
        }
        if state.db.are_friends(&them, &me)? {
            return Err(ApiError::Conflict(
                "You are already friends with this user".into(),
            ));
        }
        if state.db.find_request_between(&me, &them)?.is_some() {
            return Err(ApiError::Conflict("Friend request already exists".into()));
        }

        let request_id = Uuid::new_v4().to_string();
        if let Err(err) = state.db.create_friend_request(&request_id, &me, &them) {
            // Two concurrent submissions can both pass the existence check;
            // the unordered-pair index rejects the second one.
            if tandem_db::is_constraint_violation(&err) {
                return Err(ApiError::Conflict("Friend request already exists".into()));
            }
            return Err(err.into());
        }

        state
            .db
            .get_friend_request(&request_id)?
            .ok_or_else(|| {
                ApiError::Internal(anyhow::anyhow!("friend request missing right after insert"))
            })
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(SendFriendRequestResponse {
            message: "Friend request sent successfully".into(),
            friend_request: friend_request_from_row(row),
        }),
    ))
}

pub async fn accept_friend_request(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(request_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let my_id = user.account.id.to_string();

    run_blocking(move || {
        let id = request_id.to_string();
        let request = state
            .db
            .get_friend_request(&id)?
            .ok_or_else(|| ApiError::NotFound("Friend request not found".into()))?;

        // Only the recipient may accept.
        if request.recipient_id != my_id {
            return Err(ApiError::Forbidden(
                "You are not authorized to accept this friend request".into(),
            ));
        }

        if !state.db.accept_friend_request(&id)? {
            return Err(ApiError::NotFound("Friend request not found".into()));
        }
        Ok(())
    })
    .await?;

    Ok(Json(StatusMessage {
        success: true,
        message: "Friend request accepted successfully".into(),
    }))
}

/// Pending requests addressed to the caller, plus the accepted ones they
/// have approved — each with the sender's public profile.
pub async fn get_friend_requests(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let my_id = user.account.id.to_string();

    let (incoming, accepted) = run_blocking(move || {
        let incoming = state
            .db
            .incoming_requests(&my_id, RequestStatus::Pending.as_str())?;
        let accepted = state
            .db
            .incoming_requests(&my_id, RequestStatus::Accepted.as_str())?;
        Ok((incoming, accepted))
    })
    .await?;

    Ok(Json(FriendRequestsResponse {
        incoming_requests: incoming.into_iter().map(incoming_from_row).collect(),
        accepted_requests: accepted.into_iter().map(incoming_from_row).collect(),
    }))
}

pub async fn get_outgoing_friend_requests(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let my_id = user.account.id.to_string();
    let rows = run_blocking(move || {
        Ok(state
            .db
            .outgoing_requests(&my_id, RequestStatus::Pending.as_str())?)
    })
    .await?;

    Ok(Json(OutgoingFriendRequestsResponse {
        outgoing_requests: rows.into_iter().map(outgoing_from_row).collect(),
    }))
}
