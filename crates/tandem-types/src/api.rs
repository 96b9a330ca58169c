use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Account, FriendRequest, IncomingFriendRequest, OutgoingFriendRequest, PublicProfile};

// -- JWT Claims --

/// Session-token claims shared between issuance (auth handlers) and
/// verification (middleware). Canonical definition lives here in
/// tandem-types to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SignupRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Onboarding takes exactly these five fields. Optional so that validation
/// can name every missing one instead of failing on the first.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OnboardingRequest {
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub native_language: Option<String>,
    pub learning_language: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub success: bool,
    pub user: Account,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusMessage {
    pub success: bool,
    pub message: String,
}

// -- Directory --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedUsersResponse {
    pub recommended_users: Vec<Account>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendsResponse {
    pub friends: Vec<PublicProfile>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendFriendRequestResponse {
    pub message: String,
    pub friend_request: FriendRequest,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestsResponse {
    pub incoming_requests: Vec<IncomingFriendRequest>,
    pub accepted_requests: Vec<IncomingFriendRequest>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingFriendRequestsResponse {
    pub outgoing_requests: Vec<OutgoingFriendRequest>,
}

// -- Chat provider --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTokenResponse {
    pub token: String,
}
