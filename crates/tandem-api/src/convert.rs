//! Row-to-wire mapping and the SQLite timestamp/id parsing shared by the
//! handler modules.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use tandem_db::models::{FriendRequestRow, RequestWithProfileRow, UserRow};
use tandem_types::models::{
    Account, FriendRequest, IncomingFriendRequest, OutgoingFriendRequest, PublicProfile,
    RequestStatus,
};

pub(crate) fn parse_id(raw: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt id '{}': {}", raw, e);
        Uuid::default()
    })
}

pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
            // Parse as naive UTC and convert.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

fn parse_status(raw: &str) -> RequestStatus {
    RequestStatus::parse(raw).unwrap_or_else(|| {
        warn!("Corrupt request status '{}'", raw);
        RequestStatus::Pending
    })
}

pub(crate) fn account_from_row(row: UserRow) -> Account {
    Account {
        id: parse_id(&row.id),
        full_name: row.full_name,
        email: row.email,
        bio: row.bio,
        profile_pic: row.profile_pic,
        native_language: row.native_language,
        learning_language: row.learning_language,
        location: row.location,
        is_onboarded: row.is_onboarded,
        created_at: parse_timestamp(&row.created_at),
        updated_at: parse_timestamp(&row.updated_at),
    }
}

pub(crate) fn profile_from_row(row: &UserRow) -> PublicProfile {
    PublicProfile {
        id: parse_id(&row.id),
        full_name: row.full_name.clone(),
        profile_pic: row.profile_pic.clone(),
        native_language: row.native_language.clone(),
        learning_language: row.learning_language.clone(),
    }
}

pub(crate) fn friend_request_from_row(row: FriendRequestRow) -> FriendRequest {
    FriendRequest {
        id: parse_id(&row.id),
        sender_id: parse_id(&row.sender_id),
        recipient_id: parse_id(&row.recipient_id),
        status: parse_status(&row.status),
        created_at: parse_timestamp(&row.created_at),
        updated_at: parse_timestamp(&row.updated_at),
    }
}

fn profile_from_request_row(row: &RequestWithProfileRow) -> PublicProfile {
    PublicProfile {
        id: parse_id(&row.profile_id),
        full_name: row.profile_full_name.clone(),
        profile_pic: row.profile_pic.clone(),
        native_language: row.profile_native_language.clone(),
        learning_language: row.profile_learning_language.clone(),
    }
}

pub(crate) fn incoming_from_row(row: RequestWithProfileRow) -> IncomingFriendRequest {
    IncomingFriendRequest {
        id: parse_id(&row.id),
        status: parse_status(&row.status),
        created_at: parse_timestamp(&row.created_at),
        sender: profile_from_request_row(&row),
    }
}

pub(crate) fn outgoing_from_row(row: RequestWithProfileRow) -> OutgoingFriendRequest {
    OutgoingFriendRequest {
        id: parse_id(&row.id),
        status: parse_status(&row.status),
        created_at: parse_timestamp(&row.created_at),
        recipient: profile_from_request_row(&row),
    }
}
