/// Database row types — these map directly to SQLite rows.
/// Distinct from tandem-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub bio: String,
    pub profile_pic: String,
    pub native_language: String,
    pub learning_language: String,
    pub location: String,
    pub is_onboarded: bool,
    pub created_at: String,
    pub updated_at: String,
}

pub struct FriendRequestRow {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A friend request joined with the counterpart account's public profile
/// (the sender for incoming listings, the recipient for outgoing ones).
pub struct RequestWithProfileRow {
    pub id: String,
    pub status: String,
    pub created_at: String,
    pub profile_id: String,
    pub profile_full_name: String,
    pub profile_pic: String,
    pub profile_native_language: String,
    pub profile_learning_language: String,
}
