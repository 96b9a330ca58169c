use crate::Database;
use crate::models::{FriendRequestRow, RequestWithProfileRow, UserRow};
use anyhow::Result;
use rusqlite::Connection;

const USER_COLUMNS: &str = "id, full_name, email, password, bio, profile_pic, \
     native_language, learning_language, location, is_onboarded, created_at, updated_at";

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        full_name: &str,
        email: &str,
        password_hash: &str,
        profile_pic: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, full_name, email, password, profile_pic)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, full_name, email, password_hash, profile_pic),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_email(conn, email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    /// Closed-field onboarding update: exactly the five profile fields plus
    /// the onboarding flag. Returns the updated row, or None for an unknown
    /// id.
    pub fn complete_onboarding(
        &self,
        id: &str,
        full_name: &str,
        bio: &str,
        native_language: &str,
        learning_language: &str,
        location: &str,
    ) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users
                    SET full_name = ?2, bio = ?3, native_language = ?4,
                        learning_language = ?5, location = ?6,
                        is_onboarded = 1, updated_at = datetime('now')
                  WHERE id = ?1",
                (id, full_name, bio, native_language, learning_language, location),
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_user_by_id(conn, id)
        })
    }

    // -- Friendships --

    pub fn get_friends(&self, user_id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users u
                  JOIN friendships f ON f.friend_id = u.id
                 WHERE f.user_id = ?1"
            ))?;
            let rows = stmt
                .query_map([user_id], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn are_friends(&self, user_id: &str, other_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM friendships WHERE user_id = ?1 AND friend_id = ?2",
                    [user_id, other_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Onboarded accounts that are neither the caller nor already friends
    /// with the caller. No ranking beyond that filter.
    pub fn get_recommended_users(&self, user_id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users
                  WHERE id <> ?1
                    AND is_onboarded = 1
                    AND id NOT IN (SELECT friend_id FROM friendships WHERE user_id = ?1)"
            ))?;
            let rows = stmt
                .query_map([user_id], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Friend requests --

    pub fn create_friend_request(&self, id: &str, sender_id: &str, recipient_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO friend_requests (id, sender_id, recipient_id)
                 VALUES (?1, ?2, ?3)",
                (id, sender_id, recipient_id),
            )?;
            Ok(())
        })
    }

    pub fn get_friend_request(&self, id: &str) -> Result<Option<FriendRequestRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, sender_id, recipient_id, status, created_at, updated_at
                   FROM friend_requests WHERE id = ?1",
                [id],
                request_from_row,
            )
            .optional()
        })
    }

    /// Any request between the unordered pair, in either direction and any
    /// status.
    pub fn find_request_between(&self, a: &str, b: &str) -> Result<Option<FriendRequestRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, sender_id, recipient_id, status, created_at, updated_at
                   FROM friend_requests
                  WHERE (sender_id = ?1 AND recipient_id = ?2)
                     OR (sender_id = ?2 AND recipient_id = ?1)",
                [a, b],
                request_from_row,
            )
            .optional()
        })
    }

    /// Flip a pending request to accepted and write both friendship
    /// directions, all inside one transaction — a reader never observes a
    /// half-made friendship. Returns false if the id is unknown.
    pub fn accept_friend_request(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let pair: Option<(String, String)> = tx
                .query_row(
                    "SELECT sender_id, recipient_id FROM friend_requests WHERE id = ?1",
                    [id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((sender_id, recipient_id)) = pair else {
                return Ok(false);
            };

            tx.execute(
                "UPDATE friend_requests
                    SET status = 'accepted', updated_at = datetime('now')
                  WHERE id = ?1",
                [id],
            )?;
            tx.execute(
                "INSERT OR IGNORE INTO friendships (user_id, friend_id) VALUES (?1, ?2)",
                [&sender_id, &recipient_id],
            )?;
            tx.execute(
                "INSERT OR IGNORE INTO friendships (user_id, friend_id) VALUES (?1, ?2)",
                [&recipient_id, &sender_id],
            )?;

            tx.commit()?;
            Ok(true)
        })
    }

    /// Requests addressed to `recipient_id`, joined with each sender's
    /// public profile in a single query (eliminates N+1).
    pub fn incoming_requests(&self, recipient_id: &str, status: &str) -> Result<Vec<RequestWithProfileRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.status, r.created_at,
                        u.id, u.full_name, u.profile_pic, u.native_language, u.learning_language
                   FROM friend_requests r
                   JOIN users u ON u.id = r.sender_id
                  WHERE r.recipient_id = ?1 AND r.status = ?2",
            )?;
            let rows = stmt
                .query_map([recipient_id, status], request_with_profile_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Requests sent by `sender_id`, joined with each recipient's public
    /// profile.
    pub fn outgoing_requests(&self, sender_id: &str, status: &str) -> Result<Vec<RequestWithProfileRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.status, r.created_at,
                        u.id, u.full_name, u.profile_pic, u.native_language, u.learning_language
                   FROM friend_requests r
                   JOIN users u ON u.id = r.recipient_id
                  WHERE r.sender_id = ?1 AND r.status = ?2",
            )?;
            let rows = stmt
                .query_map([sender_id, status], request_with_profile_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"))?;

    let row = stmt.query_row([email], user_from_row).optional()?;
    Ok(row)
}

fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))?;

    let row = stmt.query_row([id], user_from_row).optional()?;
    Ok(row)
}

fn user_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<UserRow, rusqlite::Error> {
    Ok(UserRow {
        id: row.get(0)?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        bio: row.get(4)?,
        profile_pic: row.get(5)?,
        native_language: row.get(6)?,
        learning_language: row.get(7)?,
        location: row.get(8)?,
        is_onboarded: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn request_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<FriendRequestRow, rusqlite::Error> {
    Ok(FriendRequestRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        recipient_id: row.get(2)?,
        status: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn request_with_profile_from_row(
    row: &rusqlite::Row<'_>,
) -> std::result::Result<RequestWithProfileRow, rusqlite::Error> {
    Ok(RequestWithProfileRow {
        id: row.get(0)?,
        status: row.get(1)?,
        created_at: row.get(2)?,
        profile_id: row.get(3)?,
        profile_full_name: row.get(4)?,
        profile_pic: row.get(5)?,
        profile_native_language: row.get(6)?,
        profile_learning_language: row.get(7)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, is_constraint_violation};
    use uuid::Uuid;

    fn new_user(db: &Database, name: &str, email: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.create_user(&id, name, email, "$argon2id$fake-hash", "https://example.com/a.png")
            .unwrap();
        id
    }

    fn onboard(db: &Database, id: &str) {
        db.complete_onboarding(id, "Name", "bio", "English", "Spanish", "Lisbon")
            .unwrap()
            .unwrap();
    }

    #[test]
    fn create_and_fetch_user() {
        let db = Database::open_in_memory().unwrap();
        let id = new_user(&db, "Ana", "ana@example.com");

        let by_email = db.get_user_by_email("ana@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, id);
        assert_eq!(by_email.full_name, "Ana");
        assert!(!by_email.is_onboarded);

        let by_id = db.get_user_by_id(&id).unwrap().unwrap();
        assert_eq!(by_id.email, "ana@example.com");

        assert!(db.get_user_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn duplicate_email_is_a_constraint_violation() {
        let db = Database::open_in_memory().unwrap();
        new_user(&db, "Ana", "ana@example.com");

        let err = db
            .create_user(
                &Uuid::new_v4().to_string(),
                "Impostor",
                "ana@example.com",
                "$argon2id$other-hash",
                "",
            )
            .unwrap_err();
        assert!(is_constraint_violation(&err));

        // No second record was created.
        let row = db.get_user_by_email("ana@example.com").unwrap().unwrap();
        assert_eq!(row.full_name, "Ana");
    }

    #[test]
    fn onboarding_sets_flag_and_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let id = new_user(&db, "Ana", "ana@example.com");

        let first = db
            .complete_onboarding(&id, "Ana Silva", "hello", "Portuguese", "German", "Porto")
            .unwrap()
            .unwrap();
        assert!(first.is_onboarded);
        assert_eq!(first.learning_language, "German");

        let second = db
            .complete_onboarding(&id, "Ana Silva", "hello", "Portuguese", "German", "Porto")
            .unwrap()
            .unwrap();
        assert!(second.is_onboarded);
        assert_eq!(second.full_name, first.full_name);
        assert_eq!(second.bio, first.bio);
        assert_eq!(second.location, first.location);
    }

    #[test]
    fn onboarding_unknown_id_returns_none() {
        let db = Database::open_in_memory().unwrap();
        let missing = db
            .complete_onboarding(&Uuid::new_v4().to_string(), "X", "b", "n", "l", "loc")
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn accept_makes_both_sides_friends() {
        let db = Database::open_in_memory().unwrap();
        let a = new_user(&db, "Ana", "ana@example.com");
        let b = new_user(&db, "Ben", "ben@example.com");

        let req_id = Uuid::new_v4().to_string();
        db.create_friend_request(&req_id, &a, &b).unwrap();

        let pending = db.get_friend_request(&req_id).unwrap().unwrap();
        assert_eq!(pending.status, "pending");
        assert!(!db.are_friends(&a, &b).unwrap());

        assert!(db.accept_friend_request(&req_id).unwrap());

        let accepted = db.get_friend_request(&req_id).unwrap().unwrap();
        assert_eq!(accepted.status, "accepted");
        assert!(db.are_friends(&a, &b).unwrap());
        assert!(db.are_friends(&b, &a).unwrap());

        let a_friends = db.get_friends(&a).unwrap();
        assert_eq!(a_friends.len(), 1);
        assert_eq!(a_friends[0].id, b);
        let b_friends = db.get_friends(&b).unwrap();
        assert_eq!(b_friends.len(), 1);
        assert_eq!(b_friends[0].id, a);

        // The accepted request stays as history, so a fresh request in
        // either direction keeps losing to the pair index.
        let err = db
            .create_friend_request(&Uuid::new_v4().to_string(), &a, &b)
            .unwrap_err();
        assert!(is_constraint_violation(&err));
        let err = db
            .create_friend_request(&Uuid::new_v4().to_string(), &b, &a)
            .unwrap_err();
        assert!(is_constraint_violation(&err));
    }

    #[test]
    fn accept_unknown_request_returns_false() {
        let db = Database::open_in_memory().unwrap();
        assert!(!db.accept_friend_request(&Uuid::new_v4().to_string()).unwrap());
    }

    #[test]
    fn one_request_per_unordered_pair() {
        let db = Database::open_in_memory().unwrap();
        let a = new_user(&db, "Ana", "ana@example.com");
        let b = new_user(&db, "Ben", "ben@example.com");

        db.create_friend_request(&Uuid::new_v4().to_string(), &a, &b).unwrap();

        // Same direction.
        let err = db
            .create_friend_request(&Uuid::new_v4().to_string(), &a, &b)
            .unwrap_err();
        assert!(is_constraint_violation(&err));

        // Opposite direction hits the same unordered-pair index.
        let err = db
            .create_friend_request(&Uuid::new_v4().to_string(), &b, &a)
            .unwrap_err();
        assert!(is_constraint_violation(&err));

        let between = db.find_request_between(&b, &a).unwrap().unwrap();
        assert_eq!(between.sender_id, a);
        assert_eq!(between.recipient_id, b);
    }

    #[test]
    fn self_request_violates_check() {
        let db = Database::open_in_memory().unwrap();
        let a = new_user(&db, "Ana", "ana@example.com");

        let err = db
            .create_friend_request(&Uuid::new_v4().to_string(), &a, &a)
            .unwrap_err();
        assert!(is_constraint_violation(&err));
        assert!(db.find_request_between(&a, &a).unwrap().is_none());
    }

    #[test]
    fn recommendations_exclude_self_friends_and_not_onboarded() {
        let db = Database::open_in_memory().unwrap();
        let me = new_user(&db, "Me", "me@example.com");
        let friend = new_user(&db, "Friend", "friend@example.com");
        let stranger = new_user(&db, "Stranger", "stranger@example.com");
        let lurker = new_user(&db, "Lurker", "lurker@example.com");
        onboard(&db, &me);
        onboard(&db, &friend);
        onboard(&db, &stranger);
        // lurker never onboards

        let req_id = Uuid::new_v4().to_string();
        db.create_friend_request(&req_id, &me, &friend).unwrap();
        db.accept_friend_request(&req_id).unwrap();

        let recommended = db.get_recommended_users(&me).unwrap();
        let ids: Vec<&str> = recommended.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec![stranger.as_str()]);
        assert!(!ids.contains(&lurker.as_str()));
    }

    #[test]
    fn incoming_and_outgoing_listings_carry_profiles() {
        let db = Database::open_in_memory().unwrap();
        let a = new_user(&db, "Ana", "ana@example.com");
        let b = new_user(&db, "Ben", "ben@example.com");
        db.complete_onboarding(&a, "Ana", "bio", "Portuguese", "English", "Porto")
            .unwrap()
            .unwrap();

        let req_id = Uuid::new_v4().to_string();
        db.create_friend_request(&req_id, &a, &b).unwrap();

        let incoming = db.incoming_requests(&b, "pending").unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].profile_id, a);
        assert_eq!(incoming[0].profile_native_language, "Portuguese");

        let outgoing = db.outgoing_requests(&a, "pending").unwrap();
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].profile_id, b);

        assert!(db.incoming_requests(&a, "pending").unwrap().is_empty());
        assert!(db.outgoing_requests(&b, "pending").unwrap().is_empty());

        db.accept_friend_request(&req_id).unwrap();
        assert!(db.incoming_requests(&b, "pending").unwrap().is_empty());
        assert_eq!(db.incoming_requests(&b, "accepted").unwrap().len(), 1);
    }
}
