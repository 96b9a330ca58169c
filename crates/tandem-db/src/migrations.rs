use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id                  TEXT PRIMARY KEY,
            full_name           TEXT NOT NULL,
            email               TEXT NOT NULL UNIQUE,
            password            TEXT NOT NULL,
            bio                 TEXT NOT NULL DEFAULT '',
            profile_pic         TEXT NOT NULL DEFAULT '',
            native_language     TEXT NOT NULL DEFAULT '',
            learning_language   TEXT NOT NULL DEFAULT '',
            location            TEXT NOT NULL DEFAULT '',
            is_onboarded        INTEGER NOT NULL DEFAULT 0,
            created_at          TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at          TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS friend_requests (
            id              TEXT PRIMARY KEY,
            sender_id       TEXT NOT NULL REFERENCES users(id),
            recipient_id    TEXT NOT NULL REFERENCES users(id),
            status          TEXT NOT NULL DEFAULT 'pending'
                            CHECK (status IN ('pending', 'accepted')),
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at      TEXT NOT NULL DEFAULT (datetime('now')),
            CHECK (sender_id <> recipient_id)
        );

        -- At most one request per unordered pair, regardless of direction.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_friend_requests_pair
            ON friend_requests (min(sender_id, recipient_id), max(sender_id, recipient_id));

        CREATE INDEX IF NOT EXISTS idx_friend_requests_recipient
            ON friend_requests (recipient_id, status);

        CREATE INDEX IF NOT EXISTS idx_friend_requests_sender
            ON friend_requests (sender_id, status);

        -- Symmetric friendship relation: both directions are written inside
        -- the acceptance transaction.
        CREATE TABLE IF NOT EXISTS friendships (
            user_id     TEXT NOT NULL REFERENCES users(id),
            friend_id   TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (user_id, friend_id)
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
