use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id                  TEXT PRIMARY KEY,
                email               TEXT NOT NULL UNIQUE,
                name                TEXT NOT NULL,
                password            TEXT NOT NULL,
                role                TEXT NOT NULL DEFAULT 'member',
                status              TEXT NOT NULL DEFAULT 'active',
                profile_image_key   TEXT,
                created_at          TEXT NOT NULL
            );

            CREATE TABLE events (
                id              TEXT PRIMARY KEY,
                title           TEXT NOT NULL,
                description     TEXT NOT NULL DEFAULT '',
                location        TEXT,
                starts_at       TEXT NOT NULL,
                ends_at         TEXT,
                capacity        INTEGER,
                is_potluck      INTEGER NOT NULL DEFAULT 0,
                is_published    INTEGER NOT NULL DEFAULT 1,
                created_by      TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX idx_events_start ON events(starts_at);

            CREATE TABLE rsvps (
                event_id    TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                adults      INTEGER NOT NULL,
                kids        INTEGER NOT NULL DEFAULT 0,
                dish        TEXT,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                PRIMARY KEY (event_id, user_id)
            );

            CREATE TABLE prayers (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                kind            TEXT NOT NULL,
                content         TEXT NOT NULL,
                is_anonymous    INTEGER NOT NULL DEFAULT 0,
                is_answered     INTEGER NOT NULL DEFAULT 0,
                is_approved     INTEGER NOT NULL DEFAULT 1,
                reaction_count  INTEGER NOT NULL DEFAULT 0,
                comment_count   INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL,
                deleted_at      TEXT
            );

            CREATE INDEX idx_prayers_created ON prayers(created_at);

            CREATE TABLE reflections (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title           TEXT NOT NULL,
                content         TEXT NOT NULL,
                tags            TEXT NOT NULL DEFAULT '[]',
                reaction_count  INTEGER NOT NULL DEFAULT 0,
                comment_count   INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL,
                deleted_at      TEXT
            );

            CREATE INDEX idx_reflections_created ON reflections(created_at);

            -- target_id points at prayers or reflections depending on target_type
            CREATE TABLE reactions (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                target_type TEXT NOT NULL,
                target_id   TEXT NOT NULL,
                kind        TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                UNIQUE(user_id, target_type, target_id, kind)
            );

            CREATE INDEX idx_reactions_target ON reactions(target_type, target_id);

            CREATE TABLE comments (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                target_type TEXT NOT NULL,
                target_id   TEXT NOT NULL,
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE INDEX idx_comments_target ON comments(target_type, target_id, created_at);

            CREATE TABLE recipes (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title           TEXT NOT NULL,
                description     TEXT NOT NULL DEFAULT '',
                ingredients     TEXT NOT NULL DEFAULT '[]',
                instructions    TEXT NOT NULL,
                servings        INTEGER,
                prep_minutes    INTEGER,
                cook_minutes    INTEGER,
                image_url       TEXT,
                rating_average  REAL NOT NULL DEFAULT 0,
                rating_count    INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE TABLE recipe_ratings (
                recipe_id   TEXT NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                score       INTEGER NOT NULL CHECK (score BETWEEN 1 AND 5),
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                PRIMARY KEY (recipe_id, user_id)
            );

            CREATE TABLE kids_assets (
                id              TEXT PRIMARY KEY,
                kind            TEXT NOT NULL,
                title           TEXT NOT NULL,
                description     TEXT NOT NULL DEFAULT '',
                content         TEXT,
                reference       TEXT,
                file_key        TEXT,
                download_count  INTEGER NOT NULL DEFAULT 0,
                created_by      TEXT REFERENCES users(id) ON DELETE SET NULL,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE playlists (
                id          TEXT PRIMARY KEY,
                title       TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                url         TEXT NOT NULL,
                sort_index  INTEGER NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE notifications (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                kind        TEXT NOT NULL,
                title       TEXT NOT NULL,
                body        TEXT NOT NULL,
                link        TEXT,
                is_read     INTEGER NOT NULL DEFAULT 0,
                email_sent  INTEGER NOT NULL DEFAULT 0,
                push_sent   INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_notifications_user ON notifications(user_id, created_at);

            CREATE TABLE device_tokens (
                token       TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                platform    TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE notification_preferences (
                user_id             TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                email_events        INTEGER NOT NULL DEFAULT 1,
                push_events         INTEGER NOT NULL DEFAULT 1,
                email_prayers       INTEGER NOT NULL DEFAULT 1,
                push_prayers        INTEGER NOT NULL DEFAULT 1,
                email_activity      INTEGER NOT NULL DEFAULT 1,
                push_activity       INTEGER NOT NULL DEFAULT 1,
                email_announcements INTEGER NOT NULL DEFAULT 1,
                push_announcements  INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE feedback (
                id          TEXT PRIMARY KEY,
                user_id     TEXT REFERENCES users(id) ON DELETE SET NULL,
                category    TEXT NOT NULL,
                message     TEXT NOT NULL,
                is_read     INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE site_settings (
                id                  INTEGER PRIMARY KEY CHECK (id = 1),
                prayer_moderation   INTEGER NOT NULL DEFAULT 0
            );

            INSERT INTO site_settings (id, prayer_moderation) VALUES (1, 0);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
