use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Ordered schema steps. Index + 1 is the version a step brings the schema to.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "initial schema",
        "
        CREATE TABLE users (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            username        TEXT NOT NULL UNIQUE,
            email           TEXT NOT NULL UNIQUE,
            password_hash   TEXT NOT NULL,
            bio             TEXT,
            profile_picture TEXT,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE recipes (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL REFERENCES users(id),
            title       TEXT NOT NULL,
            description TEXT NOT NULL,
            ingredients TEXT NOT NULL,
            steps       TEXT NOT NULL,
            image       TEXT,
            categories  TEXT,
            is_draft    INTEGER NOT NULL DEFAULT 0,
            views       INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_recipes_user ON recipes(user_id);
        CREATE INDEX idx_recipes_published ON recipes(is_draft, created_at);

        CREATE TABLE likes (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL REFERENCES users(id),
            recipe_id   INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(user_id, recipe_id)
        );

        CREATE INDEX idx_likes_recipe ON likes(recipe_id);

        CREATE TABLE comments (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL REFERENCES users(id),
            recipe_id   INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_comments_recipe ON comments(recipe_id, created_at);

        CREATE TABLE saved_recipes (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL REFERENCES users(id),
            recipe_id   INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
            saved_at    TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(user_id, recipe_id)
        );

        CREATE INDEX idx_saved_recipe ON saved_recipes(recipe_id);
        ",
    ),
    (
        "recipe difficulty",
        "
        ALTER TABLE recipes ADD COLUMN difficulty TEXT
            CHECK (difficulty IS NULL OR difficulty IN ('Easy', 'Medium', 'Hard'));
        ",
    ),
    (
        "login sessions",
        "
        CREATE TABLE sessions (
            id          TEXT PRIMARY KEY,
            user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            expires_at  TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_sessions_user ON sessions(user_id);
        ",
    ),
];

pub fn latest_version() -> i64 {
    MIGRATIONS.len() as i64
}

pub fn current_version(conn: &Connection) -> Result<i64> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;
    Ok(version)
}

/// Brings the schema up to `latest_version()`. Each step commits together with
/// its version row, so a crash never leaves a half-applied step recorded.
pub fn run(conn: &mut Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let mut version = current_version(conn)?;
    for (idx, (name, sql)) in MIGRATIONS.iter().enumerate() {
        let target = idx as i64 + 1;
        if version >= target {
            continue;
        }

        info!("Running migration v{} ({})", target, name);
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [target])?;
        tx.commit()?;
        version = target;
    }

    info!("Database schema at v{}", version);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        run(&mut conn).unwrap();
        run(&mut conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), latest_version());

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, latest_version());
    }

    #[test]
    fn upgrades_a_v1_database() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE schema_version (version INTEGER NOT NULL);")
            .unwrap();
        conn.execute_batch(MIGRATIONS[0].1).unwrap();
        conn.execute("INSERT INTO schema_version (version) VALUES (1)", [])
            .unwrap();

        run(&mut conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), latest_version());
        conn.execute_batch("SELECT difficulty FROM recipes; SELECT id FROM sessions;")
            .unwrap();
    }

    #[test]
    fn difficulty_column_rejects_unknown_values() {
        let mut conn = Connection::open_in_memory().unwrap();
        run(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO users (username, email, password_hash) VALUES ('a', 'a@x.com', 'h')",
            [],
        )
        .unwrap();
        let result = conn.execute(
            "INSERT INTO recipes (user_id, title, description, ingredients, steps, difficulty)
             VALUES (1, 't', 'd', 'i', 's', 'Impossible')",
            [],
        );
        assert!(result.is_err());
    }
}
