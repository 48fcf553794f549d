use crate::models::{SessionRow, UserRow};
use crate::{Database, format_timestamp};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};

const USER_COLUMNS: &str = "id, username, email, password_hash, bio, profile_picture, created_at";

impl Database {
    // -- Users --

    /// Inserts a user and returns its id. The UNIQUE constraints on username
    /// and email are the final word on duplicates; callers can recognise the
    /// failure with `is_constraint_violation`.
    pub fn create_user(&self, username: &str, email: &str, password_hash: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, email, password_hash) VALUES (?1, ?2, ?3)",
                (username, email, password_hash),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username = ?1", username))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", email))
    }

    /// Whether another account (not `except`) already uses this username.
    pub fn username_taken(&self, username: &str, except: Option<i64>) -> Result<bool> {
        self.with_conn(|conn| taken(conn, "username", username, except))
    }

    pub fn email_taken(&self, email: &str, except: Option<i64>) -> Result<bool> {
        self.with_conn(|conn| taken(conn, "email", email, except))
    }

    pub fn update_profile(
        &self,
        id: i64,
        username: &str,
        email: &str,
        bio: Option<&str>,
        profile_picture: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET username = ?2, email = ?3, bio = ?4, profile_picture = ?5 WHERE id = ?1",
                rusqlite::params![id, username, email, bio, profile_picture],
            )?;
            Ok(())
        })
    }

    pub fn update_password(&self, id: i64, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET password_hash = ?2 WHERE id = ?1",
                rusqlite::params![id, password_hash],
            )?;
            Ok(())
        })
    }

    // -- Sessions --

    pub fn create_session(&self, id: &str, user_id: i64, expires_at: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, expires_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![id, user_id, format_timestamp(expires_at)],
            )?;
            Ok(())
        })
    }

    /// Live session by id. Expired rows are treated as absent.
    pub fn get_session(&self, id: &str) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT s.user_id, u.username
                     FROM sessions s
                     JOIN users u ON u.id = s.user_id
                     WHERE s.id = ?1 AND s.expires_at > datetime('now')",
                    [id],
                    |row| {
                        Ok(SessionRow {
                            user_id: row.get(0)?,
                            username: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn delete_session(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM sessions WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    /// Drops every session of a user, e.g. after a password change.
    pub fn delete_user_sessions(&self, user_id: i64, keep: Option<&str>) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM sessions WHERE user_id = ?1 AND id IS NOT ?2",
                rusqlite::params![user_id, keep],
            )?;
            Ok(n)
        })
    }

    pub fn prune_expired_sessions(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM sessions WHERE expires_at <= datetime('now')", [])?;
            Ok(n)
        })
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        bio: row.get(4)?,
        profile_picture: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn query_user<P: rusqlite::ToSql>(conn: &Connection, filter: &str, value: P) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, filter);
    let row = conn.query_row(&sql, [value], user_from_row).optional()?;
    Ok(row)
}

fn taken(conn: &Connection, column: &str, value: &str, except: Option<i64>) -> Result<bool> {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM users WHERE {} = ?1 AND id IS NOT ?2)",
        column
    );
    let exists = conn.query_row(&sql, rusqlite::params![value, except], |r| r.get(0))?;
    Ok(exists)
}
