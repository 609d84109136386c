// SPDX-License-Identifier: MIT

//! User lookups and creation.

use rusqlite::OptionalExtension;

use crate::db::DbPool;
use crate::error::Result;
use crate::models::User;

#[derive(Clone)]
pub struct UserRepo {
    pool: DbPool,
}

impl UserRepo {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Find a user by username, creating it on first sight.
    pub async fn get_or_create(&self, username: &str) -> Result<User> {
        let pool = self.pool.clone();
        let username = username.to_lowercase();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            conn.execute(
                "INSERT OR IGNORE INTO users (username) VALUES (?)",
                [&username],
            )?;
            let user = conn.query_row(
                "SELECT id, username FROM users WHERE username = ?",
                [&username],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        username: row.get(1)?,
                    })
                },
            )?;
            Ok(user)
        })
        .await?
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let pool = self.pool.clone();
        let username = username.to_lowercase();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let user = conn
                .query_row(
                    "SELECT id, username FROM users WHERE username = ?",
                    [&username],
                    |row| {
                        Ok(User {
                            id: row.get(0)?,
                            username: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            Ok(user)
        })
        .await?
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let user = conn
                .query_row(
                    "SELECT id, username FROM users WHERE id = ?",
                    [id],
                    |row| {
                        Ok(User {
                            id: row.get(0)?,
                            username: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            Ok(user)
        })
        .await?
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let mut stmt = conn.prepare("SELECT id, username FROM users ORDER BY username")?;
            let users = stmt
                .query_map([], |row| {
                    Ok(User {
                        id: row.get(0)?,
                        username: row.get(1)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(users)
        })
        .await?
    }
}
