//! Admin-key and API-key queries

use crate::db::models::{StoredKey, UserApiKey};
use crate::Result;
use sqlx::SqlitePool;

/// Outcome of an admin-key delete attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminKeyDeletion {
    Deleted,
    NotFound,
    /// Refused: deleting would leave zero admin keys system-wide
    LastKey,
}

// ========================================
// Admin keys
// ========================================

pub async fn insert_admin_key(
    pool: &SqlitePool,
    name: Option<&str>,
    fast_digest: &str,
    slow_hash: &str,
    now_ms: i64,
) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO admin_keys (name, fast_digest, slow_hash, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(name)
    .bind(fast_digest)
    .bind(slow_hash)
    .bind(now_ms)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn find_admin_key_by_fast_digest(
    pool: &SqlitePool,
    digest: &str,
) -> Result<Option<StoredKey>> {
    let row = sqlx::query_as::<_, StoredKey>(
        "SELECT id, name, fast_digest, slow_hash, created_at, last_used_at
         FROM admin_keys WHERE fast_digest = ?",
    )
    .bind(digest)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn count_admin_keys(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM admin_keys")
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// Delete an admin key, refusing to drop the system to zero admin keys.
///
/// Existence check, count, and delete run in one transaction so concurrent
/// deletes cannot race past the last-key check.
pub async fn delete_admin_key(pool: &SqlitePool, id: i64) -> Result<AdminKeyDeletion> {
    let mut tx = pool.begin().await?;

    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM admin_keys WHERE id = ?)")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

    if !exists {
        return Ok(AdminKeyDeletion::NotFound);
    }

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM admin_keys")
        .fetch_one(&mut *tx)
        .await?;

    if count <= 1 {
        return Ok(AdminKeyDeletion::LastKey);
    }

    sqlx::query("DELETE FROM admin_keys WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(AdminKeyDeletion::Deleted)
}

/// Best-effort `last_used_at` update; callers ignore the result
pub async fn touch_admin_key(pool: &SqlitePool, id: i64, now_ms: i64) -> Result<()> {
    sqlx::query("UPDATE admin_keys SET last_used_at = ? WHERE id = ?")
        .bind(now_ms)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

// ========================================
// Per-user API keys
// ========================================

pub async fn insert_api_key(
    pool: &SqlitePool,
    user_id: i64,
    name: Option<&str>,
    fast_digest: &str,
    slow_hash: &str,
    now_ms: i64,
) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO api_keys (user_id, name, fast_digest, slow_hash, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(name)
    .bind(fast_digest)
    .bind(slow_hash)
    .bind(now_ms)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn find_user_api_key_by_fast_digest(
    pool: &SqlitePool,
    digest: &str,
) -> Result<Option<UserApiKey>> {
    let row = sqlx::query_as::<_, UserApiKey>(
        "SELECT k.id, k.user_id, u.username, k.slow_hash
         FROM api_keys k
         JOIN users u ON u.id = k.user_id
         WHERE k.fast_digest = ?",
    )
    .bind(digest)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Delete a key owned by `user_id`; returns false when no such row
pub async fn delete_api_key(pool: &SqlitePool, user_id: i64, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM api_keys WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Best-effort `last_used_at` update; callers ignore the result
pub async fn touch_api_key(pool: &SqlitePool, id: i64, now_ms: i64) -> Result<()> {
    sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE id = ?")
        .bind(now_ms)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}
