//! Referral code queries

use crate::db::models::Referral;
use crate::Result;
use sqlx::SqlitePool;

/// Outcome of attempting to consume a referral code at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferralOutcome {
    /// Code accepted; carries the referral row id
    Consumed(i64),
    NotFound,
    /// All uses spent
    Exhausted,
    Expired,
}

pub async fn insert_referral(
    pool: &SqlitePool,
    code: &str,
    max_uses: i64,
    expires_at: Option<i64>,
    now_ms: i64,
) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO referrals (code, max_uses, expires_at, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(code)
    .bind(max_uses)
    .bind(expires_at)
    .bind(now_ms)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn find_by_code(pool: &SqlitePool, code: &str) -> Result<Option<Referral>> {
    let row = sqlx::query_as::<_, Referral>(
        "SELECT id, code, uses, max_uses, expires_at, created_at
         FROM referrals WHERE code = ?",
    )
    .bind(code)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn code_exists(pool: &SqlitePool, code: &str) -> Result<bool> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM referrals WHERE code = ?)")
            .bind(code)
            .fetch_one(pool)
            .await?;

    Ok(exists)
}

/// Check and spend one use of a referral code in a single transaction, so
/// concurrent registrations cannot overshoot `max_uses`.
pub async fn consume_referral(
    pool: &SqlitePool,
    code: &str,
    now_ms: i64,
) -> Result<ReferralOutcome> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, Referral>(
        "SELECT id, code, uses, max_uses, expires_at, created_at
         FROM referrals WHERE code = ?",
    )
    .bind(code)
    .fetch_optional(&mut *tx)
    .await?;

    let referral = match row {
        Some(r) => r,
        None => return Ok(ReferralOutcome::NotFound),
    };

    if referral.uses >= referral.max_uses {
        return Ok(ReferralOutcome::Exhausted);
    }

    if let Some(expires_at) = referral.expires_at {
        if now_ms > expires_at {
            return Ok(ReferralOutcome::Expired);
        }
    }

    sqlx::query("UPDATE referrals SET uses = uses + 1 WHERE id = ?")
        .bind(referral.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(ReferralOutcome::Consumed(referral.id))
}

pub async fn delete_referral(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM referrals WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
