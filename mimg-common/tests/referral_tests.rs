//! Integration tests for referral bookkeeping

use mimg_common::db::referrals::{self, ReferralOutcome};
use mimg_common::db::create_schema;
use mimg_common::time::now_ms;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

async fn setup_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .unwrap();

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await
        .unwrap();
    create_schema(&pool).await.unwrap();

    pool
}

#[tokio::test]
async fn test_consume_until_exhausted() {
    let pool = setup_pool().await;
    let id = referrals::insert_referral(&pool, "abc123", 2, None, now_ms())
        .await
        .unwrap();

    assert_eq!(
        referrals::consume_referral(&pool, "abc123", now_ms())
            .await
            .unwrap(),
        ReferralOutcome::Consumed(id)
    );
    assert_eq!(
        referrals::consume_referral(&pool, "abc123", now_ms())
            .await
            .unwrap(),
        ReferralOutcome::Consumed(id)
    );
    assert_eq!(
        referrals::consume_referral(&pool, "abc123", now_ms())
            .await
            .unwrap(),
        ReferralOutcome::Exhausted
    );

    let row = referrals::find_by_code(&pool, "abc123").await.unwrap().unwrap();
    assert_eq!(row.uses, 2);
}

#[tokio::test]
async fn test_consume_unknown_code() {
    let pool = setup_pool().await;

    assert_eq!(
        referrals::consume_referral(&pool, "nope", now_ms())
            .await
            .unwrap(),
        ReferralOutcome::NotFound
    );
}

#[tokio::test]
async fn test_consume_expired_code() {
    let pool = setup_pool().await;
    let now = now_ms();
    referrals::insert_referral(&pool, "stale", 100, Some(now - 1), now - 1000)
        .await
        .unwrap();

    assert_eq!(
        referrals::consume_referral(&pool, "stale", now).await.unwrap(),
        ReferralOutcome::Expired
    );

    // Expired codes spend no uses
    let row = referrals::find_by_code(&pool, "stale").await.unwrap().unwrap();
    assert_eq!(row.uses, 0);
}

#[tokio::test]
async fn test_delete_referral() {
    let pool = setup_pool().await;
    let id = referrals::insert_referral(&pool, "gone", 10, None, now_ms())
        .await
        .unwrap();

    assert!(referrals::delete_referral(&pool, id).await.unwrap());
    assert!(!referrals::delete_referral(&pool, id).await.unwrap());
    assert!(referrals::find_by_code(&pool, "gone").await.unwrap().is_none());
}
