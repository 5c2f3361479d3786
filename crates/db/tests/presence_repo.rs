//! Integration tests for `PresenceRepo`.

use agora_db::models::user::CreateUser;
use agora_db::repositories::{PresenceRepo, UserRepo};
use chrono::{Duration, Utc};

#[tokio::test]
async fn upsert_creates_then_overwrites() {
    let pool = agora_db::create_pool("sqlite::memory:").await.unwrap();
    agora_db::run_migrations(&pool).await.unwrap();
    let user = UserRepo::create(
        &pool,
        &CreateUser {
            nickname: "carol".into(),
            email: "carol@forum.test".into(),
            password_hash: "x".into(),
        },
    )
    .await
    .unwrap();

    assert!(PresenceRepo::find(&pool, user.id).await.unwrap().is_none());

    let first_seen = Utc::now() - Duration::minutes(1);
    PresenceRepo::upsert(&pool, user.id, true, first_seen).await.unwrap();
    let record = PresenceRepo::find(&pool, user.id).await.unwrap().unwrap();
    assert!(record.is_online);
    assert_eq!(PresenceRepo::list_online(&pool).await.unwrap().len(), 1);

    let later = Utc::now();
    PresenceRepo::upsert(&pool, user.id, false, later).await.unwrap();
    let record = PresenceRepo::find(&pool, user.id).await.unwrap().unwrap();
    assert!(!record.is_online);
    assert!(record.last_seen > first_seen);
    assert!(PresenceRepo::list_online(&pool).await.unwrap().is_empty());
}
