//! Integration tests for the access log repository.

mod common;

use debris_core::access::{AccessIdentity, AccessRepository as _, NewAccess};
use debris_db::AccessRepository;
use sea_orm::{ConnectionTrait, DbBackend, Statement};

fn access(hash: &str, identity: Option<AccessIdentity>) -> NewAccess {
    NewAccess {
        hash: hash.to_string(),
        ip: "203.0.113.7".to_string(),
        user_agent: Some("integration-test".to_string()),
        identity,
    }
}

fn unique_hash() -> String {
    format!("{:016x}", rand::random::<u64>())
}

#[tokio::test]
async fn test_recent_access_window() {
    let Some(db) = common::connect().await else {
        return;
    };
    let repo = AccessRepository::new(db.clone());
    let hash = unique_hash();

    assert!(!repo.recent_access_exists(&hash, 300).await.expect("Failed to query"));

    repo.insert_access(&access(&hash, None))
        .await
        .expect("Failed to insert");
    assert!(repo.recent_access_exists(&hash, 300).await.expect("Failed to query"));

    db.execute(Statement::from_sql_and_values(
        DbBackend::Postgres,
        "UPDATE accesses SET timestamp = now() - interval '301 seconds' WHERE hash = $1",
        [hash.clone().into()],
    ))
    .await
    .expect("Failed to backdate");
    assert!(!repo.recent_access_exists(&hash, 300).await.expect("Failed to query"));
}

#[tokio::test]
async fn test_insert_with_identity() {
    let Some(db) = common::connect().await else {
        return;
    };
    let user_id = common::create_user(&db).await;
    let repo = AccessRepository::new(db);
    let hash = unique_hash();

    repo.insert_access(&access(
        &hash,
        Some(AccessIdentity {
            user_id,
            username: "wumpus".to_string(),
            discriminator: "0".to_string(),
        }),
    ))
    .await
    .expect("Failed to insert");

    assert!(repo.recent_access_exists(&hash, 300).await.expect("Failed to query"));
}
