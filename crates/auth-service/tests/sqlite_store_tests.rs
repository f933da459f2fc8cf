//! Tests for the SQLite store and the service wired through `init`

use auth_service::config::PasswordConfig;
use auth_service::jwt::JwtConfig;
use auth_service::{
    init, AuthConfig, AuthRequest, Error, ExternalAssertion, SigningKey, SqliteStore, Token,
    TokenLedger, User, UserStore,
};
use chrono::Utc;
use tempfile::TempDir;

/// Helper to create a test database
async fn create_test_db() -> (SqliteStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    let store = SqliteStore::new(&db_url).await.expect("Failed to create test database");

    (store, temp_dir)
}

fn test_config(temp_dir: &TempDir) -> AuthConfig {
    let db_path = temp_dir.path().join("auth.db");
    AuthConfig {
        database_url: format!("sqlite://{}?mode=rwc", db_path.display()),
        jwt: JwtConfig {
            signing_key: Some(SigningKey::generate().to_base64()),
            ..Default::default()
        },
        password: PasswordConfig {
            argon2_memory_cost: 4096, // Lower for faster tests
            argon2_time_cost: 1,
            argon2_parallelism: 1,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn new_user(email: &str) -> User {
    User {
        id: User::new_id(),
        email: email.to_string(),
        first_name: "Ana".to_string(),
        last_name: "Li".to_string(),
        password_hash: "hashed_password".to_string(),
        roles: vec![],
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_save_and_find_user_with_roles() {
    let (store, _temp_dir) = create_test_db().await;
    let role = store.ensure_role("ROLE_USER").await.unwrap();

    let mut user = new_user("ana@x.com");
    user.roles.push(role.clone());
    let saved = UserStore::save(&store, user.clone()).await.unwrap();
    assert_eq!(saved.id, user.id);

    let by_email = store.find_by_email("ana@x.com").await.unwrap().unwrap();
    assert_eq!(by_email.id, user.id);
    assert_eq!(by_email.roles, vec![role]);
    assert_eq!(by_email.password_hash, "hashed_password");

    let by_id = store.find_by_id(&user.id).await.unwrap().unwrap();
    assert_eq!(by_id.email, "ana@x.com");

    assert!(store.find_by_email("nobody@x.com").await.unwrap().is_none());
}

#[tokio::test]
async fn test_ensure_role_is_idempotent() {
    let (store, _temp_dir) = create_test_db().await;
    let first = store.ensure_role("ROLE_USER").await.unwrap();
    let second = store.ensure_role("ROLE_USER").await.unwrap();
    assert_eq!(first, second);

    assert_eq!(store.find_role_by_name("ROLE_USER").await.unwrap(), Some(first));
    assert!(store.find_role_by_name("ROLE_ADMIN").await.unwrap().is_none());
}

#[tokio::test]
async fn test_duplicate_email_error() {
    let (store, _temp_dir) = create_test_db().await;
    UserStore::save(&store, new_user("ana@x.com")).await.unwrap();

    let result = UserStore::save(&store, new_user("ana@x.com")).await;
    match result.unwrap_err() {
        Error::DuplicateIdentity(email) => assert_eq!(email, "ana@x.com"),
        other => panic!("Expected DuplicateIdentity, got {:?}", other),
    }

    // Case-sensitive as stored
    UserStore::save(&store, new_user("ANA@x.com")).await.unwrap();
}

#[tokio::test]
async fn test_remove_user() {
    let (store, _temp_dir) = create_test_db().await;
    let user = UserStore::save(&store, new_user("ana@x.com")).await.unwrap();
    TokenLedger::save(&store, Token::active(&user.id, "a.b.c".to_string())).await.unwrap();

    store.remove(&user.id).await.unwrap();
    assert!(store.find_by_id(&user.id).await.unwrap().is_none());
    assert!(store.find_by_token("a.b.c").await.unwrap().is_none());
}

#[tokio::test]
async fn test_ledger_save_all_updates_flags() {
    let (store, _temp_dir) = create_test_db().await;
    let user = UserStore::save(&store, new_user("ana@x.com")).await.unwrap();

    let first = TokenLedger::save(&store, Token::active(&user.id, "t1".to_string())).await.unwrap();
    let mut rows = store.find_all_by_user(&user.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, first.id);
    assert!(rows[0].is_active());

    rows[0].revoke();
    rows.push(Token::active(&user.id, "t2".to_string()));
    store.save_all(rows).await.unwrap();

    let stored = store.find_by_token("t1").await.unwrap().unwrap();
    assert!(stored.expired && stored.revoked);
    assert_eq!(stored.token, "t1");
    assert!(store.find_by_token("t2").await.unwrap().unwrap().is_active());
}

#[tokio::test]
async fn test_failed_batch_is_rolled_back() {
    let (store, _temp_dir) = create_test_db().await;
    let user = UserStore::save(&store, new_user("ana@x.com")).await.unwrap();
    let existing = TokenLedger::save(&store, Token::active(&user.id, "t1".to_string())).await.unwrap();

    let mut revoked = existing.clone();
    revoked.revoke();
    // Second row violates the foreign key, so nothing in the batch may land.
    let orphan = Token::active("no-such-user", "t2".to_string());
    assert!(store.save_all(vec![revoked, orphan]).await.is_err());

    assert!(store.find_by_token("t1").await.unwrap().unwrap().is_active());
    assert!(store.find_by_token("t2").await.unwrap().is_none());
}

#[tokio::test]
async fn test_init_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let auth_service = init(test_config(&temp_dir)).await.unwrap();

    let registered = auth_service
        .register(AuthRequest {
            firstname: "Ana".to_string(),
            lastname: "Li".to_string(),
            email: "ana@x.com".to_string(),
            password: "secret".to_string(),
        })
        .await
        .unwrap();
    let claims = auth_service.token_service().extract_all_claims(&registered.token).unwrap();
    assert_eq!(claims.sub, "ana@x.com");
    assert_eq!(claims.roles, vec!["ROLE_USER"]);

    let login = auth_service
        .authenticate(AuthRequest::login("ana@x.com", "secret"))
        .await
        .unwrap();
    assert!(auth_service.authorize(&registered.token).await.unwrap().is_none());
    let user = auth_service.authorize(&login.token).await.unwrap().unwrap();
    assert_eq!(auth_service.active_sessions(&user.id).await.unwrap().len(), 1);

    let outcome = auth_service
        .onboard_external(&ExternalAssertion::new("google").with_attribute("email", "bob@y.com"))
        .await
        .unwrap();
    assert!(outcome.created);
    assert!(auth_service.authorize(&outcome.token).await.unwrap().is_some());
}

#[tokio::test]
async fn test_tokens_survive_restart_with_configured_key() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir);

    let token = {
        let auth_service = init(config.clone()).await.unwrap();
        auth_service
            .register(AuthRequest {
                firstname: "Ana".to_string(),
                lastname: "Li".to_string(),
                email: "ana@x.com".to_string(),
                password: "secret".to_string(),
            })
            .await
            .unwrap()
            .token
    };

    let restarted = init(config).await.unwrap();
    assert!(restarted.authorize(&token).await.unwrap().is_some());
}
