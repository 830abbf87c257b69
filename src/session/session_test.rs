use super::*;
use crate::store::MemoryStore;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::json;

fn token_expiring_at(exp: i64) -> Token {
    let body = URL_SAFE_NO_PAD.encode(json!({ "exp": exp, "name": "Alice" }).to_string());
    Token::new(format!("eyJhbGciOiJIUzI1NiJ9.{body}.sig"))
}

fn guard_with(store: &Arc<MemoryStore>) -> SessionGuard {
    SessionGuard::new(store.clone())
}

fn seeded(token: &Token) -> (Arc<MemoryStore>, SessionGuard) {
    let store = Arc::new(MemoryStore::with_entry(TOKEN_KEY, token.as_str()));
    let guard = guard_with(&store);
    (store, guard)
}

// =============================================================================
// store / get_token / clear
// =============================================================================

#[tokio::test]
async fn store_then_get_returns_same_token() {
    let store = Arc::new(MemoryStore::new());
    let guard = guard_with(&store);
    let token = token_expiring_at(now_unix() + 60);
    guard.store(&token).await.unwrap();
    assert_eq!(guard.get_token().await.unwrap(), Some(token));
}

#[tokio::test]
async fn store_replaces_prior_token() {
    let old = token_expiring_at(now_unix() + 60);
    let new = token_expiring_at(now_unix() + 120);
    let (_store, guard) = seeded(&old);
    guard.store(&new).await.unwrap();
    assert_eq!(guard.get_token().await.unwrap(), Some(new));
}

#[tokio::test]
async fn get_token_does_not_clear_expired() {
    let token = token_expiring_at(now_unix() - 100);
    let (_store, guard) = seeded(&token);
    assert_eq!(guard.get_token().await.unwrap(), Some(token.clone()));
    assert_eq!(guard.get_token().await.unwrap(), Some(token));
}

#[tokio::test]
async fn clear_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    let guard = guard_with(&store);
    guard.clear().await.unwrap();
    guard.clear().await.unwrap();
    assert_eq!(guard.get_token().await.unwrap(), None);
}

// =============================================================================
// ensure_valid_or_clear
// =============================================================================

#[tokio::test]
async fn expired_token_is_cleared() {
    let token = token_expiring_at(now_unix() - 1);
    let (store, guard) = seeded(&token);

    assert!(!guard.ensure_valid_or_clear().await.unwrap());
    assert_eq!(guard.get_token().await.unwrap(), None);
    assert_eq!(store.get(TOKEN_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn live_token_is_kept() {
    let token = token_expiring_at(now_unix() + 3600);
    let (_store, guard) = seeded(&token);

    assert!(guard.ensure_valid_or_clear().await.unwrap());
    assert_eq!(guard.get_token().await.unwrap(), Some(token));
}

#[tokio::test]
async fn empty_storage_is_invalid_without_error() {
    let store = Arc::new(MemoryStore::new());
    let guard = guard_with(&store);
    assert!(!guard.ensure_valid_or_clear().await.unwrap());
    assert_eq!(guard.get_token().await.unwrap(), None);
}

#[tokio::test]
async fn malformed_token_is_cleared() {
    let (_store, guard) = seeded(&Token::new("definitely-not-a-token"));
    assert!(!guard.ensure_valid_or_clear().await.unwrap());
    assert_eq!(guard.get_token().await.unwrap(), None);
}

#[tokio::test]
async fn token_without_exp_is_cleared() {
    let body = URL_SAFE_NO_PAD.encode(json!({ "name": "Alice" }).to_string());
    let (_store, guard) = seeded(&Token::new(format!("h.{body}.s")));
    assert!(!guard.ensure_valid_or_clear().await.unwrap());
    assert_eq!(guard.get_token().await.unwrap(), None);
}

// =============================================================================
// check_at
// =============================================================================

#[tokio::test]
async fn check_at_classifies_each_outcome() {
    let now = 1_700_000_000;

    let store = Arc::new(MemoryStore::new());
    assert_eq!(guard_with(&store).check_at(now).await.unwrap(), SessionStatus::Missing);

    let (_s, guard) = seeded(&token_expiring_at(now - 1));
    assert_eq!(guard.check_at(now).await.unwrap(), SessionStatus::Expired);

    let (_s, guard) = seeded(&Token::new("a.b.c"));
    assert_eq!(guard.check_at(now).await.unwrap(), SessionStatus::Malformed);

    let (_s, guard) = seeded(&token_expiring_at(now));
    let status = guard.check_at(now).await.unwrap();
    let SessionStatus::Valid(claims) = &status else {
        panic!("expected valid session, got {status:?}");
    };
    assert_eq!(claims.exp, now);
    assert_eq!(claims.name.as_deref(), Some("Alice"));
}

#[test]
fn login_prompt_only_for_invalid_sessions() {
    let claims = TokenClaims { exp: 0, sub: None, name: None, email: None };
    assert_eq!(SessionStatus::Valid(claims).login_prompt(), None);
    assert_eq!(SessionStatus::Missing.login_prompt(), Some("Please sign in."));
    assert!(SessionStatus::Expired.login_prompt().unwrap().contains("expired"));
    assert!(SessionStatus::Malformed.login_prompt().unwrap().contains("Invalid session"));
}

// =============================================================================
// bearer / claims
// =============================================================================

#[tokio::test]
async fn bearer_yields_live_token() {
    let token = token_expiring_at(now_unix() + 3600);
    let (_store, guard) = seeded(&token);
    assert_eq!(guard.bearer().await.unwrap(), Some(token));
}

#[tokio::test]
async fn bearer_withholds_and_clears_expired_token() {
    let token = token_expiring_at(now_unix() - 3600);
    let (store, guard) = seeded(&token);
    assert_eq!(guard.bearer().await.unwrap(), None);
    assert_eq!(store.get(TOKEN_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn claims_for_live_session() {
    let token = token_expiring_at(now_unix() + 3600);
    let (_store, guard) = seeded(&token);
    let claims = guard.claims().await.unwrap().unwrap();
    assert_eq!(claims.name.as_deref(), Some("Alice"));
}

#[test]
fn is_valid_matches_expiry() {
    assert!(SessionGuard::is_valid(&token_expiring_at(now_unix() + 10)));
    assert!(!SessionGuard::is_valid(&token_expiring_at(now_unix() - 10)));
    assert!(!SessionGuard::is_valid(&Token::new("garbage")));
}
