//! End-to-end flow across components: credential check at login, token
//! issuance, authorization with audit on denial, and session revocation on
//! password change.

use chrono::Duration;
use credential_core::config::TokenConfig;
use credential_core::error::CoreError;
use credential_core::models::{Credential, Permission};
use credential_core::services::{
    Decision, InMemoryRefreshTokenStore, InMemoryRoleDirectory, PermissionGate,
    RecordingAuditSink, RequestMeta, TokenService,
};
use credential_core::utils::{CredentialVault, Password};
use secrecy::SecretString;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

struct Harness {
    tokens: TokenService,
    gate: PermissionGate,
    roles: Arc<InMemoryRoleDirectory>,
    audit: Arc<RecordingAuditSink>,
}

fn setup() -> Harness {
    let roles = Arc::new(InMemoryRoleDirectory::new());
    let audit = Arc::new(RecordingAuditSink::new());
    let config = TokenConfig {
        access_secret: SecretString::new("access-signing-secret-for-integration!!".to_string()),
        refresh_secret: SecretString::new("refresh-hashing-secret-for-integration!".to_string()),
        access_ttl: Duration::minutes(15),
        refresh_ttl: Duration::days(7),
    };
    Harness {
        tokens: TokenService::new(
            &config,
            Arc::new(InMemoryRefreshTokenStore::new()),
            roles.clone(),
        ),
        gate: PermissionGate::new(roles.clone(), audit.clone()),
        roles,
        audit,
    }
}

#[tokio::test]
async fn test_login_issue_authorize_flow() {
    let harness = setup();
    let user_id = Uuid::new_v4();

    // Registration stores only the one-way hash
    let hash = CredentialVault::hash(&Password::new("S3nsible-passphrase".to_string())).unwrap();
    let credential = Credential::new(user_id, hash.into_string());
    assert!(credential.password_hash.starts_with("$argon2"));

    let staff_role = Uuid::new_v4();
    harness.roles.grant(
        staff_role,
        [Permission::ViewDashboard, Permission::ManageTickets]
            .into_iter()
            .collect(),
    );
    harness.roles.assign(user_id, staff_role);

    // Login boundary: verify the presented password against the stored hash
    let presented = Password::new("S3nsible-passphrase".to_string());
    let stored = credential_core::utils::PasswordHashString::new(credential.password_hash.clone());
    assert!(CredentialVault::verify(&presented, &stored).unwrap());

    let pair = harness.tokens.issue(user_id).await.unwrap();
    let claims = harness.tokens.verify_access_token(&pair.access_token).unwrap();

    // The gate works off the identity resolved for this request
    let identity = harness
        .gate
        .resolve(Uuid::from_str(&claims.sub).unwrap())
        .await
        .unwrap();

    let allowed = harness.gate.authorize(
        &identity,
        &[Permission::ManageTickets],
        &RequestMeta::new("GET", "/admin/tickets"),
    );
    assert_eq!(allowed, Decision::Allow);

    let denied = harness.gate.authorize(
        &identity,
        &[Permission::ManageUsers, Permission::ManageSettings],
        &RequestMeta::new("POST", "/admin/users"),
    );
    assert_eq!(denied, Decision::Deny);

    let events = harness.audit.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].actor_id, Some(user_id));
    assert_eq!(
        events[0].metadata["required"],
        serde_json::json!(["manage_users", "manage_settings"])
    );
    assert_eq!(
        events[0].metadata["actual"],
        serde_json::json!(["manage_tickets", "view_dashboard"])
    );
}

#[tokio::test]
async fn test_wrong_password_never_reaches_issuance() {
    let hash = CredentialVault::hash(&Password::new("the-real-password".to_string())).unwrap();

    let ok = CredentialVault::verify(&Password::new("a-guess".to_string()), &hash).unwrap();
    assert!(!ok);
}

#[tokio::test]
async fn test_role_change_takes_effect_on_next_resolve() {
    let harness = setup();
    let user_id = Uuid::new_v4();

    let before = harness.gate.resolve(user_id).await.unwrap();
    assert!(before.permissions.is_empty());

    let admin_role = Uuid::new_v4();
    harness
        .roles
        .grant(admin_role, [Permission::ManageUsers].into_iter().collect());
    harness.roles.assign(user_id, admin_role);

    // No caching between requests: the next resolve sees the new grant
    let after = harness.gate.resolve(user_id).await.unwrap();
    assert!(after.permissions.contains(Permission::ManageUsers));
}

#[tokio::test]
async fn test_password_change_revokes_every_session() {
    let harness = setup();
    let user_id = Uuid::new_v4();

    let desktop = harness.tokens.issue(user_id).await.unwrap();
    let mobile = harness.tokens.issue(user_id).await.unwrap();

    // Password change boundary: rotate the hash, then drop all sessions
    let mut credential = Credential::new(
        user_id,
        CredentialVault::hash(&Password::new("old-password".to_string()))
            .unwrap()
            .into_string(),
    );
    credential.rotate(
        CredentialVault::hash(&Password::new("new-password".to_string()))
            .unwrap()
            .into_string(),
    );
    assert_eq!(harness.tokens.revoke_all_for_user(user_id).await.unwrap(), 2);

    for pair in [desktop, mobile] {
        assert!(matches!(
            harness.tokens.refresh(&pair.refresh_token).await,
            Err(CoreError::TokenRevoked)
        ));
    }
}
