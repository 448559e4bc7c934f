use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use mazurka_core::auth::claims;
use mazurka_core::models::{refresh_token, session as session_model};
use mazurka_core::testing::{
    test_authenticator, test_config, test_db, StaticCredentialVerifier, StaticTwoFactorVerifier,
    StaticUser,
};
use mazurka_core::{
    Authenticator, CredentialVerifier, IssuedTokens, MazurkaError, SessionValidity, SignInOutcome,
    TokenSubject, TwoFactorVerifier,
};

async fn active_sessions(db: &DatabaseConnection, user_id: &str) -> Vec<session_model::Model> {
    session_model::Entity::find()
        .filter(session_model::Column::UserId.eq(user_id))
        .filter(session_model::Column::IsActive.eq(true))
        .all(db)
        .await
        .unwrap()
}

async fn ledger_rows(db: &DatabaseConnection, user_id: &str) -> Vec<refresh_token::Model> {
    refresh_token::Entity::find()
        .filter(refresh_token::Column::UserId.eq(user_id))
        .all(db)
        .await
        .unwrap()
}

fn authenticated(outcome: SignInOutcome) -> IssuedTokens {
    match outcome {
        SignInOutcome::Authenticated(tokens) => tokens,
        SignInOutcome::TwoFactorRequired { .. } => panic!("expected direct authentication"),
    }
}

async fn sign_in<C: CredentialVerifier, T: TwoFactorVerifier>(
    auth: &Authenticator<C, T>,
    identity: &str,
    device: &str,
) -> IssuedTokens {
    authenticated(
        auth.sign_in(
            identity,
            "correct-horse",
            Some(device),
            Some("10.0.0.1"),
            Some("test-agent"),
        )
        .await
        .unwrap(),
    )
}

#[tokio::test]
async fn test_sign_in_issues_tokens_backed_by_one_session() {
    let auth = test_authenticator().await;
    let tokens = sign_in(&auth, "E1042", "device-1").await;

    let config = test_config();
    let claims = claims::validate_access_token(&tokens.access_token, &config.tokens, false).unwrap();
    assert_eq!(claims.sub, "E1042");
    assert_eq!(claims.name, "Grace Hopper");

    assert_eq!(active_sessions(auth.db(), "E1042").await.len(), 1);
    assert_eq!(ledger_rows(auth.db(), "E1042").await.len(), 1);
    assert!(tokens.expires_at > Utc::now().naive_utc());
}

#[tokio::test]
async fn test_sign_in_rejects_bad_secret_without_side_effects() {
    let auth = test_authenticator().await;
    let err = auth
        .sign_in("E1042", "wrong-horse", Some("device-1"), None, None)
        .await
        .unwrap_err();

    assert!(matches!(err, MazurkaError::InvalidCredentials(_)));
    assert!(active_sessions(auth.db(), "E1042").await.is_empty());
    assert!(ledger_rows(auth.db(), "E1042").await.is_empty());
}

#[tokio::test]
async fn test_sign_in_rejects_unknown_identity() {
    let auth = test_authenticator().await;
    let err = auth
        .sign_in("E0000", "correct-horse", None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, MazurkaError::InvalidCredentials(_)));
}

#[tokio::test]
async fn test_locked_out_account_fails_terminally() {
    let db = test_db().await;
    let credentials = StaticCredentialVerifier::new().with_user(
        "E3001",
        StaticUser::new("Margaret Hamilton", "correct-horse").locked(),
    );
    let auth = Authenticator::new(
        db,
        test_config(),
        credentials,
        StaticTwoFactorVerifier::accepting("123456"),
    );

    let err = auth
        .sign_in("E3001", "correct-horse", None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, MazurkaError::AccountLocked(_)));
    assert!(active_sessions(auth.db(), "E3001").await.is_empty());
}

#[tokio::test]
async fn test_two_factor_pending_creates_no_session_and_no_tokens() {
    let auth = test_authenticator().await;
    let outcome = auth
        .sign_in("E2077", "correct-horse", Some("device-1"), None, None)
        .await
        .unwrap();

    let SignInOutcome::TwoFactorRequired { temporary_token } = outcome else {
        panic!("expected a 2FA challenge");
    };
    assert!(!temporary_token.is_empty());

    // Nothing durable exists until the second factor is confirmed.
    assert!(active_sessions(auth.db(), "E2077").await.is_empty());
    assert!(ledger_rows(auth.db(), "E2077").await.is_empty());
}

#[tokio::test]
async fn test_two_factor_verification_establishes_the_session() {
    let auth = test_authenticator().await;
    let SignInOutcome::TwoFactorRequired { temporary_token } = auth
        .sign_in("E2077", "correct-horse", Some("device-1"), None, None)
        .await
        .unwrap()
    else {
        panic!("expected a 2FA challenge");
    };

    let tokens = auth
        .verify_two_factor(&temporary_token, "123456", Some("device-1"), None, None)
        .await
        .unwrap();

    let config = test_config();
    let claims = claims::validate_access_token(&tokens.access_token, &config.tokens, false).unwrap();
    assert_eq!(claims.sub, "E2077");
    assert_eq!(active_sessions(auth.db(), "E2077").await.len(), 1);
    assert_eq!(ledger_rows(auth.db(), "E2077").await.len(), 1);
}

#[tokio::test]
async fn test_wrong_two_factor_code_keeps_the_user_out() {
    let auth = test_authenticator().await;
    let SignInOutcome::TwoFactorRequired { temporary_token } = auth
        .sign_in("E2077", "correct-horse", Some("device-1"), None, None)
        .await
        .unwrap()
    else {
        panic!("expected a 2FA challenge");
    };

    let err = auth
        .verify_two_factor(&temporary_token, "999999", Some("device-1"), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, MazurkaError::InvalidCredentials(_)));
    assert!(active_sessions(auth.db(), "E2077").await.is_empty());
}

#[tokio::test]
async fn test_access_token_is_not_accepted_as_a_two_factor_bridge() {
    let auth = test_authenticator().await;
    let tokens = sign_in(&auth, "E1042", "device-1").await;

    let err = auth
        .verify_two_factor(&tokens.access_token, "123456", None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, MazurkaError::Unauthorized(_)));
}

#[tokio::test]
async fn test_expired_two_factor_window_is_rejected() {
    let auth = test_authenticator().await;
    let config = test_config();
    let stale = claims::generate_temporary_token(
        &TokenSubject {
            user_id: "E2077".to_string(),
            display_name: "Ada Lovelace".to_string(),
        },
        Duration::minutes(-1),
        &config.tokens,
    )
    .unwrap();

    let err = auth
        .verify_two_factor(&stale, "123456", None, None, None)
        .await
        .unwrap_err();
    assert!(err.is_expired());
}

#[tokio::test]
async fn test_refresh_rotates_to_a_brand_new_pair() {
    let auth = test_authenticator().await;
    let first = sign_in(&auth, "E1042", "device-1").await;

    let second = auth
        .refresh(&first.access_token, &first.refresh_token)
        .await
        .unwrap();

    assert_ne!(second.access_token, first.access_token);
    assert_ne!(second.refresh_token, first.refresh_token);

    let rows = ledger_rows(auth.db(), "E1042").await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows.iter().filter(|t| t.is_used).count(), 1);
}

#[tokio::test]
async fn test_refresh_works_with_an_expired_access_token() {
    let auth = test_authenticator().await;
    let tokens = sign_in(&auth, "E1042", "device-1").await;

    let mut stale_config = test_config();
    stale_config.tokens.access_token_expiry_mins = -5;
    let expired_access = claims::generate_access_token(
        &TokenSubject {
            user_id: "E1042".to_string(),
            display_name: "Grace Hopper".to_string(),
        },
        &stale_config.tokens,
    )
    .unwrap();

    let rotated = auth
        .refresh(&expired_access, &tokens.refresh_token)
        .await
        .unwrap();
    assert!(rotated.expires_at > Utc::now().naive_utc());
}

#[tokio::test]
async fn test_replaying_a_consumed_refresh_token_revokes_everything() {
    let auth = test_authenticator().await;
    let first = sign_in(&auth, "E1042", "device-1").await;
    let second = auth
        .refresh(&first.access_token, &first.refresh_token)
        .await
        .unwrap();

    // The old refresh token comes back: containment, not a retry.
    let err = auth
        .refresh(&first.access_token, &first.refresh_token)
        .await
        .unwrap_err();
    assert!(matches!(err, MazurkaError::TokenReuse { ref user_id } if user_id == "E1042"));

    for row in ledger_rows(auth.db(), "E1042").await {
        assert!(row.is_revoked);
    }

    // The freshly rotated pair died with the rest.
    let err = auth
        .refresh(&second.access_token, &second.refresh_token)
        .await
        .unwrap_err();
    assert!(matches!(err, MazurkaError::Unauthorized(_)));
}

#[tokio::test]
async fn test_refresh_rejects_a_token_belonging_to_someone_else() {
    let auth = test_authenticator().await;
    let grace = sign_in(&auth, "E1042", "device-1").await;

    let SignInOutcome::TwoFactorRequired { temporary_token } = auth
        .sign_in("E2077", "correct-horse", Some("device-9"), None, None)
        .await
        .unwrap()
    else {
        panic!("expected a 2FA challenge");
    };
    let ada = auth
        .verify_two_factor(&temporary_token, "123456", Some("device-9"), None, None)
        .await
        .unwrap();

    let err = auth
        .refresh(&grace.access_token, &ada.refresh_token)
        .await
        .unwrap_err();
    assert!(matches!(err, MazurkaError::Unauthorized(_)));
}

#[tokio::test]
async fn test_refresh_rejects_an_unknown_refresh_token() {
    let auth = test_authenticator().await;
    let tokens = sign_in(&auth, "E1042", "device-1").await;

    // Correctly signed but never persisted to the ledger.
    let config = test_config();
    let phantom = claims::generate_refresh_token(
        &TokenSubject {
            user_id: "E1042".to_string(),
            display_name: "Grace Hopper".to_string(),
        },
        &config.tokens,
    )
    .unwrap();

    let err = auth
        .refresh(&tokens.access_token, &phantom)
        .await
        .unwrap_err();
    assert!(matches!(err, MazurkaError::Unauthorized(_)));
}

#[tokio::test]
async fn test_refresh_rejects_and_revokes_an_expired_refresh_token() {
    let auth = test_authenticator().await;
    let tokens = sign_in(&auth, "E1042", "device-1").await;

    let row = ledger_rows(auth.db(), "E1042").await.remove(0);
    let mut active: refresh_token::ActiveModel = row.into();
    active.expires_at = Set(Utc::now().naive_utc() - Duration::minutes(5));
    active.update(auth.db()).await.unwrap();

    let err = auth
        .refresh(&tokens.access_token, &tokens.refresh_token)
        .await
        .unwrap_err();
    assert!(err.is_expired());

    let row = ledger_rows(auth.db(), "E1042").await.remove(0);
    assert!(row.is_revoked);
}

#[tokio::test]
async fn test_sign_out_ends_the_session_and_revokes_tokens() {
    let auth = test_authenticator().await;
    let tokens = sign_in(&auth, "E1042", "device-1").await;
    let session_id = active_sessions(auth.db(), "E1042").await.remove(0).id;

    auth.sign_out("E1042", &session_id, false).await.unwrap();

    assert!(active_sessions(auth.db(), "E1042").await.is_empty());
    let err = auth
        .refresh(&tokens.access_token, &tokens.refresh_token)
        .await
        .unwrap_err();
    assert!(matches!(err, MazurkaError::Unauthorized(_)));

    // Signing out twice is still a success.
    auth.sign_out("E1042", &session_id, false).await.unwrap();
}

#[tokio::test]
async fn test_sign_out_everywhere_ends_every_device() {
    let auth = test_authenticator().await;
    sign_in(&auth, "E1042", "device-1").await;
    sign_in(&auth, "E1042", "device-2").await;
    assert_eq!(active_sessions(auth.db(), "E1042").await.len(), 2);

    auth.sign_out("E1042", "irrelevant", true).await.unwrap();
    assert!(active_sessions(auth.db(), "E1042").await.is_empty());
}

#[tokio::test]
async fn test_validate_session_round_trip() {
    let auth = test_authenticator().await;
    sign_in(&auth, "E1042", "device-1").await;
    let session_id = active_sessions(auth.db(), "E1042").await.remove(0).id;

    assert_eq!(
        auth.validate_session(&session_id, "E1042").await.unwrap(),
        SessionValidity::Valid
    );
    assert_eq!(
        auth.validate_session(&session_id, "E2077").await.unwrap(),
        SessionValidity::OwnershipMismatch
    );

    auth.sign_out("E1042", &session_id, false).await.unwrap();
    assert_eq!(
        auth.validate_session(&session_id, "E1042").await.unwrap(),
        SessionValidity::Inactive
    );
}

#[tokio::test]
async fn test_cleanup_entry_points_are_wired_through() {
    let auth = test_authenticator().await;
    sign_in(&auth, "E1042", "device-1").await;

    assert_eq!(auth.cleanup_expired_sessions().await.unwrap(), 0);
    assert_eq!(auth.cleanup_expired_tokens("E1042").await.unwrap(), 0);

    let session = active_sessions(auth.db(), "E1042").await.remove(0);
    let mut active: session_model::ActiveModel = session.into();
    active.expires_at = Set(Utc::now().naive_utc() - Duration::minutes(1));
    active.update(auth.db()).await.unwrap();

    assert_eq!(auth.cleanup_expired_sessions().await.unwrap(), 1);
}
