use super::*;
use shared::domain::InviteStatus;
use storage::Storage;

async fn test_ctx() -> ApiContext {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    ApiContext {
        storage,
        auth: crate::AuthConfig {
            token_secret: "test-secret".into(),
            token_ttl_seconds: 3600,
        },
    }
}

async fn seed_user(ctx: &ApiContext, name: &str, email: &str) -> UserId {
    ctx.storage
        .create_user(name, email, "5551234567", None, "hash")
        .await
        .expect("user")
}

#[test]
fn generated_codes_match_the_fixed_shape() {
    for _ in 0..200 {
        let code = generate_invite_code();
        assert_eq!(code.len(), INVITE_CODE_PREFIX.len() + 4);
        assert!(code.starts_with(INVITE_CODE_PREFIX));
        assert!(code[INVITE_CODE_PREFIX.len()..]
            .chars()
            .all(|c| INVITE_CODE_CHARSET.contains(&c)));
    }
}

#[tokio::test]
async fn creating_an_invite_revokes_the_previous_one() {
    let ctx = test_ctx().await;
    let alice = seed_user(&ctx, "Alice", "alice@example.com").await;

    let first = create_invite(&ctx, alice).await.expect("first invite");
    let second = create_invite(&ctx, alice).await.expect("second invite");
    assert_ne!(first.invite_id, second.invite_id);

    let revoked = ctx
        .storage
        .invite_by_code(&first.code)
        .await
        .expect("lookup")
        .expect("invite exists");
    assert_eq!(revoked.status, InviteStatus::Revoked);

    let active = ctx
        .storage
        .invite_by_code(&second.code)
        .await
        .expect("lookup")
        .expect("invite exists");
    assert_eq!(active.status, InviteStatus::Active);
}

#[tokio::test]
async fn accepting_an_invite_pairs_both_users() {
    let ctx = test_ctx().await;
    let alice = seed_user(&ctx, "Alice", "alice@example.com").await;
    let bob = seed_user(&ctx, "Bob", "bob@example.com").await;

    let invite = create_invite(&ctx, alice).await.expect("invite");
    let status = accept_invite(&ctx, bob, &invite.code).await.expect("accept");
    assert!(status.paired);
    assert_eq!(
        status.partner.as_ref().map(|p| p.display_name.as_str()),
        Some("Alice")
    );

    let from_alice = pair_status(&ctx, alice).await.expect("status");
    assert!(from_alice.paired);
    assert_eq!(
        from_alice.partner.map(|p| p.user_id),
        Some(bob)
    );
}

#[tokio::test]
async fn invite_codes_are_case_insensitive_on_input() {
    let ctx = test_ctx().await;
    let alice = seed_user(&ctx, "Alice", "alice@example.com").await;
    let bob = seed_user(&ctx, "Bob", "bob@example.com").await;

    let invite = create_invite(&ctx, alice).await.expect("invite");
    let status = accept_invite(&ctx, bob, &invite.code.to_lowercase())
        .await
        .expect("accept");
    assert!(status.paired);
}

#[tokio::test]
async fn unknown_code_is_a_distinct_denial() {
    let ctx = test_ctx().await;
    let bob = seed_user(&ctx, "Bob", "bob@example.com").await;

    let err = accept_invite(&ctx, bob, "LOVE-ZZZZ")
        .await
        .expect_err("should fail");
    assert_eq!(err.code, ErrorCode::InviteNotFound);
}

#[tokio::test]
async fn used_code_is_a_distinct_denial() {
    let ctx = test_ctx().await;
    let alice = seed_user(&ctx, "Alice", "alice@example.com").await;
    let bob = seed_user(&ctx, "Bob", "bob@example.com").await;
    let carol = seed_user(&ctx, "Carol", "carol@example.com").await;

    let invite = create_invite(&ctx, alice).await.expect("invite");
    accept_invite(&ctx, bob, &invite.code).await.expect("accept");

    let err = accept_invite(&ctx, carol, &invite.code)
        .await
        .expect_err("should fail");
    assert_eq!(err.code, ErrorCode::InviteAlreadyUsed);
}

#[tokio::test]
async fn own_code_is_a_distinct_denial() {
    let ctx = test_ctx().await;
    let alice = seed_user(&ctx, "Alice", "alice@example.com").await;

    let invite = create_invite(&ctx, alice).await.expect("invite");
    let err = accept_invite(&ctx, alice, &invite.code)
        .await
        .expect_err("should fail");
    assert_eq!(err.code, ErrorCode::InviteSelfUse);
}

#[tokio::test]
async fn paired_users_cannot_accept_or_create_invites() {
    let ctx = test_ctx().await;
    let alice = seed_user(&ctx, "Alice", "alice@example.com").await;
    let bob = seed_user(&ctx, "Bob", "bob@example.com").await;
    let carol = seed_user(&ctx, "Carol", "carol@example.com").await;

    let invite = create_invite(&ctx, alice).await.expect("invite");
    accept_invite(&ctx, bob, &invite.code).await.expect("accept");

    let carols = create_invite(&ctx, carol).await.expect("carol invite");
    let err = accept_invite(&ctx, bob, &carols.code)
        .await
        .expect_err("should fail");
    assert_eq!(err.code, ErrorCode::AlreadyPaired);

    let err = create_invite(&ctx, alice).await.expect_err("should fail");
    assert_eq!(err.code, ErrorCode::AlreadyPaired);
}

#[tokio::test]
async fn accepting_a_code_for_a_paired_creator_is_denied() {
    let ctx = test_ctx().await;
    let alice = seed_user(&ctx, "Alice", "alice@example.com").await;
    let bob = seed_user(&ctx, "Bob", "bob@example.com").await;
    let carol = seed_user(&ctx, "Carol", "carol@example.com").await;

    // Alice issues a code, then pairs with Bob through a second one.
    let stale = create_invite(&ctx, alice).await.expect("stale invite");
    let fresh = create_invite(&ctx, alice).await.expect("fresh invite");
    accept_invite(&ctx, bob, &fresh.code).await.expect("accept");

    // The stale code was revoked when the fresh one was issued.
    let err = accept_invite(&ctx, carol, &stale.code)
        .await
        .expect_err("should fail");
    assert_eq!(err.code, ErrorCode::InviteAlreadyUsed);
}

#[tokio::test]
async fn unpaired_status_has_no_partner() {
    let ctx = test_ctx().await;
    let alice = seed_user(&ctx, "Alice", "alice@example.com").await;

    let status = pair_status(&ctx, alice).await.expect("status");
    assert!(!status.paired);
    assert!(status.partner.is_none());
}
