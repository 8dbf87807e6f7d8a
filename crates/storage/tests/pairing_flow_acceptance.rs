use chrono::{Duration, Utc};
use shared::domain::{DateNightId, InviteStatus, ManifestationKind, Milestone};
use storage::{NewManifestationRow, NewReviewRow, Storage};

#[tokio::test]
async fn invite_pairing_and_date_night_review_acceptance() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");

    let alice = storage
        .create_user(
            "Alice",
            "alice@example.com",
            "5551234567",
            None,
            "hash-alice",
        )
        .await
        .expect("alice");
    let bob = storage
        .create_user("Bob", "bob@example.com", "5559876543", None, "hash-bob")
        .await
        .expect("bob");

    let invite_id = storage
        .insert_invite("LOVE-J9K2", alice)
        .await
        .expect("invite");

    let invite = storage
        .invite_by_code("LOVE-J9K2")
        .await
        .expect("lookup")
        .expect("invite exists");
    assert_eq!(invite.status, InviteStatus::Active);
    assert_eq!(invite.created_by, alice);

    assert!(storage
        .mark_invite_used(invite_id, bob)
        .await
        .expect("consume invite"));
    let couple_id = storage.insert_couple(alice, bob).await.expect("couple");

    let couple = storage
        .couple_for_user(bob)
        .await
        .expect("couple lookup")
        .expect("couple exists");
    assert_eq!(couple.partner_of(bob), alice);

    // A second accept of the same code must lose the status guard.
    assert!(!storage
        .mark_invite_used(invite_id, bob)
        .await
        .expect("second consume"));

    let now = Utc::now();
    storage
        .insert_manifestation(
            NewManifestationRow {
                couple_id: Some(couple_id),
                author_id: alice,
                kind: ManifestationKind::Shared,
                title: "Weekly date night",
                description: Some("Every Friday"),
                milestones: &[Milestone {
                    label: "Pick a restaurant".to_string(),
                    done: false,
                }],
                target_date: None,
                remind_at: Some(now + Duration::days(7)),
            },
            now,
        )
        .await
        .expect("manifestation");

    let shared_goals = storage
        .list_manifestations_for_couple(couple_id)
        .await
        .expect("goal list");
    assert_eq!(shared_goals.len(), 1);
    assert_eq!(shared_goals[0].title, "Weekly date night");

    let date_night = DateNightId(1);
    storage
        .insert_review(
            NewReviewRow {
                date_night_id: date_night,
                author_id: alice,
                rating: 4,
                message: "Great food, long wait",
                emoji: None,
                image_urls: &[],
                video_urls: &[],
            },
            now,
        )
        .await
        .expect("first review");
    storage
        .insert_review(
            NewReviewRow {
                date_night_id: date_night,
                author_id: bob,
                rating: 5,
                message: "Loved every minute",
                emoji: Some("\u{2764}"),
                image_urls: &["https://cdn.example.com/night.jpg".to_string()],
                video_urls: &[],
            },
            now + Duration::seconds(30),
        )
        .await
        .expect("second review");

    let reviews = storage
        .list_reviews_for_date_night(date_night)
        .await
        .expect("review list");
    assert_eq!(reviews.len(), 2);
    assert_eq!(reviews[0].message, "Loved every minute");
    assert_eq!(reviews[1].message, "Great food, long wait");
}
