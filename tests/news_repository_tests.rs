mod common;

use common::{TestContext, as_auth, news};
use feednews::{
    AppError,
    models::{RegisterUserRequest, UpdateNewsRequest},
    pagination::{NewsFilter, Page, Visibility},
    repository::Repository,
};

fn filter(page: i64, limit: i64, q: Option<&str>, visibility: Visibility) -> NewsFilter {
    NewsFilter::new(
        Page::new(page, limit).unwrap(),
        q.map(str::to_string),
        visibility,
    )
}

// --- Listing, Pagination & Search ---

#[tokio::test]
async fn test_twenty_five_items_paginate_into_three_pages() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    for i in 0..25 {
        ctx.news_by(&alice, &format!("Item {i}"), "body").await;
    }

    let (items, total) = ctx
        .repo
        .list_news(&filter(1, 10, None, Visibility::Active))
        .await
        .unwrap();
    assert_eq!(items.len(), 10);
    assert_eq!(total, 25);
    assert_eq!(Page::new(1, 10).unwrap().total_pages(total), 3);

    let (last, total) = ctx
        .repo
        .list_news(&filter(3, 10, None, Visibility::Active))
        .await
        .unwrap();
    assert_eq!(last.len(), 5);
    assert_eq!(total, 25);

    let (beyond, total) = ctx
        .repo
        .list_news(&filter(4, 10, None, Visibility::Active))
        .await
        .unwrap();
    assert!(beyond.is_empty());
    assert_eq!(total, 25);
}

#[tokio::test]
async fn test_listing_is_newest_first_with_creator_name() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    let first = ctx.news_by(&alice, "First", "a").await;
    let second = ctx.news_by(&alice, "Second", "b").await;

    let (items, _) = ctx
        .repo
        .list_news(&filter(1, 10, None, Visibility::Active))
        .await
        .unwrap();
    assert_eq!(items[0].id, second.id);
    assert_eq!(items[1].id, first.id);
    assert!(items.iter().all(|n| n.creator_username.as_deref() == Some("alice")));
}

#[tokio::test]
async fn test_search_is_case_insensitive_over_title_and_description() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    ctx.news_by(&alice, "容器化部署", "容器化部署...Docker Compose 一键启动")
        .await;
    ctx.news_by(&alice, "docker tips", "plain").await;
    ctx.news_by(&alice, "Unrelated", "nothing to see").await;

    let (items, total) = ctx
        .repo
        .list_news(&filter(1, 10, Some("DOCKER"), Visibility::Active))
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(items.len(), 2);

    let (_, total) = ctx
        .repo
        .list_news(&filter(1, 10, Some("容器"), Visibility::Active))
        .await
        .unwrap();
    assert_eq!(total, 1);
}

#[tokio::test]
async fn test_empty_search_returns_everything_visible() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    ctx.news_by(&alice, "One", "a").await;
    ctx.news_by(&alice, "Two", "b").await;

    let (_, total) = ctx
        .repo
        .list_news(&filter(1, 10, Some(""), Visibility::Active))
        .await
        .unwrap();
    assert_eq!(total, 2);
}

#[tokio::test]
async fn test_whitespace_search_is_a_literal_match() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    ctx.news_by(&alice, "Two  spaces", "a").await;
    ctx.news_by(&alice, "Single", "b").await;

    let (items, total) = ctx
        .repo
        .list_news(&filter(1, 10, Some("  "), Visibility::Active))
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(items[0].title, "Two  spaces");
}

#[tokio::test]
async fn test_page_far_past_the_end_is_empty() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    ctx.news_by(&alice, "One", "a").await;

    let (items, total) = ctx
        .repo
        .list_news(&filter(i64::MAX, 100, None, Visibility::Active))
        .await
        .unwrap();
    assert!(items.is_empty());
    assert_eq!(total, 1);

    let users = ctx.repo.list_users(Page::new(i64::MAX, 100).unwrap()).await.unwrap();
    assert!(users.is_empty());
}

#[tokio::test]
async fn test_missing_creator_yields_null_username() {
    let ctx = TestContext::new();
    let ghost = ctx.user("ghost").await;
    let record = ctx.news_by(&ghost, "Orphan", "creator goes away").await;
    assert!(ctx.repo.remove_user(ghost.id).unwrap());

    let fetched = ctx
        .repo
        .get_news(record.id, Visibility::Active)
        .await
        .unwrap()
        .expect("news outlives its creator");
    assert_eq!(fetched.creator_username, None);
}

// --- Visibility & Soft Delete ---

#[tokio::test]
async fn test_soft_deleted_items_are_hidden_unless_requested() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    let keep = ctx.news_by(&alice, "Keep", "a").await;
    let gone = ctx.news_by(&alice, "Gone", "b").await;

    ctx.repo
        .soft_delete_news(gone.id, &as_auth(&alice))
        .await
        .unwrap();

    let (items, total) = ctx
        .repo
        .list_news(&filter(1, 10, None, Visibility::Active))
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(items[0].id, keep.id);
    assert!(items.iter().all(|n| n.deleted_at.is_none()));

    assert!(
        ctx.repo
            .get_news(gone.id, Visibility::Active)
            .await
            .unwrap()
            .is_none()
    );

    let (all, total) = ctx
        .repo
        .list_news(&filter(1, 10, None, Visibility::IncludeDeleted))
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert!(all.iter().any(|n| n.id == gone.id && n.deleted_at.is_some()));
}

#[tokio::test]
async fn test_second_soft_delete_is_not_found() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    let record = ctx.news_by(&alice, "Once", "a").await;

    ctx.repo
        .soft_delete_news(record.id, &as_auth(&alice))
        .await
        .unwrap();
    let again = ctx.repo.soft_delete_news(record.id, &as_auth(&alice)).await;
    assert!(matches!(again, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_restore_only_applies_to_deleted_items() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    let record = ctx.news_by(&alice, "Phoenix", "a").await;

    let live = ctx.repo.restore_news(record.id).await;
    assert!(matches!(live, Err(AppError::NotFound(_))));

    ctx.repo
        .soft_delete_news(record.id, &as_auth(&alice))
        .await
        .unwrap();
    let restored = ctx.repo.restore_news(record.id).await.unwrap();
    assert_eq!(restored.id, record.id);
    assert!(restored.deleted_at.is_none());
    assert_eq!(restored.creator_username.as_deref(), Some("alice"));

    assert!(
        ctx.repo
            .get_news(record.id, Visibility::Active)
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn test_hard_delete_ignores_soft_delete_state() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    let live = ctx.news_by(&alice, "Live", "a").await;
    let deleted = ctx.news_by(&alice, "Deleted", "b").await;
    ctx.repo
        .soft_delete_news(deleted.id, &as_auth(&alice))
        .await
        .unwrap();

    ctx.repo.hard_delete_news(live.id).await.unwrap();
    ctx.repo.hard_delete_news(deleted.id).await.unwrap();

    let (_, total) = ctx
        .repo
        .list_news(&filter(1, 10, None, Visibility::IncludeDeleted))
        .await
        .unwrap();
    assert_eq!(total, 0);
    assert!(matches!(
        ctx.repo.hard_delete_news(live.id).await,
        Err(AppError::NotFound(_))
    ));
}

// --- Create / Update ---

#[tokio::test]
async fn test_create_then_get_round_trips() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    let created = ctx
        .repo
        .create_news(news("Title", "Description"), alice.id)
        .await
        .unwrap();

    let fetched = ctx
        .repo
        .get_news(created.id, Visibility::Active)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.title, "Title");
    assert_eq!(fetched.description, "Description");
    assert_eq!(fetched.creator_id, alice.id);
}

#[tokio::test]
async fn test_partial_update_leaves_other_fields() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    let mut req = news("Before", "Unchanged");
    req.image_url = Some("old.png".into());
    let record = ctx.repo.create_news(req, alice.id).await.unwrap();

    let patch: UpdateNewsRequest = serde_json::from_str(r#"{"title": "After"}"#).unwrap();
    let updated = ctx
        .repo
        .update_news(record.id, patch, &as_auth(&alice))
        .await
        .unwrap();
    assert_eq!(updated.title, "After");
    assert_eq!(updated.description, "Unchanged");
    assert_eq!(updated.image_url.as_deref(), Some("old.png"));
    assert!(updated.updated_at >= record.updated_at);

    let clear: UpdateNewsRequest = serde_json::from_str(r#"{"image_url": null}"#).unwrap();
    let cleared = ctx
        .repo
        .update_news(record.id, clear, &as_auth(&alice))
        .await
        .unwrap();
    assert_eq!(cleared.image_url, None);
    assert_eq!(cleared.title, "After");
}

#[tokio::test]
async fn test_update_rejects_null_title() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    let record = ctx.news_by(&alice, "Title", "a").await;

    let patch: UpdateNewsRequest = serde_json::from_str(r#"{"title": null}"#).unwrap();
    let result = ctx
        .repo
        .update_news(record.id, patch, &as_auth(&alice))
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_update_of_soft_deleted_item_is_not_found() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    let record = ctx.news_by(&alice, "Title", "a").await;
    ctx.repo
        .soft_delete_news(record.id, &as_auth(&alice))
        .await
        .unwrap();

    let patch: UpdateNewsRequest = serde_json::from_str(r#"{"title": "x"}"#).unwrap();
    let result = ctx
        .repo
        .update_news(record.id, patch, &as_auth(&alice))
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

// --- Authorization ---

#[tokio::test]
async fn test_non_owner_is_forbidden_owner_and_admin_succeed() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    let mallory = ctx.user("mallory").await;
    let admin = ctx.admin("root").await;
    let record = ctx.news_by(&alice, "Mine", "a").await;

    let patch: UpdateNewsRequest = serde_json::from_str(r#"{"title": "Hijacked"}"#).unwrap();
    let denied = ctx
        .repo
        .update_news(record.id, patch.clone(), &as_auth(&mallory))
        .await;
    assert!(matches!(denied, Err(AppError::Forbidden)));
    let denied = ctx
        .repo
        .soft_delete_news(record.id, &as_auth(&mallory))
        .await;
    assert!(matches!(denied, Err(AppError::Forbidden)));

    // Unchanged after the rejected attempts.
    let current = ctx
        .repo
        .get_news(record.id, Visibility::Active)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.title, "Mine");

    let by_owner: UpdateNewsRequest = serde_json::from_str(r#"{"title": "Owner"}"#).unwrap();
    let updated = ctx
        .repo
        .update_news(record.id, by_owner, &as_auth(&alice))
        .await
        .unwrap();
    assert_eq!(updated.title, "Owner");

    let updated = ctx
        .repo
        .update_news(record.id, patch, &as_auth(&admin))
        .await
        .unwrap();
    assert_eq!(updated.title, "Hijacked");

    ctx.repo
        .soft_delete_news(record.id, &as_auth(&admin))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_missing_item_is_not_found_before_forbidden() {
    let ctx = TestContext::new();
    let mallory = ctx.user("mallory").await;
    let result = ctx.repo.soft_delete_news(9999, &as_auth(&mallory)).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

// --- Users ---

#[tokio::test]
async fn test_registration_conflicts() {
    let ctx = TestContext::new();
    ctx.user("alice").await;

    let same_username = ctx
        .repo
        .register(RegisterUserRequest {
            username: "alice".into(),
            email: "other@example.com".into(),
            password: "pw".into(),
        })
        .await;
    assert!(matches!(same_username, Err(AppError::UsernameTaken)));

    let same_email = ctx
        .repo
        .register(RegisterUserRequest {
            username: "alice2".into(),
            email: "alice@example.com".into(),
            password: "pw".into(),
        })
        .await;
    assert!(matches!(same_email, Err(AppError::EmailTaken)));

    // Username is probed first.
    let both = ctx
        .repo
        .register(RegisterUserRequest {
            username: "alice".into(),
            email: "alice@example.com".into(),
            password: "pw".into(),
        })
        .await;
    assert!(matches!(both, Err(AppError::UsernameTaken)));
}

#[tokio::test]
async fn test_registration_stores_hash_not_password() {
    let ctx = TestContext::new();
    let user = ctx.user("alice").await;
    assert_ne!(user.hashed_password, common::PASSWORD);
    assert!(user.hashed_password.starts_with("$argon2"));
    assert!(!user.is_admin);
}

#[tokio::test]
async fn test_list_users_is_paginated_newest_first() {
    let ctx = TestContext::new();
    for name in ["u1", "u2", "u3"] {
        ctx.user(name).await;
    }

    let first = ctx.repo.list_users(Page::new(1, 2).unwrap()).await.unwrap();
    assert_eq!(
        first.iter().map(|u| u.username.as_str()).collect::<Vec<_>>(),
        vec!["u3", "u2"]
    );
    let second = ctx.repo.list_users(Page::new(2, 2).unwrap()).await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].username, "u1");
}
