use std::sync::Arc;

use fileshare::state_machine::ReactionState;
use fileshare::storage::models::{NewFile, Reaction};
use fileshare::storage::{LocalStore, RecordStore, SqlStore, StoreError, DEFAULT_LOCAL_QUOTA};

async fn sql_store() -> (tempfile::TempDir, SqlStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqlStore::open(dir.path().join("data")).await.unwrap();
    (dir, store)
}

fn local_store() -> (tempfile::TempDir, LocalStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::open(dir.path().join("local"), DEFAULT_LOCAL_QUOTA).unwrap();
    (dir, store)
}

fn sample_file(name: &str) -> NewFile {
    NewFile {
        name: name.to_string(),
        mime_type: "text/plain".to_string(),
        size_bytes: 5,
        content: "data:text/plain;base64,aGVsbG8=".to_string(),
        text_content: Some("hello".to_string()),
        caption: Some("a caption".to_string()),
    }
}

/// Likes and dislikes on `file_id` must equal the reaction records held by `users`.
async fn assert_counters_match(store: &dyn RecordStore, file_id: &str, users: &[&str]) {
    let mut likes = 0;
    let mut dislikes = 0;
    for user in users {
        match store.get_reactions_for_user(user).await.unwrap().get(file_id) {
            Some(Reaction::Like) => likes += 1,
            Some(Reaction::Dislike) => dislikes += 1,
            None => {}
        }
    }

    let file = store.get_file(file_id).await.unwrap().expect("file should exist");
    assert_eq!(file.likes, likes, "likes diverged from reaction records");
    assert_eq!(file.dislikes, dislikes, "dislikes diverged from reaction records");
}

async fn check_insert_and_get(store: &dyn RecordStore) {
    let id = store.insert_file(sample_file("hello.txt"), "user_a").await.unwrap();
    assert!(id.starts_with("file_"));

    let file = store.get_file(&id).await.unwrap().expect("file should exist");
    assert_eq!(file.name, "hello.txt");
    assert_eq!(file.mime_type, "text/plain");
    assert_eq!(file.text_content.as_deref(), Some("hello"));
    assert_eq!(file.caption.as_deref(), Some("a caption"));
    assert_eq!(file.uploader_id, "user_a");
    assert_eq!((file.views, file.likes, file.dislikes), (0, 0, 0));

    assert!(store.get_file("file_missing").await.unwrap().is_none());
}

async fn check_listing_is_newest_first(store: &dyn RecordStore) {
    let first = store.insert_file(sample_file("first.txt"), "user_a").await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = store.insert_file(sample_file("second.txt"), "user_a").await.unwrap();

    let files = store.get_all_files().await.unwrap();
    let ids: Vec<&str> = files.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, vec![second.as_str(), first.as_str()]);
}

async fn check_reaction_scenario(store: &dyn RecordStore) {
    let id = store.insert_file(sample_file("f1.txt"), "user_a").await.unwrap();
    store.apply_reaction(&id, "user_x", Reaction::Like).await.unwrap();
    store.apply_reaction(&id, "user_y", Reaction::Like).await.unwrap();

    let liked = store.apply_reaction(&id, "user_1", Reaction::Like).await.unwrap();
    assert_eq!(liked.state, ReactionState::Liked);
    assert_eq!((liked.likes, liked.dislikes), (3, 0));

    let toggled = store.apply_reaction(&id, "user_1", Reaction::Like).await.unwrap();
    assert_eq!(toggled.state, ReactionState::None);
    assert_eq!((toggled.like_delta, toggled.dislike_delta), (-1, 0));
    assert_eq!((toggled.likes, toggled.dislikes), (2, 0));

    let disliked = store
        .apply_reaction(&id, "user_1", Reaction::Dislike)
        .await
        .unwrap();
    assert_eq!(disliked.state, ReactionState::Disliked);
    assert_eq!((disliked.likes, disliked.dislikes), (2, 1));

    assert_counters_match(store, &id, &["user_x", "user_y", "user_1"]).await;
}

async fn check_switch_law(store: &dyn RecordStore) {
    let id = store.insert_file(sample_file("switch.txt"), "user_a").await.unwrap();

    store.apply_reaction(&id, "user_1", Reaction::Like).await.unwrap();
    let switched = store
        .apply_reaction(&id, "user_1", Reaction::Dislike)
        .await
        .unwrap();
    assert_eq!(switched.state, ReactionState::Disliked);
    assert_eq!((switched.like_delta, switched.dislike_delta), (-1, 1));
    assert_eq!((switched.likes, switched.dislikes), (0, 1));

    let reactions = store.get_reactions_for_user("user_1").await.unwrap();
    assert_eq!(reactions.get(&id), Some(&Reaction::Dislike));
}

async fn check_reaction_sequences_keep_invariant(store: &dyn RecordStore) {
    let id = store.insert_file(sample_file("seq.txt"), "user_a").await.unwrap();
    let users = ["user_1", "user_2", "user_3"];
    let sequence = [
        ("user_1", Reaction::Like),
        ("user_2", Reaction::Dislike),
        ("user_1", Reaction::Dislike),
        ("user_3", Reaction::Like),
        ("user_2", Reaction::Dislike),
        ("user_3", Reaction::Like),
        ("user_1", Reaction::Like),
        ("user_2", Reaction::Like),
        ("user_1", Reaction::Like),
    ];

    for (user, reaction) in sequence {
        store.apply_reaction(&id, user, reaction).await.unwrap();
        assert_counters_match(store, &id, &users).await;
    }
}

async fn check_reaction_only_touches_its_file(store: &dyn RecordStore) {
    let target = store.insert_file(sample_file("target.txt"), "user_a").await.unwrap();
    let other = store.insert_file(sample_file("other.txt"), "user_a").await.unwrap();

    store.apply_reaction(&target, "user_1", Reaction::Like).await.unwrap();

    let other = store.get_file(&other).await.unwrap().unwrap();
    assert_eq!((other.likes, other.dislikes), (0, 0));
}

async fn check_unknown_file(store: &dyn RecordStore) {
    let err = store
        .apply_reaction("file_missing", "user_1", Reaction::Like)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));

    assert!(matches!(
        store.increment_views("file_missing").await.unwrap_err(),
        StoreError::NotFound(_)
    ));
    assert!(matches!(
        store.delete_file("file_missing").await.unwrap_err(),
        StoreError::NotFound(_)
    ));
}

async fn check_delete_removes_reactions(store: &dyn RecordStore) {
    let id = store.insert_file(sample_file("gone.txt"), "user_a").await.unwrap();
    let kept = store.insert_file(sample_file("kept.txt"), "user_a").await.unwrap();
    store.apply_reaction(&id, "user_1", Reaction::Like).await.unwrap();
    store.apply_reaction(&kept, "user_1", Reaction::Dislike).await.unwrap();

    store.delete_file(&id).await.unwrap();

    assert!(store.get_file(&id).await.unwrap().is_none());
    let reactions = store.get_reactions_for_user("user_1").await.unwrap();
    assert_eq!(reactions.len(), 1);
    assert_eq!(reactions.get(&kept), Some(&Reaction::Dislike));
}

async fn check_views_and_stats(store: &dyn RecordStore) {
    let a = store.insert_file(sample_file("a.txt"), "user_a").await.unwrap();
    let b = store.insert_file(sample_file("b.txt"), "user_a").await.unwrap();

    assert_eq!(store.increment_views(&a).await.unwrap(), 1);
    assert_eq!(store.increment_views(&a).await.unwrap(), 2);
    assert_eq!(store.increment_views(&b).await.unwrap(), 1);
    store.apply_reaction(&a, "user_1", Reaction::Like).await.unwrap();
    store.apply_reaction(&b, "user_1", Reaction::Dislike).await.unwrap();

    let stats = store.get_aggregate_stats().await.unwrap();
    assert_eq!(stats.total_files, 2);
    assert_eq!(stats.total_views, 3);
    assert_eq!(stats.total_likes, 1);
}

// ============================================================================
// Relational store
// ============================================================================

#[tokio::test]
async fn test_sql_insert_and_get() {
    let (_dir, store) = sql_store().await;
    check_insert_and_get(&store).await;
}

#[tokio::test]
async fn test_sql_listing_is_newest_first() {
    let (_dir, store) = sql_store().await;
    check_listing_is_newest_first(&store).await;
}

#[tokio::test]
async fn test_sql_reaction_scenario() {
    let (_dir, store) = sql_store().await;
    check_reaction_scenario(&store).await;
}

#[tokio::test]
async fn test_sql_switch_law() {
    let (_dir, store) = sql_store().await;
    check_switch_law(&store).await;
}

#[tokio::test]
async fn test_sql_reaction_sequences_keep_invariant() {
    let (_dir, store) = sql_store().await;
    check_reaction_sequences_keep_invariant(&store).await;
}

#[tokio::test]
async fn test_sql_reaction_only_touches_its_file() {
    let (_dir, store) = sql_store().await;
    check_reaction_only_touches_its_file(&store).await;
}

#[tokio::test]
async fn test_sql_unknown_file() {
    let (_dir, store) = sql_store().await;
    check_unknown_file(&store).await;
}

#[tokio::test]
async fn test_sql_delete_removes_reactions() {
    let (_dir, store) = sql_store().await;
    check_delete_removes_reactions(&store).await;
}

#[tokio::test]
async fn test_sql_views_and_stats() {
    let (_dir, store) = sql_store().await;
    check_views_and_stats(&store).await;
}

#[tokio::test]
async fn test_sql_data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let id = {
        let store = SqlStore::open(dir.path().join("data")).await.unwrap();
        let id = store.insert_file(sample_file("kept.txt"), "user_a").await.unwrap();
        store.apply_reaction(&id, "user_1", Reaction::Like).await.unwrap();
        store.pool().close().await;
        id
    };

    let store = SqlStore::open(dir.path().join("data")).await.unwrap();
    let file = store.get_file(&id).await.unwrap().expect("file should exist");
    assert_eq!(file.likes, 1);
}

#[tokio::test]
async fn test_sql_purge_all() {
    let (_dir, store) = sql_store().await;
    let id = store.insert_file(sample_file("a.txt"), "user_a").await.unwrap();
    store.apply_reaction(&id, "user_1", Reaction::Like).await.unwrap();

    let stats = store.purge_all().await.unwrap();
    assert_eq!(stats.files, 1);
    assert_eq!(stats.reactions, 1);
    assert!(store.get_all_files().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sql_concurrent_reactions_keep_counters_consistent() {
    let (_dir, store) = sql_store().await;
    let id = store.insert_file(sample_file("busy.txt"), "user_a").await.unwrap();

    let users: Vec<String> = (0..8).map(|i| format!("user_{i}")).collect();
    let mut handles = Vec::new();
    for (i, user) in users.iter().cloned().enumerate() {
        for round in 0..5 {
            let store = store.clone();
            let id = id.clone();
            let user = user.clone();
            let reaction = if (i + round) % 2 == 0 {
                Reaction::Like
            } else {
                Reaction::Dislike
            };
            handles.push(tokio::spawn(async move {
                store.apply_reaction(&id, &user, reaction).await
            }));
        }
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let user_refs: Vec<&str> = users.iter().map(String::as_str).collect();
    assert_counters_match(&store, &id, &user_refs).await;
}

#[tokio::test]
async fn test_sql_concurrent_same_pair_never_duplicates() {
    let (_dir, store) = sql_store().await;
    let store = Arc::new(store);
    let id = store.insert_file(sample_file("pair.txt"), "user_a").await.unwrap();

    let tasks = (0..6).map(|_| {
        let store = Arc::clone(&store);
        let id = id.clone();
        tokio::spawn(async move { store.apply_reaction(&id, "user_1", Reaction::Like).await })
    });
    for task in tasks.collect::<Vec<_>>() {
        task.await.unwrap().unwrap();
    }

    // Six toggles of the same like end where they started.
    let file = store.get_file(&id).await.unwrap().unwrap();
    assert_eq!(file.likes, 0);
    assert!(store.get_reactions_for_user("user_1").await.unwrap().is_empty());
}

// ============================================================================
// Local store
// ============================================================================

#[tokio::test]
async fn test_local_insert_and_get() {
    let (_dir, store) = local_store();
    check_insert_and_get(&store).await;
}

#[tokio::test]
async fn test_local_listing_is_newest_first() {
    let (_dir, store) = local_store();
    check_listing_is_newest_first(&store).await;
}

#[tokio::test]
async fn test_local_reaction_scenario() {
    let (_dir, store) = local_store();
    check_reaction_scenario(&store).await;
}

#[tokio::test]
async fn test_local_switch_law() {
    let (_dir, store) = local_store();
    check_switch_law(&store).await;
}

#[tokio::test]
async fn test_local_reaction_sequences_keep_invariant() {
    let (_dir, store) = local_store();
    check_reaction_sequences_keep_invariant(&store).await;
}

#[tokio::test]
async fn test_local_reaction_only_touches_its_file() {
    let (_dir, store) = local_store();
    check_reaction_only_touches_its_file(&store).await;
}

#[tokio::test]
async fn test_local_unknown_file() {
    let (_dir, store) = local_store();
    check_unknown_file(&store).await;
}

#[tokio::test]
async fn test_local_delete_removes_reactions() {
    let (_dir, store) = local_store();
    check_delete_removes_reactions(&store).await;
}

#[tokio::test]
async fn test_local_views_and_stats() {
    let (_dir, store) = local_store();
    check_views_and_stats(&store).await;
}

#[tokio::test]
async fn test_local_quota_exceeded_keeps_previous_state() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::open(dir.path().join("local"), 2048).unwrap();

    let id = store.insert_file(sample_file("small.txt"), "user_a").await.unwrap();

    let mut big = sample_file("big.txt");
    big.content = "x".repeat(4096);
    big.size_bytes = 4096;
    let err = store.insert_file(big, "user_a").await.unwrap_err();
    assert!(matches!(err, StoreError::QuotaExceeded { quota: 2048, .. }));

    let files = store.get_all_files().await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].id, id);
}

#[tokio::test]
async fn test_local_usage_and_clear() {
    let (_dir, store) = local_store();
    let id = store.insert_file(sample_file("a.txt"), "user_a").await.unwrap();
    store.apply_reaction(&id, "user_1", Reaction::Like).await.unwrap();
    store.store_value("fileshare_user_id", &"user_1".to_string()).unwrap();

    let usage = store.usage().unwrap();
    assert!(usage.files_bytes > 0);
    assert!(usage.reactions_bytes > 0);
    assert!(usage.other_bytes > 0);
    assert_eq!(
        usage.total_bytes,
        usage.files_bytes + usage.reactions_bytes + usage.other_bytes
    );
    assert_eq!(usage.quota_bytes, DEFAULT_LOCAL_QUOTA);
    assert!(usage.percentage_used > 0.0 && usage.percentage_used < 100.0);

    assert_eq!(store.clear().unwrap(), 3);
    assert!(store.get_all_files().await.unwrap().is_empty());
    assert!(store
        .load_value::<String>("fileshare_user_id")
        .unwrap()
        .is_none());
    assert_eq!(store.usage().unwrap().total_bytes, 0);
}

#[tokio::test]
async fn test_local_data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let id = {
        let store = LocalStore::open(dir.path().join("local"), DEFAULT_LOCAL_QUOTA).unwrap();
        let id = store.insert_file(sample_file("kept.txt"), "user_a").await.unwrap();
        store.apply_reaction(&id, "user_1", Reaction::Dislike).await.unwrap();
        id
    };

    let store = LocalStore::open(dir.path().join("local"), DEFAULT_LOCAL_QUOTA).unwrap();
    let file = store.get_file(&id).await.unwrap().expect("file should exist");
    assert_eq!(file.dislikes, 1);
    assert_eq!(
        store.get_reactions_for_user("user_1").await.unwrap().get(&id),
        Some(&Reaction::Dislike)
    );
}
