mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{drain, memory, sqlite, text_changes, Harness};
use roomsync_config::{ConflictPolicyKind, SyncConfig};
use roomsync_sync::{
    ClientEvent, ConnectionState, DocumentSnapshot, DocumentStore, EditOutcome, HistoryEntry,
    JoinOutcome, MemoryRoomDirectory, Room, RoomDirectory, ServerEvent, SyncEngine, SyncError,
    SyncResult,
};

async fn hello_world(harness: Harness) {
    let room = harness.room("a", true).await;

    let (mut a, mut rx_a) = harness.engine.open().await;
    a.handle(ClientEvent::JoinRoom {
        room_id: room.id.clone(),
        user_id: "a".into(),
    })
    .await
    .unwrap();
    assert_eq!(
        drain(&mut rx_a),
        vec![ServerEvent::DocumentLoad {
            content: String::new(),
            version: 0
        }]
    );

    a.handle(ClientEvent::TextChange {
        content: "hello".into(),
        room_id: Some(room.id.clone()),
        user_id: Some("a".into()),
        base_version: None,
    })
    .await
    .unwrap();
    assert_eq!(harness.documents.load(&room.id).await.unwrap().version, 1);

    let (mut b, mut rx_b) = harness.engine.open().await;
    b.handle(ClientEvent::JoinRoom {
        room_id: room.id.clone(),
        user_id: "b".into(),
    })
    .await
    .unwrap();
    assert_eq!(
        drain(&mut rx_b),
        vec![ServerEvent::DocumentLoad {
            content: "hello".into(),
            version: 1
        }]
    );
    assert_eq!(
        drain(&mut rx_a),
        vec![ServerEvent::UserJoined { user_id: "b".into() }]
    );

    b.handle(ClientEvent::TextChange {
        content: "hello world".into(),
        room_id: Some(room.id.clone()),
        user_id: Some("b".into()),
        base_version: Some(1),
    })
    .await
    .unwrap();

    assert_eq!(
        drain(&mut rx_a),
        vec![ServerEvent::TextChange {
            content: "hello world".into(),
            user_id: "b".into(),
            version: 2
        }]
    );
    assert!(drain(&mut rx_b).is_empty());

    let snapshot = harness.documents.load(&room.id).await.unwrap();
    assert_eq!(snapshot.content, "hello world");
    assert_eq!(snapshot.version, 2);

    let history = harness.documents.history(&room.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!((history[0].version, history[0].editor.as_str()), (1, "a"));
    assert_eq!((history[1].version, history[1].editor.as_str()), (2, "b"));
}

#[tokio::test]
async fn hello_world_memory() {
    hello_world(memory(SyncConfig::default())).await;
}

#[tokio::test]
async fn hello_world_sqlite() {
    hello_world(sqlite(SyncConfig::default()).await).await;
}

async fn racing_edits_at_version_five(harness: Harness) {
    let room = harness.room("a", true).await;
    for i in 1..=5 {
        harness
            .documents
            .append_edit(&room.id, &format!("seed {i}"), "seeder")
            .await
            .unwrap();
    }

    let (mut a, mut rx_a) = harness.engine.open().await;
    let (mut b, mut rx_b) = harness.engine.open().await;
    a.join(&room.id, "a").await.unwrap();
    b.join(&room.id, "b").await.unwrap();
    drain(&mut rx_a);
    drain(&mut rx_b);

    let edit_a = tokio::spawn(async move {
        let outcome = a.edit("from a".into(), None, Some(5)).await.unwrap();
        (a, outcome)
    });
    let edit_b = tokio::spawn(async move {
        let outcome = b.edit("from b".into(), None, Some(5)).await.unwrap();
        (b, outcome)
    });
    let (_a, outcome_a) = edit_a.await.unwrap();
    let (_b, outcome_b) = edit_b.await.unwrap();

    let mut versions = Vec::new();
    for outcome in [outcome_a, outcome_b] {
        match outcome {
            EditOutcome::Applied { version } => versions.push(version),
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    versions.sort_unstable();
    assert_eq!(versions, vec![6, 7]);

    let snapshot = harness.documents.load(&room.id).await.unwrap();
    assert_eq!(snapshot.version, 7);

    let history = harness.documents.history(&room.id).await.unwrap();
    let tail: Vec<&HistoryEntry> = history.iter().filter(|entry| entry.version > 5).collect();
    assert_eq!(tail.len(), 2);
    assert_eq!(tail[0].version, 6);
    assert_eq!(tail[1].version, 7);
    assert_ne!(tail[0].editor, tail[1].editor);
    assert_eq!(snapshot.content, tail[1].content);

    // Each side sees exactly the other's edit.
    let seen_by_a = text_changes(&drain(&mut rx_a));
    let seen_by_b = text_changes(&drain(&mut rx_b));
    assert_eq!(seen_by_a.len(), 1);
    assert_eq!(seen_by_b.len(), 1);
    assert_eq!(seen_by_a[0].1, "b");
    assert_eq!(seen_by_b[0].1, "a");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn racing_edits_memory() {
    racing_edits_at_version_five(memory(SyncConfig::default())).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn racing_edits_sqlite() {
    racing_edits_at_version_five(sqlite(SyncConfig::default()).await).await;
}

async fn private_room_denies_non_members(harness: Harness) {
    let room = harness.room("owner", false).await;

    let (mut owner, mut rx_owner) = harness.engine.open().await;
    owner.join(&room.id, "owner").await.unwrap();
    drain(&mut rx_owner);

    let (mut intruder, mut rx_intruder) = harness.engine.open().await;
    let outcome = intruder.join(&room.id, "mallory").await.unwrap();
    assert!(matches!(outcome, JoinOutcome::Denied { .. }));

    match drain(&mut rx_intruder).as_slice() {
        [ServerEvent::JoinDenied { room_id, .. }] => assert_eq!(room_id, &room.id),
        other => panic!("unexpected events {other:?}"),
    }
    assert_eq!(intruder.state(), &ConnectionState::Unjoined);
    assert!(drain(&mut rx_owner).is_empty());

    owner.edit("secret".into(), None, None).await.unwrap();
    assert!(drain(&mut rx_intruder).is_empty());

    let stored = harness.directory.find_room(&room.id).await.unwrap().unwrap();
    assert_eq!(stored.members, vec!["owner".to_string()]);
}

#[tokio::test]
async fn private_room_memory() {
    private_room_denies_non_members(memory(SyncConfig::default())).await;
}

#[tokio::test]
async fn private_room_sqlite() {
    private_room_denies_non_members(sqlite(SyncConfig::default()).await).await;
}

#[tokio::test]
async fn unknown_room_is_denied() {
    let harness = memory(SyncConfig::default());
    let (mut connection, mut rx) = harness.engine.open().await;

    let outcome = connection.join("does-not-exist", "alice").await.unwrap();
    assert_eq!(
        outcome,
        JoinOutcome::Denied {
            reason: "room not found".into()
        }
    );
    assert!(matches!(
        drain(&mut rx).as_slice(),
        [ServerEvent::JoinDenied { .. }]
    ));
}

#[tokio::test]
async fn denied_join_keeps_previous_room() {
    let harness = memory(SyncConfig::default());
    let open = harness.room("alice", true).await;
    let private = harness.room("owner", false).await;

    let (mut alice, _rx) = harness.engine.open().await;
    alice.join(&open.id, "alice").await.unwrap();
    alice.join(&private.id, "alice").await.unwrap();

    assert_eq!(alice.room_id(), Some(open.id.as_str()));
    assert_eq!(harness.engine.registry().members(&open.id).await.len(), 1);
}

#[tokio::test]
async fn version_checked_policy_rejects_stale_edit() {
    let harness = memory(SyncConfig {
        conflict_policy: ConflictPolicyKind::VersionChecked,
        ..SyncConfig::default()
    });
    let room = harness.room("a", true).await;

    let (mut a, mut rx_a) = harness.engine.open().await;
    let (mut b, mut rx_b) = harness.engine.open().await;
    a.join(&room.id, "a").await.unwrap();
    b.join(&room.id, "b").await.unwrap();
    a.edit("first".into(), None, Some(0)).await.unwrap();
    drain(&mut rx_a);
    drain(&mut rx_b);

    let outcome = b.edit("stale".into(), None, Some(0)).await.unwrap();
    assert!(matches!(outcome, EditOutcome::Rejected { .. }));

    let events = drain(&mut rx_b);
    assert_eq!(events.len(), 2);
    assert!(matches!(
        &events[0],
        ServerEvent::Error { code, message }
            if code == "edit-rejected" && message.starts_with("Edit rejected:")
    ));
    assert_eq!(
        events[1],
        ServerEvent::DocumentLoad {
            content: "first".into(),
            version: 1
        }
    );
    assert!(drain(&mut rx_a).is_empty());
    assert_eq!(harness.documents.load(&room.id).await.unwrap().version, 1);

    let outcome = b.edit("fresh".into(), None, Some(1)).await.unwrap();
    assert_eq!(outcome, EditOutcome::Applied { version: 2 });
}

struct UnavailableStore;

#[async_trait]
impl DocumentStore for UnavailableStore {
    async fn load(&self, _room_id: &str) -> SyncResult<DocumentSnapshot> {
        Err(SyncError::store_unavailable("database offline"))
    }

    async fn append_edit(&self, _room_id: &str, _content: &str, _editor: &str) -> SyncResult<u64> {
        Err(SyncError::store_unavailable("database offline"))
    }

    async fn history(&self, _room_id: &str) -> SyncResult<Vec<HistoryEntry>> {
        Err(SyncError::store_unavailable("database offline"))
    }
}

struct SlowStore;

#[async_trait]
impl DocumentStore for SlowStore {
    async fn load(&self, _room_id: &str) -> SyncResult<DocumentSnapshot> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(DocumentSnapshot::empty())
    }

    async fn append_edit(&self, _room_id: &str, _content: &str, _editor: &str) -> SyncResult<u64> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(1)
    }

    async fn history(&self, _room_id: &str) -> SyncResult<Vec<HistoryEntry>> {
        Ok(Vec::new())
    }
}

fn public_room(id: &str) -> Room {
    Room {
        id: id.to_string(),
        name: "broken".into(),
        description: None,
        language: "rust".into(),
        is_public: true,
        owner_id: "owner".into(),
        members: vec!["owner".into()],
        created_at: chrono::Utc::now().to_rfc3339(),
    }
}

/// Reads are fast; appends outlast the store timeout but succeed
struct SlowAppendStore;

#[async_trait]
impl DocumentStore for SlowAppendStore {
    async fn load(&self, _room_id: &str) -> SyncResult<DocumentSnapshot> {
        Ok(DocumentSnapshot::empty())
    }

    async fn append_edit(&self, _room_id: &str, _content: &str, _editor: &str) -> SyncResult<u64> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(1)
    }

    async fn history(&self, _room_id: &str) -> SyncResult<Vec<HistoryEntry>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn slow_append_completes_and_is_broadcast() {
    let config = SyncConfig {
        store_timeout_ms: 20,
        ..SyncConfig::default()
    };
    let engine = engine_with_store(Arc::new(SlowAppendStore), config).await;
    let (mut a, mut rx_a) = engine.open().await;
    let (mut b, mut rx_b) = engine.open().await;
    a.join("r1", "a").await.unwrap();
    b.join("r1", "b").await.unwrap();
    drain(&mut rx_a);
    drain(&mut rx_b);

    let outcome = a.edit("slow but sure".into(), None, None).await.unwrap();
    assert_eq!(outcome, EditOutcome::Applied { version: 1 });
    assert!(drain(&mut rx_a).is_empty());
    assert_eq!(
        text_changes(&drain(&mut rx_b)),
        vec![("slow but sure".to_string(), "a".to_string(), 1)]
    );
}

async fn engine_with_store(store: Arc<dyn DocumentStore>, config: SyncConfig) -> SyncEngine {
    let directory = Arc::new(MemoryRoomDirectory::new());
    directory.insert(public_room("r1")).await;
    SyncEngine::new(store, directory, &config)
}

#[tokio::test]
async fn store_failure_on_join_reports_error_and_keeps_connection_joined() {
    let engine = engine_with_store(Arc::new(UnavailableStore), SyncConfig::default()).await;
    let (mut a, mut rx_a) = engine.open().await;
    let (mut b, mut rx_b) = engine.open().await;

    a.join("r1", "a").await.unwrap();
    drain(&mut rx_a);

    let outcome = b.join("r1", "b").await.unwrap();
    assert_eq!(outcome, JoinOutcome::SnapshotUnavailable);
    assert!(matches!(b.state(), ConnectionState::Joined { .. }));

    match drain(&mut rx_b).as_slice() {
        [ServerEvent::Error { code, .. }] => assert_eq!(code, "store-unavailable"),
        other => panic!("unexpected events {other:?}"),
    }
    assert_eq!(
        drain(&mut rx_a),
        vec![ServerEvent::UserJoined { user_id: "b".into() }]
    );
}

#[tokio::test]
async fn store_failure_on_edit_reports_error_without_broadcast() {
    let engine = engine_with_store(Arc::new(UnavailableStore), SyncConfig::default()).await;
    let (mut a, mut rx_a) = engine.open().await;
    let (mut b, mut rx_b) = engine.open().await;
    a.join("r1", "a").await.unwrap();
    b.join("r1", "b").await.unwrap();
    drain(&mut rx_a);
    drain(&mut rx_b);

    a.handle(ClientEvent::TextChange {
        content: "lost".into(),
        room_id: None,
        user_id: None,
        base_version: None,
    })
    .await
    .unwrap();

    match drain(&mut rx_a).as_slice() {
        [ServerEvent::Error { code, .. }] => assert_eq!(code, "store-unavailable"),
        other => panic!("unexpected events {other:?}"),
    }
    assert!(drain(&mut rx_b).is_empty());
}

#[tokio::test]
async fn slow_store_times_out_as_unavailable() {
    let config = SyncConfig {
        store_timeout_ms: 20,
        ..SyncConfig::default()
    };
    let engine = engine_with_store(Arc::new(SlowStore), config).await;
    let (mut a, _rx_a) = engine.open().await;
    a.join("r1", "a").await.unwrap();

    let result = a.edit("late".into(), None, None).await;
    match result {
        Err(err @ SyncError::StoreTimeout { .. }) => assert_eq!(err.code(), "store-unavailable"),
        other => panic!("unexpected result {other:?}"),
    }
}
