// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session dump and restore across a restart.

use joe_agent::{RestoreSummary, SessionState, SessionStore};
use joe_test_utils::TestHarness;
use joe_test_utils::harness::TEST_TRANSPORT;

#[tokio::test]
async fn dumped_sessions_survive_a_reload() {
    let harness = TestHarness::builder().build().await;
    harness.send("U1", "exec select 1").await.unwrap();
    let clone = harness.clone_of("U1").await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.json");
    let mut store = SessionStore::new(&path);
    harness.processors.dump_sessions(&mut store).await;
    store.save().unwrap();

    let mut reloaded = SessionStore::new(&path);
    reloaded.load().unwrap();
    let users = reloaded.get_users(TEST_TRANSPORT, "C1");
    let stored = users.get("U1").unwrap();
    assert_eq!(stored.session.clone_id(), Some(clone.as_str()));
    assert_eq!(stored.session.state(), SessionState::Detached);
    assert_eq!(stored.session.quota.count, 1);
}

#[tokio::test]
async fn restore_reopens_live_clones() {
    let harness = TestHarness::builder().build().await;
    harness.send("U1", "exec select 1").await.unwrap();
    let clone = harness.clone_of("U1").await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let mut store = SessionStore::new(dir.path().join("sessions.json"));
    harness.processors.dump_sessions(&mut store).await;
    let opened = harness.connections.opened();

    let summary = harness.processors.restore_sessions(&store).await;
    assert_eq!(
        summary,
        RestoreSummary {
            users: 1,
            restored: 1,
            dropped: 0
        }
    );
    assert_eq!(harness.connections.opened(), opened + 1);
    assert_eq!(harness.clone_of("U1").await, Some(clone));

    harness.send("U1", "exec select 2").await.unwrap();
    assert_eq!(harness.dblab.created().len(), 1);
}

#[tokio::test]
async fn restore_drops_sessions_of_missing_clones() {
    let before = TestHarness::builder().build().await;
    before.send("U1", "exec select 1").await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let mut store = SessionStore::new(dir.path().join("sessions.json"));
    before.processors.dump_sessions(&mut store).await;

    // A fresh lab knows none of the dumped clones.
    let after = TestHarness::builder().build().await;
    let summary = after.processors.restore_sessions(&store).await;

    assert_eq!(summary.dropped, 1);
    assert!(after.clone_of("U1").await.is_none());
    let user = after.service("C1").await.unwrap().users().get("U1").await;
    assert!(user.is_some());
}
