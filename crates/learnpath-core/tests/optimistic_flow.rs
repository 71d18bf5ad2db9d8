mod support;

use std::sync::Arc;

use learnpath_core::model::ids::is_provisional;
use learnpath_core::model::{RoadmapUpdate, TaskStatus, TaskUpdate};
use learnpath_core::validate::ValidationError;
use learnpath_core::{
    CacheKey, LoadError, MutationError, MutationKind, MutationOutput, MutationPhase, QueryState,
    TaskDraft,
};
use support::{FakeTransport, client, roadmap, task, three_task_roadmap, topic};

fn status_of(client: &learnpath_core::SyncClient, task_id: &str) -> Option<TaskStatus> {
    client
        .roadmap("r1")
        .and_then(|r| r.task(task_id).map(|t| t.status))
}

async fn wait_for_call(fake: &FakeTransport, op: &str, n: usize) {
    while fake.count(op) < n {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn created_task_is_visible_before_the_server_answers() {
    let fake = FakeTransport::with_roadmaps([three_task_roadmap()]);
    let client = client(&fake);
    let key = CacheKey::roadmap("r1");
    let _view = client.subscribe(&key);
    client.load_roadmap("r1").await.expect("initial load");

    let pending = client
        .begin_create_task("r1", "t1", "Read chapter 1", None)
        .expect("valid title");
    assert_eq!(pending.kind(), MutationKind::CreateTask);
    assert_eq!(pending.phase(), MutationPhase::OptimisticApplied);
    assert_eq!(fake.count("create_task"), 0);

    let tree = client.roadmap("r1").expect("cached");
    let temp_id = pending.provisional_id().expect("provisional id").to_string();
    let inserted = tree.task(&temp_id).expect("provisional task present");
    assert!(is_provisional(&inserted.id));
    assert_eq!(inserted.title, "Read chapter 1");
    assert_eq!(inserted.status, TaskStatus::NotStarted);
    assert_eq!(inserted.sort_order, 4);
    assert_eq!(tree.total_tasks, 4);
    assert!(client.is_submitting(&key));

    let output = pending.commit().await.expect("server accepts");
    assert!(!client.is_submitting(&key));
    let MutationOutput::Task(created) = output else {
        panic!("expected a created task");
    };

    client.settled().await;
    let tree = client.roadmap("r1").expect("cached");
    assert!(tree.task(&created.id).is_some());
    assert!(tree.tasks().all(|t| !is_provisional(&t.id)));
    assert_eq!(tree.total_tasks, 4);
    assert!(!client.store().view(&key).is_stale);
}

#[tokio::test]
async fn failed_status_change_restores_exact_snapshot() {
    let fake = FakeTransport::with_roadmaps([three_task_roadmap()]);
    let client = client(&fake);
    let key = CacheKey::roadmap("r1");
    client.load_roadmap("r1").await.expect("initial load");
    let before = client.store().get(&key);

    fake.fail("update_task", 1);
    let pending = client
        .begin_set_task_status("r1", "a", TaskStatus::Completed)
        .expect("valid");
    assert_eq!(status_of(&client, "a"), Some(TaskStatus::Completed));
    assert_eq!(client.roadmap("r1").expect("cached").completed_tasks, 2);

    let err = pending.commit().await.expect_err("server rejects");
    assert!(err.is_rolled_back());
    assert_eq!(err.code().code(), "E3001");
    assert_eq!(client.store().get(&key), before);
}

#[tokio::test]
async fn rapid_advances_read_the_latest_optimistic_status() {
    let fake = FakeTransport::with_roadmaps([three_task_roadmap()]);
    let client = client(&fake);
    client.load_roadmap("r1").await.expect("initial load");

    let first = client
        .begin_advance_task_status("r1", "a")
        .expect("task cached");
    assert_eq!(status_of(&client, "a"), Some(TaskStatus::InProgress));
    let second = client
        .begin_advance_task_status("r1", "a")
        .expect("task cached");
    assert_eq!(status_of(&client, "a"), Some(TaskStatus::Completed));

    let (a, b) = tokio::join!(first.commit(), second.commit());
    a.expect("first advance");
    b.expect("second advance");

    assert_eq!(status_of(&client, "a"), Some(TaskStatus::Completed));
    let server = fake.server_roadmap("r1").expect("server copy");
    assert_eq!(server.task("a").map(|t| t.status), Some(TaskStatus::Completed));
}

#[tokio::test]
async fn failed_mutation_still_refetches_observed_roadmap() {
    let fake = FakeTransport::with_roadmaps([three_task_roadmap()]);
    let client = client(&fake);
    let key = CacheKey::roadmap("r1");
    let _view = client.subscribe(&key);
    client.load_roadmap("r1").await.expect("initial load");
    assert_eq!(fake.count("get_roadmap"), 1);

    fake.fail("delete_task", 1);
    let err = client
        .delete_task("r1", "c")
        .await
        .expect_err("server rejects");
    assert!(matches!(err, MutationError::Transport(_)));
    assert!(client.roadmap("r1").expect("cached").task("c").is_some());

    client.settled().await;
    assert_eq!(fake.count("get_roadmap"), 2);
    let calls = fake.calls();
    let delete_at = calls
        .iter()
        .position(|c| c == "delete_task c")
        .expect("delete sent");
    assert_eq!(calls.last().map(String::as_str), Some("get_roadmap r1"));
    assert!(delete_at < calls.len() - 1);
}

#[tokio::test]
async fn unobserved_keys_are_only_marked_stale() {
    let fake = FakeTransport::with_roadmaps([three_task_roadmap()]);
    let client = client(&fake);
    let key = CacheKey::roadmap("r1");
    client.load_roadmap("r1").await.expect("initial load");

    client
        .set_task_status("r1", "b", TaskStatus::Completed)
        .await
        .expect("accepted");
    client.settled().await;

    assert_eq!(fake.count("get_roadmap"), 1);
    assert!(client.store().view(&key).is_stale);

    let fresh = client.load_roadmap("r1").await.expect("reload");
    assert_eq!(fake.count("get_roadmap"), 2);
    assert_eq!(fresh.completed_tasks, 2);
}

#[tokio::test]
async fn slow_fetch_cannot_overwrite_a_newer_optimistic_write() {
    let fake = FakeTransport::with_roadmaps([three_task_roadmap()]);
    let client = client(&fake);
    let key = CacheKey::roadmap("r1");
    client.load_roadmap("r1").await.expect("initial load");

    let gate = fake.gate("get_roadmap");
    let background = {
        let client = client.clone();
        let key = key.clone();
        tokio::spawn(async move { client.fetch(&key).await })
    };
    wait_for_call(&fake, "get_roadmap", 2).await;
    assert!(client.store().is_fetching(&key));

    let pending = client
        .begin_set_task_status("r1", "a", TaskStatus::InProgress)
        .expect("valid");
    assert!(!client.store().is_fetching(&key));

    gate.notify_one();
    let resolved = background
        .await
        .expect("fetch task")
        .expect("cached value returned");
    assert_eq!(
        resolved.as_roadmap().and_then(|r| r.task("a")).map(|t| t.status),
        Some(TaskStatus::InProgress)
    );
    assert_eq!(status_of(&client, "a"), Some(TaskStatus::InProgress));

    pending.commit().await.expect("accepted");
    assert_eq!(status_of(&client, "a"), Some(TaskStatus::InProgress));
}

#[tokio::test]
async fn concurrent_loads_share_one_request() {
    let fake = FakeTransport::with_roadmaps([three_task_roadmap()]);
    let client = client(&fake);
    let gate = fake.gate("get_roadmap");

    let first = {
        let client = client.clone();
        tokio::spawn(async move { client.load_roadmap("r1").await })
    };
    wait_for_call(&fake, "get_roadmap", 1).await;
    let second = {
        let client = client.clone();
        tokio::spawn(async move { client.load_roadmap("r1").await })
    };
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
    assert_eq!(fake.count("get_roadmap"), 1);

    gate.notify_one();
    let first = first.await.expect("load task").expect("first load");
    let second = second.await.expect("load task").expect("second load");
    assert_eq!(first.id, "r1");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(fake.count("get_roadmap"), 1);
    assert!(!client.store().is_fetching(&CacheKey::roadmap("r1")));
}

#[tokio::test]
async fn abandoned_fetch_does_not_block_later_loads() {
    let fake = FakeTransport::with_roadmaps([three_task_roadmap()]);
    let client = client(&fake);
    let gate = fake.gate("get_roadmap");

    let abandoned = {
        let client = client.clone();
        tokio::spawn(async move { client.load_roadmap("r1").await })
    };
    wait_for_call(&fake, "get_roadmap", 1).await;
    abandoned.abort();
    assert!(abandoned.await.is_err());

    let retry = {
        let client = client.clone();
        tokio::spawn(async move { client.load_roadmap("r1").await })
    };
    wait_for_call(&fake, "get_roadmap", 2).await;
    gate.notify_one();
    let tree = retry.await.expect("load task").expect("fresh request");
    assert_eq!(tree.total_tasks, 3);
}

#[tokio::test]
async fn blank_title_never_reaches_cache_or_network() {
    let fake = FakeTransport::with_roadmaps([three_task_roadmap()]);
    let client = client(&fake);
    let key = CacheKey::roadmap("r1");
    client.load_roadmap("r1").await.expect("initial load");
    let before = client.store().get(&key);

    let err = client
        .create_task("r1", "t1", "   ", None)
        .await
        .expect_err("rejected");
    assert_eq!(
        err,
        MutationError::Validation(ValidationError::EmptyField { field: "title" })
    );
    assert!(!err.is_rolled_back());
    assert_eq!(client.store().get(&key), before);
    assert_eq!(fake.count("create_task"), 0);
    assert!(!client.is_submitting(&key));
}

#[tokio::test]
async fn dashboard_refreshes_only_when_counts_can_change() {
    let fake = FakeTransport::with_roadmaps([three_task_roadmap()]);
    let client = client(&fake);
    let _dash = client.subscribe(&CacheKey::Dashboard);
    client.load_roadmap("r1").await.expect("initial load");
    client.load_dashboard().await.expect("dashboard");
    assert_eq!(fake.count("dashboard_stats"), 1);

    client
        .update_task(
            "r1",
            "a",
            TaskUpdate {
                title: Some("Renamed".into()),
                ..TaskUpdate::default()
            },
        )
        .await
        .expect("rename");
    client.settled().await;
    assert_eq!(fake.count("dashboard_stats"), 1);
    assert!(!client.store().view(&CacheKey::Dashboard).is_stale);

    client
        .set_task_status("r1", "a", TaskStatus::Completed)
        .await
        .expect("complete");
    client.settled().await;
    assert_eq!(fake.count("dashboard_stats"), 2);
    assert_eq!(client.dashboard().expect("dashboard").completed_tasks, 2);
}

#[tokio::test]
async fn deleting_a_topic_drops_its_tasks_from_totals() {
    let tree = roadmap(
        "r1",
        vec![
            topic(
                "t1",
                "r1",
                1,
                vec![
                    task("a", "t1", TaskStatus::Completed, 1),
                    task("b", "t1", TaskStatus::NotStarted, 2),
                ],
            ),
            topic(
                "t2",
                "r1",
                2,
                vec![
                    task("c", "t2", TaskStatus::Completed, 1),
                    task("d", "t2", TaskStatus::InProgress, 2),
                    task("e", "t2", TaskStatus::NotStarted, 3),
                ],
            ),
        ],
    );
    let fake = FakeTransport::with_roadmaps([tree]);
    let client = client(&fake);
    let loaded = client.load_roadmap("r1").await.expect("initial load");
    assert_eq!((loaded.total_tasks, loaded.completed_tasks), (5, 2));

    let pending = client.begin_delete_topic("r1", "t1");
    let tree = client.roadmap("r1").expect("cached");
    assert_eq!((tree.total_tasks, tree.completed_tasks), (3, 1));
    assert!(tree.topic("t1").is_none());
    pending.commit().await.expect("accepted");
}

#[tokio::test]
async fn advancing_an_uncached_task_is_rejected() {
    let fake = FakeTransport::with_roadmaps([three_task_roadmap()]);
    let client = client(&fake);

    let err = client
        .advance_task_status("r1", "a")
        .await
        .expect_err("nothing cached");
    assert_eq!(err.code().code(), "E2004");
    assert_eq!(fake.count("update_task"), 0);
}

#[tokio::test]
async fn confirmed_roadmap_delete_evicts_detail() {
    let fake = FakeTransport::with_roadmaps([three_task_roadmap(), roadmap("r2", Vec::new())]);
    let client = client(&fake);
    client.load_roadmaps().await.expect("list");
    client.load_roadmap("r1").await.expect("detail");

    let pending = client.begin_delete_roadmap("r1");
    let rows = client.roadmaps().expect("list cached");
    assert_eq!(rows.len(), 1);
    assert!(client.roadmap("r1").is_some());

    pending.commit().await.expect("accepted");
    assert!(client.roadmap("r1").is_none());
    assert_eq!(
        client.store().view(&CacheKey::roadmap("r1")).state(),
        QueryState::Loading
    );
}

#[tokio::test]
async fn created_roadmap_is_swapped_for_server_row() {
    let fake = FakeTransport::with_roadmaps([three_task_roadmap()]);
    let client = client(&fake);
    client.load_roadmaps().await.expect("list");

    let pending = client
        .begin_create_roadmap("  Distributed systems ", None, Some("#10B981"))
        .expect("valid");
    let rows = client.roadmaps().expect("list cached");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].title, "Distributed systems");
    assert_eq!(rows[1].color, "#10b981");
    assert_eq!(rows[1].sort_order, 2);
    assert!(client.is_submitting(&CacheKey::Roadmaps));

    pending.commit().await.expect("accepted");
    let rows = client.roadmaps().expect("list cached");
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| !is_provisional(&r.id)));
    assert!(!client.is_submitting(&CacheKey::Roadmaps));
}

#[tokio::test]
async fn created_topic_is_swapped_for_server_topic() {
    let fake = FakeTransport::with_roadmaps([three_task_roadmap()]);
    let client = client(&fake);
    client.load_roadmap("r1").await.expect("initial load");

    let pending = client
        .begin_create_topic("r1", " Lifetimes ", None)
        .expect("valid");
    let temp_id = pending.provisional_id().expect("provisional id").to_string();
    let tree = client.roadmap("r1").expect("cached");
    let provisional = tree.topic(&temp_id).expect("provisional topic present");
    assert_eq!(provisional.title, "Lifetimes");
    assert_eq!(provisional.sort_order, 2);
    assert_eq!(tree.topics.len(), 2);

    let MutationOutput::Topic(created) = pending.commit().await.expect("accepted") else {
        panic!("expected a created topic");
    };
    assert!(!is_provisional(&created.id));

    let tree = client.roadmap("r1").expect("cached");
    assert_eq!(tree.topics.len(), 2);
    assert!(tree.topic(&temp_id).is_none());
    let swapped = tree.topic(&created.id).expect("server topic present");
    assert_eq!(swapped.title, "Lifetimes");
    assert_eq!(
        tree.topics.last().map(|t| t.id.as_str()),
        Some(created.id.as_str())
    );
    assert_eq!(tree.total_tasks, 3);
    assert!(!client.is_submitting(&CacheKey::roadmap("r1")));
}

#[tokio::test]
async fn archiving_patches_list_and_detail() {
    let fake = FakeTransport::with_roadmaps([three_task_roadmap()]);
    let client = client(&fake);
    client.load_roadmaps().await.expect("list");
    client.load_roadmap("r1").await.expect("detail");

    fake.fail("update_roadmap", 1);
    let update = RoadmapUpdate {
        is_archived: Some(true),
        ..RoadmapUpdate::default()
    };
    let pending = client.begin_update_roadmap("r1", update).expect("valid");
    assert!(client.roadmaps().expect("list")[0].is_archived);
    assert!(client.roadmap("r1").expect("detail").is_archived);

    pending.commit().await.expect_err("server rejects");
    assert!(!client.roadmaps().expect("list")[0].is_archived);
    assert!(!client.roadmap("r1").expect("detail").is_archived);
}

#[tokio::test]
async fn draft_for_a_deleted_task_is_discarded() {
    let fake = FakeTransport::with_roadmaps([three_task_roadmap()]);
    let client = client(&fake);
    let tree = client.load_roadmap("r1").await.expect("initial load");

    let mut draft = TaskDraft::open("r1", tree.task("b").expect("task b"));
    draft.set_title("Edited while deleting");

    client.delete_task("r1", "b").await.expect("deleted");
    let saved = client.save_draft(&draft).await.expect("no error");
    assert!(saved.is_none());
    assert_eq!(fake.count("update_task"), 0);
}

#[tokio::test]
async fn draft_save_sends_only_changed_fields() {
    let fake = FakeTransport::with_roadmaps([three_task_roadmap()]);
    let client = client(&fake);
    let tree = client.load_roadmap("r1").await.expect("initial load");

    let mut draft = TaskDraft::open("r1", tree.task("a").expect("task a"));
    draft.set_status(TaskStatus::Completed).set_notes("  ");
    let saved = client.save_draft(&draft).await.expect("saved");
    assert!(matches!(saved, Some(MutationOutput::Task(ref t)) if t.status == TaskStatus::Completed));
    assert_eq!(status_of(&client, "a"), Some(TaskStatus::Completed));
}

#[tokio::test]
async fn load_failure_is_blocking_until_data_exists() {
    let fake = FakeTransport::with_roadmaps([three_task_roadmap()]);
    let client = client(&fake);
    let key = CacheKey::roadmap("r1");

    fake.fail("get_roadmap", 1);
    let err = client.load_roadmap("r1").await.expect_err("load fails");
    assert!(matches!(err, LoadError::Transport(_)));
    assert!(matches!(
        client.store().view(&key).state(),
        QueryState::Failed(_)
    ));

    client.load_roadmap("r1").await.expect("retry succeeds");
    fake.fail("get_roadmap", 1);
    client.fetch(&key).await.expect_err("refetch fails");
    let view = client.store().view(&key);
    assert_eq!(view.state(), QueryState::Ready);
    assert!(view.error.is_some());
}

#[tokio::test]
async fn dropping_an_uncommitted_mutation_rolls_it_back() {
    let fake = FakeTransport::with_roadmaps([three_task_roadmap()]);
    let client = client(&fake);
    let key = CacheKey::roadmap("r1");
    client.load_roadmap("r1").await.expect("initial load");
    let before = client.store().get(&key);

    let pending = client
        .begin_create_topic("r1", "Ownership", None)
        .expect("valid");
    assert_eq!(client.roadmap("r1").expect("cached").topics.len(), 2);
    assert!(client.is_submitting(&key));
    drop(pending);

    assert_eq!(client.store().get(&key), before);
    assert!(!client.is_submitting(&key));
    assert_eq!(fake.count("create_topic"), 0);
}

#[tokio::test]
async fn subscribers_see_optimistic_and_reconciled_values() {
    let fake = FakeTransport::with_roadmaps([three_task_roadmap()]);
    let client = client(&fake);
    let key = CacheKey::roadmap("r1");
    let mut view = client.subscribe(&key);
    client.load_roadmap("r1").await.expect("initial load");
    view.borrow_and_update();

    let pending = client
        .begin_set_task_status("r1", "a", TaskStatus::Completed)
        .expect("valid");
    assert!(view.has_changed().expect("sender alive"));
    let seen = view.borrow_and_update().clone();
    assert_eq!(
        seen.data
            .as_ref()
            .and_then(|v| v.as_roadmap())
            .map(|r| r.completed_tasks),
        Some(2)
    );

    pending.commit().await.expect("accepted");
    client.settled().await;
    let reconciled = client.roadmap("r1").expect("cached");
    assert_eq!(reconciled.completed_tasks, 2);
    assert!(!view.borrow().is_stale);
}
