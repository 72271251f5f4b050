use std::fs;
use std::sync::Arc;

use studytrack_core::auth::Session;
use studytrack_core::datastore::DataStore;
use studytrack_core::form::TaskFormData;
use studytrack_core::notify::LogNotifier;
use studytrack_core::remote::RemoteStore;
use studytrack_core::store::TaskStore;
use studytrack_core::task::{TaskType, UserId};
use tempfile::tempdir;

fn form(topic: &str) -> TaskFormData {
    TaskFormData {
        course_name: "Statistics".to_string(),
        module_name: "Inference".to_string(),
        module_code: "STA301".to_string(),
        task_type: TaskType::Test,
        task_topic: topic.to_string(),
        due_date: "2026-11-20".to_string(),
        due_time: "08:15".to_string(),
    }
}

#[tokio::test]
async fn records_survive_reopening() {
    let temp = tempdir().expect("tempdir");
    let alice = UserId::new("alice");

    let first = DataStore::open(temp.path()).expect("open datastore");
    let draft = form("Hypothesis tests").into_draft().expect("draft");
    let inserted = first.insert(&alice, &draft).await.expect("insert");
    first.set_completed(&alice, inserted.id, true).await.expect("complete");

    let reopened = DataStore::open(temp.path()).expect("reopen datastore");
    let rows = reopened.list_for_owner(&alice).await.expect("list");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, inserted.id);
    assert_eq!(rows[0].due_time, "08:15");
    assert!(rows[0].completed);

    let text = fs::read_to_string(&reopened.tasks_path).expect("read tasks.data");
    assert_eq!(text.lines().count(), 1);
    assert!(reopened.list_for_owner(&UserId::new("bob")).await.expect("list").is_empty());
}

#[tokio::test]
async fn missing_rows_are_errors_and_leave_the_file_alone() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    let alice = UserId::new("alice");
    let draft = form("Confidence intervals").into_draft().expect("draft");
    let inserted = store.insert(&alice, &draft).await.expect("insert");
    let before = fs::read_to_string(&store.tasks_path).expect("read");

    assert!(store.delete(&UserId::new("mallory"), inserted.id).await.is_err());
    assert_eq!(fs::read_to_string(&store.tasks_path).expect("read"), before);

    store.delete(&alice, inserted.id).await.expect("delete");
    assert!(store.load_records().expect("load").is_empty());
}

#[test]
fn active_user_round_trips() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    assert_eq!(store.active_user().expect("read"), None);

    store.set_active_user(Some(&UserId::new("carol"))).expect("write");
    assert_eq!(store.active_user().expect("read"), Some(UserId::new("carol")));

    store.set_active_user(None).expect("clear");
    assert_eq!(store.active_user().expect("read"), None);
}

#[test]
fn corrupt_line_names_the_line() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    fs::write(&store.tasks_path, "\n{not json}\n").expect("write");

    let err = store.load_records().expect_err("corrupt");
    assert!(format!("{err:#}").contains("line 2"));
}

#[tokio::test]
async fn task_store_over_files_sees_earlier_sessions() {
    let temp = tempdir().expect("tempdir");
    let alice = UserId::new("alice");

    {
        let files = Arc::new(DataStore::open(temp.path()).expect("open datastore"));
        let store = TaskStore::new(files, Session::signed_in(alice.clone()), Arc::new(LogNotifier));
        store.handle_auth_change(Some(alice.clone())).await.expect("load");
        let task = store.create(&form("Bootstrap")).await.expect("create");
        store.toggle_complete(task.id).await.expect("toggle");
    }

    let files = Arc::new(DataStore::open(temp.path()).expect("reopen datastore"));
    let store = TaskStore::new(files, Session::signed_in(alice.clone()), Arc::new(LogNotifier));
    assert_eq!(store.handle_auth_change(Some(alice)).await.expect("load"), 1);

    let tasks = store.list();
    assert_eq!(tasks[0].task_topic, "Bootstrap");
    assert!(tasks[0].completed);
}
