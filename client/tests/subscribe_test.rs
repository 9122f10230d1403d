//! Integration tests for the subscription manager and board view.
//!
//! These run the full loop: access layer mutations -> store notifications
//! -> nested subscriptions -> board merges.

use std::sync::Arc;
use std::time::Duration;

use boardsync_client::engine::{Board, CardStatus};
use boardsync_client::schema::{self, ListDoc};
use boardsync_client::{
    subscribe, Access, BoardHandle, ChannelSink, DocStore, IdentityProvider, NotificationKind,
    NullSink, Session,
};
use serde_json::json;
use tokio::sync::watch;

const UID: &str = "owner-1";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boardsync_client=debug".into()),
        )
        .try_init();
}

fn signed_in(store: &DocStore) -> Access {
    let identity = Arc::new(IdentityProvider::signed_in(Session::new(
        UID,
        "owner@example.com",
    )));
    Access::new(store.clone(), identity)
}

/// Wait until the board satisfies `pred`, or fail after a few seconds.
async fn wait_for<F>(rx: &mut watch::Receiver<Board>, mut pred: F) -> Board
where
    F: FnMut(&Board) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            {
                let board = rx.borrow_and_update();
                if pred(&board) {
                    return board.clone();
                }
            }
            rx.changed().await.expect("board channel closed");
        }
    })
    .await
    .expect("timed out waiting for board state")
}

#[tokio::test]
async fn board_converges_on_the_seed_state() {
    init_tracing();
    let store = DocStore::new();
    let access = signed_in(&store);
    access.initialize_owner().await.unwrap();

    let board = BoardHandle::new();
    let mut rx = board.watch();
    let subscription = subscribe(&store, UID, &board, Arc::new(NullSink));

    let state = wait_for(&mut rx, |board| {
        board.lists.len() == 3 && board.lists.iter().any(|list| !list.todos.is_empty())
    })
    .await;

    let titles: Vec<_> = state.lists.iter().map(|l| l.title.as_str()).collect();
    assert_eq!(titles, vec!["todo", "waiting", "done"]);
    assert_eq!(state.lists[0].todos.len(), 1);
    assert_eq!(state.lists[0].todos[0].title, "Move me around!");
    // The todo inherits its status from the owning list.
    assert_eq!(state.lists[0].todos[0].card_status, CardStatus::Todo);

    subscription.shutdown().await;
}

#[tokio::test]
async fn board_follows_later_mutations() {
    let store = DocStore::new();
    let access = signed_in(&store);
    access.initialize_owner().await.unwrap();

    let board = BoardHandle::new();
    let mut rx = board.watch();
    let subscription = subscribe(&store, UID, &board, Arc::new(NullSink));
    wait_for(&mut rx, |board| board.lists.len() == 3).await;

    access.create_list_appended_last("errands").await.unwrap();
    let state = wait_for(&mut rx, |board| board.lists.len() == 4).await;
    assert_eq!(state.lists[3].title, "errands");

    access.add_todo_to_first_list("buy milk").await.unwrap();
    let state = wait_for(&mut rx, |board| board.lists[0].todos.len() == 2).await;
    assert_eq!(state.lists[0].todos[1].title, "buy milk");

    subscription.shutdown().await;
}

#[tokio::test]
async fn deleting_a_list_removes_it_from_the_board() {
    let store = DocStore::new();
    let access = signed_in(&store);
    access.initialize_owner().await.unwrap();

    let board = BoardHandle::new();
    let mut rx = board.watch();
    let subscription = subscribe(&store, UID, &board, Arc::new(NullSink));
    let state = wait_for(&mut rx, |board| board.lists.len() == 3).await;

    let doomed = state.lists[2].id.clone();
    access.delete_list(&doomed).await.unwrap();

    let state = wait_for(&mut rx, |board| board.lists.len() == 2).await;
    assert!(state.lists.iter().all(|list| list.id != doomed));

    subscription.shutdown().await;
}

#[tokio::test]
async fn cancellation_stops_deliveries() {
    let store = DocStore::new();
    let access = signed_in(&store);
    access.initialize_owner().await.unwrap();

    let board = BoardHandle::new();
    let mut rx = board.watch();
    let subscription = subscribe(&store, UID, &board, Arc::new(NullSink));
    wait_for(&mut rx, |board| board.lists.len() == 3).await;

    subscription.shutdown().await;
    assert!(subscription.is_cancelled());

    // Mutations after cancellation must not reach the board.
    access.create_list_appended_last("unseen").await.unwrap();
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
    assert_eq!(board.current().lists.len(), 3);
}

#[tokio::test]
async fn cancellation_is_idempotent() {
    let store = DocStore::new();
    let access = signed_in(&store);
    access.initialize_owner().await.unwrap();

    let board = BoardHandle::new();
    let subscription = subscribe(&store, UID, &board, Arc::new(NullSink));

    subscription.cancel();
    subscription.cancel();
    subscription.shutdown().await;
    subscription.shutdown().await;
    assert!(subscription.is_cancelled());
}

#[tokio::test]
async fn closing_the_store_ends_the_subscription() {
    let store = DocStore::new();
    let access = signed_in(&store);
    access.initialize_owner().await.unwrap();

    let board = BoardHandle::new();
    let mut rx = board.watch();
    let subscription = subscribe(&store, UID, &board, Arc::new(NullSink));
    wait_for(&mut rx, |board| board.lists.len() == 3).await;

    store.close();
    // The listener tree winds down on its own; shutdown just waits.
    subscription.shutdown().await;
}

#[tokio::test]
async fn malformed_document_is_reported_and_skipped() {
    init_tracing();
    let store = DocStore::new();
    let access = signed_in(&store);
    access.initialize_owner().await.unwrap();

    let (sink, mut notifications) = ChannelSink::new();
    let board = BoardHandle::new();
    let mut rx = board.watch();
    let subscription = subscribe(&store, UID, &board, Arc::new(sink));
    let state = wait_for(&mut rx, |board| board.lists.len() == 3).await;

    // A todo document whose title is not a string cannot be decoded.
    let first_list = state.lists[0].id.clone();
    store
        .add(
            &schema::todos(UID, &first_list),
            json!({"title": 5, "description": "", "order": 9}),
        )
        .await
        .unwrap();
    access
        .create_todo(
            &first_list,
            schema::TodoDoc {
                title: "good todo".into(),
                description: String::new(),
                order: 10,
            },
        )
        .await
        .unwrap();

    // The healthy sibling still arrives even though one document is bad.
    let state = wait_for(&mut rx, |board| {
        board.lists[0]
            .todos
            .iter()
            .any(|todo| todo.title == "good todo")
    })
    .await;
    assert!(state.lists[0].todos.iter().all(|todo| todo.title != "5"));

    let notification = notifications.recv().await.unwrap();
    assert_eq!(notification.kind, NotificationKind::Error);

    subscription.shutdown().await;
}

#[tokio::test]
async fn recreated_listeners_follow_a_new_list() {
    let store = DocStore::new();
    let access = signed_in(&store);
    access.initialize_owner().await.unwrap();

    let board = BoardHandle::new();
    let mut rx = board.watch();
    let subscription = subscribe(&store, UID, &board, Arc::new(NullSink));
    wait_for(&mut rx, |board| board.lists.len() == 3).await;

    // A new list triggers a full re-subscribe; its todos must flow too.
    let list_id = access
        .create_list(ListDoc {
            title: "fresh".into(),
            order: 3,
            card_status: CardStatus::Done,
        })
        .await
        .unwrap();
    wait_for(&mut rx, |board| board.lists.len() == 4).await;

    access
        .create_todo(
            &list_id,
            schema::TodoDoc {
                title: "tracked".into(),
                description: String::new(),
                order: 0,
            },
        )
        .await
        .unwrap();

    let state = wait_for(&mut rx, |board| {
        board
            .list(&list_id)
            .map(|list| !list.todos.is_empty())
            .unwrap_or(false)
    })
    .await;
    assert_eq!(state.list(&list_id).unwrap().todos[0].title, "tracked");
    assert_eq!(
        state.list(&list_id).unwrap().todos[0].card_status,
        CardStatus::Done
    );

    subscription.shutdown().await;
}
