use std::{sync::Arc, time::Duration};

use deck::document::UpdateSnapshotRequest;
use deck::editor::EditorSession;
use deck::layout::{DocumentSnapshot, NewBlock};
use deck::sync::{DocumentApi, HttpDocumentApi, SyncError, SyncEvent, SyncTimings};
use secrecy::Secret;
use serde_json::Value;
use uuid::Uuid;

use crate::helpers::{spawn_app, TestApp};

fn fast_timings() -> SyncTimings {
    SyncTimings {
        typing_debounce: Duration::from_millis(20),
        structural_debounce: Duration::from_millis(10),
    }
}

fn client_for(app: &TestApp, token: &str) -> Arc<HttpDocumentApi> {
    Arc::new(HttpDocumentApi::new(
        app.address.clone(),
        Secret::new(token.to_string()),
    ))
}

async fn created_id(app: &TestApp, token: &str, is_public: bool) -> Uuid {
    let created = app.create_document(token, is_public).await;
    created["id"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn client_maps_server_errors() {
    let app = spawn_app().await;
    let owner = app.signed_jwt(Uuid::new_v4());
    let id = created_id(&app, &owner, false).await;

    let api = client_for(&app, &owner);
    let document = api.get_document(id).await.unwrap();
    assert_eq!(document.revision, 0);

    let request = UpdateSnapshotRequest {
        base_revision: 0,
        data: document.data.clone(),
    };
    let saved = api.put_snapshot(id, &request).await.unwrap();
    assert_eq!(saved.revision, 1);

    match api.put_snapshot(id, &request).await {
        Err(SyncError::Conflict {
            current_revision,
            data,
        }) => {
            assert_eq!(current_revision, 1);
            assert_eq!(data, document.data);
        }
        other => panic!("expected a conflict but got {other:?}"),
    }

    let stranger = client_for(&app, &app.signed_jwt(Uuid::new_v4()));
    let forbidden = stranger.get_document(id).await.unwrap_err();
    assert!(matches!(forbidden, SyncError::Forbidden(_)));
    assert!(forbidden.is_fatal());

    let missing = api.get_document(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(missing, SyncError::NotFound(_)));

    let anonymous = client_for(&app, "not-a-jwt");
    assert!(matches!(
        anonymous.get_document(id).await.unwrap_err(),
        SyncError::Unauthorized(_)
    ));
}

#[tokio::test]
async fn editor_session_saves_through_the_server() {
    let app = spawn_app().await;
    let owner = app.signed_jwt(Uuid::new_v4());
    let id = created_id(&app, &owner, false).await;

    let mut session = EditorSession::open(client_for(&app, &owner), id, fast_timings())
        .await
        .unwrap();
    assert!(session.add_block(NewBlock::of_kind("chart")));
    let expected = serde_json::to_value(session.snapshot()).unwrap();
    session.close().await;

    let document: Value = app
        .get_document(&owner, &id.to_string())
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(document["revision"], 1);
    assert_eq!(document["data"], expected);
}

#[tokio::test]
async fn losing_session_adopts_the_winner() {
    let app = spawn_app().await;
    let owner = app.signed_jwt(Uuid::new_v4());
    let id = created_id(&app, &owner, false).await;

    let mut winner = EditorSession::open(client_for(&app, &owner), id, fast_timings())
        .await
        .unwrap();
    let mut loser = EditorSession::open(client_for(&app, &owner), id, fast_timings())
        .await
        .unwrap();

    winner.add_block(NewBlock::of_kind("image"));
    let winning = winner.snapshot().clone();
    winner.close().await;

    loser.add_slide(None);
    let mut reconciled = None;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let events = loser.poll_sync_events();
        if let Some(SyncEvent::Reconciled { revision, .. }) = events
            .iter()
            .find(|event| matches!(event, SyncEvent::Reconciled { .. }))
        {
            reconciled = Some(*revision);
            break;
        }
    }

    assert_eq!(reconciled, Some(1));
    assert_eq!(loser.snapshot(), &winning);
    assert!(!loser.history().can_undo());
    assert_eq!(loser.sync_state().revision, 1);
    loser.close().await;

    let document: Value = app
        .get_document(&owner, &id.to_string())
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(document["revision"], 1);
    assert_eq!(
        DocumentSnapshot::from_value(document["data"].clone(), &mut deck::layout::UuidIds),
        winning
    );
}
